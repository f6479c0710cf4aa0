//! Integration tests for strmsync-remote
//!
//! Uses wiremock to simulate the remote listing API and verifies
//! end-to-end behavior of the HTTP adapter, the error mapping, and the
//! rate-limited decorator on top of it.

mod common;

mod test_errors;
mod test_listing;
