//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync orchestrators
//! depend on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteTree`] - Paginated listing and lookups against the remote store
//! - [`IStabilityStore`] - Persistent deletion-count history per sync scope

pub mod remote_tree;
pub mod stability_store;

pub use remote_tree::{IRemoteTree, ListOptions, ListPage, SortField};
pub use stability_store::IStabilityStore;
