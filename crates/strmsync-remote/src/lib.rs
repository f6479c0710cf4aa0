//! strmsync Remote - Throttled access to the remote object store
//!
//! Provides:
//! - Sliding-window rate limiting shared by all enumeration workers
//! - Weighted round-robin over a pool of equivalent endpoints, each with
//!   its own cooldown
//! - Exponential-backoff retry of transient failures
//! - An HTTP adapter for a paginated JSON listing API
//!
//! ## Modules
//!
//! - [`rate_limit`] - Sliding-window limiter and endpoint cooldown
//! - [`retry`] - Transient error classification and retry loop
//! - [`limited`] - `IRemoteTree` decorator combining the two over an
//!   endpoint pool
//! - [`client`] - HTTP client for the listing API
//! - [`provider`] - `IRemoteTree` implementation over [`client::RemoteClient`]

pub mod client;
pub mod limited;
pub mod provider;
pub mod rate_limit;
pub mod retry;

use std::time::Duration;
use thiserror::Error;

pub use client::RemoteClient;
pub use limited::{PoolEndpoint, RateLimitedRemote};
pub use provider::HttpRemoteTree;
pub use rate_limit::{EndpointCooldown, SlidingWindowLimiter};
pub use retry::{is_transient_error, with_retry, RetryPolicy};

/// Errors that can occur when communicating with the remote store
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The requested directory or item does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded; retry after the specified duration
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration to wait before retrying
        retry_after: Duration,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The request did not complete in time
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// An endpoint pool was built without any endpoint
    #[error("No remote endpoints configured")]
    NoEndpoints,
}

impl RemoteError {
    /// Returns true for failures worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::TooManyRequests { .. }
            | RemoteError::ServerError(_)
            | RemoteError::Timeout(_) => true,
            RemoteError::NetworkError(e) => !e.is_decode() && !e.is_builder(),
            RemoteError::NotFound(_)
            | RemoteError::InvalidResponse(_)
            | RemoteError::NoEndpoints => false,
        }
    }

    /// Returns true if `err` wraps a [`RemoteError::NotFound`]
    pub fn is_not_found(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<RemoteError>(),
            Some(RemoteError::NotFound(_))
        )
    }
}
