//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures and malformed remote records.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid local path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid remote path format
    #[error("Invalid remote path: {0}")]
    InvalidRemotePath(String),

    /// Content handle is not a well-formed handle
    #[error("Invalid content handle: {0}")]
    InvalidContentHandle(String),

    /// A `local#remote` pair could not be parsed
    #[error("Invalid path pair: {0}")]
    InvalidPathPair(String),

    /// A remote record is missing a required field
    #[error("Malformed item {id}: {reason}")]
    MalformedItem {
        /// Identifier of the offending record
        id: u64,
        /// What was wrong with it
        reason: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
