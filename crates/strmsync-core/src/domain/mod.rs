//! Domain entities
//!
//! This module contains the core domain types for strmsync:
//! - Newtypes for identifiers and validated values
//! - Remote item records produced by enumeration
//! - Domain-specific error types

pub mod errors;
pub mod item;
pub mod newtypes;

// Re-export commonly used types
pub use errors::DomainError;
pub use item::{escape_name, Ancestor, ItemKind, ItemMetadata, RemoteEntry, RemoteItem};
pub use newtypes::*;
