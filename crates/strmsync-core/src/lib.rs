//! strmsync Core - Domain types, configuration and ports
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `RemoteItem`, `RemoteEntry`, `ItemMetadata`, `ContentHandle`, `ScopeKey`
//! - **Port definitions** - Traits for adapters: `IRemoteTree`, `IStabilityStore`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! The domain module contains pure data types with no I/O. Ports define the
//! trait interfaces that adapter crates (`strmsync-remote`, `strmsync-cache`)
//! implement and that the sync orchestrators consume.

pub mod config;
pub mod domain;
pub mod ports;
