//! marketsync core - shared types library.
//!
//! This crate provides the types used by every marketsync component:
//! - `marketsync` - the platform adapters and sync engine
//! - the persistence layer that backs the engine's store traits
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//! Enable the `postgres` feature to get `sqlx` mappings for IDs and enums.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, platform and status enums, credentials,
//!   catalog, listing, order and sync-job records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
