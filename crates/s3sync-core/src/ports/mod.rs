//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the sync engine depends on; their
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IBlobStore`] - Object storage destination (`s3sync-store`)
//! - [`IManifestStore`] - Durable record of prior uploads (`s3sync-sync`)

pub mod blob_store;
pub mod manifest_store;

pub use blob_store::IBlobStore;
pub use manifest_store::IManifestStore;
