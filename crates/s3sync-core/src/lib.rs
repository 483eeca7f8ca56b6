//! s3sync Core - Domain types, ports and configuration
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `ContentHash`, `ObjectKey`, `KeyPrefix`, `ExcludeSet`,
//!   `ManifestEntry`, `Manifest`, `SyncCandidate`
//! - **Port definitions** - Traits for adapters: `IBlobStore`, `IManifestStore`
//! - **Configuration** - YAML-backed settings for sync, store and logging
//!
//! # Architecture
//!
//! The domain module is pure data and validation with no I/O.
//! Ports define trait interfaces that adapter crates implement
//! (`s3sync-sync` for the manifest file, `s3sync-store` for blob stores).

pub mod config;
pub mod domain;
pub mod ports;
