//! Domain entities and business rules
//!
//! This module contains the core domain types for s3sync:
//! - Newtypes for validated hashes, object keys, key prefixes and exclusions
//! - The upload manifest and its entries
//! - Per-file sync candidates and their state machine
//! - Domain-specific error types

pub mod candidate;
pub mod errors;
pub mod manifest;
pub mod newtypes;

// Re-export commonly used types
pub use candidate::{CandidateState, Decision, FailureStage, SyncCandidate};
pub use errors::{DomainError, ManifestError};
pub use manifest::{extension_of, Manifest, ManifestEntry};
pub use newtypes::*;
