//! # gvt
//!
//! A minimal local version tracker. Individual files are snapshotted into an
//! ordered chain of immutable, numbered versions kept under a `.gvt` control
//! directory next to them.

/// Working directory and control directory settings.
pub mod config;
/// Path routing and JSON helpers for the `.gvt` directory.
pub mod dot_gvt;
pub mod error;
/// Repository and per-version records.
pub mod metadata;
/// Read-only views over stored versions.
pub mod query;
/// The version state machine.
pub mod repository;
/// Storage API for version records and file snapshots.
pub mod version_store;

pub use config::Config;
pub use error::{Error, Result};
pub use metadata::{RepoMetadata, VersionMetadata, VersionNumber};
pub use repository::{Outcome, PendingVersion, Repository};
