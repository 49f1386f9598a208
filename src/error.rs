use std::path::PathBuf;

use thiserror::Error;

use crate::metadata::VersionNumber;

/// Everything that can go wrong in a repository operation.
///
/// Informational outcomes such as "file already tracked" are not errors; see
/// [`crate::repository::Outcome`].
#[derive(Debug, Error)]
pub enum Error {
    /// The control directory or its `repo.json` is missing.
    #[error("repository is not initialized")]
    NotInitialized,
    #[error("repository is already initialized")]
    AlreadyInitialized,
    /// A source file is missing or is a directory.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// A version directory or its record is missing from storage.
    #[error("no stored record for version {0}")]
    VersionNotFound(VersionNumber),
    /// The version is not a member of the repository's version set.
    #[error("invalid version number: {0}")]
    InvalidVersion(VersionNumber),
    /// A non-empty directory already exists for a version being allocated.
    #[error("version directory {0} already exists")]
    Conflict(VersionNumber),
    /// The chain cannot grow past this version.
    #[error("no version number follows {0}")]
    Exhausted(VersionNumber),
    #[error("metadata error: {0}")]
    Storage(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[test]
fn test_error_display() {
    assert_eq!(
        Error::NotFound(PathBuf::from("a.txt")).to_string(),
        "file not found: a.txt"
    );
    assert_eq!(
        Error::InvalidVersion(VersionNumber(7)).to_string(),
        "invalid version number: 7"
    );
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err = Error::from(io);
    assert!(err.to_string().starts_with("io error"));
    assert!(std::error::Error::source(&err).is_some());
    assert!(std::error::Error::source(&Error::NotInitialized).is_none());
}
