use std::{collections::BTreeSet, fmt::Display};

use crate::{
    error::{Error, Result},
    metadata::VersionNumber,
    repository::Repository,
    version_store::VersionStore,
};

/// A single version as reported by `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub version: VersionNumber,
    /// The full message, every line of it.
    pub message: String,
    pub tracked_files: BTreeSet<String>,
}

impl Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Version: {}\n{}", self.version, self.message)
    }
}

/// One line of `history`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub version: VersionNumber,
    /// The message up to its first line break.
    pub summary: String,
}

impl Display for HistoryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.version, self.summary)
    }
}

impl<S: VersionStore> Repository<S> {
    /// Reports `version`, or the current version when `None`.
    pub fn show_version(&self, version: Option<VersionNumber>) -> Result<VersionInfo> {
        let version = version.unwrap_or_else(|| self.current_version());
        if !self.metadata().contains(version) {
            return Err(Error::InvalidVersion(version));
        }
        let metadata = self.store().load_version_metadata(version)?;
        Ok(VersionInfo {
            version: metadata.version,
            message: metadata.message,
            tracked_files: metadata.tracked_files,
        })
    }

    /// The last `last` versions, oldest first. `0` means every version.
    pub fn list_history(&self, last: usize) -> Result<Vec<HistoryEntry>> {
        let versions = &self.metadata().versions;
        let skip = match last {
            0 => 0,
            n => versions.len().saturating_sub(n),
        };
        versions
            .iter()
            .skip(skip)
            .map(|v| -> Result<HistoryEntry> {
                let metadata = self.store().load_version_metadata(*v)?;
                Ok(HistoryEntry {
                    version: *v,
                    summary: metadata.summary().to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
use crate::{repository::INIT_MESSAGE, version_store::in_memory::InMemoryVersionStore};
#[cfg(test)]
use std::path::Path;

#[cfg(test)]
fn test_repo() -> (tempfile::TempDir, Repository<InMemoryVersionStore>) {
    let tempdir = tempfile::tempdir().unwrap();
    let mut repo =
        Repository::initialize(InMemoryVersionStore::new(), tempdir.path(), INIT_MESSAGE).unwrap();
    std::fs::write(tempdir.path().join("a.txt"), "a").unwrap();
    repo.add_file(Path::new("a.txt"), "msg").unwrap();
    std::fs::write(tempdir.path().join("a.txt"), "a2").unwrap();
    repo.commit_file(Path::new("a.txt"), "fixed\nmore detail").unwrap();
    (tempdir, repo)
}

#[test]
fn test_show_version() {
    let (_tempdir, repo) = test_repo();
    let info = repo.show_version(Some(VersionNumber(1))).unwrap();
    assert!(info.message.contains("msg"));
    assert!(info.tracked_files.contains("a.txt"));

    let current = repo.show_version(None).unwrap();
    assert_eq!(current.version, VersionNumber(2));
    assert_eq!(
        current.to_string(),
        "Version: 2\nCommitted file: a.txt\nfixed\nmore detail"
    );
}

#[test]
fn test_show_unknown_version() {
    let (_tempdir, repo) = test_repo();
    assert!(matches!(
        repo.show_version(Some(VersionNumber(3))),
        Err(Error::InvalidVersion(_))
    ));
}

#[test]
fn test_history_window() {
    let (_tempdir, repo) = test_repo();
    let lines: Vec<String> = repo
        .list_history(2)
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(lines, vec!["1: msg.", "2: Committed file: a.txt"]);
}

#[test]
fn test_history_all() {
    let (_tempdir, repo) = test_repo();
    let all = repo.list_history(0).unwrap();
    assert_eq!(
        all.iter().map(|e| e.version).collect::<Vec<_>>(),
        vec![VersionNumber(0), VersionNumber(1), VersionNumber(2)]
    );
    assert_eq!(all[0].summary, INIT_MESSAGE);
    assert_eq!(repo.list_history(3).unwrap(), all);
    assert_eq!(repo.list_history(50).unwrap(), all);
}
