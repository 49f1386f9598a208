use std::collections::BTreeSet;

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// The number identifying a version. Version `0` is created by `init` and every
/// mutating command appends the next number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VersionNumber(pub u32);

impl VersionNumber {
    pub const INITIAL: VersionNumber = VersionNumber(0);

    /// The following number, or `None` once `u32` is exhausted.
    pub fn next(self) -> Option<VersionNumber> {
        self.0.checked_add(1).map(VersionNumber)
    }
}

/// Repository level record, stored as `repo.json` in the control directory.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoMetadata {
    /// The highest version number ever created.
    pub latest_version: VersionNumber,
    /// The version used as the base of the next mutation.
    #[serde(default)]
    pub current_version: Option<VersionNumber>,
    /// Every version which exists.
    pub versions: BTreeSet<VersionNumber>,
}

impl RepoMetadata {
    pub fn new(version: VersionNumber) -> Self {
        Self {
            latest_version: version,
            current_version: Some(version),
            versions: BTreeSet::from([version]),
        }
    }

    /// Registers a freshly sealed version and makes it both latest and current.
    pub fn register(&mut self, version: VersionNumber) {
        self.versions.insert(version);
        self.latest_version = version;
        self.current_version = Some(version);
    }

    pub fn contains(&self, version: VersionNumber) -> bool {
        self.versions.contains(&version)
    }

    /// The current pointer, or the latest version when none is recorded.
    pub fn current_or_latest(&self) -> VersionNumber {
        self.current_version.unwrap_or(self.latest_version)
    }
}

/// A single version's record, stored as `<n>/meta.json`.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionMetadata {
    pub version: VersionNumber,
    /// Free text describing the change; the first line is the history summary.
    #[serde(default)]
    pub message: String,
    /// Base names of the files snapshotted by this version.
    #[serde(default)]
    pub tracked_files: BTreeSet<String>,
}

impl VersionMetadata {
    pub fn new(version: VersionNumber, message: impl Into<String>) -> Self {
        Self {
            version,
            message: message.into(),
            tracked_files: BTreeSet::new(),
        }
    }

    /// Starts the record of `version` from a copy of this version's tracked set
    /// and an empty message.
    pub fn successor(&self, version: VersionNumber) -> Self {
        Self {
            version,
            message: String::new(),
            tracked_files: self.tracked_files.clone(),
        }
    }

    pub fn tracks(&self, file_name: &str) -> bool {
        self.tracked_files.contains(file_name)
    }

    /// The message up to the first line break.
    pub fn summary(&self) -> &str {
        let line = self.message.split('\n').next().unwrap_or_default();
        line.strip_suffix('\r').unwrap_or(line)
    }
}

#[test]
fn test_next_version_number() {
    assert_eq!(VersionNumber(4).next(), Some(VersionNumber(5)));
    assert_eq!(VersionNumber(u32::MAX).next(), None);
}

#[test]
fn test_repo_metadata_json_field_names() {
    let mut repo = RepoMetadata::new(VersionNumber::INITIAL);
    repo.register(VersionNumber(1));
    let json = serde_json::to_value(&repo).unwrap();
    assert_eq!(json["latestVersion"], 1);
    assert_eq!(json["currentVersion"], 1);
    assert_eq!(json["versions"], serde_json::json!([0, 1]));
}

#[test]
fn test_repo_metadata_without_current_pointer() {
    let repo: RepoMetadata =
        serde_json::from_str(r#"{"latestVersion": 2, "versions": [0, 1, 2]}"#).unwrap();
    assert_eq!(repo.current_version, None);
    assert_eq!(repo.current_or_latest(), VersionNumber(2));
}

#[test]
fn test_successor_copies_tracked_files() {
    let mut first = VersionMetadata::new(VersionNumber(1), "Added file: a.txt");
    first.tracked_files.insert("a.txt".into());
    let mut second = first.successor(VersionNumber(2));
    second.tracked_files.insert("b.txt".into());
    assert_eq!(second.message, "");
    assert!(second.tracks("a.txt"));
    assert!(!first.tracks("b.txt"));
}

#[test]
fn test_summary_stops_at_line_break() {
    let meta = VersionMetadata::new(VersionNumber(3), "Committed file: a.txt\r\nfixed typo");
    assert_eq!(meta.summary(), "Committed file: a.txt");
    assert_eq!(VersionMetadata::new(VersionNumber(0), "").summary(), "");
}
