use std::{
    fs::File,
    io::{BufReader, ErrorKind, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::{error::Error, metadata::VersionNumber};

pub const REPO_METADATA_FILE: &str = "repo.json";
pub const VERSION_METADATA_FILE: &str = "meta.json";
pub const VERSION_FILES_DIR: &str = "files";

/// A wrapper for the path of the .gvt directory which knows where every record
/// and snapshot lives inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DotGvt {
    root: PathBuf,
}

impl DotGvt {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn repo_metadata_path(&self) -> PathBuf {
        self.root.join(REPO_METADATA_FILE)
    }

    pub fn version_dir(&self, version: VersionNumber) -> PathBuf {
        self.root.join(version.to_string())
    }

    pub fn version_metadata_path(&self, version: VersionNumber) -> PathBuf {
        self.version_dir(version).join(VERSION_METADATA_FILE)
    }

    pub fn version_files_dir(&self, version: VersionNumber) -> PathBuf {
        self.version_dir(version).join(VERSION_FILES_DIR)
    }

    pub fn version_file_path(&self, version: VersionNumber, file_name: &str) -> PathBuf {
        self.version_files_dir(version).join(file_name)
    }

    /// The control directory is a directory and holds a regular `repo.json`.
    pub fn is_initialized(&self) -> bool {
        self.root.is_dir() && self.repo_metadata_path().is_file()
    }

    /// Every numbered subdirectory, whether or not the repository record
    /// references it.
    pub fn version_dirs(&self) -> Result<Vec<VersionNumber>, Error> {
        let mut versions = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(n) = entry.file_name().to_str().and_then(|s| s.parse().ok()) {
                versions.push(VersionNumber(n));
            }
        }
        versions.sort();
        Ok(versions)
    }
}

pub fn read_json<A: for<'de> Deserialize<'de>>(path: &Path) -> Result<A, Error> {
    Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
}

/// Like [`read_json`], but a missing file is `None`.
pub fn read_json_opt<A: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<A>, Error> {
    match File::open(path) {
        Ok(f) => Ok(Some(serde_json::from_reader(BufReader::new(f))?)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Writes pretty JSON next to `path` and renames it into place, so readers
/// never observe a half written record.
pub fn write_json<A: Serialize>(thing: &A, path: &Path) -> Result<(), Error> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, thing)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[test]
fn test_layout() {
    let dot = DotGvt::new(PathBuf::from("/w/.gvt"));
    assert_eq!(dot.repo_metadata_path(), PathBuf::from("/w/.gvt/repo.json"));
    assert_eq!(
        dot.version_metadata_path(VersionNumber(3)),
        PathBuf::from("/w/.gvt/3/meta.json")
    );
    assert_eq!(
        dot.version_file_path(VersionNumber(3), "meta.json"),
        PathBuf::from("/w/.gvt/3/files/meta.json")
    );
}

#[test]
fn test_json_round_trip_replaces_existing() {
    let tempdir = tempfile::tempdir().unwrap();
    let path = tempdir.path().join("thing.json");
    write_json(&vec![1, 2, 3], &path).unwrap();
    write_json(&vec![4], &path).unwrap();
    let read: Vec<u32> = read_json(&path).unwrap();
    assert_eq!(read, vec![4]);
    let missing: Option<Vec<u32>> = read_json_opt(&tempdir.path().join("nope.json")).unwrap();
    assert!(missing.is_none());
}

#[test]
fn test_version_dirs_skips_non_numeric_entries() {
    let tempdir = tempfile::tempdir().unwrap();
    let dot = DotGvt::new(tempdir.path().to_path_buf());
    for name in ["0", "2", "10", "tmp"] {
        std::fs::create_dir(tempdir.path().join(name)).unwrap();
    }
    std::fs::write(dot.repo_metadata_path(), "{}").unwrap();
    assert_eq!(
        dot.version_dirs().unwrap(),
        vec![VersionNumber(0), VersionNumber(2), VersionNumber(10)]
    );
}
