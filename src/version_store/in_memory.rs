use std::{collections::BTreeMap, path::Path};

use crate::{
    error::{Error, Result},
    metadata::{RepoMetadata, VersionMetadata, VersionNumber},
};

use super::VersionStore;

#[derive(Debug, Default, Clone)]
struct StoredVersion {
    metadata: Option<VersionMetadata>,
    files: BTreeMap<String, Vec<u8>>,
}

/// A [`VersionStore`] that keeps everything in memory. Source files are still
/// read from, and checkouts still written to, the real filesystem.
#[derive(Debug, Default, Clone)]
pub struct InMemoryVersionStore {
    control_dir: bool,
    repo: Option<RepoMetadata>,
    versions: BTreeMap<VersionNumber, StoredVersion>,
}

impl InMemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn version_mut(&mut self, version: VersionNumber) -> Result<&mut StoredVersion> {
        self.versions
            .get_mut(&version)
            .ok_or(Error::VersionNotFound(version))
    }
}

impl VersionStore for InMemoryVersionStore {
    fn is_initialized(&self) -> bool {
        self.control_dir && self.repo.is_some()
    }

    fn create_control_dir(&mut self) -> Result<()> {
        if self.control_dir {
            return Err(Error::AlreadyInitialized);
        }
        self.control_dir = true;
        Ok(())
    }

    fn remove_control_dir(&mut self) -> Result<()> {
        *self = Self::default();
        Ok(())
    }

    fn load_repo_metadata(&self) -> Result<RepoMetadata> {
        match (&self.repo, self.control_dir) {
            (Some(repo), true) => Ok(repo.clone()),
            _ => Err(Error::NotInitialized),
        }
    }

    fn save_repo_metadata(&mut self, data: &RepoMetadata) -> Result<()> {
        if !self.control_dir {
            return Err(Error::NotInitialized);
        }
        self.repo = Some(data.clone());
        Ok(())
    }

    fn load_version_metadata(&self, version: VersionNumber) -> Result<VersionMetadata> {
        self.versions
            .get(&version)
            .and_then(|v| v.metadata.clone())
            .ok_or(Error::VersionNotFound(version))
    }

    fn save_version_metadata(&mut self, data: &VersionMetadata) -> Result<()> {
        self.version_mut(data.version)?.metadata = Some(data.clone());
        Ok(())
    }

    fn create_version_directory(&mut self, version: VersionNumber) -> Result<()> {
        let occupied = self
            .versions
            .get(&version)
            .map_or(false, |v| v.metadata.is_some() || !v.files.is_empty());
        if occupied {
            return Err(Error::Conflict(version));
        }
        self.versions.insert(version, StoredVersion::default());
        Ok(())
    }

    fn discard_version_directory(&mut self, version: VersionNumber) -> Result<()> {
        self.versions.remove(&version);
        Ok(())
    }

    fn allocated_versions(&self) -> Result<Vec<VersionNumber>> {
        Ok(self.versions.keys().copied().collect())
    }

    fn copy_file_into_version(
        &mut self,
        version: VersionNumber,
        file_name: &str,
        source: &Path,
    ) -> Result<()> {
        if !source.is_file() {
            return Err(Error::NotFound(source.to_path_buf()));
        }
        let bytes = std::fs::read(source)?;
        self.write_file(version, file_name, &bytes)
    }

    fn remove_file_from_version(&mut self, version: VersionNumber, file_name: &str) -> Result<()> {
        if let Some(v) = self.versions.get_mut(&version) {
            v.files.remove(file_name);
        }
        Ok(())
    }

    fn read_file(&self, version: VersionNumber, file_name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .versions
            .get(&version)
            .and_then(|v| v.files.get(file_name).cloned()))
    }

    fn write_file(&mut self, version: VersionNumber, file_name: &str, bytes: &[u8]) -> Result<()> {
        self.version_mut(version)?
            .files
            .insert(file_name.to_string(), Vec::from(bytes));
        Ok(())
    }
}

#[test]
fn test_in_memory_version_store() {
    let mut store = InMemoryVersionStore::new();
    assert!(!store.is_initialized());
    store.create_control_dir().unwrap();
    store
        .save_repo_metadata(&RepoMetadata::new(VersionNumber::INITIAL))
        .unwrap();
    assert!(store.is_initialized());

    let v = VersionNumber(0);
    store.create_version_directory(v).unwrap();
    store.write_file(v, "a.txt", b"hello, world").unwrap();
    assert!(matches!(
        store.create_version_directory(v),
        Err(Error::Conflict(_))
    ));
    store.create_version_directory(VersionNumber(1)).unwrap();
    assert!(store.carry_file(v, VersionNumber(1), "a.txt").unwrap());
    assert!(!store.carry_file(v, VersionNumber(1), "b.txt").unwrap());
    assert_eq!(
        store.read_file(VersionNumber(1), "a.txt").unwrap(),
        Some(b"hello, world".to_vec())
    );
    assert_eq!(
        store.allocated_versions().unwrap(),
        vec![VersionNumber(0), VersionNumber(1)]
    );
}
