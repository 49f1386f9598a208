use std::{
    fs::{copy, create_dir, create_dir_all, read, read_dir, remove_dir_all, remove_file, write},
    io::ErrorKind,
    path::Path,
};

use crate::{
    dot_gvt::{read_json, read_json_opt, write_json, DotGvt},
    error::{Error, Result},
    metadata::{RepoMetadata, VersionMetadata, VersionNumber},
};

use super::VersionStore;

/// A persistent [`VersionStore`] inside the control directory, with one
/// numbered subdirectory per version holding `meta.json` and a `files/`
/// directory of snapshot copies.
#[derive(Debug, Clone)]
pub struct DirectoryVersionStore {
    dot: DotGvt,
}

impl DirectoryVersionStore {
    pub fn new(dot: DotGvt) -> Self {
        Self { dot }
    }

    pub fn dot(&self) -> &DotGvt {
        &self.dot
    }

    fn ensure_version_exists(&self, version: VersionNumber) -> Result<()> {
        if self.dot.version_dir(version).is_dir() {
            Ok(())
        } else {
            Err(Error::VersionNotFound(version))
        }
    }
}

impl VersionStore for DirectoryVersionStore {
    fn is_initialized(&self) -> bool {
        self.dot.is_initialized()
    }

    fn create_control_dir(&mut self) -> Result<()> {
        log::info!("creating control directory {:?}", self.dot.root());
        match create_dir(self.dot.root()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Err(Error::AlreadyInitialized),
            Err(err) => Err(err.into()),
        }
    }

    fn remove_control_dir(&mut self) -> Result<()> {
        log::info!("removing control directory {:?}", self.dot.root());
        match remove_dir_all(self.dot.root()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn load_repo_metadata(&self) -> Result<RepoMetadata> {
        log::debug!("reading repository record from {:?}", self.dot.root());
        if !self.dot.is_initialized() {
            return Err(Error::NotInitialized);
        }
        read_json(&self.dot.repo_metadata_path())
    }

    fn save_repo_metadata(&mut self, data: &RepoMetadata) -> Result<()> {
        log::debug!(
            "writing repository record, latest version {}",
            data.latest_version
        );
        write_json(data, &self.dot.repo_metadata_path())
    }

    fn load_version_metadata(&self, version: VersionNumber) -> Result<VersionMetadata> {
        log::debug!("reading record of version {}", version);
        read_json_opt(&self.dot.version_metadata_path(version))?
            .ok_or(Error::VersionNotFound(version))
    }

    fn save_version_metadata(&mut self, data: &VersionMetadata) -> Result<()> {
        log::debug!("writing record of version {}", data.version);
        self.ensure_version_exists(data.version)?;
        write_json(data, &self.dot.version_metadata_path(data.version))
    }

    fn create_version_directory(&mut self, version: VersionNumber) -> Result<()> {
        let dir = self.dot.version_dir(version);
        if dir.is_dir() {
            if read_dir(&dir)?.next().is_some() {
                return Err(Error::Conflict(version));
            }
            log::info!("reusing empty directory for version {}", version);
        } else if dir.exists() {
            return Err(Error::Conflict(version));
        } else {
            log::info!("creating directory for version {}", version);
        }
        create_dir_all(self.dot.version_files_dir(version))?;
        Ok(())
    }

    fn discard_version_directory(&mut self, version: VersionNumber) -> Result<()> {
        log::info!("discarding directory of version {}", version);
        match remove_dir_all(self.dot.version_dir(version)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn allocated_versions(&self) -> Result<Vec<VersionNumber>> {
        self.dot.version_dirs()
    }

    fn copy_file_into_version(
        &mut self,
        version: VersionNumber,
        file_name: &str,
        source: &Path,
    ) -> Result<()> {
        log::debug!("copying {:?} into version {} as {}", source, version, file_name);
        self.ensure_version_exists(version)?;
        if !source.is_file() {
            return Err(Error::NotFound(source.to_path_buf()));
        }
        copy(source, self.dot.version_file_path(version, file_name))?;
        Ok(())
    }

    fn remove_file_from_version(&mut self, version: VersionNumber, file_name: &str) -> Result<()> {
        log::debug!("removing {} from version {}", file_name, version);
        match remove_file(self.dot.version_file_path(version, file_name)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn read_file(&self, version: VersionNumber, file_name: &str) -> Result<Option<Vec<u8>>> {
        match read(self.dot.version_file_path(version, file_name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write_file(&mut self, version: VersionNumber, file_name: &str, bytes: &[u8]) -> Result<()> {
        self.ensure_version_exists(version)?;
        write(self.dot.version_file_path(version, file_name), bytes)?;
        Ok(())
    }

    fn carry_file(
        &mut self,
        from: VersionNumber,
        to: VersionNumber,
        file_name: &str,
    ) -> Result<bool> {
        let src = self.dot.version_file_path(from, file_name);
        if !src.is_file() {
            return Ok(false);
        }
        log::debug!("carrying {} from version {} to {}", file_name, from, to);
        copy(src, self.dot.version_file_path(to, file_name))?;
        Ok(true)
    }

    fn restore_file(&self, version: VersionNumber, file_name: &str, dest: &Path) -> Result<bool> {
        let src = self.dot.version_file_path(version, file_name);
        if !src.is_file() {
            return Ok(false);
        }
        log::debug!("restoring {} of version {} to {:?}", file_name, version, dest);
        copy(src, dest)?;
        Ok(true)
    }
}

#[cfg(test)]
fn test_store() -> (tempfile::TempDir, DirectoryVersionStore) {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = DirectoryVersionStore::new(DotGvt::new(tempdir.path().join(".gvt")));
    store.create_control_dir().unwrap();
    store
        .save_repo_metadata(&RepoMetadata::new(VersionNumber::INITIAL))
        .unwrap();
    (tempdir, store)
}

#[test]
fn test_directory_version_store() {
    let (tempdir, mut store) = test_store();
    let v = VersionNumber(0);
    store.create_version_directory(v).unwrap();
    let mut meta = VersionMetadata::new(v, "GVT initialized.");
    meta.tracked_files.insert("a.txt".into());
    store.save_version_metadata(&meta).unwrap();
    assert_eq!(store.load_version_metadata(v).unwrap(), meta);

    let source = tempdir.path().join("a.txt");
    std::fs::write(&source, b"hello, world").unwrap();
    store.copy_file_into_version(v, "a.txt", &source).unwrap();
    assert_eq!(store.read_file(v, "a.txt").unwrap(), Some(b"hello, world".to_vec()));

    store.remove_file_from_version(v, "a.txt").unwrap();
    store.remove_file_from_version(v, "a.txt").unwrap();
    assert_eq!(store.read_file(v, "a.txt").unwrap(), None);
}

#[test]
fn test_create_control_dir_twice() {
    let (_tempdir, mut store) = test_store();
    assert!(store.is_initialized());
    assert!(matches!(
        store.create_control_dir(),
        Err(Error::AlreadyInitialized)
    ));
}

#[test]
fn test_remove_control_dir() {
    let (_tempdir, mut store) = test_store();
    store.create_version_directory(VersionNumber(0)).unwrap();
    store.remove_control_dir().unwrap();
    assert!(!store.dot().root().exists());
    assert!(!store.is_initialized());
    store.remove_control_dir().unwrap();
    store.create_control_dir().unwrap();
}

#[test]
fn test_create_version_directory_conflict() {
    let (tempdir, mut store) = test_store();
    let v = VersionNumber(1);
    std::fs::create_dir(store.dot().version_dir(v)).unwrap();
    store.create_version_directory(v).unwrap();

    let source = tempdir.path().join("a.txt");
    std::fs::write(&source, b"x").unwrap();
    store.copy_file_into_version(v, "a.txt", &source).unwrap();
    assert!(matches!(
        store.create_version_directory(v),
        Err(Error::Conflict(n)) if n == v
    ));
}

#[test]
fn test_missing_version_and_source() {
    let (tempdir, mut store) = test_store();
    assert!(matches!(
        store.load_version_metadata(VersionNumber(5)),
        Err(Error::VersionNotFound(_))
    ));
    store.create_version_directory(VersionNumber(0)).unwrap();
    assert!(matches!(
        store.copy_file_into_version(VersionNumber(0), "gone.txt", &tempdir.path().join("gone.txt")),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        store.copy_file_into_version(VersionNumber(0), "dir", tempdir.path()),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_corrupt_repo_metadata() {
    let (_tempdir, store) = test_store();
    std::fs::write(store.dot().repo_metadata_path(), "not json").unwrap();
    assert!(matches!(store.load_repo_metadata(), Err(Error::Storage(_))));
}
