use std::path::Path;

use crate::{
    error::Result,
    metadata::{RepoMetadata, VersionMetadata, VersionNumber},
};

pub mod directory;
pub mod in_memory;

/// Durable mapping from version numbers to their records and file snapshots,
/// plus the single repository record.
pub trait VersionStore {
    /// Whether a repository record exists.
    fn is_initialized(&self) -> bool;

    /// Creates the empty control area; fails with `AlreadyInitialized` if it exists.
    fn create_control_dir(&mut self) -> Result<()>;

    /// Deletes the control area and everything in it. Missing storage is not
    /// an error.
    fn remove_control_dir(&mut self) -> Result<()>;

    fn load_repo_metadata(&self) -> Result<RepoMetadata>;

    fn save_repo_metadata(&mut self, data: &RepoMetadata) -> Result<()>;

    /// Fails with `VersionNotFound` when the version has no record.
    fn load_version_metadata(&self, version: VersionNumber) -> Result<VersionMetadata>;

    fn save_version_metadata(&mut self, data: &VersionMetadata) -> Result<()>;

    /// Allocates storage for `version`. An existing empty allocation is reused;
    /// anything else fails with `Conflict`.
    fn create_version_directory(&mut self, version: VersionNumber) -> Result<()>;

    /// Deletes everything stored for `version`. Missing storage is not an error.
    fn discard_version_directory(&mut self, version: VersionNumber) -> Result<()>;

    /// Every version with allocated storage, ascending.
    fn allocated_versions(&self) -> Result<Vec<VersionNumber>>;

    /// Copies the current bytes of `source` into `version` as `file_name`,
    /// overwriting any previous copy.
    fn copy_file_into_version(
        &mut self,
        version: VersionNumber,
        file_name: &str,
        source: &Path,
    ) -> Result<()>;

    /// Best effort removal of a snapshot copy; absence is not an error.
    fn remove_file_from_version(&mut self, version: VersionNumber, file_name: &str) -> Result<()>;

    /// The stored bytes of `file_name` in `version`, if present.
    fn read_file(&self, version: VersionNumber, file_name: &str) -> Result<Option<Vec<u8>>>;

    fn write_file(&mut self, version: VersionNumber, file_name: &str, bytes: &[u8]) -> Result<()>;

    /// Copies a snapshot from one version to another. Returns false when the
    /// source version holds no copy of the file.
    fn carry_file(
        &mut self,
        from: VersionNumber,
        to: VersionNumber,
        file_name: &str,
    ) -> Result<bool> {
        match self.read_file(from, file_name)? {
            Some(bytes) => {
                self.write_file(to, file_name, &bytes)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Writes the snapshot of `file_name` in `version` to `dest`. Returns false
    /// when the version holds no copy.
    fn restore_file(&self, version: VersionNumber, file_name: &str, dest: &Path) -> Result<bool> {
        match self.read_file(version, file_name)? {
            Some(bytes) => {
                std::fs::write(dest, bytes)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
