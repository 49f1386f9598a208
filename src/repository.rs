use std::path::{Path, PathBuf};

use crate::{
    config::Config,
    dot_gvt::DotGvt,
    error::{Error, Result},
    metadata::{RepoMetadata, VersionMetadata, VersionNumber},
    version_store::{directory::DirectoryVersionStore, VersionStore},
};

/// Message of version `0`.
pub const INIT_MESSAGE: &str = "GVT initialized.";

/// The result of a mutating command that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A new version was sealed.
    Created(VersionNumber),
    /// `add` of a file the current version already tracks.
    AlreadyTracked,
    /// `detach` or `commit` of a file the current version does not track.
    NotTracked,
}

/// A handle on an initialized repository.
///
/// The handle carries the repository record it last wrote or read; every
/// operation takes it explicitly and mutating ones update it only once the
/// store has accepted the change.
#[derive(Debug)]
pub struct Repository<S: VersionStore> {
    store: S,
    work_dir: PathBuf,
    metadata: RepoMetadata,
}

impl Repository<DirectoryVersionStore> {
    /// Creates the control directory described by `config` with version `0`.
    pub fn init(config: &Config) -> Result<Self> {
        let store = DirectoryVersionStore::new(DotGvt::new(config.control_dir()));
        Self::initialize(store, config.work_dir(), INIT_MESSAGE)
    }

    pub fn open(config: &Config) -> Result<Self> {
        let store = DirectoryVersionStore::new(DotGvt::new(config.control_dir()));
        Self::open_with(store, config.work_dir())
    }
}

impl<S: VersionStore> Repository<S> {
    /// Creates version `0` with no tracked files and the given message.
    pub fn initialize(mut store: S, work_dir: impl Into<PathBuf>, message: &str) -> Result<Self> {
        if store.is_initialized() {
            return Err(Error::AlreadyInitialized);
        }
        store.create_control_dir()?;
        let version = VersionNumber::INITIAL;
        let metadata = RepoMetadata::new(version);
        if let Err(err) = populate_initial(&mut store, &metadata, message) {
            if let Err(cleanup) = store.remove_control_dir() {
                log::warn!("could not remove partial control directory: {}", cleanup);
            }
            return Err(err);
        }
        log::info!("initialized repository at version {}", version);
        Ok(Self {
            store,
            work_dir: work_dir.into(),
            metadata,
        })
    }

    pub fn open_with(store: S, work_dir: impl Into<PathBuf>) -> Result<Self> {
        if !store.is_initialized() {
            return Err(Error::NotInitialized);
        }
        let metadata = store.load_repo_metadata()?;
        let repo = Self {
            store,
            work_dir: work_dir.into(),
            metadata,
        };
        let orphans = repo.orphaned_versions()?;
        if !orphans.is_empty() {
            log::warn!(
                "found version directories not referenced by the repository: {:?}",
                orphans
            );
        }
        Ok(repo)
    }

    pub fn metadata(&self) -> &RepoMetadata {
        &self.metadata
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn latest_version(&self) -> VersionNumber {
        self.metadata.latest_version
    }

    pub fn current_version(&self) -> VersionNumber {
        self.metadata.current_or_latest()
    }

    /// The record of the version the next mutation is based on.
    pub fn current_metadata(&self) -> Result<VersionMetadata> {
        self.store.load_version_metadata(self.current_version())
    }

    /// Allocates `latest + 1`, carries every file tracked by the latest version
    /// into it and hands back the unsealed version for further changes.
    pub fn derive_next_version(&mut self) -> Result<PendingVersion<'_, S>> {
        let base = self.metadata.latest_version;
        let version = base.next().ok_or(Error::Exhausted(base))?;
        let base_metadata = self.store.load_version_metadata(base)?;
        self.store.create_version_directory(version)?;

        let mut pending = PendingVersion {
            metadata: base_metadata.successor(version),
            repo: self,
            sealed: false,
        };
        for file_name in &base_metadata.tracked_files {
            if !pending.repo.store.carry_file(base, version, file_name)? {
                log::warn!(
                    "version {} tracks {} but holds no copy of it",
                    base,
                    file_name
                );
            }
        }
        Ok(pending)
    }

    /// Starts tracking the file at `path` in a new version.
    pub fn add_file(&mut self, path: &Path, message: &str) -> Result<Outcome> {
        let source = self.resolve_source(path)?;
        let file_name = file_name_of(path)?;
        if self.current_metadata()?.tracks(&file_name) {
            log::info!("{} is already tracked", file_name);
            return Ok(Outcome::AlreadyTracked);
        }

        let mut pending = self.derive_next_version()?;
        pending.track_file(&file_name, &source)?;
        if message.is_empty() {
            pending.append_message(&format!("Added file: {}", file_name));
        } else {
            pending.append_message(&format!("{}.", message));
        }
        pending.seal().map(Outcome::Created)
    }

    /// Stops tracking `path` as of a new version.
    pub fn detach_file(&mut self, path: &Path, message: &str) -> Result<Outcome> {
        let file_name = file_name_of(path)?;
        if !self.current_metadata()?.tracks(&file_name) {
            log::info!("{} is not tracked", file_name);
            return Ok(Outcome::NotTracked);
        }

        let mut pending = self.derive_next_version()?;
        pending.untrack_file(&file_name)?;
        pending.append_message(&with_user_message(
            format!("Detached file: {}", file_name),
            message,
        ));
        pending.seal().map(Outcome::Created)
    }

    /// Snapshots the latest contents of an already tracked file into a new
    /// version.
    pub fn commit_file(&mut self, path: &Path, message: &str) -> Result<Outcome> {
        let source = self.resolve_source(path)?;
        let file_name = file_name_of(path)?;
        if !self.current_metadata()?.tracks(&file_name) {
            log::info!("{} is not tracked", file_name);
            return Ok(Outcome::NotTracked);
        }

        let mut pending = self.derive_next_version()?;
        pending.track_file(&file_name, &source)?;
        pending.append_message(&with_user_message(
            format!("Committed file: {}", file_name),
            message,
        ));
        pending.seal().map(Outcome::Created)
    }

    /// Copies every file tracked by `version` into the working directory,
    /// overwriting what is there. Neither version pointer moves.
    pub fn checkout(&self, version: VersionNumber) -> Result<Vec<String>> {
        if !self.metadata.contains(version) {
            return Err(Error::InvalidVersion(version));
        }
        let metadata = self.store.load_version_metadata(version)?;
        let mut restored = Vec::with_capacity(metadata.tracked_files.len());
        for file_name in &metadata.tracked_files {
            let dest = self.work_dir.join(file_name);
            if self.store.restore_file(version, file_name, &dest)? {
                restored.push(file_name.clone());
            } else {
                log::warn!("version {} holds no copy of {}, skipping", version, file_name);
            }
        }
        log::info!("checked out version {}", version);
        Ok(restored)
    }

    /// Allocated version storage the repository record does not reference,
    /// typically left behind by a crash before a version was sealed.
    pub fn orphaned_versions(&self) -> Result<Vec<VersionNumber>> {
        Ok(self
            .store
            .allocated_versions()?
            .into_iter()
            .filter(|v| !self.metadata.contains(*v))
            .collect())
    }

    /// Deletes every orphaned version and returns their numbers.
    pub fn recover(&mut self) -> Result<Vec<VersionNumber>> {
        let orphans = self.orphaned_versions()?;
        for version in &orphans {
            self.store.discard_version_directory(*version)?;
        }
        Ok(orphans)
    }

    fn resolve_source(&self, path: &Path) -> Result<PathBuf> {
        let source = self.work_dir.join(path);
        if source.is_file() {
            Ok(source)
        } else {
            Err(Error::NotFound(path.to_path_buf()))
        }
    }
}

/// A version allocated by [`Repository::derive_next_version`] but not yet
/// registered. Dropping it without [`PendingVersion::seal`] discards its
/// storage.
pub struct PendingVersion<'a, S: VersionStore> {
    repo: &'a mut Repository<S>,
    metadata: VersionMetadata,
    sealed: bool,
}

impl<'a, S: VersionStore> PendingVersion<'a, S> {
    pub fn version(&self) -> VersionNumber {
        self.metadata.version
    }

    pub fn metadata(&self) -> &VersionMetadata {
        &self.metadata
    }

    /// Copies `source` into this version as `file_name` and tracks it.
    pub fn track_file(&mut self, file_name: &str, source: &Path) -> Result<()> {
        self.repo
            .store
            .copy_file_into_version(self.metadata.version, file_name, source)?;
        self.metadata.tracked_files.insert(file_name.to_string());
        Ok(())
    }

    pub fn untrack_file(&mut self, file_name: &str) -> Result<()> {
        self.metadata.tracked_files.remove(file_name);
        self.repo
            .store
            .remove_file_from_version(self.metadata.version, file_name)
    }

    pub fn append_message(&mut self, text: &str) {
        self.metadata.message.push_str(text);
    }

    /// Persists the version record, then the repository record, making the
    /// version both latest and current.
    pub fn seal(mut self) -> Result<VersionNumber> {
        let version = self.metadata.version;
        self.repo.store.save_version_metadata(&self.metadata)?;
        let mut next = self.repo.metadata.clone();
        next.register(version);
        self.repo.store.save_repo_metadata(&next)?;
        self.repo.metadata = next;
        self.sealed = true;
        log::info!("sealed version {}", version);
        Ok(version)
    }
}

impl<S: VersionStore> Drop for PendingVersion<'_, S> {
    fn drop(&mut self) {
        if self.sealed {
            return;
        }
        let version = self.metadata.version;
        if let Err(err) = self.repo.store.discard_version_directory(version) {
            log::warn!("could not discard unsealed version {}: {}", version, err);
        }
    }
}

/// Writes version `0` and the repository record into a fresh control area.
fn populate_initial<S: VersionStore>(
    store: &mut S,
    metadata: &RepoMetadata,
    message: &str,
) -> Result<()> {
    let version = metadata.latest_version;
    store.create_version_directory(version)?;
    store.save_version_metadata(&VersionMetadata::new(version, message))?;
    store.save_repo_metadata(metadata)
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::NotFound(path.to_path_buf()))
}

fn with_user_message(header: String, message: &str) -> String {
    if message.is_empty() {
        header
    } else {
        format!("{}\n{}", header, message)
    }
}

#[cfg(test)]
use crate::version_store::in_memory::InMemoryVersionStore;

#[cfg(test)]
fn test_repo() -> (tempfile::TempDir, Repository<InMemoryVersionStore>) {
    let tempdir = tempfile::tempdir().unwrap();
    let repo =
        Repository::initialize(InMemoryVersionStore::new(), tempdir.path(), INIT_MESSAGE).unwrap();
    (tempdir, repo)
}

#[cfg(test)]
fn write(dir: &tempfile::TempDir, name: &str, contents: &str) {
    std::fs::write(dir.path().join(name), contents).unwrap();
}

#[test]
fn test_initialize() {
    let (_tempdir, repo) = test_repo();
    assert_eq!(repo.latest_version(), VersionNumber(0));
    assert_eq!(repo.current_version(), VersionNumber(0));
    let meta = repo.current_metadata().unwrap();
    assert_eq!(meta.message, INIT_MESSAGE);
    assert!(meta.tracked_files.is_empty());
}

#[test]
fn test_initialize_twice() {
    let (tempdir, repo) = test_repo();
    let store = repo.store().clone();
    assert!(matches!(
        Repository::initialize(store, tempdir.path(), INIT_MESSAGE),
        Err(Error::AlreadyInitialized)
    ));
}

#[test]
fn test_open_uninitialized() {
    assert!(matches!(
        Repository::open_with(InMemoryVersionStore::new(), "."),
        Err(Error::NotInitialized)
    ));
}

#[test]
fn test_version_chain_has_no_gaps() {
    let (tempdir, mut repo) = test_repo();
    write(&tempdir, "a.txt", "a");
    write(&tempdir, "b.txt", "b");
    let steps = [
        repo.add_file(Path::new("a.txt"), "").unwrap(),
        repo.add_file(Path::new("b.txt"), "").unwrap(),
        repo.commit_file(Path::new("a.txt"), "").unwrap(),
        repo.detach_file(Path::new("b.txt"), "").unwrap(),
    ];
    for (i, outcome) in steps.iter().enumerate() {
        assert_eq!(*outcome, Outcome::Created(VersionNumber(i as u32 + 1)));
    }
    let versions: Vec<_> = repo.metadata().versions.iter().copied().collect();
    assert_eq!(versions, (0..=4).map(VersionNumber).collect::<Vec<_>>());
    assert_eq!(repo.current_version(), repo.latest_version());
}

#[test]
fn test_add_messages_and_tracking() {
    let (tempdir, mut repo) = test_repo();
    write(&tempdir, "a.txt", "a");
    write(&tempdir, "b.txt", "b");
    repo.add_file(Path::new("a.txt"), "").unwrap();
    repo.add_file(Path::new("b.txt"), "first draft").unwrap();

    let first = repo.store().load_version_metadata(VersionNumber(1)).unwrap();
    assert_eq!(first.message, "Added file: a.txt");
    let second = repo.current_metadata().unwrap();
    assert_eq!(second.message, "first draft.");
    assert!(second.tracks("a.txt") && second.tracks("b.txt"));
    assert!(!first.tracks("b.txt"));
}

#[test]
fn test_add_already_tracked_does_not_advance() {
    let (tempdir, mut repo) = test_repo();
    write(&tempdir, "a.txt", "a");
    repo.add_file(Path::new("a.txt"), "").unwrap();
    assert_eq!(
        repo.add_file(Path::new("a.txt"), "again").unwrap(),
        Outcome::AlreadyTracked
    );
    assert_eq!(repo.latest_version(), VersionNumber(1));
}

#[test]
fn test_missing_sources_are_not_found() {
    let (tempdir, mut repo) = test_repo();
    assert!(matches!(
        repo.add_file(Path::new("nope.txt"), ""),
        Err(Error::NotFound(_))
    ));
    std::fs::create_dir(tempdir.path().join("dir")).unwrap();
    assert!(matches!(
        repo.add_file(Path::new("dir"), ""),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        repo.commit_file(Path::new("nope.txt"), ""),
        Err(Error::NotFound(_))
    ));
    assert_eq!(repo.latest_version(), VersionNumber(0));
    assert_eq!(repo.store().allocated_versions().unwrap(), vec![VersionNumber(0)]);
}

#[test]
fn test_untracked_detach_and_commit_are_informational() {
    let (tempdir, mut repo) = test_repo();
    write(&tempdir, "a.txt", "a");
    assert_eq!(
        repo.detach_file(Path::new("a.txt"), "").unwrap(),
        Outcome::NotTracked
    );
    assert_eq!(
        repo.commit_file(Path::new("a.txt"), "").unwrap(),
        Outcome::NotTracked
    );
    assert_eq!(repo.latest_version(), VersionNumber(0));
}

#[test]
fn test_detach_and_commit_messages() {
    let (tempdir, mut repo) = test_repo();
    write(&tempdir, "a.txt", "a");
    repo.add_file(Path::new("a.txt"), "").unwrap();
    write(&tempdir, "a.txt", "a2");
    repo.commit_file(Path::new("a.txt"), "second line").unwrap();
    assert_eq!(
        repo.current_metadata().unwrap().message,
        "Committed file: a.txt\nsecond line"
    );
    repo.detach_file(Path::new("a.txt"), "").unwrap();
    let detached = repo.current_metadata().unwrap();
    assert_eq!(detached.message, "Detached file: a.txt");
    assert!(detached.tracked_files.is_empty());
    assert_eq!(
        repo.store().read_file(VersionNumber(3), "a.txt").unwrap(),
        None
    );
}

#[test]
fn test_commit_snapshots_latest_bytes() {
    let (tempdir, mut repo) = test_repo();
    write(&tempdir, "a.txt", "one");
    repo.add_file(Path::new("a.txt"), "").unwrap();
    write(&tempdir, "a.txt", "two");
    repo.commit_file(Path::new("a.txt"), "").unwrap();

    repo.checkout(VersionNumber(1)).unwrap();
    assert_eq!(std::fs::read_to_string(tempdir.path().join("a.txt")).unwrap(), "one");
    repo.checkout(VersionNumber(2)).unwrap();
    assert_eq!(std::fs::read_to_string(tempdir.path().join("a.txt")).unwrap(), "two");
    assert_eq!(repo.current_version(), VersionNumber(2));
}

#[test]
fn test_untouched_files_carry_forward() {
    let (tempdir, mut repo) = test_repo();
    write(&tempdir, "a.txt", "alpha");
    write(&tempdir, "b.txt", "beta");
    repo.add_file(Path::new("a.txt"), "").unwrap();
    repo.add_file(Path::new("b.txt"), "").unwrap();
    write(&tempdir, "a.txt", "changed but never committed");

    repo.checkout(VersionNumber(1)).unwrap();
    let at_one = std::fs::read(tempdir.path().join("a.txt")).unwrap();
    repo.checkout(VersionNumber(2)).unwrap();
    let at_two = std::fs::read(tempdir.path().join("a.txt")).unwrap();
    assert_eq!(at_one, at_two);
    assert_eq!(at_two, b"alpha");
}

#[test]
fn test_detached_file_is_never_restored() {
    let (tempdir, mut repo) = test_repo();
    write(&tempdir, "a.txt", "a");
    write(&tempdir, "b.txt", "b");
    repo.add_file(Path::new("a.txt"), "").unwrap();
    repo.detach_file(Path::new("a.txt"), "").unwrap();
    repo.add_file(Path::new("b.txt"), "").unwrap();
    std::fs::remove_file(tempdir.path().join("a.txt")).unwrap();

    for v in [2, 3] {
        let restored = repo.checkout(VersionNumber(v)).unwrap();
        assert!(!restored.contains(&"a.txt".to_string()));
        assert!(!tempdir.path().join("a.txt").exists());
    }
}

#[test]
fn test_checkout_invalid_version_changes_nothing() {
    let (tempdir, mut repo) = test_repo();
    write(&tempdir, "a.txt", "a");
    repo.add_file(Path::new("a.txt"), "").unwrap();
    write(&tempdir, "a.txt", "edited");
    let before = repo.metadata().clone();

    assert!(matches!(
        repo.checkout(VersionNumber(9)),
        Err(Error::InvalidVersion(v)) if v == VersionNumber(9)
    ));
    assert_eq!(repo.metadata(), &before);
    assert_eq!(
        std::fs::read_to_string(tempdir.path().join("a.txt")).unwrap(),
        "edited"
    );
}

#[test]
fn test_failed_derivation_leaves_no_trace() {
    let (tempdir, mut repo) = test_repo();
    {
        let mut pending = repo.derive_next_version().unwrap();
        assert_eq!(pending.version(), VersionNumber(1));
        assert!(pending
            .track_file("gone.txt", &tempdir.path().join("gone.txt"))
            .is_err());
    }
    assert_eq!(repo.latest_version(), VersionNumber(0));
    assert!(repo.orphaned_versions().unwrap().is_empty());
    assert_eq!(repo.store().allocated_versions().unwrap(), vec![VersionNumber(0)]);
}

#[test]
fn test_directory_repository_recovers_orphans() {
    let tempdir = tempfile::tempdir().unwrap();
    let config = Config::new(tempdir.path());
    let mut repo = Repository::init(&config).unwrap();
    assert!(matches!(Repository::init(&config), Err(Error::AlreadyInitialized)));

    let orphan = config.control_dir().join("1");
    std::fs::create_dir_all(orphan.join("files")).unwrap();
    write(&tempdir, "a.txt", "a");
    assert!(matches!(
        repo.add_file(Path::new("a.txt"), ""),
        Err(Error::Conflict(v)) if v == VersionNumber(1)
    ));
    assert!(orphan.exists());

    let mut repo = Repository::open(&config).unwrap();
    assert_eq!(repo.orphaned_versions().unwrap(), vec![VersionNumber(1)]);
    assert_eq!(repo.recover().unwrap(), vec![VersionNumber(1)]);
    assert_eq!(
        repo.add_file(Path::new("a.txt"), "").unwrap(),
        Outcome::Created(VersionNumber(1))
    );

    let reopened = Repository::open(&config).unwrap();
    assert_eq!(reopened.latest_version(), VersionNumber(1));
    assert!(reopened.current_metadata().unwrap().tracks("a.txt"));
}

/// Shares one in-memory store between handles and fails the next repository
/// record write when asked to.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
struct SharedStore {
    inner: std::rc::Rc<std::cell::RefCell<InMemoryVersionStore>>,
    fail_repo_save: std::rc::Rc<std::cell::Cell<bool>>,
}

#[cfg(test)]
impl VersionStore for SharedStore {
    fn is_initialized(&self) -> bool {
        self.inner.borrow().is_initialized()
    }

    fn create_control_dir(&mut self) -> Result<()> {
        self.inner.borrow_mut().create_control_dir()
    }

    fn remove_control_dir(&mut self) -> Result<()> {
        self.inner.borrow_mut().remove_control_dir()
    }

    fn load_repo_metadata(&self) -> Result<RepoMetadata> {
        self.inner.borrow().load_repo_metadata()
    }

    fn save_repo_metadata(&mut self, data: &RepoMetadata) -> Result<()> {
        if self.fail_repo_save.replace(false) {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into());
        }
        self.inner.borrow_mut().save_repo_metadata(data)
    }

    fn load_version_metadata(&self, version: VersionNumber) -> Result<VersionMetadata> {
        self.inner.borrow().load_version_metadata(version)
    }

    fn save_version_metadata(&mut self, data: &VersionMetadata) -> Result<()> {
        self.inner.borrow_mut().save_version_metadata(data)
    }

    fn create_version_directory(&mut self, version: VersionNumber) -> Result<()> {
        self.inner.borrow_mut().create_version_directory(version)
    }

    fn discard_version_directory(&mut self, version: VersionNumber) -> Result<()> {
        self.inner.borrow_mut().discard_version_directory(version)
    }

    fn allocated_versions(&self) -> Result<Vec<VersionNumber>> {
        self.inner.borrow().allocated_versions()
    }

    fn copy_file_into_version(
        &mut self,
        version: VersionNumber,
        file_name: &str,
        source: &Path,
    ) -> Result<()> {
        self.inner
            .borrow_mut()
            .copy_file_into_version(version, file_name, source)
    }

    fn remove_file_from_version(&mut self, version: VersionNumber, file_name: &str) -> Result<()> {
        self.inner
            .borrow_mut()
            .remove_file_from_version(version, file_name)
    }

    fn read_file(&self, version: VersionNumber, file_name: &str) -> Result<Option<Vec<u8>>> {
        self.inner.borrow().read_file(version, file_name)
    }

    fn write_file(&mut self, version: VersionNumber, file_name: &str, bytes: &[u8]) -> Result<()> {
        self.inner.borrow_mut().write_file(version, file_name, bytes)
    }
}

#[test]
fn test_failed_initialize_can_be_retried() {
    let store = SharedStore::default();
    store.fail_repo_save.set(true);
    assert!(matches!(
        Repository::initialize(store.clone(), ".", INIT_MESSAGE),
        Err(Error::Io(_))
    ));
    assert!(!store.is_initialized());
    assert!(store.allocated_versions().unwrap().is_empty());
    assert!(matches!(
        Repository::open_with(store.clone(), "."),
        Err(Error::NotInitialized)
    ));

    let repo = Repository::initialize(store.clone(), ".", INIT_MESSAGE).unwrap();
    assert_eq!(repo.latest_version(), VersionNumber(0));
    assert!(Repository::open_with(store, ".").is_ok());
}

#[test]
fn test_exhausted_version_numbers() {
    let (_tempdir, mut repo) = test_repo();
    repo.metadata.latest_version = VersionNumber(u32::MAX);
    repo.metadata.versions.insert(VersionNumber(u32::MAX));
    assert!(matches!(
        repo.derive_next_version(),
        Err(Error::Exhausted(v)) if v == VersionNumber(u32::MAX)
    ));
    assert_eq!(repo.store().allocated_versions().unwrap(), vec![VersionNumber(0)]);
}
