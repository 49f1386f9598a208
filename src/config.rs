use std::path::{Path, PathBuf};

/// Name of the control directory created by `init`.
pub const DEFAULT_CONTROL_DIR: &str = ".gvt";

/// Where a repository lives: the working directory holding the tracked files
/// and the name of the control directory inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub work_dir: PathBuf,
    pub control_dir_name: String,
}

impl Config {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            control_dir_name: DEFAULT_CONTROL_DIR.to_string(),
        }
    }

    /// Uses `cwd` when given, the process working directory otherwise.
    pub fn discover(cwd: Option<PathBuf>) -> std::io::Result<Self> {
        let work_dir = match cwd {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        Ok(Self::new(work_dir))
    }

    pub fn with_control_dir(mut self, name: impl Into<String>) -> Self {
        self.control_dir_name = name.into();
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn control_dir(&self) -> PathBuf {
        self.work_dir.join(&self.control_dir_name)
    }
}

#[test]
fn test_control_dir() {
    let config = Config::new("/work");
    assert_eq!(config.control_dir(), PathBuf::from("/work/.gvt"));
    let config = config.with_control_dir(".versions");
    assert_eq!(config.control_dir(), PathBuf::from("/work/.versions"));
}
