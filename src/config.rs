use crate::error::BackupError;
use crate::Result;
use std::path::{Path, PathBuf};

/// Immutable description of a single backup run, built once from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub jenkins_home: PathBuf,
    pub destination: PathBuf,
    pub include_plugins: bool,
    keep: Option<u32>,
}

impl Config {
    /// Build a validated configuration. A retention count of zero means unlimited.
    pub fn new(
        jenkins_home: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        include_plugins: bool,
        keep: Option<u32>,
    ) -> Result<Self> {
        let jenkins_home = jenkins_home.into();
        let destination = destination.into();

        if jenkins_home.as_os_str().is_empty() {
            return Err(BackupError::usage("Jenkins home path (-j) must not be empty"));
        }
        if destination.as_os_str().is_empty() {
            return Err(BackupError::usage("Destination path (-d) must not be empty"));
        }

        Ok(Config {
            jenkins_home,
            destination,
            include_plugins,
            keep: keep.filter(|&count| count > 0),
        })
    }

    /// Number of archives to keep, or `None` when pruning is disabled
    pub fn retention(&self) -> Option<u32> {
        self.keep
    }

    /// Directory the destination archive lives in
    pub fn destination_dir(&self) -> &Path {
        match self.destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}
