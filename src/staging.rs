use crate::error::BackupError;
use crate::naming::{TEMP_ARCHIVE_NAME, WORK_DIR_NAME};
use crate::utils::io_error_at;
use crate::Result;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

/// How long the signal handler waits for the backup to stop and remove its own staging area
const INTERRUPT_GRACE: Duration = Duration::from_secs(10);
const RELEASE_POLL: Duration = Duration::from_millis(50);

/// Work directories that must be removed if the process is interrupted.
///
/// Shared between the backup run and the Ctrl-C/SIGTERM handler.
#[derive(Clone)]
pub struct CleanupRegistry {
    interrupt_flag: Arc<AtomicBool>,
    active: Arc<Mutex<HashSet<PathBuf>>>,
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self {
            interrupt_flag: Arc::new(AtomicBool::new(false)),
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Check if an interrupt has been requested
    pub fn is_interrupted(&self) -> bool {
        self.interrupt_flag.load(Ordering::SeqCst)
    }

    pub fn set_interrupted(&self, interrupted: bool) {
        self.interrupt_flag.store(interrupted, Ordering::SeqCst);
    }

    /// Fail with `BackupError::Interrupted` once an interrupt has been requested
    pub fn check_interrupted(&self) -> Result<()> {
        if self.is_interrupted() {
            Err(BackupError::Interrupted)
        } else {
            Ok(())
        }
    }

    pub fn register(&self, path: PathBuf) {
        if let Ok(mut active) = self.active.lock() {
            active.insert(path);
        }
    }

    pub fn release(&self, path: &Path) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(path);
        }
    }

    /// Get a snapshot of the registered directories
    pub fn active_paths(&self) -> Vec<PathBuf> {
        self.active
            .lock()
            .map(|active| active.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Wait until every registered directory has been released.
    ///
    /// Returns false if some are still registered after `timeout`.
    pub fn wait_until_released(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.active_paths().is_empty() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(RELEASE_POLL);
        }
    }

    /// Remove every registered directory and clear the registry
    pub fn cleanup_all(&self, silent: bool) {
        for path in self.active_paths() {
            match remove_dir_if_present(&path) {
                Ok(true) if !silent => {
                    eprintln!("Cleaned up staging area: {}", path.display());
                }
                Err(e) if !silent => {
                    eprintln!(
                        "Warning: Could not clean up staging area {}: {e}",
                        path.display()
                    );
                }
                _ => {}
            }
        }

        if let Ok(mut active) = self.active.lock() {
            active.clear();
        }
    }
}

impl Default for CleanupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_REGISTRY: OnceLock<CleanupRegistry> = OnceLock::new();

/// Process-wide registry used by the signal handler
pub fn global_registry() -> &'static CleanupRegistry {
    GLOBAL_REGISTRY.get_or_init(CleanupRegistry::new)
}

/// Install a Ctrl-C/SIGTERM handler.
///
/// The handler raises the interrupt flag and gives the running backup time to
/// stop copying and drop its staging area. Anything still registered after
/// that is removed here before exiting with 130.
pub fn install_interrupt_handler() -> Result<()> {
    let registry = global_registry().clone();
    ctrlc::set_handler(move || {
        registry.set_interrupted(true);
        eprintln!("\nInterrupted. Cleaning up...");
        if !registry.wait_until_released(INTERRUPT_GRACE) {
            registry.cleanup_all(false);
        }
        std::process::exit(130);
    })
    .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    Ok(())
}

fn remove_dir_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Scoped staging area.
///
/// Creating it lays out `<scratch>/.jenkins-backup-work/<root_name>/`; dropping it
/// removes the whole work directory, whether the run succeeded or not.
pub struct StagingArea {
    work_dir: PathBuf,
    root: PathBuf,
    registry: CleanupRegistry,
    removed: bool,
}

impl StagingArea {
    pub fn create(scratch_root: &Path, root_name: &str, registry: &CleanupRegistry) -> Result<Self> {
        let work_dir = scratch_root.join(WORK_DIR_NAME);
        let root = work_dir.join(root_name);

        // Registered before anything exists so an early interrupt still cleans up
        registry.register(work_dir.clone());
        let staging = StagingArea {
            work_dir,
            root,
            registry: registry.clone(),
            removed: false,
        };

        if remove_dir_if_present(&staging.work_dir).map_err(|e| io_error_at(&staging.work_dir, e))? {
            tracing::warn!(path = %staging.work_dir.display(), "removed stale staging area from an earlier run");
        }
        fs::create_dir_all(&staging.root).map_err(|e| io_error_at(&staging.root, e))?;
        tracing::debug!(path = %staging.root.display(), "staging area created");

        Ok(staging)
    }

    /// Root of the staged tree; becomes the archive's top-level directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Where the archive is written before it is published
    pub fn temp_archive_path(&self) -> PathBuf {
        self.work_dir.join(TEMP_ARCHIVE_NAME)
    }

    /// Remove the staging area now, reporting failure.
    ///
    /// Removal is attempted once; a failure is not retried on drop.
    pub fn cleanup(mut self) -> Result<()> {
        let result = self.remove();
        if result.is_err() {
            self.removed = true;
            self.registry.release(&self.work_dir);
        }
        result.map_err(|e| io_error_at(&self.work_dir, e))
    }

    fn remove(&mut self) -> io::Result<()> {
        if self.removed {
            return Ok(());
        }
        remove_dir_if_present(&self.work_dir)?;
        self.removed = true;
        self.registry.release(&self.work_dir);
        tracing::debug!(path = %self.work_dir.display(), "staging area removed");
        Ok(())
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            tracing::warn!(path = %self.work_dir.display(), error = %e, "could not remove staging area");
        }
    }
}
