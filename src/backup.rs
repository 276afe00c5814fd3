use crate::archive::{publish, write_archive};
use crate::assemble::assemble_staging;
use crate::config::Config;
use crate::progress::Progress;
use crate::retention::{prune_archives, PruneSummary};
use crate::settings::Settings;
use crate::staging::{CleanupRegistry, StagingArea};
use crate::utils::{format_size, validate_source};
use crate::Result;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct BackupResult {
    pub destination: PathBuf,
    pub files_copied: usize,
    pub bytes_copied: u64,
    pub jobs: usize,
    pub archive_size: u64,
    pub pruned: Option<PruneSummary>,
    pub duration: Duration,
}

impl BackupResult {
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Created backup: {} ({} files, {} jobs, {})",
            self.destination.display(),
            self.files_copied,
            self.jobs,
            format_size(self.archive_size)
        );
        if let Some(pruned) = self.pruned {
            if pruned.removed > 0 {
                summary.push_str(&format!(
                    "\nRemoved {} old backup(s), {} kept",
                    pruned.removed, pruned.kept
                ));
            }
        }
        summary
    }
}

/// Run one backup: stage, compress, publish, prune.
///
/// The staging area is removed on every exit path.
pub fn run_backup(
    config: &Config,
    settings: &Settings,
    registry: &CleanupRegistry,
    progress: &Progress,
) -> Result<BackupResult> {
    let start_time = Instant::now();

    validate_source(&config.jenkins_home)?;
    tracing::info!(
        home = %config.jenkins_home.display(),
        dest = %config.destination.display(),
        plugins = config.include_plugins,
        "starting backup"
    );

    let staging = StagingArea::create(&settings.scratch_dir, &settings.archive_root_name, registry)?;
    let stats = assemble_staging(config, staging.root(), progress, registry)?;

    progress.set_message("compressing");
    let temp_archive = staging.temp_archive_path();
    let archive_size = write_archive(
        staging.root(),
        &settings.archive_root_name,
        &temp_archive,
        settings.compression_level,
    )?;

    // An interrupt during compression still stops the publish
    registry.check_interrupted()?;
    progress.set_message("publishing");
    publish(&temp_archive, &config.destination)?;
    tracing::info!(dest = %config.destination.display(), "backup published");

    let pruned = match config.retention() {
        Some(keep) => Some(prune_archives(
            config.destination_dir(),
            &settings.archive_suffix,
            keep as usize,
        )?),
        None => None,
    };

    finish_staging(staging);
    progress.finish();

    Ok(BackupResult {
        destination: config.destination.clone(),
        files_copied: stats.files,
        bytes_copied: stats.bytes,
        jobs: stats.jobs,
        archive_size,
        pruned,
        duration: start_time.elapsed(),
    })
}

/// Remove the staging area once the archive is published.
///
/// The backup is complete at this point, so a failure is only reported.
fn finish_staging(staging: StagingArea) -> bool {
    let work_dir = staging.work_dir().to_path_buf();
    match staging.cleanup() {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(path = %work_dir.display(), error = %e, "backup published but staging area could not be removed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::list_entries;
    use crate::error::BackupError;
    use crate::naming::WORK_DIR_NAME;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use tempfile::{tempdir, TempDir};

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let home = dir.path().join("home");
            write(&home.join("config.xml"), "<hudson/>");
            write(&home.join("users").join("admin").join("config.xml"), "<user/>");
            write(&home.join("plugins").join("git.jpi"), "jpi");
            write(&home.join("jobs").join("app").join("config.xml"), "<project/>");
            write(
                &home.join("jobs").join("app").join("builds").join("1").join("archive").join("out.jar"),
                "artifact",
            );
            write(
                &home.join("jobs").join("app").join("builds").join("1").join("build.xml"),
                "<build/>",
            );
            fs::create_dir_all(dir.path().join("scratch")).unwrap();
            Fixture { dir }
        }

        fn home(&self) -> PathBuf {
            self.dir.path().join("home")
        }

        fn dest_dir(&self) -> PathBuf {
            self.dir.path().join("backups")
        }

        fn settings(&self) -> Settings {
            Settings {
                scratch_dir: self.dir.path().join("scratch"),
                ..Settings::default()
            }
        }

        fn work_dir(&self) -> PathBuf {
            self.dir.path().join("scratch").join(WORK_DIR_NAME)
        }

        fn run(&self, name: &str, plugins: bool, keep: Option<u32>) -> Result<BackupResult> {
            self.run_with(name, plugins, keep, &CleanupRegistry::new())
        }

        fn run_with(
            &self,
            name: &str,
            plugins: bool,
            keep: Option<u32>,
            registry: &CleanupRegistry,
        ) -> Result<BackupResult> {
            let config = Config::new(self.home(), self.dest_dir().join(name), plugins, keep)?;
            run_backup(&config, &self.settings(), registry, &Progress::disabled())
        }
    }

    #[test]
    fn test_run_backup() {
        let fixture = Fixture::new();
        let result = fixture.run("nightly.tar.zst", false, None).unwrap();

        assert_eq!(result.destination, fixture.dest_dir().join("nightly.tar.zst"));
        assert!(result.destination.exists());
        assert_eq!(result.jobs, 1);
        assert!(result.pruned.is_none());
        assert!(result.summary().contains("Created backup:"));

        let paths: Vec<String> = list_entries(&result.destination)
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert!(paths.contains(&"jenkins-backup/config.xml".to_string()));
        assert!(paths.contains(&"jenkins-backup/users/admin/config.xml".to_string()));
        assert!(paths.contains(&"jenkins-backup/jobs/app/builds/1/build.xml".to_string()));
        assert!(paths.contains(&"jenkins-backup/plugins".to_string()));
        assert!(!paths.iter().any(|p| p.contains("/archive/")));
        assert!(!paths.iter().any(|p| p.contains("git.jpi")));

        // Staging area gone
        assert!(!fixture.dir.path().join("scratch").join(WORK_DIR_NAME).exists());
    }

    #[test]
    fn test_run_backup_twice_same_content() {
        let fixture = Fixture::new();
        let first = fixture.run("one.tar.zst", true, None).unwrap();
        let second = fixture.run("two.tar.zst", true, None).unwrap();

        let first_entries = list_entries(&first.destination).unwrap();
        let second_entries = list_entries(&second.destination).unwrap();
        assert_eq!(first_entries, second_entries);
        assert!(first_entries
            .iter()
            .any(|e| e.path == "jenkins-backup/plugins/git.jpi"));
    }

    #[test]
    fn test_run_backup_missing_home() {
        let fixture = Fixture::new();
        fs::remove_dir_all(fixture.home()).unwrap();

        let result = fixture.run("nightly.tar.zst", false, None);
        assert!(matches!(result, Err(BackupError::SourceNotFound { .. })));
        assert!(!fixture.dest_dir().join("nightly.tar.zst").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_copy_cleans_staging() {
        use std::os::unix::fs::PermissionsExt;

        let fixture = Fixture::new();
        let secrets = fixture.home().join("secrets");
        write(&secrets.join("locked").join("master.key"), "key");
        fs::set_permissions(secrets.join("locked"), fs::Permissions::from_mode(0o000)).unwrap();

        // Root can read anything; the failure cannot be simulated then
        let readable = fs::read_dir(secrets.join("locked")).is_ok();
        let result = fixture.run("nightly.tar.zst", false, None);
        fs::set_permissions(secrets.join("locked"), fs::Permissions::from_mode(0o755)).unwrap();

        if !readable {
            assert!(matches!(result, Err(BackupError::PermissionDenied { .. })));
            assert!(!fixture.dest_dir().join("nightly.tar.zst").exists());
        }
        assert!(!fixture.dir.path().join("scratch").join(WORK_DIR_NAME).exists());
    }

    #[test]
    fn test_run_backup_with_retention() {
        let fixture = Fixture::new();
        fs::create_dir_all(fixture.dest_dir()).unwrap();
        for (name, age) in [("a.tar.zst", 300), ("b.tar.zst", 200), ("c.tar.zst", 100)] {
            let file = fs::File::create(fixture.dest_dir().join(name)).unwrap();
            file.set_modified(std::time::SystemTime::now() - Duration::from_secs(age))
                .unwrap();
        }

        let result = fixture.run("d.tar.zst", false, Some(2)).unwrap();

        let pruned = result.pruned.unwrap();
        assert_eq!(pruned.removed, 2);
        assert_eq!(pruned.kept, 2);
        assert!(!fixture.dest_dir().join("a.tar.zst").exists());
        assert!(!fixture.dest_dir().join("b.tar.zst").exists());
        assert!(fixture.dest_dir().join("c.tar.zst").exists());
        assert!(fixture.dest_dir().join("d.tar.zst").exists());
    }

    #[test]
    fn test_interrupt_before_copy() {
        let fixture = Fixture::new();
        let registry = CleanupRegistry::new();
        registry.set_interrupted(true);

        let result = fixture.run_with("nightly.tar.zst", false, None, &registry);

        assert!(matches!(result, Err(BackupError::Interrupted)));
        assert!(!fixture.dest_dir().join("nightly.tar.zst").exists());
        assert!(!fixture.work_dir().exists());
        assert!(registry.active_paths().is_empty());
    }

    #[test]
    fn test_interrupt_during_copy_removes_staging() {
        let fixture = Fixture::new();
        let builds = fixture.home().join("jobs").join("app").join("builds");
        for build in 0..40 {
            for file in 0..100 {
                write(&builds.join(build.to_string()).join(format!("log-{file}")), "line");
            }
        }

        let registry = CleanupRegistry::new();
        let staged_jobs = fixture
            .work_dir()
            .join("jenkins-backup")
            .join("jobs")
            .join("app");

        let finished = AtomicBool::new(false);

        // Raise the flag once job copying has started, as the signal handler would
        let result = thread::scope(|scope| {
            scope.spawn(|| {
                while !staged_jobs.exists() && !finished.load(Ordering::SeqCst) {
                    thread::yield_now();
                }
                registry.set_interrupted(true);
            });
            let result = fixture.run_with("nightly.tar.zst", false, None, &registry);
            finished.store(true, Ordering::SeqCst);
            result
        });

        // The copy may win the race on a fast machine; either way nothing is left behind
        if result.is_err() {
            assert!(matches!(result, Err(BackupError::Interrupted)));
            assert!(!fixture.dest_dir().join("nightly.tar.zst").exists());
        }
        assert!(!fixture.work_dir().exists());
        assert!(registry.wait_until_released(Duration::ZERO));
    }

    #[cfg(unix)]
    #[test]
    fn test_finish_staging_failure_is_not_fatal() {
        use std::os::unix::fs::PermissionsExt;

        let fixture = Fixture::new();
        let scratch = fixture.dir.path().join("scratch");
        let registry = CleanupRegistry::new();
        let staging = StagingArea::create(&scratch, "jenkins-backup", &registry).unwrap();

        fs::set_permissions(&scratch, fs::Permissions::from_mode(0o555)).unwrap();
        // Root ignores directory permissions; removal succeeds then
        let writable = fs::File::create(scratch.join("write-check")).is_ok();
        let removed = finish_staging(staging);
        fs::set_permissions(&scratch, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(removed, writable);
        assert!(registry.active_paths().is_empty());
    }
}
