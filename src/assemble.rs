use crate::config::Config;
use crate::jobs::copy_job_tree;
use crate::progress::Progress;
use crate::staging::CleanupRegistry;
use crate::utils::{
    copy_dir_contents, copy_matching_files, dir_is_empty, io_error_at, name_ends_with, CopyStats,
};
use crate::Result;
use std::fs;
use std::path::Path;

/// Top-level directories present in every archive, populated or not
pub const STAGED_DIRS: [&str; 5] = ["jobs", "users", "secrets", "nodes", "plugins"];

/// Directories copied wholesale when they have content
const MIRRORED_DIRS: [&str; 3] = ["users", "secrets", "nodes"];

fn no_skip(_: &Path) -> bool {
    false
}

/// Fill `staging_root` with the Jenkins state selected by `config`.
///
/// Returns `BackupError::Interrupted` once `registry` reports an interrupt.
pub fn assemble_staging(
    config: &Config,
    staging_root: &Path,
    progress: &Progress,
    registry: &CleanupRegistry,
) -> Result<CopyStats> {
    let home = config.jenkins_home.as_path();
    let mut stats = CopyStats::default();

    for dir in STAGED_DIRS {
        let path = staging_root.join(dir);
        fs::create_dir_all(&path).map_err(|e| io_error_at(&path, e))?;
    }

    progress.set_message("root configuration");
    let xml = copy_matching_files(
        home,
        staging_root,
        |name| name_ends_with(name, ".xml"),
        &mut stats,
        registry,
    )?;
    let keystores = copy_matching_files(
        home,
        staging_root,
        |name| name_ends_with(name, ".jks"),
        &mut stats,
        registry,
    )?;
    tracing::debug!(xml, keystores, "copied root files");

    for dir in MIRRORED_DIRS {
        copy_if_populated(
            &home.join(dir),
            &staging_root.join(dir),
            progress,
            &mut stats,
            registry,
        )?;
    }

    if config.include_plugins {
        copy_if_populated(
            &home.join("plugins"),
            &staging_root.join("plugins"),
            progress,
            &mut stats,
            registry,
        )?;
    } else {
        tracing::debug!("plugins not requested, leaving plugins/ empty");
    }

    let source_jobs = home.join("jobs");
    if dir_is_empty(&source_jobs)? {
        tracing::debug!("no jobs to copy");
    } else {
        copy_job_tree(
            &source_jobs,
            &staging_root.join("jobs"),
            &mut stats,
            progress,
            registry,
        )?;
    }

    tracing::info!(
        files = stats.files,
        bytes = stats.bytes,
        jobs = stats.jobs,
        folders = stats.folders,
        "staging area assembled"
    );
    Ok(stats)
}

fn copy_if_populated(
    source: &Path,
    dest: &Path,
    progress: &Progress,
    stats: &mut CopyStats,
    registry: &CleanupRegistry,
) -> Result<()> {
    if dir_is_empty(source)? {
        tracing::debug!(path = %source.display(), "empty or missing, skipped");
        return Ok(());
    }

    progress.set_message(source.display().to_string());
    copy_dir_contents(source, dest, &no_skip, stats, registry)
}
