//! Recursive copy of the Jenkins `jobs/` tree.
//!
//! Every job directory is mirrored into the staging area with its XML
//! configuration, its `nextBuildNumber` file and its `builds/` history.
//! Build artifacts (`archive/` directories inside `builds/`) are never copied.
//! Jobs created by the CloudBees Folder plugin hold further jobs under their
//! own `jobs/` directory and are descended into.

use crate::progress::Progress;
use crate::staging::CleanupRegistry;
use crate::utils::{copy_dir_contents, copy_matching_files, io_error_at, name_ends_with, CopyStats};
use crate::Result;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Type identifier the Folder plugin writes into a folder's `config.xml`
pub const FOLDER_MARKER: &str = "com.cloudbees.hudson.plugins.folder.Folder";

const CONFIG_FILE: &str = "config.xml";
const NEXT_BUILD_NUMBER: &str = "nextBuildNumber";
const BUILDS_DIR: &str = "builds";
const NESTED_JOBS_DIR: &str = "jobs";
const ARTIFACTS_DIR: &str = "archive";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Folder,
    Leaf,
}

/// A job directory found while walking the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobNode {
    pub name: String,
    /// Absolute location in the Jenkins home
    pub source: PathBuf,
    /// Location relative to the top-level `jobs/` directory, e.g. `team/jobs/build`
    pub relative: PathBuf,
    pub kind: JobKind,
}

impl JobNode {
    /// List the jobs directly inside `jobs_dir`.
    ///
    /// `relative_prefix` is where `jobs_dir` sits relative to the top-level
    /// jobs directory. A missing `jobs_dir` yields no jobs.
    pub fn discover(jobs_dir: &Path, relative_prefix: &Path) -> Result<Vec<JobNode>> {
        let entries = match fs::read_dir(jobs_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error_at(jobs_dir, e)),
        };

        let mut nodes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error_at(jobs_dir, e))?;
            let source = entry.path();
            if !source.is_dir() {
                continue;
            }

            let file_name = entry.file_name();
            let kind = read_job_kind(&source)?;
            nodes.push(JobNode {
                name: file_name.to_string_lossy().into_owned(),
                relative: relative_prefix.join(&file_name),
                source,
                kind,
            });
        }

        Ok(nodes)
    }

    pub fn is_folder(&self) -> bool {
        self.kind == JobKind::Folder
    }

    /// Where this job's children live, relative to the top-level jobs directory
    pub fn nested_jobs_relative(&self) -> PathBuf {
        self.relative.join(NESTED_JOBS_DIR)
    }
}

/// True when a job configuration declares a folder.
///
/// Plain case-sensitive substring search: the marker counts wherever it
/// appears in the file, not only as the root element.
pub fn is_folder_config(contents: &str) -> bool {
    contents.contains(FOLDER_MARKER)
}

fn read_job_kind(job_dir: &Path) -> Result<JobKind> {
    let config_path = job_dir.join(CONFIG_FILE);
    match fs::read(&config_path) {
        Ok(bytes) => {
            if is_folder_config(&String::from_utf8_lossy(&bytes)) {
                Ok(JobKind::Folder)
            } else {
                Ok(JobKind::Leaf)
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(JobKind::Leaf),
        Err(e) => Err(io_error_at(&config_path, e)),
    }
}

/// Files copied from each job directory (no recursion)
fn is_job_file(name: &OsStr) -> bool {
    name_ends_with(name, ".xml") || name == NEXT_BUILD_NUMBER
}

/// Directories inside `builds/` that hold build artifacts
fn is_artifact_dir(relative: &Path) -> bool {
    relative.file_name().is_some_and(|name| name == ARTIFACTS_DIR)
}

/// Mirror the job tree rooted at `source_jobs` into `staging_jobs`.
///
/// Stops with `BackupError::Interrupted` as soon as `registry` reports an interrupt.
pub fn copy_job_tree(
    source_jobs: &Path,
    staging_jobs: &Path,
    stats: &mut CopyStats,
    progress: &Progress,
    registry: &CleanupRegistry,
) -> Result<()> {
    copy_jobs(source_jobs, staging_jobs, Path::new(""), stats, progress, registry)
}

fn copy_jobs(
    source_root: &Path,
    staging_root: &Path,
    relative: &Path,
    stats: &mut CopyStats,
    progress: &Progress,
    registry: &CleanupRegistry,
) -> Result<()> {
    for job in JobNode::discover(&source_root.join(relative), relative)? {
        registry.check_interrupted()?;
        tracing::debug!(job = %job.relative.display(), folder = job.is_folder(), "copying job");
        progress.set_message(format!("jobs/{}", job.relative.display()));

        let dest = staging_root.join(&job.relative);
        copy_job(&job, &dest, stats, registry)?;

        stats.jobs += 1;
        if job.is_folder() {
            stats.folders += 1;
            copy_jobs(
                source_root,
                staging_root,
                &job.nested_jobs_relative(),
                stats,
                progress,
                registry,
            )?;
        }
    }

    Ok(())
}

fn copy_job(
    job: &JobNode,
    dest: &Path,
    stats: &mut CopyStats,
    registry: &CleanupRegistry,
) -> Result<()> {
    fs::create_dir_all(dest).map_err(|e| io_error_at(dest, e))?;
    copy_matching_files(&job.source, dest, is_job_file, stats, registry)?;

    let builds = job.source.join(BUILDS_DIR);
    if builds.is_dir() {
        copy_dir_contents(
            &builds,
            &dest.join(BUILDS_DIR),
            &is_artifact_dir,
            stats,
            registry,
        )?;
    }

    Ok(())
}
