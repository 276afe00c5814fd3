use crate::error::BackupError;
use crate::staging::CleanupRegistry;
use crate::Result;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::Path;

/// Running totals for everything copied into the staging area
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyStats {
    pub files: usize,
    pub bytes: u64,
    pub jobs: usize,
    pub folders: usize,
}

/// Attach the offending path to permission errors; everything else stays an IO error.
pub fn io_error_at(path: &Path, error: io::Error) -> BackupError {
    if error.kind() == io::ErrorKind::PermissionDenied {
        BackupError::PermissionDenied {
            path: path.to_path_buf(),
        }
    } else {
        BackupError::Io(error)
    }
}

/// Validate that the Jenkins home exists and is a readable directory
pub fn validate_source(path: &Path) -> Result<()> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(BackupError::SourceNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(io_error_at(path, e)),
    };

    if !metadata.is_dir() {
        return Err(BackupError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    // Listing proves readability
    fs::read_dir(path).map_err(|e| io_error_at(path, e))?;
    Ok(())
}

/// True when `dir` has no entries. A missing directory counts as empty.
pub fn dir_is_empty(dir: &Path) -> Result<bool> {
    if !dir.is_dir() {
        return Ok(true);
    }
    let mut entries = fs::read_dir(dir).map_err(|e| io_error_at(dir, e))?;
    Ok(entries.next().is_none())
}

/// Copy a single regular file and its permissions
pub fn copy_file(source: &Path, dest: &Path, stats: &mut CopyStats) -> Result<()> {
    let bytes = fs::copy(source, dest).map_err(|e| io_error_at(source, e))?;
    stats.files += 1;
    stats.bytes += bytes;
    Ok(())
}

/// Suffix match on the raw file name, so names that are not UTF-8 still match
pub fn name_ends_with(name: &OsStr, suffix: &str) -> bool {
    name.as_encoded_bytes().ends_with(suffix.as_bytes())
}

/// Copy the regular files directly inside `source_dir` whose name satisfies `select`.
///
/// No recursion. A missing `source_dir` copies nothing.
pub fn copy_matching_files<F>(
    source_dir: &Path,
    dest_dir: &Path,
    select: F,
    stats: &mut CopyStats,
    registry: &CleanupRegistry,
) -> Result<usize>
where
    F: Fn(&OsStr) -> bool,
{
    let entries = match fs::read_dir(source_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(io_error_at(source_dir, e)),
    };

    let mut copied = 0;
    for entry in entries {
        registry.check_interrupted()?;
        let entry = entry.map_err(|e| io_error_at(source_dir, e))?;
        let file_name = entry.file_name();
        if !select(&file_name) {
            continue;
        }

        // Follows symlinks, like a shell glob handed to cp
        let source_path = entry.path();
        let metadata = fs::metadata(&source_path).map_err(|e| io_error_at(&source_path, e))?;
        if !metadata.is_file() {
            continue;
        }

        copy_file(&source_path, &dest_dir.join(&file_name), stats)?;
        copied += 1;
    }

    Ok(copied)
}

/// Recursively copy the contents of `source_dir` into `dest_dir`.
///
/// Directories for which `skip_dir` returns true (given the path relative to
/// `source_dir`) are left out together with everything below them. Symlinks
/// are recreated as symlinks rather than followed. Stops with
/// `BackupError::Interrupted` once `registry` reports an interrupt.
pub fn copy_dir_contents<F>(
    source_dir: &Path,
    dest_dir: &Path,
    skip_dir: &F,
    stats: &mut CopyStats,
    registry: &CleanupRegistry,
) -> Result<()>
where
    F: Fn(&Path) -> bool,
{
    copy_dir_recursive(source_dir, dest_dir, Path::new(""), skip_dir, stats, registry)
}

fn copy_dir_recursive<F>(
    source_dir: &Path,
    dest_dir: &Path,
    relative: &Path,
    skip_dir: &F,
    stats: &mut CopyStats,
    registry: &CleanupRegistry,
) -> Result<()>
where
    F: Fn(&Path) -> bool,
{
    registry.check_interrupted()?;
    fs::create_dir_all(dest_dir).map_err(|e| io_error_at(dest_dir, e))?;

    for entry in fs::read_dir(source_dir).map_err(|e| io_error_at(source_dir, e))? {
        registry.check_interrupted()?;
        let entry = entry.map_err(|e| io_error_at(source_dir, e))?;
        let source_path = entry.path();
        let file_name = entry.file_name();
        let dest_path = dest_dir.join(&file_name);
        let file_type = entry
            .file_type()
            .map_err(|e| io_error_at(&source_path, e))?;

        if file_type.is_dir() {
            let child_relative = relative.join(&file_name);
            if skip_dir(&child_relative) {
                tracing::trace!(path = %source_path.display(), "skipping directory");
                continue;
            }
            copy_dir_recursive(
                &source_path,
                &dest_path,
                &child_relative,
                skip_dir,
                stats,
                registry,
            )?;
        } else if file_type.is_file() {
            copy_file(&source_path, &dest_path, stats)?;
        } else if file_type.is_symlink() {
            copy_symlink(&source_path, &dest_path)?;
        }
    }

    Ok(())
}

fn copy_symlink(source: &Path, dest: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::symlink;
        let target = fs::read_link(source).map_err(|e| io_error_at(source, e))?;
        symlink(target, dest).map_err(|e| io_error_at(dest, e))?;
    }

    #[cfg(not(unix))]
    {
        tracing::debug!(path = %source.display(), dest = %dest.display(), "symlink not copied on this platform");
    }

    Ok(())
}

/// Format byte size in human-readable format
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: u64 = 1024;

    if bytes < THRESHOLD {
        return format!("{bytes} B");
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD as f64 && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD as f64;
        unit_index += 1;
    }

    let unit = UNITS[unit_index];
    format!("{size:.1} {unit}")
}
