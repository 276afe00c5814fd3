use crate::naming::is_partial_name;
use crate::utils::io_error_at;
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Summary of retention pruning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneSummary {
    pub removed: usize,
    pub kept: usize,
}

#[derive(Debug)]
struct ArchiveFile {
    path: PathBuf,
    name: String,
    modified: SystemTime,
}

/// Archives in `dir` whose name ends with `suffix`, oldest first.
fn list_archives(dir: &Path, suffix: &str) -> Result<Vec<ArchiveFile>> {
    let mut archives = Vec::new();

    for entry in fs::read_dir(dir).map_err(|e| io_error_at(dir, e))? {
        let entry = entry.map_err(|e| io_error_at(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(suffix) || is_partial_name(&name) {
            continue;
        }

        let path = entry.path();
        let metadata = entry.metadata().map_err(|e| io_error_at(&path, e))?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().map_err(|e| io_error_at(&path, e))?;

        archives.push(ArchiveFile {
            path,
            name,
            modified,
        });
    }

    // Ties fall back to the name so the order is stable
    archives.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)));
    Ok(archives)
}

/// Delete the oldest archives in `dir` until at most `keep` remain.
///
/// With fewer than `keep` archives nothing is deleted.
pub fn prune_archives(dir: &Path, suffix: &str, keep: usize) -> Result<PruneSummary> {
    let archives = list_archives(dir, suffix)?;
    let excess = archives.len().saturating_sub(keep);

    for archive in &archives[..excess] {
        fs::remove_file(&archive.path).map_err(|e| io_error_at(&archive.path, e))?;
        tracing::info!(path = %archive.path.display(), "removed old backup");
    }

    Ok(PruneSummary {
        removed: excess,
        kept: archives.len() - excess,
    })
}
