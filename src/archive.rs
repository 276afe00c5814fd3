//! Writing the staging tree as a `.tar.zst` and moving it into place.

use crate::error::BackupError;
use crate::naming::partial_path;
use crate::utils::io_error_at;
use crate::Result;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, EntryType};

/// Stream `staging_root` into a zstd-compressed tar at `out_path`.
///
/// The archive holds a single top-level directory called `root_name`. Symlinks
/// are stored as links. Returns the size of the written archive in bytes.
pub fn write_archive(staging_root: &Path, root_name: &str, out_path: &Path, level: i32) -> Result<u64> {
    let file = File::create(out_path).map_err(|e| io_error_at(out_path, e))?;
    let encoder = zstd::Encoder::new(BufWriter::new(file), level)
        .map_err(|e| BackupError::archive(format!("zstd init: {e}")))?;

    let mut builder = Builder::new(encoder);
    builder.follow_symlinks(false);
    builder.append_dir_all(root_name, staging_root).map_err(|e| {
        BackupError::archive(format!(
            "adding {} to archive: {e}",
            staging_root.display()
        ))
    })?;

    let encoder = builder
        .into_inner()
        .map_err(|e| BackupError::archive(format!("finishing tar stream: {e}")))?;
    let writer = encoder
        .finish()
        .map_err(|e| BackupError::archive(format!("zstd finish: {e}")))?;
    let file = writer
        .into_inner()
        .map_err(|e| BackupError::archive(format!("flushing archive: {}", e.error())))?;

    file.sync_all().map_err(|e| io_error_at(out_path, e))?;
    let size = file.metadata().map_err(|e| io_error_at(out_path, e))?.len();
    tracing::info!(path = %out_path.display(), bytes = size, "archive written");
    Ok(size)
}

/// Move a finished archive to `destination`, replacing whatever is there.
///
/// Same-filesystem moves are a single rename. Across filesystems the archive is
/// copied to a hidden sibling of `destination` and renamed over it, so the
/// destination path never holds a partial file.
pub fn publish(temp_archive: &Path, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| publish_error(destination, e))?;
        }
    }

    match fs::rename(temp_archive, destination) {
        Ok(()) => {
            tracing::debug!(dest = %destination.display(), "archive renamed into place");
            Ok(())
        }
        Err(e) if is_cross_device(&e) => {
            tracing::debug!(dest = %destination.display(), "destination on another filesystem, copying");
            publish_by_copy(temp_archive, destination)
        }
        Err(e) => Err(publish_error(destination, e)),
    }
}

pub(crate) fn publish_by_copy(temp_archive: &Path, destination: &Path) -> Result<()> {
    let partial = partial_path(destination);

    if let Err(e) = copy_verified(temp_archive, &partial) {
        let _ = fs::remove_file(&partial);
        return Err(publish_error(destination, e));
    }
    if let Err(e) = fs::rename(&partial, destination) {
        let _ = fs::remove_file(&partial);
        return Err(publish_error(destination, e));
    }

    fs::remove_file(temp_archive).map_err(|e| io_error_at(temp_archive, e))?;
    Ok(())
}

fn copy_verified(source: &Path, dest: &Path) -> io::Result<()> {
    let copied = fs::copy(source, dest)?;
    let expected = fs::metadata(source)?.len();
    if copied != expected {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("short copy: {copied} of {expected} bytes"),
        ));
    }
    File::open(dest)?.sync_all()
}

fn is_cross_device(error: &io::Error) -> bool {
    #[cfg(windows)]
    const EXDEV: i32 = 17; // ERROR_NOT_SAME_DEVICE
    #[cfg(not(windows))]
    const EXDEV: i32 = 18;

    error.raw_os_error() == Some(EXDEV)
}

fn publish_error(destination: &Path, error: io::Error) -> BackupError {
    BackupError::Publish {
        path: destination.to_path_buf(),
        message: error.to_string(),
    }
}

/// One entry read back from an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub kind: EntryKind,
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink(PathBuf),
    Other,
}

/// Read every entry of a `.tar.zst`, sorted by path.
///
/// Directory paths carry no trailing slash.
pub fn list_entries(archive_path: &Path) -> Result<Vec<ArchiveEntry>> {
    let file = File::open(archive_path).map_err(|e| io_error_at(archive_path, e))?;
    let decoder = zstd::Decoder::new(BufReader::new(file))
        .map_err(|e| BackupError::archive(format!("zstd decode: {e}")))?;
    let mut archive = Archive::new(decoder);

    let mut entries = Vec::new();
    for entry in archive
        .entries()
        .map_err(|e| BackupError::archive(e.to_string()))?
    {
        let mut entry = entry.map_err(|e| BackupError::archive(e.to_string()))?;
        let path = entry
            .path()
            .map_err(|e| BackupError::archive(e.to_string()))?
            .to_string_lossy()
            .trim_end_matches('/')
            .to_string();

        let kind = match entry.header().entry_type() {
            EntryType::Regular => EntryKind::File,
            EntryType::Directory => EntryKind::Directory,
            EntryType::Symlink => EntryKind::Symlink(
                entry
                    .link_name()
                    .map_err(|e| BackupError::archive(e.to_string()))?
                    .map(|p| p.into_owned())
                    .unwrap_or_default(),
            ),
            _ => EntryKind::Other,
        };

        let mut contents = Vec::new();
        if kind == EntryKind::File {
            entry
                .read_to_end(&mut contents)
                .map_err(|e| BackupError::archive(format!("read {path}: {e}")))?;
        }

        entries.push(ArchiveEntry {
            path,
            kind,
            contents,
        });
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}
