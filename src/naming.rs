use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Name of the scratch directory holding the staging tree and the temporary archive.
///
/// The name is fixed, so two runs sharing a scratch root will trample each other.
pub const WORK_DIR_NAME: &str = ".jenkins-backup-work";

/// File name of the archive while it is still inside the work directory
pub const TEMP_ARCHIVE_NAME: &str = "archive.tar.zst";

/// Sibling path used when the archive has to be copied across filesystems.
///
/// `/backups/nightly.tar.zst` becomes
/// `/backups/.nightly.tar.zst.20250603T145231-4242.partial`.
pub fn partial_path(destination: &Path) -> PathBuf {
    partial_path_at(destination, &Utc::now())
}

fn partial_path_at(destination: &Path, timestamp: &DateTime<Utc>) -> PathBuf {
    let parent = destination.parent().unwrap_or(Path::new("."));
    let file_name = destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "backup".to_string());

    let stamp = timestamp.format("%Y%m%dT%H%M%S");
    let pid = std::process::id();
    parent.join(format!(".{file_name}.{stamp}-{pid}.partial"))
}

/// Check whether a file name looks like a leftover from [`partial_path`]
pub fn is_partial_name(file_name: &str) -> bool {
    file_name.starts_with('.') && file_name.ends_with(".partial")
}

/// Default location for the scratch area: next to the running executable.
pub fn default_scratch_root() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(std::env::temp_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_partial_path_is_sibling() {
        let timestamp = Utc.with_ymd_and_hms(2025, 6, 3, 14, 52, 31).unwrap();
        let path = partial_path_at(Path::new("/backups/nightly.tar.zst"), &timestamp);

        assert_eq!(path.parent(), Some(Path::new("/backups")));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(".nightly.tar.zst.20250603T145231-"));
        assert!(name.ends_with(".partial"));
        assert!(is_partial_name(name));
    }

    #[test]
    fn test_partial_path_relative_destination() {
        let path = partial_path(Path::new("nightly.tar.zst"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(".nightly.tar.zst."));
        assert_eq!(path.parent(), Some(Path::new("")));
    }

    #[test]
    fn test_is_partial_name() {
        assert!(is_partial_name(".a.tar.zst.20250101T000000-1.partial"));
        assert!(!is_partial_name("a.tar.zst"));
        assert!(!is_partial_name("a.partial"));
    }

    #[test]
    fn test_default_scratch_root_exists() {
        assert!(default_scratch_root().is_dir());
    }
}
