use crate::error::BackupError;
use crate::naming::default_scratch_root;
use crate::Result;
use configparser::ini::Ini;
use std::path::{Path, PathBuf};

const SECTION: &str = "jenkins-backup";

/// Tunables read from the optional settings file
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub compression_level: i32,
    pub archive_suffix: String,
    pub archive_root_name: String,
    pub scratch_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            compression_level: 3,
            archive_suffix: ".tar.zst".to_string(),
            archive_root_name: "jenkins-backup".to_string(),
            scratch_dir: default_scratch_root(),
        }
    }
}

/// Get default settings
pub fn default_settings() -> Settings {
    Settings::default()
}

/// Load settings from the per-user settings file, falling back to defaults
pub fn load_settings() -> Result<Settings> {
    let path = get_settings_path()?;
    load_settings_from(&path)
}

/// Load settings from an explicit file. A missing file yields the defaults.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(default_settings());
    }

    let mut conf = Ini::new();
    conf.load(path)
        .map_err(|e| BackupError::config(format!("Failed to parse settings file: {e}")))?;

    let mut settings = default_settings();

    if let Some(value) = conf.get(SECTION, "compression_level") {
        let level: i32 = value
            .trim()
            .parse()
            .map_err(|_| BackupError::config(format!("Invalid compression_level: {value}")))?;
        if !(1..=22).contains(&level) {
            return Err(BackupError::config(format!(
                "compression_level must be between 1 and 22, got {level}"
            )));
        }
        settings.compression_level = level;
    }
    if let Some(value) = conf.get(SECTION, "archive_suffix") {
        if value.trim().is_empty() {
            return Err(BackupError::config("archive_suffix must not be empty"));
        }
        settings.archive_suffix = value.trim().to_string();
    }
    if let Some(value) = conf.get(SECTION, "archive_root_name") {
        let name = value.trim();
        if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." {
            return Err(BackupError::config(format!(
                "Invalid archive_root_name: {value}"
            )));
        }
        settings.archive_root_name = name.to_string();
    }
    if let Some(value) = conf.get(SECTION, "scratch_dir") {
        if !value.trim().is_empty() {
            settings.scratch_dir = PathBuf::from(value.trim());
        }
    }

    Ok(settings)
}

/// Get the settings file path for the current platform
fn get_settings_path() -> Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return Ok(PathBuf::from(appdata)
                .join("jenkins-backup")
                .join("config.ini"));
        }
    }

    if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
        Ok(PathBuf::from(config_dir)
            .join("jenkins-backup")
            .join("config.ini"))
    } else if let Some(home) = std::env::var_os("HOME") {
        Ok(PathBuf::from(home)
            .join(".config")
            .join("jenkins-backup")
            .join("config.ini"))
    } else {
        Err(BackupError::config("Could not determine config directory"))
    }
}

/// Create a sample settings file
pub fn create_sample_settings() -> String {
    r#"[jenkins-backup]
# zstd compression level (1-22)
compression_level = 3

# Suffix identifying backup archives when pruning with -k
archive_suffix = .tar.zst

# Name of the single top-level directory inside each archive
archive_root_name = jenkins-backup

# Where the staging area is built (defaults to the executable's directory)
# scratch_dir = /var/tmp
"#
    .to_string()
}

/// Display the effective settings in a user-friendly format
pub fn dump_settings(settings: &Settings) -> Result<()> {
    let path = get_settings_path()?;

    println!("jenkins-backup Configuration");
    println!("============================");
    println!();

    if path.exists() {
        println!("Config file: {} (found)", path.display());
    } else {
        println!("Config file: {} (not found, using defaults)", path.display());
    }
    println!();

    println!("Current Settings:");
    println!("----------------");
    println!("compression_level = {}", settings.compression_level);
    println!("archive_suffix    = {}", settings.archive_suffix);
    println!("archive_root_name = {}", settings.archive_root_name);
    println!("scratch_dir       = {}", settings.scratch_dir.display());
    println!();

    if !path.exists() {
        println!("Sample config file:");
        println!("-------------------");
        print!("{}", create_sample_settings());
    }

    Ok(())
}
