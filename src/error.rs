use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Usage error: {message}")]
    Usage { message: String },

    #[error("Jenkins home not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {message}")]
    Archive { message: String },

    #[error("Could not publish archive to {path}: {message}")]
    Publish { path: PathBuf, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Operation interrupted by user")]
    Interrupted,
}

impl BackupError {
    /// Create a usage error with a custom message
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Create a configuration error with a custom message
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an archive (compression) error with a custom message
    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive {
            message: message.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            BackupError::Interrupted => 130,
            BackupError::Usage { .. } => 2,
            BackupError::Config { .. } => 2,
            _ => 1,
        }
    }

    /// Provide helpful suggestions for resolving the error
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            BackupError::SourceNotFound { .. } | BackupError::NotADirectory { .. } => vec![
                "Pass the Jenkins home directory with -j (usually $JENKINS_HOME)".to_string(),
            ],
            BackupError::PermissionDenied { .. } => vec![
                "Check file permissions".to_string(),
                "Run as the user that owns the Jenkins home".to_string(),
            ],
            BackupError::Publish { .. } => vec![
                "Ensure the destination directory is writable".to_string(),
                "Check free space on the destination filesystem".to_string(),
            ],
            BackupError::Usage { .. } => vec!["Run with --help for usage information".to_string()],
            _ => vec![],
        }
    }
}
