pub mod archive;
pub mod assemble;
pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod naming;
pub mod progress;
pub mod retention;
pub mod settings;
pub mod staging;
pub mod utils;

pub use archive::{list_entries, publish, write_archive, ArchiveEntry, EntryKind};
pub use assemble::assemble_staging;
pub use backup::{run_backup, BackupResult};
pub use cli::{build_command, CliOptions};
pub use config::Config;
pub use error::BackupError;
pub use jobs::{copy_job_tree, is_folder_config, JobKind, JobNode, FOLDER_MARKER};
pub use retention::{prune_archives, PruneSummary};
pub use settings::{default_settings, dump_settings, load_settings, Settings};
pub use staging::{global_registry, install_interrupt_handler, CleanupRegistry, StagingArea};

/// Main library result type
pub type Result<T> = std::result::Result<T, BackupError>;
