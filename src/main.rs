use jenkins_backup::logging::init_logging;
use jenkins_backup::progress::Progress;
use jenkins_backup::utils::format_size;
use jenkins_backup::{
    build_command, dump_settings, global_registry, install_interrupt_handler, load_settings,
    run_backup, BackupError, CliOptions,
};
use std::process;

fn main() {
    let result = run();
    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(error) => {
            eprintln!("Error: {error}");

            // Show suggestions if available
            let suggestions = error.suggestions();
            if !suggestions.is_empty() {
                eprintln!("\nSuggestions:");
                for suggestion in suggestions {
                    eprintln!("  - {suggestion}");
                }
            }

            process::exit(error.exit_code());
        }
    }
}

fn run() -> Result<i32, BackupError> {
    // Usage errors exit here, before anything touches the filesystem
    let matches = build_command().get_matches();
    let options = CliOptions::from_matches(&matches)?;

    init_logging(options.verbose);
    tracing::debug!(?options, "parsed command line");

    let settings = load_settings()?;

    if options.dump_config {
        dump_settings(&settings)?;
        return Ok(0);
    }

    let config = options
        .config
        .ok_or_else(|| BackupError::usage("both -j and -d are required"))?;

    install_interrupt_handler()?;

    let progress = Progress::for_terminal(options.quiet);
    let result = run_backup(&config, &settings, global_registry(), &progress)?;

    if options.verbose > 0 {
        println!("Backed up: {}", config.jenkins_home.display());
        println!("  → {}", result.destination.display());
        println!("  Files: {}", result.files_copied);
        println!("  Jobs: {}", result.jobs);
        println!("  Staged: {}", format_size(result.bytes_copied));
        println!("  Archive: {}", format_size(result.archive_size));
        if let Some(pruned) = result.pruned {
            println!("  Pruned: {} removed, {} kept", pruned.removed, pruned.kept);
        }
        println!("  Duration: {:.2}s", result.duration.as_secs_f64());
    } else if !options.quiet {
        println!("{}", result.summary());
    }

    Ok(0)
}
