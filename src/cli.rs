use crate::config::Config;
use crate::Result;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

/// Everything the command line asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    /// Absent only when `--dump-config` was given without `-j`/`-d`
    pub config: Option<Config>,
    pub dump_config: bool,
    pub verbose: u8,
    pub quiet: bool,
}

pub fn build_command() -> Command {
    Command::new("jenkins-backup")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Back up a Jenkins home directory into a single zstd-compressed tarball")
        .long_about(
            "jenkins-backup copies the configuration, users, secrets, nodes and job history\n\
             of a Jenkins controller into one .tar.zst archive. Build artifacts are skipped.\n\
             Example: jenkins-backup -j /var/lib/jenkins -d /backups/jenkins.tar.zst -k 7",
        )
        .arg(
            Arg::new("jenkins-home")
                .short('j')
                .long("jenkins-home")
                .help("Jenkins home directory to back up")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .required_unless_present("dump-config"),
        )
        .arg(
            Arg::new("destination")
                .short('d')
                .long("destination")
                .help("Archive file to create (conventionally *.tar.zst)")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .required_unless_present("dump-config"),
        )
        .arg(
            Arg::new("plugins")
                .short('p')
                .long("plugins")
                .help("Include the plugins/ directory")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("keep")
                .short('k')
                .long("keep")
                .help("Number of archives to keep in the destination directory (0 = all)")
                .value_name("N")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Show detailed progress information (repeat for more)")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Suppress all output except errors")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose"),
        )
        .arg(
            Arg::new("dump-config")
                .long("dump-config")
                .help("Display current configuration settings and exit")
                .action(ArgAction::SetTrue),
        )
}

impl CliOptions {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let dump_config = matches.get_flag("dump-config");
        let home = matches.get_one::<PathBuf>("jenkins-home");
        let destination = matches.get_one::<PathBuf>("destination");

        let config = match (home, destination) {
            (Some(home), Some(destination)) => Some(Config::new(
                home.clone(),
                destination.clone(),
                matches.get_flag("plugins"),
                matches.get_one::<u32>("keep").copied(),
            )?),
            _ => None,
        };

        Ok(CliOptions {
            config,
            dump_config,
            verbose: matches.get_count("verbose"),
            quiet: matches.get_flag("quiet"),
        })
    }
}
