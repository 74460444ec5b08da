//! CLI argument definitions for pandeps.
//!
//! Uses `clap` derive macros to define the command surface. Each command
//! corresponds to a handler in the [`super::commands`] module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "pandeps",
    version,
    about = "Resolve and install Perl module dependencies",
    long_about = "pandeps resolves a cpanfile (or modules named on the command line) against \
                  CPAN, BackPAN, SmartPAN and MetaCPAN sources, fetches every distribution \
                  once and installs the tree dependencies-first."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level used when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve and install dependencies
    Install {
        /// Modules to install instead of reading the requirements file
        modules: Vec<String>,

        #[command(flatten)]
        options: InstallArgs,
    },

    /// Run a command with the installed modules on PERL5LIB and PATH
    Exec {
        /// Program to run
        program: String,
        /// Arguments to pass to the program
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,

        /// Install directory the modules were installed to
        #[arg(short = 'L', long)]
        install_dir: Option<PathBuf>,
    },
}

/// Overrides for `pandeps.toml` settings.
#[derive(Args, Debug, Default)]
pub struct InstallArgs {
    /// Requirements file
    #[arg(long, value_name = "PATH")]
    pub cpanfile: Option<PathBuf>,

    /// Directory archives are downloaded to
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Directory modules are installed to
    #[arg(short = 'L', long)]
    pub install_dir: Option<PathBuf>,

    /// Maximum concurrent installs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Maximum concurrent resolutions per dependency list
    #[arg(long)]
    pub resolve_jobs: Option<usize>,

    /// Resolve and print the tree without installing
    #[arg(long)]
    pub no_install: bool,

    /// Skip tests for every module
    #[arg(long)]
    pub never_test: bool,

    /// Skip tests for a module (repeatable)
    #[arg(long = "no-test", value_name = "MODULE")]
    pub no_test: Vec<String>,

    /// Additional CPAN mirror, optionally prefixed with `N:` priority (repeatable)
    #[arg(long, value_name = "URL")]
    pub cpan: Vec<String>,

    /// Additional BackPAN mirror (repeatable)
    #[arg(long, value_name = "URL")]
    pub backpan: Vec<String>,

    /// SmartPAN server (repeatable)
    #[arg(long, value_name = "URL")]
    pub smart: Vec<String>,

    /// Fall back to MetaCPAN through the resolver command
    #[arg(long)]
    pub metacpan: bool,

    /// Don't use the default CPAN source
    #[arg(long)]
    pub no_default_cpan: bool,

    /// Don't use the default BackPAN source
    #[arg(long)]
    pub no_default_backpan: bool,

    /// Installer command
    #[arg(long, value_name = "COMMAND")]
    pub installer: Option<String>,
}

pub fn parse() -> Cli {
    Cli::parse()
}
