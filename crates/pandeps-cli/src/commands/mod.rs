//! Command dispatch and handler modules.

mod exec;
mod install;

use miette::Result;
use pandeps_core::config::Config;
use pandeps_util::errors::PandepsError;

use crate::cli::{Cli, Command};

/// Route a parsed CLI invocation to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Install { modules, options } => install::exec(&modules, options).await,
        Command::Exec {
            program,
            args,
            install_dir,
        } => exec::exec(&program, &args, install_dir),
    }
}

/// `pandeps.toml` from the current directory, or defaults.
fn load_config() -> Result<Config> {
    let cwd = std::env::current_dir().map_err(PandepsError::Io)?;
    Config::load(&cwd)
}
