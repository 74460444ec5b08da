//! Operation: run a command against the installed modules.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use pandeps_core::config::Config;
use pandeps_util::errors::PandepsError;
use pandeps_util::process::CommandBuilder;

/// `PERL5LIB` pointing at the modules below `install_dir`.
pub fn perl5lib(install_dir: &Path) -> std::io::Result<OsString> {
    let abs = pandeps_util::fs::absolute(install_dir)?;
    Ok(abs.join("lib").join("perl5").into_os_string())
}

/// `PATH` with the install directory's scripts appended to `current`.
pub fn path_with_bin(current: Option<OsString>, install_dir: &Path) -> miette::Result<OsString> {
    let bin = pandeps_util::fs::absolute(install_dir)
        .map_err(PandepsError::from)?
        .join("bin");
    let mut paths: Vec<PathBuf> = current
        .as_deref()
        .map(|p| std::env::split_paths(p).collect())
        .unwrap_or_default();
    paths.push(bin);
    std::env::join_paths(paths).map_err(|e| {
        PandepsError::Generic {
            message: format!("Invalid PATH: {e}"),
        }
        .into()
    })
}

/// The command line for `program args..` with the install environment set.
pub fn exec_command(config: &Config, program: &str, args: &[String]) -> miette::Result<CommandBuilder> {
    Ok(CommandBuilder::new(program)
        .args(args)
        .env(
            "PERL5LIB",
            perl5lib(&config.install_dir).map_err(PandepsError::from)?,
        )
        .env(
            "PATH",
            path_with_bin(std::env::var_os("PATH"), &config.install_dir)?,
        ))
}

/// Run `program args..` with the installed modules visible.
pub fn exec(config: &Config, program: &str, args: &[String]) -> miette::Result<()> {
    let cmd = exec_command(config, program, args)?;
    tracing::debug!("Executing {}", cmd.display());
    pandeps_util::progress::status("Running", &cmd.display());

    let status = cmd.status()?;
    if !status.success() {
        let code = status.code().unwrap_or(-1);
        return Err(PandepsError::Generic {
            message: format!("Process exited with code {code}"),
        }
        .into());
    }
    Ok(())
}
