//! Handler for `pandeps exec`.

use std::path::PathBuf;

use miette::Result;

pub fn exec(program: &str, args: &[String], install_dir: Option<PathBuf>) -> Result<()> {
    let mut config = super::load_config()?;
    if let Some(dir) = install_dir {
        config.install_dir = dir;
    }
    pandeps_ops::ops_exec::exec(&config, program, args)
}
