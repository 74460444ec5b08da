//! Handler for `pandeps install`.

use miette::Result;
use pandeps_core::config::Config;

use crate::cli::InstallArgs;

pub async fn exec(modules: &[String], args: InstallArgs) -> Result<()> {
    let mut config = super::load_config()?;
    apply(&mut config, args);
    pandeps_ops::ops_install::install(&config, modules).await?;
    Ok(())
}

/// Override configuration with the flags that were given.
fn apply(config: &mut Config, args: InstallArgs) {
    if let Some(path) = args.cpanfile {
        config.requirements = path;
    }
    if let Some(dir) = args.cache_dir {
        config.cache_dir = dir;
    }
    if let Some(dir) = args.install_dir {
        config.install_dir = dir;
    }
    if let Some(jobs) = args.jobs {
        config.jobs = jobs;
    }
    if let Some(jobs) = args.resolve_jobs {
        config.resolve_jobs = jobs;
    }
    if let Some(command) = args.installer {
        config.install.command = command;
    }
    config.no_install |= args.no_install;
    config.tests.never |= args.never_test;
    config.tests.skip.extend(args.no_test);

    let sources = &mut config.sources;
    sources.cpan.extend(args.cpan);
    sources.backpan.extend(args.backpan);
    sources.smart.extend(args.smart);
    sources.metacpan |= args.metacpan;
    if args.no_default_cpan {
        sources.default_cpan = false;
    }
    if args.no_default_backpan {
        sources.default_backpan = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn flags_override_config() {
        let mut config = Config::default();
        config.sources.cpan.push("http://from-file".into());
        apply(
            &mut config,
            InstallArgs {
                install_dir: Some(PathBuf::from("vendor")),
                jobs: Some(3),
                no_test: vec!["Moose".into()],
                cpan: vec!["10:http://mirror".into()],
                no_default_backpan: true,
                ..Default::default()
            },
        );
        assert_eq!(config.install_dir, PathBuf::from("vendor"));
        assert_eq!(config.jobs, 3);
        assert!(config.tests.skip_tests("Moose"));
        assert!(!config.tests.skip_tests("Moo"));
        assert_eq!(config.sources.cpan, ["http://from-file", "10:http://mirror"]);
        assert!(config.sources.default_cpan);
        assert!(!config.sources.default_backpan);
    }

    #[test]
    fn absent_flags_keep_config() {
        let mut config = Config::default();
        config.no_install = true;
        config.tests.never = true;
        apply(&mut config, InstallArgs::default());
        assert!(config.no_install);
        assert!(config.tests.never);
        assert_eq!(config.requirements, PathBuf::from("cpanfile"));
    }
}
