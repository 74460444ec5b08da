//! Operation: resolve the requirements and install them.
//!
//! Loads the configured sources, resolves the root list into a module tree,
//! prints it, and then installs every module dependencies-first.

use std::sync::Arc;

use pandeps_core::config::Config;
use pandeps_core::dependency::DependencyList;
use pandeps_core::requirements;
use pandeps_resolver::fetch::Fetcher;
use pandeps_resolver::graph::ResolvedGraph;
use pandeps_resolver::resolver::Resolver;
use pandeps_sources::download::build_client;
use pandeps_sources::SourceSet;
use pandeps_util::errors::PandepsError;

use crate::installer::{InstallOptions, Installer};

/// What an install run did.
#[derive(Debug, Clone, Default)]
pub struct InstallSummary {
    /// Distinct modules in the resolved tree.
    pub resolved: usize,
    /// Distinct module names installed.
    pub installed: usize,
    /// `name-version` of every resolved module, dependencies first.
    pub order: Vec<String>,
    /// The rendered dependency tree.
    pub tree: String,
}

/// Resolve `modules` (or the requirements file when empty) and install them.
pub async fn install(config: &Config, modules: &[String]) -> miette::Result<InstallSummary> {
    config.validate()?;
    config.dump();

    let list = if modules.is_empty() {
        requirements::from_path(&config.requirements)?
    } else {
        requirements::from_module_names(modules)
    };

    let client = build_client()?;
    pandeps_util::fs::ensure_dir(&config.cache_dir).map_err(PandepsError::from)?;

    let mut sources = SourceSet::from_config(config, &client, &config.cache_dir);
    if sources.is_empty() {
        return Err(PandepsError::Config {
            message: "No sources configured".into(),
        }
        .into());
    }
    sources.load_all().await;

    let fetcher = Fetcher::new(client, config.cache_dir.clone());
    install_with_sources(config, sources, fetcher, list).await
}

/// Resolve and install `list` against an already loaded [`SourceSet`].
pub async fn install_with_sources(
    config: &Config,
    sources: SourceSet,
    fetcher: Fetcher,
    list: DependencyList,
) -> miette::Result<InstallSummary> {
    let list = Arc::new(list);
    let resolver = Arc::new(
        Resolver::new(Arc::new(sources), Arc::new(fetcher)).with_jobs(config.resolve_jobs),
    );

    if let Err(report) = resolver.resolve(Arc::clone(&list)).await {
        pandeps_util::progress::status_error("Failed", "dependency resolution");
        return Err(PandepsError::Resolution {
            message: report.to_string(),
        }
        .into());
    }

    let graph = ResolvedGraph::from_list(&list);
    let tree = graph.print_tree();
    if !tree.is_empty() {
        println!("{}", tree.trim_end());
    }

    let mut summary = InstallSummary {
        resolved: graph.len(),
        installed: 0,
        order: graph.install_order().iter().map(|m| m.key()).collect(),
        tree,
    };
    pandeps_util::progress::status("Resolved", &format!("{} modules", summary.resolved));

    if config.no_install {
        tracing::info!("Install order: {}", summary.order.join(", "));
        pandeps_util::progress::status_info("Skipped", "installation (no-install)");
        return Ok(summary);
    }

    let installer = Arc::new(Installer::new(InstallOptions::from_config(config)));
    let result = installer.install_list(Arc::clone(&list)).await;
    summary.installed = installer.installed_count();
    if let Err(report) = result {
        pandeps_util::progress::status_error("Failed", "installation");
        return Err(PandepsError::Install {
            message: report.to_string(),
        }
        .into());
    }

    pandeps_util::progress::status(
        "Finished",
        &format!("{} modules installed", summary.installed),
    );
    Ok(summary)
}
