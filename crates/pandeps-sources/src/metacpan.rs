use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use pandeps_core::dependency::{Dependency, Module};
use pandeps_util::process::CommandBuilder;
use regex::Regex;
use reqwest::Client;

use crate::download;
use crate::source::{Source, SourceKind};

static DIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\w+)/([^\s]+)[-_]v?([\d\._\w]+)(?:-\w+)?(.tar.gz|.tgz)$").expect("valid regex")
});

/// Delegates lookups to an external resolver (`cpanm --info`), then checks
/// archive mirrors for the release it names.
#[derive(Debug)]
pub struct MetaCpanSource {
    client: Client,
    command: String,
    install_dir: PathBuf,
    cache_root: PathBuf,
    mirrors: Vec<String>,
    priority: u32,
}

/// A release named by the external resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub author: String,
    pub name: String,
    pub version: String,
    /// `authors/id/A/AU/AUTHOR/Dist-1.0.tar.gz`
    pub path: String,
}

/// Parse the resolver's `AUTHOR/Dist-Name-1.0.tar.gz` answer.
///
/// Only the last non-empty output line is considered.
pub fn parse_release(output: &str) -> Option<Release> {
    let line = output.lines().map(str::trim).rfind(|l| !l.is_empty())?;
    let caps = DIST_RE.captures(line)?;
    let author = caps.get(1)?.as_str();
    let first: String = author.chars().take(1).collect();
    let first_two: String = author.chars().take(2).collect();
    Some(Release {
        author: author.to_string(),
        name: caps.get(2)?.as_str().replace('-', "::"),
        version: caps.get(3)?.as_str().to_string(),
        path: format!("authors/id/{first}/{first_two}/{line}"),
    })
}

impl MetaCpanSource {
    pub fn new(
        client: Client,
        command: &str,
        install_dir: &Path,
        cache_root: &Path,
        mirrors: Vec<String>,
        priority: u32,
    ) -> Self {
        Self {
            client,
            command: command.to_string(),
            install_dir: install_dir.to_path_buf(),
            cache_root: cache_root.to_path_buf(),
            mirrors: mirrors
                .into_iter()
                .map(|m| m.trim_end_matches('/').to_string())
                .collect(),
            priority,
        }
    }

    fn info_command(&self, dep: &Dependency) -> CommandBuilder {
        let home = pandeps_util::fs::absolute(&self.cache_root)
            .unwrap_or_else(|_| self.cache_root.clone());
        CommandBuilder::new(&self.command)
            .arg("-L")
            .arg(&self.install_dir)
            .arg("--info")
            .arg(format!(
                "{}~{}{}",
                dep.name,
                dep.constraint.operator.as_str(),
                dep.constraint.version
            ))
            .env("PERL_CPANM_HOME", home)
    }
}

#[async_trait]
impl Source for MetaCpanSource {
    fn kind(&self) -> SourceKind {
        SourceKind::MetaCpan
    }

    fn url(&self) -> &str {
        &self.command
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn find(&self, dep: &Dependency) -> miette::Result<Option<Arc<Module>>> {
        let cmd = self.info_command(dep);
        tracing::trace!("Running {}", cmd.display());
        let output = match cmd.exec_async().await {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!("{} failed for {dep}: {e}", cmd.display());
                return Ok(None);
            }
        };
        if !output.status.success() {
            tracing::debug!(
                "{} exited with {} for {dep}:\n{}",
                cmd.display(),
                output.status,
                pandeps_util::process::describe_output(&output)
            );
            return Ok(None);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let Some(release) = parse_release(&stdout) else {
            tracing::debug!("Unrecognised resolver output for {dep}: {}", stdout.trim());
            return Ok(None);
        };

        for mirror in &self.mirrors {
            let url = format!("{mirror}/{}", release.path);
            if download::exists(&self.client, &url).await {
                tracing::debug!("Found {} ({}) at {url}", release.name, release.version);
                return Ok(Some(Arc::new(Module::new(
                    release.name,
                    release.version,
                    mirror,
                    release.path,
                ))));
            }
        }
        tracing::debug!("No archive mirror has {}", release.path);
        Ok(None)
    }
}
