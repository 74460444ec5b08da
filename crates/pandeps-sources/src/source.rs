//! The source abstraction and the priority-ordered set of configured sources.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use pandeps_core::config::{Config, BACKPAN_INDEX_URL, BACKPAN_URL, CPAN_INDEX_URL, CPAN_URL};
use pandeps_core::dependency::{Dependency, Module};
use reqwest::Client;

use crate::backpan::BackpanSource;
use crate::cpan::CpanSource;
use crate::metacpan::MetaCpanSource;
use crate::smartpan::SmartSource;

/// Priority of sources configured without an `N:` prefix.
pub const DEFAULT_PRIORITY: u32 = 1000;

/// Which lookup strategy a source uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Flat index keyed by module name.
    Cpan,
    /// Archival index keyed by `name-version`.
    Backpan,
    /// Live query service.
    SmartPan,
    /// External resolver command plus archive mirror checks.
    MetaCpan,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cpan => "CPAN",
            Self::Backpan => "BackPAN",
            Self::SmartPan => "SmartPAN",
            Self::MetaCpan => "MetaCPAN",
        };
        f.write_str(s)
    }
}

/// A repository that can answer "which module satisfies this dependency?".
///
/// `find` distinguishes "no match" (`Ok(None)`) from a failed lookup
/// (`Err`); the set moves on to the next source in both cases.
#[async_trait]
pub trait Source: Send + Sync + fmt::Debug {
    fn kind(&self) -> SourceKind;

    fn url(&self) -> &str;

    fn priority(&self) -> u32;

    /// Populate the source from its backing index. Query-based sources have
    /// nothing to load.
    async fn load(&mut self) -> miette::Result<()> {
        Ok(())
    }

    async fn find(&self, dep: &Dependency) -> miette::Result<Option<Arc<Module>>>;

    fn describe(&self) -> String {
        format!("[{}] {}: {}", self.priority(), self.kind(), self.url())
    }
}

/// Split an optional `N:` priority prefix off a configured URL.
///
/// `"10:http://mirror"` yields `(10, "http://mirror")`; anything else keeps
/// [`DEFAULT_PRIORITY`].
pub fn parse_priority(raw: &str) -> (u32, &str) {
    if let Some((prefix, rest)) = raw.split_once(':') {
        if !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(priority) = prefix.parse() {
                return (priority, rest);
            }
        }
    }
    (DEFAULT_PRIORITY, raw)
}

/// Sources ordered by ascending priority number. Equal priorities keep their
/// configuration order.
#[derive(Debug, Default)]
pub struct SourceSet {
    sources: Vec<Box<dyn Source>>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a source at its priority position.
    pub fn push(&mut self, source: Box<dyn Source>) {
        let at = self
            .sources
            .iter()
            .position(|s| s.priority() > source.priority())
            .unwrap_or(self.sources.len());
        self.sources.insert(at, source);
    }

    /// Build the sources named by `config`.
    pub fn from_config(config: &Config, client: &Client, cache_root: &Path) -> Self {
        let mut set = Self::new();
        let sources = &config.sources;

        for raw in &sources.smart {
            let (priority, url) = parse_priority(raw);
            set.push(Box::new(SmartSource::new(client.clone(), url, priority)));
        }
        for raw in &sources.cpan {
            let (priority, url) = parse_priority(raw);
            set.push(Box::new(CpanSource::mirror(client.clone(), url, priority)));
        }
        for raw in &sources.backpan {
            let (priority, url) = parse_priority(raw);
            set.push(Box::new(BackpanSource::mirror(client.clone(), url, priority)));
        }
        if sources.default_cpan {
            set.push(Box::new(CpanSource::new(
                client.clone(),
                CPAN_INDEX_URL,
                CPAN_URL,
                DEFAULT_PRIORITY,
            )));
        }
        if sources.metacpan {
            set.push(Box::new(MetaCpanSource::new(
                client.clone(),
                &config.resolver.command,
                &config.install_dir,
                cache_root,
                sources.archive_mirrors.clone(),
                DEFAULT_PRIORITY,
            )));
        }
        if sources.default_backpan {
            set.push(Box::new(BackpanSource::new(
                client.clone(),
                BACKPAN_INDEX_URL,
                BACKPAN_URL,
                DEFAULT_PRIORITY,
            )));
        }
        set
    }

    /// Load every source. A source whose index cannot be loaded is left empty
    /// and reported; the remaining sources stay usable.
    pub async fn load_all(&mut self) {
        for source in &mut self.sources {
            let label = source.describe();
            let pb = pandeps_util::progress::spinner(&format!("Loading {label}"));
            let result = source.load().await;
            pb.finish_and_clear();
            match result {
                Ok(()) => pandeps_util::progress::status("Loaded", &label),
                Err(e) => {
                    tracing::warn!("Error loading {label}: {e}");
                    pandeps_util::progress::status_warn("Skipped", &label);
                }
            }
        }
    }

    /// The module from the first source, in priority order, that has a match.
    pub async fn find(&self, dep: &Dependency) -> Option<Arc<Module>> {
        for source in &self.sources {
            tracing::trace!("Searching {} for {dep}", source.describe());
            match source.find(dep).await {
                Ok(Some(module)) => {
                    tracing::debug!("Found {module} for {dep}");
                    return Some(module);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Error searching {}: {e}", source.describe()),
            }
        }
        tracing::debug!("No source satisfies {dep}");
        None
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Source> {
        self.sources.iter().map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
