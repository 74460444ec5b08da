use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use pandeps_core::dependency::{Dependency, Module};
use reqwest::Client;

use crate::download;
use crate::index;
use crate::source::{Source, SourceKind};

/// Index path below a CPAN mirror.
pub const MIRROR_INDEX_PATH: &str = "modules/02packages.details.txt.gz";

/// A CPAN mirror described by its flat package index.
///
/// Only the version the index currently lists for a module is available;
/// a constraint that rejects it makes the lookup miss.
#[derive(Debug)]
pub struct CpanSource {
    client: Client,
    index: String,
    url: String,
    priority: u32,
    modules: HashMap<String, Arc<Module>>,
}

impl CpanSource {
    pub fn new(
        client: Client,
        index: impl Into<String>,
        url: impl Into<String>,
        priority: u32,
    ) -> Self {
        let url: String = url.into();
        Self {
            client,
            index: index.into(),
            url: url.trim_end_matches('/').to_string(),
            priority,
            modules: HashMap::new(),
        }
    }

    /// A mirror whose index lives at the standard path below `url`.
    pub fn mirror(client: Client, url: &str, priority: u32) -> Self {
        let url = url.trim_end_matches('/');
        Self::new(client, format!("{url}/{MIRROR_INDEX_PATH}"), url, priority)
    }

    /// Replace the module table with the entries of `text`.
    pub fn load_from_text(&mut self, text: &str) {
        self.modules = index::parse_flat_index(text, &self.url)
            .into_iter()
            .map(|m| (m.name.clone(), Arc::new(m)))
            .collect();
        tracing::debug!("Found {} packages in {}", self.modules.len(), self.url);
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[async_trait]
impl Source for CpanSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Cpan
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn load(&mut self) -> miette::Result<()> {
        tracing::debug!("Loading CPAN index {}", self.index);
        let text = download::read_index(&self.client, &self.index).await?;
        self.load_from_text(&text);
        Ok(())
    }

    async fn find(&self, dep: &Dependency) -> miette::Result<Option<Arc<Module>>> {
        let Some(module) = self.modules.get(&dep.name) else {
            return Ok(None);
        };
        if dep.matches_version(&module.version) {
            return Ok(Some(Arc::clone(module)));
        }
        tracing::trace!(
            "{} has {} at {}, which doesn't satisfy {dep}",
            self.url,
            dep.name,
            module.version
        );
        Ok(None)
    }
}
