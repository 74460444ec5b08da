use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use pandeps_core::dependency::{Dependency, Module};
use reqwest::Client;

use crate::download;
use crate::index;
use crate::source::{Source, SourceKind};

/// Index path below a BackPAN mirror.
pub const MIRROR_INDEX_PATH: &str = "backpan-index";

/// An archive of every release ever uploaded, keyed by `name-version`.
///
/// Lookups require the exact version named by the constraint.
#[derive(Debug)]
pub struct BackpanSource {
    client: Client,
    index: String,
    url: String,
    priority: u32,
    modules: HashMap<String, Arc<Module>>,
}

impl BackpanSource {
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

    pub fn mirror(client: Client, url: &str, priority: u32) -> Self {
        let url = url.trim_end_matches('/');
        Self::new(client, format!("{url}/{MIRROR_INDEX_PATH}"), url, priority)
    }

    pub fn load_from_text(&mut self, text: &str) {
        self.modules = index::parse_archival_index(text, &self.url)
            .into_iter()
            .map(|m| (m.key(), Arc::new(m)))
            .collect();
        tracing::debug!("Found {} releases in {}", self.modules.len(), self.url);
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[async_trait]
impl Source for BackpanSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Backpan
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn load(&mut self) -> miette::Result<()> {
        tracing::debug!("Loading BackPAN index {}", self.index);
        let text = download::read_index(&self.client, &self.index).await?;
        self.load_from_text(&text);
        Ok(())
    }

    async fn find(&self, dep: &Dependency) -> miette::Result<Option<Arc<Module>>> {
        Ok(self.modules.get(&dep.key()).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = "\
authors/id/F/FO/FOO/Foo-Bar-1.0.tar.gz 1 2
authors/id/F/FO/FOO/Foo-Bar-1.1.tar.gz 1 2
authors/id/F/FO/FOO/Foo-Bar-1.1.zip 1 2
";

    #[tokio::test]
    async fn exact_version_lookup() {
        let mut s = BackpanSource::mirror(Client::new(), "http://backpan", 1000);
        s.load_from_text(INDEX);
        assert_eq!(s.len(), 2);

        let m = s
            .find(&Dependency::parse("Foo::Bar", "1.0"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(m.archive_url, "authors/id/F/FO/FOO/Foo-Bar-1.0.tar.gz");

        assert!(s
            .find(&Dependency::parse("Foo::Bar", ">= 0.5"))
            .await
            .unwrap()
            .is_none());
    }
}
