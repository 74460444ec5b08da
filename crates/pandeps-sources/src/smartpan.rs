use std::sync::Arc;

use async_trait::async_trait;
use pandeps_core::dependency::{Dependency, Module};
use pandeps_core::version::numeric_version;
use pandeps_util::errors::PandepsError;
use reqwest::Client;
use serde::Deserialize;

use crate::source::{Source, SourceKind};

/// A live query service answering `GET /where/<name>/<op><version>`.
#[derive(Debug)]
pub struct SmartSource {
    client: Client,
    url: String,
    priority: u32,
}

/// Query response.
#[derive(Debug, Deserialize)]
pub struct WhereResponse {
    #[serde(default, alias = "Module")]
    pub module: String,
    #[serde(default, alias = "Latest")]
    pub latest: Option<VersionValue>,
    #[serde(default, alias = "Versions")]
    pub versions: Vec<WhereVersion>,
}

#[derive(Debug, Deserialize)]
pub struct WhereVersion {
    #[serde(default, alias = "Path")]
    pub path: String,
    #[serde(alias = "URL")]
    pub url: String,
    #[serde(default, alias = "Index")]
    pub index: String,
    #[serde(alias = "Version")]
    pub version: VersionValue,
}

/// Versions arrive as JSON numbers or strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VersionValue {
    Number(f64),
    Text(String),
}

impl VersionValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Text(s) => numeric_version(s),
        }
    }
}

impl std::fmt::Display for VersionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl WhereResponse {
    /// The entry listed as `latest`, else the first one.
    pub fn pick(&self) -> Option<&WhereVersion> {
        let latest = self.latest.as_ref().map(VersionValue::as_f64);
        latest
            .and_then(|l| self.versions.iter().find(|v| v.version.as_f64() == l))
            .or_else(|| self.versions.first())
    }
}

impl SmartSource {
    pub fn new(client: Client, url: &str, priority: u32) -> Self {
        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            priority,
        }
    }

    fn query_url(&self, dep: &Dependency) -> String {
        format!(
            "{}/where/{}/{}{}",
            self.url,
            dep.name,
            dep.constraint.operator.as_str(),
            dep.constraint.version
        )
    }
}

#[async_trait]
impl Source for SmartSource {
    fn kind(&self) -> SourceKind {
        SourceKind::SmartPan
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    async fn find(&self, dep: &Dependency) -> miette::Result<Option<Arc<Module>>> {
        let url = self.query_url(dep);
        tracing::trace!("Querying {url}");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PandepsError::Network {
                message: format!("Request to {url} failed: {e}"),
            })?;
        if !resp.status().is_success() {
            tracing::trace!("{url} answered {}", resp.status());
            return Ok(None);
        }

        let body: WhereResponse = resp.json().await.map_err(|e| PandepsError::Network {
            message: format!("Invalid response from {url}: {e}"),
        })?;

        let Some(found) = body.pick() else {
            return Ok(None);
        };
        tracing::debug!("{} found {} ({}) at {}", self.url, dep.name, found.version, found.url);
        Ok(Some(Arc::new(Module::new(
            &dep.name,
            found.version.to_string(),
            &self.url,
            &found.url,
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> WhereResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn picks_latest() {
        let r = response(
            r#"{"module":"Foo","latest":1.2,"versions":[
                {"path":"a","url":"authors/id/F/FO/FOO/Foo-1.1.tar.gz","version":1.1},
                {"path":"b","url":"authors/id/F/FO/FOO/Foo-1.2.tar.gz","version":1.2}]}"#,
        );
        let v = r.pick().unwrap();
        assert_eq!(v.url, "authors/id/F/FO/FOO/Foo-1.2.tar.gz");
        assert_eq!(v.version.to_string(), "1.2");
    }

    #[test]
    fn falls_back_to_first() {
        let r = response(
            r#"{"Module":"Foo","Latest":9,"Versions":[{"URL":"x/Foo-1.0.tar.gz","Version":"1.0"}]}"#,
        );
        assert_eq!(r.pick().unwrap().url, "x/Foo-1.0.tar.gz");
    }

    #[test]
    fn empty_versions() {
        let r = response(r#"{"module":"Foo","latest":0,"versions":[]}"#);
        assert!(r.pick().is_none());
    }

    #[test]
    fn query_path() {
        let s = SmartSource::new(Client::new(), "http://smart/", 1);
        assert_eq!(
            s.query_url(&Dependency::parse("Foo::Bar", "== 1.0")),
            "http://smart/where/Foo::Bar/==1.0"
        );
    }
}
