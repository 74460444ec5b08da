//! Archive download and extraction into the module cache.

use std::path::{Path, PathBuf};

use pandeps_core::dependency::Module;
use pandeps_sources::download;
use pandeps_util::process::{describe_output, CommandBuilder};
use reqwest::Client;

use crate::registry::DedupRegistry;

/// Archive tool used to unpack `.tar.gz` distributions.
pub const TAR: &str = "tar";

/// Downloads and unpacks module archives below a cache root, at most once
/// per cached path.
#[derive(Debug)]
pub struct Fetcher {
    client: Client,
    cache_root: PathBuf,
    inflight: DedupRegistry<PathBuf, Result<PathBuf, String>>,
}

impl Fetcher {
    pub fn new(client: Client, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            client,
            cache_root: cache_root.into(),
            inflight: DedupRegistry::new(),
        }
    }

    /// Make `module`'s archive available locally and return the directory it
    /// was extracted to.
    ///
    /// An archive already present in the cache is neither downloaded nor
    /// extracted again. Concurrent calls for the same archive wait for the
    /// first one and share its outcome.
    pub async fn fetch(&self, module: &Module) -> Result<PathBuf, String> {
        let cached = module.cached_path(&self.cache_root);
        self.inflight
            .run(cached.clone(), || self.fetch_uncached(module, cached))
            .await
    }

    async fn fetch_uncached(&self, module: &Module, cached: PathBuf) -> Result<PathBuf, String> {
        let extracted = module.extracted_path(&self.cache_root);
        if cached.is_file() {
            tracing::debug!("{} is already cached at {}", module, cached.display());
            return Ok(extracted);
        }

        let url = module.download_url();
        pandeps_util::progress::status("Fetching", &format!("{module}"));
        download::download_to_file(&self.client, &url, &cached)
            .await
            .map_err(|e| e.to_string())?;

        let dir = module.download_dir(&self.cache_root);
        extract(&cached, &dir).await?;
        tracing::debug!("Extracted {} to {}", cached.display(), extracted.display());
        Ok(extracted)
    }
}

/// Unpack a gzipped tarball into `dir`.
pub async fn extract(archive: &Path, dir: &Path) -> Result<(), String> {
    let cmd = CommandBuilder::new(TAR)
        .arg("-zxf")
        .arg(archive)
        .arg("-C")
        .arg(dir);
    tracing::trace!("Running {}", cmd.display());
    let output = cmd.exec_async().await.map_err(|e| e.to_string())?;
    if !output.status.success() {
        return Err(format!(
            "{} exited with {}\n{}",
            cmd.display(),
            output.status,
            describe_output(&output)
        ));
    }
    Ok(())
}
