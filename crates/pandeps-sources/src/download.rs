//! HTTP transfers: index downloads, archive streaming and HEAD checks.

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use flate2::read::GzDecoder;
use futures_util::StreamExt;
use pandeps_util::errors::PandepsError;
use reqwest::{Client, StatusCode};
use tokio::io::AsyncWriteExt;

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Build the shared reqwest client used by every source and the fetcher.
pub fn build_client() -> miette::Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("pandeps/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| {
            PandepsError::Network {
                message: format!("Failed to create HTTP client: {e}"),
            }
            .into()
        })
}

/// Download raw bytes from a URL, retrying server errors and timeouts.
///
/// Returns `Ok(None)` for 404.
pub async fn download_bytes(client: &Client, url: &str) -> miette::Result<Option<Vec<u8>>> {
    let mut last_err = String::new();

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            tokio::time::sleep(RETRY_DELAY * attempt).await;
        }

        match client.get(url).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status == StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                if status.is_server_error() {
                    last_err = format!("HTTP {status} from {url}");
                    continue;
                }
                if !status.is_success() {
                    return Err(PandepsError::Network {
                        message: format!("HTTP {status} fetching {url}"),
                    }
                    .into());
                }

                let bytes = resp.bytes().await.map_err(|e| PandepsError::Network {
                    message: format!("Failed to read response from {url}: {e}"),
                })?;
                return Ok(Some(bytes.to_vec()));
            }
            Err(e) if e.is_timeout() || e.is_connect() => {
                last_err = format!("{e}");
                continue;
            }
            Err(e) => {
                return Err(PandepsError::Network {
                    message: format!("Request to {url} failed: {e}"),
                }
                .into());
            }
        }
    }

    Err(PandepsError::Network {
        message: format!("Failed after {MAX_RETRIES} retries for {url}: {last_err}"),
    }
    .into())
}

/// Stream the body of `url` into `dest`.
///
/// Any non-2xx status is an error. The body is written to a sibling `.part`
/// file and renamed into place, so `dest` only ever holds a complete archive.
pub async fn download_to_file(client: &Client, url: &str, dest: &Path) -> miette::Result<u64> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| PandepsError::Fetch {
            message: format!("Request to {url} failed: {e}"),
        })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(PandepsError::Fetch {
            message: format!("HTTP {status} fetching {url}"),
        }
        .into());
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(PandepsError::from)?;
    }

    let mut part = dest.as_os_str().to_owned();
    part.push(".part");
    let part = Path::new(&part);

    let mut file = tokio::fs::File::create(part)
        .await
        .map_err(PandepsError::from)?;
    let mut written = 0u64;
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| PandepsError::Fetch {
            message: format!("Failed to read {url}: {e}"),
        })?;
        file.write_all(&chunk).await.map_err(PandepsError::from)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(PandepsError::from)?;
    drop(file);

    tokio::fs::rename(part, dest)
        .await
        .map_err(PandepsError::from)?;
    tracing::debug!("Downloaded {written} bytes from {url} to {}", dest.display());
    Ok(written)
}

/// HEAD `url` and report whether it answered `200 OK`.
pub async fn exists(client: &Client, url: &str) -> bool {
    match client.head(url).send().await {
        Ok(resp) => {
            tracing::trace!("HEAD {url}: {}", resp.status());
            resp.status() == StatusCode::OK
        }
        Err(e) => {
            tracing::trace!("HEAD {url} failed: {e}");
            false
        }
    }
}

/// Read an index from an `http(s)://` URL or a local path, gunzipping it if needed.
pub async fn read_index(client: &Client, location: &str) -> miette::Result<String> {
    let bytes = if is_remote(location) {
        download_bytes(client, location)
            .await?
            .ok_or_else(|| PandepsError::Network {
                message: format!("Index not found: {location}"),
            })?
    } else {
        tokio::fs::read(location)
            .await
            .map_err(|e| PandepsError::Network {
                message: format!("Failed to read index {location}: {e}"),
            })?
    };
    decode_index(&bytes).map_err(|e| {
        PandepsError::Network {
            message: format!("Failed to decompress index {location}: {e}"),
        }
        .into()
    })
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Decode index bytes as text, inflating gzip bodies.
pub fn decode_index(bytes: &[u8]) -> std::io::Result<String> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut text = String::new();
        GzDecoder::new(bytes).read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}
