//! Document fetching with cache freshness.
//!
//! The workbook is re-downloaded only when the remote copy is strictly newer
//! than what we already have. "What we have" is judged by the more reliable
//! of two clocks: the cache file's mtime, and the as-of timestamp embedded in
//! the document itself. A copied or touched cache file has a misleading
//! mtime; when it runs more than a day ahead of the embedded timestamp, the
//! embedded one wins.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info};
use reqwest::blocking::Client;

use crate::error::PipelineError;

/// A document resolved through the cache.
#[derive(Debug, Clone)]
pub struct CachedDocument {
    pub path: PathBuf,
    /// Whether this run downloaded a fresh copy.
    pub refreshed: bool,
}

/// Build the blocking HTTP client all fetches share.
pub fn http_client(user_agent: &str) -> Result<Client, PipelineError> {
    Client::builder()
        .user_agent(user_agent)
        .build()
        .map_err(|e| PipelineError::Config(format!("failed to build HTTP client: {e}")))
}

/// GET a document and return its body.
pub fn fetch_bytes(client: &Client, uri: &str) -> Result<Vec<u8>, PipelineError> {
    let resp = client
        .get(uri)
        .send()
        .map_err(|e| PipelineError::fetch(uri, e))?;
    if !resp.status().is_success() {
        return Err(PipelineError::fetch(uri, format!("status {}", resp.status())));
    }
    let bytes = resp.bytes().map_err(|e| PipelineError::fetch(uri, e))?;
    Ok(bytes.to_vec())
}

/// Decide whether the remote copy must be downloaded.
///
/// `remote == None` (no usable Last-Modified) always downloads; guessing
/// "up to date" without a remote clock would pin a stale cache forever.
pub fn remote_is_newer(
    local_mtime: Option<DateTime<Utc>>,
    embedded_as_of: Option<DateTime<Utc>>,
    remote: Option<DateTime<Utc>>,
) -> bool {
    let Some(remote) = remote else {
        return true;
    };
    let mut local = local_mtime.unwrap_or(DateTime::<Utc>::MIN_UTC);
    if let (Some(mtime), Some(as_of)) = (local_mtime, embedded_as_of) {
        if mtime - as_of > chrono::Duration::days(1) {
            local = as_of;
        }
    }
    remote > local
}

/// GET a document into the cache unless the cached copy is already current.
pub fn fetch_with_freshness(
    client: &Client,
    uri: &str,
    cache_path: &Path,
    embedded_as_of: Option<DateTime<Utc>>,
) -> Result<CachedDocument, PipelineError> {
    let local_mtime = fs::metadata(cache_path)
        .ok()
        .and_then(|m| m.modified().ok())
        .map(DateTime::<Utc>::from);

    let resp = client
        .get(uri)
        .send()
        .map_err(|e| PipelineError::fetch(uri, e))?;
    if !resp.status().is_success() {
        return Err(PipelineError::fetch(uri, format!("status {}", resp.status())));
    }

    let remote = resp
        .headers()
        .get(reqwest::header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date);
    debug!(
        "freshness for {uri}: local mtime {local_mtime:?}, embedded {embedded_as_of:?}, remote {remote:?}"
    );

    if !remote_is_newer(local_mtime, embedded_as_of, remote) {
        info!("cache {} is up to date", cache_path.display());
        return Ok(CachedDocument {
            path: cache_path.to_path_buf(),
            refreshed: false,
        });
    }

    info!("downloading {uri} to {}", cache_path.display());
    let bytes = resp.bytes().map_err(|e| PipelineError::fetch(uri, e))?;
    if let Some(parent) = cache_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            PipelineError::io(format!("create cache directory '{}'", parent.display()), e)
        })?;
    }
    fs::write(cache_path, &bytes).map_err(|e| {
        PipelineError::io(format!("write cache file '{}'", cache_path.display()), e)
    })?;
    Ok(CachedDocument {
        path: cache_path.to_path_buf(),
        refreshed: true,
    })
}

/// Cache file name for a download URI: the last path segment, with any
/// `;jsessionid=`-style suffix stripped.
pub fn cache_file_name(uri: &str) -> Result<String, PipelineError> {
    let url = reqwest::Url::parse(uri)
        .map_err(|e| PipelineError::Config(format!("invalid download URI '{uri}': {e}")))?;
    let last = url
        .path_segments()
        .and_then(|segments| segments.last())
        .unwrap_or("");
    let name = last.split(';').next().unwrap_or("");
    if name.is_empty() {
        return Err(PipelineError::Config(format!(
            "download URI '{uri}' has no file name"
        )));
    }
    Ok(name.to_string())
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
