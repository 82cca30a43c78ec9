//! Snapshot downloads.
//!
//! Every URL maps to a deterministic file under `<output>/snapshot/`, named
//! by the SHA-256 digest of the URL. Later stages only ever read those
//! files, so a run can be repeated offline once the snapshots exist.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::concurrent::{PoolKind, WorkerPool};
use crate::error::{ChainError, Result, SourceError, SourceResult};

/// Default HTTP timeout for a single download.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Extension used when none is configured and the URL has none.
const FALLBACK_EXTENSION: &str = "dat";

const CLIENT_USER_AGENT: &str = concat!("epi-pipeline/", env!("CARGO_PKG_VERSION"));

/// One resource a source downloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSpec {
    pub url: String,
    /// Forced snapshot extension, for URLs that do not end in one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    #[serde(default)]
    pub skip_existing: bool,
}

impl FetchSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ext: None,
            skip_existing: false,
        }
    }

    /// Extension of the snapshot file: `ext`, the URL extension or `dat`.
    pub fn extension(&self) -> String {
        match &self.ext {
            Some(ext) => ext.trim_start_matches('.').to_string(),
            None => url_extension(&self.url).unwrap_or_else(|| FALLBACK_EXTENSION.to_string()),
        }
    }
}

/// Extension of the last path segment of `url`, ignoring query and fragment.
fn url_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let path = path.split_once("://").map_or(path, |(_, rest)| rest);
    let segment = path.split_once('/').map(|(_, rest)| rest)?.rsplit('/').next()?;
    let (_, ext) = segment.rsplit_once('.')?;
    let valid = !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}

/// Deterministic snapshot path for `url`.
pub fn snapshot_path(output_folder: &Path, url: &str, ext: &str) -> PathBuf {
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    output_folder.join("snapshot").join(format!("{digest}.{ext}"))
}

/// Map of URLs to already-downloaded local files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheSitemap {
    entries: BTreeMap<String, PathBuf>,
}

impl CacheSitemap {
    /// Read a JSON object of `url -> path`. Relative paths are resolved
    /// against the sitemap's own folder.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| ChainError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut sitemap: Self =
            serde_json::from_str(&text).map_err(|error| ChainError::CacheSitemap {
                path: path.to_path_buf(),
                message: error.to_string(),
            })?;
        if let Some(base) = path.parent() {
            for local in sitemap.entries.values_mut() {
                if local.is_relative() {
                    *local = base.join(&*local);
                }
            }
        }
        debug!(path = %path.display(), entries = sitemap.entries.len(), "cache sitemap loaded");
        Ok(sitemap)
    }

    pub fn insert(&mut self, url: impl Into<String>, path: impl Into<PathBuf>) {
        self.entries.insert(url.into(), path.into());
    }

    pub fn get(&self, url: &str) -> Option<&Path> {
        self.entries.get(url).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything the fetch stage needs from the chain.
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub output_folder: PathBuf,
    pub cache: CacheSitemap,
    pub timeout: Duration,
    /// Reuse present snapshots even when a download does not ask for it.
    pub skip_existing: bool,
    pub pool: WorkerPool,
}

impl FetchContext {
    pub fn new(output_folder: impl Into<PathBuf>) -> Self {
        Self {
            output_folder: output_folder.into(),
            cache: CacheSitemap::default(),
            timeout: DEFAULT_FETCH_TIMEOUT,
            skip_existing: false,
            pool: WorkerPool::new(PoolKind::Io),
        }
    }

    fn client(&self) -> SourceResult<Client> {
        Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|error| SourceError::Network {
                url: String::new(),
                message: error.to_string(),
            })
    }
}

/// Download `spec` into its snapshot path and return that path.
///
/// A cache sitemap entry pointing at an existing file short-circuits the
/// network. `skip_existing` returns a present snapshot untouched and is
/// ignored when the snapshot does not exist yet.
pub fn download_snapshot(client: &Client, ctx: &FetchContext, spec: &FetchSpec) -> SourceResult<PathBuf> {
    if let Some(cached) = ctx.cache.get(&spec.url)
        && cached.is_file()
    {
        debug!(url = %spec.url, path = %cached.display(), "cache hit");
        return Ok(cached.to_path_buf());
    }

    let target = snapshot_path(&ctx.output_folder, &spec.url, &spec.extension());
    if (spec.skip_existing || ctx.skip_existing) && target.is_file() {
        debug!(url = %spec.url, path = %target.display(), "reusing snapshot");
        return Ok(target);
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|source| SourceError::io(parent, source))?;
    }

    let network = |error: reqwest::Error| SourceError::Network {
        url: spec.url.clone(),
        message: error.to_string(),
    };
    info!(url = %spec.url, "downloading");
    let bytes = client
        .get(&spec.url)
        .header(USER_AGENT, CLIENT_USER_AGENT)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .and_then(reqwest::blocking::Response::bytes)
        .map_err(network)?;

    let partial = target.with_extension("part");
    fs::write(&partial, &bytes).map_err(|source| SourceError::io(&partial, source))?;
    fs::rename(&partial, &target).map_err(|source| SourceError::io(&target, source))?;
    debug!(url = %spec.url, bytes = bytes.len(), path = %target.display(), "snapshot written");
    Ok(target)
}

/// Download every URL through the I/O pool. Paths come back in input order;
/// the first failure fails the whole fetch.
pub fn fetch_all(ctx: &FetchContext, specs: &[FetchSpec]) -> SourceResult<Vec<PathBuf>> {
    if specs.is_empty() {
        return Ok(Vec::new());
    }
    let client = ctx.client()?;
    ctx.pool
        .map(specs, |spec| download_snapshot(&client, ctx, spec))
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_comes_from_url_path() {
        assert_eq!(FetchSpec::new("https://host/a/b.CSV").extension(), "csv");
        assert_eq!(FetchSpec::new("https://host/data.json?x=1.5").extension(), "json");
        assert_eq!(FetchSpec::new("https://host.org/download").extension(), "dat");
        assert_eq!(FetchSpec::new("https://host.org").extension(), "dat");

        let forced = FetchSpec {
            ext: Some(".xlsx".to_string()),
            ..FetchSpec::new("https://host/download")
        };
        assert_eq!(forced.extension(), "xlsx");
    }

    #[test]
    fn snapshot_path_is_deterministic() {
        let root = Path::new("/out");
        let first = snapshot_path(root, "https://host/x.csv", "csv");
        let second = snapshot_path(root, "https://host/x.csv", "csv");
        let other = snapshot_path(root, "https://host/y.csv", "csv");
        assert_eq!(first, second);
        assert_ne!(first, other);
        assert!(first.starts_with("/out/snapshot"));
        let name = first.file_name().and_then(|n| n.to_str()).unwrap();
        assert_eq!(name.len(), 64 + ".csv".len());
    }
}
