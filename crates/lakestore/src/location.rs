//! Storage locations and the object stores behind them
//!
//! A [`Lake`] is an object store plus a root prefix. Input and output
//! locations are each opened as their own `Lake` from a [`StorageConfig`].
//! Credentials in that config are handed straight to the store builder;
//! without them S3 falls back to the standard AWS environment. Nothing here
//! writes to the process environment.

use crate::error::{Result, StoreError};
use diagnostics::*;
use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// A credential value that never appears in logs or debug output.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    #[must_use]
    pub fn as_declassified(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Access-key/secret pair for S3-compatible stores.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: Secret,
    pub secret_access_key: Secret,
    #[serde(default)]
    pub session_token: Option<Secret>,
}

/// Where a lake lives and how to reach it.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// `s3://bucket/prefix`, `s3a://bucket/prefix`, `file:///dir` or a local path
    pub url: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

impl StorageConfig {
    #[must_use]
    pub fn local(path: impl Into<String>) -> Self {
        StorageConfig {
            url: path.into(),
            region: None,
            endpoint: None,
            credentials: None,
        }
    }
}

/// An object store rooted at a prefix.
#[derive(Clone)]
pub struct Lake {
    store: Arc<dyn ObjectStore>,
    root: Path,
    /// Store-level URL for query engines, e.g. `s3://bucket` or `file:///`
    base_url: Url,
    /// Directory backing the store when it is a local filesystem
    local_dir: Option<PathBuf>,
    display: String,
}

impl fmt::Debug for Lake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lake")
            .field("location", &self.display)
            .finish_non_exhaustive()
    }
}

impl Lake {
    /// Open an existing location for reading.
    pub fn open(config: &StorageConfig) -> Result<Self> {
        Self::open_with(config, false)
    }

    /// Open a location for writing, creating a local directory if needed.
    pub fn open_for_write(config: &StorageConfig) -> Result<Self> {
        Self::open_with(config, true)
    }

    fn open_with(config: &StorageConfig, create: bool) -> Result<Self> {
        let raw = config.url.trim();
        if raw.is_empty() {
            return Err(StoreError::invalid_location(raw, "empty url"));
        }

        match raw.split_once("://") {
            Some(("s3" | "s3a", rest)) => Self::open_s3(config, rest),
            Some(("file", _)) => {
                let url = Url::parse(raw)
                    .map_err(|e| StoreError::invalid_location(raw, e.to_string()))?;
                let path = url
                    .to_file_path()
                    .map_err(|_| StoreError::invalid_location(raw, "not a local file path"))?;
                Self::open_local(raw, &path, create)
            }
            Some((scheme, _)) => Err(StoreError::invalid_location(
                raw,
                format!("unsupported scheme '{}'", scheme),
            )),
            None => Self::open_local(raw, std::path::Path::new(raw), create),
        }
    }

    fn open_s3(config: &StorageConfig, rest: &str) -> Result<Self> {
        let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(StoreError::invalid_location(&config.url, "missing bucket"));
        }

        let mut builder = match &config.credentials {
            Some(creds) => {
                let mut b = AmazonS3Builder::new()
                    .with_access_key_id(creds.access_key_id.as_declassified())
                    .with_secret_access_key(creds.secret_access_key.as_declassified());
                if let Some(token) = &creds.session_token {
                    b = b.with_token(token.as_declassified());
                }
                b
            }
            None => AmazonS3Builder::from_env(),
        }
        .with_bucket_name(bucket);

        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }

        let store = builder
            .build()
            .map_err(|e| StoreError::invalid_location(&config.url, e.to_string()))?;

        let base_url = Url::parse(&format!("s3://{}", bucket))
            .map_err(|e| StoreError::invalid_location(&config.url, e.to_string()))?;

        debug!("opened s3 bucket {bucket} prefix {prefix}", bucket: bucket, prefix: prefix);

        Ok(Lake {
            store: Arc::new(store),
            root: Path::from(prefix),
            base_url,
            local_dir: None,
            display: format!("s3://{}/{}", bucket, prefix),
        })
    }

    fn open_local(raw: &str, dir: &std::path::Path, create: bool) -> Result<Self> {
        if create {
            std::fs::create_dir_all(dir)?;
        } else if !dir.is_dir() {
            return Err(StoreError::invalid_location(raw, "directory does not exist"));
        }

        let absolute = std::fs::canonicalize(dir)?;
        let store = LocalFileSystem::new_with_prefix(&absolute)?;
        let base_url = Url::from_directory_path(&absolute)
            .map_err(|_| StoreError::invalid_location(raw, "not an absolute path"))?;

        debug!("opened local lake at {dir}", dir: absolute.to_string_lossy().to_string());

        Ok(Lake {
            store: Arc::new(store),
            root: Path::default(),
            base_url,
            display: absolute.to_string_lossy().to_string(),
            local_dir: Some(absolute),
        })
    }

    /// A process-local lake, used by tests and dry runs.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(InMemory::new()), Path::default())
    }

    /// Wrap an existing store.
    #[must_use]
    pub fn from_store(store: Arc<dyn ObjectStore>, root: Path) -> Self {
        let display = format!("memory:///{}", root);
        let base_url = Url::parse("memory:///").expect("static url");
        Lake {
            store,
            root,
            base_url,
            local_dir: None,
            display,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// URL of the object store itself (bucket or filesystem root).
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Path under the root. Empty segments in `relative` are ignored.
    #[must_use]
    pub fn path(&self, relative: &str) -> Path {
        Path::from(format!("{}/{}", self.root, relative))
    }

    /// Fully qualified URL of a directory under the root, with trailing slash.
    #[must_use]
    pub fn url_for(&self, relative: &str) -> String {
        let mut base = self.base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let path = self.path(relative);
        format!("{}{}/", base, path)
    }
}

impl Lake {
    /// Remove empty directories under `relative`, `relative` included.
    /// Only local lakes have directories; other stores are left alone.
    pub fn prune_empty_dirs(&self, relative: &str) -> Result<()> {
        let Some(dir) = &self.local_dir else {
            return Ok(());
        };
        let target = relative
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(dir.clone(), |path, segment| path.join(segment));
        let _ = prune_dir(&target)?;
        Ok(())
    }
}

/// Returns true when `dir` no longer exists afterwards.
fn prune_dir(dir: &std::path::Path) -> std::io::Result<bool> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e),
    };
    let mut empty = true;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() || !prune_dir(&entry.path())? {
            empty = false;
        }
    }
    if empty {
        std::fs::remove_dir(dir)?;
    }
    Ok(empty)
}

impl fmt::Display for Lake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}
