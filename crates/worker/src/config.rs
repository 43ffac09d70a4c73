// Worker process configuration.
//
// Everything is read from environment variables once at startup. Missing
// storage or committer settings are not rejected here; they surface as an
// initialization failure on the first job, like any other setup error.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Default base for clone URLs.
pub const DEFAULT_REMOTE_BASE: &str = "https://github.com";
/// Default number of keys requested per listing page.
pub const DEFAULT_PAGE_SIZE: i32 = 1000;

/// Which content-store backend the worker reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// S3-compatible object store.
    S3,
    /// A local directory served as a content store.
    Fs { root: PathBuf },
}

/// Content-store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub bucket: String,
    /// Endpoint override for S3-compatible stores.
    pub endpoint_url: Option<String>,
    pub region: String,
    pub page_size: i32,
}

/// Committer name/email applied to every commit made by this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitterIdentity {
    pub name: String,
    pub email: String,
}

impl CommitterIdentity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self { name: name.into(), email: email.into() }
    }

    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && !self.email.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

/// Core worker configuration.
///
/// Constructed via [`WorkerConfig::from_env`].
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub storage: StorageConfig,
    pub committer: CommitterIdentity,
    /// Base the clone URL is built from (`https://github.com` or a local
    /// directory of bare repositories).
    pub remote_base: String,
    /// Directory holding one workspace per user; also the root object keys
    /// are mirrored under.
    pub workspace_root: PathBuf,
    pub listen_addr: SocketAddr,
    /// Log filter directive (e.g. `info`, `ghsync_worker=debug`).
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl WorkerConfig {
    /// Parse configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `STORAGE_BACKEND` | `s3` (`fs` serves `STORAGE_FS_ROOT`) |
    /// | `STORAGE_BUCKET_NAME` | *(empty)* |
    /// | `STORAGE_ENDPOINT_URL` | *(none)* |
    /// | `STORAGE_REGION` | `us-east-1` |
    /// | `STORAGE_PAGE_SIZE` | `1000` |
    /// | `GIT_COMMITTER_NAME` | *(empty)* |
    /// | `GIT_COMMITTER_EMAIL` | *(empty)* |
    /// | `GHSYNC_GIT_REMOTE_BASE` | `https://github.com` |
    /// | `GHSYNC_WORKSPACE_ROOT` | `/tmp` |
    /// | `GHSYNC_HOST` | `0.0.0.0` |
    /// | `PORT` | `8080` |
    /// | `GHSYNC_LOG_FILTER` | `info` |
    /// | `GHSYNC_LOG_FORMAT` | `json` |
    pub fn from_env() -> Self {
        Self::from_env_fn(|key| std::env::var(key))
    }

    /// Testable constructor that accepts an environment lookup function.
    pub(crate) fn from_env_fn<F>(env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let backend = match env("STORAGE_BACKEND").ok().as_deref().map(str::trim) {
            Some("fs") => StorageBackend::Fs {
                root: env("STORAGE_FS_ROOT").map(PathBuf::from).unwrap_or_else(|_| ".".into()),
            },
            _ => StorageBackend::S3,
        };

        let page_size = env("STORAGE_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);

        let storage = StorageConfig {
            backend,
            bucket: env("STORAGE_BUCKET_NAME").unwrap_or_default(),
            endpoint_url: env("STORAGE_ENDPOINT_URL").ok().filter(|v| !v.trim().is_empty()),
            region: env("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".into()),
            page_size,
        };

        let committer = CommitterIdentity {
            name: env("GIT_COMMITTER_NAME").unwrap_or_default(),
            email: env("GIT_COMMITTER_EMAIL").unwrap_or_default(),
        };

        let remote_base =
            env("GHSYNC_GIT_REMOTE_BASE").unwrap_or_else(|_| DEFAULT_REMOTE_BASE.into());
        let workspace_root =
            env("GHSYNC_WORKSPACE_ROOT").map(PathBuf::from).unwrap_or_else(|_| "/tmp".into());

        let host = env("GHSYNC_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8080);
        let listen_addr = format!("{host}:{port}")
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));

        let log_filter = env("GHSYNC_LOG_FILTER").unwrap_or_else(|_| "info".into());
        let log_format = match env("GHSYNC_LOG_FORMAT").ok().as_deref() {
            Some("text") => LogFormat::Text,
            _ => LogFormat::Json,
        };

        Self {
            storage,
            committer,
            remote_base,
            workspace_root,
            listen_addr,
            log_filter,
            log_format,
        }
    }
}
