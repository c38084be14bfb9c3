use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sakuin_store::{
    DocumentStore, FileDocumentStore, FileObjectStore, InMemoryDocumentStore,
    InMemoryObjectStore, ObjectStore,
};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Default request body ceiling: 64 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Per-operation timeout applied by the indexer. Unset means no limit.
    pub request_timeout_secs: Option<u64>,
    pub max_body_bytes: usize,
    /// Default log filter when `RUST_LOG` is not set.
    pub log_level: String,
    pub storage: StorageConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            request_timeout_secs: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            log_level: "info".to_owned(),
            storage: StorageConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load a configuration file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(raw: &str) -> ServerResult<Self> {
        toml::from_str(raw).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Where index entries are kept.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Process-local maps; contents vanish on restart.
    #[default]
    Memory,
    /// One file per entry, objects and documents in sibling directories.
    File { root: PathBuf },
}

impl StorageConfig {
    /// Open the object and document stores this configuration names.
    pub fn open(&self) -> ServerResult<(Arc<dyn ObjectStore>, Arc<dyn DocumentStore>)> {
        match self {
            Self::Memory => Ok((
                Arc::new(InMemoryObjectStore::new()),
                Arc::new(InMemoryDocumentStore::new()),
            )),
            Self::File { root } => Ok((
                Arc::new(FileObjectStore::open(root.join("objects"))?),
                Arc::new(FileDocumentStore::open(root.join("documents"))?),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(c.max_body_bytes, 64 * 1024 * 1024);
        assert_eq!(c.log_level, "info");
        assert_eq!(c.storage, StorageConfig::Memory);
        assert!(c.request_timeout().is_none());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let c = ServerConfig::from_toml_str(
            r#"
            bind_addr = "0.0.0.0:9000"
            request_timeout_secs = 5

            [storage]
            backend = "file"
            root = "/var/lib/sakuin"
            "#,
        )
        .unwrap();
        assert_eq!(c.bind_addr.port(), 9000);
        assert_eq!(c.request_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(c.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(
            c.storage,
            StorageConfig::File {
                root: PathBuf::from("/var/lib/sakuin")
            }
        );
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = ServerConfig::from_toml_str("[storage]\nbackend = \"tape\"\n").unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn toml_roundtrip() {
        let c = ServerConfig {
            request_timeout_secs: Some(30),
            storage: StorageConfig::File {
                root: PathBuf::from("data"),
            },
            ..ServerConfig::default()
        };
        let text = c.to_toml().unwrap();
        assert_eq!(ServerConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn load_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sakuin.toml");
        std::fs::write(&path, "log_level = \"debug\"\n").unwrap();
        assert_eq!(ServerConfig::load(&path).unwrap().log_level, "debug");

        let err = ServerConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ServerError::Io(_)));
    }

    #[test]
    fn file_storage_opens_under_root() {
        let dir = TempDir::new().unwrap();
        let storage = StorageConfig::File {
            root: dir.path().to_path_buf(),
        };
        storage.open().unwrap();
        assert!(dir.path().join("objects").is_dir());
        assert!(dir.path().join("documents").is_dir());
    }
}
