//! Host configuration.
//!
//! A host is described in TOML:
//!
//! ```toml
//! scope = "/project"          # optional, expose only this sub-tree
//!
//! [backend]
//! type = "memory"
//!
//! [backend.files]
//! "/project/README.md" = "hello"
//!
//! [watch]
//! capacity = 512
//! ```
//!
//! or, for a directory on disk:
//!
//! ```toml
//! [backend]
//! type = "local"
//! root = "/srv/data"
//! read_only = true
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::backends::{LocalHost, ScopedHost, SimpleMemoryHost};
use crate::error::HostError;
use crate::ops::Host;
use crate::path::HostPath;
use crate::types::FileBuffer;
use crate::watch::{DEFAULT_WATCH_CAPACITY, WatchHub};

/// Errors from loading or building a host configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("local root is not a directory: {0}")]
    MissingRoot(PathBuf),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Top-level host configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    /// Which backend serves the tree.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Expose only this sub-tree of the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Watch delivery settings.
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// In-memory tree, optionally seeded with text files.
    Memory {
        #[serde(default)]
        files: BTreeMap<String, String>,
    },
    /// A directory on disk.
    Local {
        root: PathBuf,
        #[serde(default)]
        read_only: bool,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Memory {
            files: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Broadcast buffer per hub; slower subscribers lag past this.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    DEFAULT_WATCH_CAPACITY
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

impl HostConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load configuration from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded host config");
        Ok(config)
    }

    /// Construct the configured host.
    pub fn build(&self) -> Result<Arc<dyn Host>, ConfigError> {
        let host: Arc<dyn Host> = match &self.backend {
            BackendConfig::Memory { files } => {
                let memory = SimpleMemoryHost::with_hub(WatchHub::new(self.watch.capacity));
                let seeded = files
                    .iter()
                    .map(|(path, text)| Ok((HostPath::new(path)?, FileBuffer::from(text.as_str()))))
                    .collect::<Result<Vec<_>, HostError>>()?;
                memory.seed(seeded)?;
                Arc::new(memory)
            }
            BackendConfig::Local { root, read_only } => {
                if !root.is_dir() {
                    return Err(ConfigError::MissingRoot(root.clone()));
                }
                let mut local = LocalHost::new(root).with_watch_capacity(self.watch.capacity);
                local.set_read_only(*read_only);
                Arc::new(local)
            }
        };

        match &self.scope {
            Some(scope) => {
                let prefix = HostPath::new(scope)?;
                tracing::debug!(scope = %prefix, "scoping host");
                Ok(Arc::new(ScopedHost::new(host, prefix)))
            }
            None => Ok(host),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HostConfig::default();
        assert!(matches!(config.backend, BackendConfig::Memory { ref files } if files.is_empty()));
        assert!(config.scope.is_none());
        assert_eq!(config.watch.capacity, 256);
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = HostConfig::from_toml_str("").unwrap();
        assert!(matches!(config.backend, BackendConfig::Memory { .. }));
    }

    #[tokio::test]
    async fn test_memory_with_files() {
        let config = HostConfig::from_toml_str(
            r#"
[backend]
type = "memory"

[backend.files]
"/docs/readme.md" = "hello"
"notes.txt" = "n"

[watch]
capacity = 8
"#,
        )
        .unwrap();
        assert_eq!(config.watch.capacity, 8);

        let host = config.build().unwrap();
        let readme = HostPath::new("/docs/readme.md").unwrap();
        assert_eq!(host.read(&readme).await.unwrap().as_bytes(), b"hello");
        assert!(host.is_file(&HostPath::new("/notes.txt").unwrap()).await.unwrap());
        assert!(host.capabilities().synchronous);
    }

    #[tokio::test]
    async fn test_scope() {
        let config = HostConfig::from_toml_str(
            r#"
scope = "/project"

[backend]
type = "memory"

[backend.files]
"/project/src/lib.rs" = "lib"
"/outside" = "x"
"#,
        )
        .unwrap();
        let host = config.build().unwrap();
        assert!(host.is_file(&HostPath::new("/src/lib.rs").unwrap()).await.unwrap());
        assert!(!host.exists(&HostPath::new("/outside").unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn test_local_backend() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("on-disk.txt"), "disk").unwrap();
        let toml = format!(
            "[backend]\ntype = \"local\"\nroot = {:?}\nread_only = true\n",
            dir.path().display().to_string()
        );

        let host = HostConfig::from_toml_str(&toml).unwrap().build().unwrap();
        let path = HostPath::new("/on-disk.txt").unwrap();
        assert_eq!(host.read(&path).await.unwrap().as_bytes(), b"disk");
        assert!(matches!(host.delete(&path).await, Err(HostError::ReadOnly)));
        assert!(!host.capabilities().synchronous);
    }

    #[test]
    fn test_missing_local_root() {
        let config = HostConfig {
            backend: BackendConfig::Local {
                root: PathBuf::from("/definitely/not/here"),
                read_only: false,
            },
            ..Default::default()
        };
        assert!(matches!(config.build(), Err(ConfigError::MissingRoot(_))));
    }

    #[test]
    fn test_invalid_seed_path() {
        let config =
            HostConfig::from_toml_str("[backend]\ntype = \"memory\"\n[backend.files]\n\"/../x\" = \"y\"\n")
                .unwrap();
        assert!(matches!(
            config.build(),
            Err(ConfigError::Host(HostError::InvalidPath(_)))
        ));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            HostConfig::from_toml_str("[backend]\ntype = \"tape\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("host.toml");
        std::fs::write(&path, "[watch]\ncapacity = 4\n").unwrap();
        assert_eq!(HostConfig::load(&path).unwrap().watch.capacity, 4);

        assert!(matches!(
            HostConfig::load(dir.path().join("absent.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
