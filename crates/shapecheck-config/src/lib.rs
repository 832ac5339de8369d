//! Configuration for shapecheck.
//!
//! Loaded from `shapecheck.toml` or `shapecheck.json`. Every section is
//! optional; missing keys take their defaults.
//!
//! ```toml
//! enabled = true
//! strict = false
//! export_only = false
//!
//! [cache]
//! enabled = true
//! max_size = 1000
//!
//! [incremental]
//! enabled = true
//! cache_path = ".shapecheck/files.json"
//!
//! [parallel]
//! enabled = true
//! workers = 3
//! batch_size = 50
//!
//! [validators]
//! email = "z.string().email()"
//! ```

pub mod overrides;

pub use overrides::{ContextOverride, ContextRecord, DetailedOverride, FieldOverride, OverrideConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File names probed by [`ShapecheckConfig::discover`], in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["shapecheck.toml", "shapecheck.json"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("unsupported config format: {0} (expected .toml or .json)")]
    UnknownFormat(PathBuf),
}

/// Global schema cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Maximum number of cached schemas; least recently used are evicted.
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 1000,
        }
    }
}

/// Incremental mode: skip documents whose content has not changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncrementalConfig {
    pub enabled: bool,
    /// Sidecar file holding file records between sessions.
    pub cache_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    pub enabled: bool,
    /// Worker count; defaults to available parallelism minus one.
    pub workers: Option<usize>,
    /// Declarations per work unit.
    pub batch_size: usize,
    /// Upper bound on waiting for workers at shutdown.
    pub shutdown_timeout_ms: u64,
    /// Upper bound on waiting for one work unit before generating it in
    /// process instead.
    pub task_timeout_ms: u64,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            workers: None,
            batch_size: 50,
            shutdown_timeout_ms: 5000,
            task_timeout_ms: 30_000,
        }
    }
}

impl ParallelConfig {
    /// Effective worker count, never less than one.
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get().saturating_sub(1))
                    .unwrap_or(1)
            })
            .max(1)
    }

    /// Effective batch size, never less than one.
    pub fn batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapecheckConfig {
    /// Generation on/off.
    pub enabled: bool,
    /// Report fallbacks as errors instead of warnings.
    pub strict: bool,
    /// Generate only exported declarations (and what they reference).
    pub export_only: bool,
    pub cache: CacheConfig,
    pub incremental: IncrementalConfig,
    pub parallel: ParallelConfig,
    #[serde(flatten)]
    pub overrides: OverrideConfig,
}

impl Default for ShapecheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strict: false,
            export_only: false,
            cache: CacheConfig::default(),
            incremental: IncrementalConfig::default(),
            parallel: ParallelConfig::default(),
            overrides: OverrideConfig::default(),
        }
    }
}

impl ShapecheckConfig {
    /// Load from a file, choosing the format by extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&text).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            }),
            Some("json") => serde_json::from_str(&text).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            }),
            _ => Err(ConfigError::UnknownFormat(path.to_path_buf())),
        }
    }

    /// Load the first config file found in `dir`, or defaults if none.
    pub fn discover(dir: &Path) -> Result<Self, ConfigError> {
        for name in CONFIG_FILE_NAMES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Self::load(&candidate);
            }
        }
        Ok(Self::default())
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ShapecheckConfig::from_toml_str("").unwrap();
        assert!(config.enabled);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.max_size, 1000);
        assert!(!config.parallel.enabled);
        assert!(config.overrides.is_empty());
    }

    #[test]
    fn test_full_toml() {
        let config = ShapecheckConfig::from_toml_str(
            r#"
            strict = true
            export_only = true

            [cache]
            max_size = 10

            [incremental]
            enabled = true
            cache_path = ".shapecheck/files.json"

            [parallel]
            enabled = true
            workers = 2
            batch_size = 5

            [validators]
            email = "z.string().email()"

            [contexts.User]
            email = "companyEmail"
            "#,
        )
        .unwrap();

        assert!(config.strict);
        assert!(config.export_only);
        assert_eq!(config.cache.max_size, 10);
        assert!(config.cache.enabled);
        assert_eq!(
            config.incremental.cache_path.as_deref(),
            Some(Path::new(".shapecheck/files.json"))
        );
        assert_eq!(config.parallel.worker_count(), 2);
        assert_eq!(config.parallel.batch_size(), 5);
        assert_eq!(
            config.overrides.validators["email"].validator(),
            "z.string().email()"
        );
        assert!(config.overrides.contexts.contains_key("User"));
    }

    #[test]
    fn test_worker_count_minimum() {
        let parallel = ParallelConfig {
            workers: Some(0),
            ..Default::default()
        };
        assert_eq!(parallel.worker_count(), 1);
        assert!(ParallelConfig::default().worker_count() >= 1);
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("shapecheck.json");
        std::fs::write(&json, r#"{"strict": true, "validators": {"id": "z.string().uuid()"}}"#)
            .unwrap();
        let config = ShapecheckConfig::discover(dir.path()).unwrap();
        assert!(config.strict);
        assert_eq!(config.overrides.validators["id"].validator(), "z.string().uuid()");

        let yaml = dir.path().join("shapecheck.yaml");
        std::fs::write(&yaml, "strict: true").unwrap();
        assert!(matches!(
            ShapecheckConfig::load(&yaml),
            Err(ConfigError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_discover_without_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            ShapecheckConfig::discover(dir.path()).unwrap(),
            ShapecheckConfig::default()
        );
    }
}
