//! Configuration loading helpers.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::cache::DiskLruCache;
use crate::size;

/// Errors returned by configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error while reading config files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parse error.
    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),
    /// Invalid value for a key.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Raw value string.
        value: String,
    },
    /// Unknown configuration key.
    #[error("unknown config key: {0}")]
    UnknownKey(String),
    /// Missing required configuration field.
    #[error("missing required field: {0}")]
    MissingField(String),
}

/// Parameters for opening a [`DiskLruCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory the cache stores its journal and value files in.
    pub directory: PathBuf,
    /// Application data version baked into the journal header.
    pub app_version: u32,
    /// Number of values per entry.
    pub value_count: usize,
    /// Byte budget for committed values.
    pub max_size: u64,
}

impl CacheConfig {
    /// Create a configuration with default limits for `directory`:
    /// one value per entry, 64 MiB budget, app version 1.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            app_version: 1,
            value_count: 1,
            max_size: 64 * size::MIB,
        }
    }

    /// Set the application data version.
    pub fn with_app_version(mut self, app_version: u32) -> Self {
        self.app_version = app_version;
        self
    }

    /// Set the number of values per entry.
    pub fn with_value_count(mut self, value_count: usize) -> Self {
        self.value_count = value_count;
        self
    }

    /// Set the byte budget.
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    /// Open the cache described by this configuration.
    pub fn open(&self) -> crate::Result<DiskLruCache> {
        DiskLruCache::open(
            &self.directory,
            self.app_version,
            self.value_count,
            self.max_size,
        )
    }
}

/// Top-level configuration schema.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OxicacheConfig {
    /// Cache configuration.
    pub cache: Option<CacheConfigSpec>,
}

impl OxicacheConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Load configuration from the `OXICACHE_CONFIG` env var (if set),
    /// then apply `OXICACHE__section__field` overrides.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let config_path = env::var("OXICACHE_CONFIG").ok();
        let mut config = match config_path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment overrides in-place.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        for (key, value) in env::vars() {
            if !key.starts_with("OXICACHE__") {
                continue;
            }
            let path = key["OXICACHE__".len()..].to_ascii_lowercase();
            let parts: Vec<&str> = path.split("__").collect();
            let value = value.trim().to_string();

            match parts.as_slice() {
                ["cache", "directory"] => {
                    self.cache_mut().directory = Some(PathBuf::from(value));
                }
                ["cache", "app_version"] => {
                    self.cache_mut().app_version = Some(parse_value(&key, &value)?);
                }
                ["cache", "value_count"] => {
                    self.cache_mut().value_count = Some(parse_value(&key, &value)?);
                }
                ["cache", "max_size"] => {
                    self.cache_mut().max_size = Some(parse_value(&key, &value)?);
                }
                _ => return Err(ConfigError::UnknownKey(key)),
            }
        }

        Ok(())
    }

    /// Build a [`CacheConfig`] using defaults plus overrides.
    ///
    /// The directory is the one required field.
    pub fn to_cache_config(&self) -> Result<CacheConfig, ConfigError> {
        let spec = self
            .cache
            .as_ref()
            .ok_or_else(|| ConfigError::MissingField("cache".into()))?;
        let directory = spec
            .directory
            .clone()
            .ok_or_else(|| ConfigError::MissingField("cache.directory".into()))?;

        let mut config = CacheConfig::new(directory);
        spec.apply_to(&mut config);
        Ok(config)
    }

    fn cache_mut(&mut self) -> &mut CacheConfigSpec {
        if self.cache.is_none() {
            self.cache = Some(CacheConfigSpec::default());
        }
        self.cache.as_mut().expect("cache config")
    }
}

/// Cache configuration overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfigSpec {
    /// Cache directory.
    pub directory: Option<PathBuf>,
    /// Application data version.
    pub app_version: Option<u32>,
    /// Number of values per entry.
    pub value_count: Option<usize>,
    /// Byte budget in bytes.
    pub max_size: Option<u64>,
}

impl CacheConfigSpec {
    fn apply_to(&self, config: &mut CacheConfig) {
        if let Some(value) = self.app_version {
            config.app_version = value;
        }
        if let Some(value) = self.value_count {
            config.value_count = value;
        }
        if let Some(value) = self.max_size {
            config.max_size = value;
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
