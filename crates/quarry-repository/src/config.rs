//! Repository configuration types
//!
//! Configuration is an explicit value handed to the repository at
//! construction. It can be built in code or loaded from YAML:
//!
//! ```rust
//! use quarry_repository::RepositoryConfig;
//!
//! let config = RepositoryConfig::from_yaml_str(r#"
//! cache:
//!   enabled: true
//!   ttl_secs: 60
//!   except: [count]
//!   clean:
//!     on_update: false
//! pagination:
//!   default_per_page: 25
//! "#).unwrap();
//!
//! assert!(config.cache.clean.on_create);
//! assert!(!config.cache.clean.on_update);
//! assert_eq!(config.pagination.max_per_page, 100);
//! ```

use quarry_parser::ParserConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Write kinds that may invalidate cached reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteAction {
    Create,
    Update,
    Delete,
}

impl WriteAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteAction::Create => "create",
            WriteAction::Update => "update",
            WriteAction::Delete => "delete",
        }
    }
}

impl std::fmt::Display for WriteAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache clearing after writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    /// Master switch; when off no write clears the cache
    pub enabled: bool,
    pub on_create: bool,
    pub on_update: bool,
    pub on_delete: bool,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            on_create: true,
            on_update: true,
            on_delete: true,
        }
    }
}

impl CleanConfig {
    /// Whether `action` clears cached reads
    pub fn clears_on(&self, action: WriteAction) -> bool {
        self.enabled
            && match action {
                WriteAction::Create => self.on_create,
                WriteAction::Update => self.on_update,
                WriteAction::Delete => self.on_delete,
            }
    }
}

/// Read cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether caching is enabled
    pub enabled: bool,
    /// Time-to-live for cache entries, in seconds
    pub ttl_secs: u64,
    /// When non-empty, only these read methods are cached
    pub only: Vec<String>,
    /// Read methods never cached
    pub except: Vec<String>,
    pub clean: CleanConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 1800, // 30 minutes
            only: Vec::new(),
            except: Vec::new(),
            clean: CleanConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable caching
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = ttl.as_secs();
        self
    }

    /// Cache only the listed read methods
    pub fn only<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = methods.into_iter().map(Into::into).collect();
        self
    }

    /// Never cache the listed read methods
    pub fn except<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.except = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Whether reads through `method` are cached
    pub fn allows(&self, method: &str) -> bool {
        self.enabled
            && (self.only.is_empty() || self.only.iter().any(|m| m == method))
            && !self.except.iter().any(|m| m == method)
    }
}

/// Pagination defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_per_page: usize,
    pub max_per_page: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_per_page: 15,
            max_per_page: 100,
        }
    }
}

/// Repository configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub cache: CacheConfig,
    pub parser: ParserConfig,
    pub pagination: PaginationConfig,
}

impl RepositoryConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: RepositoryConfig =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Yaml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the cache configuration
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Set the parser configuration
    pub fn with_parser(mut self, parser: ParserConfig) -> Self {
        self.parser = parser;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.enabled && self.cache.ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.ttl_secs".to_string(),
                message: "must be positive when caching is enabled".to_string(),
            });
        }

        if let Some(method) = self.cache.only.iter().find(|m| self.cache.except.contains(m)) {
            return Err(ConfigError::InvalidValue {
                field: "cache.except".to_string(),
                message: format!("'{}' is also listed in cache.only", method),
            });
        }

        if self.pagination.default_per_page == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pagination.default_per_page".to_string(),
                message: "must be positive".to_string(),
            });
        }

        if self.pagination.default_per_page > self.pagination.max_per_page {
            return Err(ConfigError::InvalidValue {
                field: "pagination.default_per_page".to_string(),
                message: format!("exceeds max_per_page ({})", self.pagination.max_per_page),
            });
        }

        self.parser.accepted().map_err(|e| ConfigError::InvalidValue {
            field: "parser.accepted_operators".to_string(),
            message: e.to_string(),
        })?;

        Ok(())
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The YAML document could not be read
    Yaml(String),
    /// A field holds an unusable value
    InvalidValue { field: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Yaml(message) => write!(f, "Failed to parse YAML: {}", message),
            ConfigError::InvalidValue { field, message } => write!(f, "{} {}", field, message),
        }
    }
}

impl std::error::Error for ConfigError {}
