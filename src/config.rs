//! Store configuration
//!
//! TigerStyle: Defaults in constants, overrides explicit.
//!
//! Sources, later wins:
//! 1. [`StoreConfig::default`]
//! 2. a JSON file (`~` expanded)
//! 3. `ODDSTORE_*` environment variables (a `.env` file is read first)
//!
//! The `dynamodb` backend runs on simulated tables unless `dynamo_target` is
//! `aws`, in which case the AWS SDK's usual environment (credentials chain,
//! `AWS_REGION`) applies, refined by `dynamo_region`/`dynamo_endpoint`.

use std::path::Path;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{
    BUCKET_PREFIX_DEFAULT, CONTENT_TYPES_DEFAULT, KEY_SEPARATOR, SCAN_LIMIT_DEFAULT,
    SCAN_LIMIT_MAX, SEARCH_TYPES_DEFAULT, TABLE_PREFIX_DEFAULT,
};
use crate::error::{StoreError, StoreResult};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "ODDSTORE_";

/// Adapter that owns the content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// `MemoryStore` (get/set only)
    Memory,
    /// `DynamoStore`
    #[default]
    Dynamodb,
    /// `RiakStore`
    Riak,
}

/// DynamoDB client flavor to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DynamoClientShape {
    /// Client with awaitable calls
    #[default]
    Promise,
    /// Callback-only client
    Callback,
}

/// DynamoDB the `dynamodb` backend talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DynamoTarget {
    /// In-process tables, created at startup
    #[default]
    Simulated,
    /// DynamoDB through the AWS SDK
    Aws,
}

/// Store layer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Adapter for content types
    pub backend: BackendKind,
    /// Content types registered with the backend
    pub types: Vec<String>,
    /// Types the search index covers
    pub search_types: Vec<String>,
    /// DynamoDB table name prefix
    pub table_prefix: String,
    /// Riak bucket name prefix
    pub bucket_prefix: String,
    /// `scan` limit when the caller gives none
    pub scan_limit_default: usize,
    /// DynamoDB client flavor
    pub dynamo_client_shape: DynamoClientShape,
    /// Simulated tables or a real DynamoDB
    pub dynamo_target: DynamoTarget,
    /// Region for the AWS target; the AWS environment decides when unset
    pub dynamo_region: Option<String>,
    /// Endpoint for the AWS target, e.g. a local DynamoDB
    pub dynamo_endpoint: Option<String>,
    /// Create missing tables at startup (AWS target)
    pub dynamo_create_tables: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            types: CONTENT_TYPES_DEFAULT.iter().map(|t| (*t).to_string()).collect(),
            search_types: SEARCH_TYPES_DEFAULT.iter().map(|t| (*t).to_string()).collect(),
            table_prefix: TABLE_PREFIX_DEFAULT.to_string(),
            bucket_prefix: BUCKET_PREFIX_DEFAULT.to_string(),
            scan_limit_default: SCAN_LIMIT_DEFAULT,
            dynamo_client_shape: DynamoClientShape::default(),
            dynamo_target: DynamoTarget::default(),
            dynamo_region: None,
            dynamo_endpoint: None,
            dynamo_create_tables: false,
        }
    }
}

impl StoreConfig {
    /// Read a JSON file. Missing fields take defaults.
    ///
    /// # Errors
    /// `Config` when the file cannot be read or parsed.
    pub fn from_file(path: &str) -> StoreResult<Self> {
        let expanded = shellexpand::tilde(path).to_string();
        let text = std::fs::read_to_string(Path::new(&expanded))
            .map_err(|e| StoreError::Config(format!("reading {expanded}: {e}")))?;
        serde_json::from_str(&text).map_err(|e| StoreError::Config(format!("parsing {expanded}: {e}")))
    }

    /// Defaults with `ODDSTORE_*` overrides from the process environment.
    ///
    /// # Errors
    /// `Config` for unparseable values.
    pub fn from_env() -> StoreResult<Self> {
        Self::default().with_overrides(env_var)
    }

    /// Apply overrides from `lookup`, which maps full variable names to values.
    ///
    /// # Errors
    /// `Config` for unparseable values.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> StoreResult<Self> {
        let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}")).filter(|v| !v.trim().is_empty());

        if let Some(value) = var("BACKEND") {
            self.backend = parse_enum("BACKEND", &value)?;
        }
        if let Some(value) = var("TYPES") {
            self.types = split_list(&value);
        }
        if let Some(value) = var("SEARCH_TYPES") {
            self.search_types = split_list(&value);
        }
        if let Some(value) = var("TABLE_PREFIX") {
            self.table_prefix = value;
        }
        if let Some(value) = var("BUCKET_PREFIX") {
            self.bucket_prefix = value;
        }
        if let Some(value) = var("SCAN_LIMIT") {
            self.scan_limit_default = value.trim().parse().map_err(|_| {
                StoreError::Config(format!("{ENV_PREFIX}SCAN_LIMIT must be a positive integer, got {value:?}"))
            })?;
        }
        if let Some(value) = var("DYNAMO_CLIENT_SHAPE") {
            self.dynamo_client_shape = parse_enum("DYNAMO_CLIENT_SHAPE", &value)?;
        }
        if let Some(value) = var("DYNAMO_TARGET") {
            self.dynamo_target = parse_enum("DYNAMO_TARGET", &value)?;
        }
        if let Some(value) = var("DYNAMO_REGION") {
            self.dynamo_region = Some(value);
        }
        if let Some(value) = var("DYNAMO_ENDPOINT") {
            self.dynamo_endpoint = Some(value);
        }
        if let Some(value) = var("DYNAMO_CREATE_TABLES") {
            self.dynamo_create_tables = parse_flag("DYNAMO_CREATE_TABLES", &value)?;
        }
        Ok(self)
    }

    /// File (when given), then `.env` and environment overrides, then validation.
    ///
    /// # Errors
    /// `Config` for unreadable files, bad overrides, or invalid values.
    pub fn load(path: Option<&str>) -> StoreResult<Self> {
        if let Ok(env_file) = dotenvy::dotenv() {
            tracing::debug!(path = %env_file.display(), "loaded .env");
        }
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = base.with_overrides(env_var)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants.
    ///
    /// # Errors
    /// `Config` for empty type lists, separator-bearing type names, or a
    /// scan default outside `1..=SCAN_LIMIT_MAX`.
    pub fn validate(&self) -> StoreResult<()> {
        if self.types.is_empty() {
            return Err(StoreError::Config("types must not be empty".to_string()));
        }
        for name in self.types.iter().chain(&self.search_types) {
            if name.is_empty() || name.contains(KEY_SEPARATOR) {
                return Err(StoreError::Config(format!("invalid type name {name:?}")));
            }
        }
        if !(1..=SCAN_LIMIT_MAX).contains(&self.scan_limit_default) {
            return Err(StoreError::Config(format!(
                "scan_limit_default must be in 1..={SCAN_LIMIT_MAX}, got {}",
                self.scan_limit_default
            )));
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(suffix: &str, value: &str) -> StoreResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(StoreError::Config(format!("{ENV_PREFIX}{suffix}: expected a boolean, got {value:?}"))),
    }
}

fn parse_enum<T: DeserializeOwned>(suffix: &str, value: &str) -> StoreResult<T> {
    serde_json::from_value(Value::String(value.trim().to_lowercase()))
        .map_err(|_| StoreError::Config(format!("{ENV_PREFIX}{suffix}: unknown value {value:?}")))
}
