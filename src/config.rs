// src/config.rs

//! Configuration for the corpus assembler.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, and validation of configuration values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CorpusError, Result};

/// Top-level corpus configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub gateway: GatewayConfig,
    pub dataset: DatasetConfig,
    pub cache: CacheConfig,
}

/// Content-addressed gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Endpoint returning raw file bytes for a content-hash.
    pub cat_url: String,
    /// Endpoint returning the `Links` listing for a directory node.
    pub node_get_url: String,
    /// Well-known root manifest hash enumerating all dataset names.
    pub mountain_hash: String,
    /// Maximum number of retries for transient failures.
    pub max_retries: u32,
    /// Initial backoff delay (milliseconds) between retries.
    pub backoff_base_ms: u64,
    /// Maximum backoff delay (milliseconds) between retries.
    pub max_backoff_ms: u64,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            cat_url: "http://ipfs.opentensor.ai/api/v0/cat".to_string(),
            node_get_url: "http://ipfs.opentensor.ai/api/v0/object/get".to_string(),
            mountain_hash: "QmSdDg6V9dgpdAFtActs75Qfc36qJtm9y8a7yrQ1rHm7ZX".to_string(),
            max_retries: 10,
            backoff_base_ms: 500,
            max_backoff_ms: 30_000,
            connect_timeout_ms: 5_000,
            request_timeout_ms: 30_000,
        }
    }
}

/// Dataset sizing and sampling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Number of word tokens per training block.
    pub block_size: usize,
    /// Number of blocks per batch.
    pub batch_size: usize,
    /// Number of batches per epoch; one staged corpus holds
    /// `epoch_length * batch_size * block_size` tokens.
    pub epoch_length: usize,
    /// Byte-size ceiling for one accumulation pass.
    pub max_corpus_size: u64,
    /// Entries at or below this size (bytes) are terminal data files.
    pub datafile_size_bound: u64,
    /// Maximum number of dataset roots pulled per randomized resolution.
    pub max_datasets: usize,
    /// Explicit dataset selection; empty means a randomized selection.
    pub dataset_names: Vec<String>,
    /// Whether blocks are tokenized (requires a tokenizer at construction).
    pub tokenize: bool,
    /// Capacity of the prefetch buffer between producer and consumer.
    pub buffer_size: usize,
    /// Consumer poll interval (milliseconds) while waiting for a batch.
    pub poll_interval_ms: u64,
    /// Maximum directory-descent depth before a branch is abandoned.
    pub max_depth: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            block_size: 128,
            batch_size: 10,
            epoch_length: 100,
            max_corpus_size: 10_000,
            datafile_size_bound: 262_158,
            max_datasets: 3,
            dataset_names: Vec::new(),
            tokenize: false,
            buffer_size: 2,
            poll_interval_ms: 2_000,
            max_depth: 64,
        }
    }
}

impl DatasetConfig {
    /// Token count one staged corpus must hold.
    pub fn data_size(&self) -> usize {
        self.epoch_length * self.batch_size * self.block_size
    }

    /// Consumer poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Local file-cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory where fetched files are cached by name.
    pub data_dir: PathBuf,
    /// Whether fetched files are persisted back to the cache.
    pub save_dataset: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("corpus-data"),
            save_dataset: false,
        }
    }
}

impl CorpusConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CorpusError::config_with_source(
                format!("failed to read config file '{}'", path.display()),
                e,
            )
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| CorpusError::config_with_source("failed to parse TOML config", e))
    }

    /// Apply environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("CORPUS_CAT_URL") {
            self.gateway.cat_url = val;
        }
        if let Ok(val) = std::env::var("CORPUS_NODE_GET_URL") {
            self.gateway.node_get_url = val;
        }
        if let Ok(val) = std::env::var("CORPUS_MOUNTAIN_HASH") {
            self.gateway.mountain_hash = val;
        }
        if let Ok(val) = std::env::var("CORPUS_MAX_RETRIES") {
            if let Ok(v) = val.parse() {
                self.gateway.max_retries = v;
            }
        }
        if let Ok(val) = std::env::var("CORPUS_BLOCK_SIZE") {
            if let Ok(v) = val.parse() {
                self.dataset.block_size = v;
            }
        }
        if let Ok(val) = std::env::var("CORPUS_BATCH_SIZE") {
            if let Ok(v) = val.parse() {
                self.dataset.batch_size = v;
            }
        }
        if let Ok(val) = std::env::var("CORPUS_EPOCH_LENGTH") {
            if let Ok(v) = val.parse() {
                self.dataset.epoch_length = v;
            }
        }
        if let Ok(val) = std::env::var("CORPUS_MAX_CORPUS_SIZE") {
            if let Ok(v) = val.parse() {
                self.dataset.max_corpus_size = v;
            }
        }
        if let Ok(val) = std::env::var("CORPUS_MAX_DATASETS") {
            if let Ok(v) = val.parse() {
                self.dataset.max_datasets = v;
            }
        }
        if let Ok(val) = std::env::var("CORPUS_DATASET_NAMES") {
            self.dataset.dataset_names =
                val.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Ok(val) = std::env::var("CORPUS_DATA_DIR") {
            self.cache.data_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("CORPUS_SAVE_DATASET") {
            if let Ok(v) = val.parse() {
                self.cache.save_dataset = v;
            }
        }
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.cat_url.is_empty() {
            return Err(CorpusError::config("gateway.cat_url must not be empty"));
        }
        if self.gateway.node_get_url.is_empty() {
            return Err(CorpusError::config("gateway.node_get_url must not be empty"));
        }
        if self.gateway.mountain_hash.is_empty() {
            return Err(CorpusError::config("gateway.mountain_hash must not be empty"));
        }
        if self.dataset.block_size == 0 {
            return Err(CorpusError::config("dataset.block_size must be positive"));
        }
        if self.dataset.batch_size == 0 {
            return Err(CorpusError::config("dataset.batch_size must be positive"));
        }
        if self.dataset.epoch_length == 0 {
            return Err(CorpusError::config("dataset.epoch_length must be positive"));
        }
        if self.dataset.buffer_size == 0 {
            return Err(CorpusError::config("dataset.buffer_size must be positive"));
        }
        if self.dataset.max_datasets == 0 {
            return Err(CorpusError::config("dataset.max_datasets must be positive"));
        }
        if self.dataset.max_depth == 0 {
            return Err(CorpusError::config("dataset.max_depth must be positive"));
        }
        Ok(())
    }
}
