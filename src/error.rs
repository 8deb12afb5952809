// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CorpusError {

    #[error("Gateway error for '{endpoint}': {message}")]
    Gateway {
        endpoint: String,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Resolution error for '{name}': {message}")]
    Resolve {
        name: String,
        message: String,
    },

    #[error("Cache error at '{path}': {message}")]
    Cache {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Dataset error: {message}")]
    Dataset {
        message: String,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

pub type Result<T> = std::result::Result<T, CorpusError>;

// Convenience constructors
impl CorpusError {

    pub fn gateway(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Gateway {
            endpoint: endpoint.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn gateway_with_source(
        endpoint: impl Into<String>,
        message: impl Into<String>,
        source: reqwest::Error,
    ) -> Self {
        Self::Gateway {
            endpoint: endpoint.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn resolve(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolve {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn cache(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Cache {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn cache_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Cache {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn dataset(message: impl Into<String>) -> Self {
        Self::Dataset {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
