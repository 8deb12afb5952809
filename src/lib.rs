// src/lib.rs

//! Corpus Assembler - Core Library
//!
//! This crate assembles a continuously refreshed text corpus from a
//! content-addressed store: a retrying gateway client, randomized
//! directory resolution, a best-effort local file cache, corpus
//! accumulation, and a prefetching pipeline exposing fixed-size training
//! blocks to a downstream consumer.

pub mod config;
pub mod error;
pub mod gateway;

// Re-export commonly used types for convenience
pub use config::{CacheConfig, CorpusConfig, DatasetConfig, GatewayConfig};
pub use error::{CorpusError, Result};
pub use gateway::{FetchClient, GatewayResponse, HttpTransport, Method, RetryConfig, Transport};

pub mod cache;
pub mod corpus;
pub mod resolver;
pub use cache::FileCache;
pub use corpus::CorpusAccumulator;
pub use resolver::{DatasetRegistry, DirEntry, DirectoryResolver, Resolution};

pub mod dataset;
pub use dataset::{Block, BlockCursor, BlockEncoder, TextCorpusDataset, Tokenizer};
