// src/dataset/mod.rs

//! Block iteration over prefetched corpora.
//!
//! This module provides the consumer-facing dataset: a block cursor with
//! wraparound addressing over the active corpus, an encoder producing text
//! or token-id blocks, and the prefetch pipeline that keeps corpora staged
//! ahead of consumption.
//!
//! # Example
//!
//! ```ignore
//! use corpus_core::{CorpusConfig, TextCorpusDataset};
//!
//! let config = CorpusConfig::default().with_env_overrides();
//! let mut dataset = TextCorpusDataset::new(config, None)?;
//!
//! loop {
//!     let block = dataset.next_block()?;
//!     // feed block to the training loop
//! }
//! ```

mod block;
mod prefetch;

pub use block::{Block, BlockCursor, BlockEncoder, Tokenizer};
pub use prefetch::TextCorpusDataset;
