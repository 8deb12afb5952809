// src/dataset/block.rs

//! Fixed-size block view over an in-memory corpus.
//!
//! The `BlockCursor` is an explicit stateful view: it owns the active
//! corpus, addresses blocks with wraparound modulo indexing, and tracks a
//! sequential position that `swap` restarts. The `BlockEncoder` turns a
//! word block into consumer output, either joined text or token ids from
//! an external tokenizer.

use std::sync::Arc;

use crate::config::DatasetConfig;
use crate::error::{CorpusError, Result};

/// External tokenizer collaborator: one string in, integer ids out.
pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Vec<i64>;
}

/// One consumer-facing block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Text(String),
    Tokens(Vec<i64>),
}

/// Stateful cursor over the active corpus.
#[derive(Debug)]
pub struct BlockCursor {
    corpus: Vec<String>,
    block_size: usize,
    next_index: usize,
}

impl BlockCursor {
    /// Creates an empty cursor; `swap` installs the first corpus.
    pub fn new(block_size: usize) -> Self {
        Self {
            corpus: Vec::new(),
            block_size,
            next_index: 0,
        }
    }

    /// Installs a fresh corpus and restarts the position.
    pub fn swap(&mut self, corpus: Vec<String>) {
        self.corpus = corpus;
        self.next_index = 0;
    }

    /// Number of whole blocks in the active corpus.
    pub fn len(&self) -> usize {
        if self.corpus.is_empty() || self.block_size == 0 {
            return 0;
        }
        self.corpus.len() / self.block_size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current sequential position (next block index).
    pub fn position(&self) -> usize {
        self.next_index
    }

    /// Restarts the sequential position without swapping the corpus.
    pub fn reset(&mut self) {
        self.next_index = 0;
    }

    /// Returns the block at `index` with wraparound addressing.
    ///
    /// The start offset is `(index * block_size) % corpus_len`, so any
    /// non-negative index is valid; a slice running past the physical end
    /// of the corpus yields a short tail block rather than wrapping its
    /// contents.
    pub fn block(&self, index: usize) -> Option<&[String]> {
        if self.corpus.is_empty() || self.block_size == 0 {
            return None;
        }
        let start = (index * self.block_size) % self.corpus.len();
        let end = (start + self.block_size).min(self.corpus.len());
        Some(&self.corpus[start..end])
    }

    /// Returns the next sequential block, or `None` once the whole blocks
    /// of the active corpus are spent.
    pub fn next_block(&mut self) -> Option<&[String]> {
        if self.next_index >= self.len() {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;
        self.block(index)
    }

    pub fn is_exhausted(&self) -> bool {
        self.next_index >= self.len()
    }
}

/// Turns word blocks into consumer output.
pub struct BlockEncoder {
    block_size: usize,
    tokenizer: Option<Arc<dyn Tokenizer>>,
}

impl BlockEncoder {
    /// Tokenization is a construction-time decision: requesting it without
    /// supplying a tokenizer is a configuration error here, not a failure
    /// at first use.
    pub fn new(config: &DatasetConfig, tokenizer: Option<Arc<dyn Tokenizer>>) -> Result<Self> {
        if config.tokenize && tokenizer.is_none() {
            return Err(CorpusError::config(
                "unsupported configuration: tokenize enabled but no tokenizer supplied",
            ));
        }
        Ok(Self {
            block_size: config.block_size,
            tokenizer: if config.tokenize { tokenizer } else { None },
        })
    }

    /// Encodes one word block: joined text, or token ids truncated to
    /// `block_size` elements when a tokenizer is installed.
    pub fn encode(&self, words: &[String]) -> Block {
        let text = words.join(" ");
        match &self.tokenizer {
            Some(tokenizer) => {
                let mut ids = tokenizer.encode(&text);
                ids.truncate(self.block_size);
                Block::Tokens(ids)
            }
            None => Block::Text(text),
        }
    }
}
