// src/corpus.rs

//! Corpus accumulation: one pass over the remote dataset graph.
//!
//! A pass resolves a dataset selection into directory entries, walks each
//! entry down to a terminal data file, pulls its text through the cache,
//! and accumulates whitespace-split word tokens until both the byte-size
//! ceiling is exceeded and the minimum token count is met. Every failure
//! below this level is a skip, never a termination: a pass always returns
//! a corpus, possibly empty.

use rand::seq::SliceRandom;

use crate::cache::FileCache;
use crate::config::DatasetConfig;
use crate::gateway::FetchClient;
use crate::resolver::{DirectoryResolver, Resolution};

pub struct CorpusAccumulator {
    resolver: DirectoryResolver,
    cache: FileCache,
    client: FetchClient,
    dataset_names: Vec<String>,
    max_corpus_size: u64,
}

impl CorpusAccumulator {
    pub fn new(
        resolver: DirectoryResolver,
        cache: FileCache,
        client: FetchClient,
        config: &DatasetConfig,
    ) -> Self {
        Self {
            resolver,
            cache,
            client,
            dataset_names: config.dataset_names.clone(),
            max_corpus_size: config.max_corpus_size,
        }
    }

    /// Builds one corpus of word tokens.
    ///
    /// The loop keeps pulling files while the cumulative byte size is within
    /// `max_corpus_size` **or** the token count is below `min_len`; it stops
    /// only once both thresholds are crossed, or when one pass over the
    /// shuffled entry list is spent (callers re-invoke for more). Individual
    /// resolution or fetch failures contribute nothing and the pass moves on.
    pub fn build(&self, min_len: usize) -> Vec<String> {
        tracing::info!("retrieving dataset files from the gateway");

        let mut entries = if self.dataset_names.is_empty() {
            self.resolver.resolve_all()
        } else {
            self.resolver.resolve_named(&self.dataset_names)
        };

        if entries.is_empty() {
            tracing::error!("directory listing is empty, nothing to accumulate");
            return Vec::new();
        }

        entries.shuffle(&mut rand::rng());

        let mut corpus: Vec<String> = Vec::new();
        let mut total_size: u64 = 0;
        let mut total_len: usize = 0;

        for entry in &entries {
            if total_size > self.max_corpus_size && total_len >= min_len {
                break;
            }

            let file = match self.resolver.extract_datafile(entry) {
                Resolution::Found(file) => file,
                Resolution::Empty | Resolution::Unavailable => continue,
            };

            let Some(text) = self.cache.get_text(&file, &self.client) else {
                continue;
            };

            let before = corpus.len();
            corpus.extend(text.split_whitespace().map(str::to_string));
            total_len += corpus.len() - before;
            total_size += file.size;
        }

        if total_size <= self.max_corpus_size || total_len < min_len {
            tracing::debug!(
                tokens = total_len,
                bytes = total_size,
                "accumulation pass fell short of thresholds"
            );
        }

        corpus
    }
}
