// src/dataset/prefetch.rs

//! Prefetching corpus pipeline.
//!
//! A background thread runs the accumulator ahead of consumption: it keeps
//! a pending window of leftover tokens, slices off exact epoch-sized
//! corpora, and publishes them into a bounded channel. The consumer swaps
//! batches out of the channel into its block cursor, so block iteration
//! never stalls on network latency while at least one batch is staged.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};

use super::block::{Block, BlockCursor, BlockEncoder, Tokenizer};
use crate::cache::FileCache;
use crate::config::CorpusConfig;
use crate::corpus::CorpusAccumulator;
use crate::error::{CorpusError, Result};
use crate::gateway::{FetchClient, HttpTransport, Transport};
use crate::resolver::{DatasetRegistry, DirectoryResolver};

/// How long one enqueue attempt waits before re-checking the stop flag.
const SEND_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// An infinite, restartable stream of training blocks.
///
/// `next_block` pulls from the active corpus; when it is exhausted the next
/// staged batch is swapped in, blocking (with a poll-interval timeout on
/// the channel receive) until one is ready. Total unavailability of the
/// backing store manifests as `next_block` blocking, never as a crash.
pub struct TextCorpusDataset {
    receiver: Receiver<Vec<String>>,
    stop_flag: Arc<AtomicBool>,
    producer: Option<JoinHandle<()>>,
    cursor: BlockCursor,
    encoder: BlockEncoder,
    poll_interval: Duration,
}

impl TextCorpusDataset {
    /// Creates the dataset over the configured HTTP gateway.
    ///
    /// Builds the dataset registry (one network round-trip), creates the
    /// cache directory, and spawns the producer thread.
    pub fn new(config: CorpusConfig, tokenizer: Option<Arc<dyn Tokenizer>>) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config.gateway)?);
        Self::with_transport(config, transport, tokenizer)
    }

    /// Creates the dataset over a caller-supplied transport.
    pub fn with_transport(
        config: CorpusConfig,
        transport: Arc<dyn Transport>,
        tokenizer: Option<Arc<dyn Tokenizer>>,
    ) -> Result<Self> {
        config.validate()?;

        let client = FetchClient::with_transport(&config.gateway, transport);
        let registry = DatasetRegistry::build(&client, &config.gateway.mountain_hash)?;
        let resolver = DirectoryResolver::new(client.clone(), registry, &config.dataset);
        let cache = FileCache::new(&config.cache)?;
        let accumulator = CorpusAccumulator::new(resolver, cache, client, &config.dataset);

        let encoder = BlockEncoder::new(&config.dataset, tokenizer)?;
        let cursor = BlockCursor::new(config.dataset.block_size);

        let data_size = config.dataset.data_size();
        let poll_interval = config.dataset.poll_interval();
        let (sender, receiver) = bounded(config.dataset.buffer_size);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop = stop_flag.clone();

        let producer = thread::Builder::new()
            .name("corpus-producer".to_string())
            .spawn(move || produce_loop(accumulator, sender, stop, data_size, poll_interval))
            .map_err(|e| CorpusError::dataset(format!("failed to spawn producer: {e}")))?;

        Ok(Self {
            receiver,
            stop_flag,
            producer: Some(producer),
            cursor,
            encoder,
            poll_interval,
        })
    }

    /// Returns the next training block, swapping in the next staged corpus
    /// when the active one is exhausted.
    pub fn next_block(&mut self) -> Result<Block> {
        if let Some(words) = self.cursor.next_block() {
            return Ok(self.encoder.encode(words));
        }

        let corpus = self.recv_next_corpus()?;
        self.cursor.swap(corpus);
        match self.cursor.next_block() {
            Some(words) => Ok(self.encoder.encode(words)),
            None => Err(CorpusError::dataset("staged corpus holds no whole block")),
        }
    }

    /// Number of whole blocks in the active corpus.
    pub fn len(&self) -> usize {
        self.cursor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.is_empty()
    }

    /// Random access into the active corpus with wraparound addressing.
    pub fn block(&self, index: usize) -> Option<Block> {
        self.cursor.block(index).map(|words| self.encoder.encode(words))
    }

    fn recv_next_corpus(&self) -> Result<Vec<String>> {
        loop {
            match self.receiver.recv_timeout(self.poll_interval) {
                Ok(corpus) => {
                    tracing::debug!(tokens = corpus.len(), "installed next corpus batch");
                    return Ok(corpus);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.stop_flag.load(Ordering::Relaxed) {
                        return Err(CorpusError::dataset("dataset closed"));
                    }
                    tracing::debug!("waiting for next corpus batch");
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(CorpusError::dataset("corpus producer terminated"));
                }
            }
        }
    }

    /// Signals the producer to stop, drains staged batches so a blocked
    /// enqueue can observe the flag, and joins the thread.
    pub fn close(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        while self.receiver.try_recv().is_ok() {}

        if let Some(handle) = self.producer.take() {
            let _ = handle.join();
        }
        // A batch may have slipped in between the drain and the join.
        while self.receiver.try_recv().is_ok() {}
    }
}

impl Drop for TextCorpusDataset {
    fn drop(&mut self) {
        self.close();
    }
}

fn produce_loop(
    accumulator: CorpusAccumulator,
    sender: Sender<Vec<String>>,
    stop: Arc<AtomicBool>,
    data_size: usize,
    poll_interval: Duration,
) {
    // Leftover tokens carried across accumulation passes.
    let mut remained: Vec<String> = Vec::new();

    while !stop.load(Ordering::Relaxed) {
        // Fill the pending window up to one epoch's worth of tokens.
        while remained.len() < data_size && !stop.load(Ordering::Relaxed) {
            let corpus = accumulator.build(data_size);
            if corpus.is_empty() {
                tracing::warn!("accumulation produced no tokens, backing off");
                thread::sleep(poll_interval);
                continue;
            }
            remained.extend(corpus);
        }

        // Emit every whole epoch; afterwards the window is strictly
        // shorter than data_size.
        while remained.len() >= data_size && !stop.load(Ordering::Relaxed) {
            let batch: Vec<String> = remained.drain(..data_size).collect();
            if !send_with_stop(&sender, &stop, batch) {
                return;
            }
        }
    }
}

/// Enqueue with backpressure: waits while the buffer is full, bailing out
/// when the stop flag is raised or the consumer is gone.
fn send_with_stop(sender: &Sender<Vec<String>>, stop: &AtomicBool, batch: Vec<String>) -> bool {
    let mut batch = batch;
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        match sender.send_timeout(batch, SEND_RETRY_INTERVAL) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(returned)) => batch = returned,
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, DatasetConfig, GatewayConfig};
    use crate::gateway::{GatewayResponse, Method};
    use bytes::Bytes;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Mock transport serving a tiny content store: one dataset with one
    /// terminal file.
    struct StoreTransport {
        nodes: HashMap<String, String>,
        files: HashMap<String, String>,
    }

    impl StoreTransport {
        fn single_file_store(text: &str) -> Self {
            let mut nodes = HashMap::new();
            nodes.insert(
                "QmMountain".to_string(),
                r#"{"Links": [{"Name": "pile.txt", "Hash": "h-root", "Size": 0}]}"#.to_string(),
            );
            nodes.insert(
                "h-root".to_string(),
                r#"{"Links": [{"Name": "part0", "Hash": "h-part0", "Size": 500}]}"#.to_string(),
            );
            let mut files = HashMap::new();
            files.insert("h-part0".to_string(), text.to_string());
            Self { nodes, files }
        }
    }

    impl Transport for StoreTransport {
        fn execute(
            &self,
            url: &str,
            args: &[(&str, &str)],
            _method: Method,
        ) -> Result<GatewayResponse> {
            let hash = args
                .iter()
                .find(|(k, _)| *k == "arg")
                .map(|(_, v)| *v)
                .unwrap_or_default();
            let body = if url.contains("/cat") {
                self.files.get(hash)
            } else {
                self.nodes.get(hash)
            };
            match body {
                Some(text) => Ok(GatewayResponse {
                    status: 200,
                    body: Bytes::from(text.clone()),
                }),
                None => Ok(GatewayResponse {
                    status: 404,
                    body: Bytes::new(),
                }),
            }
        }
    }

    fn test_config(dir: &TempDir) -> CorpusConfig {
        CorpusConfig {
            gateway: GatewayConfig {
                mountain_hash: "QmMountain".to_string(),
                max_retries: 0,
                backoff_base_ms: 1,
                max_backoff_ms: 1,
                ..Default::default()
            },
            dataset: DatasetConfig {
                block_size: 2,
                batch_size: 1,
                epoch_length: 1,
                max_corpus_size: 100,
                poll_interval_ms: 10,
                ..Default::default()
            },
            cache: CacheConfig {
                data_dir: dir.path().to_path_buf(),
                save_dataset: false,
            },
        }
    }

    struct FixedTokenizer;

    impl Tokenizer for FixedTokenizer {
        fn encode(&self, text: &str) -> Vec<i64> {
            text.split_whitespace().map(|w| w.len() as i64).collect()
        }
    }

    #[test]
    fn test_blocks_stream_in_corpus_order() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(StoreTransport::single_file_store("alpha beta gamma"));
        let mut dataset =
            TextCorpusDataset::with_transport(test_config(&dir), transport, None).unwrap();

        // data_size = 2: the 3-token file is sliced into exact 2-token
        // corpora with the leftover carried into the next window.
        assert_eq!(dataset.next_block().unwrap(), Block::Text("alpha beta".to_string()));
        assert_eq!(dataset.next_block().unwrap(), Block::Text("gamma alpha".to_string()));
        assert_eq!(dataset.next_block().unwrap(), Block::Text("beta gamma".to_string()));
        assert_eq!(dataset.next_block().unwrap(), Block::Text("alpha beta".to_string()));

        dataset.close();
    }

    #[test]
    fn test_active_corpus_block_view() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(StoreTransport::single_file_store("alpha beta gamma"));
        let mut dataset =
            TextCorpusDataset::with_transport(test_config(&dir), transport, None).unwrap();

        assert_eq!(dataset.len(), 0); // nothing swapped in yet
        dataset.next_block().unwrap();

        // Active corpus is one exact 2-token epoch.
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.block(0), Some(Block::Text("alpha beta".to_string())));
        // Wraparound addressing stays total.
        assert_eq!(dataset.block(7), Some(Block::Text("alpha beta".to_string())));

        dataset.close();
    }

    #[test]
    fn test_tokenized_blocks_are_bounded() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(StoreTransport::single_file_store("alpha beta gamma"));
        let mut config = test_config(&dir);
        config.dataset.tokenize = true;

        let mut dataset =
            TextCorpusDataset::with_transport(config, transport, Some(Arc::new(FixedTokenizer)))
                .unwrap();

        match dataset.next_block().unwrap() {
            Block::Tokens(ids) => {
                assert!(!ids.is_empty());
                assert!(ids.len() <= 2);
            }
            other => panic!("expected tokens, got {other:?}"),
        }
        dataset.close();
    }

    #[test]
    fn test_tokenize_without_tokenizer_fails_at_construction() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(StoreTransport::single_file_store("alpha"));
        let mut config = test_config(&dir);
        config.dataset.tokenize = true;

        assert!(TextCorpusDataset::with_transport(config, transport, None).is_err());
    }

    #[test]
    fn test_unreachable_manifest_fails_at_construction() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(StoreTransport {
            nodes: HashMap::new(),
            files: HashMap::new(),
        });
        assert!(TextCorpusDataset::with_transport(test_config(&dir), transport, None).is_err());
    }

    #[test]
    fn test_close_joins_producer_without_consuming() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(StoreTransport::single_file_store("alpha beta gamma"));
        let mut dataset =
            TextCorpusDataset::with_transport(test_config(&dir), transport, None).unwrap();

        // Never consume: the buffer fills and the producer blocks on the
        // enqueue. close() must still stop and join it.
        std::thread::sleep(Duration::from_millis(50));
        dataset.close();
        assert!(dataset.producer.is_none());

        // After close, next_block reports closure instead of blocking forever.
        assert!(dataset.next_block().is_err());
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(StoreTransport::single_file_store("alpha beta"));
        let mut dataset =
            TextCorpusDataset::with_transport(test_config(&dir), transport, None).unwrap();
        dataset.close();
        dataset.close();
    }
}
