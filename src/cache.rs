// src/cache.rs

//! Best-effort local file cache in front of the gateway.
//!
//! Files are cached on disk by their remote name. A read tries the cache
//! first and falls back to a network fetch; a fetched file is optionally
//! persisted for next time. Disk faults are logged and absorbed, never
//! propagated into an accumulation pass.

use std::path::{Path, PathBuf};

use crate::config::CacheConfig;
use crate::error::{CorpusError, Result};
use crate::gateway::FetchClient;
use crate::resolver::DirEntry;

pub struct FileCache {
    dir: PathBuf,
    persist: bool,
}

impl FileCache {
    /// Creates the cache, ensuring the cache directory exists.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).map_err(|e| {
            CorpusError::cache_with_source(
                &config.data_dir,
                "failed to create cache directory",
                e,
            )
        })?;
        Ok(Self {
            dir: config.data_dir.clone(),
            persist: config.save_dataset,
        })
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Cache location for a remote entry. Remote names are untrusted, so
    /// only the final path component is used; a name with no usable file
    /// component (e.g. `..`) falls back to the content hash.
    fn path_for(&self, file: &DirEntry) -> PathBuf {
        match Path::new(&file.name).file_name() {
            Some(name) => self.dir.join(name),
            None => {
                tracing::warn!(file = %file.name, "unusable file name, caching by hash");
                self.dir.join(&file.hash)
            }
        }
    }

    /// Loads a file's text, cache first, network second.
    ///
    /// Returns `None` when neither the cache nor the gateway could produce
    /// the content; no error escapes.
    pub fn get_text(&self, file: &DirEntry, client: &FetchClient) -> Option<String> {
        let path = self.path_for(file);

        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    tracing::debug!(file = %file.name, "loaded from cache");
                    return Some(text);
                }
                Err(e) => {
                    tracing::warn!(file = %file.name, error = %e, "cache load failed, fetching");
                }
            }
        }

        let response = match client.cat(&file.hash) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(file = %file.name, error = %e, "failed to retrieve file, ignoring");
                return None;
            }
        };
        if !response.is_success() {
            tracing::warn!(
                file = %file.name,
                status = response.status,
                "failed to retrieve file, ignoring"
            );
            return None;
        }

        let text = match response.text() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(file = %file.name, error = %e, "file is not text, ignoring");
                return None;
            }
        };
        tracing::debug!(file = %file.name, bytes = text.len(), "downloaded");

        if self.persist {
            match std::fs::write(&path, &text) {
                Ok(()) => tracing::debug!(file = %file.name, "saved to cache"),
                Err(e) => tracing::warn!(file = %file.name, error = %e, "cache save failed"),
            }
        }

        Some(text)
    }
}
