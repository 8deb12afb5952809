// src/resolver.rs

//! Dataset registry and directory resolution over the content store.
//!
//! The registry maps dataset names to their root content-hashes, built once
//! from the well-known root manifest. The resolver turns dataset selections
//! into flat entry lists and walks the hash-addressed directory graph down
//! to terminal data files with a randomized single-path descent.

use std::collections::{BTreeMap, HashSet};

use rand::seq::{IndexedRandom, SliceRandom};
use serde::Deserialize;

use crate::config::DatasetConfig;
use crate::error::{CorpusError, Result};
use crate::gateway::FetchClient;

/// One node in the remote directory graph.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DirEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Hash")]
    pub hash: String,
    #[serde(rename = "Size")]
    pub size: u64,
}

/// Gateway JSON document for a directory node.
#[derive(Debug, Deserialize)]
struct NodeListing {
    #[serde(rename = "Links", default)]
    links: Vec<DirEntry>,
}

/// Immutable mapping from dataset name to root content-hash.
#[derive(Debug, Clone)]
pub struct DatasetRegistry {
    hashes: BTreeMap<String, String>,
}

impl DatasetRegistry {
    /// Build the registry from the root manifest's link list.
    ///
    /// Manifest link names carry a file suffix (`Books3.txt`); the registry
    /// key is the name with that suffix stripped.
    pub fn build(client: &FetchClient, mountain_hash: &str) -> Result<Self> {
        let response = client.node_get(mountain_hash)?;
        if !response.is_success() {
            return Err(CorpusError::resolve(
                mountain_hash,
                format!("root manifest fetch failed with status {}", response.status),
            ));
        }

        let listing: NodeListing = response.json()?;
        let mut hashes = BTreeMap::new();
        for link in listing.links {
            let name = link
                .name
                .strip_suffix(".txt")
                .unwrap_or(&link.name)
                .to_string();
            hashes.insert(name, link.hash);
        }

        if hashes.is_empty() {
            tracing::warn!(mountain_hash, "root manifest listed no datasets");
        } else {
            tracing::info!(datasets = hashes.len(), "dataset registry built");
        }

        Ok(Self { hashes })
    }

    /// Build a registry from known name/hash pairs, bypassing the network.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            hashes: entries.into_iter().collect(),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.hashes.keys().map(String::as_str).collect()
    }

    pub fn hash_for(&self, name: &str) -> Option<&str> {
        self.hashes.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

/// Outcome of resolving an entry down to a terminal data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A terminal data file was located.
    Found(DirEntry),
    /// The branch exists but holds no children.
    Empty,
    /// The branch could not be expanded (fetch failure, cycle, depth cap).
    Unavailable,
}

/// Resolves dataset selections and walks the directory graph.
pub struct DirectoryResolver {
    client: FetchClient,
    registry: DatasetRegistry,
    datafile_size_bound: u64,
    max_datasets: usize,
    max_depth: usize,
}

impl DirectoryResolver {
    pub fn new(client: FetchClient, registry: DatasetRegistry, config: &DatasetConfig) -> Self {
        Self {
            client,
            registry,
            datafile_size_bound: config.datafile_size_bound,
            max_datasets: config.max_datasets,
            max_depth: config.max_depth,
        }
    }

    pub fn registry(&self) -> &DatasetRegistry {
        &self.registry
    }

    /// Resolve a randomized selection of registered datasets.
    ///
    /// Shuffles the registry names, takes up to `max_datasets`, and
    /// concatenates their root link lists. Datasets whose fetch fails are
    /// skipped with a warning.
    pub fn resolve_all(&self) -> Vec<DirEntry> {
        let mut names: Vec<String> = self
            .registry
            .names()
            .into_iter()
            .map(str::to_string)
            .collect();
        names.shuffle(&mut rand::rng());
        names.truncate(self.max_datasets);

        let mut entries = Vec::new();
        for name in &names {
            // Names came from the registry, so the lookup cannot miss.
            if let Some(hash) = self.registry.hash_for(name) {
                self.append_root_links(name, hash, &mut entries);
            }
        }
        entries
    }

    /// Resolve an explicit dataset selection.
    ///
    /// Unknown names produce a diagnostic listing the valid names and are
    /// skipped, not fatal.
    pub fn resolve_named(&self, names: &[String]) -> Vec<DirEntry> {
        let mut entries = Vec::new();
        for name in names {
            match self.registry.hash_for(name) {
                Some(hash) => self.append_root_links(name, hash, &mut entries),
                None => {
                    tracing::error!(
                        dataset = %name,
                        known = ?self.registry.names(),
                        "unknown dataset name, skipping"
                    );
                }
            }
        }
        entries
    }

    fn append_root_links(&self, name: &str, hash: &str, entries: &mut Vec<DirEntry>) {
        tracing::info!(dataset = %name, "loading dataset");
        match self.fetch_links(hash) {
            Ok(links) => {
                tracing::info!(dataset = %name, entries = links.len(), "loaded dataset");
                entries.extend(links);
            }
            Err(e) => {
                tracing::warn!(dataset = %name, error = %e, "failed to retrieve directory, skipping");
            }
        }
    }

    fn fetch_links(&self, hash: &str) -> Result<Vec<DirEntry>> {
        let response = self.client.node_get(hash)?;
        if !response.is_success() {
            return Err(CorpusError::resolve(
                hash,
                format!("directory fetch failed with status {}", response.status),
            ));
        }
        let listing: NodeListing = response.json()?;
        Ok(listing.links)
    }

    /// Walk from `entry` down to a terminal data file.
    ///
    /// Entries at or below the datafile size bound are terminal and returned
    /// unchanged, with no network call. Larger entries are expanded and one
    /// child is chosen uniformly at random; a child with an empty name
    /// inherits its parent's. The walk touches O(depth) remote nodes and is
    /// bounded by a visited set and a depth cap against corrupted graphs.
    pub fn extract_datafile(&self, entry: &DirEntry) -> Resolution {
        let mut current = entry.clone();
        let mut visited: HashSet<String> = HashSet::new();
        let mut depth = 0;

        loop {
            if current.size <= self.datafile_size_bound {
                return Resolution::Found(current);
            }

            if depth >= self.max_depth {
                tracing::warn!(entry = %current.name, depth, "descent depth limit reached, ignoring directory");
                return Resolution::Unavailable;
            }
            if !visited.insert(current.hash.clone()) {
                tracing::warn!(entry = %current.name, "directory graph cycle, ignoring directory");
                return Resolution::Unavailable;
            }

            let links = match self.fetch_links(&current.hash) {
                Ok(links) => links,
                Err(e) => {
                    tracing::warn!(entry = %current.name, error = %e, "failed to retrieve directory, ignoring");
                    return Resolution::Unavailable;
                }
            };

            let chosen = match links.choose(&mut rand::rng()) {
                Some(child) => child.clone(),
                None => {
                    tracing::warn!(entry = %current.name, "directory seems empty, ignoring");
                    return Resolution::Empty;
                }
            };

            let mut next = chosen;
            if next.name.is_empty() {
                next.name = current.name.clone();
            }
            current = next;
            depth += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::gateway::{GatewayResponse, Method, Transport};
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Mock transport serving canned directory listings by hash.
    struct GraphTransport {
        nodes: HashMap<String, String>,
        calls: AtomicUsize,
    }

    impl GraphTransport {
        fn new() -> Self {
            Self {
                nodes: HashMap::new(),
                calls: AtomicUsize::new(0),
            }
        }

        fn add_node(mut self, hash: &str, body: &str) -> Self {
            self.nodes.insert(hash.to_string(), body.to_string());
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for GraphTransport {
        fn execute(
            &self,
            _url: &str,
            args: &[(&str, &str)],
            _method: Method,
        ) -> crate::error::Result<GatewayResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let hash = args
                .iter()
                .find(|(k, _)| *k == "arg")
                .map(|(_, v)| *v)
                .unwrap_or_default();

            match self.nodes.get(hash) {
                Some(body) => Ok(GatewayResponse {
                    status: 200,
                    body: Bytes::from(body.clone()),
                }),
                None => Ok(GatewayResponse {
                    status: 404,
                    body: Bytes::new(),
                }),
            }
        }
    }

    fn fast_gateway() -> GatewayConfig {
        GatewayConfig {
            max_retries: 0,
            backoff_base_ms: 1,
            max_backoff_ms: 1,
            ..Default::default()
        }
    }

    fn client_over(transport: Arc<GraphTransport>) -> FetchClient {
        FetchClient::with_transport(&fast_gateway(), transport)
    }

    fn entry(name: &str, hash: &str, size: u64) -> DirEntry {
        DirEntry {
            name: name.to_string(),
            hash: hash.to_string(),
            size,
        }
    }

    fn resolver_with(
        transport: Arc<GraphTransport>,
        registry: DatasetRegistry,
        config: &DatasetConfig,
    ) -> DirectoryResolver {
        DirectoryResolver::new(client_over(transport), registry, config)
    }

    #[test]
    fn test_registry_strips_suffix() {
        let transport = Arc::new(GraphTransport::new().add_node(
            "QmRoot",
            r#"{"Links": [
                {"Name": "Books3.txt", "Hash": "h-books", "Size": 0},
                {"Name": "ArXiv.txt", "Hash": "h-arxiv", "Size": 0}
            ]}"#,
        ));
        let client = client_over(transport);

        let registry = DatasetRegistry::build(&client, "QmRoot").unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.hash_for("Books3"), Some("h-books"));
        assert_eq!(registry.hash_for("ArXiv"), Some("h-arxiv"));
        assert_eq!(registry.hash_for("Books3.txt"), None);
    }

    #[test]
    fn test_registry_build_fails_on_bad_status() {
        let transport = Arc::new(GraphTransport::new());
        let client = client_over(transport);
        assert!(DatasetRegistry::build(&client, "QmMissing").is_err());
    }

    #[test]
    fn test_resolve_named_skips_unknown() {
        let transport = Arc::new(GraphTransport::new().add_node(
            "h-books",
            r#"{"Links": [{"Name": "part0", "Hash": "h-part0", "Size": 100}]}"#,
        ));
        let registry =
            DatasetRegistry::from_entries([("Books3".to_string(), "h-books".to_string())]);
        let resolver = resolver_with(transport, registry, &DatasetConfig::default());

        let entries = resolver.resolve_named(&[
            "Books3".to_string(),
            "NoSuchDataset".to_string(),
        ]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "part0");
    }

    #[test]
    fn test_resolve_named_skips_unreachable_dataset() {
        let transport = Arc::new(GraphTransport::new());
        let registry =
            DatasetRegistry::from_entries([("Books3".to_string(), "h-gone".to_string())]);
        let resolver = resolver_with(transport, registry, &DatasetConfig::default());

        let entries = resolver.resolve_named(&["Books3".to_string()]);
        assert!(entries.is_empty());
    }

    #[test]
    fn test_resolve_all_caps_at_max_datasets() {
        let mut transport = GraphTransport::new();
        let mut pairs = Vec::new();
        for i in 0..5 {
            let hash = format!("h-{i}");
            transport = transport.add_node(
                &hash,
                r#"{"Links": [{"Name": "f", "Hash": "h-f", "Size": 10}]}"#,
            );
            pairs.push((format!("ds{i}"), hash));
        }
        let registry = DatasetRegistry::from_entries(pairs);
        let config = DatasetConfig {
            max_datasets: 2,
            ..Default::default()
        };
        let resolver = resolver_with(Arc::new(transport), registry, &config);

        let entries = resolver.resolve_all();
        // Two datasets, one link each.
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_extract_terminal_entry_makes_no_network_call() {
        let transport = Arc::new(GraphTransport::new());
        let registry = DatasetRegistry::from_entries([]);
        let config = DatasetConfig {
            datafile_size_bound: 1_000,
            ..Default::default()
        };
        let resolver = resolver_with(transport.clone(), registry, &config);

        let leaf = entry("part0", "h-leaf", 500);
        assert_eq!(resolver.extract_datafile(&leaf), Resolution::Found(leaf.clone()));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn test_extract_descends_to_datafile() {
        let transport = Arc::new(GraphTransport::new().add_node(
            "h-dir",
            r#"{"Links": [{"Name": "inner", "Hash": "h-inner", "Size": 500}]}"#,
        ));
        let registry = DatasetRegistry::from_entries([]);
        let config = DatasetConfig {
            datafile_size_bound: 1_000,
            ..Default::default()
        };
        let resolver = resolver_with(transport, registry, &config);

        let dir = entry("outer", "h-dir", 5_000);
        match resolver.extract_datafile(&dir) {
            Resolution::Found(found) => {
                assert_eq!(found.name, "inner");
                assert_eq!(found.hash, "h-inner");
            }
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_empty_name_inherits_parent() {
        let transport = Arc::new(GraphTransport::new().add_node(
            "h-dir",
            r#"{"Links": [{"Name": "", "Hash": "h-inner", "Size": 500}]}"#,
        ));
        let registry = DatasetRegistry::from_entries([]);
        let config = DatasetConfig {
            datafile_size_bound: 1_000,
            ..Default::default()
        };
        let resolver = resolver_with(transport, registry, &config);

        let dir = entry("outer", "h-dir", 5_000);
        match resolver.extract_datafile(&dir) {
            Resolution::Found(found) => assert_eq!(found.name, "outer"),
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_dead_branch_is_unavailable() {
        let transport = Arc::new(GraphTransport::new());
        let registry = DatasetRegistry::from_entries([]);
        let resolver = resolver_with(transport, registry, &DatasetConfig::default());

        let dir = entry("outer", "h-gone", 5_000_000);
        assert_eq!(resolver.extract_datafile(&dir), Resolution::Unavailable);
    }

    #[test]
    fn test_extract_empty_listing_is_empty() {
        let transport =
            Arc::new(GraphTransport::new().add_node("h-dir", r#"{"Links": []}"#));
        let registry = DatasetRegistry::from_entries([]);
        let resolver = resolver_with(transport, registry, &DatasetConfig::default());

        let dir = entry("outer", "h-dir", 5_000_000);
        assert_eq!(resolver.extract_datafile(&dir), Resolution::Empty);
    }

    #[test]
    fn test_extract_cycle_is_unavailable() {
        // Node links back to itself with a directory-sized entry.
        let transport = Arc::new(GraphTransport::new().add_node(
            "h-dir",
            r#"{"Links": [{"Name": "self", "Hash": "h-dir", "Size": 5000000}]}"#,
        ));
        let registry = DatasetRegistry::from_entries([]);
        let resolver = resolver_with(transport, registry, &DatasetConfig::default());

        let dir = entry("outer", "h-dir", 5_000_000);
        assert_eq!(resolver.extract_datafile(&dir), Resolution::Unavailable);
    }

    #[test]
    fn test_extract_depth_cap_is_unavailable() {
        let transport = Arc::new(
            GraphTransport::new()
                .add_node(
                    "h-a",
                    r#"{"Links": [{"Name": "b", "Hash": "h-b", "Size": 5000000}]}"#,
                )
                .add_node(
                    "h-b",
                    r#"{"Links": [{"Name": "c", "Hash": "h-c", "Size": 5000000}]}"#,
                ),
        );
        let registry = DatasetRegistry::from_entries([]);
        let config = DatasetConfig {
            max_depth: 1,
            ..Default::default()
        };
        let resolver = resolver_with(transport, registry, &config);

        let dir = entry("a", "h-a", 5_000_000);
        assert_eq!(resolver.extract_datafile(&dir), Resolution::Unavailable);
    }
}
