use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::Node;
use crate::error::GconError;

pub const CACHE_FILE_NAME: &str = "cache.json";

/// Read side of the local record cache.
pub trait RecordReader {
    fn get(&self, accession: &str) -> Result<Option<Node>, GconError>;
}

/// Write side of the local record cache. Returns how many nodes were stored.
pub trait RecordWriter {
    fn put_many(&self, nodes: &[Node]) -> Result<usize, GconError>;
}

impl<T: RecordReader + ?Sized> RecordReader for &T {
    fn get(&self, accession: &str) -> Result<Option<Node>, GconError> {
        (**self).get(accession)
    }
}

impl<T: RecordWriter + ?Sized> RecordWriter for &T {
    fn put_many(&self, nodes: &[Node]) -> Result<usize, GconError> {
        (**self).put_many(nodes)
    }
}

/// `~/.cache/gcon/cache.json`
pub fn default_cache_path() -> Result<Utf8PathBuf, GconError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("gcon")).ok()
        })
        .map(|root| root.join(CACHE_FILE_NAME))
        .ok_or_else(|| GconError::Filesystem("unable to resolve cache directory".to_string()))
}

/// Writes `content` to a temp file next to `path` and renames it into place.
pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), GconError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| GconError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix(".gcon-write")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| GconError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| GconError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| GconError::Filesystem(err.to_string()))?;
    Ok(())
}

fn storable(nodes: &[Node]) -> impl Iterator<Item = &Node> {
    nodes.iter().filter(|node| {
        if node.metadata.is_empty() {
            warn!(
                accession = %node.accession,
                marker = %node.marker,
                "node has no metadata; not cached"
            );
            return false;
        }
        true
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fetched_at: String,
    pub node: Node,
}

/// Cache persisted as one JSON document mapping accession to entry.
#[derive(Debug)]
pub struct JsonFileStore {
    path: Utf8PathBuf,
    entries: Mutex<BTreeMap<String, CacheEntry>>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<Utf8PathBuf>) -> Result<Self, GconError> {
        let path = path.into();
        let entries = if path.as_std_path().exists() {
            let content = fs::read_to_string(path.as_std_path())
                .map_err(|err| GconError::CacheStore(format!("{path}: {err}")))?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)
                    .map_err(|err| GconError::CacheStore(format!("{path}: {err}")))?
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path, entries = entries.len(), "opened record cache");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn open_default() -> Result<Self, GconError> {
        Self::open(default_cache_path()?)
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn len(&self) -> Result<usize, GconError> {
        Ok(self.lock_entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, GconError> {
        Ok(self.lock_entries()?.is_empty())
    }

    fn lock_entries(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, CacheEntry>>, GconError> {
        self.entries
            .lock()
            .map_err(|_| GconError::CacheStore("cache lock poisoned".to_string()))
    }
}

impl RecordReader for JsonFileStore {
    fn get(&self, accession: &str) -> Result<Option<Node>, GconError> {
        Ok(self
            .lock_entries()?
            .get(accession)
            .map(|entry| entry.node.clone()))
    }
}

impl RecordWriter for JsonFileStore {
    fn put_many(&self, nodes: &[Node]) -> Result<usize, GconError> {
        let mut entries = self.lock_entries()?;
        let fetched_at = Utc::now().to_rfc3339();
        let mut stored = 0usize;
        for node in storable(nodes) {
            entries
                .entry(node.accession.clone())
                .and_modify(|entry| entry.node = node.clone())
                .or_insert_with(|| CacheEntry {
                    fetched_at: fetched_at.clone(),
                    node: node.clone(),
                });
            stored += 1;
        }
        let content = serde_json::to_vec_pretty(&*entries)
            .map_err(|err| GconError::CacheStore(err.to_string()))?;
        write_bytes_atomic(&self.path, &content)?;
        Ok(stored)
    }
}

/// In-memory cache. Records every write batch so callers can inspect them.
#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: Mutex<BTreeMap<String, Node>>,
    batches: Mutex<Vec<Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store without recording a write batch.
    pub fn with_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let nodes = nodes
            .into_iter()
            .map(|node| (node.accession.clone(), node))
            .collect();
        Self {
            nodes: Mutex::new(nodes),
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Accessions stored by each `put_many` call, in call order.
    pub fn write_batches(&self) -> Vec<Vec<String>> {
        self.batches
            .lock()
            .map(|batches| batches.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.nodes.lock().map(|nodes| nodes.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordReader for MemoryStore {
    fn get(&self, accession: &str) -> Result<Option<Node>, GconError> {
        let nodes = self
            .nodes
            .lock()
            .map_err(|_| GconError::CacheStore("cache lock poisoned".to_string()))?;
        Ok(nodes.get(accession).cloned())
    }
}

impl RecordWriter for MemoryStore {
    fn put_many(&self, nodes: &[Node]) -> Result<usize, GconError> {
        let mut stored_nodes = self
            .nodes
            .lock()
            .map_err(|_| GconError::CacheStore("cache lock poisoned".to_string()))?;
        let mut batch = Vec::new();
        for node in storable(nodes) {
            stored_nodes.insert(node.accession.clone(), node.clone());
            batch.push(node.accession.clone());
        }
        let stored = batch.len();
        self.batches
            .lock()
            .map_err(|_| GconError::CacheStore("cache lock poisoned".to_string()))?
            .push(batch);
        Ok(stored)
    }
}
