//! Process-wide id → name cache with pluggable persistence.
//!
//! The cache is append-mostly. New entries are flushed to the backend every
//! `flush_every` insertions and on explicit `flush()`. A crash may lose the
//! unflushed tail; the file backend never leaves a partially written store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Durable storage for a name cache.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn load(&self) -> anyhow::Result<HashMap<String, String>>;

    /// Replace the stored snapshot with `entries`.
    async fn store(&self, entries: HashMap<String, String>) -> anyhow::Result<()>;
}

// ── JSON file backend ───────────────────────────────────────────────────────

/// Stores the cache as a JSON object. Writes go to a temporary file in the
/// same directory which is then renamed over the target.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CacheBackend for JsonFileBackend {
    async fn load(&self) -> anyhow::Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn store(&self, entries: HashMap<String, String>) -> anyhow::Result<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)?;

            let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
            serde_json::to_writer(&mut tmp, &entries)?;
            tmp.flush()?;
            tmp.persist(&path)?;
            Ok(())
        })
        .await?
    }
}

// ── In-memory backend ───────────────────────────────────────────────────────

/// Backend that keeps the last stored snapshot in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    snapshot: Mutex<HashMap<String, String>>,
    stores: Mutex<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: HashMap<String, String>) -> Self {
        Self {
            snapshot: Mutex::new(entries),
            stores: Mutex::new(0),
        }
    }

    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.snapshot.lock().await.clone()
    }

    pub async fn store_count(&self) -> usize {
        *self.stores.lock().await
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn load(&self) -> anyhow::Result<HashMap<String, String>> {
        Ok(self.snapshot.lock().await.clone())
    }

    async fn store(&self, entries: HashMap<String, String>) -> anyhow::Result<()> {
        *self.snapshot.lock().await = entries;
        *self.stores.lock().await += 1;
        Ok(())
    }
}

// ── Cache service ───────────────────────────────────────────────────────────

struct CacheState {
    entries: HashMap<String, String>,
    unflushed: usize,
}

/// Shared name cache. Construct once and pass by reference (or `Arc`).
pub struct NameCache {
    label: String,
    state: RwLock<CacheState>,
    backend: Box<dyn CacheBackend>,
    flush_lock: Mutex<()>,
    flush_every: usize,
}

impl NameCache {
    /// Build a cache and load whatever the backend holds. A load failure
    /// starts the cache empty.
    pub async fn open(label: &str, backend: Box<dyn CacheBackend>, flush_every: usize) -> Self {
        let entries = match backend.load().await {
            Ok(entries) => {
                info!(cache = label, entries = entries.len(), "Loaded name cache");
                entries
            }
            Err(e) => {
                warn!(cache = label, "Could not load name cache: {e}");
                HashMap::new()
            }
        };

        Self {
            label: label.to_string(),
            state: RwLock::new(CacheState { entries, unflushed: 0 }),
            backend,
            flush_lock: Mutex::new(()),
            flush_every: flush_every.max(1),
        }
    }

    pub async fn get(&self, id: &str) -> Option<String> {
        self.state.read().await.entries.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Insert a name; triggers a flush once enough new entries accumulated.
    pub async fn insert(&self, id: &str, name: &str) {
        let due = {
            let mut state = self.state.write().await;
            if state.entries.get(id).map(String::as_str) == Some(name) {
                return;
            }
            state.entries.insert(id.to_string(), name.to_string());
            state.unflushed += 1;
            state.unflushed >= self.flush_every
        };

        if due {
            self.flush().await;
        }
    }

    /// Write the current snapshot to the backend. Failures are logged, never raised.
    pub async fn flush(&self) {
        let _guard = self.flush_lock.lock().await;
        let (snapshot, pending) = {
            let mut state = self.state.write().await;
            if state.unflushed == 0 {
                return;
            }
            let pending = std::mem::take(&mut state.unflushed);
            (state.entries.clone(), pending)
        };

        let count = snapshot.len();
        match self.backend.store(snapshot).await {
            Ok(()) => debug!(cache = %self.label, entries = count, "Flushed name cache"),
            Err(e) => {
                // Keep the entries due so the next flush retries them.
                self.state.write().await.unflushed += pending;
                warn!(cache = %self.label, "Could not save name cache: {e}");
            }
        }
    }
}
