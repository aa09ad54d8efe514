use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::JsonFile;

/// One cached file: content key, size and last access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub key: String,
    pub bytes: u64,
    pub created_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
    /// Monotonic access counter; breaks ties between equal timestamps.
    pub sequence: u64,
}

impl CacheRecord {
    fn recency(&self) -> (DateTime<Utc>, u64) {
        (self.accessed_at, self.sequence)
    }
}

/// Durable (key, size, last access) records behind the content cache.
#[async_trait]
pub trait CacheRegistry: Send + Sync {
    /// Looks a record up without refreshing its access time.
    async fn get(&self, key: &str) -> Result<Option<CacheRecord>>;

    /// Refreshes the access time. Returns `false` for unknown keys.
    async fn touch(&self, key: &str) -> Result<bool>;

    /// Inserts or replaces a record, marking it as just accessed.
    async fn insert(&self, key: &str, bytes: u64) -> Result<CacheRecord>;

    async fn remove(&self, key: &str) -> Result<Option<CacheRecord>>;

    async fn total_size(&self) -> Result<u64>;

    /// Least recently accessed first, skipping `offset` records.
    async fn oldest(&self, limit: usize, offset: usize) -> Result<Vec<CacheRecord>>;

    async fn most_recent(&self, limit: usize) -> Result<Vec<CacheRecord>>;

    async fn keys(&self) -> Result<Vec<String>>;

    async fn len(&self) -> Result<usize>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryDocument {
    next_sequence: u64,
    entries: HashMap<String, CacheRecord>,
}

/// Registry persisted to `file_caches.json`.
pub struct JsonCacheRegistry {
    file: Option<JsonFile>,
    state: Mutex<RegistryDocument>,
}

impl JsonCacheRegistry {
    pub async fn open(path: &Path) -> Result<Self> {
        let file = JsonFile::new(path);
        let state = match file.load::<RegistryDocument>().await {
            Ok(Some(mut doc)) => {
                let max_sequence = doc.entries.values().map(|r| r.sequence).max().unwrap_or(0);
                doc.next_sequence = doc.next_sequence.max(max_sequence + 1);
                debug!("📂 Registro de caché cargado: {} entradas", doc.entries.len());
                doc
            }
            Ok(None) => RegistryDocument::default(),
            Err(e) => {
                // La limpieza de huérfanos recupera los archivos
                warn!("⚠️ Registro de caché ilegible, empezando vacío: {}", e);
                RegistryDocument::default()
            }
        };

        Ok(Self {
            file: Some(file),
            state: Mutex::new(state),
        })
    }

    /// Registry that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            file: None,
            state: Mutex::new(RegistryDocument::default()),
        }
    }

    async fn persist(&self, doc: &RegistryDocument) -> Result<()> {
        match &self.file {
            Some(file) => file.save(doc).await,
            None => Ok(()),
        }
    }

    fn sorted(doc: &RegistryDocument) -> Vec<&CacheRecord> {
        let mut records: Vec<&CacheRecord> = doc.entries.values().collect();
        records.sort_by_key(|r| r.recency());
        records
    }
}

fn next_sequence(doc: &mut RegistryDocument) -> u64 {
    let sequence = doc.next_sequence;
    doc.next_sequence += 1;
    sequence
}

#[async_trait]
impl CacheRegistry for JsonCacheRegistry {
    async fn get(&self, key: &str) -> Result<Option<CacheRecord>> {
        Ok(self.state.lock().await.entries.get(key).cloned())
    }

    async fn touch(&self, key: &str) -> Result<bool> {
        let mut doc = self.state.lock().await;
        let sequence = next_sequence(&mut doc);
        let Some(record) = doc.entries.get_mut(key) else {
            return Ok(false);
        };
        record.accessed_at = Utc::now();
        record.sequence = sequence;
        self.persist(&doc).await?;
        Ok(true)
    }

    async fn insert(&self, key: &str, bytes: u64) -> Result<CacheRecord> {
        let mut doc = self.state.lock().await;
        let now = Utc::now();
        let sequence = next_sequence(&mut doc);
        let created_at = doc.entries.get(key).map_or(now, |r| r.created_at);

        let record = CacheRecord {
            key: key.to_string(),
            bytes,
            created_at,
            accessed_at: now,
            sequence,
        };
        doc.entries.insert(key.to_string(), record.clone());
        self.persist(&doc).await?;
        Ok(record)
    }

    async fn remove(&self, key: &str) -> Result<Option<CacheRecord>> {
        let mut doc = self.state.lock().await;
        let removed = doc.entries.remove(key);
        if removed.is_some() {
            self.persist(&doc).await?;
        }
        Ok(removed)
    }

    async fn total_size(&self) -> Result<u64> {
        Ok(self.state.lock().await.entries.values().map(|r| r.bytes).sum())
    }

    async fn oldest(&self, limit: usize, offset: usize) -> Result<Vec<CacheRecord>> {
        let doc = self.state.lock().await;
        Ok(Self::sorted(&doc)
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn most_recent(&self, limit: usize) -> Result<Vec<CacheRecord>> {
        let doc = self.state.lock().await;
        Ok(Self::sorted(&doc)
            .into_iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().await.entries.keys().cloned().collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.state.lock().await.entries.len())
    }
}
