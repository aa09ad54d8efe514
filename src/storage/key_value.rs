use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::warn;

use super::JsonFile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValueRecord {
    pub key: String,
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl KeyValueRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Durable (key, value, expiry) records persisted to `key_value_caches.json`.
///
/// Expiry is interpreted by [`crate::cache::KeyValueCache`]; this type only
/// stores and deletes.
pub struct KeyValueRecords {
    file: Option<JsonFile>,
    records: Mutex<HashMap<String, KeyValueRecord>>,
}

impl KeyValueRecords {
    pub async fn open(path: &Path) -> Result<Self> {
        let file = JsonFile::new(path);
        let records = match file.load::<HashMap<String, KeyValueRecord>>().await {
            Ok(records) => records.unwrap_or_default(),
            Err(e) => {
                warn!("⚠️ Caché clave-valor ilegible, empezando vacía: {}", e);
                HashMap::new()
            }
        };

        Ok(Self {
            file: Some(file),
            records: Mutex::new(records),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            file: None,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<KeyValueRecord> {
        self.records.lock().await.get(key).cloned()
    }

    pub async fn upsert(&self, record: KeyValueRecord) -> Result<()> {
        let mut records = self.records.lock().await;
        records.insert(record.key.clone(), record);
        self.persist(&records).await
    }

    pub async fn remove(&self, key: &str) -> Result<bool> {
        let mut records = self.records.lock().await;
        let removed = records.remove(key).is_some();
        if removed {
            self.persist(&records).await?;
        }
        Ok(removed)
    }

    /// Deletes every record expired at `now`, returning how many went.
    pub async fn remove_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));
        let removed = before - records.len();
        if removed > 0 {
            self.persist(&records).await?;
        }
        Ok(removed)
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    async fn persist(&self, records: &HashMap<String, KeyValueRecord>) -> Result<()> {
        match &self.file {
            Some(file) => file.save(records).await,
            None => Ok(()),
        }
    }
}
