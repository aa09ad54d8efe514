use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::storage::{KeyValueRecord, KeyValueRecords};

pub const ONE_HOUR: Duration = Duration::from_secs(60 * 60);
pub const TEN_MINUTES: Duration = Duration::from_secs(10 * 60);
pub const ONE_MINUTE: Duration = Duration::from_secs(60);

/// TTL-scoped string cache for provider responses.
///
/// Entries past their expiry are deleted lazily on read, or in bulk by
/// [`KeyValueCache::sweep_expired`]. Storage failures are logged and behave
/// like a miss: nothing here is allowed to break a lookup.
#[derive(Clone)]
pub struct KeyValueCache {
    records: Arc<KeyValueRecords>,
}

impl KeyValueCache {
    pub fn new(records: Arc<KeyValueRecords>) -> Self {
        Self { records }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let record = self.records.get(key).await?;

        if record.is_expired_at(Utc::now()) {
            debug!("⌛ Entrada expirada: {}", key);
            if let Err(e) = self.records.remove(key).await {
                error!("❌ Error eliminando entrada expirada {}: {}", key, e);
            }
            return None;
        }

        Some(record.value)
    }

    /// Upserts `value` with expiry `now + ttl`.
    pub async fn set(&self, key: &str, value: impl Into<String>, ttl: Duration) {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC);

        let record = KeyValueRecord {
            key: key.to_string(),
            value: value.into(),
            expires_at,
        };

        if let Err(e) = self.records.upsert(record).await {
            error!("❌ Error guardando en caché {}: {}", key, e);
        }
    }

    /// Deletes every expired entry. Returns the number removed.
    pub async fn sweep_expired(&self) -> usize {
        match self.records.remove_expired(Utc::now()).await {
            Ok(count) => {
                if count > 0 {
                    debug!("🧹 {} entradas expiradas eliminadas", count);
                }
                count
            }
            Err(e) => {
                error!("❌ Error limpiando caché clave-valor: {}", e);
                0
            }
        }
    }

    /// Returns the cached value for `key`, or runs `producer` and caches its
    /// JSON form. Producer errors are returned and never cached. A cached
    /// value that no longer decodes as `T` counts as a miss.
    pub async fn memoize<T, E, F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get(key).await {
            match serde_json::from_str::<T>(&cached) {
                Ok(value) => {
                    debug!("💾 Cache hit: {}", key);
                    return Ok(value);
                }
                Err(e) => warn!("⚠️ Entrada de caché corrupta {}: {}", key, e),
            }
        }

        let value = producer().await?;

        match serde_json::to_string(&value) {
            Ok(serialized) => self.set(key, serialized, ttl).await,
            Err(e) => warn!("⚠️ Resultado de {} no serializable, no se guarda: {}", key, e),
        }

        Ok(value)
    }
}
