use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempPath;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::downloader::TrackDownloader;
use crate::error::CacheError;
use crate::storage::{CacheRecord, CacheRegistry};

/// Temp files older than this are orphans from an interrupted write.
const STALE_TEMP_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct ContentCacheConfig {
    pub cache_dir: PathBuf,
    pub limit_bytes: u64,
    pub eviction_batch_size: usize,
}

impl ContentCacheConfig {
    pub fn new(cache_dir: impl Into<PathBuf>, limit_bytes: u64) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            limit_bytes,
            eviction_batch_size: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub evicted: Vec<String>,
    pub bytes_freed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrphanReport {
    pub files_removed: usize,
    pub records_removed: usize,
    pub temp_files_removed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
    pub limit_bytes: u64,
}

/// Content-addressed track store with LRU-by-access eviction.
///
/// Files live at `<cache_dir>/<key>`; in-progress writes go to
/// `<cache_dir>/tmp` and are renamed into place. Registry mutations that
/// affect the size budget (publish, evict, self-heal) all happen under
/// one lock, so a sweep never races a writer.
pub struct ContentCache {
    cache_dir: PathBuf,
    tmp_dir: PathBuf,
    limit_bytes: u64,
    batch_size: usize,
    registry: Arc<dyn CacheRegistry>,
    eviction_lock: Mutex<()>,
}

/// Lowercase hex SHA-256 of a source locator.
pub fn cache_key_for(locator: &str) -> String {
    hex::encode(Sha256::digest(locator.as_bytes()))
}

fn registry_error(e: anyhow::Error) -> CacheError {
    CacheError::Registry(e.to_string())
}

impl ContentCache {
    pub async fn new(
        config: ContentCacheConfig,
        registry: Arc<dyn CacheRegistry>,
    ) -> Result<Self, CacheError> {
        let tmp_dir = config.cache_dir.join("tmp");
        fs::create_dir_all(&tmp_dir).await?;

        info!(
            "💾 Caché de pistas en {} (límite {} bytes)",
            config.cache_dir.display(),
            config.limit_bytes
        );

        Ok(Self {
            cache_dir: config.cache_dir,
            tmp_dir,
            limit_bytes: config.limit_bytes,
            batch_size: config.eviction_batch_size.max(1),
            registry,
            eviction_lock: Mutex::new(()),
        })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.cache_dir.join(key)
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    /// Returns the cached file for `key`, refreshing its access time.
    ///
    /// A record whose file vanished is dropped and reported as a miss.
    pub async fn resolve(&self, key: &str) -> Result<Option<PathBuf>, CacheError> {
        let Some(record) = self.registry.get(key).await.map_err(registry_error)? else {
            return Ok(None);
        };

        let path = self.path_for(key);
        if !fs::try_exists(&path).await? {
            warn!("⚠️ Archivo de caché {} desaparecido, eliminando registro", key);
            let _guard = self.eviction_lock.lock().await;
            self.registry.remove(key).await.map_err(registry_error)?;
            return Ok(None);
        }

        self.registry.touch(key).await.map_err(registry_error)?;
        debug!(
            "💾 Usando archivo en caché {} (último acceso: {})",
            key, record.accessed_at
        );
        Ok(Some(path))
    }

    /// Publishes a copy of `source` under `key` and runs eviction.
    ///
    /// Already cached keys only get their access time refreshed. The temp
    /// copy is removed on any failure.
    pub async fn store(&self, key: &str, source: &Path) -> Result<PathBuf, CacheError> {
        let final_path = self.path_for(key);

        if self.registry.get(key).await.map_err(registry_error)?.is_some()
            && fs::try_exists(&final_path).await?
        {
            self.registry.touch(key).await.map_err(registry_error)?;
            return Ok(final_path);
        }

        let temp = self.temp_path(key)?;
        fs::copy(source, &temp).await?;
        let size = fs::metadata(&temp).await?.len();

        {
            let _guard = self.eviction_lock.lock().await;
            temp.persist(&final_path).map_err(|e| CacheError::Io(e.error))?;

            if let Err(e) = self.registry.insert(key, size).await {
                let _ = fs::remove_file(&final_path).await;
                return Err(registry_error(e));
            }
            info!("✅ Archivo cacheado {} ({} bytes)", key, size);

            self.evict_locked().await?;
        }

        Ok(final_path)
    }

    /// Downloads `url` into the temp area and stores it under `key`.
    ///
    /// Skips the download when the key is already cached.
    pub async fn populate_from(
        &self,
        key: &str,
        url: &str,
        downloader: &dyn TrackDownloader,
    ) -> Result<PathBuf, CacheError> {
        if let Some(path) = self.resolve(key).await? {
            return Ok(path);
        }

        let download = self.temp_path(&format!("{key}.download"))?;
        let bytes = downloader.download(url, &download).await?;
        debug!("📥 Descargados {} bytes para {}", bytes, key);

        // `download` se elimina al salir del scope
        self.store(key, &download).await
    }

    /// Evicts least recently accessed entries until the budget holds.
    pub async fn evict_if_needed(&self) -> Result<EvictionReport, CacheError> {
        let _guard = self.eviction_lock.lock().await;
        self.evict_locked().await
    }

    async fn evict_locked(&self) -> Result<EvictionReport, CacheError> {
        let total = self.registry.total_size().await.map_err(registry_error)?;
        let mut report = EvictionReport::default();

        if total <= self.limit_bytes {
            return Ok(report);
        }

        let excess = total - self.limit_bytes;
        info!(
            "🧹 Caché ({} bytes) excede el límite ({} bytes), liberando {} bytes",
            total, self.limit_bytes, excess
        );

        // Entradas que no se pudieron borrar siguen en el registro
        let mut skipped = 0;
        'sweep: while report.bytes_freed < excess {
            let batch = self
                .registry
                .oldest(self.batch_size, skipped)
                .await
                .map_err(registry_error)?;

            if batch.is_empty() {
                warn!(
                    "⚠️ No quedan entradas para desalojar (liberados {} de {} bytes)",
                    report.bytes_freed, excess
                );
                break;
            }

            for record in batch {
                match self.evict_entry(&record).await {
                    Ok(()) => {
                        report.bytes_freed += record.bytes;
                        report.evicted.push(record.key.clone());
                        debug!("🗑️ Desalojado {} ({} bytes)", record.key, record.bytes);
                    }
                    Err(e) => {
                        error!("❌ Error desalojando {}: {}", record.key, e);
                        skipped += 1;
                    }
                }

                if report.bytes_freed >= excess {
                    break 'sweep;
                }
            }
        }

        info!(
            "✅ Desalojo completo: {} entradas, {} bytes liberados",
            report.evicted.len(),
            report.bytes_freed
        );
        Ok(report)
    }

    async fn evict_entry(&self, record: &CacheRecord) -> Result<(), CacheError> {
        match fs::remove_file(self.path_for(&record.key)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Archivo {} ya no existía", record.key);
            }
            Err(e) => return Err(e.into()),
        }
        self.registry
            .remove(&record.key)
            .await
            .map_err(registry_error)?;
        Ok(())
    }

    /// Reconciles disk with the registry and purges stale temp files.
    pub async fn cleanup_orphans(&self) -> Result<OrphanReport, CacheError> {
        let _guard = self.eviction_lock.lock().await;
        let mut report = OrphanReport::default();

        let mut entries = fs::read_dir(&self.cache_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if name.ends_with(".tmp") {
                continue;
            }

            if self.registry.get(&name).await.map_err(registry_error)?.is_none() {
                info!("🗑️ Eliminando archivo huérfano: {}", name);
                match fs::remove_file(entry.path()).await {
                    Ok(()) => report.files_removed += 1,
                    Err(e) => error!("❌ Error eliminando archivo huérfano {}: {}", name, e),
                }
            }
        }

        for key in self.registry.keys().await.map_err(registry_error)? {
            if !fs::try_exists(self.path_for(&key)).await? {
                warn!("⚠️ Registro sin archivo: {}", key);
                self.registry.remove(&key).await.map_err(registry_error)?;
                report.records_removed += 1;
            }
        }

        let now = SystemTime::now();
        let mut temps = fs::read_dir(&self.tmp_dir).await?;
        while let Some(entry) = temps.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();

            if age > STALE_TEMP_AGE {
                info!("🗑️ Eliminando temporal antiguo: {}", entry.path().display());
                match fs::remove_file(entry.path()).await {
                    Ok(()) => report.temp_files_removed += 1,
                    Err(e) => error!("❌ Error eliminando temporal: {}", e),
                }
            }
        }

        Ok(report)
    }

    /// Orphan sweep followed by eviction; run at startup and periodically.
    pub async fn cleanup(&self) -> Result<(), CacheError> {
        info!("🧹 Limpiando caché de pistas...");
        let orphans = self.cleanup_orphans().await?;
        let eviction = self.evict_if_needed().await?;
        info!(
            "✅ Limpieza: {} huérfanos, {} registros sin archivo, {} temporales, {} desalojados",
            orphans.files_removed,
            orphans.records_removed,
            orphans.temp_files_removed,
            eviction.evicted.len()
        );
        Ok(())
    }

    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        Ok(CacheStats {
            entries: self.registry.len().await.map_err(registry_error)?,
            total_bytes: self.registry.total_size().await.map_err(registry_error)?,
            limit_bytes: self.limit_bytes,
        })
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<CacheRecord>, CacheError> {
        self.registry.most_recent(limit).await.map_err(registry_error)
    }

    fn temp_path(&self, prefix: &str) -> Result<TempPath, CacheError> {
        let file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".tmp")
            .tempfile_in(&self.tmp_dir)?;
        Ok(file.into_temp_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::JsonCacheRegistry;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        registry: Arc<JsonCacheRegistry>,
        cache: ContentCache,
    }

    async fn fixture(limit: u64) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(JsonCacheRegistry::in_memory());
        let cache = ContentCache::new(
            ContentCacheConfig::new(dir.path().join("cache"), limit),
            registry.clone(),
        )
        .await
        .unwrap();
        Fixture { dir, registry, cache }
    }

    fn source(dir: &TempDir, name: &str, size: usize) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, vec![7u8; size]).unwrap();
        path
    }

    #[test]
    fn cache_keys_are_sha256_hex() {
        assert_eq!(
            cache_key_for("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn store_then_resolve_hits() {
        let f = fixture(1_000).await;
        let src = source(&f.dir, "song.webm", 64);

        let stored = f.cache.store("k1", &src).await.unwrap();
        assert_eq!(stored, f.cache.path_for("k1"));
        assert_eq!(std::fs::read(&stored).unwrap().len(), 64);
        assert!(src.exists());

        assert_eq!(f.cache.resolve("k1").await.unwrap(), Some(stored));
        assert_eq!(f.cache.resolve("other").await.unwrap(), None);
        assert_eq!(std::fs::read_dir(f.cache.tmp_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn store_is_idempotent() {
        let f = fixture(1_000).await;
        let src = source(&f.dir, "song.webm", 10);

        f.cache.store("k1", &src).await.unwrap();
        f.cache.store("k1", &src).await.unwrap();

        assert_eq!(f.registry.len().await.unwrap(), 1);
        assert_eq!(f.registry.total_size().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn failed_store_leaves_no_temp_files() {
        let f = fixture(1_000).await;
        let missing = f.dir.path().join("nope.webm");

        assert!(f.cache.store("k1", &missing).await.is_err());
        assert_eq!(std::fs::read_dir(f.cache.tmp_dir()).unwrap().count(), 0);
        assert_eq!(f.registry.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn resolve_heals_missing_files() {
        let f = fixture(1_000).await;
        let src = source(&f.dir, "song.webm", 10);
        let stored = f.cache.store("k1", &src).await.unwrap();
        std::fs::remove_file(stored).unwrap();

        assert_eq!(f.cache.resolve("k1").await.unwrap(), None);
        assert_eq!(f.registry.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn eviction_frees_only_the_excess_oldest_first() {
        let f = fixture(100).await;
        for (key, size) in [("a", 40), ("b", 30), ("c", 20), ("d", 10)] {
            let src = source(&f.dir, key, size);
            f.cache.store(key, &src).await.unwrap();
        }
        assert_eq!(f.registry.total_size().await.unwrap(), 100);

        let src = source(&f.dir, "e", 30);
        f.cache.store("e", &src).await.unwrap();

        // 130 - 100 = 30 de exceso; basta con la entrada de 40
        assert_eq!(f.registry.total_size().await.unwrap(), 90);
        assert!(f.registry.get("a").await.unwrap().is_none());
        assert!(!f.cache.path_for("a").exists());
        for key in ["b", "c", "d", "e"] {
            assert!(f.cache.path_for(key).exists(), "{key} should survive");
        }
    }

    #[tokio::test]
    async fn eviction_respects_access_recency() {
        let f = fixture(100).await;
        for (key, size) in [("a", 40), ("b", 30), ("c", 30)] {
            let src = source(&f.dir, key, size);
            f.cache.store(key, &src).await.unwrap();
        }
        f.cache.resolve("a").await.unwrap();

        let src = source(&f.dir, "d", 20);
        f.cache.store("d", &src).await.unwrap();

        assert!(f.registry.get("a").await.unwrap().is_some());
        assert!(f.registry.get("b").await.unwrap().is_none());
        assert_eq!(f.registry.total_size().await.unwrap(), 90);
    }

    #[tokio::test]
    async fn eviction_stops_when_registry_runs_dry() {
        let f = fixture(10).await;
        f.registry.insert("ghost", 50).await.unwrap();

        let report = f.cache.evict_if_needed().await.unwrap();
        assert_eq!(report.evicted, vec!["ghost".to_string()]);
        assert_eq!(f.registry.len().await.unwrap(), 0);

        let src = source(&f.dir, "big", 30);
        f.cache.store("big", &src).await.unwrap();
        // Una sola entrada mayor que el presupuesto: el registro queda vacío
        assert_eq!(f.registry.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cleanup_reconciles_disk_and_registry() {
        let f = fixture(1_000).await;
        let src = source(&f.dir, "song", 10);
        f.cache.store("kept", &src).await.unwrap();

        std::fs::write(f.cache.path_for("orphan"), b"x").unwrap();
        f.registry.insert("ghost", 5).await.unwrap();

        let stale = f.cache.tmp_dir().join("stale.tmp");
        let stale_file = std::fs::File::create(&stale).unwrap();
        stale_file
            .set_modified(SystemTime::now() - Duration::from_secs(25 * 60 * 60))
            .unwrap();
        let fresh = f.cache.tmp_dir().join("fresh.tmp");
        std::fs::write(&fresh, b"y").unwrap();

        let report = f.cache.cleanup_orphans().await.unwrap();
        assert_eq!(
            report,
            OrphanReport {
                files_removed: 1,
                records_removed: 1,
                temp_files_removed: 1,
            }
        );
        assert!(!f.cache.path_for("orphan").exists());
        assert!(f.cache.path_for("kept").exists());
        assert!(!stale.exists());
        assert!(fresh.exists());
    }

    struct FakeDownloader {
        calls: AtomicUsize,
        payload: Vec<u8>,
    }

    #[async_trait]
    impl TrackDownloader for FakeDownloader {
        async fn download(&self, _url: &str, dest: &Path) -> Result<u64, CacheError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            fs::write(dest, &self.payload).await?;
            Ok(self.payload.len() as u64)
        }
    }

    #[tokio::test]
    async fn populate_downloads_once() {
        let f = fixture(1_000).await;
        let downloader = FakeDownloader {
            calls: AtomicUsize::new(0),
            payload: vec![1, 2, 3],
        };

        let path = f
            .cache
            .populate_from("k1", "https://cdn.example/a", &downloader)
            .await
            .unwrap();
        f.cache
            .populate_from("k1", "https://cdn.example/a", &downloader)
            .await
            .unwrap();

        assert_eq!(std::fs::read(path).unwrap(), vec![1, 2, 3]);
        assert_eq!(downloader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read_dir(f.cache.tmp_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn stats_and_recent_report_registry() {
        let f = fixture(1_000).await;
        for key in ["a", "b"] {
            let src = source(&f.dir, key, 5);
            f.cache.store(key, &src).await.unwrap();
        }

        assert_eq!(
            f.cache.stats().await.unwrap(),
            CacheStats {
                entries: 2,
                total_bytes: 10,
                limit_bytes: 1_000,
            }
        );
        let recent: Vec<String> = f
            .cache
            .recent(1)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(recent, vec!["b".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_stores_stay_within_budget() {
        let f = fixture(100).await;
        let cache = Arc::new(f.cache);

        let mut tasks = Vec::new();
        for i in 0..20 {
            let src = source(&f.dir, &format!("song-{i}.webm"), 30);
            let cache = Arc::clone(&cache);
            tasks.push(tokio::spawn(async move {
                cache.store(&format!("k{i}"), &src).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let total = f.registry.total_size().await.unwrap();
        assert!(total <= 100, "registry holds {total} bytes");

        let keys = f.registry.keys().await.unwrap();
        let mut on_disk = 0;
        for key in &keys {
            on_disk += std::fs::metadata(cache.path_for(key)).unwrap().len();
        }
        assert_eq!(on_disk, total);

        let files = std::fs::read_dir(cache.path_for("k0").parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .count();
        assert_eq!(files, keys.len());
    }
}
