use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// 2 GiB
pub const DEFAULT_CACHE_LIMIT: u64 = 2 * 1024 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // APIs (opcionales)
    pub youtube_api_key: Option<String>,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,

    // Paths
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,

    // Caché de pistas
    pub cache_limit_bytes: u64,
    pub eviction_batch_size: usize,
    pub cache_max_track_seconds: u64,

    // Proveedores
    pub throttle_concurrency: usize,

    // Mantenimiento
    pub maintenance_interval: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let data_dir: PathBuf = std::env::var("DATA_DIR")
            .unwrap_or_else(|_| "/data".to_string())
            .into();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            youtube_api_key: std::env::var("YOUTUBE_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            spotify_client_id: non_empty_var("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: non_empty_var("SPOTIFY_CLIENT_SECRET"),

            // Paths
            cache_dir: std::env::var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("cache")),
            data_dir,

            cache_limit_bytes: parse_size(
                &std::env::var("CACHE_LIMIT").unwrap_or_else(|_| "2GB".to_string()),
            ),
            eviction_batch_size: std::env::var("EVICTION_BATCH_SIZE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            cache_max_track_seconds: std::env::var("CACHE_MAX_TRACK_SECONDS")
                .unwrap_or_else(|_| "1800".to_string()) // 30 minutos
                .parse()?,

            throttle_concurrency: std::env::var("THROTTLE_CONCURRENCY")
                .unwrap_or_else(|_| "4".to_string())
                .parse()?,

            maintenance_interval: Duration::from_secs(
                std::env::var("MAINTENANCE_INTERVAL_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()?,
            ),
        };

        // Crear directorios si no existen
        std::fs::create_dir_all(&config.data_dir)?;
        std::fs::create_dir_all(&config.cache_dir)?;
        std::fs::create_dir_all(config.cache_tmp_dir())?;

        config.validate()?;

        Ok(config)
    }

    /// Both Spotify credentials, when configured.
    pub fn spotify_credentials(&self) -> Option<(String, String)> {
        Some((self.spotify_client_id.clone()?, self.spotify_client_secret.clone()?))
    }

    /// Directory for in-progress cache writes.
    pub fn cache_tmp_dir(&self) -> PathBuf {
        self.cache_dir.join("tmp")
    }

    /// Rejects budgets and pool sizes that would disable the service.
    pub fn validate(&self) -> Result<()> {
        if self.cache_limit_bytes == 0 {
            anyhow::bail!("CACHE_LIMIT must be greater than 0");
        }

        if self.throttle_concurrency == 0 {
            anyhow::bail!("THROTTLE_CONCURRENCY must be greater than 0");
        }

        if self.eviction_batch_size == 0 {
            anyhow::bail!("EVICTION_BATCH_SIZE must be greater than 0");
        }

        if self.maintenance_interval.is_zero() {
            anyhow::bail!("MAINTENANCE_INTERVAL_SECS must be greater than 0");
        }

        if self.cache_dir == self.data_dir {
            anyhow::bail!("CACHE_DIR must differ from DATA_DIR");
        }

        Ok(())
    }

    /// Configuration summary for logs. Never includes the token.
    pub fn summary(&self) -> String {
        format!(
            "Hertz Configuration:\n\
             - Data dir: {}\n\
             - Cache dir: {}\n\
             - Cache limit: {} bytes\n\
             - Eviction batch: {}\n\
             - Cacheable tracks up to: {}\n\
             - Provider concurrency: {}\n\
             - Maintenance every: {}\n\
             - YouTube Data API: {}\n\
             - Spotify: {}\n\
             - Dev guild: {}",
            self.data_dir.display(),
            self.cache_dir.display(),
            self.cache_limit_bytes,
            self.eviction_batch_size,
            humantime::format_duration(Duration::from_secs(self.cache_max_track_seconds)),
            self.throttle_concurrency,
            humantime::format_duration(self.maintenance_interval),
            if self.youtube_api_key.is_some() { "enabled" } else { "yt-dlp only" },
            if self.spotify_credentials().is_some() { "enabled" } else { "disabled" },
            self.guild_id
                .map(|g| g.to_string())
                .unwrap_or_else(|| "global".to_string()),
        )
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Parses `<number>[B|KB|MB|GB|TB]` (binary multiples, case-insensitive).
///
/// Invalid input logs a warning and yields [`DEFAULT_CACHE_LIMIT`].
pub fn parse_size(raw: &str) -> u64 {
    let pattern = match Regex::new(r"^([\d.]+)\s*([KMGT]?B)?$") {
        Ok(re) => re,
        Err(_) => return DEFAULT_CACHE_LIMIT,
    };

    let normalized = raw.trim().to_uppercase();
    let Some(caps) = pattern.captures(&normalized) else {
        warn!("⚠️ Tamaño de caché inválido {:?}, usando 2GB", raw);
        return DEFAULT_CACHE_LIMIT;
    };

    let Ok(number) = caps[1].parse::<f64>() else {
        warn!("⚠️ Tamaño de caché inválido {:?}, usando 2GB", raw);
        return DEFAULT_CACHE_LIMIT;
    };

    let multiplier: u64 = match caps.get(2).map(|m| m.as_str()) {
        Some("KB") => 1 << 10,
        Some("MB") => 1 << 20,
        Some("GB") => 1 << 30,
        Some("TB") => 1 << 40,
        _ => 1,
    };

    (number * multiplier as f64) as u64
}
