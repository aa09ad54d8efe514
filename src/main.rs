use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info, warn};

use hertz::audio::{PlayerManager, PlayerOptions, SessionServices};
use hertz::audio::songbird_transport::SongbirdTransportFactory;
use hertz::bot::{BotServices, HertzBot, SerenityAnnouncer};
use hertz::cache::{ContentCache, ContentCacheConfig, HttpDownloader, KeyValueCache};
use hertz::config::Config;
use hertz::sources::youtube::YouTubeBackend;
use hertz::sources::{
    CachedStreamResolver, QueryResolver, RequestThrottle, SpotifyClient, YouTubeApiClient, YtDlpClient,
};
use hertz::storage::{JsonCacheRegistry, JsonFavorites, JsonStorage, KeyValueRecords};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hertz=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Hertz v{}", env!("CARGO_PKG_VERSION"));

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    // Cargar configuración
    let config = Config::load()?;
    config.validate()?;
    info!("{}", config.summary());

    // Almacenamiento JSON
    let storage = Arc::new(JsonStorage::new(config.data_dir.clone()).await?);
    let registry = Arc::new(JsonCacheRegistry::open(&config.data_dir.join("file_caches.json")).await?);
    let records = Arc::new(KeyValueRecords::open(&config.data_dir.join("key_value_caches.json")).await?);
    let kv = KeyValueCache::new(records);
    let favorites = Arc::new(JsonFavorites::new(config.data_dir.clone()));

    // Caché de pistas, reconciliada al arrancar
    let cache = Arc::new(
        ContentCache::new(
            ContentCacheConfig {
                eviction_batch_size: config.eviction_batch_size,
                ..ContentCacheConfig::new(config.cache_dir.clone(), config.cache_limit_bytes)
            },
            registry,
        )
        .await?,
    );
    if let Err(e) = cache.cleanup().await {
        warn!("⚠️ Error en la limpieza inicial de caché: {}", e);
    }
    let expired = kv.sweep_expired().await;
    info!("🧹 {} claves expiradas eliminadas al arrancar", expired);

    // Proveedores
    let http = reqwest::Client::new();
    let throttle = Arc::new(RequestThrottle::new(config.throttle_concurrency));
    let ytdlp = Arc::new(YtDlpClient::default());
    let backend: Arc<dyn YouTubeBackend> = match &config.youtube_api_key {
        Some(key) => {
            info!("🔑 Usando YouTube Data API para metadatos");
            Arc::new(YouTubeApiClient::new(key.clone(), http.clone()))
        }
        None => Arc::clone(&ytdlp) as Arc<dyn YouTubeBackend>,
    };
    let mut resolver = QueryResolver::new(backend, Arc::clone(&throttle), kv.clone());
    if let Some((client_id, client_secret)) = config.spotify_credentials() {
        info!("🔑 Soporte de Spotify habilitado");
        resolver = resolver.with_spotify(Arc::new(SpotifyClient::new(client_id, client_secret, http.clone())));
    }
    let resolver = Arc::new(resolver);
    let streams = Arc::new(CachedStreamResolver::new(ytdlp, throttle, kv.clone()));

    // Motor de reproducción
    let songbird = Songbird::serenity();
    let announcer = Arc::new(SerenityAnnouncer::new());
    let services = SessionServices {
        cache: Arc::clone(&cache),
        streams,
        downloader: Arc::new(HttpDownloader::new(http.clone())),
        settings: storage.clone(),
        announcer: announcer.clone(),
        options: PlayerOptions {
            cacheable_max_seconds: config.cache_max_track_seconds,
            ..PlayerOptions::default()
        },
    };
    let transports = Arc::new(SongbirdTransportFactory::new(Arc::clone(&songbird), http));
    let players = Arc::new(PlayerManager::new(services, transports));

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let token = config.discord_token.clone();
    let bot = HertzBot::new(BotServices {
        config: Arc::new(config),
        players,
        resolver,
        settings: storage,
        favorites,
        cache,
        kv,
        announcer,
    });
    let shutdown = bot.shutdown_token();

    let mut client = Client::builder(&token, intents)
        .event_handler(bot)
        .register_songbird_with(songbird)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("❌ Error al registrar Ctrl+C: {}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shutdown.cancel();
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("❌ Error al ejecutar cliente: {:?}", why);
    }

    info!("👋 Hertz detenido");
    Ok(())
}

async fn health_check() -> Result<()> {
    // Verificar dependencias críticas
    let yt_dlp = async_process::Command::new("yt-dlp")
        .arg("--version")
        .output()
        .await?;

    let ffmpeg = async_process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await?;

    if yt_dlp.status.success() && ffmpeg.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Dependencias faltantes");
    }
}
