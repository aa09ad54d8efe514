use anyhow::{anyhow, Result};
use num_format::{Locale, ToFormattedString};
use rand::seq::SliceRandom;
use serenity::{
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse},
    model::{
        application::{CommandDataOption, CommandDataOptionValue, CommandInteraction},
        channel::ChannelType,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::{
    audio::{Player, PlayerStatus, QueuedTrack, TrackQueue},
    bot::HertzBot,
    cache::CacheStats,
    error::{FavoriteError, PlayerError, ResolveError},
    sources::ResolveOptions,
    storage::{CacheRecord, Favorite, GuildSettings},
    utils::{parse_time, pretty_time},
};

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &HertzBot) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    if command.data.name == "play" || is_favorite_use(&command) {
        return handle_play(ctx, &command, bot, guild_id).await;
    }

    let reply = match command.data.name.as_str() {
        "pause" => handle_pause(bot, guild_id).await,
        "resume" => handle_resume(ctx, &command, bot, guild_id).await,
        "next" => handle_next(&command, bot, guild_id).await,
        "back" => handle_back(bot, guild_id).await,
        "seek" => handle_seek(&command, bot, guild_id, false).await,
        "fseek" => handle_seek(&command, bot, guild_id, true).await,
        "replay" => handle_replay(bot, guild_id).await,
        "stop" => handle_stop(bot, guild_id).await,
        "disconnect" => handle_disconnect(bot, guild_id).await,
        "loop" => handle_loop(bot, guild_id, false).await,
        "loop-queue" => handle_loop(bot, guild_id, true).await,
        "volume" => handle_volume(&command, bot, guild_id).await,
        "queue" => handle_queue(&command, bot, guild_id).await,
        "now-playing" => handle_now_playing(bot, guild_id).await,
        "clear" => handle_clear(bot, guild_id).await,
        "shuffle" => handle_shuffle(bot, guild_id).await,
        "remove" => handle_remove(&command, bot, guild_id).await,
        "move" => handle_move(&command, bot, guild_id).await,
        "cache" => handle_cache(bot).await,
        "config" => handle_config(&command, bot, guild_id).await,
        "favorites" => handle_favorites(ctx, &command, bot, guild_id).await,
        _ => Err(anyhow!("Comando no reconocido")),
    };

    let (content, ephemeral) = match reply {
        Ok(content) => (content, false),
        Err(e) => (format!("❌ {e}"), true),
    };

    respond(ctx, &command, content, ephemeral).await
}

async fn respond(ctx: &Context, command: &CommandInteraction, content: String, ephemeral: bool) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

// Opciones

fn find_option<'a>(options: &'a [CommandDataOption], name: &str) -> Option<&'a CommandDataOptionValue> {
    options.iter().find(|opt| opt.name == name).map(|opt| &opt.value)
}

fn option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a CommandDataOptionValue> {
    find_option(&command.data.options, name)
}

/// Nombre y opciones del subcomando invocado
fn subcommand(command: &CommandInteraction) -> Option<(&str, &[CommandDataOption])> {
    let first = command.data.options.first()?;
    match &first.value {
        CommandDataOptionValue::SubCommand(options) => Some((first.name.as_str(), options.as_slice())),
        _ => None,
    }
}

fn is_favorite_use(command: &CommandInteraction) -> bool {
    command.data.name == "favorites" && subcommand(command).is_some_and(|(name, _)| name == "use")
}

fn str_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    option(command, name).and_then(|v| v.as_str())
}

fn int_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    option(command, name).and_then(|v| v.as_i64())
}

fn bool_option(command: &CommandInteraction, name: &str) -> Option<bool> {
    option(command, name).and_then(|v| v.as_bool())
}

fn positive(value: Option<i64>, default: usize) -> usize {
    value
        .and_then(|v| usize::try_from(v).ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

/// Canal de voz del usuario, o el canal con más oyentes si no está en ninguno
fn voice_channel_for(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let bot_id = ctx.cache.current_user().id;
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    if let Some(channel) = guild.voice_states.get(&user_id).and_then(|state| state.channel_id) {
        return Some(channel);
    }

    let mut channels: Vec<_> = guild
        .channels
        .values()
        .filter(|channel| channel.kind == ChannelType::Voice)
        .map(|channel| (channel.position, channel.id))
        .collect();
    channels.sort_unstable();

    let listeners = guild
        .voice_states
        .values()
        .filter(|state| state.user_id != bot_id)
        .filter(|state| !state.member.as_ref().is_some_and(|m| m.user.bot))
        .filter_map(|state| state.channel_id);

    most_populated(channels.into_iter().map(|(_, id)| id), listeners)
}

/// Canal con más oyentes; en empate gana el primero de `channels`
fn most_populated(
    channels: impl IntoIterator<Item = ChannelId>,
    listeners: impl IntoIterator<Item = ChannelId>,
) -> Option<ChannelId> {
    let mut counts: HashMap<ChannelId, usize> = HashMap::new();
    for channel in listeners {
        *counts.entry(channel).or_default() += 1;
    }

    let mut best: Option<(ChannelId, usize)> = None;
    for channel in channels {
        let listening = counts.get(&channel).copied().unwrap_or(0);
        if best.map_or(true, |(_, most)| listening > most) {
            best = Some((channel, listening));
        }
    }
    best.map(|(channel, _)| channel)
}

/// Lo necesario para encolar desde /play o /favorites use
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlayRequest {
    query: String,
    immediate: bool,
    shuffle: bool,
    skip: bool,
    split: bool,
}

impl PlayRequest {
    fn from_options(query: String, options: &[CommandDataOption]) -> Self {
        let flag = |name: &str| find_option(options, name).and_then(|v| v.as_bool()).unwrap_or(false);
        Self {
            query,
            immediate: flag("immediate"),
            shuffle: flag("shuffle"),
            skip: flag("skip"),
            split: flag("split"),
        }
    }
}

async fn play_request(command: &CommandInteraction, bot: &HertzBot, guild_id: GuildId) -> Result<PlayRequest> {
    let Some((_, options)) = subcommand(command).filter(|_| is_favorite_use(command)) else {
        let query = str_option(command, "query").ok_or_else(|| anyhow!("Query no proporcionado"))?;
        return Ok(PlayRequest::from_options(query.to_string(), &command.data.options));
    };

    let name = find_option(options, "name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("Nombre no proporcionado"))?;
    let favorite = bot
        .favorites
        .get(guild_id.get(), name)
        .await?
        .ok_or_else(|| FavoriteError::NotFound(name.to_string()))?;

    info!("⭐ {} usó el favorito '{}' en guild {}", command.user.name, name, guild_id);
    Ok(PlayRequest::from_options(favorite.query, options))
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &HertzBot,
    guild_id: GuildId,
) -> Result<()> {
    let settings = bot.guild_settings(guild_id).await;

    // Defer la respuesta ya que puede tomar tiempo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(
                CreateInteractionResponseMessage::new().ephemeral(settings.queue_add_response_ephemeral),
            ),
        )
        .await?;

    let outcome = match play_request(command, bot, guild_id).await {
        Ok(request) => play_query(ctx, command, bot, guild_id, &settings, &request).await,
        Err(e) => Err(e),
    };
    let content = match outcome {
        Ok(content) => content,
        Err(e) => format!("❌ {e}"),
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;
    Ok(())
}

async fn play_query(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &HertzBot,
    guild_id: GuildId,
    settings: &GuildSettings,
    request: &PlayRequest,
) -> Result<String> {
    let (immediate, skip) = (request.immediate, request.skip);

    let voice_channel = voice_channel_for(ctx, guild_id, command.user.id);

    let options = ResolveOptions {
        playlist_limit: settings.playlist_limit,
        split_chapters: request.split,
    };

    let resolved = match bot.resolver.resolve(&request.query, options).await {
        Ok(resolved) => resolved,
        Err(ResolveError::NothingFound(_)) => return Err(anyhow!("no songs found")),
        Err(e) => return Err(e.into()),
    };

    let mut tracks: Vec<QueuedTrack> = resolved
        .tracks
        .into_iter()
        .map(|meta| QueuedTrack::new(meta, command.channel_id, command.user.id))
        .collect();
    if request.shuffle {
        tracks.shuffle(&mut rand::thread_rng());
    }

    let Some(first) = tracks.first().cloned() else {
        return Err(anyhow!("no songs found"));
    };
    let count = tracks.len();

    let player = bot.players.get_or_create(guild_id);
    let mut player = player.lock().await;

    player.add_all(tracks, immediate);

    let mut notes: Vec<String> = resolved.advisory.into_iter().collect();

    if !player.is_connected() {
        player.connect(voice_channel).await?;
        player.play().await?;
    } else if player.status() == PlayerStatus::Idle {
        player.play().await?;
    }

    if skip {
        if let Err(e) = player.forward(1).await {
            warn!("⚠️ Error saltando pista en guild {}: {}", guild_id, e);
            notes.push("no song to skip to".to_string());
        }
    }

    let mut content = added_line(&first, count, immediate);
    if !notes.is_empty() {
        content.push_str(&format!(" ({})", notes.join(", ")));
    }
    Ok(content)
}

async fn handle_pause(bot: &HertzBot, guild_id: GuildId) -> Result<String> {
    let player = bot.players.get_or_create(guild_id);
    player.lock().await.pause().await?;
    Ok("⏸️ Pausado".to_string())
}

async fn handle_resume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &HertzBot,
    guild_id: GuildId,
) -> Result<String> {
    let player = bot.players.get_or_create(guild_id);
    let mut player = player.lock().await;

    if player.status() == PlayerStatus::Playing {
        return Err(PlayerError::InvalidState("already playing, give me a song name".into()).into());
    }
    if player.current().is_none() {
        return Err(PlayerError::InvalidState("nothing to play".into()).into());
    }

    if !player.is_connected() {
        let channel = voice_channel_for(ctx, guild_id, command.user.id);
        player.connect(channel).await?;
    }
    player.play().await?;

    Ok(format!("▶️ Reanudado: {}", current_title(&player)))
}

async fn handle_next(command: &CommandInteraction, bot: &HertzBot, guild_id: GuildId) -> Result<String> {
    let amount = positive(int_option(command, "amount"), 1);
    let player = bot.players.get_or_create(guild_id);
    let mut player = player.lock().await;

    player.forward(amount).await?;

    Ok(match player.current() {
        Some(track) => format!("⏭️ Saltado. Ahora: **{}**", track.title),
        None => "⏭️ Fin de la cola".to_string(),
    })
}

async fn handle_back(bot: &HertzBot, guild_id: GuildId) -> Result<String> {
    let player = bot.players.get_or_create(guild_id);
    let mut player = player.lock().await;
    player.back().await?;
    Ok(format!("⏮️ Volviendo a **{}**", current_title(&player)))
}

async fn handle_seek(
    command: &CommandInteraction,
    bot: &HertzBot,
    guild_id: GuildId,
    relative: bool,
) -> Result<String> {
    let raw = str_option(command, "time").unwrap_or_default();
    let seconds = parse_time(raw).ok_or_else(|| anyhow!("invalid time: {raw}"))?;

    let player = bot.players.get_or_create(guild_id);
    let mut player = player.lock().await;

    if relative {
        player.forward_seek(seconds).await?;
    } else {
        player.seek(seconds).await?;
    }

    Ok(format!("⏩ Posición: {}", pretty_time(player.position())))
}

async fn handle_replay(bot: &HertzBot, guild_id: GuildId) -> Result<String> {
    let player = bot.players.get_or_create(guild_id);
    let mut player = player.lock().await;

    let track = player
        .current()
        .cloned()
        .ok_or_else(|| PlayerError::InvalidState("nothing is playing".into()))?;
    if track.is_live {
        return Err(PlayerError::InvalidState("can't replay a livestream".into()).into());
    }

    player.seek(0).await?;
    Ok(format!("⏪ Reiniciando **{}**", track.title))
}

async fn handle_stop(bot: &HertzBot, guild_id: GuildId) -> Result<String> {
    let player = bot.players.get_or_create(guild_id);
    player.lock().await.stop().await?;
    Ok("⏹️ Detenido y cola vaciada".to_string())
}

async fn handle_disconnect(bot: &HertzBot, guild_id: GuildId) -> Result<String> {
    let player = bot.players.get_or_create(guild_id);
    let mut player = player.lock().await;

    if !player.is_connected() {
        return Err(PlayerError::NotConnected.into());
    }
    player.disconnect().await?;
    Ok("👋 Desconectado".to_string())
}

async fn handle_loop(bot: &HertzBot, guild_id: GuildId, whole_queue: bool) -> Result<String> {
    let player = bot.players.get_or_create(guild_id);
    let mut player = player.lock().await;

    let enabled = if whole_queue {
        let enabled = !player.loop_queue();
        player.set_loop_queue(enabled)?;
        enabled
    } else {
        let enabled = !player.loop_track();
        player.set_loop_track(enabled)?;
        enabled
    };

    let target = if whole_queue { "la cola" } else { "la canción" };
    Ok(if enabled {
        format!("🔁 Repitiendo {target}")
    } else {
        format!("➡️ Ya no se repite {target}")
    })
}

async fn handle_volume(command: &CommandInteraction, bot: &HertzBot, guild_id: GuildId) -> Result<String> {
    let level = int_option(command, "level").ok_or_else(|| anyhow!("Nivel no proporcionado"))?;
    let level = i32::try_from(level).unwrap_or(if level < 0 { 0 } else { 100 });

    let player = bot.players.get_or_create(guild_id);
    let volume = player.lock().await.set_volume(level).await?;
    Ok(format!("🔊 Volumen ajustado a {volume}%"))
}

async fn handle_queue(command: &CommandInteraction, bot: &HertzBot, guild_id: GuildId) -> Result<String> {
    let settings = bot.guild_settings(guild_id).await;
    let page = positive(int_option(command, "page"), 1);

    let player = bot.players.get_or_create(guild_id);
    let player = player.lock().await;

    if player.current().is_none() && player.queue().upcoming().is_empty() {
        return Err(anyhow!("queue is empty"));
    }

    Ok(render_queue(&player, page, settings.default_queue_page_size))
}

async fn handle_now_playing(bot: &HertzBot, guild_id: GuildId) -> Result<String> {
    let player = bot.players.get_or_create(guild_id);
    let player = player.lock().await;
    render_now_playing(&player).ok_or_else(|| anyhow!("nothing is currently playing"))
}

async fn handle_clear(bot: &HertzBot, guild_id: GuildId) -> Result<String> {
    let player = bot.players.get_or_create(guild_id);
    player.lock().await.queue_mut().clear();
    Ok("🧹 Cola limpiada".to_string())
}

async fn handle_shuffle(bot: &HertzBot, guild_id: GuildId) -> Result<String> {
    let player = bot.players.get_or_create(guild_id);
    let mut player = player.lock().await;

    if player.queue().upcoming().len() < 2 {
        return Err(anyhow!("not enough songs to shuffle"));
    }
    player.queue_mut().shuffle();
    Ok("🔀 Cola mezclada".to_string())
}

async fn handle_remove(command: &CommandInteraction, bot: &HertzBot, guild_id: GuildId) -> Result<String> {
    let position = positive(int_option(command, "position"), 1);
    let amount = positive(int_option(command, "amount"), 1);

    let player = bot.players.get_or_create(guild_id);
    let removed = player.lock().await.queue_mut().remove(position, amount)?;

    Ok(match removed.as_slice() {
        [single] => format!("🗑️ Eliminada **{}**", single.title),
        many => format!("🗑️ Eliminadas {} canciones", many.len()),
    })
}

async fn handle_move(command: &CommandInteraction, bot: &HertzBot, guild_id: GuildId) -> Result<String> {
    let from = positive(int_option(command, "from"), 0);
    let to = positive(int_option(command, "to"), 0);

    let player = bot.players.get_or_create(guild_id);
    let mut player = player.lock().await;
    let moved = player.queue_mut().move_track(from, to)?;

    Ok(format!("↕️ **{}** movida a la posición {}", moved.title, to))
}

async fn handle_cache(bot: &HertzBot) -> Result<String> {
    let stats = bot.cache.stats().await?;
    let recent = bot.cache.recent(5).await?;
    Ok(render_cache(&stats, &recent))
}

async fn handle_config(command: &CommandInteraction, bot: &HertzBot, guild_id: GuildId) -> Result<String> {
    let mut settings = bot.guild_settings(guild_id).await;
    let mut changed = false;

    if let Some(limit) = int_option(command, "playlist-limit") {
        settings.playlist_limit = positive(Some(limit), settings.playlist_limit);
        changed = true;
    }
    if let Some(wait) = int_option(command, "wait-after-queue-empties") {
        settings.seconds_to_wait_after_queue_empties = u64::try_from(wait).unwrap_or(0);
        changed = true;
    }
    if let Some(leave) = bool_option(command, "leave-if-no-listeners") {
        settings.leave_if_no_listeners = leave;
        changed = true;
    }
    if let Some(announce) = bool_option(command, "auto-announce") {
        settings.auto_announce_next_song = announce;
        changed = true;
    }
    if let Some(volume) = int_option(command, "default-volume") {
        settings.default_volume = volume.clamp(0, 100) as u8;
        changed = true;
    }
    if let Some(size) = int_option(command, "page-size") {
        settings.default_queue_page_size = positive(Some(size), settings.default_queue_page_size);
        changed = true;
    }

    if changed {
        bot.settings.update_guild_settings(settings.clone()).await?;
    }

    Ok(render_settings(&settings, changed))
}

async fn handle_favorites(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &HertzBot,
    guild_id: GuildId,
) -> Result<String> {
    let (action, options) = subcommand(command).ok_or_else(|| anyhow!("Subcomando no proporcionado"))?;
    let text = |name: &str| find_option(options, name).and_then(|v| v.as_str());

    match action {
        "list" => Ok(render_favorites(&bot.favorites.list(guild_id.get()).await?)),
        "create" => {
            let name = text("name").ok_or_else(|| anyhow!("Nombre no proporcionado"))?;
            let query = text("query").ok_or_else(|| anyhow!("Query no proporcionado"))?;
            bot.favorites
                .create(guild_id.get(), Favorite::new(name, query, command.user.id.get()))
                .await?;
            Ok(format!("💾 Favorito **{name}** guardado"))
        }
        "remove" => {
            let name = text("name").ok_or_else(|| anyhow!("Nombre no proporcionado"))?;
            let owner = guild_id
                .to_guild_cached(&ctx.cache)
                .is_some_and(|guild| guild.owner_id == command.user.id);
            bot.favorites
                .remove(guild_id.get(), name, command.user.id.get(), owner)
                .await?;
            Ok(format!("🗑️ Favorito **{name}** eliminado"))
        }
        _ => Err(anyhow!("Subcomando no reconocido")),
    }
}

// Renderizado de respuestas

fn render_favorites(favorites: &[Favorite]) -> String {
    if favorites.is_empty() {
        return "📭 No hay favoritos guardados. Crea uno con `/favorites create`".to_string();
    }

    let mut lines = vec!["⭐ Favoritos del servidor".to_string()];
    for favorite in favorites {
        let query: String = favorite.query.chars().take(50).collect();
        let ellipsis = if favorite.query.chars().count() > 50 { "..." } else { "" };
        lines.push(format!(
            "**{}**: {}{} · <@{}>",
            favorite.name, query, ellipsis, favorite.author_id
        ));
    }
    lines.join("\n")
}

fn current_title(player: &Player) -> String {
    player
        .current()
        .map(|t| t.title.clone())
        .unwrap_or_else(|| "-".to_string())
}

fn track_length(track: &QueuedTrack) -> String {
    if track.is_live {
        "live".to_string()
    } else {
        pretty_time(track.duration)
    }
}

fn added_line(first: &QueuedTrack, count: usize, immediate: bool) -> String {
    let place = if immediate { "al frente de" } else { "a" };
    match (count, &first.playlist) {
        (1, _) => format!("➕ **{}** agregada {} la cola", first.title, place),
        (n, Some(playlist)) => format!(
            "➕ **{}** y {} canciones más de **{}** agregadas {} la cola",
            first.title,
            n - 1,
            playlist.title,
            place
        ),
        (n, None) => format!("➕ {} canciones agregadas {} la cola", n, place),
    }
}

fn render_queue_page(queue: &TrackQueue, page: usize, per_page: usize) -> String {
    let page = queue.page(page, per_page);
    let mut lines = Vec::new();

    if page.items.is_empty() {
        lines.push("_No hay canciones en espera_".to_string());
    }
    for (index, track) in &page.items {
        lines.push(format!("`{}.` {} [{}]", index, track.title, track_length(track)));
    }

    lines.push(format!(
        "Página {}/{} · {} en espera · {} en total",
        page.page,
        page.total_pages,
        queue.upcoming().len(),
        pretty_time(queue.total_duration())
    ));
    lines.join("\n")
}

fn render_queue(player: &Player, page: usize, per_page: usize) -> String {
    let mut out = String::new();
    if let Some(now) = render_now_playing(player) {
        out.push_str(&now);
        out.push_str("\n\n");
    }
    out.push_str(&render_queue_page(player.queue(), page, per_page));
    out
}

fn render_now_playing(player: &Player) -> Option<String> {
    let track = player.current()?;
    let state = match player.status() {
        PlayerStatus::Playing => "▶️",
        PlayerStatus::Paused => "⏸️",
        PlayerStatus::Idle => "⏹️",
    };

    let progress = if track.is_live {
        "live".to_string()
    } else {
        format!("{}/{}", pretty_time(player.position()), pretty_time(track.duration))
    };

    let mut flags = Vec::new();
    if player.loop_track() {
        flags.push("🔂");
    }
    if player.loop_queue() {
        flags.push("🔁");
    }

    Some(format!(
        "{} **{}** by {} [{}] 🔊 {}% {}",
        state,
        track.title,
        track.artist,
        progress,
        player.volume(),
        flags.join(" ")
    )
    .trim_end()
    .to_string())
}

fn render_cache(stats: &CacheStats, recent: &[CacheRecord]) -> String {
    let used = stats.total_bytes.to_formatted_string(&Locale::en);
    let limit = stats.limit_bytes.to_formatted_string(&Locale::en);
    let percent = if stats.limit_bytes == 0 {
        0.0
    } else {
        stats.total_bytes as f64 * 100.0 / stats.limit_bytes as f64
    };

    let mut lines = vec![format!(
        "💾 {} archivos · {} / {} bytes ({:.1}%)",
        stats.entries, used, limit, percent
    )];
    for record in recent {
        lines.push(format!(
            "`{}` {} bytes · {}",
            &record.key[..record.key.len().min(12)],
            record.bytes.to_formatted_string(&Locale::en),
            record.accessed_at.format("%Y-%m-%d %H:%M")
        ));
    }
    lines.join("\n")
}

fn render_settings(settings: &GuildSettings, changed: bool) -> String {
    let header = if changed {
        "⚙️ Configuración actualizada"
    } else {
        "⚙️ Configuración actual"
    };

    format!(
        "{}\n\
         - playlist-limit: {}\n\
         - wait-after-queue-empties: {}s\n\
         - leave-if-no-listeners: {}\n\
         - auto-announce: {}\n\
         - default-volume: {}%\n\
         - page-size: {}",
        header,
        settings.playlist_limit,
        settings.seconds_to_wait_after_queue_empties,
        settings.leave_if_no_listeners,
        settings.auto_announce_next_song,
        settings.default_volume,
        settings.default_queue_page_size,
    )
}
