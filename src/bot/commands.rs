use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        pause_command(),
        resume_command(),
        next_command(),
        back_command(),
        seek_command(),
        fseek_command(),
        replay_command(),
        stop_command(),
        disconnect_command(),
        loop_command(),
        loop_queue_command(),
        volume_command(),
        queue_command(),
        now_playing_command(),
        clear_command(),
        shuffle_command(),
        remove_command(),
        move_command(),
        cache_command(),
        config_command(),
        favorites_command(),
    ]
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce una canción, playlist o stream")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL de YouTube o Spotify, URL de stream o término de búsqueda",
            )
            .required(true),
        )
        .add_option(immediate_option())
        .add_option(shuffle_option())
        .add_option(skip_option())
        .add_option(split_option())
}

// Opciones compartidas por /play y /favorites use

fn immediate_option() -> CreateCommandOption {
    CreateCommandOption::new(
        CommandOptionType::Boolean,
        "immediate",
        "Agregar al frente de la cola",
    )
}

fn shuffle_option() -> CreateCommandOption {
    CreateCommandOption::new(
        CommandOptionType::Boolean,
        "shuffle",
        "Mezclar las canciones de la playlist antes de agregarlas",
    )
}

fn skip_option() -> CreateCommandOption {
    CreateCommandOption::new(CommandOptionType::Boolean, "skip", "Saltar la canción actual")
}

fn split_option() -> CreateCommandOption {
    CreateCommandOption::new(
        CommandOptionType::Boolean,
        "split",
        "Dividir el video en capítulos",
    )
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa la reproducción actual")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Reanuda la reproducción pausada")
}

fn next_command() -> CreateCommand {
    CreateCommand::new("next")
        .description("Salta a la siguiente canción")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "amount",
                "Número de canciones a saltar",
            )
            .min_int_value(1),
        )
}

fn back_command() -> CreateCommand {
    CreateCommand::new("back").description("Vuelve a la canción anterior")
}

fn seek_command() -> CreateCommand {
    CreateCommand::new("seek")
        .description("Salta a una posición de la canción actual")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "time",
                "Posición (ej: 1:30, 90, 1m30s)",
            )
            .required(true),
        )
}

fn fseek_command() -> CreateCommand {
    CreateCommand::new("fseek")
        .description("Avanza dentro de la canción actual")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "time", "Tiempo a avanzar")
                .required(true),
        )
}

fn replay_command() -> CreateCommand {
    CreateCommand::new("replay").description("Reinicia la canción actual desde el principio")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la reproducción y limpia la cola")
}

fn disconnect_command() -> CreateCommand {
    CreateCommand::new("disconnect").description("Desconecta el bot y conserva la cola")
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop").description("Activa/desactiva la repetición de la canción")
}

fn loop_queue_command() -> CreateCommand {
    CreateCommand::new("loop-queue").description("Activa/desactiva la repetición de la cola")
}

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Ajusta el volumen de reproducción")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "level", "Nivel de volumen (0-100)")
                .min_int_value(0)
                .max_int_value(100)
                .required(true),
        )
}

// Comandos de cola

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue")
        .description("Muestra la cola de reproducción")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "page", "Número de página")
                .min_int_value(1),
        )
}

fn now_playing_command() -> CreateCommand {
    CreateCommand::new("now-playing").description("Muestra información de la canción actual")
}

fn clear_command() -> CreateCommand {
    CreateCommand::new("clear").description("Limpia la cola excepto la canción actual")
}

fn shuffle_command() -> CreateCommand {
    CreateCommand::new("shuffle").description("Mezcla las próximas canciones")
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Elimina canciones de la cola")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "position",
                "Posición en la cola (1 = siguiente)",
            )
            .min_int_value(1)
            .required(true),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "amount", "Cantidad a eliminar")
                .min_int_value(1),
        )
}

fn move_command() -> CreateCommand {
    CreateCommand::new("move")
        .description("Mueve una canción dentro de la cola")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "from", "Posición actual")
                .min_int_value(1)
                .required(true),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "to", "Nueva posición")
                .min_int_value(1)
                .required(true),
        )
}

// Comandos de administración

fn cache_command() -> CreateCommand {
    CreateCommand::new("cache").description("Muestra el estado de la caché de pistas")
}

fn config_command() -> CreateCommand {
    CreateCommand::new("config")
        .description("Muestra o cambia la configuración del servidor")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "playlist-limit",
                "Máximo de canciones por playlist",
            )
            .min_int_value(1),
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "wait-after-queue-empties",
                "Segundos antes de desconectar con la cola vacía (0 = nunca)",
            )
            .min_int_value(0),
        )
        .add_option(CreateCommandOption::new(
            CommandOptionType::Boolean,
            "leave-if-no-listeners",
            "Salir del canal cuando no quede nadie",
        ))
        .add_option(CreateCommandOption::new(
            CommandOptionType::Boolean,
            "auto-announce",
            "Anunciar cada canción nueva",
        ))
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "default-volume",
                "Volumen al conectar (0-100)",
            )
            .min_int_value(0)
            .max_int_value(100),
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "page-size",
                "Canciones por página en /queue",
            )
            .min_int_value(1)
            .max_int_value(25),
        )
}

fn favorites_command() -> CreateCommand {
    let name = || {
        CreateCommandOption::new(CommandOptionType::String, "name", "Nombre del favorito")
            .required(true)
    };

    CreateCommand::new("favorites")
        .description("Gestiona las búsquedas favoritas del servidor")
        .add_option(
            CreateCommandOption::new(CommandOptionType::SubCommand, "use", "Reproduce un favorito")
                .add_sub_option(name())
                .add_sub_option(immediate_option())
                .add_sub_option(shuffle_option())
                .add_sub_option(skip_option())
                .add_sub_option(split_option()),
        )
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "list",
            "Lista los favoritos guardados",
        ))
        .add_option(
            CreateCommandOption::new(CommandOptionType::SubCommand, "create", "Guarda un favorito")
                .add_sub_option(name())
                .add_sub_option(
                    CreateCommandOption::new(
                        CommandOptionType::String,
                        "query",
                        "URL de YouTube o Spotify, o término de búsqueda",
                    )
                    .required(true),
                ),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::SubCommand, "remove", "Elimina un favorito")
                .add_sub_option(name()),
        )
}
