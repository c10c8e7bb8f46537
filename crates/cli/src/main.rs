use {
    clap::{Parser, Subcommand},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "streamhub", about = "Live-streaming signaling and room-coordination hub")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Port to listen on (overrides config value, or to query when talking
    /// to an already-running instance for `rooms`).
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server (default when no subcommand is provided).
    Gateway,
    /// Query a running instance's room directory over HTTP.
    Rooms {
        #[command(subcommand)]
        action: RoomsAction,
    },
    /// Inspect the effective configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum RoomsAction {
    /// List every room currently tracked by the instance.
    List,
    /// Show one room's snapshot.
    Info { room_id: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration after env substitution and overrides.
    Get { key: Option<String> },
    /// Set a config value (not yet implemented; edit the config file directly).
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry(&cli.log_level, cli.json_logs);

    let mut config = streamhub_config::discover_and_load();
    if let Some(port) = cli.port {
        config.port = port;
    }

    match cli.command.unwrap_or(Commands::Gateway) {
        Commands::Gateway => streamhub_gateway::server::run(config).await.map_err(|error| anyhow::anyhow!(error)),
        Commands::Rooms { action } => handle_rooms(action, config.port).await,
        Commands::Config { action } => handle_config(action, &config),
    }
}

async fn handle_rooms(action: RoomsAction, port: u16) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let body: serde_json::Value = client.get(format!("http://127.0.0.1:{port}/api/rooms")).send().await?.json().await?;

    match action {
        RoomsAction::List => println!("{}", serde_json::to_string_pretty(&body)?),
        RoomsAction::Info { room_id } => {
            let room = body["rooms"].as_array().and_then(|rooms| rooms.iter().find(|room| room["roomId"] == room_id));
            match room {
                Some(room) => println!("{}", serde_json::to_string_pretty(room)?),
                None => anyhow::bail!("no such room: {room_id}"),
            }
        },
    }
    Ok(())
}

fn handle_config(action: ConfigAction, config: &streamhub_config::StreamhubConfig) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key: None } => println!("{}", serde_json::to_string_pretty(config)?),
        ConfigAction::Get { key: Some(key) } => {
            let value = serde_json::to_value(config)?;
            match value.get(&key) {
                Some(value) => println!("{value}"),
                None => anyhow::bail!("no such config key: {key}"),
            }
        },
        ConfigAction::Set { .. } => eprintln!("not yet implemented; edit the config file directly"),
    }
    Ok(())
}

fn init_telemetry(log_level: &str, json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
