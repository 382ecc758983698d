use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use goldberg_config::commands::{self, catalog, config as config_commands, emulator};
use goldberg_config::config::RuntimeConfig;
use goldberg_config::models::{GoldbergConfiguration, GoldbergGlobalConfiguration};
use goldberg_config::services::{StatusLevel, StatusReporter};
use goldberg_config::{build_state, logging, AppState};

/// Configure the Goldberg Steam emulator for installed games
#[derive(Parser)]
#[command(name = "goldberg-config")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare the catalog and emulator, refreshing them in the background once set up
    Init,
    /// Refresh the Steam app catalog
    Sync {
        /// Ignore the update cadence
        #[arg(long)]
        force: bool,
    },
    /// Search games whose names contain every word
    Search {
        name: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Find a game by exact (normalized) name or by app id
    Lookup {
        #[arg(required_unless_present = "id")]
        name: Option<String>,
        #[arg(long)]
        id: Option<u32>,
    },
    /// Guess which game is installed in a directory
    Detect { dir: PathBuf },
    /// List the DLC of a game
    Dlc {
        app_id: u32,
        /// Fill unknown names from the store DLC list or SteamDB
        #[arg(long)]
        steamdb: bool,
    },
    /// Fetch the achievements of a game
    Achievements { app_id: u32 },
    /// Fetch the stats of a game
    Stats { app_id: u32 },
    /// Read the emulator configuration of a game directory
    Read { dir: PathBuf },
    /// Apply the emulator and write its configuration to a game directory
    Save(SaveArgs),
    /// Global emulator settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Download the latest emulator release
    Provision {
        #[arg(long)]
        force: bool,
    },
    /// Show whether an emulator build is installed
    Status,
    /// Swap the emulator binaries into a game directory
    Apply { dir: PathBuf },
    /// Check whether a game directory already runs the emulator
    Applied { dir: PathBuf },
    /// Write steam_interfaces.txt next to an original Steam API binary
    Interfaces { dll: PathBuf },
    /// Languages accepted by the emulator
    Languages,
}

#[derive(Args)]
struct SaveArgs {
    dir: PathBuf,
    #[arg(long)]
    app_id: Option<i64>,
    /// Start from a JSON configuration instead of what is on disk
    #[arg(long)]
    config: Option<PathBuf>,
    /// Fetch DLC, achievements and stats from Steam
    #[arg(long)]
    fetch: bool,
    #[arg(long)]
    offline: Option<bool>,
    #[arg(long)]
    disable_networking: Option<bool>,
    #[arg(long)]
    disable_overlay: Option<bool>,
}

#[derive(Subcommand)]
enum SettingsAction {
    Get,
    Set(SettingsArgs),
}

#[derive(Args)]
struct SettingsArgs {
    #[arg(long)]
    account_name: Option<String>,
    #[arg(long)]
    steam_id: Option<u64>,
    #[arg(long)]
    language: Option<String>,
    /// Repeat for several addresses
    #[arg(long = "broadcast-ip")]
    broadcast_ips: Vec<String>,
    #[arg(long)]
    clear_broadcast_ips: bool,
    #[arg(long)]
    experimental: Option<bool>,
    /// Hours between emulator update checks (negative disables, 0 always checks)
    #[arg(long, allow_negative_numbers = true)]
    goldberg_hours: Option<i32>,
    /// Hours between catalog refreshes (negative disables, 0 always refreshes)
    #[arg(long, allow_negative_numbers = true)]
    database_hours: Option<i32>,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

async fn save(state: &AppState, args: SaveArgs) -> Result<(), String> {
    let mut config: GoldbergConfiguration = match args.config.as_ref() {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
            serde_json::from_str(&text).map_err(|e| format!("{}: {}", path.display(), e))?
        }
        None => config_commands::read_config(state, args.dir.clone()).await?,
    };
    if let Some(app_id) = args.app_id {
        config.app_id = app_id;
    }
    if args.fetch {
        let app_id = u32::try_from(config.app_id).map_err(|_| "an app id is required to fetch metadata".to_string())?;
        config.dlc_list = catalog::get_dlc(state, app_id, true).await?;
        let schema = catalog::get_schema(state, app_id).await?;
        config.achievements = schema.achievements;
        config.stats = Some(schema.stats);
    }
    if let Some(offline) = args.offline {
        config.offline = offline;
    }
    if let Some(disable_networking) = args.disable_networking {
        config.disable_networking = disable_networking;
    }
    if let Some(disable_overlay) = args.disable_overlay {
        config.disable_overlay = disable_overlay;
    }
    print_json(&config_commands::save_config(state, args.dir, config).await?)
}

async fn set_settings(state: &AppState, args: SettingsArgs) -> Result<(), String> {
    let current = config_commands::get_settings(state).await?;
    let custom_broadcast_ips = if args.clear_broadcast_ips {
        None
    } else if args.broadcast_ips.is_empty() {
        current.custom_broadcast_ips
    } else {
        Some(args.broadcast_ips)
    };
    let updated = GoldbergGlobalConfiguration {
        account_name: args.account_name.unwrap_or(current.account_name),
        user_steam_id: args.steam_id.unwrap_or(current.user_steam_id),
        language: args.language.unwrap_or(current.language),
        custom_broadcast_ips,
        use_experimental: args.experimental.unwrap_or(current.use_experimental),
    };
    let saved = config_commands::set_settings(state, updated).await?;
    if args.goldberg_hours.is_some() || args.database_hours.is_some() {
        config_commands::set_update_cadence(
            state,
            config_commands::UpdateCadencePayload {
                goldberg_hours: args.goldberg_hours,
                database_hours: args.database_hours,
            },
        )
        .await?;
    }
    print_json(&saved)
}

async fn run(state: &AppState, command: Commands) -> Result<(), String> {
    match command {
        Commands::Init => {
            let outcome = commands::init(state).await?;
            print_json(&outcome.report)?;
            for task in outcome.background {
                let _ = task.await;
            }
            Ok(())
        }
        Commands::Sync { force } => print_json(&catalog::sync_catalog(state, force).await?),
        Commands::Search { name, limit } => print_json(&catalog::search_apps(state, name, limit).await?),
        Commands::Lookup { name, id } => match (id, name) {
            (Some(id), _) => print_json(&catalog::lookup_by_id(state, id).await?),
            (None, Some(name)) => print_json(&catalog::lookup_by_name(state, name).await?),
            (None, None) => Err("a name or --id is required".to_string()),
        },
        Commands::Detect { dir } => print_json(&catalog::detect_game(state, dir).await?),
        Commands::Dlc { app_id, steamdb } => print_json(&catalog::get_dlc(state, app_id, steamdb).await?),
        Commands::Achievements { app_id } => print_json(&catalog::get_achievements(state, app_id).await?),
        Commands::Stats { app_id } => print_json(&catalog::get_stats(state, app_id).await?),
        Commands::Read { dir } => print_json(&config_commands::read_config(state, dir).await?),
        Commands::Save(args) => save(state, args).await,
        Commands::Settings { action } => match action {
            SettingsAction::Get => print_json(&config_commands::get_settings(state).await?),
            SettingsAction::Set(args) => set_settings(state, args).await,
        },
        Commands::Provision { force } => print_json(&emulator::provision(state, force).await?),
        Commands::Status => print_json(&emulator::emulator_status(state).await?),
        Commands::Apply { dir } => print_json(&emulator::apply_emulator(state, dir).await?),
        Commands::Applied { dir } => print_json(&config_commands::goldberg_applied(state, dir).await?),
        Commands::Interfaces { dll } => print_json(&emulator::generate_interfaces(state, dll).await?),
        Commands::Languages => print_json(&config_commands::get_languages(state).await?),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = RuntimeConfig::from_env();
    if let Err(err) = logging::init(&config.log_dir) {
        eprintln!("logging disabled: {}", err);
    }

    let (status, mut events) = StatusReporter::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let level = match event.level {
                StatusLevel::Info => "info",
                StatusLevel::Warning => "warning",
                StatusLevel::Error => "error",
            };
            eprintln!("[{}] {}", level, event.message);
        }
    });

    let state = match build_state(config, status) {
        Ok(state) => state,
        Err(err) => {
            tracing::error!("startup failed: {}", err);
            eprintln!("startup failed: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let result = run(&state, cli.command).await;
    drop(state);
    let _ = printer.await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{}", err);
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
