use std::path::Path;

use crate::errors::{GoldbergError, Result};
use crate::models::{
    Achievement, DlcApp, GoldbergConfiguration, GoldbergGlobalConfiguration, Stat,
};
use crate::utils::file::{remove_dir_if_exists, remove_file_if_exists, write_atomic};
use crate::utils::paths::steam_settings_dir;

pub mod ini;
pub mod sources;

use ini::IniDocument;
use sources::{
    achievements_source, read_first, stats_source, user_override_source, AppIdFile, AppIni,
    ConnectivityFlags, LegacyDlcTxt, LegacyFlagFiles, MainIni,
};

pub const APP_ID_FILE: &str = "steam_appid.txt";
pub const MAIN_INI: &str = "configs.main.ini";
pub const USER_INI: &str = "configs.user.ini";
pub const APP_INI: &str = "configs.app.ini";
pub const ACHIEVEMENTS_JSON: &str = "achievements.json";
pub const STATS_JSON: &str = "stats.json";
pub const CUSTOM_BROADCASTS_TXT: &str = "custom_broadcasts.txt";
/// Present only while a game carries its own identity; the emulator ignores it.
pub const USER_OVERRIDE_JSON: &str = "configs.user.override.json";
pub const IMAGES_DIR: &str = "images";
pub const LEGACY_DLC_TXT: &str = "DLC.txt";
pub const LEGACY_APP_PATHS_TXT: &str = "app_paths.txt";
pub const LEGACY_DEPOTS_TXT: &str = "depots.txt";
pub const LEGACY_OFFLINE_TXT: &str = "offline.txt";
pub const LEGACY_DISABLE_NETWORKING_TXT: &str = "disable_networking.txt";
pub const LEGACY_DISABLE_OVERLAY_TXT: &str = "disable_overlay.txt";

const LISTEN_PORT: &str = "47584";

const LEGACY_ARTIFACTS: [&str; 6] = [
    LEGACY_DLC_TXT,
    LEGACY_APP_PATHS_TXT,
    LEGACY_DEPOTS_TXT,
    LEGACY_OFFLINE_TXT,
    LEGACY_DISABLE_NETWORKING_TXT,
    LEGACY_DISABLE_OVERLAY_TXT,
];

/// Maps a `GoldbergConfiguration` to and from a game directory.
#[derive(Clone, Copy, Default)]
pub struct GoldbergConfigCodec;

impl GoldbergConfigCodec {
    pub fn new() -> Self {
        Self
    }

    /// `configs.user.ini` is output only: the per-game identity comes back from
    /// `USER_OVERRIDE_JSON`, so games without one keep following the global settings.
    pub fn read(&self, game_dir: &Path) -> Result<GoldbergConfiguration> {
        tracing::info!("reading configuration from {}", game_dir.display());

        let app_id = read_first::<i64>(game_dir, &[&AppIdFile])?.unwrap_or_else(|| {
            tracing::warn!("{} missing or invalid", APP_ID_FILE);
            -1
        });
        let flags = read_first::<ConnectivityFlags>(game_dir, &[&MainIni, &LegacyFlagFiles])?
            .unwrap_or_default();
        let dlc_list =
            read_first::<Vec<DlcApp>>(game_dir, &[&AppIni, &LegacyDlcTxt])?.unwrap_or_default();
        let overwritten_global_configuration =
            read_first::<GoldbergGlobalConfiguration>(game_dir, &[&user_override_source()])?;
        let achievements =
            read_first::<Vec<Achievement>>(game_dir, &[&achievements_source()])?.unwrap_or_default();
        let stats = read_first::<Vec<Stat>>(game_dir, &[&stats_source()])?;

        Ok(GoldbergConfiguration {
            app_id,
            dlc_list,
            achievements,
            stats,
            offline: flags.offline,
            disable_networking: flags.disable_networking,
            disable_overlay: flags.disable_overlay,
            overwritten_global_configuration,
        }
        .normalized())
    }

    /// Rejects what `write` would refuse, before anything touches the directory.
    pub fn validate(&self, game_dir: &Path, config: &GoldbergConfiguration) -> Result<()> {
        if config.app_id < 0 {
            return Err(GoldbergError::Config(format!(
                "cannot save {} without an app id",
                game_dir.display()
            )));
        }
        Ok(())
    }

    /// Write every artifact; `steam_appid.txt` goes last and marks the directory as configured.
    pub fn write(
        &self,
        game_dir: &Path,
        config: &GoldbergConfiguration,
        global: &GoldbergGlobalConfiguration,
    ) -> Result<()> {
        self.validate(game_dir, config)?;
        let config = config.clone().normalized();
        let identity = global.effective(config.overwritten_global_configuration.as_ref());
        let settings = steam_settings_dir(game_dir);
        tracing::info!(
            "writing configuration for app {} to {}",
            config.app_id,
            game_dir.display()
        );

        put(&settings.join(MAIN_INI), &render_main_ini(&config))?;
        put(&settings.join(USER_INI), &render_user_ini(&identity))?;
        put(&settings.join(APP_INI), &render_app_ini(&config))?;

        let override_path = settings.join(USER_OVERRIDE_JSON);
        match config.overwritten_global_configuration.as_ref() {
            Some(overwritten) => put(&override_path, &serde_json::to_string_pretty(overwritten)?)?,
            None => discard(&override_path)?,
        }

        let achievements_path = settings.join(ACHIEVEMENTS_JSON);
        if config.achievements.is_empty() {
            discard(&achievements_path)?;
            remove_dir_if_exists(&settings.join(IMAGES_DIR))
                .map_err(|err| GoldbergError::config_io(&settings.join(IMAGES_DIR), err))?;
        } else {
            put(&achievements_path, &serde_json::to_string_pretty(&config.achievements)?)?;
        }

        let stats_path = settings.join(STATS_JSON);
        match config.stats.as_ref().filter(|stats| !stats.is_empty()) {
            Some(stats) => put(&stats_path, &serde_json::to_string_pretty(stats)?)?,
            None => discard(&stats_path)?,
        }

        let broadcasts_path = settings.join(CUSTOM_BROADCASTS_TXT);
        let broadcasts = identity.broadcast_ips();
        if broadcasts.is_empty() {
            discard(&broadcasts_path)?;
        } else {
            put(&broadcasts_path, &broadcasts.join("\n"))?;
        }

        for legacy in LEGACY_ARTIFACTS {
            discard(&settings.join(legacy))?;
        }

        put(&game_dir.join(APP_ID_FILE), &config.app_id.to_string())
    }
}

fn put(path: &Path, contents: &str) -> Result<()> {
    tracing::debug!("saving {}", path.display());
    write_atomic(path, contents.as_bytes()).map_err(|err| GoldbergError::config_io(path, err))
}

fn discard(path: &Path) -> Result<()> {
    if remove_file_if_exists(path).map_err(|err| GoldbergError::config_io(path, err))? {
        tracing::debug!("removed {}", path.display());
    }
    Ok(())
}

pub fn render_main_ini(config: &GoldbergConfiguration) -> String {
    let mut doc = IniDocument::new();
    doc.set_flag("main::connectivity", "offline", config.offline)
        .set_flag("main::connectivity", "disable_networking", config.disable_networking)
        .set("main::connectivity", "listen_port", LISTEN_PORT)
        .set_flag("main::misc", "disable_overlay", config.disable_overlay);
    doc.render()
}

pub fn render_user_ini(identity: &GoldbergGlobalConfiguration) -> String {
    let mut doc = IniDocument::new();
    doc.set("user::general", "account_name", identity.account_name.clone())
        .set("user::general", "account_steamid", identity.user_steam_id.to_string())
        .set("user::general", "language", identity.language.clone())
        .set("user::general", "ip_country", "US");
    doc.render()
}

/// INI values are single-line and trimmed when read back, so line breaks are folded
/// into spaces and the ends trimmed before writing.
fn ini_value(value: &str) -> String {
    value
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// DLC are always listed individually; `unlock_all` is never emitted.
pub fn render_app_ini(config: &GoldbergConfiguration) -> String {
    let mut doc = IniDocument::new();
    doc.set("app::general", "is_beta_branch", "0")
        .set("app::general", "branch_name", "public")
        .section("app::dlcs");
    for dlc in &config.dlc_list {
        doc.set("app::dlcs", &dlc.app_id().to_string(), ini_value(dlc.name()));
    }
    for dlc in &config.dlc_list {
        if let Some(path) = dlc.app_path.as_deref().map(ini_value).filter(|path| !path.is_empty()) {
            doc.set("app::paths", &dlc.app_id().to_string(), path);
        }
    }
    doc.render()
}
