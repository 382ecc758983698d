use std::path::{Path, PathBuf};

use crate::codec::{GoldbergConfigCodec, APP_ID_FILE};
use crate::errors::{GoldbergError, Result};
use crate::models::{AppConfiguration, GoldbergConfiguration, GoldbergGlobalConfiguration, DEFAULT_STEAM_ID};
use crate::services::achievement_icons::AchievementIcons;
use crate::services::emulator_provisioner::{EmulatorProvisioner, ReleaseSource};
use crate::services::interfaces;
use crate::services::settings_store::AppConfigStore;
use crate::utils::file::read_text_if_exists;
use crate::utils::paths::{steam_settings_dir, LEGACY_SETTINGS_DIR};

pub const LANGUAGES: [&str; 27] = [
    "english",
    "arabic",
    "bulgarian",
    "schinese",
    "tchinese",
    "czech",
    "danish",
    "dutch",
    "finnish",
    "french",
    "german",
    "greek",
    "hungarian",
    "italian",
    "japanese",
    "koreana",
    "norwegian",
    "polish",
    "portuguese",
    "brazilian",
    "romanian",
    "russian",
    "spanish",
    "swedish",
    "thai",
    "turkish",
    "ukrainian",
];

fn join_error(err: tokio::task::JoinError) -> GoldbergError {
    GoldbergError::Config(format!("background task failed: {}", err))
}

/// Entry point for reading and applying emulator configuration to game directories.
#[derive(Clone)]
pub struct GoldbergService<R: ReleaseSource> {
    codec: GoldbergConfigCodec,
    settings: AppConfigStore,
    provisioner: EmulatorProvisioner<R>,
    icons: AchievementIcons,
    legacy_saves_dir: Option<PathBuf>,
}

impl<R: ReleaseSource + Clone + 'static> GoldbergService<R> {
    pub fn new(
        settings: AppConfigStore,
        provisioner: EmulatorProvisioner<R>,
        icons: AchievementIcons,
        legacy_saves_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            codec: GoldbergConfigCodec::new(),
            settings,
            provisioner,
            icons,
            legacy_saves_dir,
        }
    }

    pub fn provisioner(&self) -> &EmulatorProvisioner<R> {
        &self.provisioner
    }

    /// Make sure an emulator build is available, then return the global settings.
    /// A failed update check is tolerated while an older build is still on disk.
    pub async fn initialize(&self) -> Result<GoldbergGlobalConfiguration> {
        if let Err(err) = self.provisioner.ensure_latest(false).await {
            if !self.provisioner.is_ready() {
                return Err(err);
            }
            tracing::warn!("continuing with the installed Goldberg build: {}", err);
        }
        self.get_settings()
    }

    pub async fn read(&self, game_dir: &Path) -> Result<GoldbergConfiguration> {
        let codec = self.codec;
        let game_dir = game_dir.to_path_buf();
        tokio::task::spawn_blocking(move || codec.read(&game_dir))
            .await
            .map_err(join_error)?
    }

    /// Localize achievement icons, write every configuration artifact and swap in the
    /// emulator binaries present in `game_dir`. Returns what was written.
    ///
    /// Everything that can be checked up front is, so a rejected save leaves the
    /// game directory as it was. The DLL swap runs last.
    pub async fn save(
        &self,
        game_dir: &Path,
        config: GoldbergConfiguration,
    ) -> Result<GoldbergConfiguration> {
        let global = self.get_settings()?;
        let mut config = config.normalized();
        self.codec.validate(game_dir, &config)?;
        if self.provisioner.plan_apply(game_dir, global.use_experimental)?.is_empty() {
            tracing::info!("no Steam API binaries in {}, skipping DLL setup", game_dir.display());
        }
        self.icons.localize(game_dir, &mut config.achievements).await?;

        let codec = self.codec;
        let provisioner = self.provisioner.clone();
        let game_dir = game_dir.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<GoldbergConfiguration> {
            codec.write(&game_dir, &config, &global)?;
            provisioner.apply_to(&game_dir, global.use_experimental)?;
            Ok(config)
        })
        .await
        .map_err(join_error)?
    }

    /// Global settings from `app_config.json`; before that file exists, from a
    /// standalone emulator's saves folder, else defaults.
    pub fn get_settings(&self) -> Result<GoldbergGlobalConfiguration> {
        let global = if self.settings.exists() {
            self.settings.snapshot()?.gui_defaults.global_configuration()
        } else {
            match self.legacy_saves_dir.as_deref() {
                Some(saves) => read_legacy_global(&saves.join(LEGACY_SETTINGS_DIR))?,
                None => GoldbergGlobalConfiguration::default(),
            }
        };
        Ok(global.sanitized())
    }

    pub fn set_settings(&self, global: GoldbergGlobalConfiguration) -> Result<GoldbergGlobalConfiguration> {
        tracing::info!("setting global settings");
        let global = global.sanitized();
        self.settings
            .update(|config| config.gui_defaults.apply_global(&global))?;
        Ok(global)
    }

    /// Hours between update checks; negative disables, zero checks every start.
    pub fn set_update_cadence(
        &self,
        goldberg_hours: Option<i32>,
        database_hours: Option<i32>,
    ) -> Result<AppConfiguration> {
        self.settings.update(|config| {
            if let Some(hours) = goldberg_hours {
                config.gui_defaults.goldberg_update_check_hours = hours;
            }
            if let Some(hours) = database_hours {
                config.gui_defaults.database_update_check_hours = hours;
            }
        })
    }

    pub fn goldberg_applied(&self, game_dir: &Path) -> bool {
        let applied = steam_settings_dir(game_dir).is_dir() && game_dir.join(APP_ID_FILE).is_file();
        tracing::debug!("goldberg applied to {}: {}", game_dir.display(), applied);
        applied
    }

    pub async fn generate_interfaces_file(&self, dll_path: &Path) -> Result<PathBuf> {
        let dll_path = dll_path.to_path_buf();
        tokio::task::spawn_blocking(move || interfaces::generate_interfaces_file(&dll_path))
            .await
            .map_err(join_error)?
    }

    pub fn languages(&self) -> &'static [&'static str] {
        &LANGUAGES
    }
}

fn first_line(path: &Path) -> Result<Option<String>> {
    let text = read_text_if_exists(path).map_err(|err| GoldbergError::config_io(path, err))?;
    Ok(text
        .and_then(|text| text.lines().next().map(|line| line.trim().to_string()))
        .filter(|line| !line.is_empty()))
}

fn read_legacy_global(settings_dir: &Path) -> Result<GoldbergGlobalConfiguration> {
    let mut global = GoldbergGlobalConfiguration::default();
    if let Some(name) = first_line(&settings_dir.join("account_name.txt"))? {
        global.account_name = name;
    }
    if let Some(id) = first_line(&settings_dir.join("user_steam_id.txt"))? {
        global.user_steam_id = id.parse::<u64>().unwrap_or_else(|_| {
            tracing::error!("invalid user steam id '{}', using default", id);
            DEFAULT_STEAM_ID
        });
    }
    if let Some(language) = first_line(&settings_dir.join("language.txt"))? {
        global.language = language;
    }
    let broadcasts_path = settings_dir.join("custom_broadcasts.txt");
    if let Some(text) =
        read_text_if_exists(&broadcasts_path).map_err(|err| GoldbergError::config_io(&broadcasts_path, err))?
    {
        let ips: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        if !ips.is_empty() {
            global.custom_broadcast_ips = Some(ips);
        }
    }
    tracing::info!("read global settings from {}", settings_dir.display());
    Ok(global)
}
