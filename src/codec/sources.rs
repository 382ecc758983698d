use std::marker::PhantomData;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::codec::ini::IniDocument;
use crate::codec::{
    ACHIEVEMENTS_JSON, APP_ID_FILE, APP_INI, LEGACY_APP_PATHS_TXT, LEGACY_DISABLE_NETWORKING_TXT,
    LEGACY_DISABLE_OVERLAY_TXT, LEGACY_DLC_TXT, LEGACY_OFFLINE_TXT, MAIN_INI, STATS_JSON,
    USER_OVERRIDE_JSON,
};
use crate::errors::{GoldbergError, Result};
use crate::models::{Achievement, DlcApp, GoldbergGlobalConfiguration, Stat};
use crate::utils::file::read_text_if_exists;
use crate::utils::paths::steam_settings_dir;

/// One on-disk format for one piece of configuration. `Ok(None)` means "not present
/// in this format", letting the next strategy try.
pub trait ArtifactSource<T> {
    fn name(&self) -> &'static str;
    fn try_read(&self, game_dir: &Path) -> Result<Option<T>>;
}

/// Run strategies in order; the first `Some` wins.
pub fn read_first<T>(game_dir: &Path, sources: &[&dyn ArtifactSource<T>]) -> Result<Option<T>> {
    for source in sources {
        if let Some(value) = source.try_read(game_dir)? {
            tracing::debug!("read {} from {}", source.name(), game_dir.display());
            return Ok(Some(value));
        }
    }
    Ok(None)
}

fn read_text(path: &Path) -> Result<Option<String>> {
    read_text_if_exists(path).map_err(|err| GoldbergError::config_io(path, err))
}

fn read_ini(path: &Path) -> Result<Option<IniDocument>> {
    Ok(read_text(path)?.map(|text| IniDocument::parse(&text)))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectivityFlags {
    pub offline: bool,
    pub disable_networking: bool,
    pub disable_overlay: bool,
}

pub struct AppIdFile;

impl ArtifactSource<i64> for AppIdFile {
    fn name(&self) -> &'static str {
        APP_ID_FILE
    }

    fn try_read(&self, game_dir: &Path) -> Result<Option<i64>> {
        let Some(text) = read_text(&game_dir.join(APP_ID_FILE))? else {
            return Ok(None);
        };
        match text.trim().parse::<i64>() {
            Ok(app_id) => Ok(Some(app_id)),
            Err(_) => {
                tracing::warn!("{} does not hold a numeric app id", APP_ID_FILE);
                Ok(None)
            }
        }
    }
}

pub struct MainIni;

impl ArtifactSource<ConnectivityFlags> for MainIni {
    fn name(&self) -> &'static str {
        MAIN_INI
    }

    fn try_read(&self, game_dir: &Path) -> Result<Option<ConnectivityFlags>> {
        let Some(doc) = read_ini(&steam_settings_dir(game_dir).join(MAIN_INI))? else {
            return Ok(None);
        };
        Ok(Some(ConnectivityFlags {
            offline: doc.flag("main::connectivity", "offline"),
            disable_networking: doc.flag("main::connectivity", "disable_networking"),
            disable_overlay: doc.flag("main::misc", "disable_overlay"),
        }))
    }
}

/// Pre-INI marker files: presence means enabled.
pub struct LegacyFlagFiles;

impl ArtifactSource<ConnectivityFlags> for LegacyFlagFiles {
    fn name(&self) -> &'static str {
        "legacy flag files"
    }

    fn try_read(&self, game_dir: &Path) -> Result<Option<ConnectivityFlags>> {
        let settings = steam_settings_dir(game_dir);
        let flags = ConnectivityFlags {
            offline: settings.join(LEGACY_OFFLINE_TXT).exists(),
            disable_networking: settings.join(LEGACY_DISABLE_NETWORKING_TXT).exists(),
            disable_overlay: settings.join(LEGACY_DISABLE_OVERLAY_TXT).exists(),
        };
        if flags == ConnectivityFlags::default() {
            return Ok(None);
        }
        Ok(Some(flags))
    }
}

fn attach_paths<'a, I>(dlc_list: &mut [DlcApp], pairs: I)
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    for (id, path) in pairs {
        let Ok(app_id) = id.trim().parse::<u32>() else {
            continue;
        };
        for dlc in dlc_list.iter_mut().filter(|dlc| dlc.app_id() == app_id) {
            dlc.app_path = Some(path.trim().to_string()).filter(|path| !path.is_empty());
        }
    }
}

pub struct AppIni;

impl ArtifactSource<Vec<DlcApp>> for AppIni {
    fn name(&self) -> &'static str {
        APP_INI
    }

    fn try_read(&self, game_dir: &Path) -> Result<Option<Vec<DlcApp>>> {
        let Some(doc) = read_ini(&steam_settings_dir(game_dir).join(APP_INI))? else {
            return Ok(None);
        };
        let mut dlc_list: Vec<DlcApp> = doc
            .entries("app::dlcs")
            .iter()
            .filter_map(|(key, name)| {
                let app_id = key.parse::<u32>().ok()?;
                Some(DlcApp::new(app_id, name.clone()))
            })
            .collect();
        attach_paths(
            &mut dlc_list,
            doc.entries("app::paths")
                .iter()
                .map(|(key, path)| (key.as_str(), path.as_str())),
        );
        Ok(Some(dlc_list))
    }
}

/// `DLC.txt` (`id=name`) with optional `app_paths.txt` (`id=path`).
pub struct LegacyDlcTxt;

impl ArtifactSource<Vec<DlcApp>> for LegacyDlcTxt {
    fn name(&self) -> &'static str {
        LEGACY_DLC_TXT
    }

    fn try_read(&self, game_dir: &Path) -> Result<Option<Vec<DlcApp>>> {
        let settings = steam_settings_dir(game_dir);
        let Some(text) = read_text(&settings.join(LEGACY_DLC_TXT))? else {
            return Ok(None);
        };
        let mut dlc_list: Vec<DlcApp> = text
            .lines()
            .filter_map(|line| {
                let (id, name) = line.split_once('=')?;
                let app_id = id.trim().parse::<u32>().ok()?;
                Some(DlcApp::new(app_id, name.trim()))
            })
            .collect();
        if let Some(paths) = read_text(&settings.join(LEGACY_APP_PATHS_TXT))? {
            attach_paths(&mut dlc_list, paths.lines().filter_map(|line| line.split_once('=')));
        }
        Ok(Some(dlc_list))
    }
}

/// A JSON artifact under `steam_settings/`.
pub struct JsonArtifact<T> {
    file_name: &'static str,
    _marker: PhantomData<T>,
}

impl<T> JsonArtifact<T> {
    pub const fn new(file_name: &'static str) -> Self {
        Self {
            file_name,
            _marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> ArtifactSource<T> for JsonArtifact<T> {
    fn name(&self) -> &'static str {
        self.file_name
    }

    fn try_read(&self, game_dir: &Path) -> Result<Option<T>> {
        let path = steam_settings_dir(game_dir).join(self.file_name);
        let Some(text) = read_text(&path)? else {
            return Ok(None);
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|err| GoldbergError::Config(format!("{}: {}", path.display(), err)))
    }
}

pub fn achievements_source() -> JsonArtifact<Vec<Achievement>> {
    JsonArtifact::new(ACHIEVEMENTS_JSON)
}

pub fn stats_source() -> JsonArtifact<Vec<Stat>> {
    JsonArtifact::new(STATS_JSON)
}

pub fn user_override_source() -> JsonArtifact<GoldbergGlobalConfiguration> {
    JsonArtifact::new(USER_OVERRIDE_JSON)
}
