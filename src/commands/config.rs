use std::path::PathBuf;

use serde::Deserialize;

use crate::models::{AppConfiguration, GoldbergConfiguration, GoldbergGlobalConfiguration};
use crate::AppState;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct UpdateCadencePayload {
    pub goldberg_hours: Option<i32>,
    pub database_hours: Option<i32>,
}

pub async fn read_config(state: &AppState, dir: PathBuf) -> Result<GoldbergConfiguration, String> {
    state.goldberg.read(&dir).await.map_err(|e| e.to_string())
}

pub async fn save_config(
    state: &AppState,
    dir: PathBuf,
    config: GoldbergConfiguration,
) -> Result<GoldbergConfiguration, String> {
    if !dir.is_dir() {
        return Err(format!("{} is not a directory", dir.display()));
    }
    state
        .goldberg
        .save(&dir, config)
        .await
        .map_err(|e| e.to_string())
}

pub async fn get_settings(state: &AppState) -> Result<GoldbergGlobalConfiguration, String> {
    state.goldberg.get_settings().map_err(|e| e.to_string())
}

pub async fn set_settings(
    state: &AppState,
    settings: GoldbergGlobalConfiguration,
) -> Result<GoldbergGlobalConfiguration, String> {
    state
        .goldberg
        .set_settings(settings)
        .map_err(|e| e.to_string())
}

pub async fn set_update_cadence(
    state: &AppState,
    payload: UpdateCadencePayload,
) -> Result<AppConfiguration, String> {
    state
        .goldberg
        .set_update_cadence(payload.goldberg_hours, payload.database_hours)
        .map_err(|e| e.to_string())
}

pub async fn goldberg_applied(state: &AppState, dir: PathBuf) -> Result<bool, String> {
    Ok(state.goldberg.goldberg_applied(&dir))
}

pub async fn get_languages(state: &AppState) -> Result<Vec<String>, String> {
    Ok(state
        .goldberg
        .languages()
        .iter()
        .map(|language| language.to_string())
        .collect())
}
