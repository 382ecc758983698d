use std::path::PathBuf;

use crate::models::{Achievement, DlcApp, Stat, SteamApp};
use crate::services::{DetectionResult, GameSchema, SyncReport};
use crate::utils::cancel::CancelToken;
use crate::AppState;

pub async fn sync_catalog(state: &AppState, force: bool) -> Result<SyncReport, String> {
    state
        .catalog_sync
        .sync(force, &CancelToken::new())
        .await
        .map_err(|e| e.to_string())
}

/// Games whose names contain every term. `limit` stops the search early.
pub async fn search_apps(
    state: &AppState,
    name: String,
    limit: Option<usize>,
) -> Result<Vec<SteamApp>, String> {
    let cancel = CancelToken::new();
    let mut stream = state
        .lookup
        .search_by_name(&name, cancel.clone())
        .map_err(|e| e.to_string())?;
    let mut apps = Vec::new();
    while let Some(item) = stream.next().await {
        apps.push(item.map_err(|e| e.to_string())?);
        if limit.is_some_and(|limit| apps.len() >= limit) {
            cancel.cancel();
        }
    }
    Ok(apps)
}

pub async fn lookup_by_name(state: &AppState, name: String) -> Result<Option<SteamApp>, String> {
    state
        .lookup
        .get_by_exact_comparable_name(&name)
        .map_err(|e| e.to_string())
}

pub async fn lookup_by_id(state: &AppState, app_id: u32) -> Result<Option<SteamApp>, String> {
    state.lookup.get_by_id(app_id).map_err(|e| e.to_string())
}

pub async fn detect_game(state: &AppState, dir: PathBuf) -> Result<DetectionResult, String> {
    if !dir.is_dir() {
        return Err(format!("{} is not a directory", dir.display()));
    }
    state
        .lookup
        .detect_game(&dir)
        .await
        .map_err(|e| e.to_string())
}

pub async fn get_dlc(state: &AppState, app_id: u32, use_steamdb: bool) -> Result<Vec<DlcApp>, String> {
    Ok(state.metadata.dlc(app_id, use_steamdb).await)
}

/// Achievements and stats from a single schema request.
pub async fn get_schema(state: &AppState, app_id: u32) -> Result<GameSchema, String> {
    Ok(state.metadata.schema(app_id).await)
}

pub async fn get_achievements(state: &AppState, app_id: u32) -> Result<Vec<Achievement>, String> {
    Ok(state.metadata.achievements(app_id).await)
}

pub async fn get_stats(state: &AppState, app_id: u32) -> Result<Vec<Stat>, String> {
    Ok(state.metadata.stats(app_id).await)
}
