pub mod codec;
pub mod commands;
pub mod config;
pub mod db;
pub mod errors;
pub mod logging;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::RuntimeConfig;
use crate::db::Database;
use crate::errors::Result;
use crate::services::{
    AchievementIcons, ApiClient, AppConfigStore, CatalogSync, EmulatorProvisioner,
    GithubReleaseSource, GoldbergService, LookupService, StatusReporter, SteamCatalogSource,
    SteamMetadata,
};

#[derive(Clone)]
pub struct AppState {
    pub config: RuntimeConfig,
    pub db: Database,
    pub api: ApiClient,
    pub settings: AppConfigStore,
    pub status: StatusReporter,
    pub catalog_sync: CatalogSync<SteamCatalogSource>,
    pub lookup: LookupService,
    pub metadata: SteamMetadata,
    pub goldberg: GoldbergService<GithubReleaseSource>,
}

pub fn build_state(config: RuntimeConfig, status: StatusReporter) -> Result<AppState> {
    let db = db::init(&config.root_dir)?;
    let settings = AppConfigStore::load(&config.root_dir)?;
    let api = ApiClient::new(config.http_timeout);

    let catalog_source = SteamCatalogSource::new(
        api.clone(),
        config.catalog_url.clone(),
        config.steam_web_api_key.clone(),
    );
    let catalog_sync = CatalogSync::new(db.clone(), catalog_source, settings.clone(), status.clone());
    let lookup = LookupService::new(db.clone(), config.lookup_cache_max, config.lookup_ttl);
    let metadata = SteamMetadata::new(
        db.clone(),
        api.clone(),
        config.steam_api_url.clone(),
        config.store_url.clone(),
        config.steamdb_url.clone(),
        config.steam_web_api_key.clone(),
    );

    let provisioner = EmulatorProvisioner::new(
        config.root_dir.clone(),
        GithubReleaseSource::new(api.clone(), config.release_url.clone()),
        config.asset_name.clone(),
        settings.clone(),
        status.clone(),
    );
    let icons = AchievementIcons::new(api.clone(), config.icon_retries);
    let goldberg = GoldbergService::new(
        settings.clone(),
        provisioner,
        icons,
        config.legacy_saves_dir.clone(),
    );

    Ok(AppState {
        config,
        db,
        api,
        settings,
        status,
        catalog_sync,
        lookup,
        metadata,
        goldberg,
    })
}
