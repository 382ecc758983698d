use std::path::PathBuf;
use std::time::Duration;

use crate::utils::paths::{resolve_log_dir, resolve_root_dir};

pub const DEFAULT_CATALOG_URL: &str = "https://api.steampowered.com/IStoreService/GetAppList/v1/";
pub const DEFAULT_STEAM_API_URL: &str = "https://api.steampowered.com";
pub const DEFAULT_STORE_URL: &str = "https://store.steampowered.com";
pub const DEFAULT_STEAMDB_URL: &str = "https://steamdb.info";
pub const DEFAULT_RELEASE_URL: &str =
    "https://api.github.com/repos/Detanup01/gbe_fork/releases/latest";
pub const DEFAULT_ASSET_NAME: &str = "emu-win-release.7z";
const LEGACY_SAVES_FOLDER: &str = "Goldberg SteamEmu Saves";

/// Process settings read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub root_dir: PathBuf,
    pub log_dir: PathBuf,
    pub steam_web_api_key: Option<String>,
    pub catalog_url: String,
    pub steam_api_url: String,
    pub store_url: String,
    pub steamdb_url: String,
    pub release_url: String,
    pub asset_name: String,
    pub lookup_ttl: Duration,
    pub lookup_cache_max: usize,
    pub http_timeout: Duration,
    pub icon_retries: u32,
    /// Saves folder of standalone emulator installs, read once when `app_config.json` is absent.
    pub legacy_saves_dir: Option<PathBuf>,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let root_dir = resolve_root_dir();
        let log_dir = resolve_log_dir(&root_dir);
        Self {
            root_dir,
            log_dir,
            steam_web_api_key: read_env_string("STEAM_WEB_API_KEY"),
            catalog_url: read_env_url("GOLDBERG_CATALOG_URL", DEFAULT_CATALOG_URL),
            steam_api_url: read_env_url("GOLDBERG_STEAM_API_URL", DEFAULT_STEAM_API_URL),
            store_url: read_env_url("GOLDBERG_STORE_URL", DEFAULT_STORE_URL),
            steamdb_url: read_env_url("GOLDBERG_STEAMDB_URL", DEFAULT_STEAMDB_URL),
            release_url: read_env_url("GOLDBERG_RELEASE_URL", DEFAULT_RELEASE_URL),
            asset_name: read_env_string("GOLDBERG_ASSET_NAME")
                .unwrap_or_else(|| DEFAULT_ASSET_NAME.to_string()),
            lookup_ttl: Duration::from_secs(read_env_u64("GOLDBERG_LOOKUP_TTL_SECS", 7200)),
            lookup_cache_max: read_env_usize("GOLDBERG_LOOKUP_CACHE_MAX", 1024, 16, 65536),
            http_timeout: Duration::from_secs(read_env_u64("GOLDBERG_HTTP_TIMEOUT_SECS", 30).max(1)),
            icon_retries: read_env_usize("GOLDBERG_ICON_RETRIES", 3, 1, 10) as u32,
            legacy_saves_dir: read_env_string("GOLDBERG_LEGACY_SAVES_DIR")
                .map(PathBuf::from)
                .or_else(|| {
                    read_env_string("APPDATA").map(|dir| PathBuf::from(dir).join(LEGACY_SAVES_FOLDER))
                }),
        }
    }

    /// Defaults rooted at `root_dir`, ignoring the environment.
    pub fn with_root(root_dir: PathBuf) -> Self {
        Self {
            log_dir: root_dir.join("logs"),
            root_dir,
            steam_web_api_key: None,
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            steam_api_url: DEFAULT_STEAM_API_URL.to_string(),
            store_url: DEFAULT_STORE_URL.to_string(),
            steamdb_url: DEFAULT_STEAMDB_URL.to_string(),
            release_url: DEFAULT_RELEASE_URL.to_string(),
            asset_name: DEFAULT_ASSET_NAME.to_string(),
            lookup_ttl: Duration::from_secs(7200),
            lookup_cache_max: 1024,
            http_timeout: Duration::from_secs(30),
            icon_retries: 3,
            legacy_saves_dir: None,
        }
    }
}

fn read_env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_env_url(key: &str, default: &str) -> String {
    read_env_string(key)
        .unwrap_or_else(|| default.to_string())
        .trim_end_matches('/')
        .to_string()
}

fn read_env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn read_env_usize(key: &str, default: usize, min: usize, max: usize) -> usize {
    let parsed = std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default);
    parsed.clamp(min, max)
}
