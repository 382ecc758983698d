use std::path::{Path, PathBuf};

pub const APP_CONFIG_FILE: &str = "app_config.json";
pub const CATALOG_DB_FILE: &str = "steamapps.db";
pub const GOLDBERG_ARCHIVE_FILE: &str = "goldberg.7z";
pub const GOLDBERG_DIR: &str = "goldberg";
pub const GOLDBERG_STAGING_DIR: &str = "goldberg.staging";
pub const GOLDBERG_PREVIOUS_DIR: &str = "goldberg.old";
pub const LEGACY_SETTINGS_DIR: &str = "settings";

fn ensure_dir(path: &Path) -> Option<PathBuf> {
    if path.as_os_str().is_empty() {
        return None;
    }
    if std::fs::create_dir_all(path).is_ok() {
        return Some(path.to_path_buf());
    }
    None
}

fn env_dir(key: &str) -> Option<PathBuf> {
    let value = std::env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    ensure_dir(&PathBuf::from(trimmed))
}

/// Directory that holds every process-wide artifact: `GOLDBERG_ROOT_DIR`,
/// else the directory of the running executable, else the working directory.
pub fn resolve_root_dir() -> PathBuf {
    if let Some(dir) = env_dir("GOLDBERG_ROOT_DIR") {
        return dir;
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(found) = ensure_dir(dir) {
                return found;
            }
        }
    }

    PathBuf::from(".")
}

pub fn resolve_log_dir(root: &Path) -> PathBuf {
    if let Some(dir) = env_dir("GOLDBERG_LOG_DIR") {
        return dir;
    }

    let root_logs = root.join("logs");
    if let Some(found) = ensure_dir(&root_logs) {
        return found;
    }

    PathBuf::from("logs")
}

pub fn steam_settings_dir(game_dir: &Path) -> PathBuf {
    game_dir.join("steam_settings")
}

/// Path of the provisioned emulator binary inside the extracted release tree.
pub fn goldberg_dll_path(root: &Path, experimental: bool, x64: bool, base_name: &str) -> PathBuf {
    root.join(GOLDBERG_DIR)
        .join("release")
        .join(if experimental { "experimental" } else { "regular" })
        .join(if x64 { "x64" } else { "x32" })
        .join(format!("{}.dll", base_name))
}
