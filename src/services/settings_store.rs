use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::errors::{GoldbergError, Result};
use crate::models::AppConfiguration;
use crate::utils::file::{read_text_if_exists, write_atomic};
use crate::utils::paths::APP_CONFIG_FILE;

/// Single owner of `app_config.json`. Every change re-reads the file, applies the
/// mutation and writes it back atomically while holding the in-process lock.
#[derive(Clone)]
pub struct AppConfigStore {
    path: PathBuf,
    state: Arc<Mutex<AppConfiguration>>,
}

impl AppConfigStore {
    pub fn load(root_dir: &Path) -> Result<Self> {
        let path = root_dir.join(APP_CONFIG_FILE);
        let config = read_config(&path)?.unwrap_or_default();
        Ok(Self {
            path,
            state: Arc::new(Mutex::new(config)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn snapshot(&self) -> Result<AppConfiguration> {
        let state = self
            .state
            .lock()
            .map_err(|_| GoldbergError::Config("settings lock poisoned".to_string()))?;
        Ok(state.clone())
    }

    pub fn update<F>(&self, mutate: F) -> Result<AppConfiguration>
    where
        F: FnOnce(&mut AppConfiguration),
    {
        let mut state = self
            .state
            .lock()
            .map_err(|_| GoldbergError::Config("settings lock poisoned".to_string()))?;
        let mut config = read_config(&self.path)?.unwrap_or_else(|| state.clone());
        mutate(&mut config);
        let json = serde_json::to_string_pretty(&config)?;
        write_atomic(&self.path, json.as_bytes())
            .map_err(|err| GoldbergError::config_io(&self.path, err))?;
        *state = config.clone();
        Ok(config)
    }
}

fn read_config(path: &Path) -> Result<Option<AppConfiguration>> {
    let Some(text) = read_text_if_exists(path).map_err(|err| GoldbergError::config_io(path, err))?
    else {
        return Ok(None);
    };
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|err| GoldbergError::Config(format!("{}: {}", path.display(), err)))
}
