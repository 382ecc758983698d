use std::path::Path;
use std::time::Duration;

use crate::codec::IMAGES_DIR;
use crate::errors::{GoldbergError, Result};
use crate::models::Achievement;
use crate::services::api_client::{Agent, ApiClient};
use crate::utils::file::write_atomic;
use crate::utils::paths::steam_settings_dir;

const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

/// File name of a remote icon URL, without query or fragment.
pub fn icon_file_name(reference: &str) -> Option<&str> {
    let without_query = reference.split(['?', '#']).next().unwrap_or(reference);
    without_query
        .rsplit('/')
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
}

fn local_reference(file_name: &str) -> String {
    format!("{}/{}", IMAGES_DIR, file_name)
}

/// Downloads achievement icons next to the emulator settings so they resolve offline.
#[derive(Clone)]
pub struct AchievementIcons {
    api: ApiClient,
    attempts: u32,
    backoff: Duration,
}

impl AchievementIcons {
    pub fn new(api: ApiClient, attempts: u32) -> Self {
        Self {
            api,
            attempts: attempts.max(1),
            backoff: DEFAULT_BACKOFF,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Rewrite every remote `icon`/`icongray` to `images/<file>`. A reference whose
    /// download keeps failing is left as it was.
    pub async fn localize(&self, game_dir: &Path, achievements: &mut [Achievement]) -> Result<()> {
        if achievements.is_empty() {
            return Ok(());
        }
        let images_dir = steam_settings_dir(game_dir).join(IMAGES_DIR);
        std::fs::create_dir_all(&images_dir).map_err(|err| GoldbergError::config_io(&images_dir, err))?;

        tracing::info!("downloading achievement images into {}", images_dir.display());
        for achievement in achievements.iter_mut() {
            if let Some(local) = self.localize_reference(&images_dir, &achievement.icon).await {
                achievement.icon = local;
            }
            if let Some(local) = self.localize_reference(&images_dir, &achievement.icon_gray).await {
                achievement.icon_gray = local;
            }
        }
        Ok(())
    }

    async fn localize_reference(&self, images_dir: &Path, reference: &str) -> Option<String> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }
        if let Some(file_name) = reference.strip_prefix(&format!("{}/", IMAGES_DIR)) {
            if !images_dir.join(file_name).exists() {
                tracing::warn!("previously downloaded image '{}' is now missing", reference);
            }
            return None;
        }
        let file_name = icon_file_name(reference)?;
        let target = images_dir.join(file_name);
        if target.exists() {
            return Some(local_reference(file_name));
        }

        match self.download_with_retry(reference, &target).await {
            Ok(()) => Some(local_reference(file_name)),
            Err(err) => {
                tracing::warn!("giving up on achievement image {}: {}", reference, err);
                None
            }
        }
    }

    async fn download_with_retry(&self, url: &str, target: &Path) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.download(url, target).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt < self.attempts => {
                    tracing::debug!("image download attempt {} failed for {}: {}", attempt, url, err);
                    tokio::time::sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn download(&self, url: &str, target: &Path) -> Result<()> {
        let response = self.api.send(url, Agent::Browser).await?;
        let bytes = response.bytes().await?;
        write_atomic(target, &bytes).map_err(|err| GoldbergError::config_io(target, err))
    }
}
