use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures_util::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::errors::{GoldbergError, Result};
use crate::models::UpdateCadence;
use crate::services::api_client::{Agent, ApiClient};
use crate::services::settings_store::AppConfigStore;
use crate::services::status::StatusReporter;
use crate::utils::archive::extract_archive;
use crate::utils::file::{mark_hidden, remove_dir_if_exists, remove_file_if_exists};
use crate::utils::paths::{
    goldberg_dll_path, GOLDBERG_ARCHIVE_FILE, GOLDBERG_DIR, GOLDBERG_PREVIOUS_DIR, GOLDBERG_STAGING_DIR,
};

pub const STEAM_API_BASE_NAMES: [&str; 2] = ["steam_api", "steam_api64"];
const BACKUP_SUFFIX: &str = "GOLDBERGGUIBACKUP";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ReleaseInfo {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

pub struct DownloadBody {
    pub declared_len: Option<u64>,
    pub stream: BoxStream<'static, Result<Vec<u8>>>,
}

pub trait ReleaseSource: Send + Sync {
    fn latest_release(&self) -> impl Future<Output = Result<ReleaseInfo>> + Send;
    fn download(&self, asset: &ReleaseAsset) -> impl Future<Output = Result<DownloadBody>> + Send;
}

/// Latest release of the emulator fork on GitHub.
#[derive(Clone)]
pub struct GithubReleaseSource {
    api: ApiClient,
    release_url: String,
}

impl GithubReleaseSource {
    pub fn new(api: ApiClient, release_url: String) -> Self {
        Self { api, release_url }
    }
}

impl ReleaseSource for GithubReleaseSource {
    async fn latest_release(&self) -> Result<ReleaseInfo> {
        self.api.get_json(&self.release_url, Agent::Tool).await
    }

    async fn download(&self, asset: &ReleaseAsset) -> Result<DownloadBody> {
        let response = self.api.send(&asset.browser_download_url, Agent::Tool).await?;
        let declared_len = response.content_length();
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(GoldbergError::from))
            .boxed();
        Ok(DownloadBody {
            declared_len,
            stream,
        })
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningState {
    Uninitialized,
    Checking,
    UpToDate,
    Downloading,
    Extracting,
    Ready,
    Failed,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProvisioningOutcome {
    Skipped { installed_version: Option<String> },
    UpToDate { version: String },
    Installed { version: String },
}

/// Keeps a verified copy of the emulator release under `goldberg/` and swaps its
/// binaries into game directories.
#[derive(Clone)]
pub struct EmulatorProvisioner<S: ReleaseSource> {
    root_dir: PathBuf,
    source: S,
    asset_name: String,
    settings: AppConfigStore,
    status: StatusReporter,
    state: Arc<Mutex<ProvisioningState>>,
    run_lock: Arc<tokio::sync::Mutex<()>>,
}

impl<S: ReleaseSource> EmulatorProvisioner<S> {
    pub fn new(
        root_dir: PathBuf,
        source: S,
        asset_name: String,
        settings: AppConfigStore,
        status: StatusReporter,
    ) -> Self {
        Self {
            root_dir,
            source,
            asset_name,
            settings,
            status,
            state: Arc::new(Mutex::new(ProvisioningState::Uninitialized)),
            run_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn state(&self) -> ProvisioningState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(ProvisioningState::Failed)
    }

    fn set_state(&self, next: ProvisioningState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    /// At least one architecture of the regular build is on disk.
    pub fn is_ready(&self) -> bool {
        goldberg_dll_path(&self.root_dir, false, false, "steam_api").exists()
            || goldberg_dll_path(&self.root_dir, false, true, "steam_api64").exists()
    }

    /// Bring `goldberg/` up to the latest release. Without `force` the check is
    /// skipped while the local copy is ready and the update cadence is not due.
    pub async fn ensure_latest(&self, force: bool) -> Result<ProvisioningOutcome> {
        let _guard = self.run_lock.lock().await;
        match self.run_check(force).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.set_state(ProvisioningState::Failed);
                self.status.error(format!("Goldberg update failed: {}", err));
                Err(err)
            }
        }
    }

    async fn run_check(&self, force: bool) -> Result<ProvisioningOutcome> {
        let config = self.settings.snapshot()?;
        let installed = config.goldberg_state.installed_version.clone();
        let cadence = UpdateCadence::from_hours(config.gui_defaults.goldberg_update_check_hours);
        let ready = self.is_ready();

        if !force && ready && !cadence.is_due(config.goldberg_state.last_update_check, Utc::now()) {
            tracing::info!("skipping Goldberg update check, last check is recent");
            self.set_state(ProvisioningState::Ready);
            return Ok(ProvisioningOutcome::Skipped {
                installed_version: installed,
            });
        }

        self.set_state(ProvisioningState::Checking);
        self.status.info("Checking for Goldberg updates...");
        let release = self.source.latest_release().await?;

        if ready && installed.as_deref() == Some(release.tag_name.as_str()) {
            self.settings
                .update(|config| config.goldberg_state.last_update_check = Some(Utc::now()))?;
            self.set_state(ProvisioningState::UpToDate);
            self.status
                .info(format!("Goldberg {} is up to date", release.tag_name));
            return Ok(ProvisioningOutcome::UpToDate {
                version: release.tag_name,
            });
        }

        self.install(release).await
    }

    async fn install(&self, release: ReleaseInfo) -> Result<ProvisioningOutcome> {
        let asset = release
            .assets
            .iter()
            .find(|asset| asset.name == self.asset_name)
            .ok_or_else(|| {
                GoldbergError::Provisioning(format!(
                    "release {} has no asset named {}",
                    release.tag_name, self.asset_name
                ))
            })?;

        self.set_state(ProvisioningState::Downloading);
        self.status
            .info(format!("Downloading Goldberg {}...", release.tag_name));
        let archive = self.download_archive(asset).await?;

        self.set_state(ProvisioningState::Extracting);
        self.status.info("Extracting Goldberg...");
        let root_dir = self.root_dir.clone();
        tokio::task::spawn_blocking(move || install_archive(&archive, &root_dir))
            .await
            .map_err(|err| GoldbergError::Provisioning(format!("extract task failed: {}", err)))??;

        let version = release.tag_name.clone();
        self.settings.update(|config| {
            config.goldberg_state.installed_version = Some(version.clone());
            config.goldberg_state.last_update_check = Some(Utc::now());
        })?;
        self.set_state(ProvisioningState::Ready);
        self.status
            .info(format!("Goldberg {} installed", release.tag_name));
        Ok(ProvisioningOutcome::Installed {
            version: release.tag_name,
        })
    }

    /// Stream the asset into a part file and promote it only after length and digest check out.
    async fn download_archive(&self, asset: &ReleaseAsset) -> Result<PathBuf> {
        let archive_path = self.root_dir.join(GOLDBERG_ARCHIVE_FILE);
        let part_path = self.root_dir.join(format!("{}.part", GOLDBERG_ARCHIVE_FILE));

        let result = self.write_part(asset, &part_path).await;
        if let Err(err) = result {
            let _ = remove_file_if_exists(&part_path);
            return Err(err);
        }

        tokio::fs::rename(&part_path, &archive_path)
            .await
            .map_err(|err| GoldbergError::provisioning_io(&archive_path, err))?;
        Ok(archive_path)
    }

    async fn write_part(&self, asset: &ReleaseAsset, part_path: &Path) -> Result<()> {
        let mut body = self.source.download(asset).await?;
        let mut file = tokio::fs::File::create(part_path)
            .await
            .map_err(|err| GoldbergError::provisioning_io(part_path, err))?;
        let mut hasher = Sha256::new();
        let mut written: u64 = 0;

        while let Some(chunk) = body.stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|err| GoldbergError::provisioning_io(part_path, err))?;
            hasher.update(&chunk);
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|err| GoldbergError::provisioning_io(part_path, err))?;
        drop(file);

        let expected = body
            .declared_len
            .or(Some(asset.size).filter(|size| *size > 0));
        if let Some(expected) = expected {
            if expected != written {
                return Err(GoldbergError::Provisioning(format!(
                    "download of {} is incomplete: expected {} bytes, got {}",
                    asset.name, expected, written
                )));
            }
        }

        if let Some(expected) = asset
            .digest
            .as_deref()
            .and_then(|digest| digest.strip_prefix("sha256:"))
        {
            let actual = hex::encode(hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected.trim()) {
                return Err(GoldbergError::Provisioning(format!(
                    "checksum mismatch for {}: expected {}, got {}",
                    asset.name, expected, actual
                )));
            }
        }
        tracing::info!("downloaded {} ({} bytes)", asset.name, written);
        Ok(())
    }

    /// Copy the provisioned `{base_name}.dll` into `target_dir`, backing up what is there.
    pub fn provision_into(&self, target_dir: &Path, base_name: &str, experimental: bool) -> Result<()> {
        swap_in_dll(&self.root_dir, target_dir, base_name, experimental)
    }

    /// Steam API binaries present in `dir`, failing when one has no provisioned
    /// counterpart. Touches nothing.
    pub fn plan_apply(&self, dir: &Path, experimental: bool) -> Result<Vec<&'static str>> {
        let mut planned = Vec::new();
        for base_name in STEAM_API_BASE_NAMES {
            if !dir.join(format!("{}.dll", base_name)).exists() {
                continue;
            }
            let source = goldberg_dll_path(&self.root_dir, experimental, base_name.ends_with("64"), base_name);
            if !source.exists() {
                return Err(GoldbergError::Provisioning(format!(
                    "{} is not provisioned",
                    source.display()
                )));
            }
            planned.push(base_name);
        }
        Ok(planned)
    }

    /// Swap in every Steam API binary present in `dir`. Returns the names applied.
    /// Nothing is swapped unless every binary can be.
    pub fn apply_to(&self, dir: &Path, experimental: bool) -> Result<Vec<String>> {
        let mut applied = Vec::new();
        for base_name in self.plan_apply(dir, experimental)? {
            self.provision_into(dir, base_name, experimental)?;
            applied.push(format!("{}.dll", base_name));
        }
        Ok(applied)
    }
}

/// Replace `goldberg/` with the archive contents, via a staging directory that is
/// discarded when any entry fails.
fn install_archive(archive: &Path, root_dir: &Path) -> Result<()> {
    let staging = root_dir.join(GOLDBERG_STAGING_DIR);
    let target = root_dir.join(GOLDBERG_DIR);
    remove_dir_if_exists(&staging).map_err(|err| GoldbergError::provisioning_io(&staging, err))?;

    let report = match extract_archive(archive, &staging) {
        Ok(report) => report,
        Err(err) => {
            let _ = remove_dir_if_exists(&staging);
            return Err(err);
        }
    };
    if !report.is_clean() {
        let _ = remove_dir_if_exists(&staging);
        return Err(GoldbergError::Provisioning(format!(
            "{} entries failed to extract: {}",
            report.errors.len(),
            report.errors.join("; ")
        )));
    }
    tracing::info!("extracted {} files into {}", report.files, staging.display());

    if let Err(err) = promote_dir(&staging, &target, &root_dir.join(GOLDBERG_PREVIOUS_DIR)) {
        let _ = remove_dir_if_exists(&staging);
        return Err(err);
    }
    Ok(())
}

/// Move `staging` to `target`. The old `target` is parked at `previous` and only
/// deleted once the new one is in place; it is moved back if the swap fails.
fn promote_dir(staging: &Path, target: &Path, previous: &Path) -> Result<()> {
    remove_dir_if_exists(previous).map_err(|err| GoldbergError::provisioning_io(previous, err))?;
    let parked = target.exists();
    if parked {
        std::fs::rename(target, previous).map_err(|err| GoldbergError::provisioning_io(target, err))?;
    }
    if let Err(err) = std::fs::rename(staging, target) {
        if parked {
            if let Err(restore) = std::fs::rename(previous, target) {
                tracing::error!("could not restore {}: {}", target.display(), restore);
            }
        }
        return Err(GoldbergError::provisioning_io(target, err));
    }
    if parked {
        if let Err(err) = remove_dir_if_exists(previous) {
            tracing::warn!("could not remove {}: {}", previous.display(), err);
        }
    }
    Ok(())
}

fn swap_in_dll(root_dir: &Path, target_dir: &Path, base_name: &str, experimental: bool) -> Result<()> {
    let x64 = base_name.ends_with("64");
    let source = goldberg_dll_path(root_dir, experimental, x64, base_name);
    if !source.exists() {
        return Err(GoldbergError::Provisioning(format!(
            "{} is not provisioned",
            source.display()
        )));
    }

    let target = target_dir.join(format!("{}.dll", base_name));
    let original = target_dir.join(format!("{}_o.dll", base_name));
    if target.exists() {
        if !original.exists() {
            tracing::info!("backing up original {} to {}", target.display(), original.display());
            std::fs::rename(&target, &original)
                .map_err(|err| GoldbergError::provisioning_io(&original, err))?;
        } else {
            let backup = target_dir.join(format!(".{}.dll.{}", base_name, BACKUP_SUFFIX));
            remove_file_if_exists(&backup).map_err(|err| GoldbergError::provisioning_io(&backup, err))?;
            std::fs::rename(&target, &backup).map_err(|err| GoldbergError::provisioning_io(&backup, err))?;
            if let Err(err) = mark_hidden(&backup) {
                tracing::warn!("could not hide {}: {}", backup.display(), err);
            }
        }
    }

    std::fs::copy(&source, &target).map_err(|err| GoldbergError::provisioning_io(&target, err))?;
    tracing::info!("copied {} into {}", source.display(), target_dir.display());
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    use crate::utils::archive::tests::build_zip;

    pub(crate) const ASSET: &str = "emu-win-release.7z";

    #[derive(Clone)]
    pub(crate) struct FakeRelease {
        tag: String,
        payload: Vec<u8>,
        declared_len: Option<u64>,
        digest: Option<String>,
        pub(crate) checks: Arc<AtomicUsize>,
        pub(crate) downloads: Arc<AtomicUsize>,
    }

    impl FakeRelease {
        pub(crate) fn new(tag: &str, payload: Vec<u8>) -> Self {
            Self {
                tag: tag.to_string(),
                declared_len: Some(payload.len() as u64),
                payload,
                digest: None,
                checks: Arc::new(AtomicUsize::new(0)),
                downloads: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl ReleaseSource for FakeRelease {
        async fn latest_release(&self) -> Result<ReleaseInfo> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            Ok(ReleaseInfo {
                tag_name: self.tag.clone(),
                assets: vec![ReleaseAsset {
                    name: ASSET.to_string(),
                    browser_download_url: "https://example.invalid/emu.7z".to_string(),
                    size: self.payload.len() as u64,
                    digest: self.digest.clone(),
                }],
            })
        }

        async fn download(&self, _asset: &ReleaseAsset) -> Result<DownloadBody> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            let chunks: Vec<Result<Vec<u8>>> = self
                .payload
                .chunks(256)
                .map(|chunk| Ok(chunk.to_vec()))
                .collect();
            Ok(DownloadBody {
                declared_len: self.declared_len,
                stream: futures_util::stream::iter(chunks).boxed(),
            })
        }
    }

    fn temp_root() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("goldberg-provision-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).expect("temp root");
        dir
    }

    pub(crate) fn release_zip(root: &Path) -> Vec<u8> {
        let path = root.join("fixture.zip");
        build_zip(
            &path,
            &[
                ("release/regular/x32/steam_api.dll", b"goldberg32"),
                ("release/regular/x64/steam_api64.dll", b"goldberg64"),
                ("release/experimental/x64/steam_api64.dll", b"experimental64"),
            ],
        );
        let bytes = fs::read(&path).expect("fixture");
        fs::remove_file(&path).expect("remove fixture");
        bytes
    }

    fn provisioner(root: &Path, source: FakeRelease) -> EmulatorProvisioner<FakeRelease> {
        let settings = AppConfigStore::load(root).expect("settings");
        EmulatorProvisioner::new(
            root.to_path_buf(),
            source,
            ASSET.to_string(),
            settings,
            StatusReporter::silent(),
        )
    }

    fn seed_install(root: &Path, settings: &AppConfigStore, version: &str) {
        let dll = goldberg_dll_path(root, false, false, "steam_api");
        fs::create_dir_all(dll.parent().expect("parent")).expect("layout");
        fs::write(&dll, b"old").expect("dll");
        settings
            .update(|config| {
                config.goldberg_state.installed_version = Some(version.to_string());
                config.goldberg_state.last_update_check = Some(Utc::now());
            })
            .expect("seed settings");
    }

    #[tokio::test]
    async fn short_download_fails_without_recording_version() {
        let root = temp_root();
        let mut source = FakeRelease::new("release-2", vec![7_u8; 900]);
        source.declared_len = Some(1000);
        let provisioner = provisioner(&root, source);

        let result = provisioner.ensure_latest(true).await;
        assert!(matches!(result, Err(GoldbergError::Provisioning(_))));
        assert_eq!(provisioner.state(), ProvisioningState::Failed);
        assert!(!root.join(GOLDBERG_DIR).exists());
        assert!(!root.join(format!("{}.part", GOLDBERG_ARCHIVE_FILE)).exists());
        let config = provisioner.settings.snapshot().expect("snapshot");
        assert_eq!(config.goldberg_state.installed_version, None);

        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn digest_mismatch_is_rejected() {
        let root = temp_root();
        let mut source = FakeRelease::new("release-2", release_zip(&root));
        source.digest = Some(format!("sha256:{}", "0".repeat(64)));
        let provisioner = provisioner(&root, source);

        let result = provisioner.ensure_latest(true).await;
        assert!(matches!(result, Err(GoldbergError::Provisioning(_))));
        assert!(!provisioner.is_ready());
        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn fresh_install_extracts_and_records_version() {
        let root = temp_root();
        let payload = release_zip(&root);
        let mut source = FakeRelease::new("release-2", payload.clone());
        source.digest = Some(format!("sha256:{}", hex::encode(Sha256::digest(&payload))));
        let provisioner = provisioner(&root, source);
        assert!(!provisioner.is_ready());

        let outcome = provisioner.ensure_latest(false).await.expect("install");
        assert_eq!(
            outcome,
            ProvisioningOutcome::Installed {
                version: "release-2".to_string()
            }
        );
        assert!(provisioner.is_ready());
        assert_eq!(provisioner.state(), ProvisioningState::Ready);
        assert!(!root.join(GOLDBERG_STAGING_DIR).exists());
        let config = provisioner.settings.snapshot().expect("snapshot");
        assert_eq!(config.goldberg_state.installed_version.as_deref(), Some("release-2"));
        assert!(config.goldberg_state.last_update_check.is_some());

        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn recent_check_skips_network_until_cadence_is_always() {
        let root = temp_root();
        let source = FakeRelease::new("release-1", Vec::new());
        let checks = source.checks.clone();
        let downloads = source.downloads.clone();
        let provisioner = provisioner(&root, source);
        seed_install(&root, &provisioner.settings, "release-1");

        let outcome = provisioner.ensure_latest(false).await.expect("skip");
        assert!(matches!(outcome, ProvisioningOutcome::Skipped { .. }));
        assert_eq!(checks.load(Ordering::SeqCst), 0);

        provisioner
            .settings
            .update(|config| config.gui_defaults.goldberg_update_check_hours = 0)
            .expect("cadence");
        let outcome = provisioner.ensure_latest(false).await.expect("check");
        assert_eq!(
            outcome,
            ProvisioningOutcome::UpToDate {
                version: "release-1".to_string()
            }
        );
        assert_eq!(checks.load(Ordering::SeqCst), 1);
        assert_eq!(downloads.load(Ordering::SeqCst), 0);

        let _ = fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn swap_in_backs_up_original_then_previous_copy() {
        let root = temp_root();
        let provisioner = provisioner(&root, FakeRelease::new("release-1", Vec::new()));
        let provisioned = goldberg_dll_path(&root, false, true, "steam_api64");
        fs::create_dir_all(provisioned.parent().expect("parent")).expect("layout");
        fs::write(&provisioned, b"goldberg").expect("provisioned dll");

        let game = root.join("game");
        fs::create_dir_all(&game).expect("game dir");
        fs::write(game.join("steam_api64.dll"), b"valve").expect("original dll");

        assert_eq!(
            provisioner.apply_to(&game, false).expect("first apply"),
            vec!["steam_api64.dll".to_string()]
        );
        assert_eq!(fs::read(game.join("steam_api64_o.dll")).expect("backup"), b"valve");
        assert_eq!(fs::read(game.join("steam_api64.dll")).expect("swapped"), b"goldberg");

        provisioner
            .provision_into(&game, "steam_api64", false)
            .expect("second apply");
        assert_eq!(fs::read(game.join("steam_api64_o.dll")).expect("backup"), b"valve");
        assert_eq!(
            fs::read(game.join(".steam_api64.dll.GOLDBERGGUIBACKUP")).expect("hidden backup"),
            b"goldberg"
        );
        assert_eq!(fs::read(game.join("steam_api64.dll")).expect("swapped"), b"goldberg");

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn failed_promotion_restores_previous_build() {
        let root = temp_root();
        let target = root.join(GOLDBERG_DIR);
        let previous = root.join(GOLDBERG_PREVIOUS_DIR);
        fs::create_dir_all(&target).expect("installed build");
        fs::write(target.join("steam_api.dll"), b"old").expect("old dll");

        let result = promote_dir(&root.join(GOLDBERG_STAGING_DIR), &target, &previous);
        assert!(matches!(result, Err(GoldbergError::Provisioning(_))));
        assert_eq!(fs::read(target.join("steam_api.dll")).expect("kept"), b"old");
        assert!(!previous.exists());

        let staging = root.join(GOLDBERG_STAGING_DIR);
        fs::create_dir_all(&staging).expect("staging");
        fs::write(staging.join("steam_api.dll"), b"new").expect("new dll");
        promote_dir(&staging, &target, &previous).expect("promote");
        assert_eq!(fs::read(target.join("steam_api.dll")).expect("replaced"), b"new");
        assert!(!staging.exists());
        assert!(!previous.exists());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn apply_checks_every_binary_before_swapping_any() {
        let root = temp_root();
        let provisioner = provisioner(&root, FakeRelease::new("release-1", Vec::new()));
        let provisioned = goldberg_dll_path(&root, false, false, "steam_api");
        fs::create_dir_all(provisioned.parent().expect("parent")).expect("layout");
        fs::write(&provisioned, b"goldberg").expect("provisioned dll");

        let game = root.join("game");
        fs::create_dir_all(&game).expect("game dir");
        fs::write(game.join("steam_api.dll"), b"valve").expect("32-bit dll");
        fs::write(game.join("steam_api64.dll"), b"valve64").expect("64-bit dll");

        let result = provisioner.apply_to(&game, false);
        assert!(matches!(result, Err(GoldbergError::Provisioning(_))));
        assert_eq!(fs::read(game.join("steam_api.dll")).expect("untouched"), b"valve");
        assert!(!game.join("steam_api_o.dll").exists());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_provisioned_binary_leaves_game_untouched() {
        let root = temp_root();
        let game = root.join("game");
        fs::create_dir_all(&game).expect("game dir");
        fs::write(game.join("steam_api.dll"), b"valve").expect("original dll");

        let result = swap_in_dll(&root, &game, "steam_api", false);
        assert!(matches!(result, Err(GoldbergError::Provisioning(_))));
        assert_eq!(fs::read(game.join("steam_api.dll")).expect("original"), b"valve");
        assert!(!game.join("steam_api_o.dll").exists());

        let _ = fs::remove_dir_all(&root);
    }
}
