use std::path::PathBuf;

use serde::Serialize;

use crate::services::{ProvisioningOutcome, ProvisioningState};
use crate::AppState;

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub struct EmulatorStatus {
    pub state: ProvisioningState,
    pub ready: bool,
    pub installed_version: Option<String>,
}

pub async fn provision(state: &AppState, force: bool) -> Result<ProvisioningOutcome, String> {
    state
        .goldberg
        .provisioner()
        .ensure_latest(force)
        .await
        .map_err(|e| e.to_string())
}

pub async fn emulator_status(state: &AppState) -> Result<EmulatorStatus, String> {
    let provisioner = state.goldberg.provisioner();
    let installed_version = state
        .settings
        .snapshot()
        .map_err(|e| e.to_string())?
        .goldberg_state
        .installed_version;
    Ok(EmulatorStatus {
        state: provisioner.state(),
        ready: provisioner.is_ready(),
        installed_version,
    })
}

/// Swap the emulator binaries into `dir` without touching its configuration.
pub async fn apply_emulator(state: &AppState, dir: PathBuf) -> Result<Vec<String>, String> {
    let experimental = state
        .goldberg
        .get_settings()
        .map_err(|e| e.to_string())?
        .use_experimental;
    let provisioner = state.goldberg.provisioner().clone();
    tokio::task::spawn_blocking(move || provisioner.apply_to(&dir, experimental))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())
}

pub async fn generate_interfaces(state: &AppState, dll: PathBuf) -> Result<String, String> {
    state
        .goldberg
        .generate_interfaces_file(&dll)
        .await
        .map(|path| path.display().to_string())
        .map_err(|e| e.to_string())
}
