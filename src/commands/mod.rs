pub mod catalog;
pub mod config;
pub mod emulator;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::db::Database;
use crate::models::GoldbergGlobalConfiguration;
use crate::services::catalog_sync::CatalogSource;
use crate::services::emulator_provisioner::ReleaseSource;
use crate::services::{CatalogSync, GoldbergService, ProvisioningOutcome, StatusReporter, SyncReport};
use crate::utils::cancel::CancelToken;
use crate::AppState;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InitMode {
    FirstRun,
    Background,
}

#[derive(Serialize)]
pub struct InitReport {
    pub mode: InitMode,
    pub settings: GoldbergGlobalConfiguration,
    pub catalog: Option<SyncReport>,
    pub emulator: Option<ProvisioningOutcome>,
}

pub struct InitOutcome {
    pub report: InitReport,
    /// Refresh tasks started in background mode; they report on the status channel.
    pub background: Vec<JoinHandle<()>>,
}

/// Startup flow. Until the catalog and the emulator both exist, both are set up in
/// the foreground and any failure is returned. Afterwards refreshes run in the
/// background.
pub async fn init(state: &AppState) -> Result<InitOutcome, String> {
    start(&state.db, &state.catalog_sync, &state.goldberg, &state.status).await
}

async fn start<S, R>(
    db: &Database,
    catalog_sync: &CatalogSync<S>,
    goldberg: &GoldbergService<R>,
    status: &StatusReporter,
) -> Result<InitOutcome, String>
where
    S: CatalogSource + Clone + 'static,
    R: ReleaseSource + Clone + 'static,
{
    let catalog_ready = db.is_initialized().map_err(|e| e.to_string())?;
    let emulator_ready = goldberg.provisioner().is_ready();

    if !catalog_ready || !emulator_ready {
        status.info("First run, setting up the catalog and Goldberg...");
        let catalog = catalog_sync
            .sync(false, &CancelToken::new())
            .await
            .map_err(|e| e.to_string())?;
        if catalog.any_failed() {
            return Err(format!(
                "catalog setup failed: {}",
                serde_json::to_string(&catalog).unwrap_or_default()
            ));
        }
        let emulator = goldberg
            .provisioner()
            .ensure_latest(false)
            .await
            .map_err(|e| e.to_string())?;
        let settings = goldberg.get_settings().map_err(|e| e.to_string())?;
        return Ok(InitOutcome {
            report: InitReport {
                mode: InitMode::FirstRun,
                settings,
                catalog: Some(catalog),
                emulator: Some(emulator),
            },
            background: Vec::new(),
        });
    }

    let sync = catalog_sync.clone();
    let sync_status = status.clone();
    let catalog_task = tokio::spawn(async move {
        if let Err(err) = sync.sync(false, &CancelToken::new()).await {
            sync_status.error(format!("Catalog refresh failed: {}", err));
        }
    });
    let updater = goldberg.clone();
    let emulator_task = tokio::spawn(async move {
        if let Err(err) = updater.initialize().await {
            tracing::error!("background Goldberg check failed: {}", err);
        }
    });

    let settings = goldberg.get_settings().map_err(|e| e.to_string())?;
    Ok(InitOutcome {
        report: InitReport {
            mode: InitMode::Background,
            settings,
            catalog: None,
            emulator: None,
        },
        background: vec![catalog_task, emulator_task],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    use crate::models::AppType;
    use crate::services::catalog_sync::tests::{two_page_games, FakeSource};
    use crate::services::catalog_sync::CatalogPage;
    use crate::services::emulator_provisioner::tests::{release_zip, FakeRelease, ASSET};
    use crate::services::{
        AchievementIcons, ApiClient, AppConfigStore, EmulatorProvisioner, TypeSyncOutcome,
    };

    struct Fixture {
        root: PathBuf,
        db: Database,
        catalog_sync: CatalogSync<FakeSource>,
        goldberg: GoldbergService<FakeRelease>,
        source: FakeSource,
        release: FakeRelease,
    }

    fn fixture(pages: HashMap<(AppType, u32), Option<CatalogPage>>) -> Fixture {
        let root = std::env::temp_dir().join(format!("goldberg-init-{}", Uuid::new_v4()));
        let db = crate::db::init(&root).expect("db");
        let settings = AppConfigStore::load(&root).expect("settings");
        let source = FakeSource {
            pages: Arc::new(pages),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let release = FakeRelease::new("release-1", release_zip(&root));
        let catalog_sync =
            CatalogSync::new(db.clone(), source.clone(), settings.clone(), StatusReporter::silent());
        let provisioner = EmulatorProvisioner::new(
            root.clone(),
            release.clone(),
            ASSET.to_string(),
            settings.clone(),
            StatusReporter::silent(),
        );
        let icons = AchievementIcons::new(ApiClient::new(Duration::from_secs(2)), 1);
        let goldberg = GoldbergService::new(settings, provisioner, icons, None);
        Fixture {
            root,
            db,
            catalog_sync,
            goldberg,
            source,
            release,
        }
    }

    async fn run(fixture: &Fixture) -> Result<InitOutcome, String> {
        start(
            &fixture.db,
            &fixture.catalog_sync,
            &fixture.goldberg,
            &StatusReporter::silent(),
        )
        .await
    }

    fn cleanup(root: &Path) {
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn first_run_sets_up_in_foreground_then_refreshes_in_background() {
        let fixture = fixture(two_page_games());

        let first = run(&fixture).await.expect("first run");
        assert_eq!(first.report.mode, InitMode::FirstRun);
        assert!(first.background.is_empty());
        let catalog = first.report.catalog.expect("catalog report");
        assert_eq!(catalog.games, TypeSyncOutcome::Synced { count: 3 });
        assert_eq!(
            first.report.emulator,
            Some(ProvisioningOutcome::Installed {
                version: "release-1".to_string()
            })
        );
        assert!(fixture.goldberg.provisioner().is_ready());
        let calls = fixture.source.calls.load(Ordering::SeqCst);

        let second = run(&fixture).await.expect("second run");
        assert_eq!(second.report.mode, InitMode::Background);
        assert!(second.report.catalog.is_none() && second.report.emulator.is_none());
        assert_eq!(second.background.len(), 2);
        for task in second.background {
            task.await.expect("background task");
        }
        assert_eq!(fixture.source.calls.load(Ordering::SeqCst), calls);
        assert_eq!(fixture.release.checks.load(Ordering::SeqCst), 1);
        assert_eq!(fixture.release.downloads.load(Ordering::SeqCst), 1);

        cleanup(&fixture.root);
    }

    #[tokio::test]
    async fn failed_first_run_stops_before_provisioning() {
        let fixture = fixture(HashMap::new());

        let error = match run(&fixture).await {
            Ok(outcome) => panic!("unexpected success {:?}", outcome.report.mode),
            Err(error) => error,
        };
        assert!(error.starts_with("catalog setup failed"));
        assert_eq!(fixture.release.checks.load(Ordering::SeqCst), 0);
        assert!(!fixture.goldberg.provisioner().is_ready());

        cleanup(&fixture.root);
    }
}
