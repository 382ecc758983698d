use std::collections::BTreeMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::queries::CatalogQueries;
use crate::db::Database;
use crate::errors::{GoldbergError, Result};
use crate::models::{AppType, SteamApp, UpdateCadence};
use crate::services::api_client::{Agent, ApiClient};
use crate::services::settings_store::AppConfigStore;
use crate::services::status::StatusReporter;
use crate::utils::cancel::CancelToken;

const PAGE_SIZE: u32 = 50_000;

#[derive(Debug, Deserialize)]
struct RawApp {
    appid: u32,
    #[serde(default)]
    name: String,
    #[serde(default)]
    last_modified: i64,
    #[serde(default)]
    price_change_number: i64,
}

#[derive(Debug, Deserialize)]
struct RawAppList {
    #[serde(default)]
    apps: Option<Vec<RawApp>>,
    #[serde(default)]
    have_more_results: bool,
    #[serde(default)]
    last_appid: u32,
}

/// The two historical shapes of the app-list payload.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogEnvelope {
    Response { response: RawAppList },
    AppList { applist: RawAppList },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogPage {
    pub apps: Vec<SteamApp>,
    pub have_more_results: bool,
    pub last_app_id: u32,
}

pub fn parse_catalog_page(body: &str, app_type: AppType) -> Result<CatalogPage> {
    let envelope: CatalogEnvelope = serde_json::from_str(body)
        .map_err(|err| GoldbergError::Sync(format!("unexpected response shape: {}", err)))?;
    let list = match envelope {
        CatalogEnvelope::Response { response } => response,
        CatalogEnvelope::AppList { applist } => applist,
    };
    let Some(raw_apps) = list.apps else {
        return Err(GoldbergError::Sync(
            "unexpected response shape: app list missing".to_string(),
        ));
    };
    let apps = raw_apps
        .into_iter()
        .map(|raw| {
            let mut app = SteamApp::new(raw.appid, raw.name, app_type);
            app.last_modified = raw.last_modified;
            app.price_change_number = raw.price_change_number;
            app
        })
        .collect();
    Ok(CatalogPage {
        apps,
        have_more_results: list.have_more_results,
        last_app_id: list.last_appid,
    })
}

pub trait CatalogSource: Send + Sync {
    fn fetch_page(
        &self,
        app_type: AppType,
        last_app_id: u32,
    ) -> impl Future<Output = Result<CatalogPage>> + Send;
}

/// `IStoreService/GetAppList` over HTTP.
#[derive(Clone)]
pub struct SteamCatalogSource {
    api: ApiClient,
    url: String,
    api_key: Option<String>,
}

impl SteamCatalogSource {
    pub fn new(api: ApiClient, url: String, api_key: Option<String>) -> Self {
        Self { api, url, api_key }
    }

    fn page_url(&self, app_type: AppType, last_app_id: u32, key: &str) -> String {
        let filter = match app_type {
            AppType::Game => "include_games=1",
            AppType::Dlc => "include_games=0&include_dlc=1",
        };
        let mut url = format!(
            "{}?max_results={}&{}&key={}",
            self.url,
            PAGE_SIZE,
            filter,
            urlencoding::encode(key)
        );
        if last_app_id > 0 {
            url.push_str(&format!("&last_appid={}", last_app_id));
        }
        url
    }
}

impl CatalogSource for SteamCatalogSource {
    async fn fetch_page(&self, app_type: AppType, last_app_id: u32) -> Result<CatalogPage> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GoldbergError::Sync("STEAM_WEB_API_KEY is not set".to_string()))?;
        let url = self.page_url(app_type, last_app_id, key);
        tracing::debug!("fetching {} catalog page after {}", app_type, last_app_id);
        let body = self.api.get_text(&url, Agent::Browser).await?;
        parse_catalog_page(&body, app_type)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TypeSyncOutcome {
    Synced { count: usize },
    Skipped { existing: u64 },
    Failed { error: String },
    Cancelled,
}

#[derive(Serialize, Debug, Clone)]
pub struct SyncReport {
    pub games: TypeSyncOutcome,
    pub dlc: TypeSyncOutcome,
    pub last_update: Option<DateTime<Utc>>,
}

impl SyncReport {
    pub fn any_failed(&self) -> bool {
        matches!(self.games, TypeSyncOutcome::Failed { .. })
            || matches!(self.dlc, TypeSyncOutcome::Failed { .. })
    }
}

#[derive(Clone)]
pub struct CatalogSync<S: CatalogSource> {
    db: Database,
    source: S,
    settings: AppConfigStore,
    status: StatusReporter,
}

impl<S: CatalogSource> CatalogSync<S> {
    pub fn new(db: Database, source: S, settings: AppConfigStore, status: StatusReporter) -> Self {
        Self {
            db,
            source,
            settings,
            status,
        }
    }

    /// Refresh both partitions. `force` ignores the staleness window.
    pub async fn sync(&self, force: bool, cancel: &CancelToken) -> Result<SyncReport> {
        let config = self.settings.snapshot()?;
        let cadence = UpdateCadence::from_hours(config.gui_defaults.database_update_check_hours);
        let last_update = config.database_state.last_update;
        let now = Utc::now();

        let games = self.sync_type(AppType::Game, force, cadence, last_update, now, cancel).await?;
        let dlc = self.sync_type(AppType::Dlc, force, cadence, last_update, now, cancel).await?;

        let committed = matches!(games, TypeSyncOutcome::Synced { .. })
            || matches!(dlc, TypeSyncOutcome::Synced { .. });
        let last_update = if committed {
            let updated = self
                .settings
                .update(|config| config.database_state.last_update = Some(now))?;
            updated.database_state.last_update
        } else {
            last_update
        };

        Ok(SyncReport {
            games,
            dlc,
            last_update,
        })
    }

    async fn sync_type(
        &self,
        app_type: AppType,
        force: bool,
        cadence: UpdateCadence,
        last_update: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> Result<TypeSyncOutcome> {
        let existing = self.db.count(app_type)?;
        if !force && existing > 0 && !cadence.is_due(last_update, now) {
            tracing::info!(
                "skipping {} catalog sync, {} rows cached and not stale",
                app_type,
                existing
            );
            return Ok(TypeSyncOutcome::Skipped { existing });
        }

        self.status.info(format!("Updating {} catalog...", app_type));
        let apps = match self.fetch_all(app_type, cancel).await {
            Ok(Some(apps)) => apps,
            Ok(None) => {
                self.status.warn(format!("{} catalog sync cancelled", app_type));
                return Ok(TypeSyncOutcome::Cancelled);
            }
            Err(err) => {
                self.status
                    .error(format!("{} catalog sync failed: {}", app_type, err));
                return Ok(TypeSyncOutcome::Failed {
                    error: err.to_string(),
                });
            }
        };

        let count = apps.len();
        let db = self.db.clone();
        let committed = tokio::task::spawn_blocking(move || db.replace_by_type(app_type, &apps))
            .await
            .map_err(|err| GoldbergError::Sync(err.to_string()))
            .and_then(|result| result);
        match committed {
            Ok(()) => {
                self.status
                    .info(format!("{} catalog updated with {} entries", app_type, count));
                Ok(TypeSyncOutcome::Synced { count })
            }
            Err(err) => {
                self.status
                    .error(format!("{} catalog commit failed: {}", app_type, err));
                Ok(TypeSyncOutcome::Failed {
                    error: err.to_string(),
                })
            }
        }
    }

    /// All pages for one type, in order. `None` when cancelled between pages.
    async fn fetch_all(&self, app_type: AppType, cancel: &CancelToken) -> Result<Option<Vec<SteamApp>>> {
        let mut accumulated: BTreeMap<u32, SteamApp> = BTreeMap::new();
        let mut cursor = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            let page = self.source.fetch_page(app_type, cursor).await?;
            let received = page.apps.len();
            for app in page.apps {
                accumulated.insert(app.app_id, app);
            }
            tracing::debug!(
                "{} catalog page after {}: {} apps, more: {}",
                app_type,
                cursor,
                received,
                page.have_more_results
            );
            if !page.have_more_results {
                break;
            }
            if page.last_app_id <= cursor {
                return Err(GoldbergError::Sync(format!(
                    "pagination did not advance past app {}",
                    cursor
                )));
            }
            cursor = page.last_app_id;
        }
        Ok(Some(accumulated.into_values().collect()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use uuid::Uuid;

    #[derive(Clone, Default)]
    pub(crate) struct FakeSource {
        pub(crate) pages: Arc<HashMap<(AppType, u32), Option<CatalogPage>>>,
        pub(crate) calls: Arc<AtomicUsize>,
    }

    impl CatalogSource for FakeSource {
        async fn fetch_page(&self, app_type: AppType, last_app_id: u32) -> Result<CatalogPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.pages.get(&(app_type, last_app_id)) {
                Some(Some(page)) => Ok(page.clone()),
                Some(None) => Err(GoldbergError::Http("HTTP 503: unavailable".to_string())),
                None => Err(GoldbergError::Http("HTTP 404: no page".to_string())),
            }
        }
    }

    fn page(app_type: AppType, apps: &[(u32, &str)], more: bool) -> CatalogPage {
        let apps: Vec<SteamApp> = apps
            .iter()
            .map(|(id, name)| SteamApp::new(*id, *name, app_type))
            .collect();
        let last_app_id = apps.last().map(|app| app.app_id).unwrap_or(0);
        CatalogPage {
            apps,
            have_more_results: more,
            last_app_id,
        }
    }

    fn setup(
        pages: HashMap<(AppType, u32), Option<CatalogPage>>,
        hours: i32,
    ) -> (CatalogSync<FakeSource>, FakeSource, Database, PathBuf) {
        let root = std::env::temp_dir().join(format!("goldberg-sync-{}", Uuid::new_v4()));
        let db = crate::db::init(&root).expect("db");
        let settings = AppConfigStore::load(&root).expect("settings");
        settings
            .update(|config| config.gui_defaults.database_update_check_hours = hours)
            .expect("cadence");
        let source = FakeSource {
            pages: Arc::new(pages),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let sync = CatalogSync::new(db.clone(), source.clone(), settings, StatusReporter::silent());
        (sync, source, db, root)
    }

    pub(crate) fn two_page_games() -> HashMap<(AppType, u32), Option<CatalogPage>> {
        let mut pages = HashMap::new();
        pages.insert(
            (AppType::Game, 0),
            Some(page(AppType::Game, &[(10, "Counter-Strike"), (220, "Half-Life 2")], true)),
        );
        pages.insert(
            (AppType::Game, 220),
            Some(page(AppType::Game, &[(220, "Half-Life 2 (renamed)"), (400, "Portal")], false)),
        );
        pages.insert(
            (AppType::Dlc, 0),
            Some(page(AppType::Dlc, &[(323140, "Soundtrack")], false)),
        );
        pages
    }

    #[test]
    fn both_envelopes_resolve_to_a_page() {
        let v1 = r#"{"response":{"apps":[{"appid":220,"name":"Half-Life 2","last_modified":5}],
                     "have_more_results":true,"last_appid":220}}"#;
        let parsed = parse_catalog_page(v1, AppType::Game).expect("v1");
        assert!(parsed.have_more_results);
        assert_eq!(parsed.apps[0].comparable_name, "halflife2");
        assert_eq!(parsed.apps[0].last_modified, 5);

        let v2 = r#"{"applist":{"apps":[{"appid":400,"name":"Portal"}]}}"#;
        let parsed = parse_catalog_page(v2, AppType::Game).expect("v2");
        assert!(!parsed.have_more_results);
        assert_eq!(parsed.apps.len(), 1);

        assert!(matches!(
            parse_catalog_page(r#"{"response":{}}"#, AppType::Game),
            Err(GoldbergError::Sync(_))
        ));
        assert!(matches!(
            parse_catalog_page(r#"{"apps":[]}"#, AppType::Game),
            Err(GoldbergError::Sync(_))
        ));
    }

    #[tokio::test]
    async fn pages_accumulate_and_commit_once_per_type() {
        let (sync, source, db, root) = setup(two_page_games(), 24);
        let report = sync.sync(false, &CancelToken::new()).await.expect("sync");
        assert_eq!(report.games, TypeSyncOutcome::Synced { count: 3 });
        assert_eq!(report.dlc, TypeSyncOutcome::Synced { count: 1 });
        assert!(report.last_update.is_some());
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        let renamed = db.find_by_id(AppType::Game, 220).expect("query").expect("row");
        assert_eq!(renamed.name, "Half-Life 2 (renamed)");
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn fresh_catalog_is_skipped_without_network() {
        let (sync, source, _db, root) = setup(two_page_games(), 24);
        sync.sync(false, &CancelToken::new()).await.expect("first sync");
        let calls = source.calls.load(Ordering::SeqCst);

        let report = sync.sync(false, &CancelToken::new()).await.expect("second sync");
        assert!(matches!(report.games, TypeSyncOutcome::Skipped { existing: 3 }));
        assert!(matches!(report.dlc, TypeSyncOutcome::Skipped { existing: 1 }));
        assert_eq!(source.calls.load(Ordering::SeqCst), calls);
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn always_cadence_checks_every_time() {
        let (sync, source, _db, root) = setup(two_page_games(), 0);
        sync.sync(false, &CancelToken::new()).await.expect("first sync");
        let calls = source.calls.load(Ordering::SeqCst);
        sync.sync(false, &CancelToken::new()).await.expect("second sync");
        assert_eq!(source.calls.load(Ordering::SeqCst), calls * 2);
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn disabled_cadence_still_fills_an_empty_store() {
        let (sync, source, _db, root) = setup(two_page_games(), -1);
        let report = sync.sync(false, &CancelToken::new()).await.expect("sync");
        assert!(matches!(report.games, TypeSyncOutcome::Synced { .. }));
        let calls = source.calls.load(Ordering::SeqCst);
        let report = sync.sync(false, &CancelToken::new()).await.expect("again");
        assert!(matches!(report.games, TypeSyncOutcome::Skipped { .. }));
        assert_eq!(source.calls.load(Ordering::SeqCst), calls);
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn failed_page_keeps_old_rows_and_other_type_syncs() {
        let mut pages = two_page_games();
        let (sync, _source, db, root) = setup(pages.clone(), 0);
        sync.sync(false, &CancelToken::new()).await.expect("seed");

        pages.insert((AppType::Game, 220), None);
        pages.insert(
            (AppType::Dlc, 0),
            Some(page(AppType::Dlc, &[(323140, "Soundtrack"), (323150, "Art Book")], false)),
        );
        let failing = CatalogSync::new(
            db.clone(),
            FakeSource {
                pages: Arc::new(pages),
                calls: Arc::new(AtomicUsize::new(0)),
            },
            AppConfigStore::load(&root).expect("settings"),
            StatusReporter::silent(),
        );
        let report = failing.sync(false, &CancelToken::new()).await.expect("sync");
        assert!(report.any_failed());
        assert!(matches!(report.games, TypeSyncOutcome::Failed { .. }));
        assert_eq!(report.dlc, TypeSyncOutcome::Synced { count: 2 });
        assert_eq!(db.count(AppType::Game).expect("games"), 3);
        assert_eq!(db.count(AppType::Dlc).expect("dlc"), 2);
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn cancelled_sync_commits_nothing() {
        let (sync, source, db, root) = setup(two_page_games(), 24);
        let cancel = CancelToken::new();
        cancel.cancel();
        let report = sync.sync(true, &cancel).await.expect("sync");
        assert_eq!(report.games, TypeSyncOutcome::Cancelled);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(db.count(AppType::Game).expect("count"), 0);
        assert!(report.last_update.is_none());
        let _ = std::fs::remove_dir_all(root);
    }
}
