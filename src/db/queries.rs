use rusqlite::{params, OptionalExtension, Row};
use tokio::sync::mpsc;

use crate::db::Database;
use crate::errors::{GoldbergError, Result};
use crate::models::{AppType, SteamApp};
use crate::utils::cancel::CancelToken;

const SEARCH_CHANNEL_CAPACITY: usize = 128;

const APP_COLUMNS: &str = "appid, name, comparable_name, type, last_modified, price_change_number";

pub trait CatalogQueries {
    fn replace_by_type(&self, app_type: AppType, apps: &[SteamApp]) -> Result<()>;
    fn find_by_id(&self, app_type: AppType, app_id: u32) -> Result<Option<SteamApp>>;
    fn find_by_comparable_name(&self, app_type: AppType, comparable: &str) -> Result<Option<SteamApp>>;
    fn search_by_name_terms(
        &self,
        app_type: AppType,
        terms: &[String],
        cancel: CancelToken,
    ) -> Result<AppStream>;
    fn count(&self, app_type: AppType) -> Result<u64>;
}

fn row_to_app(row: &Row<'_>) -> rusqlite::Result<SteamApp> {
    let app_type: String = row.get(3)?;
    Ok(SteamApp {
        app_id: row.get(0)?,
        name: row.get(1)?,
        comparable_name: row.get(2)?,
        app_type: AppType::parse(&app_type).unwrap_or(AppType::Game),
        last_modified: row.get(4)?,
        price_change_number: row.get(5)?,
    })
}

/// Lazy, ordered sequence of search matches fed by a blocking reader.
/// Dropping the stream stops the reader at its next row.
pub struct AppStream {
    rx: mpsc::Receiver<Result<SteamApp>>,
    cancel: CancelToken,
}

impl AppStream {
    pub async fn next(&mut self) -> Option<Result<SteamApp>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.rx.recv().await
    }

    /// Drain the stream; a cancelled search returns `GoldbergError::Cancelled`.
    pub async fn collect_all(mut self) -> Result<Vec<SteamApp>> {
        let mut apps = Vec::new();
        while let Some(item) = self.next().await {
            apps.push(item?);
        }
        if self.cancel.is_cancelled() {
            return Err(GoldbergError::Cancelled);
        }
        Ok(apps)
    }
}

fn matches_all_terms(name: &str, terms: &[String]) -> bool {
    let lowered = name.to_lowercase();
    terms.iter().all(|term| lowered.contains(term.as_str()))
}

fn stream_matches(
    reader: &rusqlite::Connection,
    app_type: AppType,
    terms: &[String],
    cancel: &CancelToken,
    tx: &mpsc::Sender<Result<SteamApp>>,
) -> rusqlite::Result<()> {
    let mut stmt = reader.prepare(&format!(
        "SELECT {APP_COLUMNS} FROM steamapp WHERE type = ?1 ORDER BY appid"
    ))?;
    let mut rows = stmt.query(params![app_type.as_str()])?;
    while let Some(row) = rows.next()? {
        if cancel.is_cancelled() {
            break;
        }
        let app = row_to_app(row)?;
        if !matches_all_terms(&app.name, terms) {
            continue;
        }
        if tx.blocking_send(Ok(app)).is_err() {
            break;
        }
    }
    Ok(())
}

impl Database {
    /// Convenience over `search_by_name_terms` that gathers every match.
    pub async fn collect_by_name_terms(
        &self,
        app_type: AppType,
        terms: &[String],
    ) -> Result<Vec<SteamApp>> {
        self.search_by_name_terms(app_type, terms, CancelToken::new())?
            .collect_all()
            .await
    }
}

impl CatalogQueries for Database {
    fn replace_by_type(&self, app_type: AppType, apps: &[SteamApp]) -> Result<()> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM steamapp WHERE type = ?1",
            params![app_type.as_str()],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO steamapp
                 (appid, name, comparable_name, type, last_modified, price_change_number)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for app in apps {
                stmt.execute(params![
                    app.app_id,
                    app.name,
                    app.comparable_name,
                    app_type.as_str(),
                    app.last_modified,
                    app.price_change_number,
                ])?;
            }
        }
        tx.commit()?;
        tracing::info!("replaced {} catalog rows of type {}", apps.len(), app_type);
        Ok(())
    }

    fn find_by_id(&self, app_type: AppType, app_id: u32) -> Result<Option<SteamApp>> {
        let conn = self.connection()?;
        let app = conn
            .query_row(
                &format!("SELECT {APP_COLUMNS} FROM steamapp WHERE type = ?1 AND appid = ?2"),
                params![app_type.as_str(), app_id],
                row_to_app,
            )
            .optional()?;
        Ok(app)
    }

    fn find_by_comparable_name(&self, app_type: AppType, comparable: &str) -> Result<Option<SteamApp>> {
        let conn = self.connection()?;
        let app = conn
            .query_row(
                &format!(
                    "SELECT {APP_COLUMNS} FROM steamapp
                     WHERE type = ?1 AND comparable_name = ?2
                     ORDER BY appid LIMIT 1"
                ),
                params![app_type.as_str(), comparable],
                row_to_app,
            )
            .optional()?;
        Ok(app)
    }

    fn search_by_name_terms(
        &self,
        app_type: AppType,
        terms: &[String],
        cancel: CancelToken,
    ) -> Result<AppStream> {
        let reader = self.open_reader()?;
        let terms: Vec<String> = terms
            .iter()
            .map(|term| term.trim().to_lowercase())
            .filter(|term| !term.is_empty())
            .collect();
        let (tx, rx) = mpsc::channel(SEARCH_CHANNEL_CAPACITY);
        let worker_cancel = cancel.clone();

        tokio::task::spawn_blocking(move || {
            if let Err(err) = stream_matches(&reader, app_type, &terms, &worker_cancel, &tx) {
                tracing::warn!("catalog search aborted: {}", err);
                let _ = tx.blocking_send(Err(GoldbergError::Storage(err)));
            }
        });

        Ok(AppStream { rx, cancel })
    }

    fn count(&self, app_type: AppType) -> Result<u64> {
        let conn = self.connection()?;
        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM steamapp WHERE type = ?1",
            params![app_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(total.max(0) as u64)
    }
}
