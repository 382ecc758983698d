use std::collections::HashMap;

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::db::queries::CatalogQueries;
use crate::db::Database;
use crate::errors::{GoldbergError, Result};
use crate::models::{Achievement, AppType, DlcApp, Stat, StatType};
use crate::services::api_client::{Agent, ApiClient};

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct GameSchema {
    pub achievements: Vec<Achievement>,
    pub stats: Vec<Stat>,
}

#[derive(Deserialize)]
struct SchemaEnvelope {
    #[serde(default)]
    game: Option<SchemaGame>,
}

#[derive(Deserialize)]
struct SchemaGame {
    #[serde(rename = "availableGameStats", default)]
    available_game_stats: Option<SchemaStats>,
}

#[derive(Deserialize)]
struct SchemaStats {
    #[serde(default)]
    achievements: Vec<Achievement>,
    #[serde(default)]
    stats: Vec<SchemaStat>,
}

#[derive(Deserialize)]
struct SchemaStat {
    name: String,
    #[serde(rename = "defaultvalue", default)]
    default_value: f64,
}

impl From<SchemaStat> for Stat {
    fn from(raw: SchemaStat) -> Self {
        let integral = raw.default_value.fract() == 0.0 && raw.default_value.is_finite();
        Stat {
            name: raw.name,
            stat_type: if integral { StatType::Int } else { StatType::Float },
            default_value: if integral {
                format!("{}", raw.default_value as i64)
            } else {
                raw.default_value.to_string()
            },
            global: "0".to_string(),
        }
    }
}

pub fn parse_schema(body: &str) -> Result<GameSchema> {
    let envelope: SchemaEnvelope = serde_json::from_str(body)?;
    let Some(stats) = envelope.game.and_then(|game| game.available_game_stats) else {
        return Ok(GameSchema::default());
    };
    Ok(GameSchema {
        achievements: stats.achievements,
        stats: stats.stats.into_iter().map(Stat::from).collect(),
    })
}

#[derive(Deserialize)]
struct AppDetailsEntry {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<AppDetailsData>,
}

#[derive(Deserialize)]
struct AppDetailsData {
    #[serde(rename = "type", default)]
    app_type: String,
    #[serde(default)]
    dlc: Vec<u32>,
}

/// DLC ids listed by the store for `app_id`; `None` unless the app is a game.
pub fn parse_app_details(body: &str, app_id: u32) -> Result<Option<Vec<u32>>> {
    let mut entries: HashMap<String, AppDetailsEntry> = serde_json::from_str(body)?;
    let Some(entry) = entries.remove(&app_id.to_string()) else {
        return Err(GoldbergError::Http(format!(
            "app details response has no entry for {}",
            app_id
        )));
    };
    match entry.data {
        Some(data) if entry.success && data.app_type == AppType::Game.as_str() => Ok(Some(data.dlc)),
        _ => Ok(None),
    }
}

#[derive(Deserialize)]
struct StoreDlcEnvelope {
    data: StoreDlcData,
}

#[derive(Deserialize)]
struct StoreDlcData {
    dlcs: Vec<StoreDlc>,
}

#[derive(Deserialize)]
struct StoreDlc {
    id: serde_json::Value,
    #[serde(default)]
    name: Option<String>,
}

pub fn parse_store_dlc_list(body: &str) -> Result<Vec<DlcApp>> {
    let envelope: StoreDlcEnvelope = serde_json::from_str(body)?;
    Ok(envelope
        .data
        .dlcs
        .into_iter()
        .filter_map(|dlc| {
            let app_id = match &dlc.id {
                serde_json::Value::String(text) => text.trim().parse::<u32>().ok()?,
                serde_json::Value::Number(number) => u32::try_from(number.as_u64()?).ok()?,
                _ => return None,
            };
            Some(match dlc.name.filter(|name| !name.trim().is_empty()) {
                Some(name) => DlcApp::new(app_id, name.trim()),
                None => DlcApp::placeholder(app_id),
            })
        })
        .collect())
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|err| GoldbergError::Config(format!("invalid selector {}: {:?}", css, err)))
}

/// Rows of the SteamDB DLC table: `.app[data-appid]` inside `#dlc`, name in the second cell.
pub fn parse_steamdb_dlc(html: &str) -> Result<Vec<DlcApp>> {
    let document = Html::parse_document(html);
    let section_selector = selector("#dlc")?;
    let app_selector = selector(".app[data-appid]")?;
    let cell_selector = selector("td")?;

    let Some(section) = document.select(&section_selector).next() else {
        return Err(GoldbergError::Http("SteamDB page has no DLC section".to_string()));
    };

    Ok(section
        .select(&app_selector)
        .filter_map(|row| {
            let app_id = row.value().attr("data-appid")?.trim().parse::<u32>().ok()?;
            let name = row
                .select(&cell_selector)
                .nth(1)
                .map(|cell| cell.text().collect::<String>().replace('\n', "").trim().to_string())
                .filter(|name| !name.is_empty());
            Some(match name {
                Some(name) => DlcApp::new(app_id, name),
                None => DlcApp::placeholder(app_id),
            })
        })
        .collect())
}

/// Upgrade placeholders in place and append unseen DLC. Resolved names are never overwritten.
pub fn merge_enriched(dlc_list: &mut Vec<DlcApp>, found: Vec<DlcApp>) {
    for dlc in found {
        match dlc_list.iter().position(|existing| existing.app_id() == dlc.app_id()) {
            Some(index) => {
                if dlc_list[index].is_placeholder() && !dlc.is_placeholder() {
                    dlc_list[index] = dlc;
                }
            }
            None => dlc_list.push(dlc),
        }
    }
}

#[derive(Clone)]
pub struct SteamMetadata {
    db: Database,
    api: ApiClient,
    steam_api_url: String,
    store_url: String,
    steamdb_url: String,
    api_key: Option<String>,
}

impl SteamMetadata {
    pub fn new(
        db: Database,
        api: ApiClient,
        steam_api_url: String,
        store_url: String,
        steamdb_url: String,
        api_key: Option<String>,
    ) -> Self {
        Self {
            db,
            api,
            steam_api_url,
            store_url,
            steamdb_url,
            api_key,
        }
    }

    async fn fetch_schema(&self, app_id: u32) -> Result<GameSchema> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GoldbergError::Config("STEAM_WEB_API_KEY is not set".to_string()))?;
        let url = format!(
            "{}/ISteamUserStats/GetSchemaForGame/v2/?key={}&appid={}&l=en",
            self.steam_api_url,
            urlencoding::encode(key),
            app_id
        );
        let body = self.api.get_text(&url, Agent::Browser).await?;
        parse_schema(&body)
    }

    /// Achievements and stats for `app_id`; any failure degrades to an empty schema.
    pub async fn schema(&self, app_id: u32) -> GameSchema {
        tracing::info!("getting achievements and stats for app {}", app_id);
        match self.fetch_schema(app_id).await {
            Ok(schema) => {
                tracing::info!(
                    "app {} has {} achievements and {} stats",
                    app_id,
                    schema.achievements.len(),
                    schema.stats.len()
                );
                schema
            }
            Err(err) => {
                tracing::error!("failed to get schema for app {}: {}", app_id, err);
                GameSchema::default()
            }
        }
    }

    pub async fn achievements(&self, app_id: u32) -> Vec<Achievement> {
        self.schema(app_id).await.achievements
    }

    pub async fn stats(&self, app_id: u32) -> Vec<Stat> {
        self.schema(app_id).await.stats
    }

    /// DLC of a game resolved against the local catalog; `enrich` consults the store
    /// DLC list and then SteamDB for names the catalog lacks.
    pub async fn dlc(&self, app_id: u32, enrich: bool) -> Vec<DlcApp> {
        tracing::info!("getting DLC for app {}", app_id);
        let mut dlc_list = match self.listed_dlc(app_id).await {
            Ok(list) => list,
            Err(err) => {
                tracing::error!("error getting DLC list for app {}: {}", app_id, err);
                return Vec::new();
            }
        };
        if enrich {
            self.enrich(app_id, &mut dlc_list).await;
        }
        dlc_list
    }

    async fn listed_dlc(&self, app_id: u32) -> Result<Vec<DlcApp>> {
        let url = format!("{}/api/appdetails/?appids={}", self.store_url, app_id);
        let body = self.api.get_text(&url, Agent::Browser).await?;
        let Some(ids) = parse_app_details(&body, app_id)? else {
            tracing::error!("could not get DLC: app {} is not of type game", app_id);
            return Ok(Vec::new());
        };

        let mut dlc_list = Vec::with_capacity(ids.len());
        for id in ids {
            let dlc = match self.db.find_by_id(AppType::Dlc, id)? {
                Some(app) => DlcApp::from(app),
                None => DlcApp::placeholder(id),
            };
            tracing::debug!("{}={}", dlc.app_id(), dlc.name());
            dlc_list.push(dlc);
        }
        Ok(dlc_list)
    }

    async fn enrich(&self, app_id: u32, dlc_list: &mut Vec<DlcApp>) {
        let store_url = format!("{}/dlc/{}/ajaxgetdlclist", self.store_url, app_id);
        let store = async {
            let body = self.api.get_text(&store_url, Agent::Browser).await?;
            parse_store_dlc_list(&body)
        };
        match store.await {
            Ok(found) => {
                tracing::info!("got {} DLC from the store list", found.len());
                merge_enriched(dlc_list, found);
                return;
            }
            Err(err) => {
                tracing::warn!("store DLC list unavailable, falling back to SteamDB: {}", err)
            }
        }

        let steamdb_url = format!("{}/app/{}/dlc/", self.steamdb_url, app_id);
        let scraped = async {
            let html = self.api.get_text(&steamdb_url, Agent::Browser).await?;
            parse_steamdb_dlc(&html)
        };
        match scraped.await {
            Ok(found) => {
                tracing::info!("got {} DLC from SteamDB", found.len());
                merge_enriched(dlc_list, found);
            }
            Err(err) => tracing::error!("could not get DLC from SteamDB, skipping: {}", err),
        }
    }
}
