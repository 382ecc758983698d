use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_ACCOUNT_NAME: &str = "Goldberg";
pub const DEFAULT_STEAM_ID: u64 = 76561197960287930;
pub const DEFAULT_LANGUAGE: &str = "english";
pub const MIN_STEAM_ID: u64 = 76561197960265729;
pub const MAX_STEAM_ID: u64 = 76561202255233023;
pub const DEFAULT_UPDATE_CHECK_HOURS: i32 = 24;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AppType {
    Game,
    Dlc,
}

impl AppType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppType::Game => "game",
            AppType::Dlc => "dlc",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "game" => Some(AppType::Game),
            "dlc" => Some(AppType::Dlc),
            _ => None,
        }
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized lookup key for a display name: ASCII alphanumerics only, lowercased.
pub fn comparable_name(name: &str) -> String {
    name.chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SteamApp {
    pub app_id: u32,
    pub name: String,
    pub comparable_name: String,
    pub app_type: AppType,
    pub last_modified: i64,
    pub price_change_number: i64,
}

impl SteamApp {
    pub fn new(app_id: u32, name: impl Into<String>, app_type: AppType) -> Self {
        let name = name.into();
        Self {
            app_id,
            comparable_name: comparable_name(&name),
            name,
            app_type,
            last_modified: 0,
            price_change_number: 0,
        }
    }
}

impl fmt::Display for SteamApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.app_id, self.name)
    }
}

fn placeholder_name(app_id: u32) -> String {
    format!("Unknown DLC {}", app_id)
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DlcApp {
    #[serde(flatten)]
    pub app: SteamApp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_path: Option<String>,
}

impl DlcApp {
    pub fn new(app_id: u32, name: impl Into<String>) -> Self {
        Self {
            app: SteamApp::new(app_id, name, AppType::Dlc),
            app_path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.app_path = if path.trim().is_empty() {
            None
        } else {
            Some(path)
        };
        self
    }

    /// Placeholder for a DLC id that the local catalog does not know yet.
    pub fn placeholder(app_id: u32) -> Self {
        let mut dlc = Self::new(app_id, placeholder_name(app_id));
        dlc.app.comparable_name = format!("unknowndlc{}", app_id);
        dlc
    }

    pub fn is_placeholder(&self) -> bool {
        self.app.name == placeholder_name(self.app.app_id)
    }

    pub fn app_id(&self) -> u32 {
        self.app.app_id
    }

    pub fn name(&self) -> &str {
        &self.app.name
    }
}

impl From<SteamApp> for DlcApp {
    fn from(app: SteamApp) -> Self {
        Self {
            app,
            app_path: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Achievement {
    pub name: String,
    #[serde(rename = "displayName", default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "int_or_bool")]
    pub hidden: i32,
    #[serde(default)]
    pub icon: String,
    #[serde(rename = "icongray", default)]
    pub icon_gray: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatType {
    Int,
    Float,
    Avgrate,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Stat {
    pub name: String,
    #[serde(rename = "type")]
    pub stat_type: StatType,
    #[serde(rename = "default", alias = "defaultValue", deserialize_with = "string_or_number")]
    pub default_value: String,
    #[serde(default = "zero_string", deserialize_with = "string_or_number")]
    pub global: String,
}

fn zero_string() -> String {
    "0".to_string()
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(text) => text,
        serde_json::Value::Null => "0".to_string(),
        other => other.to_string(),
    })
}

fn int_or_bool<'de, D>(deserializer: D) -> std::result::Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(flag) => i32::from(flag),
        serde_json::Value::Number(number) => number.as_i64().unwrap_or(0) as i32,
        serde_json::Value::String(text) => text.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GoldbergGlobalConfiguration {
    pub account_name: String,
    pub user_steam_id: u64,
    pub language: String,
    #[serde(default)]
    pub custom_broadcast_ips: Option<Vec<String>>,
    #[serde(default)]
    pub use_experimental: bool,
}

impl Default for GoldbergGlobalConfiguration {
    fn default() -> Self {
        Self {
            account_name: DEFAULT_ACCOUNT_NAME.to_string(),
            user_steam_id: DEFAULT_STEAM_ID,
            language: DEFAULT_LANGUAGE.to_string(),
            custom_broadcast_ips: None,
            use_experimental: false,
        }
    }
}

pub fn is_valid_steam_id(steam_id: u64) -> bool {
    (MIN_STEAM_ID..=MAX_STEAM_ID).contains(&steam_id)
}

impl GoldbergGlobalConfiguration {
    /// Global defaults with a per-game override applied field by field.
    pub fn effective(&self, overwritten: Option<&GoldbergGlobalConfiguration>) -> Self {
        let Some(overwritten) = overwritten else {
            return self.clone();
        };
        Self {
            account_name: non_empty_or(&overwritten.account_name, &self.account_name),
            user_steam_id: if is_valid_steam_id(overwritten.user_steam_id) {
                overwritten.user_steam_id
            } else {
                self.user_steam_id
            },
            language: non_empty_or(&overwritten.language, &self.language),
            custom_broadcast_ips: overwritten
                .custom_broadcast_ips
                .clone()
                .or_else(|| self.custom_broadcast_ips.clone()),
            use_experimental: self.use_experimental,
        }
    }

    pub fn broadcast_ips(&self) -> &[String] {
        self.custom_broadcast_ips.as_deref().unwrap_or(&[])
    }

    /// Replace blank or out-of-range fields with defaults.
    pub fn sanitized(mut self) -> Self {
        if self.account_name.trim().is_empty() {
            tracing::info!("invalid account name, using default");
            self.account_name = DEFAULT_ACCOUNT_NAME.to_string();
        }
        if !is_valid_steam_id(self.user_steam_id) {
            tracing::warn!(
                "invalid user steam id {}, using default {}",
                self.user_steam_id,
                DEFAULT_STEAM_ID
            );
            self.user_steam_id = DEFAULT_STEAM_ID;
        }
        if self.language.trim().is_empty() {
            tracing::info!("invalid language, using default");
            self.language = DEFAULT_LANGUAGE.to_string();
        }
        if let Some(ips) = self.custom_broadcast_ips.as_mut() {
            ips.iter_mut().for_each(|ip| *ip = ip.trim().to_string());
            ips.retain(|ip| !ip.is_empty());
        }
        self
    }
}

fn non_empty_or(preferred: &str, fallback: &str) -> String {
    if preferred.trim().is_empty() {
        fallback.to_string()
    } else {
        preferred.to_string()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GoldbergConfiguration {
    pub app_id: i64,
    #[serde(default)]
    pub dlc_list: Vec<DlcApp>,
    #[serde(default)]
    pub achievements: Vec<Achievement>,
    #[serde(default)]
    pub stats: Option<Vec<Stat>>,
    #[serde(default)]
    pub offline: bool,
    #[serde(default)]
    pub disable_networking: bool,
    #[serde(default)]
    pub disable_overlay: bool,
    #[serde(default)]
    pub overwritten_global_configuration: Option<GoldbergGlobalConfiguration>,
}

impl Default for GoldbergConfiguration {
    fn default() -> Self {
        Self {
            app_id: -1,
            dlc_list: Vec::new(),
            achievements: Vec::new(),
            stats: None,
            offline: false,
            disable_networking: false,
            disable_overlay: false,
            overwritten_global_configuration: None,
        }
    }
}

impl GoldbergConfiguration {
    /// Enforce id-uniqueness of DLC and name-uniqueness of achievements and stats.
    /// A later duplicate replaces the earlier entry in the earlier entry's position.
    pub fn normalized(mut self) -> Self {
        self.dlc_list = dedupe_by(self.dlc_list, |dlc| dlc.app_id().to_string());
        self.achievements = dedupe_by(self.achievements, |item| item.name.clone());
        self.stats = self.stats.map(|stats| dedupe_by(stats, |stat| stat.name.clone()));
        self
    }
}

fn dedupe_by<T, F>(items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> String,
{
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut output: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        let item_key = key(&item);
        match positions.get(&item_key) {
            Some(&index) => output[index] = item,
            None => {
                positions.insert(item_key, output.len());
                output.push(item);
            }
        }
    }
    output
}

/// Persisted process-wide state (`app_config.json`).
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct AppConfiguration {
    #[serde(default)]
    pub gui_defaults: GuiDefaults,
    #[serde(default)]
    pub goldberg_state: GoldbergState,
    #[serde(default)]
    pub database_state: DatabaseState,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct GuiDefaults {
    pub account_name: String,
    pub steam_id: u64,
    pub language: String,
    #[serde(default)]
    pub custom_broadcast_ips: Option<Vec<String>>,
    #[serde(default)]
    pub use_experimental: bool,
    #[serde(default = "default_update_check_hours")]
    pub goldberg_update_check_hours: i32,
    #[serde(default = "default_update_check_hours")]
    pub database_update_check_hours: i32,
}

fn default_update_check_hours() -> i32 {
    DEFAULT_UPDATE_CHECK_HOURS
}

impl Default for GuiDefaults {
    fn default() -> Self {
        Self {
            account_name: DEFAULT_ACCOUNT_NAME.to_string(),
            steam_id: DEFAULT_STEAM_ID,
            language: DEFAULT_LANGUAGE.to_string(),
            custom_broadcast_ips: None,
            use_experimental: false,
            goldberg_update_check_hours: DEFAULT_UPDATE_CHECK_HOURS,
            database_update_check_hours: DEFAULT_UPDATE_CHECK_HOURS,
        }
    }
}

impl GuiDefaults {
    pub fn global_configuration(&self) -> GoldbergGlobalConfiguration {
        GoldbergGlobalConfiguration {
            account_name: self.account_name.clone(),
            user_steam_id: self.steam_id,
            language: self.language.clone(),
            custom_broadcast_ips: self.custom_broadcast_ips.clone(),
            use_experimental: self.use_experimental,
        }
    }

    pub fn apply_global(&mut self, global: &GoldbergGlobalConfiguration) {
        self.account_name = global.account_name.clone();
        self.steam_id = global.user_steam_id;
        self.language = global.language.clone();
        self.custom_broadcast_ips = global
            .custom_broadcast_ips
            .clone()
            .filter(|ips| !ips.is_empty());
        self.use_experimental = global.use_experimental;
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct GoldbergState {
    #[serde(default)]
    pub installed_version: Option<String>,
    #[serde(default)]
    pub last_update_check: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseState {
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
}

/// Refresh cadence shared by catalog sync and emulator update checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateCadence {
    Disabled,
    Always,
    EveryHours(u32),
}

impl UpdateCadence {
    pub fn from_hours(hours: i32) -> Self {
        match hours {
            h if h < 0 => UpdateCadence::Disabled,
            0 => UpdateCadence::Always,
            h => UpdateCadence::EveryHours(h as u32),
        }
    }

    /// Whether a refresh is due given the last successful refresh time.
    pub fn is_due(&self, last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match self {
            UpdateCadence::Disabled => false,
            UpdateCadence::Always => true,
            UpdateCadence::EveryHours(hours) => match last {
                None => true,
                Some(last) => now.signed_duration_since(last) >= chrono::Duration::hours(*hours as i64),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparable_name_ignores_case_and_punctuation() {
        assert_eq!(comparable_name("Half-Life 2"), comparable_name("half life 2"));
        assert_eq!(comparable_name("Half-Life 2"), "halflife2");
        let once = comparable_name("Portal: Still Alive!");
        assert_eq!(comparable_name(&once), once);
    }

    #[test]
    fn comparable_name_drops_non_ascii_letters() {
        assert_eq!(comparable_name("Pokémon™ Légendes"), "pokmonlgendes");
    }

    #[test]
    fn placeholder_dlc_is_recognised() {
        let dlc = DlcApp::placeholder(4242);
        assert_eq!(dlc.name(), "Unknown DLC 4242");
        assert!(dlc.is_placeholder());
        assert!(!DlcApp::new(1, "Season Pass").is_placeholder());
        assert!(!DlcApp::new(7, "Unknown DLC Hunters").is_placeholder());
        assert!(!DlcApp::new(7, "Unknown DLC 8").is_placeholder());
    }

    #[test]
    fn override_wins_field_by_field() {
        let global = GoldbergGlobalConfiguration {
            custom_broadcast_ips: Some(vec!["10.0.0.255".to_string()]),
            ..GoldbergGlobalConfiguration::default()
        };
        let overwritten = GoldbergGlobalConfiguration {
            account_name: "Gordon".to_string(),
            user_steam_id: 1,
            language: String::new(),
            custom_broadcast_ips: None,
            use_experimental: true,
        };
        let effective = global.effective(Some(&overwritten));
        assert_eq!(effective.account_name, "Gordon");
        assert_eq!(effective.user_steam_id, DEFAULT_STEAM_ID);
        assert_eq!(effective.language, DEFAULT_LANGUAGE);
        assert_eq!(effective.broadcast_ips(), ["10.0.0.255".to_string()]);
        assert!(!effective.use_experimental);
    }

    #[test]
    fn normalized_keeps_first_position_and_last_value() {
        let config = GoldbergConfiguration {
            app_id: 10,
            dlc_list: vec![
                DlcApp::placeholder(100),
                DlcApp::new(200, "Pack B"),
                DlcApp::new(100, "Pack A"),
            ],
            ..GoldbergConfiguration::default()
        }
        .normalized();
        let ids: Vec<u32> = config.dlc_list.iter().map(DlcApp::app_id).collect();
        assert_eq!(ids, vec![100, 200]);
        assert_eq!(config.dlc_list[0].name(), "Pack A");
    }

    #[test]
    fn cadence_follows_hours_semantics() {
        let now = Utc::now();
        let hour_ago = Some(now - chrono::Duration::hours(1));
        assert!(!UpdateCadence::from_hours(-1).is_due(None, now));
        assert!(UpdateCadence::from_hours(0).is_due(hour_ago, now));
        assert!(!UpdateCadence::from_hours(24).is_due(hour_ago, now));
        assert!(UpdateCadence::from_hours(1).is_due(hour_ago, now));
        assert!(UpdateCadence::from_hours(24).is_due(None, now));
    }

    #[test]
    fn stat_reads_default_value_alias_and_numbers() {
        let stat: Stat =
            serde_json::from_str(r#"{"name":"kills","type":"int","defaultValue":0}"#).unwrap();
        assert_eq!(stat.default_value, "0");
        assert_eq!(stat.global, "0");
        let encoded = serde_json::to_value(&stat).unwrap();
        assert_eq!(encoded["default"], "0");
    }

    #[test]
    fn app_configuration_uses_pascal_case_keys() {
        let json = r#"{"GuiDefaults":{"AccountName":"Alyx","SteamId":76561197960287931,"Language":"german"},
                       "GoldbergState":{"InstalledVersion":"release-2024"}}"#;
        let config: AppConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(config.gui_defaults.account_name, "Alyx");
        assert_eq!(config.gui_defaults.goldberg_update_check_hours, 24);
        assert_eq!(
            config.goldberg_state.installed_version.as_deref(),
            Some("release-2024")
        );
        assert!(config.database_state.last_update.is_none());
    }
}
