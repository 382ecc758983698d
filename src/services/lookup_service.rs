use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::db::queries::{AppStream, CatalogQueries};
use crate::db::Database;
use crate::errors::Result;
use crate::models::{comparable_name, AppType, SteamApp};
use crate::services::lookup_cache::LookupCache;
use crate::utils::cancel::CancelToken;

const MAX_SUGGESTIONS: usize = 10;
const CLOSE_MATCH_RATIO: f64 = 0.7;

const UTILITY_KEYWORDS: [&str; 18] = [
    "unins",
    "setup",
    "install",
    "update",
    "launcher",
    "crash",
    "report",
    "config",
    "settings",
    "tool",
    "editor",
    "uxhelper",
    "bootstrapper",
    "prerequisite",
    "redist",
    "vcredist",
    "directx",
    "dx",
];

const GENERIC_DIRECTORIES: [&str; 12] = [
    "bin",
    "binary",
    "binaries",
    "common",
    "steamapps",
    "games",
    "program files",
    "program files (x86)",
    "x64",
    "x86",
    "win64",
    "win32",
];

const STRIPPED_SUFFIXES: [&str; 5] = ["_Data", "_x64", "_x86", "Game", "Launcher"];

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DetectionResult {
    Detected {
        candidate: String,
        app: SteamApp,
        suggestions: Vec<SteamApp>,
    },
    Ambiguous {
        candidate: String,
        suggestions: Vec<SteamApp>,
    },
    NotFound {
        candidates: Vec<String>,
    },
}

#[derive(Clone)]
pub struct LookupService {
    db: Database,
    cache: LookupCache<Option<SteamApp>>,
}

impl LookupService {
    pub fn new(db: Database, cache_max: usize, ttl: Duration) -> Self {
        Self {
            db,
            cache: LookupCache::new(cache_max, ttl),
        }
    }

    pub fn get_by_exact_comparable_name(&self, name: &str) -> Result<Option<SteamApp>> {
        let comparable = comparable_name(name);
        let key = format!("app:name:{}", comparable);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }
        tracing::info!("looking up app {}", name);
        let app = self.db.find_by_comparable_name(AppType::Game, &comparable)?;
        if let Some(found) = app.as_ref() {
            tracing::info!("found app {}", found);
        }
        self.cache.insert(key, app.clone());
        Ok(app)
    }

    pub fn get_by_id(&self, app_id: u32) -> Result<Option<SteamApp>> {
        let key = format!("app:id:{}", app_id);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }
        tracing::info!("looking up app with id {}", app_id);
        let app = self.db.find_by_id(AppType::Game, app_id)?;
        self.cache.insert(key, app.clone());
        Ok(app)
    }

    /// Every game whose name contains all whitespace-separated terms of `name`.
    pub fn search_by_name(&self, name: &str, cancel: CancelToken) -> Result<AppStream> {
        self.db.search_by_name_terms(AppType::Game, &search_terms(name), cancel)
    }

    pub async fn search_all(&self, name: &str) -> Result<Vec<SteamApp>> {
        self.db
            .collect_by_name_terms(AppType::Game, &search_terms(name))
            .await
    }

    /// Guess the game installed in `dir` from folder and executable names.
    pub async fn detect_game(&self, dir: &Path) -> Result<DetectionResult> {
        let candidates = detection_candidates(dir);
        tracing::info!(
            "auto-detecting game in {} with candidates {:?}",
            dir.display(),
            candidates
        );

        for candidate in &candidates {
            if let Some(app) = self.get_by_exact_comparable_name(candidate)? {
                return Ok(DetectionResult::Detected {
                    candidate: candidate.clone(),
                    app,
                    suggestions: Vec::new(),
                });
            }

            let found = self.search_all(candidate).await?;
            match found.as_slice() {
                [] => continue,
                [only] => {
                    return Ok(DetectionResult::Detected {
                        candidate: candidate.clone(),
                        app: only.clone(),
                        suggestions: Vec::new(),
                    })
                }
                [first, ..] => {
                    let suggestions: Vec<SteamApp> =
                        found.iter().take(MAX_SUGGESTIONS).cloned().collect();
                    if is_close_match(candidate, &first.name) {
                        return Ok(DetectionResult::Detected {
                            candidate: candidate.clone(),
                            app: first.clone(),
                            suggestions,
                        });
                    }
                    tracing::info!(
                        "found {} possible matches for {}",
                        found.len(),
                        candidate
                    );
                    return Ok(DetectionResult::Ambiguous {
                        candidate: candidate.clone(),
                        suggestions,
                    });
                }
            }
        }

        tracing::info!("could not auto-detect game in {}", dir.display());
        Ok(DetectionResult::NotFound { candidates })
    }
}

fn search_terms(name: &str) -> Vec<String> {
    name.split_whitespace().map(str::to_string).collect()
}

/// Distinct cleaned names: the folder, its non-utility executables, then a non-generic parent.
pub fn detection_candidates(dir: &Path) -> Vec<String> {
    let mut raw: Vec<String> = Vec::new();
    if let Some(folder) = dir.file_name().map(|name| name.to_string_lossy().to_string()) {
        raw.push(folder);
    }

    match std::fs::read_dir(dir) {
        Ok(entries) => {
            let mut executables: Vec<String> = entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.is_file())
                .filter(|path| {
                    path.extension()
                        .map(|ext| ext.eq_ignore_ascii_case("exe"))
                        .unwrap_or(false)
                })
                .filter_map(|path| path.file_stem().map(|stem| stem.to_string_lossy().to_string()))
                .filter(|stem| !is_utility_executable(stem))
                .collect();
            executables.sort();
            raw.extend(executables);
        }
        Err(err) => tracing::warn!("failed to scan {} for executables: {}", dir.display(), err),
    }

    if let Some(parent) = dir
        .parent()
        .and_then(|parent| parent.file_name())
        .map(|name| name.to_string_lossy().to_string())
    {
        if !parent.trim().is_empty() && !is_generic_directory(&parent) {
            raw.push(parent);
        }
    }

    let mut seen: Vec<String> = Vec::new();
    let mut candidates: Vec<String> = Vec::new();
    for name in raw {
        let cleaned = clean_game_name(&name);
        let key = comparable_name(&cleaned);
        if key.is_empty() || seen.contains(&key) {
            continue;
        }
        seen.push(key);
        candidates.push(cleaned);
    }
    candidates
}

pub fn clean_game_name(name: &str) -> String {
    let mut cleaned = strip_bracket_groups(name).trim().to_string();
    for suffix in STRIPPED_SUFFIXES {
        if cleaned.len() >= suffix.len() {
            let split = cleaned.len() - suffix.len();
            if cleaned.is_char_boundary(split) && cleaned[split..].eq_ignore_ascii_case(suffix) {
                cleaned = cleaned[..split].trim().to_string();
            }
        }
    }
    let spaced: String = cleaned
        .chars()
        .map(|ch| if ch == '_' || ch == '-' { ' ' } else { ch })
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop `[...]` and `(...)` groups, shortest match first.
fn strip_bracket_groups(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.char_indices().peekable();
    while let Some((index, ch)) = chars.next() {
        let close = match ch {
            '[' => ']',
            '(' => ')',
            _ => {
                out.push(ch);
                continue;
            }
        };
        match name[index + 1..].find(close) {
            Some(offset) => {
                let end = index + 1 + offset;
                while chars.peek().map(|(i, _)| *i <= end).unwrap_or(false) {
                    chars.next();
                }
            }
            None => out.push(ch),
        }
    }
    out
}

pub fn is_utility_executable(name: &str) -> bool {
    let lowered = name.to_lowercase();
    UTILITY_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

pub fn is_generic_directory(name: &str) -> bool {
    GENERIC_DIRECTORIES
        .iter()
        .any(|dir| name.eq_ignore_ascii_case(dir))
}

/// Containment in either direction with a length ratio above 0.7, ignoring case and spaces.
pub fn is_close_match(candidate: &str, result: &str) -> bool {
    let candidate: String = candidate.to_lowercase().replace(' ', "");
    let result: String = result.to_lowercase().replace(' ', "");
    if candidate.is_empty() || result.is_empty() {
        return false;
    }
    if !(result.contains(&candidate) || candidate.contains(&result)) {
        return false;
    }
    let min = candidate.chars().count().min(result.chars().count()) as f64;
    let max = candidate.chars().count().max(result.chars().count()) as f64;
    min / max > CLOSE_MATCH_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn temp_root() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("goldberg-lookup-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn seeded(root: &Path, names: &[(u32, &str)]) -> LookupService {
        let db = crate::db::init(root).expect("db");
        let apps: Vec<SteamApp> = names
            .iter()
            .map(|(id, name)| SteamApp::new(*id, *name, AppType::Game))
            .collect();
        db.replace_by_type(AppType::Game, &apps).expect("seed");
        LookupService::new(db, 64, Duration::from_secs(7200))
    }

    #[test]
    fn exact_lookup_normalizes_and_caches_misses() {
        let root = temp_root();
        let lookup = seeded(&root, &[(220, "Half-Life 2")]);
        let hit = lookup
            .get_by_exact_comparable_name("half life 2")
            .expect("lookup")
            .expect("hit");
        assert_eq!(hit.app_id, 220);
        assert!(lookup
            .get_by_exact_comparable_name("Portal")
            .expect("lookup")
            .is_none());
        assert_eq!(lookup.cache.get("app:name:portal"), Some(None));

        lookup.db.replace_by_type(AppType::Game, &[]).expect("clear");
        assert!(lookup.get_by_id(220).expect("by id").is_none());
        assert_eq!(
            lookup
                .get_by_exact_comparable_name("HALF-LIFE 2")
                .expect("cached")
                .map(|app| app.app_id),
            Some(220)
        );
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn names_are_cleaned_for_detection() {
        assert_eq!(clean_game_name("Hollow_Knight [PLAZA] (64-bit)"), "Hollow Knight");
        assert_eq!(clean_game_name("Subnautica_Data"), "Subnautica");
        assert_eq!(clean_game_name("Dishonored-2"), "Dishonored 2");
        assert_eq!(clean_game_name("TerrariaGame"), "Terraria");
        assert!(is_utility_executable("unins000"));
        assert!(is_utility_executable("UnityCrashHandler64"));
        assert!(!is_utility_executable("Terraria"));
        assert!(is_generic_directory("Binaries"));
        assert!(!is_close_match("Half Life 2", "Half-Life 2: Lost Coast"));
        assert!(is_close_match("portal 2", "Portal 2"));
    }

    #[tokio::test]
    async fn detects_game_from_directory_and_executables() {
        let root = temp_root();
        let lookup = seeded(
            &root,
            &[(105600, "Terraria"), (367520, "Hollow Knight"), (264710, "Subnautica")],
        );
        let game_dir = root.join("common").join("Hollow Knight [GOG]");
        std::fs::create_dir_all(&game_dir).expect("game dir");
        std::fs::write(game_dir.join("hollow_knight.exe"), b"MZ").expect("exe");
        std::fs::write(game_dir.join("unins000.exe"), b"MZ").expect("uninstaller");

        let candidates = detection_candidates(&game_dir);
        assert_eq!(candidates, vec!["Hollow Knight".to_string()]);

        match lookup.detect_game(&game_dir).await.expect("detect") {
            DetectionResult::Detected { app, .. } => assert_eq!(app.app_id, 367520),
            other => panic!("unexpected detection {:?}", other),
        }
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn several_loose_matches_are_ambiguous() {
        let root = temp_root();
        let lookup = seeded(
            &root,
            &[
                (1, "Space Station 13 Remastered Deluxe"),
                (2, "Space Station Tycoon Ultimate Edition"),
            ],
        );
        let game_dir = root.join("Space Station");
        std::fs::create_dir_all(&game_dir).expect("game dir");
        match lookup.detect_game(&game_dir).await.expect("detect") {
            DetectionResult::Ambiguous { suggestions, .. } => assert_eq!(suggestions.len(), 2),
            other => panic!("unexpected detection {:?}", other),
        }

        let nowhere = root.join("Nothing Here");
        std::fs::create_dir_all(&nowhere).expect("dir");
        assert!(matches!(
            lookup.detect_game(&nowhere).await.expect("detect"),
            DetectionResult::NotFound { .. }
        ));
        let _ = std::fs::remove_dir_all(root);
    }
}
