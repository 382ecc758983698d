use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OpenFlags};

use crate::errors::{GoldbergError, Result};
use crate::utils::paths::CATALOG_DB_FILE;

pub mod queries;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Database {
    pub fn new(path: PathBuf) -> Result<Self> {
        let conn = Connection::open(&path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = 100000;
             PRAGMA temp_store = MEMORY;",
        )?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(include_str!("../../migrations/001_steam_catalog.sql"))?;
        Ok(())
    }

    pub fn connection(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| GoldbergError::StorageLock(self.path.display().to_string()))
    }

    /// Independent read-only connection; under WAL each statement on it sees one snapshot.
    pub fn open_reader(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// True once the catalog holds at least one row of any type.
    pub fn is_initialized(&self) -> Result<bool> {
        let conn = self.connection()?;
        let rows: i64 = conn.query_row("SELECT COUNT(*) FROM steamapp", [], |row| row.get(0))?;
        Ok(rows > 0)
    }
}

pub fn init(root_dir: &Path) -> Result<Database> {
    std::fs::create_dir_all(root_dir)?;
    let db = Database::new(root_dir.join(CATALOG_DB_FILE))?;
    db.run_migrations()?;
    tracing::info!("catalog store opened at {}", db.path().display());
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::queries::CatalogQueries;
    use crate::models::AppType;
    use uuid::Uuid;

    #[test]
    fn poisoned_lock_is_reported_as_storage_error() {
        let dir = std::env::temp_dir().join(format!("goldberg-db-{}", Uuid::new_v4()));
        let db = init(&dir).expect("open db");
        let holder = db.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.connection().expect("lock");
            panic!("poison the catalog lock");
        })
        .join();

        match db.count(AppType::Game) {
            Err(GoldbergError::StorageLock(path)) => assert!(path.ends_with(CATALOG_DB_FILE)),
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
        let _ = std::fs::remove_dir_all(dir);
    }
}
