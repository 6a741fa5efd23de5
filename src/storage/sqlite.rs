use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{Page, Result, Storage, StorageError};

/// SQLite-backed page storage
#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open or create the database at the given path and run migrations.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // journal_mode PRAGMA always returns the resulting mode, so use query_row
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        // Migrate before wrapping in the async Mutex so no lock is needed here
        Self::run_migrations(&conn).context("Failed to run database migrations")?;

        info!("Storage initialized at: {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)]
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS pages (
                url TEXT NOT NULL,
                owner TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_pages_owner_url
                ON pages(owner, url);

            -- Single-row table holding the next update offset to fetch
            CREATE TABLE IF NOT EXISTS cursor (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                value INTEGER NOT NULL
            );
            ",
        )
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn save(&self, page: &Page) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO pages (url, owner) VALUES (?1, ?2)",
            rusqlite::params![page.url, page.owner],
        )
        .map_err(|e| StorageError::database("save page", e))?;

        debug!("Saved page {} for {}", page.url, page.owner);
        Ok(())
    }

    async fn exists(&self, page: &Page) -> Result<bool> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT COUNT(*) > 0 FROM pages WHERE owner = ?1 AND url = ?2",
            rusqlite::params![page.owner, page.url],
            |row| row.get(0),
        )
        .map_err(|e| StorageError::database("check if page exists", e))
    }

    async fn pick_random(&self, owner: &str) -> Result<Page> {
        let conn = self.conn.lock().await;
        let url: Option<String> = conn
            .query_row(
                "SELECT url FROM pages WHERE owner = ?1 ORDER BY RANDOM() LIMIT 1",
                rusqlite::params![owner],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StorageError::database("pick random page", e))?;

        url.map(|url| Page::new(url, owner))
            .ok_or(StorageError::NotFound)
    }

    async fn remove(&self, page: &Page) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM pages WHERE owner = ?1 AND url = ?2",
            rusqlite::params![page.owner, page.url],
        )
        .map_err(|e| StorageError::database("remove page", e))?;
        Ok(())
    }

    async fn load_cursor(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        let value: Option<i64> = conn
            .query_row("SELECT value FROM cursor WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| StorageError::database("load cursor", e))?;
        Ok(value.unwrap_or(0))
    }

    async fn save_cursor(&self, cursor: i64) -> Result<()> {
        let conn = self.conn.lock().await;
        // MAX keeps the stored cursor from ever moving backwards
        conn.execute(
            "INSERT INTO cursor (id, value) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET value = MAX(value, excluded.value)",
            rusqlite::params![cursor],
        )
        .map_err(|e| StorageError::database("save cursor", e))?;
        Ok(())
    }
}
