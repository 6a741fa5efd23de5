pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

/// A page a user asked to read later
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub url: String,
    /// Username of the owner
    pub owner: String,
}

impl Page {
    pub fn new(url: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            owner: owner.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    /// The owner has nothing saved. Expected outcome of `pick_random`.
    #[error("no saved pages")]
    NotFound,

    #[error("can't {op}: {source}")]
    Database {
        op: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}

impl StorageError {
    pub fn database(op: &'static str, source: rusqlite::Error) -> Self {
        Self::Database { op, source }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Durable collection of saved pages, addressed by (owner, url).
///
/// Every operation is atomic on its own; nothing here spans several pages.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Insert a page. Callers check `exists` first to keep (owner, url) unique.
    async fn save(&self, page: &Page) -> Result<()>;

    async fn exists(&self, page: &Page) -> Result<bool>;

    /// Pick one page of `owner` uniformly at random.
    /// Fails with `StorageError::NotFound` when the owner has none.
    async fn pick_random(&self, owner: &str) -> Result<Page>;

    /// Remove a page. Removing a missing page is not an error.
    async fn remove(&self, page: &Page) -> Result<()>;

    /// Last committed fetch cursor, zero if none was ever committed
    async fn load_cursor(&self) -> Result<i64>;

    async fn save_cursor(&self, cursor: i64) -> Result<()>;
}
