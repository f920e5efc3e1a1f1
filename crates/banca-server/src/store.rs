//! Async access to the SQLite record store.
//!
//! `rusqlite` is synchronous, so every call runs on tokio's blocking pool
//! while holding the connection mutex. Each call is one suspension point for
//! the caller; calls from different tasks are serialized by the mutex.

use std::path::Path;
use std::sync::{Arc, Mutex};

use banca_store::Database;

use crate::error::ServerError;

#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Database>>,
}

impl Store {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Open the database at `path`, or an in-memory one.
    pub fn open(path: &Path, in_memory: bool) -> Result<Self, ServerError> {
        let db = if in_memory {
            Database::open_in_memory()?
        } else {
            Database::open(path)?
        };
        Ok(Self::new(db))
    }

    /// Run `f` against the database on a blocking thread.
    pub async fn call<T, F>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&Database) -> banca_store::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| ServerError::Internal(format!("Store lock poisoned: {e}")))?;
            f(&guard).map_err(ServerError::from)
        })
        .await
        .map_err(|e| ServerError::Internal(format!("Store task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banca_shared::types::UserId;

    #[tokio::test]
    async fn test_call_runs_query() {
        let store = Store::new(Database::open_in_memory().unwrap());
        let user = store.call(|db| db.get_user(UserId(1))).await.unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_store_error_is_propagated() {
        let store = Store::new(Database::open_in_memory().unwrap());
        let result: Result<(), _> = store
            .call(|db| {
                db.conn().execute("INSERT INTO nowhere VALUES (1)", [])?;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(ServerError::Store(_))));
    }
}
