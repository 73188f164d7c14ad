//! Storage interfaces with SQLite and in-memory backends

pub mod memory;
pub mod sqlite;
pub mod traits;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::MEMORY_DATABASE_URL;
use crate::error::{Result, VetClinicError};

// Re-export the storage surface
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::*;

/// Handles to every repository, built once at startup and injected
#[derive(Clone)]
pub struct Repositories {
    pub cats: Arc<dyn CatStorage>,
    pub visits: Arc<dyn VisitStorage>,
    pub treatments: Arc<dyn TreatmentStorage>,
    pub users: Arc<dyn UserStorage>,
}

impl Repositories {
    /// Wires all four repositories to one in-memory store
    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(MemoryStore::new()))
    }

    /// Opens the backend named by `database_url`: `memory`, or an SQLite URL
    pub async fn connect(database_url: &str) -> Result<Self> {
        if database_url == MEMORY_DATABASE_URL {
            log::warn!("Using the in-memory store: records are lost on restart");
            return Ok(Self::in_memory());
        }
        let store = SqliteStore::connect(database_url).await?;
        Ok(Self::from_store(Arc::new(store)))
    }

    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: CatStorage + VisitStorage + TreatmentStorage + UserStorage + 'static,
    {
        Self {
            cats: store.clone(),
            visits: store.clone(),
            treatments: store.clone(),
            users: store,
        }
    }
}

/// Bounds a repository call by `deadline`; overrunning it is a storage failure
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => {
            log::error!("Storage call exceeded its {}ms deadline", deadline.as_millis());
            Err(VetClinicError::StorageError(format!(
                "storage call exceeded its {}ms deadline",
                deadline.as_millis()
            )))
        }
    }
}
