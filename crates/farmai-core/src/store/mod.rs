// Storage seam for farms and consulting sessions, plus the local per-farm
// key-value state.
//
// `FarmStore` is implemented by the local SQLite database (the default) and
// by a PostgREST-style HTTP client for a hosted backend. Per-farm working
// state (interviews, wizard data, diagnosis sheets, plans, reports) always
// lives in the SQLite key-value table behind `StateStore`.

pub mod rest;
pub mod sqlite;
pub mod state;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::config::{Config, StorageBackend};
use crate::error::ValidationError;
use crate::farm::{Farm, FarmUpdate, NewFarm};
use crate::session::{ConsultingSession, NewSession, SessionStatus};

pub use rest::RestStore;
pub use sqlite::SqliteStore;
pub use state::StateStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("backend returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub fn farm_not_found(id: &str) -> Self {
        StoreError::NotFound {
            entity: "farm",
            id: id.to_string(),
        }
    }

    pub fn session_not_found(id: &str) -> Self {
        StoreError::NotFound {
            entity: "consulting session",
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Farm and consulting-session persistence.
#[async_trait]
pub trait FarmStore: Send + Sync {
    /// Short backend name for logs and the status bar.
    fn backend_name(&self) -> &'static str;

    /// All farms, newest first.
    async fn list_farms(&self) -> StoreResult<Vec<Farm>>;

    /// `None` when no farm has this id.
    async fn get_farm(&self, farm_id: &str) -> StoreResult<Option<Farm>>;

    async fn create_farm(&self, input: NewFarm) -> StoreResult<Farm>;

    /// Apply a partial update and return the updated record.
    async fn update_farm(&self, update: FarmUpdate) -> StoreResult<Farm>;

    /// Delete a farm and its sessions.
    async fn delete_farm(&self, farm_id: &str) -> StoreResult<()>;

    /// Sessions of a farm, latest visit first.
    async fn list_sessions(&self, farm_id: &str) -> StoreResult<Vec<ConsultingSession>>;

    async fn create_session(&self, input: NewSession) -> StoreResult<ConsultingSession>;

    async fn update_session_status(
        &self,
        consulting_id: &str,
        status: SessionStatus,
    ) -> StoreResult<ConsultingSession>;

    async fn delete_session(&self, consulting_id: &str) -> StoreResult<()>;
}

/// Build the configured farm store. The SQLite database is shared with the
/// state store, so it is opened once by the caller.
pub fn open_farm_store(
    config: &Config,
    db: Arc<SqliteStore>,
) -> anyhow::Result<Arc<dyn FarmStore>> {
    match config.storage.backend {
        StorageBackend::Sqlite => {
            info!("using local sqlite farm store at {}", config.db_path());
            Ok(db)
        }
        StorageBackend::Rest => {
            let store = RestStore::from_config(config)?;
            info!("using hosted farm store at {}", store.base_url());
            Ok(Arc::new(store))
        }
    }
}
