//! Collaborators the advisory handler talks to: a document store and a push
//! service. The handler only sees these traits; `main` wires in SQLite and the
//! in-process dispatcher.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;
use uuid::Uuid;

use advisory_db::Database;
use advisory_db::models::AdvisoryRow;
use advisory_gateway::dispatcher::Dispatcher;
use advisory_types::error::CallableError;
use advisory_types::models::{Advisory, PushMessage};

#[async_trait]
pub trait AdvisoryStore: Send + Sync {
    /// Persist a new advisory. The store assigns `id` and `created_at`.
    async fn add_advisory(&self, message: String) -> Result<Advisory, CallableError>;
}

#[async_trait]
pub trait PushService: Send + Sync {
    /// Hand a message to the push service. Returns the service's message id.
    async fn send(&self, message: PushMessage) -> Result<String, CallableError>;
}

/// `advisories` collection backed by SQLite.
pub struct SqliteAdvisoryStore {
    db: Arc<Database>,
}

impl SqliteAdvisoryStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AdvisoryStore for SqliteAdvisoryStore {
    async fn add_advisory(&self, message: String) -> Result<Advisory, CallableError> {
        let db = self.db.clone();
        let id = Uuid::new_v4();

        // Run blocking DB insert off the async runtime
        let row = tokio::task::spawn_blocking(move || db.insert_advisory(&id.to_string(), &message))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                CallableError::internal("Advisory write was interrupted.")
            })?
            .map_err(store_error)?;

        advisory_from_row(row)
    }
}

#[async_trait]
impl PushService for Dispatcher {
    async fn send(&self, message: PushMessage) -> Result<String, CallableError> {
        self.publish(message).await
    }
}

/// Busy/locked SQLite is transient; everything else is internal.
fn store_error(err: anyhow::Error) -> CallableError {
    let transient = matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if matches!(e.code, rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
    );

    if transient {
        CallableError::unavailable(err.to_string())
    } else {
        CallableError::internal(err.to_string())
    }
}

fn advisory_from_row(row: AdvisoryRow) -> Result<Advisory, CallableError> {
    let id = row
        .id
        .parse::<Uuid>()
        .map_err(|e| CallableError::internal(format!("Corrupt advisory id '{}': {}", row.id, e)))?;
    let created_at = row
        .created_at
        .parse::<chrono::DateTime<chrono::Utc>>()
        .map_err(|e| {
            CallableError::internal(format!("Corrupt created_at '{}' on advisory '{}': {}", row.created_at, row.id, e))
        })?;

    Ok(Advisory {
        id,
        message: row.message,
        created_at,
    })
}
