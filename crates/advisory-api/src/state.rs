use std::sync::Arc;

use advisory_db::Database;
use advisory_gateway::dispatcher::Dispatcher;

use crate::advisories::AdvisoryBroadcastHandler;
use crate::services::SqliteAdvisoryStore;

pub type AppState = Arc<AppStateInner>;

/// Process-wide service clients. Built once in `main` before the router is
/// served, then shared read-only by every request for the life of the process.
pub struct AppStateInner {
    pub advisories: AdvisoryBroadcastHandler,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
}

impl AppStateInner {
    /// Wire the SQLite store and the dispatcher into the advisory handler.
    pub fn init(db: Arc<Database>, dispatcher: Dispatcher, jwt_secret: String) -> AppState {
        let advisories = AdvisoryBroadcastHandler::new(
            Arc::new(SqliteAdvisoryStore::new(db)),
            Arc::new(dispatcher.clone()),
        );

        Arc::new(Self {
            advisories,
            dispatcher,
            jwt_secret,
        })
    }
}
