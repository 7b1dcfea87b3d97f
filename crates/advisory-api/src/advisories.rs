use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
};
use tracing::{error, info, warn};

use advisory_types::api::{CallableRequest, CallableResponse, SendAdvisoryRequest, SendAdvisoryResponse};
use advisory_types::error::CallableError;
use advisory_types::models::{Notification, PushMessage};

use crate::error::ApiError;
use crate::middleware::CallerContext;
use crate::services::{AdvisoryStore, PushService};
use crate::state::AppState;

/// Topic every advisory is broadcast to.
pub const ADVISORY_TOPIC: &str = "advisories";
pub const NOTIFICATION_TITLE: &str = "Farming Advisory";
/// Value of the `type` entry in the notification's data map.
pub const ADVISORY_DATA_TYPE: &str = "advisory";
pub const EMPTY_MESSAGE: &str = "Message is empty.";

/// Trim the requested message; absent, empty and whitespace-only all fail
/// with `invalid-argument`.
pub fn validate_message(req: &SendAdvisoryRequest) -> Result<String, CallableError> {
    let message = req.message.as_deref().unwrap_or_default().trim_matches(is_trimmable);
    if message.is_empty() {
        return Err(CallableError::invalid_argument(EMPTY_MESSAGE));
    }
    Ok(message.to_string())
}

/// Unicode whitespace plus U+FEFF (byte-order mark), minus U+0085 (NEL),
/// which clients' trim leaves in place.
fn is_trimmable(c: char) -> bool {
    (c.is_whitespace() && c != '\u{85}') || c == '\u{FEFF}'
}

/// Validates an advisory, stores it, then broadcasts it to the advisories topic.
///
/// The store write always finishes before the broadcast starts. A failed
/// broadcast does not undo the write: the record stays and the caller gets
/// the push service's error.
pub struct AdvisoryBroadcastHandler {
    store: Arc<dyn AdvisoryStore>,
    push: Arc<dyn PushService>,
}

impl AdvisoryBroadcastHandler {
    pub fn new(store: Arc<dyn AdvisoryStore>, push: Arc<dyn PushService>) -> Self {
        Self { store, push }
    }

    pub async fn invoke(
        &self,
        req: SendAdvisoryRequest,
        caller: &CallerContext,
    ) -> Result<SendAdvisoryResponse, CallableError> {
        let message = validate_message(&req).inspect_err(|e| {
            warn!("Rejected advisory from {:?}: {}", caller.uid(), e);
        })?;

        let advisory = self.store.add_advisory(message).await.inspect_err(|e| {
            error!("Advisory write failed: {}", e);
        })?;
        info!("Advisory {} stored (caller {:?})", advisory.id, caller.uid());

        let push = PushMessage {
            topic: ADVISORY_TOPIC.to_string(),
            notification: Notification {
                title: NOTIFICATION_TITLE.to_string(),
                body: advisory.message,
            },
            data: BTreeMap::from([("type".to_string(), ADVISORY_DATA_TYPE.to_string())]),
        };
        let message_id = self.push.send(push).await.inspect_err(|e| {
            error!("Advisory {} stored but broadcast failed: {}", advisory.id, e);
        })?;
        info!("Advisory {} broadcast as {}", advisory.id, message_id);

        Ok(SendAdvisoryResponse::ok())
    }
}

/// POST /sendAdvisory
pub async fn send_advisory(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    payload: Result<Json<CallableRequest<SendAdvisoryRequest>>, JsonRejection>,
) -> Result<Json<CallableResponse<SendAdvisoryResponse>>, ApiError> {
    let Json(req) = payload.map_err(|e| {
        warn!("Malformed callable request: {}", e);
        CallableError::invalid_argument("Bad Request")
    })?;

    let result = state.advisories.invoke(req.data, &caller).await?;
    Ok(Json(CallableResponse::new(result)))
}
