use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::models::Notification;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Connection accepted
    Ready { connection_id: Uuid },

    /// Topics added to this connection's subscription set
    Subscribed { topics: Vec<String> },

    /// Topics removed from this connection's subscription set
    Unsubscribed { topics: Vec<String> },

    /// A push notification published to a subscribed topic
    Notification {
        message_id: String,
        topic: String,
        notification: Notification,
        data: BTreeMap<String, String>,
    },

    /// A command was rejected
    Error { code: ErrorCode, message: String },
}

impl GatewayEvent {
    /// Returns the topic if this event is scoped to one.
    /// Events that return `None` are connection-level and always delivered.
    pub fn topic(&self) -> Option<&str> {
        match self {
            Self::Notification { topic, .. } => Some(topic),
            _ => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Start receiving notifications for these topics
    Subscribe { topics: Vec<String> },

    /// Stop receiving notifications for these topics
    Unsubscribe { topics: Vec<String> },
}
