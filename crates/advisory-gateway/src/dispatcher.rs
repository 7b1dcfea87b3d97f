use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, broadcast};
use tracing::debug;
use uuid::Uuid;

use advisory_types::error::CallableError;
use advisory_types::events::GatewayEvent;
use advisory_types::models::PushMessage;

use crate::topic;

/// Pre-serialized event fanned out to every connection. Each connection
/// filters on `topic` and `seq` against its own subscriptions.
#[derive(Debug, Clone)]
pub struct BroadcastMessage {
    /// Publish order, starting at 1.
    pub seq: u64,
    pub topic: Option<String>,
    pub json: Arc<str>,
}

/// In-process push service: tracks topic subscriptions per connection and
/// publishes notifications to them.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// All connections receive every broadcast and drop what they are not subscribed to
    broadcast_tx: broadcast::Sender<BroadcastMessage>,

    /// Sequence number of the last published message
    last_seq: AtomicU64,

    /// conn_id -> topic -> `last_seq` when the topic was subscribed.
    /// Publishing holds the read lock across stamping and sending, so a
    /// subscription stamp splits the stream cleanly into before and after.
    subscriptions: RwLock<HashMap<Uuid, HashMap<String, u64>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                last_seq: AtomicU64::new(0),
                subscriptions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Receiver for all published messages.
    pub fn receiver(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Register a new connection with an empty subscription set.
    pub async fn register_connection(&self) -> Uuid {
        let conn_id = Uuid::new_v4();
        self.inner
            .subscriptions
            .write()
            .await
            .insert(conn_id, HashMap::new());
        conn_id
    }

    /// Forget a connection and all of its subscriptions.
    pub async fn unregister_connection(&self, conn_id: Uuid) {
        self.inner.subscriptions.write().await.remove(&conn_id);
    }

    /// Subscribe to `topics`. Only messages published after this call are
    /// delivered; re-subscribing to a topic keeps the original stamp.
    pub async fn subscribe(&self, conn_id: Uuid, topics: &[String]) {
        let mut subs = self.inner.subscriptions.write().await;
        let since = self.inner.last_seq.load(Ordering::Acquire);
        let map = subs.entry(conn_id).or_default();
        for t in topics {
            map.entry(t.clone()).or_insert(since);
        }
    }

    pub async fn unsubscribe(&self, conn_id: Uuid, topics: &[String]) {
        let mut subs = self.inner.subscriptions.write().await;
        if let Some(map) = subs.get_mut(&conn_id) {
            for t in topics {
                map.remove(t);
            }
        }
    }

    pub async fn is_subscribed(&self, conn_id: Uuid, topic: &str) -> bool {
        self.inner
            .subscriptions
            .read()
            .await
            .get(&conn_id)
            .is_some_and(|map| map.contains_key(topic))
    }

    /// Whether the message numbered `seq` on `topic` should reach `conn_id`:
    /// the connection is subscribed and subscribed before it was published.
    pub async fn accepts(&self, conn_id: Uuid, topic: &str, seq: u64) -> bool {
        self.inner
            .subscriptions
            .read()
            .await
            .get(&conn_id)
            .and_then(|map| map.get(topic))
            .is_some_and(|&since| seq > since)
    }

    /// Number of live connections subscribed to `topic`.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .subscriptions
            .read()
            .await
            .values()
            .filter(|map| map.contains_key(topic))
            .count()
    }

    /// Publish a push message to its topic. Returns the assigned message id.
    ///
    /// Success means the message was accepted for fan-out, not that any
    /// subscriber received it; publishing to a topic nobody listens on is fine.
    pub async fn publish(&self, message: PushMessage) -> Result<String, CallableError> {
        topic::validate(&message.topic)?;

        let message_id = format!("msg-{}", Uuid::new_v4());
        let topic = message.topic.clone();
        let event = GatewayEvent::Notification {
            message_id: message_id.clone(),
            topic: message.topic,
            notification: message.notification,
            data: message.data,
        };
        let json = serde_json::to_string(&event)
            .map_err(|e| CallableError::internal(format!("Failed to encode notification: {}", e)))?;

        let subs = self.inner.subscriptions.read().await;
        let seq = self.inner.last_seq.fetch_add(1, Ordering::AcqRel) + 1;
        let subscribers = subs.values().filter(|map| map.contains_key(&topic)).count();
        // No receivers is not an error: nobody is connected right now
        let _ = self.inner.broadcast_tx.send(BroadcastMessage {
            seq,
            topic: Some(topic.clone()),
            json: json.into(),
        });
        drop(subs);

        debug!("Published {} to topic '{}' ({} subscribers)", message_id, topic, subscribers);
        Ok(message_id)
    }
}
