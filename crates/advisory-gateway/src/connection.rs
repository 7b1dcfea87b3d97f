use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use advisory_types::error::ErrorCode;
use advisory_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;
use crate::topic;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Serve one subscriber connection until it closes or stops answering pings.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher) {
    let (mut sender, mut receiver) = socket.split();

    let conn_id = dispatcher.register_connection().await;
    info!("Subscriber {} connected to gateway", conn_id);

    // Take the broadcast receiver before Ready so nothing published after the
    // client's first Subscribe ack can be missed. Anything already queued when
    // a topic is subscribed is filtered out by its sequence number.
    let mut broadcast_rx = dispatcher.receiver();

    if send_event(&mut sender, &GatewayEvent::Ready { connection_id: conn_id })
        .await
        .is_err()
    {
        dispatcher.unregister_connection(conn_id).await;
        return;
    }

    // Replies to commands travel through the send task so writes stay on one half
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<GatewayEvent>();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let send_dispatcher = dispatcher.clone();
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let msg = match result {
                        Ok(msg) => msg,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Subscriber {} lagged by {} messages", conn_id, n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    if let Some(topic) = msg.topic.as_deref() {
                        if !send_dispatcher.accepts(conn_id, topic, msg.seq).await {
                            continue;
                        }
                    }

                    if sender.send(Message::Text(msg.json.to_string().into())).await.is_err() {
                        break;
                    }
                }
                reply = reply_rx.recv() => {
                    let Some(event) = reply else { break };
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping subscriber {}", missed_heartbeats, conn_id);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::<u8>::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let recv_dispatcher = dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let reply = match serde_json::from_str::<GatewayCommand>(&text) {
                        Ok(cmd) => handle_command(&recv_dispatcher, conn_id, cmd).await,
                        Err(e) => {
                            warn!(
                                "Subscriber {} bad command: {} -- raw: {}",
                                conn_id,
                                e,
                                text.chars().take(200).collect::<String>()
                            );
                            GatewayEvent::Error {
                                code: ErrorCode::InvalidArgument,
                                message: format!("Unrecognized command: {}", e),
                            }
                        }
                    };
                    if reply_tx.send(reply).is_err() {
                        break;
                    }
                }
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unregister_connection(conn_id).await;
    info!("Subscriber {} disconnected from gateway", conn_id);
}

/// Apply a subscriber command and build the event to send back.
pub async fn handle_command(dispatcher: &Dispatcher, conn_id: Uuid, cmd: GatewayCommand) -> GatewayEvent {
    match cmd {
        GatewayCommand::Subscribe { topics } => {
            if let Err(e) = topic::validate_all(&topics) {
                return GatewayEvent::Error { code: e.code, message: e.message };
            }
            dispatcher.subscribe(conn_id, &topics).await;
            info!("Subscriber {} subscribed to {:?}", conn_id, topics);
            GatewayEvent::Subscribed { topics }
        }

        GatewayCommand::Unsubscribe { topics } => {
            if let Err(e) = topic::validate_all(&topics) {
                return GatewayEvent::Error { code: e.code, message: e.message };
            }
            dispatcher.unsubscribe(conn_id, &topics).await;
            info!("Subscriber {} unsubscribed from {:?}", conn_id, topics);
            GatewayEvent::Unsubscribed { topics }
        }
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode gateway event: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await
}
