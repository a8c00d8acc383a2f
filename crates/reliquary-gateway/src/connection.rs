use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use reliquary_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// A client must name the character it listens for within this window.
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle a single WebSocket connection.
///
/// The first text frame must be a `Subscribe` command; after that the
/// connection receives every join-table insert for that character until the
/// client sends `Unsubscribe`, closes, or stops answering pings.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher) {
    let (mut sender, mut receiver) = socket.split();

    let character_id = match wait_for_subscribe(&mut receiver).await {
        Some(id) => id,
        None => {
            warn!("Gateway client never subscribed, closing");
            return;
        }
    };

    let (broadcast_rx, ready) = attach_listener(&dispatcher, character_id);
    if send_event(&mut sender, &ready).await.is_err() {
        return;
    }

    info!("Gateway listener attached for character {}", character_id);
    dispatcher.listener_joined();
    run_connection_loop(sender, receiver, broadcast_rx, character_id).await;
    dispatcher.listener_left();
    info!("Gateway listener detached for character {}", character_id);
}

/// Join the broadcast and build the `Ready` frame for `character_id`.
///
/// The receiver exists before `Ready` is sent, so every event broadcast after
/// the client has seen `Ready` reaches this connection.
pub fn attach_listener(
    dispatcher: &Dispatcher,
    character_id: Uuid,
) -> (broadcast::Receiver<GatewayEvent>, GatewayEvent) {
    (dispatcher.subscribe(), GatewayEvent::Ready { character_id })
}

/// Whether an event belongs on a connection filtered to `character_id`.
pub fn should_forward(event: &GatewayEvent, character_id: Uuid) -> bool {
    event.character_id() == Some(character_id)
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut broadcast_rx: broadcast::Receiver<GatewayEvent>,
    character_id: Uuid,
) {

    // The receive side can re-target the filter with another Subscribe.
    let (filter_tx, filter_rx) = watch::channel(character_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    if !should_forward(&event, *filter_rx.borrow()) {
                        continue;
                    }

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
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(GatewayCommand::Subscribe { character_id }) => {
                        debug!("Gateway listener re-targeted to character {}", character_id);
                        let _ = filter_tx.send(character_id);
                    }
                    Ok(GatewayCommand::Unsubscribe) => break,
                    Err(e) => {
                        let raw: String = text.chars().take(200).collect();
                        warn!("Bad gateway command: {} -- raw: {}", e, raw);
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

async fn wait_for_subscribe(receiver: &mut SplitStream<WebSocket>) -> Option<Uuid> {
    let wait = tokio::time::timeout(SUBSCRIBE_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Ok(GatewayCommand::Subscribe { character_id }) =
                        serde_json::from_str::<GatewayCommand>(&text)
                    {
                        return Some(character_id);
                    }
                }
                Message::Close(_) => return None,
                _ => {}
            }
        }
        None
    });

    wait.await.ok().flatten()
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
