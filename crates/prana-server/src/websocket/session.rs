//! WebSocket session lifecycle — one task per channel, from upgrade
//! through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use prana_core::Envelope;

use super::connection::Channel;
use super::handler::handle_frame;
use super::hub::Hub;
use crate::metrics::{
    WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_CONNECTION_DURATION_SECONDS,
    WS_DISCONNECTIONS_TOTAL,
};

/// Run a WebSocket session for a connected channel.
///
/// 1. Registers the channel with the hub
/// 2. Sends a `CONNECTION_ESTABLISHED` envelope to this channel only
/// 3. Forwards queued broadcasts and replies to the socket
/// 4. Probes liveness every `probe_interval`: a Ping frame goes out while
///    the alive flag is set, the channel is terminated once the flag stays
///    clear across a whole cycle
/// 5. Removes the channel from the hub on any exit path
///
/// All handling for one channel runs in this single task, so probe ticks,
/// inbound frames, and outbound sends are serialized per connection.
#[instrument(skip_all, fields(channel_id = %channel_id))]
pub async fn run_ws_session(
    socket: WebSocket,
    channel_id: String,
    hub: Arc<Hub>,
    probe_interval: Duration,
    buffer: usize,
    cancel: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(buffer);
    let channel = Arc::new(Channel::new(channel_id.clone(), send_tx));

    info!("channel connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    hub.add(channel.clone()).await;

    if let Ok(json) = Envelope::connection_established().to_json() {
        let _ = ws_tx.send(Message::Text(json.into())).await;
    }

    let mut probe = tokio::time::interval(probe_interval);
    // The first tick completes immediately; skip it so the client gets a
    // full cycle before the first probe.
    let _ = probe.tick().await;

    loop {
        tokio::select! {
            queued = send_rx.recv() => {
                match queued {
                    Some(text) => {
                        if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                            debug!("socket write failed, closing channel");
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = probe.tick() => {
                if channel.check_alive() {
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                } else {
                    warn!("no pong since last probe, terminating channel");
                    break;
                }
            }
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_frame(text.as_str()) {
                            if !channel.send(Arc::new(reply)) {
                                debug!("failed to enqueue reply (queue full or closed)");
                            }
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        if data.is_empty() {
                            // Zero-length binary frames are protocol-level
                            // pings; nothing to do.
                            continue;
                        }
                        match std::str::from_utf8(&data) {
                            Ok(text) => {
                                if let Some(reply) = handle_frame(text) {
                                    if !channel.send(Arc::new(reply)) {
                                        debug!("failed to enqueue reply (queue full or closed)");
                                    }
                                }
                            }
                            Err(_) => {
                                info!(len = data.len(), "ignoring non-UTF8 binary frame");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        channel.mark_alive();
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("client sent close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "socket error, closing channel");
                        break;
                    }
                    None => break,
                }
            }
            () = cancel.cancelled() => {
                debug!("server shutting down, closing channel");
                break;
            }
        }
    }

    hub.remove(&channel_id).await;
    let age = channel.age();
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(age.as_secs_f64());
    info!(
        age_secs = age.as_secs(),
        dropped = channel.drop_count(),
        "channel disconnected"
    );
}

#[cfg(test)]
mod tests {
    // Session behavior over a live socket (greeting delivery, probe
    // termination, keepalive round trips) is covered by the end-to-end
    // tests in tests/integration.rs; an axum `WebSocket` cannot be
    // constructed directly here.

    use prana_core::Envelope;

    #[test]
    fn greeting_envelope_shape() {
        let json = Envelope::connection_established().to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["type"], "CONNECTION_ESTABLISHED");
        assert!(parsed["message"].is_string());
        assert!(parsed["timestamp"].is_string());
    }
}
