//! The resilient channel client: one driver task per `connect`, owning the
//! socket, the reconnect loop, and dispatch into the handler registry.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use prana_core::envelope::now_rfc3339;
use prana_core::events;

use crate::backoff::{self, reconnect_delay_with};
use crate::state::{ClientState, ConnectionStatus};
use crate::subscriptions::{Registry, Subscription};

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CloseReason {
    /// `close` was called locally.
    User,
    /// The peer closed with a normal close code. Treated as deliberate, so
    /// no reconnect.
    Normal,
    /// The peer closed abnormally.
    Abnormal,
    /// The link broke mid-stream.
    Transport,
}

struct ClientInner {
    url: String,
    state: Mutex<ClientState>,
    registry: Arc<Registry>,
    outgoing: Mutex<Option<mpsc::UnboundedSender<String>>>,
    cancel: Mutex<CancellationToken>,
    /// Bumped by every `connect`. A driver carries the generation it was
    /// spawned with; once a newer driver exists its writes are stale and
    /// must not land.
    generation: AtomicU64,
    user_closed: AtomicBool,
    /// Set once the terminal `CONNECTION_LOST` has been dispatched, so a
    /// retry storm surfaces at most one loss event per `connect`.
    loss_reported: AtomicBool,
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
}

impl ClientInner {
    fn set_state(&self, generation: u64, state: ClientState) {
        let mut current = self.state.lock();
        if self.generation.load(Ordering::SeqCst) == generation {
            *current = state;
        }
    }

    fn set_outgoing(&self, generation: u64, tx: Option<mpsc::UnboundedSender<String>>) {
        let mut outgoing = self.outgoing.lock();
        if self.generation.load(Ordering::SeqCst) == generation {
            *outgoing = tx;
        }
    }
}

/// A WebSocket channel client that reconnects with exponential backoff.
///
/// Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct ChannelClient {
    inner: Arc<ClientInner>,
}

impl ChannelClient {
    /// Create a client for the given `ws://` or `wss://` URL with the
    /// default retry policy (1s base delay, 1.5x growth, 30s cap, 10
    /// attempts).
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_retry_policy(
            url,
            backoff::BASE_DELAY,
            backoff::MAX_DELAY,
            backoff::MAX_RECONNECT_ATTEMPTS,
        )
    }

    /// Create a client with an explicit retry policy.
    pub fn with_retry_policy(
        url: impl Into<String>,
        base_delay: Duration,
        max_delay: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                url: url.into(),
                state: Mutex::new(ClientState::Idle),
                registry: Arc::new(Registry::new()),
                outgoing: Mutex::new(None),
                cancel: Mutex::new(CancellationToken::new()),
                generation: AtomicU64::new(0),
                user_closed: AtomicBool::new(false),
                loss_reported: AtomicBool::new(false),
                base_delay,
                max_delay,
                max_attempts,
            }),
        }
    }

    /// Open the channel. Idempotent: a call while a connection attempt,
    /// open channel, or scheduled reconnect exists is a no-op. Must run
    /// inside a tokio runtime; the driver task is spawned here.
    pub fn connect(&self) {
        let (token, generation) = {
            let mut state = self.inner.state.lock();
            if state.is_active() {
                debug!(url = %self.inner.url, "connect ignored, channel already active");
                return;
            }
            *state = ClientState::Connecting;
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            self.inner.user_closed.store(false, Ordering::SeqCst);
            self.inner.loss_reported.store(false, Ordering::SeqCst);
            let token = CancellationToken::new();
            *self.inner.cancel.lock() = token.clone();
            (token, generation)
        };

        let inner = self.inner.clone();
        drop(tokio::spawn(run_driver(inner, generation, token)));
    }

    /// Close the channel on purpose and suppress reconnection. A pending
    /// reconnect wait is abandoned immediately, and the state leaves the
    /// active set right here, so a `connect` issued straight after this
    /// call opens a fresh channel instead of being swallowed as a
    /// duplicate.
    pub fn close(&self) {
        let token = {
            let mut state = self.inner.state.lock();
            self.inner.user_closed.store(true, Ordering::SeqCst);
            *state = if state.is_active() {
                ClientState::ClosingByUser
            } else {
                ClientState::Closed
            };
            self.inner.cancel.lock().clone()
        };
        token.cancel();
    }

    /// Send a value as a JSON text frame. Returns `true` only when the
    /// channel is open and the frame was queued.
    pub fn send<T: Serialize>(&self, value: &T) -> bool {
        if *self.inner.state.lock() != ClientState::Connected {
            return false;
        }
        let Ok(text) = serde_json::to_string(value) else {
            warn!("outbound value failed to serialize, dropping");
            return false;
        };
        match self.inner.outgoing.lock().as_ref() {
            Some(tx) => tx.send(text).is_ok(),
            None => false,
        }
    }

    /// Send the application keepalive, a `PING` carrying the current time
    /// in epoch milliseconds. The gateway answers with a `PONG` echoing it.
    pub fn send_ping(&self) -> bool {
        let millis = epoch_millis();
        self.send(&json!({ "type": events::PING, "data": { "timestamp": millis } }))
    }

    /// Register a handler for one event type. The handler receives the
    /// envelope's `data` field, or the whole envelope when `data` is absent.
    pub fn subscribe<F>(&self, event_type: &str, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.registry.subscribe(event_type, Arc::new(handler))
    }

    /// Register a handler that receives every inbound envelope.
    pub fn add_message_handler<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.registry.add_message_handler(Arc::new(handler))
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ClientState {
        *self.inner.state.lock()
    }

    /// Coarse status, `"connected"` or `"disconnected"`.
    pub fn connection_status(&self) -> ConnectionStatus {
        ConnectionStatus::from(self.state())
    }
}

fn epoch_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

async fn run_driver(inner: Arc<ClientInner>, generation: u64, cancel: CancellationToken) {
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            inner.set_state(generation, ClientState::Closed);
            return;
        }

        inner.set_state(generation, ClientState::Connecting);
        let attempted = tokio::select! {
            () = cancel.cancelled() => {
                inner.set_state(generation, ClientState::Closed);
                return;
            }
            result = connect_async(&inner.url) => result,
        };
        match attempted {
            Ok((stream, _resp)) => {
                attempt = 0;
                let (tx, rx) = mpsc::unbounded_channel();
                inner.set_outgoing(generation, Some(tx));
                inner.set_state(generation, ClientState::Connected);
                inner.loss_reported.store(false, Ordering::SeqCst);
                info!(url = %inner.url, "channel open");

                // Subscribers learn about the recovery immediately; the
                // gateway's own greeting follows over the wire.
                inner.registry.dispatch(&json!({
                    "type": events::CONNECTION_ESTABLISHED,
                    "timestamp": now_rfc3339(),
                }));

                let reason = run_session(&inner, stream, rx, &cancel).await;
                inner.set_outgoing(generation, None);

                match reason {
                    CloseReason::User => {
                        inner.set_state(generation, ClientState::Closed);
                        info!("channel closed");
                        return;
                    }
                    CloseReason::Normal => {
                        inner.set_state(generation, ClientState::Closed);
                        info!("peer closed the channel normally, not reconnecting");
                        return;
                    }
                    CloseReason::Abnormal | CloseReason::Transport => {
                        inner.set_state(generation, ClientState::DisconnectedUnexpected);
                        warn!(url = %inner.url, ?reason, "channel lost");
                    }
                }
            }
            Err(e) => {
                warn!(url = %inner.url, error = %e, "connection attempt failed");
            }
        }

        if inner.user_closed.load(Ordering::SeqCst) {
            inner.set_state(generation, ClientState::Closed);
            return;
        }

        if attempt >= inner.max_attempts {
            inner.set_state(generation, ClientState::GaveUp);
            warn!(attempts = attempt, "retry budget exhausted, giving up");
            if inner.generation.load(Ordering::SeqCst) == generation
                && !inner.loss_reported.swap(true, Ordering::SeqCst)
            {
                inner.registry.dispatch(&json!({
                    "type": events::CONNECTION_LOST,
                    "timestamp": now_rfc3339(),
                }));
            }
            return;
        }

        let delay = reconnect_delay_with(inner.base_delay, inner.max_delay, attempt);
        attempt += 1;
        inner.set_state(generation, ClientState::ReconnectWait);
        info!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting");

        tokio::select! {
            () = cancel.cancelled() => {
                inner.set_state(generation, ClientState::Closed);
                return;
            }
            () = tokio::time::sleep(delay) => {}
        }
    }
}

async fn run_session<S>(
    inner: &Arc<ClientInner>,
    stream: tokio_tungstenite::WebSocketStream<S>,
    mut outgoing_rx: mpsc::UnboundedReceiver<String>,
    cancel: &CancellationToken,
) -> CloseReason
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut ws_tx, mut ws_rx) = stream.split();

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "closed by user".into(),
                };
                let _ = ws_tx.send(Message::Close(Some(frame))).await;
                return CloseReason::User;
            }

            Some(text) = outgoing_rx.recv() => {
                if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                    warn!(error = %e, "outbound send failed");
                    return CloseReason::Transport;
                }
            }

            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<Value>(text.as_str()) {
                        Ok(envelope) => inner.registry.dispatch(&envelope),
                        Err(e) => warn!(error = %e, "unparseable inbound frame dropped"),
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let normal = frame
                        .as_ref()
                        .is_some_and(|f| f.code == CloseCode::Normal);
                    return if normal {
                        CloseReason::Normal
                    } else {
                        CloseReason::Abnormal
                    };
                }
                // Transport pings are answered by the library as we read.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "read error");
                    return CloseReason::Transport;
                }
                None => return CloseReason::Transport,
            },
        }
    }
}
