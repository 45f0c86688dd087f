//! Per-channel connection state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

/// One live client channel, owned by the hub from connect to disconnect.
pub struct Channel {
    /// Unique channel ID.
    pub id: String,
    /// Send queue to the channel's socket task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this channel was established.
    pub connected_at: Instant,
    /// Liveness flag. Set by transport-level Ping/Pong from the client,
    /// cleared by each probe tick.
    pub is_alive: AtomicBool,
    /// Count of messages dropped because the queue was full or closed.
    pub dropped_messages: AtomicU64,
}

impl Channel {
    /// Create a new channel.
    pub fn new(id: String, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            tx,
            connected_at: Instant::now(),
            is_alive: AtomicBool::new(true),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Enqueue a text message for the client.
    ///
    /// Returns `false` if the queue is full or closed — the caller logs and
    /// moves on, a slow or dying channel never blocks anyone else.
    pub fn send(&self, message: Arc<String>) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total messages dropped for this channel.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Mark the channel alive (pong observed).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
    }

    /// Check and reset the liveness flag for the probe.
    ///
    /// Returns `true` if a pong was observed since the last probe; the flag
    /// is left `false` until the next pong either way.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Channel age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
