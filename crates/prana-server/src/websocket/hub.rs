//! The channel set and fan-out broadcast.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use prana_core::Envelope;

use super::connection::Channel;
use crate::metrics::{WS_BROADCASTS_TOTAL, WS_BROADCAST_DROPS_TOTAL};

/// Owns the set of currently connected channels and fans events out to all
/// of them. Constructed once at startup and passed by `Arc` handle to every
/// collaborator that needs to call [`Hub::broadcast`].
pub struct Hub {
    /// Open channels indexed by channel ID.
    channels: RwLock<HashMap<String, Arc<Channel>>>,
}

impl Hub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Add a channel on connect.
    pub async fn add(&self, channel: Arc<Channel>) {
        let mut channels = self.channels.write().await;
        let _ = channels.insert(channel.id.clone(), channel);
    }

    /// Remove a channel on disconnect. A removed channel receives no
    /// broadcasts issued after removal; an in-flight broadcast that still
    /// sees it will at worst no-op on the closed queue.
    pub async fn remove(&self, channel_id: &str) {
        let mut channels = self.channels.write().await;
        let _ = channels.remove(channel_id);
    }

    /// Fan a domain event out to every open channel.
    ///
    /// Builds one [`Envelope`], serializes it once, and enqueues the same
    /// bytes on every channel. Per-channel failures are logged and skipped —
    /// one dying channel never blocks delivery to the rest. Fire-and-forget:
    /// there is no return value and no delivery guarantee. With zero open
    /// channels this is a no-op.
    pub async fn broadcast(&self, payload: Value, event_type: &str) {
        let envelope = Envelope::event(event_type, payload);
        let json = match envelope.to_json() {
            Ok(j) => j,
            Err(e) => {
                warn!(event_type, error = %e, "failed to serialize broadcast envelope");
                return;
            }
        };
        let channels = self.channels.read().await;
        if channels.is_empty() {
            debug!(event_type, "broadcast with no open channels, dropping");
            return;
        }
        counter!(WS_BROADCASTS_TOTAL).increment(1);
        debug!(event_type, recipients = channels.len(), "broadcasting event");
        let message = Arc::new(json);
        for channel in channels.values() {
            if !channel.send(message.clone()) {
                counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                warn!(channel_id = %channel.id, event_type, "failed to enqueue broadcast");
            }
        }
    }

    /// Number of open channels.
    pub async fn connection_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
