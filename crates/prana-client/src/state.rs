//! Connection state machine for the channel client.

use std::fmt;

/// Lifecycle state of a [`crate::ChannelClient`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
    /// Never connected, or fully reset.
    Idle,
    /// A connection attempt is in flight.
    Connecting,
    /// The channel is open and usable.
    Connected,
    /// `close` was called and the driver is tearing the transport down.
    ClosingByUser,
    /// The link dropped unexpectedly; recovery has not been scheduled yet.
    DisconnectedUnexpected,
    /// A reconnect is scheduled.
    ReconnectWait,
    /// The retry budget is exhausted; no further attempts will be made
    /// until `connect` is called again.
    GaveUp,
    /// Closed on purpose; reconnection is suppressed.
    Closed,
}

impl ClientState {
    /// Whether a driver owns this client right now. `connect` is a no-op in
    /// an active state and spawns a fresh driver in any other, so
    /// `ClosingByUser` is deliberately inactive: a `close` immediately
    /// followed by `connect` must yield a new connection.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ClientState::Connecting
                | ClientState::Connected
                | ClientState::DisconnectedUnexpected
                | ClientState::ReconnectWait
        )
    }
}

/// Coarse status exposed to callers, matching what UI code keys off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// The channel is open.
    Connected,
    /// Anything else.
    Disconnected,
}

impl ConnectionStatus {
    /// The string form surfaced to callers.
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ClientState> for ConnectionStatus {
    fn from(state: ClientState) -> Self {
        if state == ClientState::Connected {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }
}
