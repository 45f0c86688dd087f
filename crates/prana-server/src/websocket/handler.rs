//! Inbound frame handling — keepalive replies and the diagnostic echo.

use serde_json::Value;
use tracing::{debug, warn};

use prana_core::{Envelope, Frame};

/// Handle one inbound text frame and return the reply to enqueue, if any.
///
/// - `PING` → a `PONG` envelope carrying back the client's timestamp
///   (current time if the client sent none)
/// - `PONG` → no reply
/// - any other envelope → a `MESSAGE_RECEIVED` echo of the original value
/// - malformed payloads are logged and dropped, never a fatal error
pub fn handle_frame(text: &str) -> Option<String> {
    let frame = match Frame::parse(text) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "dropping malformed frame");
            return None;
        }
    };
    let reply = match frame {
        Frame::Ping { timestamp } => Envelope::pong(timestamp),
        Frame::Pong => return None,
        Frame::Event(envelope) => {
            debug!(event_type = %envelope.event_type, "echoing unrecognized message");
            // Echo the raw value, not the re-serialized envelope, so fields
            // the envelope doesn't model survive the round trip.
            let original: Value = serde_json::from_str(text).ok()?;
            Envelope::message_received(original)
        }
    };
    match reply.to_json() {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(error = %e, "failed to serialize reply");
            None
        }
    }
}
