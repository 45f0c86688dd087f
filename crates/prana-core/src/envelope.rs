//! The `{type, data, timestamp}` wire message and inbound frame parsing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events;

/// Errors when reading a wire frame.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The frame was not valid JSON (or not an object the envelope accepts).
    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),
}

/// One wire message. `type` always drives dispatch on the receiving side;
/// `timestamp` is informational only and carries no ordering guarantee.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    /// Event type (e.g. `PRODUCT_CREATED`). Opaque to hub and client.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// ISO-8601 timestamp, stamped at construction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Human-readable text (only on `CONNECTION_ESTABLISHED`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// The wire timestamp format: UTC RFC 3339 with millisecond precision and
/// a `Z` suffix.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

impl Envelope {
    /// Build a domain event envelope with the current UTC timestamp.
    ///
    /// `PRODUCT_DELETED` gets special framing: when the payload carries a
    /// `productId`, `data` is reduced to exactly `{productId}` so deletion
    /// notifications never require a full entity body.
    pub fn event(event_type: impl Into<String>, payload: Value) -> Self {
        let event_type = event_type.into();
        let data = if event_type == events::PRODUCT_DELETED {
            match payload.get("productId") {
                Some(id) => serde_json::json!({ "productId": id }),
                None => payload,
            }
        } else {
            payload
        };
        Self {
            event_type,
            data: Some(data),
            timestamp: Some(now_rfc3339()),
            message: None,
        }
    }

    /// Greeting sent to a channel right after it connects.
    pub fn connection_established() -> Self {
        Self {
            event_type: events::CONNECTION_ESTABLISHED.into(),
            data: None,
            timestamp: Some(now_rfc3339()),
            message: Some("Connected to Prana realtime channel".into()),
        }
    }

    /// Keepalive reply. Echoes the client's supplied timestamp value, or the
    /// current epoch milliseconds when the client sent none.
    pub fn pong(client_timestamp: Option<Value>) -> Self {
        let ts = client_timestamp
            .unwrap_or_else(|| Value::from(chrono::Utc::now().timestamp_millis()));
        Self {
            event_type: events::PONG.into(),
            data: Some(serde_json::json!({ "timestamp": ts })),
            timestamp: Some(now_rfc3339()),
            message: None,
        }
    }

    /// Diagnostic echo of an inbound message the hub does not recognize.
    pub fn message_received(original: Value) -> Self {
        Self {
            event_type: events::MESSAGE_RECEIVED.into(),
            data: Some(original),
            timestamp: Some(now_rfc3339()),
            message: None,
        }
    }

    /// Serialize to the JSON text written to the transport.
    pub fn to_json(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Classification of an inbound text frame.
///
/// Keepalive envelopes get their own variants; everything else lands in the
/// catch-all [`Frame::Event`] so new domain event types never require parser
/// changes.
#[derive(Clone, Debug)]
pub enum Frame {
    /// Application-level keepalive request; carries the sender's timestamp.
    Ping {
        /// Timestamp value supplied under `data.timestamp`, if any.
        timestamp: Option<Value>,
    },
    /// Application-level keepalive reply. No action required.
    Pong,
    /// Any other envelope.
    Event(Envelope),
}

impl Frame {
    /// Parse a text frame. Malformed JSON is a recoverable [`WireError`];
    /// callers log and drop, they never close the channel over it.
    pub fn parse(text: &str) -> Result<Self, WireError> {
        let envelope: Envelope = serde_json::from_str(text)?;
        match envelope.event_type.as_str() {
            t if t == events::PING => Ok(Self::Ping {
                timestamp: envelope
                    .data
                    .as_ref()
                    .and_then(|d| d.get("timestamp"))
                    .cloned(),
            }),
            t if t == events::PONG => Ok(Self::Pong),
            _ => Ok(Self::Event(envelope)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_stamps_timestamp() {
        let env = Envelope::event("PRODUCT_CREATED", json!({"id": "p1"}));
        assert_eq!(env.event_type, "PRODUCT_CREATED");
        assert!(env.timestamp.is_some());
        assert_eq!(env.data.unwrap()["id"], "p1");
    }

    #[test]
    fn serialized_type_field_is_type() {
        let env = Envelope::event("ORDER_CREATED", json!({"orderId": "o1"}));
        let parsed: Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        assert_eq!(parsed["type"], "ORDER_CREATED");
        assert_eq!(parsed["data"]["orderId"], "o1");
        assert!(parsed["timestamp"].is_string());
        assert!(parsed.get("message").is_none());
    }

    #[test]
    fn timestamp_is_rfc3339_millis_utc() {
        let env = Envelope::event("PRODUCT_UPDATED", json!({}));
        let ts = env.timestamp.unwrap();
        assert!(ts.ends_with('Z'));
        let parsed = chrono::DateTime::parse_from_rfc3339(&ts);
        assert!(parsed.is_ok());
    }

    #[test]
    fn product_deleted_reduces_to_product_id() {
        let env = Envelope::event(
            "PRODUCT_DELETED",
            json!({"productId": "abc123", "name": "Mask", "price": 499}),
        );
        assert_eq!(env.data.unwrap(), json!({"productId": "abc123"}));
    }

    #[test]
    fn product_deleted_without_id_keeps_payload() {
        let env = Envelope::event("PRODUCT_DELETED", json!({"slug": "mask-n95"}));
        assert_eq!(env.data.unwrap(), json!({"slug": "mask-n95"}));
    }

    #[test]
    fn other_events_keep_full_payload() {
        let env = Envelope::event("PRODUCT_UPDATED", json!({"productId": "p1", "name": "Mask"}));
        assert_eq!(env.data.unwrap(), json!({"productId": "p1", "name": "Mask"}));
    }

    #[test]
    fn connection_established_has_message() {
        let env = Envelope::connection_established();
        assert_eq!(env.event_type, "CONNECTION_ESTABLISHED");
        assert!(env.message.is_some());
        assert!(env.timestamp.is_some());
    }

    #[test]
    fn pong_echoes_client_timestamp() {
        let env = Envelope::pong(Some(json!(1234)));
        assert_eq!(env.data.unwrap()["timestamp"], 1234);
    }

    #[test]
    fn pong_without_timestamp_uses_now() {
        let env = Envelope::pong(None);
        assert!(env.data.unwrap()["timestamp"].is_number());
    }

    #[test]
    fn message_received_carries_original() {
        let env = Envelope::message_received(json!({"hello": "world"}));
        assert_eq!(env.event_type, "MESSAGE_RECEIVED");
        assert_eq!(env.data.unwrap(), json!({"hello": "world"}));
    }

    #[test]
    fn parse_ping_frame() {
        let frame = Frame::parse(r#"{"type":"PING","data":{"timestamp":1234}}"#).unwrap();
        match frame {
            Frame::Ping { timestamp } => assert_eq!(timestamp, Some(json!(1234))),
            other => panic!("expected Ping, got {other:?}"),
        }
    }

    #[test]
    fn parse_ping_without_timestamp() {
        let frame = Frame::parse(r#"{"type":"PING"}"#).unwrap();
        match frame {
            Frame::Ping { timestamp } => assert!(timestamp.is_none()),
            other => panic!("expected Ping, got {other:?}"),
        }
    }

    #[test]
    fn parse_pong_frame() {
        let frame = Frame::parse(r#"{"type":"PONG","data":{"timestamp":1}}"#).unwrap();
        assert!(matches!(frame, Frame::Pong));
    }

    #[test]
    fn parse_unknown_type_is_event() {
        let frame = Frame::parse(r#"{"type":"CART_CHECKED_OUT","data":{"items":3}}"#).unwrap();
        match frame {
            Frame::Event(env) => {
                assert_eq!(env.event_type, "CART_CHECKED_OUT");
                assert_eq!(env.data.unwrap()["items"], 3);
            }
            other => panic!("expected Event, got {other:?}"),
        }
    }

    #[test]
    fn parse_malformed_is_error() {
        assert!(Frame::parse("not json at all").is_err());
        assert!(Frame::parse("[1,2,3]").is_err());
        assert!(Frame::parse("").is_err());
    }

    #[test]
    fn parse_missing_type_is_error() {
        assert!(Frame::parse(r#"{"data":{"x":1}}"#).is_err());
    }

    #[test]
    fn envelope_roundtrip() {
        let env = Envelope::event("ORDER_UPDATED", json!({"orderId": "o7", "status": "shipped"}));
        let back: Envelope = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        assert_eq!(back.event_type, "ORDER_UPDATED");
        assert_eq!(back.data.unwrap()["status"], "shipped");
    }
}
