//! Well-known event type names.
//!
//! The hub and client treat the type string opaquely; these constants exist
//! so collaborators don't scatter string literals. Domain handlers may emit
//! any other type string without touching this crate.

/// Sent by the hub to a newly connected channel.
pub const CONNECTION_ESTABLISHED: &str = "CONNECTION_ESTABLISHED";
/// Application-level keepalive request (either direction).
pub const PING: &str = "PING";
/// Application-level keepalive reply.
pub const PONG: &str = "PONG";
/// Diagnostic echo of an unrecognized inbound message.
pub const MESSAGE_RECEIVED: &str = "MESSAGE_RECEIVED";
/// Synthetic client-side event emitted when reconnection is exhausted.
pub const CONNECTION_LOST: &str = "CONNECTION_LOST";

/// A product was added to the catalog.
pub const PRODUCT_CREATED: &str = "PRODUCT_CREATED";
/// A product was modified.
pub const PRODUCT_UPDATED: &str = "PRODUCT_UPDATED";
/// A product was removed; carries `{productId}` only.
pub const PRODUCT_DELETED: &str = "PRODUCT_DELETED";
/// A checkout completed and an order was recorded.
pub const ORDER_CREATED: &str = "ORDER_CREATED";
/// An order changed status (payment verified, shipped, ...).
pub const ORDER_UPDATED: &str = "ORDER_UPDATED";
/// A contact-form submission arrived.
pub const CONTACT_CREATED: &str = "CONTACT_CREATED";
