//! # prana-client
//!
//! The channel-client side of the Prana real-time sync layer: a resilient
//! WebSocket client that keeps a channel open against the gateway, retries
//! with exponential backoff when the link drops, answers the application
//! keepalive, and dispatches inbound envelopes to registered handlers.
//!
//! ```ignore
//! let client = ChannelClient::new("ws://127.0.0.1:8080/ws");
//! let _sub = client.subscribe("PRODUCT_CREATED", |data| {
//!     println!("new product: {data}");
//! });
//! client.connect();
//! ```

#![deny(unsafe_code)]

pub mod backoff;
pub mod client;
pub mod state;
pub mod subscriptions;

pub use client::ChannelClient;
pub use state::{ClientState, ConnectionStatus};
pub use subscriptions::Subscription;
