//! # prana-core
//!
//! Wire protocol shared by the broadcast hub and the channel client:
//!
//! - [`Envelope`]: the `{type, data, timestamp}` JSON message
//! - [`Frame`]: classification of inbound text frames (keepalive vs event)
//! - [`events`]: well-known event name constants

#![deny(unsafe_code)]

pub mod envelope;
pub mod events;

pub use envelope::{Envelope, Frame, WireError};
