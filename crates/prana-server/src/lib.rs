//! # prana-server
//!
//! The Broadcast Hub side of the Prana real-time sync layer.
//!
//! - `/ws` WebSocket gateway: channel registration, liveness probing,
//!   keepalive handling, fan-out delivery
//! - [`websocket::hub::Hub`]: the channel set and the `broadcast` primitive
//!   called by product/order mutation handlers after a successful write
//! - `/internal/notify`: HTTP entry point for out-of-process collaborators
//! - `/health`, `/metrics`: operational endpoints
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use server::PranaServer;
pub use websocket::hub::Hub;
