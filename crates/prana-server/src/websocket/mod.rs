//! Channel management, liveness probing, keepalive handling, and fan-out.

pub mod connection;
pub mod handler;
pub mod hub;
pub mod session;
