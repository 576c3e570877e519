//! WebSocket transport

pub mod handler;
pub mod hub;
pub mod protocol;

pub use hub::{ConnectionHub, Inbound, Subscription, Transport};
