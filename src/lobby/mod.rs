//! Lobby - seating, readiness, matchmaking and liveness

pub mod player;
pub mod registry;
pub mod service;

pub use service::{LobbyHandle, LobbyService};
