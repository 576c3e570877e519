//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::lobby::{LobbyHandle, LobbyService};
use crate::util::rate_limit::InputRateLimiter;
use crate::ws::ConnectionHub;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<ConnectionHub>,
    pub lobby: LobbyHandle,
    pub input_limiter: Arc<InputRateLimiter>,
}

impl AppState {
    /// Build the state and the lobby service that still has to be spawned
    pub fn new(config: Config) -> (Self, LobbyService) {
        // Initialize transport
        let hub = Arc::new(ConnectionHub::new());

        // Initialize lobby; it subscribes to the hub here
        let (service, lobby) = LobbyService::new(config.lobby, hub.clone());

        let state = Self {
            hub,
            lobby,
            input_limiter: Arc::new(InputRateLimiter::default()),
        };
        (state, service)
    }
}
