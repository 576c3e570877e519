//! Lobby-side player record

use crate::game::{FighterStats, MatchId};
use crate::ws::protocol::ConnectionId;

/// A seated player, bound to one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub name: String,
    pub connection: ConnectionId,
    pub ready: bool,
    pub stats: FighterStats,
    /// Match this player is fighting in, if any
    pub match_id: Option<MatchId>,
}

impl Player {
    pub fn new(name: String, connection: ConnectionId) -> Self {
        Self {
            name,
            connection,
            ready: false,
            stats: FighterStats::default(),
            match_id: None,
        }
    }

    /// Flip the ready flag and return the new value
    pub fn toggle_ready(&mut self) -> bool {
        self.ready = !self.ready;
        self.ready
    }

    pub fn is_matched(&self) -> bool {
        self.match_id.is_some()
    }

    /// Ready and waiting for an opponent
    pub fn is_available(&self) -> bool {
        self.ready && !self.is_matched()
    }
}
