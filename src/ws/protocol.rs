//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Transport-assigned identity of a live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Moves a boxer can throw, plus the animation-only `Dead` state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveType {
    Jab,
    Block,
    Cross,
    Counter,
    Hook,
    Uppercut,
    /// Knocked out; never accepted as player input
    Dead,
}

impl MoveType {
    /// Moves a player may type
    pub const PLAYABLE: [MoveType; 6] = [
        MoveType::Jab,
        MoveType::Block,
        MoveType::Cross,
        MoveType::Counter,
        MoveType::Hook,
        MoveType::Uppercut,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MoveType::Jab => "jab",
            MoveType::Block => "block",
            MoveType::Cross => "cross",
            MoveType::Counter => "counter",
            MoveType::Hook => "hook",
            MoveType::Uppercut => "uppercut",
            MoveType::Dead => "dead",
        }
    }

    /// Parse a typed move command, case-insensitively
    pub fn parse_command(text: &str) -> Option<MoveType> {
        let text = text.trim();
        Self::PLAYABLE
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(text))
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Ask to be seated in the lobby
    Join { name: String },

    /// Toggle the ready flag
    Ready,

    /// Lobby chat
    Message { text: String },

    /// Typed input during a match: the shown word, or a move name
    WordSubmission { text: String },

    /// Move name typed directly
    Move { name: String },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Outcome of a join attempt, sent to every connection
    JoinResponse { name: String, accepted: bool },

    /// Match found
    StartResponse { opponent_name: String },

    /// Word challenge result
    WordSubmissionResponse { success: bool, new_word: String },

    /// Knockout flag changed
    KoResponse { name: String, enabled: bool },

    /// Stat snapshot for the receiving player
    StatResponse {
        name: String,
        health: u32,
        energy: u32,
    },

    /// Animation to play for a boxer
    AnimationResponse {
        name: String,
        #[serde(rename = "move")]
        move_type: MoveType,
    },

    /// Chat or status line
    MessageResponse { sender_name: String, text: String },

    /// Player was dropped from the lobby
    PlayerLeft { name: String },

    /// Match is over
    MatchEnd { winner: Option<String> },
}

/// Move request handed to combat resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub player_name: String,
    #[serde(rename = "move")]
    pub move_type: MoveType,
}
