//! Match simulation modules

pub mod combat;
pub mod r#match;
pub mod words;

pub use combat::Referee;
pub use r#match::{GameMatch, MatchCommand, MatchHandle, MatchId, Participant};
pub use words::WordList;

use serde::{Deserialize, Serialize};

pub const MAX_HEALTH: u32 = 100;
pub const MAX_ENERGY: u32 = 100;

/// Health and energy of one boxer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FighterStats {
    pub health: u32,
    pub energy: u32,
}

impl FighterStats {
    /// Clamp into the valid range
    pub fn clamped(self) -> Self {
        Self {
            health: self.health.min(MAX_HEALTH),
            energy: self.energy.min(MAX_ENERGY),
        }
    }
}

impl Default for FighterStats {
    fn default() -> Self {
        Self {
            health: MAX_HEALTH,
            energy: MAX_ENERGY,
        }
    }
}
