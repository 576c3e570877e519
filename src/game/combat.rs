//! Combat resolution - move costs, damage, guards, knockouts

use std::collections::HashMap;

use crate::ws::protocol::{MoveRequest, MoveType};

use super::r#match::Participant;
use super::{FighterStats, MAX_ENERGY};

/// Feedback from combat resolution, applied by the match
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CombatOutcome {
    /// New stat snapshot for a boxer
    Stats { name: String, stats: FighterStats },
    /// Knockout flag change
    Knockout { name: String, enabled: bool },
    /// Animation to show for a boxer
    Animation { name: String, move_type: MoveType },
    /// The rules decided the bout
    Finish { winner: Option<String> },
}

/// Computes the effect of an accepted move
pub trait CombatResolver: Send {
    fn resolve(
        &mut self,
        request: &MoveRequest,
        attacker: &Participant,
        opponent: &Participant,
    ) -> Vec<CombatOutcome>;
}

/// Damage and energy cost per move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveStats {
    pub damage: u32,
    pub energy_cost: u32,
}

impl MoveStats {
    pub fn for_move(move_type: MoveType) -> Self {
        let (damage, energy_cost) = match move_type {
            MoveType::Jab => (5, 5),
            MoveType::Cross => (10, 10),
            MoveType::Hook => (15, 15),
            MoveType::Uppercut => (25, 25),
            MoveType::Block => (0, 5),
            MoveType::Counter => (0, 10),
            MoveType::Dead => (0, 0),
        };
        Self {
            damage,
            energy_cost,
        }
    }
}

/// Energy recovered by a boxer too tired to throw the requested move
pub const REST_ENERGY: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Guard {
    /// Next incoming hit deals a quarter
    Block,
    /// Next incoming hit reflects half back
    Counter,
}

/// Default rules: a single knockout decides the bout
#[derive(Debug, Default)]
pub struct Referee {
    guards: HashMap<String, Guard>,
}

impl Referee {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CombatResolver for Referee {
    fn resolve(
        &mut self,
        request: &MoveRequest,
        attacker: &Participant,
        opponent: &Participant,
    ) -> Vec<CombatOutcome> {
        let move_stats = MoveStats::for_move(request.move_type);
        let mut attacker_stats = attacker.stats;
        let mut opponent_stats = opponent.stats;
        let mut outcomes = Vec::new();

        if attacker_stats.energy < move_stats.energy_cost {
            attacker_stats.energy = (attacker_stats.energy + REST_ENERGY).min(MAX_ENERGY);
            outcomes.push(CombatOutcome::Stats {
                name: attacker.name.clone(),
                stats: attacker_stats,
            });
            return outcomes;
        }

        attacker_stats.energy -= move_stats.energy_cost;
        outcomes.push(CombatOutcome::Animation {
            name: attacker.name.clone(),
            move_type: request.move_type,
        });

        match request.move_type {
            MoveType::Block => {
                self.guards.insert(attacker.name.clone(), Guard::Block);
            }
            MoveType::Counter => {
                self.guards.insert(attacker.name.clone(), Guard::Counter);
            }
            MoveType::Dead => {}
            _ => {
                // Punching drops your own guard
                self.guards.remove(&attacker.name);

                match self.guards.remove(&opponent.name) {
                    Some(Guard::Block) => {
                        opponent_stats.health =
                            opponent_stats.health.saturating_sub(move_stats.damage / 4);
                    }
                    Some(Guard::Counter) => {
                        attacker_stats.health =
                            attacker_stats.health.saturating_sub(move_stats.damage / 2);
                        outcomes.push(CombatOutcome::Animation {
                            name: opponent.name.clone(),
                            move_type: MoveType::Counter,
                        });
                    }
                    None => {
                        opponent_stats.health =
                            opponent_stats.health.saturating_sub(move_stats.damage);
                    }
                }
            }
        }

        outcomes.push(CombatOutcome::Stats {
            name: attacker.name.clone(),
            stats: attacker_stats,
        });
        outcomes.push(CombatOutcome::Stats {
            name: opponent.name.clone(),
            stats: opponent_stats,
        });

        if opponent_stats.health == 0 {
            outcomes.push(CombatOutcome::Knockout {
                name: opponent.name.clone(),
                enabled: true,
            });
            outcomes.push(CombatOutcome::Finish {
                winner: Some(attacker.name.clone()),
            });
        } else if attacker_stats.health == 0 {
            outcomes.push(CombatOutcome::Knockout {
                name: attacker.name.clone(),
                enabled: true,
            });
            outcomes.push(CombatOutcome::Finish {
                winner: Some(opponent.name.clone()),
            });
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::ConnectionId;

    fn fighter(name: &str, health: u32, energy: u32) -> Participant {
        Participant {
            name: name.to_string(),
            connection: ConnectionId::new(),
            stats: FighterStats { health, energy },
            knocked_out: false,
        }
    }

    fn request(name: &str, move_type: MoveType) -> MoveRequest {
        MoveRequest {
            player_name: name.to_string(),
            move_type,
        }
    }

    fn stats_for(outcomes: &[CombatOutcome], who: &str) -> Option<FighterStats> {
        outcomes.iter().rev().find_map(|o| match o {
            CombatOutcome::Stats { name, stats } if name == who => Some(*stats),
            _ => None,
        })
    }

    #[test]
    fn unguarded_hook_deals_full_damage() {
        let mut referee = Referee::new();
        let a = fighter("a", 100, 100);
        let b = fighter("b", 100, 100);

        let outcomes = referee.resolve(&request("a", MoveType::Hook), &a, &b);

        assert_eq!(stats_for(&outcomes, "a"), Some(FighterStats { health: 100, energy: 85 }));
        assert_eq!(stats_for(&outcomes, "b"), Some(FighterStats { health: 85, energy: 100 }));
        assert!(outcomes.contains(&CombatOutcome::Animation {
            name: "a".to_string(),
            move_type: MoveType::Hook
        }));
    }

    #[test]
    fn block_reduces_next_hit_once() {
        let mut referee = Referee::new();
        let a = fighter("a", 100, 100);
        let b = fighter("b", 100, 100);

        referee.resolve(&request("b", MoveType::Block), &b, &a);
        let first = referee.resolve(&request("a", MoveType::Cross), &a, &b);
        assert_eq!(stats_for(&first, "b").map(|s| s.health), Some(98));

        let second = referee.resolve(&request("a", MoveType::Cross), &a, &b);
        assert_eq!(stats_for(&second, "b").map(|s| s.health), Some(90));
    }

    #[test]
    fn counter_reflects_damage_to_attacker() {
        let mut referee = Referee::new();
        let a = fighter("a", 100, 100);
        let b = fighter("b", 100, 100);

        referee.resolve(&request("b", MoveType::Counter), &b, &a);
        let outcomes = referee.resolve(&request("a", MoveType::Uppercut), &a, &b);

        assert_eq!(stats_for(&outcomes, "a").map(|s| s.health), Some(88));
        assert_eq!(stats_for(&outcomes, "b").map(|s| s.health), Some(100));
    }

    #[test]
    fn tired_fighter_rests_instead_of_punching() {
        let mut referee = Referee::new();
        let a = fighter("a", 100, 3);
        let b = fighter("b", 100, 100);

        let outcomes = referee.resolve(&request("a", MoveType::Uppercut), &a, &b);

        assert_eq!(
            outcomes,
            vec![CombatOutcome::Stats {
                name: "a".to_string(),
                stats: FighterStats { health: 100, energy: 13 },
            }]
        );
    }

    #[test]
    fn final_blow_knocks_out_and_finishes() {
        let mut referee = Referee::new();
        let a = fighter("a", 100, 100);
        let b = fighter("b", 4, 100);

        let outcomes = referee.resolve(&request("a", MoveType::Jab), &a, &b);

        assert!(outcomes.contains(&CombatOutcome::Knockout {
            name: "b".to_string(),
            enabled: true
        }));
        assert_eq!(
            outcomes.last(),
            Some(&CombatOutcome::Finish {
                winner: Some("a".to_string())
            })
        );
    }
}
