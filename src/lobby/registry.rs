//! Connection registry - maps connections to seated players

use std::collections::{HashMap, HashSet};

use crate::game::MatchId;
use crate::ws::protocol::ConnectionId;

use super::player::Player;

/// At most one player per connection
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    players: HashMap<ConnectionId, Player>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seat a player. Returns the player back if the connection is taken.
    pub fn insert(&mut self, player: Player) -> Result<(), Player> {
        if self.players.contains_key(&player.connection) {
            return Err(player);
        }
        self.players.insert(player.connection, player);
        Ok(())
    }

    pub fn get(&self, connection: &ConnectionId) -> Option<&Player> {
        self.players.get(connection)
    }

    pub fn get_mut(&mut self, connection: &ConnectionId) -> Option<&mut Player> {
        self.players.get_mut(connection)
    }

    pub fn contains(&self, connection: &ConnectionId) -> bool {
        self.players.contains_key(connection)
    }

    pub fn name_taken(&self, name: &str) -> bool {
        self.players.values().any(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Players not currently in a match
    pub fn unmatched_count(&self) -> usize {
        self.players.values().filter(|p| !p.is_matched()).count()
    }

    /// First available player other than `connection`, in map order
    pub fn find_opponent(&self, connection: &ConnectionId) -> Option<ConnectionId> {
        self.players
            .values()
            .find(|p| p.connection != *connection && p.is_available())
            .map(|p| p.connection)
    }

    /// Remove every player whose connection is not in `live`
    pub fn retain_live(&mut self, live: &HashSet<ConnectionId>) -> Vec<Player> {
        let stale: Vec<ConnectionId> = self
            .players
            .keys()
            .filter(|id| !live.contains(id))
            .copied()
            .collect();

        stale
            .iter()
            .filter_map(|id| self.players.remove(id))
            .collect()
    }

    /// Remove every player fighting in `match_id`
    pub fn remove_match(&mut self, match_id: MatchId) -> Vec<Player> {
        let fighters: Vec<ConnectionId> = self
            .players
            .values()
            .filter(|p| p.match_id == Some(match_id))
            .map(|p| p.connection)
            .collect();

        fighters
            .iter()
            .filter_map(|id| self.players.remove(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seat(registry: &mut ConnectionRegistry, name: &str) -> ConnectionId {
        let id = ConnectionId::new();
        registry.insert(Player::new(name.to_string(), id)).unwrap();
        id
    }

    #[test]
    fn one_player_per_connection() {
        let mut registry = ConnectionRegistry::new();
        let id = seat(&mut registry, "a");

        let rejected = registry.insert(Player::new("b".to_string(), id));

        assert!(rejected.is_err());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&id).map(|p| p.name.as_str()), Some("a"));
    }

    #[test]
    fn opponent_search_skips_self_and_matched() {
        let mut registry = ConnectionRegistry::new();
        let a = seat(&mut registry, "a");
        let b = seat(&mut registry, "b");
        let c = seat(&mut registry, "c");

        registry.get_mut(&a).unwrap().ready = true;
        assert_eq!(registry.find_opponent(&a), None);

        let busy = registry.get_mut(&b).unwrap();
        busy.ready = true;
        busy.match_id = Some(1);
        assert_eq!(registry.find_opponent(&a), None);

        registry.get_mut(&c).unwrap().ready = true;
        assert_eq!(registry.find_opponent(&a), Some(c));
    }

    #[test]
    fn retain_live_returns_removed_players() {
        let mut registry = ConnectionRegistry::new();
        let a = seat(&mut registry, "a");
        let _b = seat(&mut registry, "b");

        let live: HashSet<ConnectionId> = [a].into_iter().collect();
        let removed = registry.retain_live(&live);

        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].name, "b");
        assert!(registry.contains(&a));
    }
}
