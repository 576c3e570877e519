//! Match state and authoritative command loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::ws::protocol::{ConnectionId, MoveRequest, MoveType, ServerMsg};
use crate::ws::Transport;

use super::combat::{CombatOutcome, CombatResolver};
use super::words::WordSupply;
use super::FighterStats;

/// Monotonic match number, unique within a lobby's lifetime
pub type MatchId = u64;

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Built, loop not started
    Created,
    /// Accepting input
    InProgress,
    /// Terminal
    Completed,
}

/// One boxer's in-match state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub name: String,
    pub connection: ConnectionId,
    pub stats: FighterStats,
    pub knocked_out: bool,
}

impl Participant {
    pub fn new(name: String, connection: ConnectionId, stats: FighterStats) -> Self {
        Self {
            name,
            connection,
            stats,
            knocked_out: false,
        }
    }
}

/// Commands delivered to a running match
#[derive(Debug, Clone, PartialEq)]
pub enum MatchCommand {
    /// Typed input: the shown word or a move name
    SubmitWord { player: String, text: String },
    /// Move name typed directly
    SubmitMove { player: String, text: String },
    /// A participant's connection was reaped
    Abandon { player: String },
}

/// Result of a word submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordOutcome {
    /// Word matched; a new challenge is showing
    Accepted { new_word: String },
    /// Word did not match and was handled as a move command
    Move(MoveOutcome),
}

/// Result of a move submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Handed to combat resolution
    Accepted(MoveType),
    /// Not a move name; nothing happened
    Unrecognized,
    /// Submitting participant is knocked out
    KnockedOut,
}

/// Match errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    /// The caller and the match disagree about who is fighting
    #[error("{player} is not a participant of match {match_id}")]
    UnknownParticipant { match_id: MatchId, player: String },

    #[error("Match {0} is already completed")]
    Completed(MatchId),
}

/// Handle to a running match
///
/// The command queue is unbounded: the lobby loop never waits on a match,
/// and an `Abandon` must not be lost behind a burst of typed input.
#[derive(Clone)]
pub struct MatchHandle {
    pub id: MatchId,
    pub command_tx: mpsc::UnboundedSender<MatchCommand>,
    completed: Arc<AtomicBool>,
}

impl MatchHandle {
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }
}

/// The authoritative game match
pub struct GameMatch {
    id: MatchId,
    phase: MatchPhase,
    participants: [Participant; 2],
    current_word: String,
    winner: Option<String>,
    transport: Arc<dyn Transport>,
    words: Box<dyn WordSupply>,
    combat: Box<dyn CombatResolver>,
    command_rx: mpsc::UnboundedReceiver<MatchCommand>,
    completed: Arc<AtomicBool>,
}

impl GameMatch {
    /// Create a new match
    pub fn new(
        id: MatchId,
        participants: [Participant; 2],
        opening_word: String,
        transport: Arc<dyn Transport>,
        words: Box<dyn WordSupply>,
        combat: Box<dyn CombatResolver>,
    ) -> (Self, MatchHandle) {
        debug_assert_ne!(participants[0].name, participants[1].name);
        debug_assert_ne!(participants[0].connection, participants[1].connection);

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let completed = Arc::new(AtomicBool::new(false));

        let handle = MatchHandle {
            id,
            command_tx,
            completed: completed.clone(),
        };

        let game_match = Self {
            id,
            phase: MatchPhase::Created,
            participants,
            current_word: opening_word,
            winner: None,
            transport,
            words,
            combat,
            command_rx,
            completed,
        };

        (game_match, handle)
    }

    pub fn is_completed(&self) -> bool {
        self.phase == MatchPhase::Completed
    }

    #[cfg(test)]
    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    #[cfg(test)]
    pub fn current_word(&self) -> &str {
        &self.current_word
    }

    #[cfg(test)]
    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    #[cfg(test)]
    pub fn participant(&self, name: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.name == name)
    }

    /// Process commands until the match completes or every handle is dropped
    pub async fn run(mut self) {
        self.start();

        while let Some(command) = self.command_rx.recv().await {
            self.handle_command(command);

            if self.is_completed() {
                break;
            }
        }

        if !self.is_completed() {
            info!(match_id = self.id, "Command channel closed before match completed");
        }
    }

    pub fn start(&mut self) {
        if self.phase == MatchPhase::Created {
            self.phase = MatchPhase::InProgress;
            info!(
                match_id = self.id,
                red = %self.participants[0].name,
                blue = %self.participants[1].name,
                "Match started"
            );
        }
    }

    /// Apply one command, reporting failures locally
    pub fn handle_command(&mut self, command: MatchCommand) {
        let result = match command {
            MatchCommand::SubmitWord { player, text } => {
                self.submit_word(&player, &text).map(|_| ())
            }
            MatchCommand::SubmitMove { player, text } => {
                self.submit_move(&player, &text).map(|_| ())
            }
            MatchCommand::Abandon { player } => self.abandon(&player),
        };

        match result {
            Ok(()) => {}
            Err(MatchError::Completed(_)) => {
                debug!(match_id = self.id, "Command after completion ignored");
            }
            Err(e @ MatchError::UnknownParticipant { .. }) => {
                error!(match_id = self.id, error = %e, "Protocol desync");
                debug_assert!(false, "{e}");
            }
        }
    }

    /// Check typed text against the current word; fall back to a move command
    ///
    /// Surrounding whitespace is ignored on both sides, the same as for move names.
    pub fn submit_word(&mut self, player: &str, text: &str) -> Result<WordOutcome, MatchError> {
        self.ensure_open()?;
        self.index_of(player)?;

        let typed = text.trim();
        if !typed.is_empty() && typed.to_uppercase() == self.current_word.trim().to_uppercase() {
            let new_word = self.words.next_word();
            self.current_word = new_word.clone();
            debug!(match_id = self.id, player = %player, new_word = %new_word, "Word solved");

            self.send_to_both(ServerMsg::WordSubmissionResponse {
                success: true,
                new_word: new_word.clone(),
            });
            return Ok(WordOutcome::Accepted { new_word });
        }

        self.submit_move(player, text).map(WordOutcome::Move)
    }

    /// Validate a move and hand it to combat resolution
    pub fn submit_move(&mut self, player: &str, text: &str) -> Result<MoveOutcome, MatchError> {
        self.ensure_open()?;
        let idx = self.index_of(player)?;

        let Some(move_type) = MoveType::parse_command(text) else {
            debug!(match_id = self.id, player = %player, "Input is neither word nor move");
            return Ok(MoveOutcome::Unrecognized);
        };

        if self.participants[idx].knocked_out {
            debug!(match_id = self.id, player = %player, "Knocked out player tried to move");
            return Ok(MoveOutcome::KnockedOut);
        }

        let request = MoveRequest {
            player_name: player.to_string(),
            move_type,
        };
        let outcomes = self.combat.resolve(
            &request,
            &self.participants[idx],
            &self.participants[1 - idx],
        );
        self.apply_outcomes(outcomes)?;

        Ok(MoveOutcome::Accepted(move_type))
    }

    /// Set or clear a participant's knockout flag
    pub fn apply_knockout(&mut self, player: &str, enable: bool) -> Result<(), MatchError> {
        let idx = self.index_of(player)?;
        self.participants[idx].knocked_out = enable;

        self.send_to_both(ServerMsg::KoResponse {
            name: player.to_string(),
            enabled: enable,
        });
        if enable {
            self.send_to_both(ServerMsg::AnimationResponse {
                name: player.to_string(),
                move_type: MoveType::Dead,
            });
        }

        info!(match_id = self.id, player = %player, enabled = enable, "Knockout updated");

        if self.participants.iter().all(|p| p.knocked_out) {
            self.complete(None);
        }
        Ok(())
    }

    /// Overwrite a participant's stat snapshot
    pub fn apply_stats(&mut self, player: &str, stats: FighterStats) -> Result<(), MatchError> {
        let idx = self.index_of(player)?;
        let stats = stats.clamped();
        self.participants[idx].stats = stats;

        self.transport.send_to(
            self.participants[idx].connection,
            ServerMsg::StatResponse {
                name: player.to_string(),
                health: stats.health,
                energy: stats.energy,
            },
        );
        Ok(())
    }

    /// A participant left; the opponent wins
    pub fn abandon(&mut self, player: &str) -> Result<(), MatchError> {
        let idx = self.index_of(player)?;
        info!(match_id = self.id, player = %player, "Participant abandoned match");
        let winner = self.participants[1 - idx].name.clone();
        self.complete(Some(winner));
        Ok(())
    }

    /// End the bout with the given winner
    pub fn finish(&mut self, winner: Option<String>) -> Result<(), MatchError> {
        if let Some(name) = &winner {
            self.index_of(name)?;
        }
        self.complete(winner);
        Ok(())
    }

    fn apply_outcomes(&mut self, outcomes: Vec<CombatOutcome>) -> Result<(), MatchError> {
        for outcome in outcomes {
            match outcome {
                CombatOutcome::Stats { name, stats } => self.apply_stats(&name, stats)?,
                CombatOutcome::Knockout { name, enabled } => self.apply_knockout(&name, enabled)?,
                CombatOutcome::Animation { name, move_type } => {
                    self.index_of(&name)?;
                    self.send_to_both(ServerMsg::AnimationResponse { name, move_type });
                }
                CombatOutcome::Finish { winner } => self.finish(winner)?,
            }
        }
        Ok(())
    }

    fn complete(&mut self, winner: Option<String>) {
        if self.is_completed() {
            return;
        }

        self.phase = MatchPhase::Completed;
        self.winner = winner.clone();
        self.completed.store(true, Ordering::Release);

        info!(match_id = self.id, winner = ?winner, "Match ended");
        self.send_to_both(ServerMsg::MatchEnd { winner });
    }

    fn ensure_open(&self) -> Result<(), MatchError> {
        if self.is_completed() {
            return Err(MatchError::Completed(self.id));
        }
        Ok(())
    }

    fn index_of(&self, player: &str) -> Result<usize, MatchError> {
        self.participants
            .iter()
            .position(|p| p.name == player)
            .ok_or_else(|| MatchError::UnknownParticipant {
                match_id: self.id,
                player: player.to_string(),
            })
    }

    fn send_to_both(&self, msg: ServerMsg) {
        for participant in &self.participants {
            self.transport.send_to(participant.connection, msg.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::combat::Referee;
    use crate::game::words::WordList;
    use crate::ws::ConnectionHub;
    use std::sync::Mutex;
    use tokio::sync::mpsc::UnboundedReceiver;

    /// Records move requests without resolving them
    #[derive(Clone, Default)]
    struct RecordingResolver {
        requests: Arc<Mutex<Vec<MoveRequest>>>,
    }

    impl CombatResolver for RecordingResolver {
        fn resolve(
            &mut self,
            request: &MoveRequest,
            _attacker: &Participant,
            _opponent: &Participant,
        ) -> Vec<CombatOutcome> {
            self.requests.lock().unwrap().push(request.clone());
            Vec::new()
        }
    }

    struct Ring {
        game: GameMatch,
        handle: MatchHandle,
        requests: Arc<Mutex<Vec<MoveRequest>>>,
        red_rx: UnboundedReceiver<ServerMsg>,
        blue_rx: UnboundedReceiver<ServerMsg>,
    }

    fn ring(opening_word: &str) -> Ring {
        let resolver = RecordingResolver::default();
        let requests = resolver.requests.clone();
        let mut ring = ring_with(opening_word, FighterStats::default(), Box::new(resolver));
        ring.requests = requests;
        ring
    }

    fn ring_with(
        opening_word: &str,
        blue_stats: FighterStats,
        combat: Box<dyn CombatResolver>,
    ) -> Ring {
        let hub = Arc::new(ConnectionHub::new());
        let (red, red_rx) = hub.connect();
        let (blue, blue_rx) = hub.connect();

        let (mut game, handle) = GameMatch::new(
            3,
            [
                Participant::new("red".to_string(), red, FighterStats::default()),
                Participant::new("blue".to_string(), blue, blue_stats),
            ],
            opening_word.to_string(),
            hub,
            Box::new(WordList::with_words(vec!["Glove".to_string(), "Ring".to_string()], 1)),
            combat,
        );
        game.start();

        Ring {
            game,
            handle,
            requests: Arc::default(),
            red_rx,
            blue_rx,
        }
    }

    fn drain(rx: &mut UnboundedReceiver<ServerMsg>) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn matching_word_advances_challenge_for_both() {
        let mut ring = ring("First");

        let outcome = ring.game.submit_word("red", "fIrSt").unwrap();

        let WordOutcome::Accepted { new_word } = outcome else {
            panic!("expected word success, got {outcome:?}");
        };
        assert_eq!(ring.game.current_word(), new_word);
        let expected = ServerMsg::WordSubmissionResponse {
            success: true,
            new_word,
        };
        assert_eq!(drain(&mut ring.red_rx), vec![expected.clone()]);
        assert_eq!(drain(&mut ring.blue_rx), vec![expected]);
        assert!(ring.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn mismatched_word_is_routed_as_move() {
        let mut ring = ring("FIRST");

        let outcome = ring.game.submit_word("red", "jab").unwrap();

        assert_eq!(outcome, WordOutcome::Move(MoveOutcome::Accepted(MoveType::Jab)));
        assert_eq!(ring.game.current_word(), "FIRST");
        assert_eq!(
            *ring.requests.lock().unwrap(),
            vec![MoveRequest {
                player_name: "red".to_string(),
                move_type: MoveType::Jab,
            }]
        );
        assert!(drain(&mut ring.red_rx)
            .iter()
            .all(|m| !matches!(m, ServerMsg::WordSubmissionResponse { .. })));
    }

    #[test]
    fn padded_word_still_matches() {
        let mut ring = ring("First");

        let outcome = ring.game.submit_word("blue", "  first \n").unwrap();

        assert!(matches!(outcome, WordOutcome::Accepted { .. }));
        assert!(ring.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn whitespace_never_matches_blank_word() {
        let mut ring = ring(" ");

        let outcome = ring.game.submit_word("red", "   ").unwrap();

        assert_eq!(outcome, WordOutcome::Move(MoveOutcome::Unrecognized));
        assert_eq!(ring.game.current_word(), " ");
    }

    #[test]
    fn empty_input_never_matches_empty_word() {
        let mut ring = ring("");

        let outcome = ring.game.submit_word("red", "").unwrap();

        assert_eq!(outcome, WordOutcome::Move(MoveOutcome::Unrecognized));
    }

    #[test]
    fn unrecognized_move_changes_nothing() {
        let mut ring = ring("First");
        let before = ring.game.participant("red").cloned();

        let outcome = ring.game.submit_move("red", "dance").unwrap();

        assert_eq!(outcome, MoveOutcome::Unrecognized);
        assert!(ring.requests.lock().unwrap().is_empty());
        assert_eq!(ring.game.participant("red").cloned(), before);
        assert!(drain(&mut ring.red_rx).is_empty());
    }

    #[test]
    fn knocked_out_player_cannot_move() {
        let mut ring = ring("First");
        ring.game.apply_knockout("red", true).unwrap();

        let outcome = ring.game.submit_move("red", "jab").unwrap();

        assert_eq!(outcome, MoveOutcome::KnockedOut);
        assert!(ring.requests.lock().unwrap().is_empty());
        assert!(!ring.game.is_completed());
    }

    #[test]
    fn knockout_emits_ko_and_dead_animation() {
        let mut ring = ring("First");

        ring.game.apply_knockout("blue", true).unwrap();

        assert_eq!(
            drain(&mut ring.red_rx),
            vec![
                ServerMsg::KoResponse {
                    name: "blue".to_string(),
                    enabled: true
                },
                ServerMsg::AnimationResponse {
                    name: "blue".to_string(),
                    move_type: MoveType::Dead
                },
            ]
        );

        ring.game.apply_knockout("blue", false).unwrap();
        assert_eq!(
            drain(&mut ring.blue_rx).last(),
            Some(&ServerMsg::KoResponse {
                name: "blue".to_string(),
                enabled: false
            })
        );
        assert_eq!(ring.game.submit_move("blue", "hook"), Ok(MoveOutcome::Accepted(MoveType::Hook)));
    }

    #[test]
    fn double_knockout_completes_match() {
        let mut ring = ring("First");

        ring.game.apply_knockout("red", true).unwrap();
        assert!(!ring.handle.is_completed());
        ring.game.apply_knockout("blue", true).unwrap();

        assert!(ring.game.is_completed());
        assert!(ring.handle.is_completed());
        assert_eq!(ring.game.winner(), None);
        assert_eq!(
            drain(&mut ring.red_rx).last(),
            Some(&ServerMsg::MatchEnd { winner: None })
        );
        assert_eq!(
            ring.game.submit_move("red", "jab"),
            Err(MatchError::Completed(3))
        );
    }

    #[test]
    fn stats_are_clamped_and_sent_to_owner_only() {
        let mut ring = ring("First");

        ring.game
            .apply_stats("red", FighterStats { health: 250, energy: 40 })
            .unwrap();

        assert_eq!(
            ring.game.participant("red").map(|p| p.stats),
            Some(FighterStats { health: 100, energy: 40 })
        );
        assert_eq!(
            drain(&mut ring.red_rx),
            vec![ServerMsg::StatResponse {
                name: "red".to_string(),
                health: 100,
                energy: 40
            }]
        );
        assert!(drain(&mut ring.blue_rx).is_empty());
    }

    #[test]
    fn abandon_awards_opponent() {
        let mut ring = ring("First");

        ring.game.abandon("blue").unwrap();

        assert_eq!(ring.game.phase(), MatchPhase::Completed);
        assert_eq!(ring.game.winner(), Some("red"));
    }

    #[test]
    fn lethal_jab_under_referee_ends_the_bout() {
        let mut ring = ring_with(
            "First",
            FighterStats { health: 4, energy: 100 },
            Box::new(Referee::new()),
        );

        let outcome = ring.game.submit_word("red", "jab").unwrap();

        assert_eq!(outcome, WordOutcome::Move(MoveOutcome::Accepted(MoveType::Jab)));
        assert!(ring.game.is_completed());
        assert!(ring.handle.is_completed());
        assert_eq!(ring.game.winner(), Some("red"));
        assert_eq!(
            ring.game.participant("blue").map(|p| (p.stats.health, p.knocked_out)),
            Some((0, true))
        );

        let blue_msgs = drain(&mut ring.blue_rx);
        assert!(blue_msgs.contains(&ServerMsg::KoResponse {
            name: "blue".to_string(),
            enabled: true
        }));
        assert!(blue_msgs.contains(&ServerMsg::AnimationResponse {
            name: "blue".to_string(),
            move_type: MoveType::Dead
        }));
        assert_eq!(
            blue_msgs.last(),
            Some(&ServerMsg::MatchEnd {
                winner: Some("red".to_string())
            })
        );
        assert_eq!(
            drain(&mut ring.red_rx).last(),
            Some(&ServerMsg::MatchEnd {
                winner: Some("red".to_string())
            })
        );
    }

    #[test]
    fn unknown_participant_is_an_error() {
        let mut ring = ring("First");

        let err = ring.game.submit_move("ghost", "jab").unwrap_err();

        assert_eq!(
            err,
            MatchError::UnknownParticipant {
                match_id: 3,
                player: "ghost".to_string()
            }
        );
    }

    #[tokio::test]
    async fn run_loop_exits_on_abandon() {
        let mut ring = ring("First");
        let handle = ring.handle.clone();
        let task = tokio::spawn(ring.game.run());

        handle
            .command_tx
            .send(MatchCommand::SubmitMove {
                player: "red".to_string(),
                text: "cross".to_string(),
            })
            .unwrap();
        handle
            .command_tx
            .send(MatchCommand::Abandon {
                player: "blue".to_string(),
            })
            .unwrap();

        task.await.unwrap();
        assert!(handle.is_completed());
        assert_eq!(ring.requests.lock().unwrap().len(), 1);
        assert_eq!(
            drain(&mut ring.red_rx).last(),
            Some(&ServerMsg::MatchEnd {
                winner: Some("red".to_string())
            })
        );
    }
}
