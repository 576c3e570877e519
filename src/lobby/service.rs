//! Lobby service - seating, matchmaking and the serialized event loop

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::LobbyConfig;
use crate::game::{GameMatch, MatchCommand, MatchHandle, MatchId, Participant, Referee, WordList};
use crate::ws::protocol::{ClientMsg, ConnectionId, ServerMsg};
use crate::ws::{Inbound, Subscription, Transport};

use super::player::Player;
use super::registry::ConnectionRegistry;

/// Lobby errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("Lobby is full")]
    LobbyFull,

    #[error("Connection already has a player")]
    AlreadyJoined,

    #[error("Name already taken: {0}")]
    NameTaken(String),

    #[error("Name must not be empty")]
    InvalidName,

    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    #[error("Player is already in a match")]
    AlreadyInMatch,

    #[error("Connection {0} is not in a match")]
    NotInMatch(ConnectionId),
}

/// Result of a ready toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyOutcome {
    /// Ready flag after the toggle (false again if a match started)
    pub ready: bool,
    /// Match started by this toggle
    pub started: Option<MatchId>,
}

/// Snapshot for the health endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct LobbyStatus {
    pub connections: usize,
    pub players: usize,
    pub active_matches: usize,
}

/// Events for the lobby loop that do not come from a connection
#[derive(Debug)]
pub enum LobbyEvent {
    MatchCompleted(MatchId),
    Status(oneshot::Sender<LobbyStatus>),
    Shutdown,
}

struct ActiveMatch {
    handle: MatchHandle,
    task: JoinHandle<()>,
}

/// Lobby state. Every method runs on the lobby loop, one event at a time.
pub struct Lobby {
    config: LobbyConfig,
    transport: Arc<dyn Transport>,
    players: ConnectionRegistry,
    active_matches: Vec<ActiveMatch>,
    next_match_id: MatchId,
    events_tx: mpsc::UnboundedSender<LobbyEvent>,
}

impl Lobby {
    pub fn new(
        config: LobbyConfig,
        transport: Arc<dyn Transport>,
        events_tx: mpsc::UnboundedSender<LobbyEvent>,
    ) -> Self {
        Self {
            config,
            transport,
            players: ConnectionRegistry::new(),
            active_matches: Vec::new(),
            next_match_id: 0,
            events_tx,
        }
    }

    #[cfg(test)]
    pub fn player(&self, connection: &ConnectionId) -> Option<&Player> {
        self.players.get(connection)
    }

    #[cfg(test)]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    #[cfg(test)]
    pub fn active_match_count(&self) -> usize {
        self.active_matches.len()
    }

    pub fn status(&self) -> LobbyStatus {
        LobbyStatus {
            connections: self.transport.live_connections().len(),
            players: self.players.len(),
            active_matches: self.active_matches.len(),
        }
    }

    /// Route one inbound message
    pub fn handle_inbound(&mut self, inbound: Inbound) {
        let connection = inbound.connection;
        let result = match inbound.msg {
            ClientMsg::Join { name } => self.join(connection, name),
            ClientMsg::Ready => self.set_ready(connection).map(|_| ()),
            ClientMsg::Message { text } => self.chat(connection, text),
            ClientMsg::WordSubmission { text } => {
                self.forward(connection, |player| MatchCommand::SubmitWord { player, text })
            }
            ClientMsg::Move { name } => {
                self.forward(connection, |player| MatchCommand::SubmitMove { player, text: name })
            }
        };

        match result {
            Ok(()) => {}
            Err(e @ (LobbyError::UnknownConnection(_) | LobbyError::NotInMatch(_))) => {
                error!(connection = %connection, error = %e, "Protocol error");
            }
            Err(e) => {
                warn!(connection = %connection, error = %e, "Request rejected");
            }
        }
    }

    /// Seat a player. Every live connection hears the outcome.
    pub fn join(&mut self, connection: ConnectionId, name: String) -> Result<(), LobbyError> {
        let name = name.trim().to_string();
        let result = self.seat(connection, &name);

        self.transport.broadcast(ServerMsg::JoinResponse {
            name: name.clone(),
            accepted: result.is_ok(),
        });

        if result.is_ok() {
            info!(connection = %connection, name = %name, players = self.players.len(), "Player joined lobby");
        }
        result
    }

    fn seat(&mut self, connection: ConnectionId, name: &str) -> Result<(), LobbyError> {
        if name.is_empty() {
            return Err(LobbyError::InvalidName);
        }
        if self.players.contains(&connection) {
            return Err(LobbyError::AlreadyJoined);
        }
        if self.players.unmatched_count() >= self.config.capacity {
            return Err(LobbyError::LobbyFull);
        }
        if self.players.name_taken(name) {
            return Err(LobbyError::NameTaken(name.to_string()));
        }

        self.players
            .insert(Player::new(name.to_string(), connection))
            .map_err(|_| LobbyError::AlreadyJoined)
    }

    /// Toggle ready; a transition to ready tries to start a match
    pub fn set_ready(&mut self, connection: ConnectionId) -> Result<ReadyOutcome, LobbyError> {
        let player = self
            .players
            .get_mut(&connection)
            .ok_or(LobbyError::UnknownConnection(connection))?;

        if player.is_matched() {
            return Err(LobbyError::AlreadyInMatch);
        }

        let ready = player.toggle_ready();
        let name = player.name.clone();
        debug!(connection = %connection, name = %name, ready, "Ready toggled");

        if !ready {
            return Ok(ReadyOutcome {
                ready,
                started: None,
            });
        }

        self.transport.broadcast(ServerMsg::MessageResponse {
            sender_name: name,
            text: "I'm ready".to_string(),
        });

        let started = self.matchmake(connection)?;
        Ok(ReadyOutcome {
            ready: started.is_none(),
            started,
        })
    }

    /// Lobby chat
    pub fn chat(&mut self, connection: ConnectionId, text: String) -> Result<(), LobbyError> {
        let player = self
            .players
            .get(&connection)
            .ok_or(LobbyError::UnknownConnection(connection))?;

        self.transport.broadcast(ServerMsg::MessageResponse {
            sender_name: player.name.clone(),
            text,
        });
        Ok(())
    }

    /// Pair the triggering player with the first other available player
    fn matchmake(&mut self, connection: ConnectionId) -> Result<Option<MatchId>, LobbyError> {
        let started = match self.players.find_opponent(&connection) {
            Some(opponent) => Some(self.start_match(connection, opponent)?),
            None => None,
        };

        self.prune_completed();
        Ok(started)
    }

    fn start_match(
        &mut self,
        first: ConnectionId,
        second: ConnectionId,
    ) -> Result<MatchId, LobbyError> {
        let id = self.next_match_id;
        let red = self.enter_match(first, id)?;
        let blue = self.enter_match(second, id)?;
        self.next_match_id += 1;

        let (game_match, handle) = GameMatch::new(
            id,
            [red.clone(), blue.clone()],
            self.config.opening_word.clone(),
            self.transport.clone(),
            Box::new(WordList::new(rand::random())),
            Box::new(Referee::new()),
        );

        let events_tx = self.events_tx.clone();
        let task = tokio::spawn(async move {
            game_match.run().await;
            let _ = events_tx.send(LobbyEvent::MatchCompleted(id));
        });
        self.active_matches.push(ActiveMatch { handle, task });

        self.transport.send_to(
            red.connection,
            ServerMsg::StartResponse {
                opponent_name: blue.name.clone(),
            },
        );
        self.transport.send_to(
            blue.connection,
            ServerMsg::StartResponse {
                opponent_name: red.name.clone(),
            },
        );

        info!(
            match_id = id,
            red = %red.name,
            blue = %blue.name,
            active_matches = self.active_matches.len(),
            "Created new match"
        );
        Ok(id)
    }

    fn enter_match(
        &mut self,
        connection: ConnectionId,
        match_id: MatchId,
    ) -> Result<Participant, LobbyError> {
        let player = self
            .players
            .get_mut(&connection)
            .ok_or(LobbyError::UnknownConnection(connection))?;

        player.ready = false;
        player.match_id = Some(match_id);
        Ok(Participant::new(
            player.name.clone(),
            player.connection,
            player.stats,
        ))
    }

    /// Hand typed input to the sender's match
    fn forward(
        &self,
        connection: ConnectionId,
        command: impl FnOnce(String) -> MatchCommand,
    ) -> Result<(), LobbyError> {
        let player = self
            .players
            .get(&connection)
            .ok_or(LobbyError::UnknownConnection(connection))?;
        let match_id = player.match_id.ok_or(LobbyError::NotInMatch(connection))?;

        let command = command(player.name.clone());
        self.send_to_match(match_id, command);
        Ok(())
    }

    fn send_to_match(&self, match_id: MatchId, command: MatchCommand) {
        match self.active_matches.iter().find(|m| m.handle.id == match_id) {
            Some(active) => {
                if active.handle.command_tx.send(command).is_err() {
                    debug!(match_id, "Match task already exited, command dropped");
                }
            }
            None => debug!(match_id, "Command for finished match dropped"),
        }
    }

    /// Remove players whose connection is gone
    pub fn reap_stale_connections(&mut self) -> Vec<Player> {
        let live = self.transport.live_connections();
        let removed = self.players.retain_live(&live);

        for player in &removed {
            info!(connection = %player.connection, name = %player.name, "Reaped stale connection");
            self.transport.broadcast(ServerMsg::PlayerLeft {
                name: player.name.clone(),
            });

            if let Some(match_id) = player.match_id {
                self.send_to_match(
                    match_id,
                    MatchCommand::Abandon {
                        player: player.name.clone(),
                    },
                );
            }
        }

        removed
    }

    /// A match task finished; its fighters leave the lobby
    pub fn on_match_completed(&mut self, match_id: MatchId) {
        let fighters = self.players.remove_match(match_id);
        self.prune_completed();

        info!(
            match_id,
            released = fighters.len(),
            active_matches = self.active_matches.len(),
            "Match removed from lobby"
        );
    }

    fn prune_completed(&mut self) {
        self.active_matches.retain(|m| !m.handle.is_completed());
    }

    /// Stop every match task
    pub fn shutdown(&mut self) {
        for active in self.active_matches.drain(..) {
            active.task.abort();
        }
    }
}

impl Drop for Lobby {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Handle for talking to a running lobby loop
#[derive(Clone)]
pub struct LobbyHandle {
    events_tx: mpsc::UnboundedSender<LobbyEvent>,
}

impl LobbyHandle {
    pub async fn status(&self) -> Option<LobbyStatus> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.events_tx.send(LobbyEvent::Status(reply_tx)).ok()?;
        reply_rx.await.ok()
    }

    pub fn shutdown(&self) {
        let _ = self.events_tx.send(LobbyEvent::Shutdown);
    }
}

/// Owns the lobby, its transport subscription and its sweep timer
pub struct LobbyService {
    lobby: Lobby,
    subscription: Subscription,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    events_rx: mpsc::UnboundedReceiver<LobbyEvent>,
    sweep_interval: Duration,
}

impl LobbyService {
    pub fn new(config: LobbyConfig, transport: Arc<dyn Transport>) -> (Self, LobbyHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (subscription, inbound_rx) = transport.subscribe();
        let sweep_interval = config.sweep_interval;

        let service = Self {
            lobby: Lobby::new(config, transport, events_tx.clone()),
            subscription,
            inbound_rx,
            events_rx,
            sweep_interval,
        };

        (service, LobbyHandle { events_tx })
    }

    /// Run until shutdown. Inbound messages, match notices and the sweep
    /// all pass through this one loop.
    pub async fn run(self) {
        let LobbyService {
            mut lobby,
            subscription,
            mut inbound_rx,
            mut events_rx,
            sweep_interval,
        } = self;

        info!(listener = subscription.id(), "Lobby created");

        let mut sweep = interval_at(Instant::now() + sweep_interval, sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = sweep.tick() => {
                    lobby.reap_stale_connections();
                }
                Some(inbound) = inbound_rx.recv() => {
                    lobby.handle_inbound(inbound);
                }
                event = events_rx.recv() => match event {
                    Some(LobbyEvent::MatchCompleted(match_id)) => lobby.on_match_completed(match_id),
                    Some(LobbyEvent::Status(reply)) => {
                        let _ = reply.send(lobby.status());
                    }
                    Some(LobbyEvent::Shutdown) | None => break,
                },
            }
        }

        drop(subscription);
        lobby.shutdown();
        info!("Lobby disposed");
    }
}
