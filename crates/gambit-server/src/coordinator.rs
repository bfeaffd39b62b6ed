//! The coordinator: one task, one mailbox, all the state.
//!
//! Connection tasks and the clock sweep push [`ServerEvent`]s into an
//! unbounded mpsc channel; the coordinator drains it and handles each event
//! to completion before looking at the next. The registry, the matchmaking
//! queue and the session directory are plain owned fields, so there is no
//! locking anywhere and no transition can observe another half-applied.
//!
//! Per-message failures never escape this module: they become a
//! `game_alert`/`game_not_found` to the offending connection, or a log line.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use gambit_core::{
    Color, GameId, GameSession, GameStatus, SessionError, SessionEvent, UserIdentity,
};

use crate::config::ServerConfig;
use crate::connection::{ConnId, ConnectionRegistry};
use crate::directory::SessionDirectory;
use crate::matchmaking::{EnqueueOutcome, MatchmakingQueue};
use crate::protocol::{ClientMessage, ServerMessage};

/// Everything that can happen, funneled into one stream.
#[derive(Debug)]
pub enum ServerEvent {
    /// A connection authenticated and is ready for traffic.
    Connected {
        /// The new connection.
        conn: ConnId,
        /// Who it belongs to.
        user: UserIdentity,
        /// Channel feeding the connection's writer task.
        outbound: mpsc::UnboundedSender<ServerMessage>,
    },
    /// A decoded client message arrived.
    Inbound {
        /// The sending connection.
        conn: ConnId,
        /// The message.
        message: ClientMessage,
    },
    /// The transport connection closed.
    Disconnected {
        /// The closed connection.
        conn: ConnId,
    },
    /// The periodic clock sweep fired.
    Tick,
}

/// How the second player arrived at a game.
enum JoinPath {
    /// Matched out of the queue; both players get `init_game`.
    Queue,
    /// Came in through a shared game id; the joiner gets the snapshot.
    Invite,
}

/// The game session coordination layer.
pub struct Coordinator {
    config: ServerConfig,
    registry: ConnectionRegistry,
    queue: MatchmakingQueue,
    directory: SessionDirectory,
    last_clock_sync: Option<DateTime<Utc>>,
}

impl Coordinator {
    /// Create a coordinator with no connections and no games.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            registry: ConnectionRegistry::new(),
            queue: MatchmakingQueue::new(),
            directory: SessionDirectory::new(),
            last_clock_sync: None,
        }
    }

    /// Drain the event mailbox until every sender is gone.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<ServerEvent>) {
        info!("coordinator running");
        while let Some(event) = events.recv().await {
            self.handle_event(event, Utc::now());
        }
        info!("event channel closed; coordinator stopping");
    }

    /// Handle one event to completion.
    ///
    /// `now` is passed in so tests can drive the coordinator on a scripted
    /// clock.
    pub fn handle_event(&mut self, event: ServerEvent, now: DateTime<Utc>) {
        match event {
            ServerEvent::Connected {
                conn,
                user,
                outbound,
            } => {
                info!(%conn, user = %user.display_name, guest = user.is_guest, "connection registered");
                self.registry.register(conn, user, outbound);
            }
            ServerEvent::Inbound { conn, message } => self.on_message(conn, message, now),
            ServerEvent::Disconnected { conn } => self.on_disconnected(conn, now),
            ServerEvent::Tick => self.on_tick(now),
        }
    }

    /// Live sessions, for observability.
    #[must_use]
    pub fn directory(&self) -> &SessionDirectory {
        &self.directory
    }

    /// The matchmaking queue, for observability.
    #[must_use]
    pub fn queue(&self) -> &MatchmakingQueue {
        &self.queue
    }

    // --- Inbound dispatch ---

    fn on_message(&mut self, conn: ConnId, message: ClientMessage, now: DateTime<Utc>) {
        // Re-validate the sender on every message; a stale connection must
        // never reach a session.
        let Some(user) = self.registry.user(conn).cloned() else {
            warn!(%conn, "message from unregistered connection dropped");
            return;
        };

        match message {
            ClientMessage::InitGame => self.on_init_game(conn, user, now),
            ClientMessage::JoinRoom { game_id } => self.on_join_room(conn, user, game_id, now),
            ClientMessage::Move { game_id, mv } => {
                self.session_action(conn, game_id, |session, color| {
                    session.apply_move(color, &mv, now)
                });
            }
            ClientMessage::Resign { game_id } => {
                self.session_action(conn, game_id, |session, color| session.resign(color, now));
            }
            ClientMessage::ExitGame { game_id } => self.on_exit(conn, game_id, now),
            ClientMessage::OfferDraw { game_id } => {
                self.session_action(conn, game_id, |session, color| {
                    session.offer_draw(color, now)
                });
            }
            ClientMessage::AcceptDraw { game_id } => {
                self.session_action(conn, game_id, |session, color| {
                    session.accept_draw(color, now)
                });
            }
        }
    }

    fn on_init_game(&mut self, conn: ConnId, user: UserIdentity, now: DateTime<Utc>) {
        // One active game per connection.
        if let Some(existing) = self.directory.route_for(conn) {
            let in_active_game = self
                .directory
                .session(existing)
                .map(|s| s.status().is_active())
                .unwrap_or(false);
            if in_active_game {
                self.registry.send(
                    conn,
                    ServerMessage::GameAlert {
                        message: "finish or leave your current game first".to_string(),
                    },
                );
                return;
            }
        }

        match self.queue.enqueue(&user, conn, GameId::new(), now) {
            EnqueueOutcome::AlreadyWaiting { game_id } => {
                debug!(%conn, %game_id, "duplicate queue request; re-sending game id");
                self.registry.send(conn, ServerMessage::GameAdded { game_id });
            }
            EnqueueOutcome::Queued { game_id } => {
                let session =
                    GameSession::new(game_id, user.clone(), self.config.time_control, now);
                self.directory.insert(session);
                self.directory.bind(game_id, Color::White, conn);
                info!(%game_id, user = %user.display_name, "waiting for an opponent");
                self.registry.send(conn, ServerMessage::GameAdded { game_id });
            }
            EnqueueOutcome::Paired { entry } => {
                self.start_game(entry.game_id, conn, user, now, JoinPath::Queue);
            }
        }
    }

    fn on_join_room(
        &mut self,
        conn: ConnId,
        user: UserIdentity,
        game_id: GameId,
        now: DateTime<Utc>,
    ) {
        let (status, creator, seat_color) = match self.directory.entry(game_id) {
            None => {
                self.registry
                    .send(conn, ServerMessage::GameNotFound { game_id });
                return;
            }
            Some(entry) => (
                entry.session.status(),
                entry.session.white_user().id,
                entry.session.color_of(user.id),
            ),
        };

        // One active game per connection.
        if let Some(existing) = self.directory.route_for(conn) {
            let blocking = existing != game_id
                && self
                    .directory
                    .session(existing)
                    .map(|s| s.status().is_active())
                    .unwrap_or(false);
            if blocking {
                self.registry.send(
                    conn,
                    ServerMessage::GameAlert {
                        message: "finish or leave your current game first".to_string(),
                    },
                );
                return;
            }
        }

        if status == GameStatus::WaitingForSecondPlayer {
            if creator == user.id {
                // The waiting player came back on a fresh connection.
                self.directory.bind(game_id, Color::White, conn);
                if let Some(entry) = self.directory.entry_mut(game_id) {
                    entry.session.reconnect(Color::White);
                }
                self.queue.rebind_conn(game_id, conn);
                self.registry.send(conn, ServerMessage::GameAdded { game_id });
            } else if self.queue.take_by_game(game_id).is_some() {
                self.start_game(game_id, conn, user, now, JoinPath::Invite);
            } else {
                // A waiting session must have a queue entry. Something is
                // off; retire the session rather than guess.
                error!(%game_id, "waiting session without a queue entry; abandoning");
                let events = match self.directory.entry_mut(game_id) {
                    Some(entry) => entry.session.mark_abandoned(now),
                    None => Vec::new(),
                };
                self.emit(game_id, &events);
                self.registry
                    .send(conn, ServerMessage::GameNotFound { game_id });
            }
            return;
        }

        // Active or finished games take rejoining participants only;
        // spectating is out of scope.
        let Some(color) = seat_color else {
            self.registry.send(
                conn,
                ServerMessage::GameAlert {
                    message: "you are not a player in this game".to_string(),
                },
            );
            return;
        };

        self.directory.bind(game_id, color, conn);
        let (snapshot, verdict) = match self.directory.entry_mut(game_id) {
            Some(entry) => {
                entry.session.reconnect(color);
                let snapshot = ServerMessage::game_joined(&entry.session, now);
                let verdict = entry.session.status().is_terminal().then(|| {
                    ServerMessage::game_ended(entry.session.status(), entry.session.result())
                });
                (snapshot, verdict)
            }
            None => (None, None),
        };
        // The snapshot goes to the rejoining connection only.
        if let Some(message) = snapshot {
            self.registry.send(conn, message);
        }
        if let Some(message) = verdict {
            self.registry.send(conn, message);
        }
        info!(%game_id, %conn, color = %color, "player rejoined");
    }

    /// Seat the second player and announce the game.
    fn start_game(
        &mut self,
        game_id: GameId,
        joiner_conn: ConnId,
        joiner: UserIdentity,
        now: DateTime<Utc>,
        path: JoinPath,
    ) {
        let joined = match self.directory.entry_mut(game_id) {
            Some(entry) => entry.session.join(joiner.clone(), now),
            None => {
                error!(%game_id, "waiting entry pointed at a missing session");
                self.registry.send(
                    joiner_conn,
                    ServerMessage::GameAlert {
                        message: "matchmaking failed, please try again".to_string(),
                    },
                );
                return;
            }
        };
        if let Err(err) = joined {
            warn!(%game_id, %err, "could not seat second player");
            self.registry.send(
                joiner_conn,
                ServerMessage::GameAlert {
                    message: err.to_string(),
                },
            );
            return;
        }

        self.directory.bind(game_id, Color::Black, joiner_conn);

        let Some(entry) = self.directory.entry(game_id) else {
            return;
        };
        let Some(init) = ServerMessage::init_game(&entry.session) else {
            return;
        };
        let white_conn = entry.conn_for(Color::White);
        let snapshot = ServerMessage::game_joined(&entry.session, now);
        info!(
            %game_id,
            white = %entry.session.white_user().display_name,
            black = %joiner.display_name,
            "game started"
        );

        match path {
            JoinPath::Queue => {
                if let Some(white) = white_conn {
                    self.registry.send(white, init.clone());
                }
                self.registry.send(joiner_conn, init);
            }
            JoinPath::Invite => {
                if let Some(white) = white_conn {
                    self.registry.send(white, init);
                }
                if let Some(snapshot) = snapshot {
                    self.registry.send(joiner_conn, snapshot);
                }
            }
        }
    }

    fn on_exit(&mut self, conn: ConnId, game_id: GameId, now: DateTime<Utc>) {
        // Not matched yet: exiting is just leaving the queue.
        if let Some(entry) = self.queue.cancel(conn) {
            self.directory.remove(entry.game_id);
            info!(game_id = %entry.game_id, "waiting player left the queue");
            return;
        }
        self.session_action(conn, game_id, |session, color| session.exit(color, now));
    }

    /// Route a game-scoped action through the directory, run it, fan out
    /// the notifications.
    fn session_action<F>(&mut self, conn: ConnId, game_id: GameId, action: F)
    where
        F: FnOnce(&mut GameSession, Color) -> Result<Vec<SessionEvent>, SessionError>,
    {
        let color = match self.directory.entry(game_id) {
            None => {
                self.registry
                    .send(conn, ServerMessage::GameNotFound { game_id });
                return;
            }
            Some(entry) => match entry.color_for(conn) {
                Some(color) => color,
                None => {
                    self.registry.send(
                        conn,
                        ServerMessage::GameAlert {
                            message: "you are not a player in this game".to_string(),
                        },
                    );
                    return;
                }
            },
        };

        let outcome = match self.directory.entry_mut(game_id) {
            Some(entry) => action(&mut entry.session, color),
            None => return,
        };
        match outcome {
            Ok(events) => self.emit(game_id, &events),
            Err(err) => {
                // The opponent never hears about a rejected attempt.
                debug!(%conn, %game_id, %err, "action rejected");
                self.registry.send(
                    conn,
                    ServerMessage::GameAlert {
                        message: err.to_string(),
                    },
                );
            }
        }
    }

    // --- Lifecycle events ---

    fn on_disconnected(&mut self, conn: ConnId, now: DateTime<Utc>) {
        info!(%conn, "connection closed");
        self.registry.unregister(conn);

        // Waiting games die with their creator.
        if let Some(entry) = self.queue.cancel(conn) {
            self.directory.remove(entry.game_id);
            info!(game_id = %entry.game_id, "waiting game discarded on disconnect");
        }

        if let Some((game_id, color)) = self.directory.unbind(conn) {
            let events = match self.directory.entry_mut(game_id) {
                Some(entry) => {
                    entry
                        .session
                        .handle_disconnect(color, now, self.config.disconnect_grace)
                }
                None => Vec::new(),
            };
            self.emit(game_id, &events);
        }
    }

    fn on_tick(&mut self, now: DateTime<Utc>) {
        // Settle clocks: timeouts and disconnect-grace expiries.
        for game_id in self.directory.game_ids() {
            let events = match self.directory.entry_mut(game_id) {
                Some(entry) => entry.session.tick(now),
                None => continue,
            };
            if !events.is_empty() {
                self.emit(game_id, &events);
            }
        }

        self.maybe_sync_clocks(now);
        self.evict_finished(now);
    }

    /// Broadcast `game_time` to active games on the configured cadence.
    fn maybe_sync_clocks(&mut self, now: DateTime<Utc>) {
        let interval = chrono::Duration::from_std(self.config.clock_sync_interval)
            .unwrap_or_else(|_| chrono::Duration::seconds(5));
        let due = match self.last_clock_sync {
            Some(last) => now.signed_duration_since(last) >= interval,
            None => true,
        };
        if !due {
            return;
        }
        self.last_clock_sync = Some(now);

        for game_id in self.directory.game_ids() {
            let Some(entry) = self.directory.entry(game_id) else {
                continue;
            };
            if !entry.session.status().is_active() {
                continue;
            }
            let (white_ms, black_ms) = entry.session.times_ms(now);
            let message = ServerMessage::GameTime {
                player1_time: white_ms,
                player2_time: black_ms,
            };
            for conn in entry.bound_conns() {
                self.registry.send(conn, message.clone());
            }
        }
    }

    /// Drop finished sessions once their reconnect window has passed.
    fn evict_finished(&mut self, now: DateTime<Utc>) {
        let expired: Vec<GameId> = self
            .directory
            .game_ids()
            .into_iter()
            .filter(|id| {
                self.directory
                    .session(*id)
                    .map(|s| s.is_evictable(now, self.config.eviction_delay))
                    .unwrap_or(false)
            })
            .collect();
        for game_id in expired {
            self.directory.remove(game_id);
            debug!(%game_id, "finished session evicted");
        }
    }

    // --- Outbound fan-out ---

    /// Translate session events into wire messages for the connections
    /// bound to this session - and nobody else.
    fn emit(&self, game_id: GameId, events: &[SessionEvent]) {
        let Some(entry) = self.directory.entry(game_id) else {
            return;
        };
        for event in events {
            match event {
                SessionEvent::MoveApplied {
                    record,
                    white_ms,
                    black_ms,
                } => {
                    let message = ServerMessage::move_applied(record, *white_ms, *black_ms);
                    for conn in entry.bound_conns() {
                        self.registry.send(conn, message.clone());
                    }
                }
                SessionEvent::DrawOffered { by } => {
                    if let Some(conn) = entry.conn_for(by.opposite()) {
                        self.registry.send(
                            conn,
                            ServerMessage::GameAlert {
                                message: "your opponent offers a draw".to_string(),
                            },
                        );
                    }
                }
                SessionEvent::OpponentDisconnected { remaining } => {
                    if let Some(conn) = entry.conn_for(*remaining) {
                        self.registry.send(conn, ServerMessage::OpponentDisconnected);
                    }
                }
                SessionEvent::Ended { status, result } => {
                    if let Some(result) = result {
                        if result.reason == gambit_core::EndReason::Timeout {
                            let timeout = ServerMessage::UserTimeout {
                                win: result.outcome,
                            };
                            for conn in entry.bound_conns() {
                                self.registry.send(conn, timeout.clone());
                            }
                        }
                    }
                    let message = ServerMessage::game_ended(*status, *result);
                    for conn in entry.bound_conns() {
                        self.registry.send(conn, message.clone());
                    }
                    info!(%game_id, status = %status, "game over");
                }
            }
        }
    }
}

/// Feed `Tick` events into the coordinator's mailbox on a fixed period.
///
/// Runs independently of message processing so clocks cannot be starved by
/// a busy mailbox producer. Stops when the coordinator goes away.
pub fn spawn_clock_sweep(
    events: mpsc::UnboundedSender<ServerEvent>,
    period: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if events.send(ServerEvent::Tick).is_err() {
                break;
            }
        }
    })
}
