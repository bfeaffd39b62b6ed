//! The authoritative per-game state machine.
//!
//! A [`GameSession`] owns one game's board, clocks, move history and player
//! seats. Every transition is a plain method taking the current wall-clock
//! time as an argument and returning the notifications it produced, so the
//! full lifecycle is unit-testable without a transport. The hosting layer is
//! responsible for serializing calls; a session is never touched from two
//! logical flows at once.
//!
//! Clock semantics: time is *consumed while it is your turn to decide*. The
//! `clock_anchor` marks when the side to move started thinking; elapsed time
//! is settled onto the clock when a move lands or when the periodic tick
//! detects a flag.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::clock::GameClock;
use crate::engine::ChessPosition;
use crate::types::chess::{Color, MoveInput};
use crate::types::game::{
    EndReason, GameId, GameOutcome, GameResult, GameStatus, MoveRecord, TimeControl,
};
use crate::types::user::{UserId, UserIdentity};

/// Convert a std duration for timestamp arithmetic, capped so additions to
/// a `DateTime` can never overflow.
fn clamped(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(3650))
}

/// One player's seat in a game.
#[derive(Debug, Clone)]
pub struct Seat {
    /// Who sits here.
    pub user: UserIdentity,
    /// Whether a live connection is currently bound to this seat.
    pub connected: bool,
    /// When a disconnected player forfeits the game unless they return.
    pub disconnect_deadline: Option<DateTime<Utc>>,
}

impl Seat {
    fn new(user: UserIdentity) -> Self {
        Self {
            user,
            connected: true,
            disconnect_deadline: None,
        }
    }
}

/// Errors returned by session transitions.
///
/// These are per-message errors: the hosting layer reports them to the
/// offending connection and nothing else happens.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The action is not valid for the session's current status.
    #[error("game is not active (status: {status})")]
    InvalidState {
        /// Current session status.
        status: GameStatus,
    },
    /// It's the other side's turn.
    #[error("not your turn - it is {expected}'s turn")]
    WrongTurn {
        /// Whose turn it is.
        expected: Color,
    },
    /// The move was malformed or rejected by the rules engine.
    #[error("illegal move: {reason}")]
    IllegalMove {
        /// Why the move was rejected.
        reason: String,
    },
    /// No draw offer to accept.
    #[error("no draw offer to accept")]
    NoDrawOffer,
    /// Cannot accept your own draw offer.
    #[error("cannot accept your own draw offer")]
    OwnDrawOffer,
    /// Cannot join a game you created.
    #[error("cannot join your own game")]
    SelfJoin,
}

/// A notification produced by a session transition.
///
/// The hosting layer translates these into wire messages and delivers them
/// to the connections bound to this session - never to anyone else.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A move was validated and applied; both players should hear about it.
    MoveApplied {
        /// The applied move.
        record: MoveRecord,
        /// White's consumed time after the move, in milliseconds.
        white_ms: u64,
        /// Black's consumed time after the move, in milliseconds.
        black_ms: u64,
    },
    /// A draw was offered; only the opponent should hear about it.
    DrawOffered {
        /// Who offered.
        by: Color,
    },
    /// A player dropped; only the remaining player should hear about it.
    OpponentDisconnected {
        /// The player still present.
        remaining: Color,
    },
    /// The session reached a terminal status; both players should hear.
    Ended {
        /// Terminal status (`Completed` or `Abandoned`).
        status: GameStatus,
        /// The verdict; `None` only for abandoned games.
        result: Option<GameResult>,
    },
}

/// One chess game's authoritative state.
#[derive(Debug, Clone)]
pub struct GameSession {
    game_id: GameId,
    time_control: TimeControl,
    white: Seat,
    black: Option<Seat>,
    position: ChessPosition,
    moves: Vec<MoveRecord>,
    clock: GameClock,
    status: GameStatus,
    result: Option<GameResult>,
    draw_offer: Option<Color>,
    /// When the side to move started thinking. `None` unless active.
    clock_anchor: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl GameSession {
    /// Create a session with one seat filled, waiting for an opponent.
    ///
    /// The creator always plays white.
    #[must_use]
    pub fn new(
        game_id: GameId,
        creator: UserIdentity,
        time_control: TimeControl,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            game_id,
            time_control,
            white: Seat::new(creator),
            black: None,
            position: ChessPosition::new(),
            moves: Vec::new(),
            clock: GameClock::new(time_control),
            status: GameStatus::WaitingForSecondPlayer,
            result: None,
            draw_offer: None,
            clock_anchor: None,
            created_at: now,
            ended_at: None,
        }
    }

    /// Fill the second seat and start the game.
    pub fn join(&mut self, user: UserIdentity, now: DateTime<Utc>) -> Result<(), SessionError> {
        if self.status != GameStatus::WaitingForSecondPlayer {
            return Err(SessionError::InvalidState {
                status: self.status,
            });
        }
        if user.id == self.white.user.id {
            return Err(SessionError::SelfJoin);
        }
        self.black = Some(Seat::new(user));
        self.status = GameStatus::Active;
        self.clock_anchor = Some(now);
        Ok(())
    }

    /// Validate and apply a move for the given color.
    ///
    /// Malformed input and moves the rules engine rejects are both reported
    /// as [`SessionError::IllegalMove`]; the distinction stays internal.
    pub fn apply_move(
        &mut self,
        color: Color,
        input: &MoveInput,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        self.ensure_active()?;
        let turn = self.position.turn();
        if color != turn {
            return Err(SessionError::WrongTurn { expected: turn });
        }

        // A move that arrives after the flag fell is a timeout, not a move.
        let elapsed = self.pending(now);
        if self.clock.would_flag(color, elapsed) {
            self.clock.charge(color, elapsed);
            self.clock_anchor = Some(now);
            let result = GameResult::new(GameOutcome::win_for(color.opposite()), EndReason::Timeout);
            return Ok(vec![self.finish(GameStatus::Completed, Some(result), now)]);
        }

        let uci = input.to_uci().map_err(|e| SessionError::IllegalMove {
            reason: e.to_string(),
        })?;
        let san = self
            .position
            .play(&uci)
            .map_err(|e| SessionError::IllegalMove {
                reason: e.to_string(),
            })?;

        self.clock.charge(color, elapsed);
        self.clock.credit_increment(color);
        self.clock_anchor = Some(now);

        let record = MoveRecord {
            ply: (self.moves.len() + 1) as u16,
            color,
            uci,
            san,
            fen_after: self.position.to_fen(),
            time_taken: elapsed,
            played_at: now,
        };
        self.moves.push(record.clone());
        self.draw_offer = None;

        let (white_ms, black_ms) = self.times_ms(now);
        let mut events = vec![SessionEvent::MoveApplied {
            record,
            white_ms,
            black_ms,
        }];

        if let Some(outcome) = self.position.outcome() {
            events.push(self.finish(GameStatus::Completed, Some(outcome.to_result()), now));
        }

        Ok(events)
    }

    /// Resign: the opponent wins immediately.
    pub fn resign(
        &mut self,
        color: Color,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        self.ensure_active()?;
        let result = GameResult::new(
            GameOutcome::win_for(color.opposite()),
            EndReason::Resignation,
        );
        Ok(vec![self.finish(GameStatus::Completed, Some(result), now)])
    }

    /// Voluntary leave mid-game. Same effect as resignation; the reason is
    /// kept distinct so clients can present it differently.
    pub fn exit(
        &mut self,
        color: Color,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        self.ensure_active()?;
        let result = GameResult::new(GameOutcome::win_for(color.opposite()), EndReason::PlayerExit);
        Ok(vec![self.finish(GameStatus::Completed, Some(result), now)])
    }

    /// Offer a draw. Offering while the opponent's offer is pending counts
    /// as accepting it.
    pub fn offer_draw(
        &mut self,
        color: Color,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        self.ensure_active()?;
        match self.draw_offer {
            Some(by) if by == color => Ok(Vec::new()),
            Some(_) => self.accept_draw(color, now),
            None => {
                self.draw_offer = Some(color);
                Ok(vec![SessionEvent::DrawOffered { by: color }])
            }
        }
    }

    /// Accept the opponent's pending draw offer.
    pub fn accept_draw(
        &mut self,
        color: Color,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionEvent>, SessionError> {
        self.ensure_active()?;
        match self.draw_offer {
            None => Err(SessionError::NoDrawOffer),
            Some(by) if by == color => Err(SessionError::OwnDrawOffer),
            Some(_) => {
                let result = GameResult::new(GameOutcome::Draw, EndReason::DrawAgreement);
                Ok(vec![self.finish(GameStatus::Completed, Some(result), now)])
            }
        }
    }

    /// Mark a seat as disconnected and arm its grace deadline.
    ///
    /// Idempotent; safe to call in any state. The remaining player is
    /// notified once when the game is active.
    pub fn handle_disconnect(
        &mut self,
        color: Color,
        now: DateTime<Utc>,
        grace: Duration,
    ) -> Vec<SessionEvent> {
        if self.status.is_terminal() {
            return Vec::new();
        }
        let deadline = now + clamped(grace);
        let already_down = match self.seat_mut(color) {
            Some(seat) => {
                let was_down = !seat.connected;
                seat.connected = false;
                if seat.disconnect_deadline.is_none() {
                    seat.disconnect_deadline = Some(deadline);
                }
                was_down
            }
            None => return Vec::new(),
        };

        let opponent_present = self
            .seat(color.opposite())
            .map(|s| s.connected)
            .unwrap_or(false);
        if self.status.is_active() && opponent_present && !already_down {
            vec![SessionEvent::OpponentDisconnected {
                remaining: color.opposite(),
            }]
        } else {
            Vec::new()
        }
    }

    /// Rebind a returning player's seat, cancelling the grace deadline.
    pub fn reconnect(&mut self, color: Color) {
        if let Some(seat) = self.seat_mut(color) {
            seat.connected = true;
            seat.disconnect_deadline = None;
        }
    }

    /// Settle clocks and fire time-based transitions.
    ///
    /// Runs from the host's periodic sweep. Detects the side to move running
    /// out of budget (timeout, exactly once) and expired disconnect grace
    /// deadlines.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<SessionEvent> {
        if !self.status.is_active() {
            return Vec::new();
        }

        let turn = self.position.turn();
        if self.clock.would_flag(turn, self.pending(now)) {
            let elapsed = self.pending(now);
            self.clock.charge(turn, elapsed);
            self.clock_anchor = Some(now);
            let result = GameResult::new(GameOutcome::win_for(turn.opposite()), EndReason::Timeout);
            return vec![self.finish(GameStatus::Completed, Some(result), now)];
        }

        for color in [Color::White, Color::Black] {
            let expired = self
                .seat(color)
                .and_then(|s| s.disconnect_deadline)
                .is_some_and(|deadline| deadline <= now);
            if !expired {
                continue;
            }
            let opponent_present = self
                .seat(color.opposite())
                .map(|s| s.connected)
                .unwrap_or(false);
            let event = if opponent_present {
                let result =
                    GameResult::new(GameOutcome::win_for(color.opposite()), EndReason::Disconnect);
                self.finish(GameStatus::Completed, Some(result), now)
            } else {
                self.finish(GameStatus::Abandoned, None, now)
            };
            return vec![event];
        }

        Vec::new()
    }

    /// Conservative terminal transition for internal invariant violations.
    pub fn mark_abandoned(&mut self, now: DateTime<Utc>) -> Vec<SessionEvent> {
        if self.status.is_terminal() {
            return Vec::new();
        }
        vec![self.finish(GameStatus::Abandoned, None, now)]
    }

    // --- Accessors ---

    /// The game's unique identifier.
    #[must_use]
    pub const fn game_id(&self) -> GameId {
        self.game_id
    }

    /// Current lifecycle status.
    #[must_use]
    pub const fn status(&self) -> GameStatus {
        self.status
    }

    /// Final result, if the game is over.
    #[must_use]
    pub const fn result(&self) -> Option<GameResult> {
        self.result
    }

    /// The time control this game is played at.
    #[must_use]
    pub const fn time_control(&self) -> TimeControl {
        self.time_control
    }

    /// Side to move on the current board.
    #[must_use]
    pub fn turn(&self) -> Color {
        self.position.turn()
    }

    /// Current board position as FEN.
    #[must_use]
    pub fn fen(&self) -> String {
        self.position.to_fen()
    }

    /// The applied moves, oldest first.
    #[must_use]
    pub fn moves(&self) -> &[MoveRecord] {
        &self.moves
    }

    /// The white player.
    #[must_use]
    pub const fn white_user(&self) -> &UserIdentity {
        &self.white.user
    }

    /// The black player, once seated.
    #[must_use]
    pub fn black_user(&self) -> Option<&UserIdentity> {
        self.black.as_ref().map(|s| &s.user)
    }

    /// The seat for the given color, if filled.
    #[must_use]
    pub fn seat(&self, color: Color) -> Option<&Seat> {
        match color {
            Color::White => Some(&self.white),
            Color::Black => self.black.as_ref(),
        }
    }

    /// Which color the given user plays, if they are in this game.
    #[must_use]
    pub fn color_of(&self, user_id: UserId) -> Option<Color> {
        if self.white.user.id == user_id {
            Some(Color::White)
        } else if self.black.as_ref().is_some_and(|s| s.user.id == user_id) {
            Some(Color::Black)
        } else {
            None
        }
    }

    /// When the session was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Consumed time for both sides in milliseconds, including the time the
    /// side to move has been thinking since the last settlement.
    #[must_use]
    pub fn times_ms(&self, now: DateTime<Utc>) -> (u64, u64) {
        let mut white = self.clock.consumed(Color::White);
        let mut black = self.clock.consumed(Color::Black);
        if self.status.is_active() {
            let pending = self.pending(now);
            match self.position.turn() {
                Color::White => white = (white + pending).min(self.clock.budget()),
                Color::Black => black = (black + pending).min(self.clock.budget()),
            }
        }
        (white.as_millis() as u64, black.as_millis() as u64)
    }

    /// Whether a terminal session has outlived its reconnect window and can
    /// be dropped from the directory.
    #[must_use]
    pub fn is_evictable(&self, now: DateTime<Utc>, delay: Duration) -> bool {
        match (self.status.is_terminal(), self.ended_at) {
            (true, Some(ended_at)) => ended_at + clamped(delay) <= now,
            _ => false,
        }
    }

    // --- Private helpers ---

    fn ensure_active(&self) -> Result<(), SessionError> {
        if self.status.is_active() {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                status: self.status,
            })
        }
    }

    /// Un-settled thinking time of the side to move.
    fn pending(&self, now: DateTime<Utc>) -> Duration {
        self.clock_anchor
            .map(|anchor| (now - anchor).to_std().unwrap_or_default())
            .unwrap_or_default()
    }

    fn seat_mut(&mut self, color: Color) -> Option<&mut Seat> {
        match color {
            Color::White => Some(&mut self.white),
            Color::Black => self.black.as_mut(),
        }
    }

    /// The only place terminal status is ever set.
    fn finish(
        &mut self,
        status: GameStatus,
        result: Option<GameResult>,
        now: DateTime<Utc>,
    ) -> SessionEvent {
        debug_assert!(status.is_terminal());
        debug_assert!(!self.status.is_terminal());
        self.status = status;
        self.result = result;
        self.ended_at = Some(now);
        self.clock_anchor = None;
        self.draw_offer = None;
        SessionEvent::Ended { status, result }
    }
}
