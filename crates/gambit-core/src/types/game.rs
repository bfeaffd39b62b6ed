//! Game-related types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::chess::{Color, UciMove};

/// Unique identifier for a chess game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameId(Uuid);

impl GameId {
    /// Create a new random game ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a game ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for GameId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for GameId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle status of a game session.
///
/// `Completed` and `Abandoned` are terminal: once reached, the status never
/// changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// The session exists but only one seat is filled.
    WaitingForSecondPlayer,
    /// Both players are bound and the clocks are running.
    Active,
    /// The game finished with a result.
    Completed,
    /// The game died without a result (both players gone).
    Abandoned,
}

impl GameStatus {
    /// Returns true if the game can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }

    /// Returns true if moves can currently be made.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WaitingForSecondPlayer => write!(f, "waiting_for_second_player"),
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Who won, from the arbiter's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameOutcome {
    /// White player won.
    WhiteWins,
    /// Black player won.
    BlackWins,
    /// The game ended in a draw.
    Draw,
}

impl GameOutcome {
    /// The winning outcome for the given color.
    #[must_use]
    pub const fn win_for(color: Color) -> Self {
        match color {
            Color::White => Self::WhiteWins,
            Color::Black => Self::BlackWins,
        }
    }

    /// Returns the winning color if any.
    #[must_use]
    pub const fn winner(&self) -> Option<Color> {
        match self {
            Self::WhiteWins => Some(Color::White),
            Self::BlackWins => Some(Color::Black),
            Self::Draw => None,
        }
    }
}

impl std::fmt::Display for GameOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WhiteWins => write!(f, "WHITE_WINS"),
            Self::BlackWins => write!(f, "BLACK_WINS"),
            Self::Draw => write!(f, "DRAW"),
        }
    }
}

/// Why a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndReason {
    /// Checkmate on the board.
    Checkmate,
    /// Stalemate.
    Stalemate,
    /// Neither side can mate.
    InsufficientMaterial,
    /// Fifty moves without a capture or pawn move.
    FiftyMoveRule,
    /// A player resigned.
    Resignation,
    /// Both players agreed to a draw.
    DrawAgreement,
    /// A player ran out of time.
    Timeout,
    /// A player disconnected and did not return in time.
    Disconnect,
    /// A player left the game voluntarily.
    PlayerExit,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Checkmate => write!(f, "CHECKMATE"),
            Self::Stalemate => write!(f, "STALEMATE"),
            Self::InsufficientMaterial => write!(f, "INSUFFICIENT_MATERIAL"),
            Self::FiftyMoveRule => write!(f, "FIFTY_MOVE_RULE"),
            Self::Resignation => write!(f, "RESIGNATION"),
            Self::DrawAgreement => write!(f, "DRAW_AGREEMENT"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::Disconnect => write!(f, "DISCONNECT"),
            Self::PlayerExit => write!(f, "PLAYER_EXIT"),
        }
    }
}

/// Final verdict of a completed game: the outcome and how it came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    /// Who won (or draw).
    pub outcome: GameOutcome,
    /// Why the game ended.
    pub reason: EndReason,
}

impl GameResult {
    /// Create a result.
    #[must_use]
    pub const fn new(outcome: GameOutcome, reason: EndReason) -> Self {
        Self { outcome, reason }
    }
}

/// Time control settings for a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeControl {
    /// Initial budget per side, in seconds.
    pub initial_seconds: u32,
    /// Increment credited back per move, in seconds.
    pub increment_seconds: u32,
}

impl TimeControl {
    /// Bullet time control: 1 minute, no increment.
    pub const BULLET: Self = Self {
        initial_seconds: 60,
        increment_seconds: 0,
    };

    /// Blitz time control: 5 minutes + 3 second increment.
    pub const BLITZ: Self = Self {
        initial_seconds: 300,
        increment_seconds: 3,
    };

    /// Rapid time control: 10 minutes, no increment. The server default.
    pub const RAPID: Self = Self {
        initial_seconds: 600,
        increment_seconds: 0,
    };

    /// Create a custom time control.
    #[must_use]
    pub const fn new(initial_seconds: u32, increment_seconds: u32) -> Self {
        Self {
            initial_seconds,
            increment_seconds,
        }
    }

    /// Get the initial budget as a Duration.
    #[must_use]
    pub const fn initial_time(&self) -> Duration {
        Duration::from_secs(self.initial_seconds as u64)
    }

    /// Get the increment as a Duration.
    #[must_use]
    pub const fn increment(&self) -> Duration {
        Duration::from_secs(self.increment_seconds as u64)
    }

    /// Parse time control from a string like "5+3" (5 min + 3 sec increment).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split('+').collect();
        if parts.len() != 2 {
            return None;
        }
        let initial: u32 = parts[0].trim().parse().ok()?;
        let increment: u32 = parts[1].trim().parse().ok()?;
        Some(Self::new(initial * 60, increment))
    }
}

impl Default for TimeControl {
    fn default() -> Self {
        Self::RAPID
    }
}

impl std::fmt::Display for TimeControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}+{}",
            self.initial_seconds / 60,
            self.increment_seconds
        )
    }
}

/// Record of a single applied move.
///
/// The move history is append-only; replaying it from the starting position
/// reconstructs the current board exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Half-move index, 1-based (white's first move is ply 1).
    pub ply: u16,
    /// Color that made the move.
    pub color: Color,
    /// The move in UCI notation (e.g., "g1f3").
    pub uci: UciMove,
    /// Standard Algebraic Notation (e.g., "Nf3", "O-O").
    pub san: String,
    /// FEN string after the move.
    pub fen_after: String,
    /// Time the player spent deciding on this move.
    pub time_taken: Duration,
    /// When the move was applied.
    pub played_at: DateTime<Utc>,
}
