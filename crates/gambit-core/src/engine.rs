//! Rules engine integration with shakmaty.
//!
//! This module is the one place the server talks to the chess rules library:
//! - Position management and FEN parsing
//! - Move validation and application
//! - Legal move generation
//! - Game end detection (checkmate, stalemate, draw conditions)

use shakmaty::{
    fen::Fen, san::San, uci::UciMove as ShakmatyUciMove, CastlingMode, Chess, Move, Position,
};
use thiserror::Error;

use crate::types::chess::{Color, LegalMove, UciMove};
use crate::types::game::{EndReason, GameOutcome, GameResult};

/// Errors that can occur during chess operations.
#[derive(Debug, Error)]
pub enum ChessError {
    /// Invalid FEN string.
    #[error("invalid FEN: {0}")]
    InvalidFen(String),

    /// Move is not legal in the current position.
    #[error("illegal move: {0}")]
    IllegalMove(String),

    /// Game is already over.
    #[error("game is already over")]
    GameOver,
}

/// The outcome of a chess game as detected on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Checkmate - the given color won.
    Checkmate(Color),
    /// Stalemate - draw.
    Stalemate,
    /// Insufficient material - draw.
    InsufficientMaterial,
    /// Fifty moves without a capture or pawn move - draw.
    FiftyMoveRule,
}

impl Outcome {
    /// Convert the board outcome into a game result.
    #[must_use]
    pub const fn to_result(self) -> GameResult {
        match self {
            Self::Checkmate(Color::White) => {
                GameResult::new(GameOutcome::WhiteWins, EndReason::Checkmate)
            }
            Self::Checkmate(Color::Black) => {
                GameResult::new(GameOutcome::BlackWins, EndReason::Checkmate)
            }
            Self::Stalemate => GameResult::new(GameOutcome::Draw, EndReason::Stalemate),
            Self::InsufficientMaterial => {
                GameResult::new(GameOutcome::Draw, EndReason::InsufficientMaterial)
            }
            Self::FiftyMoveRule => GameResult::new(GameOutcome::Draw, EndReason::FiftyMoveRule),
        }
    }
}

/// A chess position with move validation and game state tracking.
///
/// This wraps shakmaty with the small API the session state machine needs.
#[derive(Debug, Clone)]
pub struct ChessPosition {
    position: Chess,
}

impl ChessPosition {
    /// Create a new position from the standard starting position.
    #[must_use]
    pub fn new() -> Self {
        Self {
            position: Chess::default(),
        }
    }

    /// Create a position from a FEN string.
    pub fn from_fen(fen: &str) -> Result<Self, ChessError> {
        let fen: Fen = fen
            .parse()
            .map_err(|e| ChessError::InvalidFen(format!("{e}")))?;
        let position: Chess = fen
            .into_position(CastlingMode::Standard)
            .map_err(|e| ChessError::InvalidFen(format!("{e}")))?;
        Ok(Self { position })
    }

    /// Get the FEN string for the current position.
    #[must_use]
    pub fn to_fen(&self) -> String {
        Fen::from_position(self.position.clone(), shakmaty::EnPassantMode::Legal).to_string()
    }

    /// Get whose turn it is to move.
    #[must_use]
    pub fn turn(&self) -> Color {
        self.position.turn().into()
    }

    /// Check if the current player is in check.
    #[must_use]
    pub fn is_check(&self) -> bool {
        self.position.is_check()
    }

    /// Detect a terminal outcome in the current position, if any.
    ///
    /// The draw subset reported here: stalemate, insufficient material and
    /// the fifty-move rule (auto-applied once the halfmove clock reaches
    /// 100). Repetition is not tracked.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        if self.position.is_checkmate() {
            // The player to move is checkmated, so the other color wins
            Some(Outcome::Checkmate(self.turn().opposite()))
        } else if self.position.is_stalemate() {
            Some(Outcome::Stalemate)
        } else if self.position.is_insufficient_material() {
            Some(Outcome::InsufficientMaterial)
        } else if self.halfmove_clock() >= 100 {
            Some(Outcome::FiftyMoveRule)
        } else {
            None
        }
    }

    /// Check if the game is over.
    #[must_use]
    pub fn is_game_over(&self) -> bool {
        self.outcome().is_some()
    }

    /// Get all legal moves in the current position.
    #[must_use]
    pub fn legal_moves(&self) -> Vec<LegalMove> {
        let legals = self.position.legal_moves();
        legals.iter().map(|m| self.move_to_legal_move(m)).collect()
    }

    /// Validate and apply a move given in UCI notation.
    ///
    /// Returns the move in SAN notation if successful.
    pub fn play(&mut self, uci_move: &UciMove) -> Result<String, ChessError> {
        if self.is_game_over() {
            return Err(ChessError::GameOver);
        }

        let m = self.parse_uci_move(uci_move)?;

        // SAN must be rendered against the position before the move
        let san = San::from_move(&self.position, &m);

        if !self.position.is_legal(&m) {
            return Err(ChessError::IllegalMove(uci_move.to_string()));
        }

        self.position = self
            .position
            .clone()
            .play(&m)
            .map_err(|_| ChessError::IllegalMove(uci_move.to_string()))?;

        Ok(san.to_string())
    }

    /// Check whether a move would be legal without applying it.
    #[must_use]
    pub fn is_legal_move(&self, uci_move: &UciMove) -> bool {
        if self.is_game_over() {
            return false;
        }
        match self.parse_uci_move(uci_move) {
            Ok(m) => self.position.is_legal(&m),
            Err(_) => false,
        }
    }

    /// Get the halfmove clock (for the fifty-move rule).
    #[must_use]
    pub fn halfmove_clock(&self) -> u32 {
        self.position.halfmoves()
    }

    /// Get the fullmove number.
    #[must_use]
    pub fn fullmove_number(&self) -> u32 {
        self.position.fullmoves().get()
    }

    // --- Private helper methods ---

    /// Parse a UCI move string into a shakmaty Move.
    fn parse_uci_move(&self, uci_move: &UciMove) -> Result<Move, ChessError> {
        let shakmaty_uci: ShakmatyUciMove = uci_move
            .as_str()
            .parse()
            .map_err(|_| ChessError::IllegalMove(uci_move.to_string()))?;

        shakmaty_uci
            .to_move(&self.position)
            .map_err(|_| ChessError::IllegalMove(uci_move.to_string()))
    }

    /// Convert a shakmaty Move to our LegalMove type.
    fn move_to_legal_move(&self, m: &Move) -> LegalMove {
        let san = San::from_move(&self.position, m);
        let uci = ShakmatyUciMove::from_move(m, CastlingMode::Standard);

        // Check if this move would give check
        let mut pos_after = self.position.clone();
        pos_after.play_unchecked(m);
        let is_check = pos_after.is_check();

        LegalMove {
            uci: uci.to_string(),
            san: san.to_string(),
            from: m.from().map_or_else(String::new, |sq| sq.to_string()),
            to: m.to().to_string(),
            promotion: m.promotion().map(|r| r.into()),
            is_capture: m.is_capture(),
            is_check,
        }
    }
}

impl Default for ChessPosition {
    fn default() -> Self {
        Self::new()
    }
}
