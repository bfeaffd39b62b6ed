//! Type definitions for the chess server core.
//!
//! ## Modules
//!
//! - `chess` - Chess types wrapping shakmaty (Color, Square, UciMove, ...)
//! - `game` - Game-related types (GameId, GameStatus, MoveRecord, ...)
//! - `user` - User identity types

pub mod chess;
pub mod game;
pub mod user;

// Re-export commonly used types
pub use chess::{Color, LegalMove, MoveInput, PieceType, Square, UciMove};
pub use game::{EndReason, GameId, GameOutcome, GameResult, GameStatus, MoveRecord, TimeControl};
pub use user::{UserId, UserIdentity};
