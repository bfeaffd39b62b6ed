//! # Gambit Core
//!
//! Transport-free domain logic for a real-time chess server.
//!
//! ## Modules
//!
//! - `types` - Serializable chess and game types (Color, UciMove, GameId, ...)
//! - `engine` - Move validation and game-end detection via shakmaty
//! - `clock` - Per-side consumed-time accounting against a fixed budget
//! - `session` - The authoritative per-game state machine
//!
//! Every state transition in [`session`] is a plain function of
//! `(state, input, now)`, so the whole game lifecycle can be unit tested
//! without a socket in sight. Timestamps are always passed in by the caller.

pub mod clock;
pub mod engine;
pub mod session;
pub mod types;

pub use clock::GameClock;
pub use engine::{ChessError, ChessPosition, Outcome};
pub use session::{GameSession, Seat, SessionError, SessionEvent};
pub use types::{
    Color, EndReason, GameId, GameOutcome, GameResult, GameStatus, LegalMove, MoveInput,
    MoveRecord, PieceType, Square, TimeControl, UciMove, UserId, UserIdentity,
};
