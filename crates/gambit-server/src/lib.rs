//! # Gambit Server
//!
//! The coordination layer for real-time chess over WebSockets.
//!
//! ## Modules
//!
//! - `auth` - Auth collaborator seam (token -> user identity)
//! - `config` - Environment-driven server configuration
//! - `connection` - Connection ids and the connection registry
//! - `coordinator` - The single event-processing task that owns all state
//! - `directory` - gameId -> session ownership and connection routing
//! - `matchmaking` - FIFO queue pairing waiting players
//! - `protocol` - The `{type, payload}` wire envelope
//! - `server` - The axum WebSocket edge
//!
//! Everything mutable - registry, queue, directory - is owned by the
//! coordinator task and reached only through its event mailbox, so no
//! transition ever races another. The WebSocket edge does nothing but
//! authenticate, decode and forward.

pub mod auth;
pub mod config;
pub mod connection;
pub mod coordinator;
pub mod directory;
pub mod matchmaking;
pub mod protocol;
pub mod server;

pub use auth::{AuthError, Authenticator, TokenAuthenticator};
pub use config::{ConfigError, ServerConfig};
pub use connection::{ConnId, ConnectionRegistry};
pub use coordinator::{spawn_clock_sweep, Coordinator, ServerEvent};
pub use directory::SessionDirectory;
pub use matchmaking::{EnqueueOutcome, MatchmakingQueue, WaitingEntry};
pub use protocol::{ClientMessage, ProtocolError, ServerMessage};
pub use server::{app, AppState};
