//! The session directory.
//!
//! Owns every live [`GameSession`] keyed by game id, plus the advisory
//! connection -> game routing table. Ownership lives only in the id-keyed
//! map; the routing table exists so inbound events find their session in
//! O(1) and is rebuilt freely as connections come and go.
//!
//! The directory is owned by the coordinator task, so inserts and lookups
//! can never interleave.

use std::collections::HashMap;

use tracing::{debug, warn};

use gambit_core::{Color, GameId, GameSession};

use crate::connection::ConnId;

/// A directory slot: the session plus the connections bound to its seats.
#[derive(Debug)]
pub struct SessionEntry {
    /// The authoritative game state.
    pub session: GameSession,
    white_conn: Option<ConnId>,
    black_conn: Option<ConnId>,
}

impl SessionEntry {
    fn new(session: GameSession) -> Self {
        Self {
            session,
            white_conn: None,
            black_conn: None,
        }
    }

    /// The connection currently bound to the given seat.
    #[must_use]
    pub fn conn_for(&self, color: Color) -> Option<ConnId> {
        match color {
            Color::White => self.white_conn,
            Color::Black => self.black_conn,
        }
    }

    /// Which seat a connection is bound to, if any.
    #[must_use]
    pub fn color_for(&self, conn: ConnId) -> Option<Color> {
        if self.white_conn == Some(conn) {
            Some(Color::White)
        } else if self.black_conn == Some(conn) {
            Some(Color::Black)
        } else {
            None
        }
    }

    /// All connections currently bound to this game.
    pub fn bound_conns(&self) -> impl Iterator<Item = ConnId> + '_ {
        self.white_conn.into_iter().chain(self.black_conn)
    }

    fn set_conn(&mut self, color: Color, conn: Option<ConnId>) -> Option<ConnId> {
        let slot = match color {
            Color::White => &mut self.white_conn,
            Color::Black => &mut self.black_conn,
        };
        std::mem::replace(slot, conn)
    }
}

/// gameId -> session ownership plus connection routing.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    sessions: HashMap<GameId, SessionEntry>,
    routes: HashMap<ConnId, GameId>,
}

impl SessionDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a new session.
    pub fn insert(&mut self, session: GameSession) {
        let game_id = session.game_id();
        if self
            .sessions
            .insert(game_id, SessionEntry::new(session))
            .is_some()
        {
            warn!(%game_id, "session id collision; previous session replaced");
        }
    }

    /// Remove a session, dropping every route that pointed at it.
    pub fn remove(&mut self, game_id: GameId) -> Option<SessionEntry> {
        let entry = self.sessions.remove(&game_id)?;
        for conn in entry.bound_conns() {
            self.routes.remove(&conn);
        }
        Some(entry)
    }

    /// Look up a session entry.
    #[must_use]
    pub fn entry(&self, game_id: GameId) -> Option<&SessionEntry> {
        self.sessions.get(&game_id)
    }

    /// Look up a session entry mutably.
    pub fn entry_mut(&mut self, game_id: GameId) -> Option<&mut SessionEntry> {
        self.sessions.get_mut(&game_id)
    }

    /// Convenience access to a session.
    #[must_use]
    pub fn session(&self, game_id: GameId) -> Option<&GameSession> {
        self.sessions.get(&game_id).map(|e| &e.session)
    }

    /// The game a connection is routed to, if any.
    #[must_use]
    pub fn route_for(&self, conn: ConnId) -> Option<GameId> {
        self.routes.get(&conn).copied()
    }

    /// Bind a connection to a seat, replacing whatever was bound there.
    ///
    /// A connection is routed to at most one game: if `conn` was bound
    /// elsewhere it is unbound first.
    pub fn bind(&mut self, game_id: GameId, color: Color, conn: ConnId) {
        if let Some(previous) = self.route_for(conn) {
            if previous != game_id {
                debug!(%conn, %previous, %game_id, "connection rebound to a new game");
                self.unbind(conn);
            }
        }
        let Some(entry) = self.sessions.get_mut(&game_id) else {
            warn!(%game_id, "bind for unknown game ignored");
            return;
        };
        // The seat's previous connection (a dead socket on rejoin) loses
        // its route.
        if let Some(old) = entry.set_conn(color, Some(conn)) {
            if old != conn {
                self.routes.remove(&old);
            }
        }
        self.routes.insert(conn, game_id);
    }

    /// Unbind a connection from whatever seat it holds. Idempotent.
    pub fn unbind(&mut self, conn: ConnId) -> Option<(GameId, Color)> {
        let game_id = self.routes.remove(&conn)?;
        let entry = self.sessions.get_mut(&game_id)?;
        let color = entry.color_for(conn)?;
        entry.set_conn(color, None);
        Some((game_id, color))
    }

    /// Ids of every session currently in the directory.
    #[must_use]
    pub fn game_ids(&self) -> Vec<GameId> {
        self.sessions.keys().copied().collect()
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the directory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gambit_core::{TimeControl, UserIdentity};

    fn session() -> GameSession {
        GameSession::new(
            GameId::new(),
            UserIdentity::guest("alice"),
            TimeControl::RAPID,
            Utc::now(),
        )
    }

    #[test]
    fn test_insert_and_route() {
        let mut directory = SessionDirectory::new();
        let session = session();
        let game_id = session.game_id();
        directory.insert(session);

        let conn = ConnId::new(1);
        directory.bind(game_id, Color::White, conn);

        assert_eq!(directory.route_for(conn), Some(game_id));
        assert_eq!(
            directory.entry(game_id).unwrap().color_for(conn),
            Some(Color::White)
        );
        assert_eq!(
            directory.entry(game_id).unwrap().conn_for(Color::White),
            Some(conn)
        );
    }

    #[test]
    fn test_one_route_per_connection() {
        let mut directory = SessionDirectory::new();
        let first = session();
        let second = session();
        let (id_a, id_b) = (first.game_id(), second.game_id());
        directory.insert(first);
        directory.insert(second);

        let conn = ConnId::new(1);
        directory.bind(id_a, Color::White, conn);
        directory.bind(id_b, Color::White, conn);

        // The newer binding wins and the old seat is vacated
        assert_eq!(directory.route_for(conn), Some(id_b));
        assert_eq!(directory.entry(id_a).unwrap().conn_for(Color::White), None);
    }

    #[test]
    fn test_rejoin_replaces_seat_connection() {
        let mut directory = SessionDirectory::new();
        let session = session();
        let game_id = session.game_id();
        directory.insert(session);

        let stale = ConnId::new(1);
        let fresh = ConnId::new(2);
        directory.bind(game_id, Color::White, stale);
        directory.bind(game_id, Color::White, fresh);

        assert_eq!(directory.route_for(stale), None);
        assert_eq!(directory.route_for(fresh), Some(game_id));
        assert_eq!(
            directory.entry(game_id).unwrap().conn_for(Color::White),
            Some(fresh)
        );
    }

    #[test]
    fn test_remove_cleans_routes() {
        let mut directory = SessionDirectory::new();
        let session = session();
        let game_id = session.game_id();
        directory.insert(session);

        let conn = ConnId::new(1);
        directory.bind(game_id, Color::White, conn);
        directory.remove(game_id);

        assert!(directory.is_empty());
        assert_eq!(directory.route_for(conn), None);
    }

    #[test]
    fn test_unbind_is_idempotent() {
        let mut directory = SessionDirectory::new();
        let session = session();
        let game_id = session.game_id();
        directory.insert(session);

        let conn = ConnId::new(1);
        directory.bind(game_id, Color::White, conn);

        assert_eq!(directory.unbind(conn), Some((game_id, Color::White)));
        assert_eq!(directory.unbind(conn), None);
    }
}
