//! Connection identity and the connection registry.
//!
//! A [`ConnId`] stands in for one live transport connection. The registry
//! maps it to the authenticated identity and the outbound channel feeding
//! that connection's writer task. It is owned by the coordinator; nothing
//! else touches it.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use gambit_core::UserIdentity;

use crate::protocol::ServerMessage;

/// Opaque handle for one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

impl ConnId {
    /// Wrap a raw connection number.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// One registered connection.
#[derive(Debug)]
pub struct Connection {
    /// The authenticated user behind this connection.
    pub user: UserIdentity,
    outbound: mpsc::UnboundedSender<ServerMessage>,
}

/// Maps live connections to identities and outbound channels.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnId, Connection>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly authenticated connection.
    pub fn register(
        &mut self,
        conn: ConnId,
        user: UserIdentity,
        outbound: mpsc::UnboundedSender<ServerMessage>,
    ) {
        if self
            .connections
            .insert(conn, Connection { user, outbound })
            .is_some()
        {
            warn!(%conn, "connection id registered twice; replacing");
        }
    }

    /// Drop a connection. Idempotent.
    pub fn unregister(&mut self, conn: ConnId) -> Option<Connection> {
        self.connections.remove(&conn)
    }

    /// The identity behind a connection, if it is still registered.
    #[must_use]
    pub fn user(&self, conn: ConnId) -> Option<&UserIdentity> {
        self.connections.get(&conn).map(|c| &c.user)
    }

    /// Fire-and-forget delivery of one outbound message.
    ///
    /// Delivery failure means the writer task is gone; the disconnect event
    /// is already on its way, so this just logs.
    pub fn send(&self, conn: ConnId, message: ServerMessage) {
        match self.connections.get(&conn) {
            Some(connection) => {
                if connection.outbound.send(message).is_err() {
                    debug!(%conn, "outbound channel closed; dropping message");
                }
            }
            None => debug!(%conn, "message for unknown connection dropped"),
        }
    }

    /// Number of live connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether any connections are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_send() {
        let mut registry = ConnectionRegistry::new();
        let conn = ConnId::new(1);
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(conn, UserIdentity::guest("alice"), tx);

        assert_eq!(registry.user(conn).unwrap().display_name, "alice");

        registry.send(
            conn,
            ServerMessage::GameAlert {
                message: "hello".into(),
            },
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerMessage::GameAlert { .. }
        ));
    }

    #[test]
    fn test_send_to_unknown_is_quiet() {
        let registry = ConnectionRegistry::new();
        // Must not panic
        registry.send(
            ConnId::new(99),
            ServerMessage::GameAlert {
                message: "anyone there?".into(),
            },
        );
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut registry = ConnectionRegistry::new();
        let conn = ConnId::new(1);
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register(conn, UserIdentity::guest("alice"), tx);

        assert!(registry.unregister(conn).is_some());
        assert!(registry.unregister(conn).is_none());
        assert!(registry.is_empty());
    }
}
