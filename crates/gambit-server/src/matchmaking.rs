//! The matchmaking queue.
//!
//! Players asking for a random opponent wait here. Pairing is strictly FIFO:
//! a new arrival is matched against the oldest waiting entry, never anything
//! younger. Each waiting entry corresponds to an already-created session
//! sitting in `WaitingForSecondPlayer`, which is what lets the waiting
//! player share their game id as an invite link.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use gambit_core::{GameId, UserIdentity};

use crate::connection::ConnId;

/// A queued, unmatched player awaiting an opponent.
#[derive(Debug, Clone)]
pub struct WaitingEntry {
    /// Who is waiting.
    pub user: UserIdentity,
    /// The connection that asked.
    pub conn: ConnId,
    /// The pre-created waiting game this entry belongs to.
    pub game_id: GameId,
    /// When the player joined the queue.
    pub enqueued_at: DateTime<Utc>,
}

/// What `enqueue` decided.
#[derive(Debug)]
pub enum EnqueueOutcome {
    /// No opponent available; the player now waits under this game id.
    Queued {
        /// Id of the freshly created waiting game.
        game_id: GameId,
    },
    /// The player was already waiting; nothing changed.
    AlreadyWaiting {
        /// Id of the game they are already waiting under.
        game_id: GameId,
    },
    /// Matched: the oldest waiting entry was popped for pairing.
    Paired {
        /// The opponent who was waiting.
        entry: WaitingEntry,
    },
}

/// FIFO queue of players waiting for a random opponent.
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    waiting: VecDeque<WaitingEntry>,
}

impl MatchmakingQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a random opponent.
    ///
    /// `game_id` is the id to file a new waiting entry under if nobody is
    /// available. At most one entry exists per user: asking again while
    /// already queued is an idempotent no-op that reports the existing id.
    pub fn enqueue(
        &mut self,
        user: &UserIdentity,
        conn: ConnId,
        game_id: GameId,
        now: DateTime<Utc>,
    ) -> EnqueueOutcome {
        if let Some(existing) = self.waiting.iter().find(|e| e.user.id == user.id) {
            return EnqueueOutcome::AlreadyWaiting {
                game_id: existing.game_id,
            };
        }

        match self.waiting.pop_front() {
            Some(entry) => EnqueueOutcome::Paired { entry },
            None => {
                self.waiting.push_back(WaitingEntry {
                    user: user.clone(),
                    conn,
                    game_id,
                    enqueued_at: now,
                });
                EnqueueOutcome::Queued { game_id }
            }
        }
    }

    /// Remove a connection's waiting entry, if any. Safe on disconnect.
    pub fn cancel(&mut self, conn: ConnId) -> Option<WaitingEntry> {
        let index = self.waiting.iter().position(|e| e.conn == conn)?;
        self.waiting.remove(index)
    }

    /// Claim the waiting entry for a specific game (the invite-join path).
    pub fn take_by_game(&mut self, game_id: GameId) -> Option<WaitingEntry> {
        let index = self.waiting.iter().position(|e| e.game_id == game_id)?;
        self.waiting.remove(index)
    }

    /// Point an existing entry at a new connection (the waiting player
    /// refreshed their page).
    pub fn rebind_conn(&mut self, game_id: GameId, conn: ConnId) {
        if let Some(entry) = self.waiting.iter_mut().find(|e| e.game_id == game_id) {
            entry.conn = conn;
        }
    }

    /// Number of players waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    /// Whether anyone is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> UserIdentity {
        UserIdentity::guest(name)
    }

    #[test]
    fn test_first_arrival_waits() {
        let mut queue = MatchmakingQueue::new();
        let game_id = GameId::new();
        let outcome = queue.enqueue(&user("alice"), ConnId::new(1), game_id, Utc::now());
        assert!(matches!(outcome, EnqueueOutcome::Queued { game_id: id } if id == game_id));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_second_arrival_pairs_with_first() {
        let mut queue = MatchmakingQueue::new();
        let alice = user("alice");
        let waiting_id = GameId::new();
        queue.enqueue(&alice, ConnId::new(1), waiting_id, Utc::now());

        let outcome = queue.enqueue(&user("bob"), ConnId::new(2), GameId::new(), Utc::now());
        match outcome {
            EnqueueOutcome::Paired { entry } => {
                assert_eq!(entry.user.id, alice.id);
                assert_eq!(entry.game_id, waiting_id);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pairing_pops_the_oldest_entry() {
        let mut queue = MatchmakingQueue::new();
        let now = Utc::now();
        let older = WaitingEntry {
            user: user("alice"),
            conn: ConnId::new(1),
            game_id: GameId::new(),
            enqueued_at: now,
        };
        let newer = WaitingEntry {
            user: user("bob"),
            conn: ConnId::new(2),
            game_id: GameId::new(),
            enqueued_at: now + chrono::Duration::seconds(1),
        };
        queue.waiting.push_back(older.clone());
        queue.waiting.push_back(newer.clone());

        // Carol pairs with alice (front of the queue); bob keeps waiting.
        let outcome = queue.enqueue(&user("carol"), ConnId::new(3), GameId::new(), now);
        match outcome {
            EnqueueOutcome::Paired { entry } => assert_eq!(entry.user.id, older.user.id),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.waiting[0].user.id, newer.user.id);
    }

    #[test]
    fn test_double_enqueue_is_idempotent() {
        let mut queue = MatchmakingQueue::new();
        let alice = user("alice");
        let first_id = GameId::new();
        queue.enqueue(&alice, ConnId::new(1), first_id, Utc::now());

        // Same user again, even from another connection
        let outcome = queue.enqueue(&alice, ConnId::new(7), GameId::new(), Utc::now());
        assert!(matches!(outcome, EnqueueOutcome::AlreadyWaiting { game_id } if game_id == first_id));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_cancel() {
        let mut queue = MatchmakingQueue::new();
        queue.enqueue(&user("alice"), ConnId::new(1), GameId::new(), Utc::now());

        assert!(queue.cancel(ConnId::new(1)).is_some());
        assert!(queue.cancel(ConnId::new(1)).is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_take_by_game_and_rebind() {
        let mut queue = MatchmakingQueue::new();
        let game_id = GameId::new();
        queue.enqueue(&user("alice"), ConnId::new(1), game_id, Utc::now());

        queue.rebind_conn(game_id, ConnId::new(2));
        assert!(queue.cancel(ConnId::new(1)).is_none());

        let entry = queue.take_by_game(game_id).unwrap();
        assert_eq!(entry.conn, ConnId::new(2));
        assert!(queue.take_by_game(game_id).is_none());
    }
}
