//! The wire protocol.
//!
//! Every frame is a JSON envelope `{ "type": string, "payload": object }`.
//! Inbound frames are decoded leniently (a missing payload is only an error
//! for message types that need one); outbound frames are serde tagged enums.
//! Field names follow the clients' camelCase convention.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gambit_core::{
    EndReason, GameId, GameOutcome, GameResult, GameSession, GameStatus, MoveInput, MoveRecord,
    PieceType, UserIdentity,
};

/// Errors raised while decoding an inbound frame.
///
/// These never terminate the connection; the offending frame is dropped and
/// the sender gets an alert.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame was not a valid message envelope.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The envelope's `type` is not one we know.
    #[error("unknown message type: {0}")]
    UnknownType(String),
}

/// Client -> server messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Join the matchmaking queue for a random opponent.
    InitGame,
    /// Join a specific game: take the open seat or rejoin a running game.
    JoinRoom {
        /// The game to join.
        game_id: GameId,
    },
    /// Play a move.
    Move {
        /// The game the move belongs to.
        game_id: GameId,
        /// The candidate move.
        mv: MoveInput,
    },
    /// Resign the game.
    Resign {
        /// The game being resigned.
        game_id: GameId,
    },
    /// Leave the game (or cancel the wait for an opponent).
    ExitGame {
        /// The game being left.
        game_id: GameId,
    },
    /// Offer the opponent a draw.
    OfferDraw {
        /// The game the offer applies to.
        game_id: GameId,
    },
    /// Accept the opponent's draw offer.
    AcceptDraw {
        /// The game the offer applies to.
        game_id: GameId,
    },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameRef {
    game_id: GameId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MovePayload {
    game_id: GameId,
    #[serde(rename = "move")]
    mv: MoveInput,
}

impl ClientMessage {
    /// Decode one inbound text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(text)?;
        let message = match envelope.kind.as_str() {
            "init_game" => Self::InitGame,
            "join_room" => {
                let p: GameRef = serde_json::from_value(envelope.payload)?;
                Self::JoinRoom { game_id: p.game_id }
            }
            "move" => {
                let p: MovePayload = serde_json::from_value(envelope.payload)?;
                Self::Move {
                    game_id: p.game_id,
                    mv: p.mv,
                }
            }
            "resign" => {
                let p: GameRef = serde_json::from_value(envelope.payload)?;
                Self::Resign { game_id: p.game_id }
            }
            "exit_game" => {
                let p: GameRef = serde_json::from_value(envelope.payload)?;
                Self::ExitGame { game_id: p.game_id }
            }
            "offer_draw" => {
                let p: GameRef = serde_json::from_value(envelope.payload)?;
                Self::OfferDraw { game_id: p.game_id }
            }
            "accept_draw" => {
                let p: GameRef = serde_json::from_value(envelope.payload)?;
                Self::AcceptDraw { game_id: p.game_id }
            }
            other => return Err(ProtocolError::UnknownType(other.to_string())),
        };
        Ok(message)
    }
}

/// Player metadata as shown to the opponent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMeta {
    /// The player's id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Whether this is a guest account.
    pub is_guest: bool,
}

impl From<&UserIdentity> for PlayerMeta {
    fn from(user: &UserIdentity) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.display_name.clone(),
            is_guest: user.is_guest,
        }
    }
}

/// A move as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMove {
    /// Origin square.
    pub from: String,
    /// Destination square.
    pub to: String,
    /// Promotion piece letter if applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
    /// The move in SAN, for move lists.
    pub san: String,
}

impl From<&MoveRecord> for WireMove {
    fn from(record: &MoveRecord) -> Self {
        Self {
            from: record.uci.from_square().to_string(),
            to: record.uci.to_square().to_string(),
            promotion: record.uci.promotion().map(promotion_letter),
            san: record.san.clone(),
        }
    }
}

fn promotion_letter(piece: PieceType) -> String {
    match piece {
        PieceType::Queen => "q",
        PieceType::Rook => "r",
        PieceType::Bishop => "b",
        PieceType::Knight => "n",
        PieceType::Pawn | PieceType::King => "q",
    }
    .to_string()
}

/// The `status` field of a `game_ended` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndStatus {
    /// The game finished over the board or by agreement/resignation.
    Completed,
    /// A player left voluntarily.
    PlayerExit,
    /// A player ran out of time.
    Timeout,
    /// Both players vanished.
    Abandoned,
}

/// Server -> client messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    /// You are queued; share the id or wait for an opponent.
    #[serde(rename_all = "camelCase")]
    GameAdded {
        /// Id of the game awaiting an opponent.
        game_id: GameId,
    },
    /// A game started with you in it.
    #[serde(rename_all = "camelCase")]
    InitGame {
        /// The game's id.
        game_id: GameId,
        /// Who plays white.
        white_player: PlayerMeta,
        /// Who plays black.
        black_player: PlayerMeta,
    },
    /// Full state snapshot after joining or rejoining a game.
    #[serde(rename_all = "camelCase")]
    GameJoined {
        /// The game's id.
        game_id: GameId,
        /// Who plays white.
        white_player: PlayerMeta,
        /// Who plays black.
        black_player: PlayerMeta,
        /// Moves so far, oldest first.
        moves: Vec<WireMove>,
        /// White's consumed time in milliseconds.
        player1_time_consumed: u64,
        /// Black's consumed time in milliseconds.
        player2_time_consumed: u64,
    },
    /// A move was applied in your game.
    #[serde(rename_all = "camelCase")]
    Move {
        /// The applied move.
        #[serde(rename = "move")]
        mv: WireMove,
        /// White's consumed time in milliseconds.
        player1_time_consumed: u64,
        /// Black's consumed time in milliseconds.
        player2_time_consumed: u64,
    },
    /// Periodic clock sync.
    #[serde(rename_all = "camelCase")]
    GameTime {
        /// White's consumed time in milliseconds.
        player1_time: u64,
        /// Black's consumed time in milliseconds.
        player2_time: u64,
    },
    /// The game reached a terminal state.
    GameEnded {
        /// Coarse classification of how it ended.
        status: EndStatus,
        /// Who won, if there is a verdict.
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<GameOutcome>,
        /// The precise reason, if there is a verdict.
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<EndReason>,
    },
    /// Your opponent's flag fell.
    UserTimeout {
        /// The resulting verdict.
        win: GameOutcome,
    },
    /// Your opponent's connection dropped; the game is on a grace timer.
    OpponentDisconnected,
    /// The referenced game does not exist (or has been evicted).
    #[serde(rename_all = "camelCase")]
    GameNotFound {
        /// The id that failed to resolve.
        game_id: GameId,
    },
    /// Advisory text for this connection only.
    GameAlert {
        /// Human-readable explanation.
        message: String,
    },
}

impl ServerMessage {
    /// Compose a `move` broadcast from an applied move record.
    #[must_use]
    pub fn move_applied(record: &MoveRecord, white_ms: u64, black_ms: u64) -> Self {
        Self::Move {
            mv: WireMove::from(record),
            player1_time_consumed: white_ms,
            player2_time_consumed: black_ms,
        }
    }

    /// Compose an `init_game` notification from a started session.
    ///
    /// Returns `None` while the second seat is still open.
    #[must_use]
    pub fn init_game(session: &GameSession) -> Option<Self> {
        let black = session.black_user()?;
        Some(Self::InitGame {
            game_id: session.game_id(),
            white_player: PlayerMeta::from(session.white_user()),
            black_player: PlayerMeta::from(black),
        })
    }

    /// Compose the full-state `game_joined` snapshot for one connection.
    ///
    /// Returns `None` while the second seat is still open.
    #[must_use]
    pub fn game_joined(session: &GameSession, now: DateTime<Utc>) -> Option<Self> {
        let black = session.black_user()?;
        let (white_ms, black_ms) = session.times_ms(now);
        Some(Self::GameJoined {
            game_id: session.game_id(),
            white_player: PlayerMeta::from(session.white_user()),
            black_player: PlayerMeta::from(black),
            moves: session.moves().iter().map(WireMove::from).collect(),
            player1_time_consumed: white_ms,
            player2_time_consumed: black_ms,
        })
    }

    /// Compose the `game_ended` broadcast for a terminal transition.
    #[must_use]
    pub fn game_ended(status: GameStatus, result: Option<GameResult>) -> Self {
        let end_status = match (status, result) {
            (GameStatus::Abandoned, _) => EndStatus::Abandoned,
            (_, Some(r)) if r.reason == EndReason::Timeout => EndStatus::Timeout,
            (_, Some(r)) if r.reason == EndReason::PlayerExit => EndStatus::PlayerExit,
            _ => EndStatus::Completed,
        };
        Self::GameEnded {
            status: end_status,
            result: result.map(|r| r.outcome),
            reason: result.map(|r| r.reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gambit_core::{TimeControl, UserId};

    #[test]
    fn test_parse_init_game() {
        // With and without a payload
        assert_eq!(
            ClientMessage::parse(r#"{"type":"init_game"}"#).unwrap(),
            ClientMessage::InitGame
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"init_game","payload":{}}"#).unwrap(),
            ClientMessage::InitGame
        );
    }

    #[test]
    fn test_parse_move() {
        let game_id = GameId::new();
        let text = format!(
            r#"{{"type":"move","payload":{{"gameId":"{game_id}","move":{{"from":"e2","to":"e4"}}}}}}"#
        );
        let message = ClientMessage::parse(&text).unwrap();
        assert_eq!(
            message,
            ClientMessage::Move {
                game_id,
                mv: MoveInput::new("e2", "e4"),
            }
        );
    }

    #[test]
    fn test_parse_game_scoped_messages() {
        let game_id = GameId::new();
        for (kind, expected) in [
            ("join_room", ClientMessage::JoinRoom { game_id }),
            ("resign", ClientMessage::Resign { game_id }),
            ("exit_game", ClientMessage::ExitGame { game_id }),
            ("offer_draw", ClientMessage::OfferDraw { game_id }),
            ("accept_draw", ClientMessage::AcceptDraw { game_id }),
        ] {
            let text = format!(r#"{{"type":"{kind}","payload":{{"gameId":"{game_id}"}}}}"#);
            assert_eq!(ClientMessage::parse(&text).unwrap(), expected);
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            ClientMessage::parse("not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"type":"dance"}"#),
            Err(ProtocolError::UnknownType(_))
        ));
        // A game-scoped message without its payload
        assert!(matches!(
            ClientMessage::parse(r#"{"type":"resign"}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_game_added_wire_shape() {
        let game_id = GameId::new();
        let json = serde_json::to_value(ServerMessage::GameAdded { game_id }).unwrap();
        assert_eq!(json["type"], "game_added");
        assert_eq!(json["payload"]["gameId"], game_id.to_string());
    }

    #[test]
    fn test_move_wire_shape() {
        let record = sample_record();
        let json =
            serde_json::to_value(ServerMessage::move_applied(&record, 1_500, 0)).unwrap();
        assert_eq!(json["type"], "move");
        assert_eq!(json["payload"]["move"]["from"], "e2");
        assert_eq!(json["payload"]["move"]["to"], "e4");
        assert_eq!(json["payload"]["player1TimeConsumed"], 1_500);
        assert_eq!(json["payload"]["player2TimeConsumed"], 0);
        // No promotion on a quiet pawn push
        assert!(json["payload"]["move"]["promotion"].is_null());
    }

    #[test]
    fn test_game_ended_wire_shape() {
        let result = GameResult::new(GameOutcome::WhiteWins, EndReason::Checkmate);
        let json = serde_json::to_value(ServerMessage::game_ended(
            GameStatus::Completed,
            Some(result),
        ))
        .unwrap();
        assert_eq!(json["type"], "game_ended");
        assert_eq!(json["payload"]["status"], "COMPLETED");
        assert_eq!(json["payload"]["result"], "WHITE_WINS");
        assert_eq!(json["payload"]["reason"], "CHECKMATE");
    }

    #[test]
    fn test_game_ended_status_classification() {
        let timeout = GameResult::new(GameOutcome::BlackWins, EndReason::Timeout);
        match ServerMessage::game_ended(GameStatus::Completed, Some(timeout)) {
            ServerMessage::GameEnded { status, .. } => assert_eq!(status, EndStatus::Timeout),
            other => panic!("unexpected message: {other:?}"),
        }

        let exit = GameResult::new(GameOutcome::WhiteWins, EndReason::PlayerExit);
        match ServerMessage::game_ended(GameStatus::Completed, Some(exit)) {
            ServerMessage::GameEnded { status, .. } => assert_eq!(status, EndStatus::PlayerExit),
            other => panic!("unexpected message: {other:?}"),
        }

        match ServerMessage::game_ended(GameStatus::Abandoned, None) {
            ServerMessage::GameEnded { status, result, .. } => {
                assert_eq!(status, EndStatus::Abandoned);
                assert!(result.is_none());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_opponent_disconnected_has_no_payload() {
        let json = serde_json::to_value(ServerMessage::OpponentDisconnected).unwrap();
        assert_eq!(json["type"], "opponent_disconnected");
        assert!(json.get("payload").is_none());
    }

    #[test]
    fn test_init_game_snapshot_helpers() {
        let now = Utc::now();
        let mut session = GameSession::new(
            GameId::new(),
            UserIdentity::new(UserId::new(), "alice"),
            TimeControl::RAPID,
            now,
        );
        // One seat open: nothing to announce yet
        assert!(ServerMessage::init_game(&session).is_none());
        assert!(ServerMessage::game_joined(&session, now).is_none());

        session.join(UserIdentity::guest("bob"), now).unwrap();
        let init = ServerMessage::init_game(&session).unwrap();
        match init {
            ServerMessage::InitGame {
                white_player,
                black_player,
                ..
            } => {
                assert_eq!(white_player.name, "alice");
                assert!(!white_player.is_guest);
                assert_eq!(black_player.name, "bob");
                assert!(black_player.is_guest);
            }
            other => panic!("unexpected message: {other:?}"),
        }

        let joined = ServerMessage::game_joined(&session, now).unwrap();
        match joined {
            ServerMessage::GameJoined { moves, .. } => assert!(moves.is_empty()),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    fn sample_record() -> MoveRecord {
        let mut session = GameSession::new(
            GameId::new(),
            UserIdentity::guest("alice"),
            TimeControl::RAPID,
            Utc::now(),
        );
        session.join(UserIdentity::guest("bob"), Utc::now()).unwrap();
        session
            .apply_move(
                gambit_core::Color::White,
                &MoveInput::new("e2", "e4"),
                Utc::now(),
            )
            .unwrap();
        session.moves()[0].clone()
    }
}
