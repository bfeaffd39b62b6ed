//! Chess types wrapping shakmaty.
//!
//! This module provides serializable wrapper types around shakmaty's types,
//! suitable for use in session state and wire payloads.

use serde::{Deserialize, Serialize};

/// Chess piece color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    /// White pieces.
    White,
    /// Black pieces.
    Black,
}

impl Color {
    /// Get the opposite color.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    /// Returns true if this is white.
    #[must_use]
    pub const fn is_white(self) -> bool {
        matches!(self, Self::White)
    }
}

impl From<shakmaty::Color> for Color {
    fn from(c: shakmaty::Color) -> Self {
        match c {
            shakmaty::Color::White => Self::White,
            shakmaty::Color::Black => Self::Black,
        }
    }
}

impl From<Color> for shakmaty::Color {
    fn from(c: Color) -> Self {
        match c {
            Color::White => Self::White,
            Color::Black => Self::Black,
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::White => write!(f, "white"),
            Self::Black => write!(f, "black"),
        }
    }
}

/// Chess piece type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceType {
    /// Pawn.
    Pawn,
    /// Knight.
    Knight,
    /// Bishop.
    Bishop,
    /// Rook.
    Rook,
    /// Queen.
    Queen,
    /// King.
    King,
}

impl From<shakmaty::Role> for PieceType {
    fn from(r: shakmaty::Role) -> Self {
        match r {
            shakmaty::Role::Pawn => Self::Pawn,
            shakmaty::Role::Knight => Self::Knight,
            shakmaty::Role::Bishop => Self::Bishop,
            shakmaty::Role::Rook => Self::Rook,
            shakmaty::Role::Queen => Self::Queen,
            shakmaty::Role::King => Self::King,
        }
    }
}

impl std::fmt::Display for PieceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pawn => write!(f, "pawn"),
            Self::Knight => write!(f, "knight"),
            Self::Bishop => write!(f, "bishop"),
            Self::Rook => write!(f, "rook"),
            Self::Queen => write!(f, "queen"),
            Self::King => write!(f, "king"),
        }
    }
}

/// A square on the chess board (a1-h8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Square(u8);

impl Square {
    /// Create a square from file (0-7) and rank (0-7).
    #[must_use]
    pub const fn new(file: u8, rank: u8) -> Option<Self> {
        if file < 8 && rank < 8 {
            Some(Self(rank * 8 + file))
        } else {
            None
        }
    }

    /// Get the file (0-7, a-h).
    #[must_use]
    pub const fn file(self) -> u8 {
        self.0 % 8
    }

    /// Get the rank (0-7, 1-8).
    #[must_use]
    pub const fn rank(self) -> u8 {
        self.0 / 8
    }
}

impl std::fmt::Display for Square {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let file = (b'a' + self.file()) as char;
        let rank = (b'1' + self.rank()) as char;
        write!(f, "{file}{rank}")
    }
}

impl std::str::FromStr for Square {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 2 {
            return Err("square must be 2 characters");
        }
        let mut chars = s.chars();
        let file = chars.next().ok_or("missing file")?;
        let rank = chars.next().ok_or("missing rank")?;

        if !('a'..='h').contains(&file) {
            return Err("file must be a-h");
        }
        if !('1'..='8').contains(&rank) {
            return Err("rank must be 1-8");
        }

        let file_idx = (file as u8) - b'a';
        let rank_idx = (rank as u8) - b'1';

        Self::new(file_idx, rank_idx).ok_or("invalid square")
    }
}

/// A UCI move string (e.g., "e2e4", "e7e8q").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UciMove(String);

impl UciMove {
    /// Create a new UCI move from a string.
    /// Does basic format validation but not legality checking.
    pub fn new(s: impl Into<String>) -> Result<Self, &'static str> {
        let s = s.into();
        if s.len() < 4 || s.len() > 5 {
            return Err("UCI move must be 4-5 characters");
        }
        let _from: Square = s[0..2].parse()?;
        let _to: Square = s[2..4].parse()?;
        if s.len() == 5 {
            let promo = s.chars().nth(4).unwrap();
            if !['q', 'r', 'b', 'n'].contains(&promo) {
                return Err("promotion must be q, r, b, or n");
            }
        }
        Ok(Self(s))
    }

    /// Get the move as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the source square.
    #[must_use]
    pub fn from_square(&self) -> Square {
        self.0[0..2].parse().expect("validated in constructor")
    }

    /// Get the destination square.
    #[must_use]
    pub fn to_square(&self) -> Square {
        self.0[2..4].parse().expect("validated in constructor")
    }

    /// Get the promotion piece type, if any.
    #[must_use]
    pub fn promotion(&self) -> Option<PieceType> {
        self.0.chars().nth(4).map(|c| match c {
            'q' => PieceType::Queen,
            'r' => PieceType::Rook,
            'b' => PieceType::Bishop,
            'n' => PieceType::Knight,
            _ => unreachable!("validated in constructor"),
        })
    }
}

impl std::fmt::Display for UciMove {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UciMove {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// A candidate move as supplied by a client: origin and destination squares
/// plus an optional promotion piece letter.
///
/// The fields are kept as raw strings on purpose. Whatever a client sends
/// ends up here, and malformed input is reported the same way as an
/// illegal-per-rules move when [`MoveInput::to_uci`] rejects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveInput {
    /// Origin square (e.g. "e2").
    pub from: String,
    /// Destination square (e.g. "e4").
    pub to: String,
    /// Promotion piece letter ("q", "r", "b", "n") if applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
}

impl MoveInput {
    /// Create a move input from origin and destination squares.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            promotion: None,
        }
    }

    /// Create a promoting move input.
    #[must_use]
    pub fn with_promotion(
        from: impl Into<String>,
        to: impl Into<String>,
        promotion: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            promotion: Some(promotion.into()),
        }
    }

    /// Convert to a validated UCI move string.
    pub fn to_uci(&self) -> Result<UciMove, &'static str> {
        let mut s = String::with_capacity(5);
        s.push_str(&self.from);
        s.push_str(&self.to);
        if let Some(promo) = &self.promotion {
            s.push_str(promo);
        }
        UciMove::new(s)
    }
}

impl std::fmt::Display for MoveInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(promo) = &self.promotion {
            write!(f, "{promo}")?;
        }
        Ok(())
    }
}

/// Legal move information for snapshots and client hints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegalMove {
    /// UCI notation (e.g., "e2e4").
    pub uci: String,
    /// SAN notation (e.g., "e4").
    pub san: String,
    /// Source square.
    pub from: String,
    /// Destination square.
    pub to: String,
    /// Promotion piece if applicable.
    pub promotion: Option<PieceType>,
    /// Is this a capture?
    pub is_capture: bool,
    /// Is this a check?
    pub is_check: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_opposite() {
        assert_eq!(Color::White.opposite(), Color::Black);
        assert_eq!(Color::Black.opposite(), Color::White);
    }

    #[test]
    fn test_color_conversion() {
        let white = Color::White;
        let shak_white: shakmaty::Color = white.into();
        assert_eq!(shak_white, shakmaty::Color::White);

        let back: Color = shak_white.into();
        assert_eq!(back, Color::White);
    }

    #[test]
    fn test_square_roundtrip() {
        let sq = Square::new(4, 3).unwrap(); // e4
        assert_eq!(sq.file(), 4);
        assert_eq!(sq.rank(), 3);
        assert_eq!(sq.to_string(), "e4");

        let parsed: Square = "e4".parse().unwrap();
        assert_eq!(parsed, sq);
    }

    #[test]
    fn test_square_bounds() {
        assert!(Square::new(0, 0).is_some()); // a1
        assert!(Square::new(7, 7).is_some()); // h8
        assert!(Square::new(8, 0).is_none());
        assert!(Square::new(0, 8).is_none());
    }

    #[test]
    fn test_uci_move_valid() {
        let m = UciMove::new("e2e4").unwrap();
        assert_eq!(m.as_str(), "e2e4");
        assert_eq!(m.from_square().to_string(), "e2");
        assert_eq!(m.to_square().to_string(), "e4");
        assert!(m.promotion().is_none());

        let promo = UciMove::new("e7e8q").unwrap();
        assert_eq!(promo.promotion(), Some(PieceType::Queen));
    }

    #[test]
    fn test_uci_move_invalid() {
        assert!(UciMove::new("e2").is_err());
        assert!(UciMove::new("e2e4e5").is_err());
        assert!(UciMove::new("e2e4x").is_err());
        assert!(UciMove::new("i2i4").is_err());
        assert!(UciMove::new("e0e4").is_err());
    }

    #[test]
    fn test_move_input_to_uci() {
        let input = MoveInput::new("e2", "e4");
        assert_eq!(input.to_uci().unwrap().as_str(), "e2e4");

        let promo = MoveInput::with_promotion("e7", "e8", "q");
        assert_eq!(promo.to_uci().unwrap().as_str(), "e7e8q");

        let bad = MoveInput::new("zz", "e4");
        assert!(bad.to_uci().is_err());

        let bad_promo = MoveInput::with_promotion("e7", "e8", "k");
        assert!(bad_promo.to_uci().is_err());
    }

    #[test]
    fn test_move_input_deserialization() {
        let input: MoveInput = serde_json::from_str(r#"{"from":"e2","to":"e4"}"#).unwrap();
        assert_eq!(input, MoveInput::new("e2", "e4"));

        let promo: MoveInput =
            serde_json::from_str(r#"{"from":"a7","to":"a8","promotion":"n"}"#).unwrap();
        assert_eq!(promo.promotion.as_deref(), Some("n"));
    }
}
