//! Core domain records that travel on the wire.
//!
//! Everything a client can see about a room lives here: identities, the
//! room record itself, roster entries, votes, and the round outcome the
//! resolver hands back. The room crate owns the behavior; this module only
//! owns the shapes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Server-assigned identifier for a room.
///
/// Ids are handed out from a monotonically increasing counter, so a larger
/// id always means a more recently created room. `#[serde(transparent)]`
/// keeps it a plain number in JSON.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// An opaque wallet identity.
///
/// Addresses arrive pre-authenticated; the server never inspects their
/// format, it only compares them for equality.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    /// Wraps any string-like value as an address.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A human-readable room code: exactly six characters from `[A-Z0-9]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// The characters a code may contain.
    pub const ALPHABET: &'static [u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    /// Number of characters in a code.
    pub const LEN: usize = 6;

    /// Builds a code from six alphabet indices. Indices wrap modulo the
    /// alphabet size, so any `usize` is accepted.
    pub fn from_indices(indices: [usize; Self::LEN]) -> Self {
        let code = indices
            .iter()
            .map(|&i| Self::ALPHABET[i % Self::ALPHABET.len()] as char)
            .collect();
        Self(code)
    }

    /// Parses user input into a code.
    ///
    /// Surrounding whitespace is trimmed and letters are upper-cased, so
    /// `" ab12cd "` is accepted as `AB12CD`.
    pub fn parse(input: &str) -> Result<Self, ProtocolError> {
        let normalized = input.trim().to_ascii_uppercase();
        if normalized.len() != Self::LEN
            || !normalized.bytes().all(|b| Self::ALPHABET.contains(&b))
        {
            return Err(ProtocolError::InvalidRoomCode(input.to_string()));
        }
        Ok(Self(normalized))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Role and phase
// ---------------------------------------------------------------------------

/// Which team a player is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Thief,
    Police,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thief => write!(f, "thief"),
            Self::Police => write!(f, "police"),
        }
    }
}

/// The gameplay phase of a room.
///
/// ```text
/// Waiting --start--> Voting --resolve (not last)--> Voting
///                    Voting --resolve (last)------> Finished
/// ```
///
/// `Finished` is terminal for gameplay. Settlement is tracked separately
/// by the room's `finalized` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    Waiting,
    Voting,
    Finished,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Voting => write!(f, "voting"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A snapshot of one game room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub room_id: RoomId,
    pub creator: Address,
    pub room_code: RoomCode,
    pub started: bool,
    pub finalized: bool,
    /// `min_players_to_start` as it was when the room was created.
    pub required_min_players: u32,
    /// 0 before the game starts, then 1-based.
    pub current_round: u32,
    pub max_rounds: u32,
    pub game_phase: GamePhase,
    /// Voting deadline in epoch milliseconds. Only set while voting.
    pub phase_end_time: Option<u64>,
    /// Settlement correlation id, set when the game starts.
    pub game_id: Option<u64>,
    pub entry_fee: f64,
    /// Only set once the final round has been resolved.
    pub winning_path: Option<String>,
    pub vault: Option<f64>,
    pub winners: Option<Vec<Address>>,
    /// Creation time in epoch milliseconds.
    pub created_at: u64,
}

/// One member of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub address: Address,
    pub nickname: Option<String>,
    pub role: Role,
    /// Only thieves are ever eliminated.
    pub eliminated: bool,
    /// The choice this player made in each resolved round, in order.
    /// `"-"` marks a round the player sat out.
    pub moves: Vec<String>,
}

/// A player's vote for one round. At most one exists per
/// `(room, round, address)`; resubmitting overwrites `choice`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub round: u32,
    pub address: Address,
    pub choice: String,
    /// The voter's role when the vote was first cast.
    pub role: Role,
}

/// An entry in the active-rooms listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub creator: Address,
    pub entry_fee: f64,
    pub room_code: RoomCode,
    pub player_count: usize,
    pub started: bool,
}

/// The police team's running tally for a round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoliceSummary {
    pub total_votes: usize,
    pub choices: BTreeMap<String, usize>,
}

/// Returned by `create_room`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRoom {
    pub room_id: RoomId,
    pub room_code: RoomCode,
}

/// What happened when a round was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundOutcome {
    /// The round that was resolved.
    pub round: u32,
    pub winning_path: String,
    pub police_choice: String,
    pub eliminated_count: usize,
    pub eliminated: Vec<Address>,
    pub total_votes: usize,
    /// The phase the room is in after resolution.
    pub next_phase: GamePhase,
}

/// Whether the creator can currently pull the refund escape hatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundEligibility {
    pub eligible: bool,
    pub reason: Option<String>,
    pub blocks_remaining: u64,
    pub cooldown_blocks: u64,
    pub current_block: u64,
    pub start_block: u64,
    pub vault: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&RoomId(99)).unwrap();
        assert_eq!(json, "99");
    }

    #[test]
    fn test_room_id_display() {
        assert_eq!(RoomId(3).to_string(), "R-3");
    }

    #[test]
    fn test_address_serializes_as_plain_string() {
        let json = serde_json::to_string(&Address::new("0xabc")).unwrap();
        assert_eq!(json, "\"0xabc\"");
    }

    #[test]
    fn test_room_code_parse_normalizes_case_and_whitespace() {
        let code = RoomCode::parse("  ab12cd ").unwrap();
        assert_eq!(code.as_str(), "AB12CD");
    }

    #[test]
    fn test_room_code_parse_rejects_wrong_length() {
        assert!(RoomCode::parse("ABC").is_err());
        assert!(RoomCode::parse("ABCDEFG").is_err());
    }

    #[test]
    fn test_room_code_parse_rejects_symbols() {
        assert!(matches!(
            RoomCode::parse("AB-12C"),
            Err(ProtocolError::InvalidRoomCode(_))
        ));
    }

    #[test]
    fn test_room_code_from_indices_wraps() {
        let code = RoomCode::from_indices([0, 25, 26, 35, 36, 71]);
        assert_eq!(code.as_str(), "AZ09A9");
    }

    #[test]
    fn test_room_code_deserialize_validates() {
        let ok: RoomCode = serde_json::from_str("\"q1w2e3\"").unwrap();
        assert_eq!(ok.as_str(), "Q1W2E3");
        let bad: Result<RoomCode, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_role_and_phase_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Police).unwrap(), "\"police\"");
        assert_eq!(
            serde_json::to_string(&GamePhase::Finished).unwrap(),
            "\"finished\""
        );
    }

    #[test]
    fn test_police_summary_choices_are_ordered() {
        let mut summary = PoliceSummary::default();
        summary.choices.insert("Rooftops".into(), 1);
        summary.choices.insert("Back Alley".into(), 2);
        summary.total_votes = 3;
        let json = serde_json::to_string(&summary).unwrap();
        assert_eq!(
            json,
            r#"{"total_votes":3,"choices":{"Back Alley":2,"Rooftops":1}}"#
        );
    }
}
