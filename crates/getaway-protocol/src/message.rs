//! Message envelopes and the request/reply vocabulary.
//!
//! Every frame on the wire is an [`Envelope`]. After the handshake, a
//! client sends [`Request`]s and the server answers each one with exactly
//! one [`Payload::Reply`] or [`Payload::Failure`] carrying the request's
//! `seq` as `reply_to`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    Address, CreatedRoom, GameConfig, GameConfigUpdate, Player, PoliceSummary,
    RefundEligibility, Role, Room, RoomId, RoomSummary, RoundOutcome, Vote,
};

// ---------------------------------------------------------------------------
// SystemMessage: connection plumbing
// ---------------------------------------------------------------------------

/// Connection-level messages: handshake, heartbeat, disconnect, errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    /// Client → Server. `address` is the caller's wallet identity for the
    /// rest of the connection.
    Handshake { version: u32, address: Address },

    /// Server → Client.
    HandshakeAck { address: Address, server_time: u64 },

    /// Either direction.
    Disconnect { reason: String },

    Heartbeat { client_time: u64 },

    HeartbeatAck { client_time: u64, server_time: u64 },

    /// Server → Client: a connection-level problem not tied to a request.
    /// `code` follows HTTP conventions.
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Request: one per room/player/vote operation
// ---------------------------------------------------------------------------

/// An operation requested by the connected caller.
///
/// The caller's identity is never part of the request; it comes from the
/// connection's handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    CreateRoom {
        nickname: Option<String>,
        role: Role,
    },
    JoinRoom {
        room_code: String,
        nickname: Option<String>,
        role: Role,
    },
    GetRoomByCode {
        room_code: String,
    },
    GetRoom {
        room_id: RoomId,
    },
    GetRoomPlayers {
        room_id: RoomId,
    },
    StartGame {
        room_id: RoomId,
        entry_fee: f64,
        game_id: u64,
    },
    SubmitVote {
        room_id: RoomId,
        choice: String,
    },
    GetRoundVotes {
        room_id: RoomId,
        round: u32,
    },
    GetPlayerVote {
        room_id: RoomId,
        round: u32,
    },
    GetPoliceSummary {
        room_id: RoomId,
        round: u32,
    },
    ResolveRound {
        room_id: RoomId,
        /// When set, the call only resolves if the room is still on this
        /// round.
        #[serde(default)]
        expected_round: Option<u32>,
    },
    FinalizeGame {
        room_id: RoomId,
        winners: Vec<Address>,
        vault: f64,
    },
    RefundGame {
        room_id: RoomId,
    },
    RefundEligibility {
        room_id: RoomId,
    },
    DeleteRoom {
        room_id: RoomId,
    },
    ListActiveRooms,
    GetConfig,
    UpdateConfig {
        update: GameConfigUpdate,
    },
}

impl Request {
    /// Short operation name, for logs.
    pub fn op(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create_room",
            Self::JoinRoom { .. } => "join_room",
            Self::GetRoomByCode { .. } => "get_room_by_code",
            Self::GetRoom { .. } => "get_room",
            Self::GetRoomPlayers { .. } => "get_room_players",
            Self::StartGame { .. } => "start_game",
            Self::SubmitVote { .. } => "submit_vote",
            Self::GetRoundVotes { .. } => "get_round_votes",
            Self::GetPlayerVote { .. } => "get_player_vote",
            Self::GetPoliceSummary { .. } => "get_police_summary",
            Self::ResolveRound { .. } => "resolve_round",
            Self::FinalizeGame { .. } => "finalize_game",
            Self::RefundGame { .. } => "refund_game",
            Self::RefundEligibility { .. } => "refund_eligibility",
            Self::DeleteRoom { .. } => "delete_room",
            Self::ListActiveRooms => "list_active_rooms",
            Self::GetConfig => "get_config",
            Self::UpdateConfig { .. } => "update_config",
        }
    }
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// The successful result of a [`Request`].
///
/// Lookups answer with `Option`s: `Room { room: None }` is a definitive
/// "no such room", never "not loaded yet".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplyBody {
    RoomCreated(CreatedRoom),
    Joined { room_id: RoomId },
    Room { room: Option<Room> },
    Players { players: Vec<Player> },
    Votes { votes: Vec<Vote> },
    PlayerVote { vote: Option<Vote> },
    PoliceSummary(PoliceSummary),
    RoundResolved(RoundOutcome),
    RefundEligibility(RefundEligibility),
    ActiveRooms { rooms: Vec<RoomSummary> },
    Config(GameConfig),
    /// The operation succeeded and has nothing to report.
    Done,
}

/// Stable, machine-readable failure categories.
///
/// Clients branch on the kind; the accompanying message is for humans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    AlreadyStarted,
    AlreadyFinalized,
    NotStarted,
    NotFinishedYet,
    WrongPhase,
    InsufficientRoster,
    FeeTooLow,
    RoomFull,
    TeamFull,
    NotAMember,
    Eliminated,
    GameNotActive,
    StaleRound,
    InvalidInput,
    Settlement,
    /// Another settlement step holds the room.
    SettlementPending,
    Unavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Same spelling as the wire format.
        let name = match self {
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::AlreadyStarted => "already_started",
            Self::AlreadyFinalized => "already_finalized",
            Self::NotStarted => "not_started",
            Self::NotFinishedYet => "not_finished_yet",
            Self::WrongPhase => "wrong_phase",
            Self::InsufficientRoster => "insufficient_roster",
            Self::FeeTooLow => "fee_too_low",
            Self::RoomFull => "room_full",
            Self::TeamFull => "team_full",
            Self::NotAMember => "not_a_member",
            Self::Eliminated => "eliminated",
            Self::GameNotActive => "game_not_active",
            Self::StaleRound => "stale_round",
            Self::InvalidInput => "invalid_input",
            Self::Settlement => "settlement",
            Self::SettlementPending => "settlement_pending",
            Self::Unavailable => "unavailable",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Payload and Envelope
// ---------------------------------------------------------------------------

/// The content of an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    System(SystemMessage),
    Request(Request),
    Reply {
        reply_to: u64,
        body: ReplyBody,
    },
    Failure {
        reply_to: u64,
        kind: ErrorKind,
        message: String,
    },
}

/// The top-level frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-sender sequence number. Replies echo the request's `seq` in
    /// `reply_to`.
    pub seq: u64,
    /// Milliseconds since the sender's connection started.
    pub timestamp: u64,
    pub payload: Payload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_json_format() {
        let msg = SystemMessage::Handshake {
            version: 1,
            address: Address::new("0xabc"),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "Handshake");
        assert_eq!(json["version"], 1);
        assert_eq!(json["address"], "0xabc");
    }

    #[test]
    fn test_request_is_tagged_by_op() {
        let req = Request::SubmitVote {
            room_id: RoomId(4),
            choice: "Rooftops".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&req).unwrap();
        assert_eq!(json["op"], "submit_vote");
        assert_eq!(json["room_id"], 4);
        assert_eq!(json["choice"], "Rooftops");
    }

    #[test]
    fn test_resolve_round_expected_round_is_optional() {
        let req: Request =
            serde_json::from_str(r#"{"op":"resolve_round","room_id":2}"#).unwrap();
        assert_eq!(
            req,
            Request::ResolveRound {
                room_id: RoomId(2),
                expected_round: None
            }
        );
    }

    #[test]
    fn test_unit_request_parses() {
        let req: Request = serde_json::from_str(r#"{"op":"list_active_rooms"}"#).unwrap();
        assert_eq!(req, Request::ListActiveRooms);
        assert_eq!(req.op(), "list_active_rooms");
    }

    #[test]
    fn test_failure_payload_json_format() {
        let payload = Payload::Failure {
            reply_to: 7,
            kind: ErrorKind::TeamFull,
            message: "police team is full (4/4)".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "Failure");
        assert_eq!(json["data"]["reply_to"], 7);
        assert_eq!(json["data"]["kind"], "team_full");
    }

    #[test]
    fn test_error_kind_display_matches_wire_name() {
        for kind in [
            ErrorKind::NotFinishedYet,
            ErrorKind::InsufficientRoster,
            ErrorKind::StaleRound,
        ] {
            let wire = serde_json::to_string(&kind).unwrap();
            assert_eq!(wire.trim_matches('"'), kind.to_string());
        }
    }

    #[test]
    fn test_reply_room_absent_is_explicit_null() {
        let body = ReplyBody::Room { room: None };
        let json: serde_json::Value = serde_json::to_value(&body).unwrap();
        assert_eq!(json["kind"], "room");
        assert!(json["room"].is_null());
    }

    #[test]
    fn test_decode_unknown_op_returns_error() {
        let result: Result<Request, _> = serde_json::from_str(r#"{"op":"steal_vault"}"#);
        assert!(result.is_err());
    }
}
