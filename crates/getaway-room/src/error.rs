//! Error types for the room layer.

use getaway_protocol::{Address, ErrorKind, GamePhase, Role, RoomId};
use getaway_settlement::SettlementError;

use crate::game::SettlementStep;

/// Errors returned by room, roster, ledger and resolver operations.
///
/// Every variant is a terminal, user-visible failure; nothing here is
/// retried internally. The `Display` text is the human-readable reason,
/// [`kind()`](Self::kind) the stable category clients branch on.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// No room matches the given id or code.
    #[error("{0} not found")]
    NotFound(String),

    /// The caller is not allowed to do this. Always "only the creator".
    #[error("only the room creator can {0}")]
    Forbidden(&'static str),

    #[error("room {0} has already started")]
    AlreadyStarted(RoomId),

    #[error("room {0} is already finalized")]
    AlreadyFinalized(RoomId),

    #[error("room {0} has not started")]
    NotStarted(RoomId),

    #[error("room {room_id} is still {phase}")]
    NotFinishedYet { room_id: RoomId, phase: GamePhase },

    #[error("expected phase {expected}, room is {actual}")]
    WrongPhase {
        expected: GamePhase,
        actual: GamePhase,
    },

    /// Not enough players to start. The message names the missing count,
    /// e.g. "need 1 more police".
    #[error("{0}")]
    InsufficientRoster(String),

    #[error("entry fee {fee} is below the minimum of {minimum}")]
    FeeTooLow { fee: f64, minimum: f64 },

    #[error("room {room_id} is full ({max} players)")]
    RoomFull { room_id: RoomId, max: u32 },

    #[error("{role} team is full ({cap}/{cap})")]
    TeamFull { role: Role, cap: u32 },

    #[error("{0} is not a member of this room")]
    NotAMember(Address),

    #[error("{0} has been eliminated")]
    Eliminated(Address),

    #[error("room {0} has no active game")]
    GameNotActive(RoomId),

    /// The round moved on before this resolution ran.
    #[error("round {expected} was already resolved (room is on round {current})")]
    StaleRound { expected: u32, current: u32 },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    /// A bridge call for this room is still in flight.
    #[error("room {room_id} is busy with a pending {step}")]
    SettlementPending {
        room_id: RoomId,
        step: SettlementStep,
    },

    /// The room's actor is gone or its channel is closed.
    #[error("{0} is unavailable")]
    Unavailable(String),
}

impl GameError {
    /// The stable category for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::AlreadyStarted(_) => ErrorKind::AlreadyStarted,
            Self::AlreadyFinalized(_) => ErrorKind::AlreadyFinalized,
            Self::NotStarted(_) => ErrorKind::NotStarted,
            Self::NotFinishedYet { .. } => ErrorKind::NotFinishedYet,
            Self::WrongPhase { .. } => ErrorKind::WrongPhase,
            Self::InsufficientRoster(_) => ErrorKind::InsufficientRoster,
            Self::FeeTooLow { .. } => ErrorKind::FeeTooLow,
            Self::RoomFull { .. } => ErrorKind::RoomFull,
            Self::TeamFull { .. } => ErrorKind::TeamFull,
            Self::NotAMember(_) => ErrorKind::NotAMember,
            Self::Eliminated(_) => ErrorKind::Eliminated,
            Self::GameNotActive(_) => ErrorKind::GameNotActive,
            Self::StaleRound { .. } => ErrorKind::StaleRound,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Settlement(_) => ErrorKind::Settlement,
            Self::SettlementPending { .. } => ErrorKind::SettlementPending,
            Self::Unavailable(_) => ErrorKind::Unavailable,
        }
    }

    pub(crate) fn room_not_found(room_id: RoomId) -> Self {
        Self::NotFound(format!("room {room_id}"))
    }
}

/// Errors from reading a stored config document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported config version {0}")]
    UnsupportedVersion(u64),
}
