//! Wire protocol for Getaway.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Records** ([`Room`], [`Player`], [`Vote`], [`RoundOutcome`], ...):
//!   the game state a client can observe.
//! - **Config** ([`GameConfig`], [`GameConfigUpdate`]): tunable game
//!   parameters and their defaults.
//! - **Messages** ([`Envelope`], [`Request`], [`ReplyBody`],
//!   [`ErrorKind`]): the request/reply vocabulary.
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes in, bytes out.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Room manager (game state)
//! ```

mod codec;
mod config;
mod error;
mod message;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use config::{GameConfig, GameConfigUpdate, Timings};
pub use error::ProtocolError;
pub use message::{Envelope, ErrorKind, Payload, ReplyBody, Request, SystemMessage};
pub use types::{
    Address, CreatedRoom, GamePhase, Player, PoliceSummary, RefundEligibility, Role,
    Room, RoomCode, RoomId, RoomSummary, RoundOutcome, Vote,
};
