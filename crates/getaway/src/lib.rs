//! # Getaway
//!
//! WebSocket server for a thieves-vs-police round game. Clients handshake
//! with their wallet address, then send JSON requests (create and join
//! rooms, start a game, vote, resolve rounds, settle) and get exactly one
//! reply per request.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use getaway::prelude::*;
//!
//! # async fn run() -> Result<(), GetawayError> {
//! let server = GetawayServerBuilder::new()
//!     .bind("127.0.0.1:8080")
//!     .config(ConfigStore::from_env())
//!     .build(Arc::new(InMemoryEscrow::default()))
//!     .await?;
//! server.run().await
//! # }
//! ```

mod dispatch;
mod error;
mod handler;
mod server;

pub use error::GetawayError;
pub use server::{DEFAULT_BIND, GetawayServer, GetawayServerBuilder, PROTOCOL_VERSION};

/// Everything needed to run a server or talk to one.
pub mod prelude {
    pub use crate::{GetawayError, GetawayServer, GetawayServerBuilder, PROTOCOL_VERSION};
    pub use getaway_protocol::{
        Address, Envelope, ErrorKind, GameConfig, GameConfigUpdate, GamePhase, Payload,
        ReplyBody, Request, Role, RoomCode, RoomId, SystemMessage,
    };
    pub use getaway_room::{Clock, ConfigStore, GameError, ManualClock, RoomManager};
    pub use getaway_settlement::{InMemoryEscrow, SettlementBridge};
}
