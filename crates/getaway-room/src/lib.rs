//! The Getaway game-state machine.
//!
//! Rooms are created and joined, moved through a fixed number of voting
//! rounds, and resolved into eliminations and winners. Each room runs as
//! an isolated Tokio task (actor model) owning its record, roster and
//! votes.
//!
//! # Key types
//!
//! - [`RoomManager`]: registry and entry point for every operation
//! - [`RoomHandle`]: sends commands to a running room actor
//! - [`GameRoom`]: the state and guards one actor owns
//! - [`Roster`], [`VoteLedger`]: membership and per-round votes
//! - [`resolver`]: police block, escape route and eliminations
//! - [`ConfigStore`]: the shared, versioned game config

mod clock;
mod config;
mod error;
pub mod game;
mod ledger;
mod manager;
pub mod resolver;
mod room;
mod roster;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CONFIG_PATH_ENV, ConfigStore, DEFAULT_CONFIG_PATH, LegacyConfig, StoredConfig};
pub use error::{ConfigError, GameError};
pub use game::{GameRoom, SettlementStep};
pub use ledger::VoteLedger;
pub use manager::{ACTIVE_ROOMS_LIMIT, RoomManager, generate_code};
pub use room::{RoomHandle, RoomSnapshot};
pub use roster::{Roster, random_nickname};
