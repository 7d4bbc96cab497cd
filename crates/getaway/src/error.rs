//! Top-level error for the server crate.

use getaway_protocol::ProtocolError;
use getaway_room::{ConfigError, GameError};
use getaway_transport::TransportError;

/// Wraps every sub-crate error so `?` works across layers.
#[derive(Debug, thiserror::Error)]
pub enum GetawayError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A game rule rejected the request.
    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
