//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding, or validating messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, a missing field, or an
    /// unknown message tag.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message parsed but breaks a protocol rule (e.g. the first
    /// frame was not a handshake).
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A room code that is not six characters from `[A-Z0-9]`.
    #[error("invalid room code {0:?}: expected 6 characters from A-Z and 0-9")]
    InvalidRoomCode(String),
}
