//! Error types for the settlement layer.

/// Errors surfaced by a [`SettlementBridge`](crate::SettlementBridge).
///
/// A reverted transaction is not an error at this level: it comes back as
/// [`TxStatus::Failed`](crate::TxStatus::Failed) from
/// `await_confirmation`. These variants cover the cases where there is no
/// transaction to wait for at all.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    /// No escrow exists for this game id.
    #[error("no escrow for game {0}")]
    EscrowNotFound(u64),

    /// The transaction handle is unknown to the bridge.
    #[error("unknown transaction {0}")]
    TxNotFound(String),

    /// The transaction was mined but reverted.
    #[error("transaction {tx} reverted: {reason}")]
    Reverted { tx: String, reason: String },

    /// The settlement backend could not be reached.
    #[error("settlement backend unavailable: {0}")]
    Unavailable(String),
}
