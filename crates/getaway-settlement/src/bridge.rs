//! The boundary between the game core and the escrow contract.
//!
//! Getaway never moves funds itself. Locking entry fees, paying winners,
//! and refunding a stuck game all happen in an external escrow contract;
//! the core only submits transactions and waits for their outcome. The
//! [`SettlementBridge`] trait is that seam: production wires it to a chain
//! client, tests and local development use
//! [`InMemoryEscrow`](crate::InMemoryEscrow).

use std::fmt;
use std::future::Future;

use getaway_protocol::Address;

use crate::SettlementError;

/// A submitted transaction, identified by its hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxHandle(pub String);

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The final outcome of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Confirmed,
    /// Mined but reverted, with the contract's reason.
    Failed(String),
}

/// What the escrow contract knows about one game.
#[derive(Debug, Clone, PartialEq)]
pub struct EscrowState {
    /// Funds currently held for the game.
    pub vault: f64,
    pub entry_fee: f64,
    pub started: bool,
    pub finalized: bool,
    /// Block at which fees were locked. Refund cooldown counts from here.
    pub start_block: u64,
}

/// Calls out to the external escrow.
///
/// Every mutating call only *submits* a transaction; callers must
/// [`await_confirmation`](Self::await_confirmation) before treating it as
/// done. Implementations must be shareable across room tasks.
pub trait SettlementBridge: Send + Sync + 'static {
    /// Opens an escrow for `game_id`.
    fn create_escrow(
        &self,
        game_id: u64,
    ) -> impl Future<Output = Result<TxHandle, SettlementError>> + Send;

    /// Locks `amount` into the game's escrow and marks it started.
    fn lock_fee(
        &self,
        game_id: u64,
        amount: f64,
    ) -> impl Future<Output = Result<TxHandle, SettlementError>> + Send;

    /// Pays the vault out to `winners` and closes the escrow.
    fn finalize(
        &self,
        game_id: u64,
        winners: Vec<Address>,
    ) -> impl Future<Output = Result<TxHandle, SettlementError>> + Send;

    /// Returns the stake to the players once the cooldown has passed.
    fn refund(
        &self,
        game_id: u64,
    ) -> impl Future<Output = Result<TxHandle, SettlementError>> + Send;

    /// Reads the escrow for `game_id`.
    fn escrow_state(
        &self,
        game_id: u64,
    ) -> impl Future<Output = Result<EscrowState, SettlementError>> + Send;

    /// Waits until the transaction is mined.
    fn await_confirmation(
        &self,
        tx: &TxHandle,
    ) -> impl Future<Output = Result<TxStatus, SettlementError>> + Send;

    /// The chain's current block number.
    fn current_block(&self) -> impl Future<Output = Result<u64, SettlementError>> + Send;

    /// Blocks that must pass after `start_block` before a refund is allowed.
    fn cooldown_blocks(&self) -> impl Future<Output = Result<u64, SettlementError>> + Send;
}

/// Waits for `tx` and turns a reverted transaction into an error.
///
/// This is the "await confirmation" half of every settlement step: the
/// caller may only commit local state once this returns `Ok`.
pub async fn confirm<B: SettlementBridge>(
    bridge: &B,
    tx: TxHandle,
) -> Result<(), SettlementError> {
    match bridge.await_confirmation(&tx).await? {
        TxStatus::Confirmed => {
            tracing::debug!(%tx, "settlement transaction confirmed");
            Ok(())
        }
        TxStatus::Failed(reason) => {
            tracing::warn!(%tx, %reason, "settlement transaction reverted");
            Err(SettlementError::Reverted {
                tx: tx.0,
                reason,
            })
        }
    }
}
