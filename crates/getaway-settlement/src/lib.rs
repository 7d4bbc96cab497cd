//! Settlement boundary for Getaway.
//!
//! Entry fees, payouts and refunds live in an external escrow contract.
//! This crate defines the [`SettlementBridge`] the room manager calls
//! into, the [`confirm`] helper every settlement step goes through, and
//! [`InMemoryEscrow`], a simulated chain used by the server binary and
//! the test suites.

mod bridge;
mod eligibility;
mod error;
mod memory;

pub use bridge::{EscrowState, SettlementBridge, TxHandle, TxStatus, confirm};
pub use eligibility::refund_eligibility;
pub use error::SettlementError;
pub use memory::{DEFAULT_COOLDOWN_BLOCKS, EscrowOp, InMemoryEscrow};
