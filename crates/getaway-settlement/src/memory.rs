//! An in-process stand-in for the escrow contract.
//!
//! `InMemoryEscrow` behaves like a tiny chain: every submitted transaction
//! mines one block, is either applied or reverted, and can be confirmed
//! afterwards. It enforces the same rules the contract does (no double
//! start, no double finalize, refund only after the cooldown), which is
//! enough to exercise every settlement path of the room manager without a
//! node.

use std::collections::{HashMap, HashSet};

use getaway_protocol::Address;
use rand::Rng;
use tokio::sync::Mutex;

use crate::{EscrowState, SettlementBridge, SettlementError, TxHandle, TxStatus};

/// Default refund cooldown, in blocks.
pub const DEFAULT_COOLDOWN_BLOCKS: u64 = 256;

/// The escrow operations, used to inject failures in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EscrowOp {
    CreateEscrow,
    LockFee,
    Finalize,
    Refund,
}

#[derive(Debug)]
struct Escrow {
    state: EscrowState,
    winners: Vec<Address>,
}

#[derive(Debug, Default)]
struct Chain {
    block: u64,
    escrows: HashMap<u64, Escrow>,
    txs: HashMap<TxHandle, TxStatus>,
    /// Operations whose next submission reverts regardless of state.
    fail_next: HashSet<EscrowOp>,
}

impl Chain {
    /// Mines one block holding a transaction with the given outcome.
    fn mine(&mut self, op: EscrowOp, outcome: Result<(), String>) -> TxHandle {
        self.block += 1;
        let tx = generate_tx_hash();
        let status = match outcome {
            Ok(()) => TxStatus::Confirmed,
            Err(reason) => TxStatus::Failed(reason),
        };
        tracing::debug!(?op, %tx, block = self.block, ?status, "escrow transaction mined");
        self.txs.insert(tx.clone(), status);
        tx
    }

    /// Runs `apply` unless a failure was injected for `op`. A failed
    /// `apply` must leave the chain untouched.
    fn submit(
        &mut self,
        op: EscrowOp,
        apply: impl FnOnce(&mut Self) -> Result<(), String>,
    ) -> TxHandle {
        let outcome = if self.fail_next.remove(&op) {
            Err(format!("{op:?} rejected by injected failure"))
        } else {
            apply(self)
        };
        self.mine(op, outcome)
    }
}

/// A simulated escrow contract kept in memory.
#[derive(Debug)]
pub struct InMemoryEscrow {
    chain: Mutex<Chain>,
    cooldown_blocks: u64,
}

impl InMemoryEscrow {
    /// Creates an empty chain with the given refund cooldown.
    pub fn new(cooldown_blocks: u64) -> Self {
        Self {
            chain: Mutex::new(Chain::default()),
            cooldown_blocks,
        }
    }

    /// Makes the next submission of `op` revert.
    pub async fn fail_next(&self, op: EscrowOp) {
        self.chain.lock().await.fail_next.insert(op);
    }

    /// Mines `n` empty blocks.
    pub async fn advance_blocks(&self, n: u64) {
        self.chain.lock().await.block += n;
    }

    /// The addresses paid out by `finalize`, if the game was finalized.
    pub async fn paid_winners(&self, game_id: u64) -> Option<Vec<Address>> {
        let chain = self.chain.lock().await;
        chain
            .escrows
            .get(&game_id)
            .filter(|e| e.state.finalized)
            .map(|e| e.winners.clone())
    }
}

impl Default for InMemoryEscrow {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN_BLOCKS)
    }
}

impl SettlementBridge for InMemoryEscrow {
    async fn create_escrow(&self, game_id: u64) -> Result<TxHandle, SettlementError> {
        let mut chain = self.chain.lock().await;
        Ok(chain.submit(EscrowOp::CreateEscrow, |chain| {
            if chain.escrows.contains_key(&game_id) {
                return Err(format!("GameExists: game {game_id}"));
            }
            chain.escrows.insert(
                game_id,
                Escrow {
                    state: EscrowState {
                        vault: 0.0,
                        entry_fee: 0.0,
                        started: false,
                        finalized: false,
                        start_block: 0,
                    },
                    winners: Vec::new(),
                },
            );
            Ok(())
        }))
    }

    async fn lock_fee(&self, game_id: u64, amount: f64) -> Result<TxHandle, SettlementError> {
        let mut chain = self.chain.lock().await;
        if !chain.escrows.contains_key(&game_id) {
            return Err(SettlementError::EscrowNotFound(game_id));
        }
        Ok(chain.submit(EscrowOp::LockFee, |chain| {
            // The fee lands in the block this transaction is mined in.
            let block = chain.block + 1;
            let escrow = chain
                .escrows
                .get_mut(&game_id)
                .ok_or_else(|| format!("GameNotFound: game {game_id}"))?;
            if escrow.state.started {
                return Err("GameAlreadyStarted".to_string());
            }
            escrow.state.started = true;
            escrow.state.entry_fee = amount;
            escrow.state.vault += amount;
            escrow.state.start_block = block;
            Ok(())
        }))
    }

    async fn finalize(
        &self,
        game_id: u64,
        winners: Vec<Address>,
    ) -> Result<TxHandle, SettlementError> {
        let mut chain = self.chain.lock().await;
        if !chain.escrows.contains_key(&game_id) {
            return Err(SettlementError::EscrowNotFound(game_id));
        }
        Ok(chain.submit(EscrowOp::Finalize, |chain| {
            let escrow = chain
                .escrows
                .get_mut(&game_id)
                .ok_or_else(|| format!("GameNotFound: game {game_id}"))?;
            if !escrow.state.started {
                return Err("GameNotStarted".to_string());
            }
            if escrow.state.finalized {
                return Err("GameAlreadyFinalized".to_string());
            }
            escrow.state.finalized = true;
            escrow.winners = winners;
            Ok(())
        }))
    }

    async fn refund(&self, game_id: u64) -> Result<TxHandle, SettlementError> {
        let cooldown = self.cooldown_blocks;
        let mut chain = self.chain.lock().await;
        if !chain.escrows.contains_key(&game_id) {
            return Err(SettlementError::EscrowNotFound(game_id));
        }
        Ok(chain.submit(EscrowOp::Refund, |chain| {
            let block = chain.block + 1;
            let escrow = chain
                .escrows
                .get_mut(&game_id)
                .ok_or_else(|| format!("GameNotFound: game {game_id}"))?;
            if !escrow.state.started {
                return Err("GameNotStarted".to_string());
            }
            if escrow.state.finalized {
                return Err("GameAlreadyFinalized".to_string());
            }
            if block.saturating_sub(escrow.state.start_block) < cooldown {
                return Err("CooldownNotReached".to_string());
            }
            escrow.state.finalized = true;
            Ok(())
        }))
    }

    async fn escrow_state(&self, game_id: u64) -> Result<EscrowState, SettlementError> {
        let chain = self.chain.lock().await;
        chain
            .escrows
            .get(&game_id)
            .map(|e| e.state.clone())
            .ok_or(SettlementError::EscrowNotFound(game_id))
    }

    async fn await_confirmation(&self, tx: &TxHandle) -> Result<TxStatus, SettlementError> {
        let chain = self.chain.lock().await;
        chain
            .txs
            .get(tx)
            .cloned()
            .ok_or_else(|| SettlementError::TxNotFound(tx.0.clone()))
    }

    async fn current_block(&self) -> Result<u64, SettlementError> {
        Ok(self.chain.lock().await.block)
    }

    async fn cooldown_blocks(&self) -> Result<u64, SettlementError> {
        Ok(self.cooldown_blocks)
    }
}

/// A random `0x`-prefixed 32-byte transaction hash.
fn generate_tx_hash() -> TxHandle {
    let bytes: [u8; 32] = rand::rng().random();
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    TxHandle(format!("0x{hex}"))
}
