//! Refund eligibility, computed from escrow state and chain position.

use getaway_protocol::RefundEligibility;

use crate::EscrowState;

/// Decides whether the room creator may refund right now.
///
/// `escrow` is `None` when the game never opened an escrow. The checks
/// run in the same order the contract applies them, so `reason` names the
/// first one that fails.
pub fn refund_eligibility(
    escrow: Option<&EscrowState>,
    is_creator: bool,
    current_block: u64,
    cooldown_blocks: u64,
) -> RefundEligibility {
    let (start_block, vault) = escrow
        .map(|e| (e.start_block, e.vault))
        .unwrap_or((0, 0.0));
    let elapsed = current_block.saturating_sub(start_block);
    let blocks_remaining = cooldown_blocks.saturating_sub(elapsed);

    let reason = match escrow {
        None => Some("game has no escrow"),
        Some(e) if !e.started => Some("game not started"),
        Some(e) if e.finalized => Some("game already finalized"),
        Some(_) if !is_creator => Some("only the room creator can refund"),
        Some(_) if blocks_remaining > 0 => Some("cooldown not reached"),
        Some(_) => None,
    };

    RefundEligibility {
        eligible: reason.is_none(),
        reason: reason.map(str::to_string),
        blocks_remaining,
        cooldown_blocks,
        current_block,
        start_block,
        vault,
    }
}
