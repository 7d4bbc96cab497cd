//! Per-round votes, one per voter.

use std::collections::BTreeMap;

use getaway_protocol::{Address, PoliceSummary, Role, Vote};

/// All votes of one room, keyed by round then voter.
///
/// Voters are kept in address order, so every listing (and the police
/// tie-break built on it) is deterministic.
#[derive(Debug, Clone, Default)]
pub struct VoteLedger {
    rounds: BTreeMap<u32, BTreeMap<Address, Vote>>,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `address`'s choice for `round`, replacing any earlier one.
    ///
    /// `role` is only stored when the vote is first cast.
    pub fn upsert(&mut self, round: u32, address: Address, choice: String, role: Role) {
        let votes = self.rounds.entry(round).or_default();
        match votes.get_mut(&address) {
            Some(vote) => vote.choice = choice,
            None => {
                votes.insert(
                    address.clone(),
                    Vote {
                        round,
                        address,
                        choice,
                        role,
                    },
                );
            }
        }
    }

    /// Every vote cast in `round`, in voter address order.
    pub fn for_round(&self, round: u32) -> Vec<Vote> {
        self.rounds
            .get(&round)
            .map(|votes| votes.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn player_vote(&self, round: u32, address: &Address) -> Option<Vote> {
        self.rounds.get(&round)?.get(address).cloned()
    }

    /// Tally of police votes only.
    pub fn police_summary(&self, round: u32) -> PoliceSummary {
        let mut summary = PoliceSummary::default();
        let Some(votes) = self.rounds.get(&round) else {
            return summary;
        };
        for vote in votes.values().filter(|v| v.role == Role::Police) {
            summary.total_votes += 1;
            *summary.choices.entry(vote.choice.clone()).or_default() += 1;
        }
        summary
    }
}
