//! Round resolution: the police block, the escape route, and who gets
//! caught.
//!
//! These are pure functions over one round's votes. Applying the result
//! to the room (eliminations, move logs, round advance, winners) happens
//! in [`GameRoom::resolve`](crate::game::GameRoom::resolve).

use getaway_protocol::{Address, Player, Role, Vote};
use rand::Rng;
use rand::seq::IndexedRandom;

/// The computed outcome of one round, before it is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub police_choice: String,
    pub winning_path: String,
    /// Thieves caught this round, in roster order.
    pub eliminated: Vec<Address>,
}

/// The path the police blocked.
///
/// Plurality of police votes. On a tie the path seen first wins, with
/// `votes` expected in ascending voter address order. With no police
/// votes the block is drawn at random from `stage_paths`.
pub fn police_choice(votes: &[Vote], stage_paths: &[String], rng: &mut impl Rng) -> String {
    let mut tally: Vec<(&str, usize)> = Vec::new();
    for vote in votes.iter().filter(|v| v.role == Role::Police) {
        match tally.iter_mut().find(|(choice, _)| *choice == vote.choice) {
            Some((_, count)) => *count += 1,
            None => tally.push((vote.choice.as_str(), 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (choice, count) in tally {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((choice, count));
        }
    }

    match best {
        Some((choice, _)) => choice.to_string(),
        None => stage_paths.choose(rng).cloned().unwrap_or_default(),
    }
}

/// The thieves' escape route: any stage path except the blocked one.
///
/// When nothing else is left, the first stage path is used.
pub fn winning_path(stage_paths: &[String], police_choice: &str, rng: &mut impl Rng) -> String {
    let candidates: Vec<&String> = stage_paths
        .iter()
        .filter(|path| path.as_str() != police_choice)
        .collect();
    candidates
        .choose(rng)
        .map(|path| (*path).clone())
        .or_else(|| stage_paths.first().cloned())
        .unwrap_or_default()
}

/// Thieves caught by the block.
///
/// A thief is caught exactly when they voted this round and picked the
/// police choice. The winning path plays no part. Police are never caught.
pub fn caught_thieves(players: &[Player], votes: &[Vote], police_choice: &str) -> Vec<Address> {
    players
        .iter()
        .filter(|p| p.role == Role::Thief && !p.eliminated)
        .filter(|p| {
            votes
                .iter()
                .any(|v| v.address == p.address && v.choice == police_choice)
        })
        .map(|p| p.address.clone())
        .collect()
}

/// Runs all three steps for one round.
pub fn resolve(
    players: &[Player],
    votes: &[Vote],
    stage_paths: &[String],
    rng: &mut impl Rng,
) -> Resolution {
    let police_choice = police_choice(votes, stage_paths, rng);
    let winning_path = winning_path(stage_paths, &police_choice, rng);
    let eliminated = caught_thieves(players, votes, &police_choice);
    Resolution {
        police_choice,
        winning_path,
        eliminated,
    }
}
