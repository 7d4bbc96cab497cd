//! Game parameters and their defaults.
//!
//! [`GameConfig`] is plain data. Where it is stored and how older
//! documents are upgraded is the room crate's business; this module only
//! knows the shape, the defaults, and how a partial update merges in.

use serde::{Deserialize, Serialize};

use crate::Role;

/// Phase timings, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    pub vote_duration: u64,
    pub commit_duration: u64,
    pub cooldown: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            vote_duration: 20,
            commit_duration: 10,
            cooldown: 5,
        }
    }
}

/// Tunable parameters for every room on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub min_thieves: u32,
    pub min_police: u32,
    /// Assumed to be at least `min_thieves + min_police`; not enforced.
    pub min_players_to_start: u32,
    pub max_total_players: u32,
    pub entry_fee_minimum: f64,
    /// Number of rounds in a game.
    pub stage_count: u32,
    /// Path options offered each round.
    pub paths_per_stage: u32,
    pub timings: Timings,
    pub default_thief_names: Vec<String>,
    pub default_police_names: Vec<String>,
    /// Flat list, `paths_per_stage` entries per stage.
    pub path_names: Vec<String>,
    /// One display name per stage.
    pub stage_names: Vec<String>,
    /// Informational only. Teams are capped at half the room either way.
    pub allow_uneven_teams: bool,
}

/// Options used when a stage has no configured path names.
const FALLBACK_PATHS: [&str; 3] = ["Path A", "Path B", "Path C"];

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_thieves: 2,
            min_police: 2,
            min_players_to_start: 4,
            max_total_players: 8,
            entry_fee_minimum: 0.0,
            stage_count: 4,
            paths_per_stage: 3,
            timings: Timings::default(),
            default_thief_names: strings(&[
                "Shadow", "Whisper", "Ghost", "Phantom", "Viper", "Raven", "Fox",
                "Jackal",
            ]),
            default_police_names: strings(&[
                "Sheriff", "Marshal", "Detective", "Inspector", "Sergeant",
                "Captain", "Ranger", "Warden",
            ]),
            path_names: strings(&[
                "Back Alley", "Rooftops", "Sewer Tunnel",
                "Subway Line", "Harbor Docks", "Freight Yard",
                "Old Bridge", "Market Square", "Tram Depot",
                "Mountain Pass", "Border Road", "Airstrip",
            ]),
            stage_names: strings(&[
                "The Vault", "The City", "The Outskirts", "The Border",
            ]),
            allow_uneven_teams: false,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl GameConfig {
    /// Maximum members per team: half the room, rounded down.
    pub fn team_cap(&self) -> u32 {
        self.max_total_players / 2
    }

    /// The path options for a 1-based round.
    ///
    /// Slices `path_names[(round-1)*pps .. (round-1)*pps + pps]`. When the
    /// slice is empty (round out of range or names not configured) the
    /// fixed fallback options are returned instead.
    pub fn stage_paths(&self, round: u32) -> Vec<String> {
        let pps = self.paths_per_stage as usize;
        let start = (round.saturating_sub(1) as usize).saturating_mul(pps);
        let end = start.saturating_add(pps).min(self.path_names.len());
        match self.path_names.get(start..end) {
            Some(slice) if !slice.is_empty() => slice.to_vec(),
            _ => strings(&FALLBACK_PATHS),
        }
    }

    /// Display name for a 1-based round, falling back to `Stage N`.
    pub fn stage_name(&self, round: u32) -> String {
        round
            .checked_sub(1)
            .and_then(|i| self.stage_names.get(i as usize))
            .cloned()
            .unwrap_or_else(|| format!("Stage {round}"))
    }

    /// The default-name list for a role.
    pub fn default_names(&self, role: Role) -> &[String] {
        match role {
            Role::Thief => &self.default_thief_names,
            Role::Police => &self.default_police_names,
        }
    }

    /// Overwrites every field that `update` provides.
    pub fn apply(&mut self, update: GameConfigUpdate) {
        let GameConfigUpdate {
            min_thieves,
            min_police,
            min_players_to_start,
            max_total_players,
            entry_fee_minimum,
            stage_count,
            paths_per_stage,
            timings,
            default_thief_names,
            default_police_names,
            path_names,
            stage_names,
            allow_uneven_teams,
        } = update;

        if let Some(v) = min_thieves {
            self.min_thieves = v;
        }
        if let Some(v) = min_police {
            self.min_police = v;
        }
        if let Some(v) = min_players_to_start {
            self.min_players_to_start = v;
        }
        if let Some(v) = max_total_players {
            self.max_total_players = v;
        }
        if let Some(v) = entry_fee_minimum {
            self.entry_fee_minimum = v;
        }
        if let Some(v) = stage_count {
            self.stage_count = v;
        }
        if let Some(v) = paths_per_stage {
            self.paths_per_stage = v;
        }
        if let Some(v) = timings {
            self.timings = v;
        }
        if let Some(v) = default_thief_names {
            self.default_thief_names = v;
        }
        if let Some(v) = default_police_names {
            self.default_police_names = v;
        }
        if let Some(v) = path_names {
            self.path_names = v;
        }
        if let Some(v) = stage_names {
            self.stage_names = v;
        }
        if let Some(v) = allow_uneven_teams {
            self.allow_uneven_teams = v;
        }
    }
}

/// A partial update: only the `Some` fields are written.
///
/// Missing JSON fields deserialize as `None`, so a client can send just
/// `{"max_total_players": 10}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfigUpdate {
    pub min_thieves: Option<u32>,
    pub min_police: Option<u32>,
    pub min_players_to_start: Option<u32>,
    pub max_total_players: Option<u32>,
    pub entry_fee_minimum: Option<f64>,
    pub stage_count: Option<u32>,
    pub paths_per_stage: Option<u32>,
    pub timings: Option<Timings>,
    pub default_thief_names: Option<Vec<String>>,
    pub default_police_names: Option<Vec<String>>,
    pub path_names: Option<Vec<String>>,
    pub stage_names: Option<Vec<String>>,
    pub allow_uneven_teams: Option<bool>,
}
