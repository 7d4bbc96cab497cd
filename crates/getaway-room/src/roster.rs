//! Room membership and the join-time invariants.

use getaway_protocol::{Address, GameConfig, Player, Role, RoomId};
use rand::Rng;
use rand::seq::IndexedRandom;

use crate::GameError;

/// Picks a nickname from the role's default list.
///
/// Falls back to the role name if the list is empty.
pub fn random_nickname(config: &GameConfig, role: Role, rng: &mut impl Rng) -> String {
    config
        .default_names(role)
        .choose(rng)
        .cloned()
        .unwrap_or_else(|| role.to_string())
}

/// The players of one room, in join order.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    /// A roster holding only the room creator.
    pub fn with_creator(creator: Player) -> Self {
        Self {
            players: vec![creator],
        }
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn get(&self, address: &Address) -> Option<&Player> {
        self.players.iter().find(|p| &p.address == address)
    }

    /// Number of players on `role`'s team.
    pub fn count(&self, role: Role) -> usize {
        self.players.iter().filter(|p| p.role == role).count()
    }

    /// Adds `address` to the room, or updates it if already a member.
    ///
    /// A re-join replaces the role, and the nickname when one is given; it
    /// never creates a second entry. Moving to the other team must fit
    /// under that team's cap. New members must fit under both the room
    /// size and the team cap.
    pub fn join(
        &mut self,
        room_id: RoomId,
        address: Address,
        nickname: Option<String>,
        role: Role,
        config: &GameConfig,
        rng: &mut impl Rng,
    ) -> Result<(), GameError> {
        let cap = config.team_cap();
        let team_size = self.count(role);

        if let Some(existing) = self.players.iter_mut().find(|p| p.address == address) {
            if existing.role != role && team_size >= cap as usize {
                return Err(GameError::TeamFull { role, cap });
            }
            existing.role = role;
            if nickname.is_some() {
                existing.nickname = nickname;
            }
            tracing::debug!(%room_id, %address, %role, "player re-joined");
            return Ok(());
        }

        if self.players.len() >= config.max_total_players as usize {
            return Err(GameError::RoomFull {
                room_id,
                max: config.max_total_players,
            });
        }
        if team_size >= cap as usize {
            return Err(GameError::TeamFull { role, cap });
        }

        let nickname = nickname.unwrap_or_else(|| random_nickname(config, role, rng));
        tracing::info!(%room_id, %address, %role, %nickname, players = self.players.len() + 1, "player joined");
        self.players.push(Player {
            address,
            nickname: Some(nickname),
            role,
            eliminated: false,
            moves: Vec::new(),
        });
        Ok(())
    }

    /// Checks the start thresholds: thieves, then police, then total.
    pub fn check_start(&self, config: &GameConfig) -> Result<(), GameError> {
        let thieves = self.count(Role::Thief) as u32;
        let police = self.count(Role::Police) as u32;
        let total = self.players.len() as u32;

        if thieves < config.min_thieves {
            let missing = config.min_thieves - thieves;
            let noun = if missing == 1 { "thief" } else { "thieves" };
            return Err(GameError::InsufficientRoster(format!("need {missing} more {noun}")));
        }
        if police < config.min_police {
            return Err(GameError::InsufficientRoster(format!(
                "need {} more police",
                config.min_police - police
            )));
        }
        if total < config.min_players_to_start {
            let missing = config.min_players_to_start - total;
            let noun = if missing == 1 { "player" } else { "players" };
            return Err(GameError::InsufficientRoster(format!("need {missing} more {noun}")));
        }
        Ok(())
    }

    /// Marks a thief eliminated. Police are left untouched.
    pub(crate) fn eliminate(&mut self, address: &Address) -> bool {
        match self
            .players
            .iter_mut()
            .find(|p| &p.address == address && p.role == Role::Thief && !p.eliminated)
        {
            Some(player) => {
                player.eliminated = true;
                true
            }
            None => false,
        }
    }

    /// Appends one entry to every player's move log.
    pub(crate) fn record_moves(&mut self, mut choice_of: impl FnMut(&Address) -> Option<String>) {
        for player in &mut self.players {
            let entry = choice_of(&player.address).unwrap_or_else(|| "-".to_string());
            player.moves.push(entry);
        }
    }

    /// Surviving thieves, or every police officer if none survived.
    pub fn winners(&self) -> Vec<Address> {
        let survivors: Vec<Address> = self
            .players
            .iter()
            .filter(|p| p.role == Role::Thief && !p.eliminated)
            .map(|p| p.address.clone())
            .collect();
        if !survivors.is_empty() {
            return survivors;
        }
        self.players
            .iter()
            .filter(|p| p.role == Role::Police)
            .map(|p| p.address.clone())
            .collect()
    }
}
