//! The state one room actor owns: the room record, its roster and its
//! votes, plus every guard and transition on them.
//!
//! Settlement steps are split in three. `begin_*` validates and reserves
//! the room so the caller can go to the bridge; `commit_*` re-validates
//! and applies once the bridge has confirmed, and `abort_settlement`
//! releases the reservation when it has not. While a room is reserved no
//! other settlement step and no delete can run on it.

use std::collections::HashSet;
use std::fmt;

use getaway_protocol::{
    Address, GameConfig, GamePhase, Player, PoliceSummary, Role, Room, RoomCode, RoomId,
    RoundOutcome, Vote,
};
use rand::Rng;

use crate::{GameError, Roster, VoteLedger, resolver};

/// A bridge call a room is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementStep {
    Start,
    Finalize,
    Refund,
}

impl fmt::Display for SettlementStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::Finalize => "finalize",
            Self::Refund => "refund",
        })
    }
}

#[derive(Debug, Clone)]
pub struct GameRoom {
    room: Room,
    roster: Roster,
    ledger: VoteLedger,
    pending: Option<SettlementStep>,
}

impl GameRoom {
    /// A fresh room in `waiting` with the creator as its only player.
    pub fn new(
        room_id: RoomId,
        room_code: RoomCode,
        creator: Player,
        config: &GameConfig,
        now: u64,
    ) -> Self {
        let room = Room {
            room_id,
            creator: creator.address.clone(),
            room_code,
            started: false,
            finalized: false,
            required_min_players: config.min_players_to_start,
            current_round: 0,
            max_rounds: config.stage_count,
            game_phase: GamePhase::Waiting,
            phase_end_time: None,
            game_id: None,
            entry_fee: 0.0,
            winning_path: None,
            vault: None,
            winners: None,
            created_at: now,
        };
        Self {
            room,
            roster: Roster::with_creator(creator),
            ledger: VoteLedger::new(),
            pending: None,
        }
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn players(&self) -> &[Player] {
        self.roster.players()
    }

    pub fn player_count(&self) -> usize {
        self.roster.len()
    }

    fn room_id(&self) -> RoomId {
        self.room.room_id
    }

    pub fn pending_settlement(&self) -> Option<SettlementStep> {
        self.pending
    }

    fn require_idle(&self) -> Result<(), GameError> {
        match self.pending {
            Some(step) => Err(GameError::SettlementPending {
                room_id: self.room_id(),
                step,
            }),
            None => Ok(()),
        }
    }

    /// Reserves the room for `step`. Callers validate first.
    fn reserve(&mut self, step: SettlementStep) {
        tracing::debug!(room_id = %self.room.room_id, %step, "settlement reserved");
        self.pending = Some(step);
    }

    /// Drops a reservation for `step` so a commit can re-validate.
    fn release(&mut self, step: SettlementStep) {
        if self.pending == Some(step) {
            self.pending = None;
        }
    }

    /// Releases the reservation after a failed bridge call. Leaves the
    /// room otherwise untouched.
    pub fn abort_settlement(&mut self, step: SettlementStep) {
        if self.pending == Some(step) {
            tracing::debug!(room_id = %self.room.room_id, %step, "settlement released");
            self.pending = None;
        }
    }

    fn require_creator(&self, caller: &Address, action: &'static str) -> Result<(), GameError> {
        if &self.room.creator != caller {
            return Err(GameError::Forbidden(action));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Roster
    // -----------------------------------------------------------------------

    pub fn join(
        &mut self,
        address: Address,
        nickname: Option<String>,
        role: Role,
        config: &GameConfig,
        rng: &mut impl Rng,
    ) -> Result<(), GameError> {
        if self.room.started {
            return Err(GameError::AlreadyStarted(self.room_id()));
        }
        self.roster
            .join(self.room.room_id, address, nickname, role, config, rng)
    }

    // -----------------------------------------------------------------------
    // Start
    // -----------------------------------------------------------------------

    pub fn check_start(
        &self,
        caller: &Address,
        entry_fee: f64,
        config: &GameConfig,
    ) -> Result<(), GameError> {
        self.require_creator(caller, "start the game")?;
        self.require_idle()?;
        if self.room.started {
            return Err(GameError::AlreadyStarted(self.room_id()));
        }
        if entry_fee.is_nan() || entry_fee < config.entry_fee_minimum {
            return Err(GameError::FeeTooLow {
                fee: entry_fee,
                minimum: config.entry_fee_minimum,
            });
        }
        self.roster.check_start(config)
    }

    pub fn begin_start(
        &mut self,
        caller: &Address,
        entry_fee: f64,
        config: &GameConfig,
    ) -> Result<(), GameError> {
        self.check_start(caller, entry_fee, config)?;
        self.reserve(SettlementStep::Start);
        Ok(())
    }

    pub fn commit_start(
        &mut self,
        caller: &Address,
        entry_fee: f64,
        game_id: u64,
        config: &GameConfig,
        now: u64,
    ) -> Result<(), GameError> {
        self.release(SettlementStep::Start);
        self.check_start(caller, entry_fee, config)?;
        let room = &mut self.room;
        room.started = true;
        room.game_phase = GamePhase::Voting;
        room.current_round = 1;
        room.phase_end_time = Some(vote_deadline(config, now));
        room.max_rounds = config.stage_count;
        room.entry_fee = entry_fee;
        room.game_id = Some(game_id);
        tracing::info!(
            room_id = %room.room_id,
            game_id,
            entry_fee,
            players = self.roster.len(),
            max_rounds = room.max_rounds,
            "game started"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Votes
    // -----------------------------------------------------------------------

    pub fn submit_vote(&mut self, address: Address, choice: String) -> Result<(), GameError> {
        if self.room.game_phase != GamePhase::Voting {
            return Err(GameError::WrongPhase {
                expected: GamePhase::Voting,
                actual: self.room.game_phase,
            });
        }
        let player = self
            .roster
            .get(&address)
            .ok_or_else(|| GameError::NotAMember(address.clone()))?;
        if player.eliminated {
            return Err(GameError::Eliminated(address));
        }
        let role = player.role;
        let round = self.room.current_round;
        tracing::debug!(room_id = %self.room.room_id, round, %address, %choice, "vote recorded");
        self.ledger.upsert(round, address, choice, role);
        Ok(())
    }

    pub fn round_votes(&self, round: u32) -> Vec<Vote> {
        self.ledger.for_round(round)
    }

    pub fn player_vote(&self, round: u32, address: &Address) -> Option<Vote> {
        self.ledger.player_vote(round, address)
    }

    pub fn police_summary(&self, round: u32) -> PoliceSummary {
        self.ledger.police_summary(round)
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Resolves the current round and advances the room.
    ///
    /// With `expected_round` set, the call is a compare-and-swap: it only
    /// goes ahead if the room is still on that round.
    pub fn resolve(
        &mut self,
        expected_round: Option<u32>,
        config: &GameConfig,
        now: u64,
        rng: &mut impl Rng,
    ) -> Result<RoundOutcome, GameError> {
        let room_id = self.room_id();
        if !self.room.started || self.room.finalized || self.room.game_phase != GamePhase::Voting {
            return Err(GameError::GameNotActive(room_id));
        }
        let round = self.room.current_round;
        if let Some(expected) = expected_round {
            if expected != round {
                return Err(GameError::StaleRound {
                    expected,
                    current: round,
                });
            }
        }

        let votes = self.ledger.for_round(round);
        let stage_paths = config.stage_paths(round);
        let resolution = resolver::resolve(self.roster.players(), &votes, &stage_paths, rng);

        for address in &resolution.eliminated {
            self.roster.eliminate(address);
        }
        self.roster.record_moves(|address| {
            votes
                .iter()
                .find(|v| &v.address == address)
                .map(|v| v.choice.clone())
        });

        let room = &mut self.room;
        if round < room.max_rounds {
            room.current_round += 1;
            room.game_phase = GamePhase::Voting;
            room.phase_end_time = Some(vote_deadline(config, now));
        } else {
            room.game_phase = GamePhase::Finished;
            room.phase_end_time = None;
            room.winning_path = Some(resolution.winning_path.clone());
            room.winners = Some(self.roster.winners());
        }

        tracing::info!(
            %room_id,
            round,
            police_choice = %resolution.police_choice,
            winning_path = %resolution.winning_path,
            eliminated = resolution.eliminated.len(),
            next_phase = %room.game_phase,
            "round resolved"
        );

        Ok(RoundOutcome {
            round,
            winning_path: resolution.winning_path,
            police_choice: resolution.police_choice,
            eliminated_count: resolution.eliminated.len(),
            eliminated: resolution.eliminated,
            total_votes: votes.len(),
            next_phase: room.game_phase,
        })
    }

    // -----------------------------------------------------------------------
    // Settlement
    // -----------------------------------------------------------------------

    /// Validates a finalize and returns the game id to settle.
    pub fn check_finalize(&self, caller: &Address) -> Result<u64, GameError> {
        let game_id = self.check_settleable(caller, "finalize the game")?;
        if self.room.game_phase != GamePhase::Finished {
            return Err(GameError::NotFinishedYet {
                room_id: self.room_id(),
                phase: self.room.game_phase,
            });
        }
        Ok(game_id)
    }

    /// Reserves a finalize and returns the game id and the winners to pay.
    ///
    /// `claimed` must name the same addresses the last round settled on,
    /// in any order.
    pub fn begin_finalize(
        &mut self,
        caller: &Address,
        claimed: &[Address],
    ) -> Result<(u64, Vec<Address>), GameError> {
        let game_id = self.check_finalize(caller)?;
        let winners = self.room.winners.clone().unwrap_or_default();
        let claimed_set: HashSet<&Address> = claimed.iter().collect();
        let winner_set: HashSet<&Address> = winners.iter().collect();
        if claimed_set != winner_set {
            return Err(GameError::InvalidInput(format!(
                "winners do not match the {} computed for room {}",
                winners.len(),
                self.room_id()
            )));
        }
        self.reserve(SettlementStep::Finalize);
        Ok((game_id, winners))
    }

    pub fn commit_finalize(&mut self, caller: &Address, vault: f64) -> Result<(), GameError> {
        self.release(SettlementStep::Finalize);
        self.check_finalize(caller)?;
        let winners = self.room.winners.as_ref().map_or(0, Vec::len);
        tracing::info!(room_id = %self.room.room_id, winners, vault, "game finalized");
        self.room.finalized = true;
        self.room.vault = Some(vault);
        Ok(())
    }

    /// Validates a refund and returns the game id to settle. Any phase
    /// qualifies.
    pub fn check_refund(&self, caller: &Address) -> Result<u64, GameError> {
        self.check_settleable(caller, "refund the game")
    }

    pub fn begin_refund(&mut self, caller: &Address) -> Result<u64, GameError> {
        let game_id = self.check_refund(caller)?;
        self.reserve(SettlementStep::Refund);
        Ok(game_id)
    }

    pub fn commit_refund(&mut self, caller: &Address) -> Result<(), GameError> {
        self.release(SettlementStep::Refund);
        self.check_refund(caller)?;
        tracing::info!(room_id = %self.room.room_id, phase = %self.room.game_phase, "game refunded");
        let room = &mut self.room;
        room.finalized = true;
        room.winners = Some(Vec::new());
        room.game_phase = GamePhase::Finished;
        room.phase_end_time = None;
        Ok(())
    }

    fn check_settleable(&self, caller: &Address, action: &'static str) -> Result<u64, GameError> {
        self.require_creator(caller, action)?;
        self.require_idle()?;
        if !self.room.started {
            return Err(GameError::NotStarted(self.room_id()));
        }
        if self.room.finalized {
            return Err(GameError::AlreadyFinalized(self.room_id()));
        }
        self.room
            .game_id
            .ok_or_else(|| GameError::NotStarted(self.room_id()))
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    pub fn check_delete(&self, caller: &Address) -> Result<(), GameError> {
        self.require_creator(caller, "delete the room")?;
        self.require_idle()?;
        if self.room.started {
            return Err(GameError::AlreadyStarted(self.room_id()));
        }
        Ok(())
    }
}

fn vote_deadline(config: &GameConfig, now: u64) -> u64 {
    now.saturating_add(config.timings.vote_duration.saturating_mul(1000))
}

#[cfg(test)]
mod tests {
    use getaway_protocol::ErrorKind;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    const NOW: u64 = 1_700_000_000_000;

    fn addr(s: &str) -> Address {
        Address::new(s)
    }

    fn creator() -> Player {
        Player {
            address: addr("0xt1"),
            nickname: Some("Shadow".into()),
            role: Role::Thief,
            eliminated: false,
            moves: Vec::new(),
        }
    }

    fn small_config() -> GameConfig {
        GameConfig {
            stage_count: 2,
            path_names: ["A", "B", "C", "D", "E", "F"].map(String::from).to_vec(),
            ..GameConfig::default()
        }
    }

    /// Two thieves and two police, already started.
    fn started_room(config: &GameConfig) -> (GameRoom, StdRng) {
        let mut rng = StdRng::seed_from_u64(9);
        let mut game = GameRoom::new(
            RoomId(1),
            RoomCode::parse("ABC123").unwrap(),
            creator(),
            config,
            NOW,
        );
        game.join(addr("0xt2"), None, Role::Thief, config, &mut rng).unwrap();
        game.join(addr("0xp1"), None, Role::Police, config, &mut rng).unwrap();
        game.join(addr("0xp2"), None, Role::Police, config, &mut rng).unwrap();
        game.commit_start(&addr("0xt1"), 0.0, 77, config, NOW).unwrap();
        (game, rng)
    }

    #[test]
    fn test_new_room_snapshots_config() {
        let config = small_config();
        let game = GameRoom::new(RoomId(3), RoomCode::parse("XYZ789").unwrap(), creator(), &config, NOW);
        let room = game.room();
        assert_eq!(room.game_phase, GamePhase::Waiting);
        assert_eq!(room.current_round, 0);
        assert_eq!(room.required_min_players, 4);
        assert_eq!(room.max_rounds, 2);
        assert_eq!(room.created_at, NOW);
        assert_eq!(game.player_count(), 1);
    }

    #[test]
    fn test_commit_start_sets_voting_state() {
        let config = small_config();
        let (game, _) = started_room(&config);
        let room = game.room();
        assert!(room.started);
        assert_eq!(room.game_phase, GamePhase::Voting);
        assert_eq!(room.current_round, 1);
        assert_eq!(room.phase_end_time, Some(NOW + 20_000));
        assert_eq!(room.game_id, Some(77));
    }

    #[test]
    fn test_check_start_guards_in_order() {
        let config = GameConfig {
            entry_fee_minimum: 1.0,
            ..small_config()
        };
        let game = GameRoom::new(RoomId(1), RoomCode::parse("ABC123").unwrap(), creator(), &config, NOW);

        let err = game.check_start(&addr("0xother"), 5.0, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = game.check_start(&addr("0xt1"), 0.5, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FeeTooLow);

        let err = game.check_start(&addr("0xt1"), 1.0, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientRoster);
    }

    #[test]
    fn test_join_after_start_is_rejected() {
        let config = small_config();
        let (mut game, mut rng) = started_room(&config);
        let err = game
            .join(addr("0xlate"), None, Role::Police, &config, &mut rng)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyStarted);
    }

    #[test]
    fn test_submit_vote_guards() {
        let config = small_config();
        let mut game = GameRoom::new(RoomId(1), RoomCode::parse("ABC123").unwrap(), creator(), &config, NOW);
        let err = game.submit_vote(addr("0xt1"), "A".into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongPhase);

        let (mut game, _) = started_room(&config);
        let err = game.submit_vote(addr("0xnobody"), "A".into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAMember);
    }

    #[test]
    fn test_resolve_advances_one_round_and_eliminates() {
        let config = small_config();
        let (mut game, mut rng) = started_room(&config);
        game.submit_vote(addr("0xp1"), "A".into()).unwrap();
        game.submit_vote(addr("0xp2"), "A".into()).unwrap();
        game.submit_vote(addr("0xt1"), "A".into()).unwrap();
        game.submit_vote(addr("0xt2"), "B".into()).unwrap();

        let outcome = game.resolve(Some(1), &config, NOW + 21_000, &mut rng).unwrap();
        assert_eq!(outcome.round, 1);
        assert_eq!(outcome.police_choice, "A");
        assert_ne!(outcome.winning_path, "A");
        assert_eq!(outcome.eliminated, vec![addr("0xt1")]);
        assert_eq!(outcome.total_votes, 4);
        assert_eq!(outcome.next_phase, GamePhase::Voting);

        let room = game.room();
        assert_eq!(room.current_round, 2);
        assert_eq!(room.phase_end_time, Some(NOW + 41_000));
        assert!(room.winning_path.is_none());

        let err = game.submit_vote(addr("0xt1"), "D".into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Eliminated);
    }

    #[test]
    fn test_resolve_stale_round_changes_nothing() {
        let config = small_config();
        let (mut game, mut rng) = started_room(&config);
        game.resolve(Some(1), &config, NOW, &mut rng).unwrap();

        let err = game.resolve(Some(1), &config, NOW, &mut rng).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StaleRound);
        assert_eq!(game.room().current_round, 2);
    }

    #[test]
    fn test_resolve_final_round_picks_surviving_thieves() {
        let config = small_config();
        let (mut game, mut rng) = started_room(&config);
        game.submit_vote(addr("0xp1"), "A".into()).unwrap();
        game.submit_vote(addr("0xt1"), "A".into()).unwrap();
        game.resolve(None, &config, NOW, &mut rng).unwrap();

        let outcome = game.resolve(None, &config, NOW, &mut rng).unwrap();
        assert_eq!(outcome.round, 2);
        assert_eq!(outcome.next_phase, GamePhase::Finished);

        let room = game.room();
        assert_eq!(room.game_phase, GamePhase::Finished);
        assert_eq!(room.phase_end_time, None);
        assert_eq!(room.winners, Some(vec![addr("0xt2")]));
        assert_eq!(room.winning_path.as_deref(), Some(outcome.winning_path.as_str()));

        let err = game.resolve(None, &config, NOW, &mut rng).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GameNotActive);
    }

    #[test]
    fn test_resolve_all_thieves_caught_police_win() {
        let config = GameConfig {
            stage_count: 1,
            ..small_config()
        };
        let (mut game, mut rng) = started_room(&config);
        game.submit_vote(addr("0xp1"), "B".into()).unwrap();
        game.submit_vote(addr("0xt1"), "B".into()).unwrap();
        game.submit_vote(addr("0xt2"), "B".into()).unwrap();

        let outcome = game.resolve(None, &config, NOW, &mut rng).unwrap();
        assert_eq!(outcome.eliminated_count, 2);
        assert_eq!(game.room().winners, Some(vec![addr("0xp1"), addr("0xp2")]));
        assert!(game.players().iter().filter(|p| p.role == Role::Police).all(|p| !p.eliminated));
    }

    #[test]
    fn test_resolve_records_move_log() {
        let config = small_config();
        let (mut game, mut rng) = started_room(&config);
        game.submit_vote(addr("0xt2"), "C".into()).unwrap();
        game.resolve(None, &config, NOW, &mut rng).unwrap();

        let t2 = game.players().iter().find(|p| p.address == addr("0xt2")).unwrap();
        let p1 = game.players().iter().find(|p| p.address == addr("0xp1")).unwrap();
        assert_eq!(t2.moves, vec!["C"]);
        assert_eq!(p1.moves, vec!["-"]);
    }

    #[test]
    fn test_finalize_requires_finished_then_once() {
        let config = GameConfig {
            stage_count: 1,
            ..small_config()
        };
        let (mut game, mut rng) = started_room(&config);
        let creator = addr("0xt1");

        let err = game.check_finalize(&creator).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFinishedYet);

        game.resolve(None, &config, NOW, &mut rng).unwrap();
        assert_eq!(game.check_finalize(&creator).unwrap(), 77);
        let (game_id, winners) = game
            .begin_finalize(&creator, &[addr("0xt2"), addr("0xt1")])
            .unwrap();
        assert_eq!(game_id, 77);
        assert_eq!(winners, vec![addr("0xt1"), addr("0xt2")]);
        game.commit_finalize(&creator, 4.0).unwrap();
        assert_eq!(game.room().winners, Some(vec![addr("0xt1"), addr("0xt2")]));
        assert_eq!(game.pending_settlement(), None);
        assert!(game.room().finalized);
        assert_eq!(game.room().vault, Some(4.0));

        let err = game.check_finalize(&creator).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyFinalized);
    }

    #[test]
    fn test_begin_finalize_rejects_other_winners() {
        let config = GameConfig {
            stage_count: 1,
            ..small_config()
        };
        let (mut game, mut rng) = started_room(&config);
        let creator = addr("0xt1");
        game.resolve(None, &config, NOW, &mut rng).unwrap();

        for claimed in [
            vec![addr("0xt2")],
            vec![addr("0xt1"), addr("0xt2"), addr("0xp1")],
            vec![creator.clone(), addr("0xstranger")],
        ] {
            let err = game.begin_finalize(&creator, &claimed).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
        assert_eq!(game.pending_settlement(), None);
        assert_eq!(game.room().winners, Some(vec![addr("0xt1"), addr("0xt2")]));
    }

    #[test]
    fn test_pending_start_blocks_other_start_and_delete() {
        let config = small_config();
        let mut rng = StdRng::seed_from_u64(9);
        let mut game = GameRoom::new(RoomId(1), RoomCode::parse("ABC123").unwrap(), creator(), &config, NOW);
        game.join(addr("0xt2"), None, Role::Thief, &config, &mut rng).unwrap();
        game.join(addr("0xp1"), None, Role::Police, &config, &mut rng).unwrap();
        game.join(addr("0xp2"), None, Role::Police, &config, &mut rng).unwrap();
        let creator = addr("0xt1");

        game.begin_start(&creator, 0.0, &config).unwrap();
        assert_eq!(game.pending_settlement(), Some(SettlementStep::Start));
        let err = game.begin_start(&creator, 0.0, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SettlementPending);
        let err = game.check_delete(&creator).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SettlementPending);

        game.abort_settlement(SettlementStep::Start);
        assert!(game.check_delete(&creator).is_ok());

        game.begin_start(&creator, 0.0, &config).unwrap();
        game.commit_start(&creator, 0.0, 5, &config, NOW).unwrap();
        assert_eq!(game.pending_settlement(), None);
        assert!(game.room().started);
    }

    #[test]
    fn test_pending_refund_blocks_finalize() {
        let config = GameConfig {
            stage_count: 1,
            ..small_config()
        };
        let (mut game, mut rng) = started_room(&config);
        let creator = addr("0xt1");
        game.resolve(None, &config, NOW, &mut rng).unwrap();

        assert_eq!(game.begin_refund(&creator).unwrap(), 77);
        let err = game
            .begin_finalize(&creator, &[addr("0xt1"), addr("0xt2")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SettlementPending);

        // Aborting a step that is not pending changes nothing.
        game.abort_settlement(SettlementStep::Finalize);
        assert_eq!(game.pending_settlement(), Some(SettlementStep::Refund));

        game.commit_refund(&creator).unwrap();
        assert!(game.room().finalized);
        assert_eq!(game.pending_settlement(), None);
    }

    #[test]
    fn test_refund_from_voting_finishes_room() {
        let config = small_config();
        let (mut game, _) = started_room(&config);
        let err = game.check_refund(&addr("0xp1")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        game.commit_refund(&addr("0xt1")).unwrap();
        let room = game.room();
        assert!(room.finalized);
        assert_eq!(room.game_phase, GamePhase::Finished);
        assert_eq!(room.winners, Some(vec![]));
        assert_eq!(room.phase_end_time, None);
    }

    #[test]
    fn test_refund_before_start_is_not_started() {
        let config = small_config();
        let game = GameRoom::new(RoomId(1), RoomCode::parse("ABC123").unwrap(), creator(), &config, NOW);
        let err = game.check_refund(&addr("0xt1")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotStarted);
    }

    #[test]
    fn test_check_delete_only_before_start() {
        let config = small_config();
        let game = GameRoom::new(RoomId(1), RoomCode::parse("ABC123").unwrap(), creator(), &config, NOW);
        assert!(game.check_delete(&addr("0xt1")).is_ok());
        assert_eq!(
            game.check_delete(&addr("0xp1")).unwrap_err().kind(),
            ErrorKind::Forbidden
        );

        let (started, _) = started_room(&config);
        assert_eq!(
            started.check_delete(&addr("0xt1")).unwrap_err().kind(),
            ErrorKind::AlreadyStarted
        );
    }
}
