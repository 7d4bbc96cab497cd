//! Room manager: the registry of rooms and the entry point for every
//! room, roster, vote and settlement operation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use getaway_protocol::{
    Address, CreatedRoom, Player, PoliceSummary, RefundEligibility, Role, Room, RoomCode, RoomId,
    RoomSummary, RoundOutcome, Vote,
};
use getaway_settlement::{SettlementBridge, SettlementError, confirm, refund_eligibility};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::game::{GameRoom, SettlementStep};
use crate::room::spawn_room;
use crate::roster::random_nickname;
use crate::{Clock, ConfigStore, GameError, RoomHandle, SystemClock};

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// `list_active_rooms` returns at most this many rooms.
pub const ACTIVE_ROOMS_LIMIT: usize = 20;

/// Code draws before giving up. Collisions are rare in a 36^6 space.
const MAX_CODE_ATTEMPTS: usize = 64;

struct RoomEntry {
    handle: RoomHandle,
    code: RoomCode,
}

/// Maps guarded together so code reservation and room insertion are one
/// step.
struct Registry {
    rooms: HashMap<RoomId, RoomEntry>,
    codes: HashMap<RoomCode, RoomId>,
    rng: StdRng,
}

impl Registry {
    fn unused_code(&mut self) -> Option<RoomCode> {
        (0..MAX_CODE_ATTEMPTS).find_map(|_| {
            let code = generate_code(&mut self.rng);
            (!self.codes.contains_key(&code)).then_some(code)
        })
    }
}

/// Draws a random room code.
pub fn generate_code(rng: &mut impl Rng) -> RoomCode {
    let alphabet = RoomCode::ALPHABET.len();
    RoomCode::from_indices(std::array::from_fn(|_| rng.random_range(0..alphabet)))
}

/// Owns every room on the server.
///
/// The registry lock is only held for map work and is never held across
/// an `.await`. Per-room work runs inside the room's actor, and
/// settlement calls run between actor commands: validate and reserve the
/// room, call the bridge and wait for confirmation, then re-validate and
/// commit. A failed bridge call releases the reservation instead.
pub struct RoomManager<B: SettlementBridge> {
    registry: Mutex<Registry>,
    next_room_id: AtomicU64,
    config: ConfigStore,
    bridge: Arc<B>,
    clock: Arc<dyn Clock>,
    seed: Option<u64>,
}

impl<B: SettlementBridge> RoomManager<B> {
    /// Creates an empty manager using the system clock and OS randomness.
    pub fn new(config: ConfigStore, bridge: Arc<B>) -> Self {
        Self {
            registry: Mutex::new(Registry {
                rooms: HashMap::new(),
                codes: HashMap::new(),
                rng: StdRng::from_rng(&mut rand::rng()),
            }),
            next_room_id: AtomicU64::new(1),
            config,
            bridge,
            clock: Arc::new(SystemClock),
            seed: None,
        }
    }

    /// Replaces the clock used for deadlines and creation times.
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Makes codes, nicknames and path draws reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.registry
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .rng = StdRng::seed_from_u64(seed);
        self.seed = Some(seed);
        self
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn bridge(&self) -> &Arc<B> {
        &self.bridge
    }

    /// The current time on the manager's clock, in epoch milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// The clock behind deadlines and creation times.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn room_count(&self) -> usize {
        self.registry().rooms.len()
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, room_id: RoomId) -> Option<RoomHandle> {
        self.registry()
            .rooms
            .get(&room_id)
            .map(|entry| entry.handle.clone())
    }

    fn require(&self, room_id: RoomId) -> Result<RoomHandle, GameError> {
        self.handle(room_id)
            .ok_or_else(|| GameError::room_not_found(room_id))
    }

    fn room_rng(&self, room_id: RoomId, registry: &mut Registry) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ room_id.0),
            None => StdRng::from_rng(&mut registry.rng),
        }
    }

    // -----------------------------------------------------------------------
    // RoomRegistry
    // -----------------------------------------------------------------------

    /// Creates a room with `creator` as its first player.
    pub fn create_room(
        &self,
        creator: Address,
        nickname: Option<String>,
        role: Role,
    ) -> Result<CreatedRoom, GameError> {
        let config = self.config.get_or_default();
        let now = self.clock.now_ms();

        let mut registry = self.registry();
        let room_code = registry
            .unused_code()
            .ok_or_else(|| GameError::Unavailable("room code space".into()))?;
        let room_id = RoomId(self.next_room_id.fetch_add(1, Ordering::Relaxed));
        let nickname = nickname.unwrap_or_else(|| random_nickname(&config, role, &mut registry.rng));
        let player = Player {
            address: creator.clone(),
            nickname: Some(nickname),
            role,
            eliminated: false,
            moves: Vec::new(),
        };
        let game = GameRoom::new(room_id, room_code.clone(), player, &config, now);
        let rng = self.room_rng(room_id, &mut registry);
        let handle = spawn_room(game, rng, DEFAULT_CHANNEL_SIZE);

        registry.codes.insert(room_code.clone(), room_id);
        registry.rooms.insert(
            room_id,
            RoomEntry {
                handle,
                code: room_code.clone(),
            },
        );
        drop(registry);

        tracing::info!(%room_id, %room_code, %creator, %role, "room created");
        Ok(CreatedRoom { room_id, room_code })
    }

    /// The room with this code, or `None`.
    pub async fn get_room_by_code(&self, code: &RoomCode) -> Result<Option<Room>, GameError> {
        let room_id = self.registry().codes.get(code).copied();
        match room_id {
            Some(room_id) => self.get_room(room_id).await,
            None => Ok(None),
        }
    }

    /// The room with this id, or `None`.
    pub async fn get_room(&self, room_id: RoomId) -> Result<Option<Room>, GameError> {
        match self.handle(room_id) {
            Some(handle) => Ok(Some(handle.snapshot().await?.room)),
            None => Ok(None),
        }
    }

    /// Starts the game: reserve, open and fund the escrow, then commit.
    ///
    /// An escrow left created but unfunded by an earlier failed start is
    /// funded rather than created again, so the same `game_id` can be
    /// retried.
    pub async fn start_game(
        &self,
        room_id: RoomId,
        caller: Address,
        entry_fee: f64,
        game_id: u64,
    ) -> Result<(), GameError> {
        let handle = self.require(room_id)?;
        let config = self.config.get_or_default();
        handle
            .begin_start(caller.clone(), entry_fee, Arc::clone(&config))
            .await?;

        self.settle(&handle, SettlementStep::Start, async {
            if self.unfunded_escrow(game_id).await? {
                tracing::info!(%room_id, game_id, "reusing unfunded escrow");
            } else {
                confirm(&*self.bridge, self.bridge.create_escrow(game_id).await?).await?;
            }
            confirm(&*self.bridge, self.bridge.lock_fee(game_id, entry_fee).await?).await
        })
        .await?;

        let now = self.clock.now_ms();
        let result = handle
            .commit_start(caller, entry_fee, game_id, config, now)
            .await;
        if let Err(e) = &result {
            tracing::error!(%room_id, game_id, error = %e, "escrow funded but room failed to start");
        }
        result
    }

    /// Finalizes a finished game: reserve, pay out, then commit.
    ///
    /// `winners` must match the winners the last round produced; the
    /// payout always goes to the stored list.
    pub async fn finalize_game(
        &self,
        room_id: RoomId,
        caller: Address,
        winners: Vec<Address>,
        vault: f64,
    ) -> Result<(), GameError> {
        let handle = self.require(room_id)?;
        let (game_id, payout) = handle.begin_finalize(caller.clone(), winners).await?;

        self.settle(&handle, SettlementStep::Finalize, async {
            confirm(&*self.bridge, self.bridge.finalize(game_id, payout).await?).await
        })
        .await?;

        let result = handle.commit_finalize(caller, vault).await;
        if let Err(e) = &result {
            tracing::error!(%room_id, game_id, error = %e, "escrow paid out but room failed to finalize");
        }
        result
    }

    /// Refunds a started game in any phase: validate, refund, then commit.
    pub async fn refund_game(&self, room_id: RoomId, caller: Address) -> Result<(), GameError> {
        let handle = self.require(room_id)?;
        let game_id = handle.begin_refund(caller.clone()).await?;

        self.settle(&handle, SettlementStep::Refund, async {
            confirm(&*self.bridge, self.bridge.refund(game_id).await?).await
        })
        .await?;

        let result = handle.commit_refund(caller).await;
        if let Err(e) = &result {
            tracing::error!(%room_id, game_id, error = %e, "escrow refunded but room failed to update");
        }
        result
    }

    /// Runs the bridge work for a reserved room. On failure the
    /// reservation is released and local state is otherwise untouched.
    async fn settle(
        &self,
        handle: &RoomHandle,
        step: SettlementStep,
        work: impl Future<Output = Result<(), SettlementError>>,
    ) -> Result<(), GameError> {
        let Err(e) = work.await else {
            return Ok(());
        };
        let room_id = handle.room_id();
        tracing::warn!(%room_id, %step, error = %e, "settlement failed");
        if let Err(abort) = handle.abort_settlement(step).await {
            tracing::error!(%room_id, %step, error = %abort, "failed to release settlement reservation");
        }
        Err(GameError::Settlement(e))
    }

    /// Whether `game_id` has an escrow that was created but never funded.
    async fn unfunded_escrow(&self, game_id: u64) -> Result<bool, SettlementError> {
        match self.bridge.escrow_state(game_id).await {
            Ok(state) => Ok(!state.started && !state.finalized),
            Err(SettlementError::EscrowNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Whether `caller` could refund the room's escrow right now.
    pub async fn refund_eligibility(
        &self,
        room_id: RoomId,
        caller: Address,
    ) -> Result<RefundEligibility, GameError> {
        let room = self.require(room_id)?.snapshot().await?.room;
        let escrow = match room.game_id {
            Some(game_id) => match self.bridge.escrow_state(game_id).await {
                Ok(state) => Some(state),
                Err(SettlementError::EscrowNotFound(_)) => None,
                Err(e) => return Err(e.into()),
            },
            None => None,
        };
        let current_block = self.bridge.current_block().await?;
        let cooldown_blocks = self.bridge.cooldown_blocks().await?;
        Ok(refund_eligibility(
            escrow.as_ref(),
            room.creator == caller,
            current_block,
            cooldown_blocks,
        ))
    }

    /// Deletes a room that has not started, with its players and votes.
    pub async fn delete_room(&self, room_id: RoomId, caller: Address) -> Result<(), GameError> {
        let handle = self.require(room_id)?;
        handle.delete(caller).await?;

        let mut registry = self.registry();
        if let Some(entry) = registry.rooms.remove(&room_id) {
            registry.codes.remove(&entry.code);
        }
        Ok(())
    }

    /// Rooms not yet finalized, newest first, at most
    /// [`ACTIVE_ROOMS_LIMIT`].
    ///
    /// Rooms that stop answering mid-listing are skipped.
    pub async fn list_active_rooms(&self) -> Vec<RoomSummary> {
        let mut handles: Vec<RoomHandle> = self
            .registry()
            .rooms
            .values()
            .map(|entry| entry.handle.clone())
            .collect();
        // Ids are handed out in creation order.
        handles.sort_by_key(|h| std::cmp::Reverse(h.room_id()));

        let mut summaries = Vec::with_capacity(ACTIVE_ROOMS_LIMIT.min(handles.len()));
        for handle in handles {
            if summaries.len() == ACTIVE_ROOMS_LIMIT {
                break;
            }
            let Ok(snapshot) = handle.snapshot().await else {
                continue;
            };
            let room = snapshot.room;
            if room.finalized {
                continue;
            }
            summaries.push(RoomSummary {
                room_id: room.room_id,
                creator: room.creator,
                entry_fee: room.entry_fee,
                room_code: room.room_code,
                player_count: snapshot.player_count,
                started: room.started,
            });
        }
        summaries
    }

    // -----------------------------------------------------------------------
    // PlayerRoster
    // -----------------------------------------------------------------------

    /// Joins (or re-joins) the room with this code.
    pub async fn join_room(
        &self,
        code: &RoomCode,
        address: Address,
        nickname: Option<String>,
        role: Role,
    ) -> Result<RoomId, GameError> {
        let handle = {
            let registry = self.registry();
            registry
                .codes
                .get(code)
                .and_then(|id| registry.rooms.get(id))
                .map(|entry| entry.handle.clone())
        }
        .ok_or_else(|| GameError::NotFound(format!("room with code {code}")))?;

        let config = self.config.get_or_default();
        handle.join(address, nickname, role, config).await?;
        Ok(handle.room_id())
    }

    /// The room's players. Empty if the room does not exist.
    pub async fn get_room_players(&self, room_id: RoomId) -> Result<Vec<Player>, GameError> {
        match self.handle(room_id) {
            Some(handle) => handle.players().await,
            None => Ok(Vec::new()),
        }
    }

    // -----------------------------------------------------------------------
    // VoteLedger
    // -----------------------------------------------------------------------

    /// Casts or replaces `address`'s vote for the current round.
    pub async fn submit_vote(
        &self,
        room_id: RoomId,
        address: Address,
        choice: String,
    ) -> Result<(), GameError> {
        self.require(room_id)?.submit_vote(address, choice).await
    }

    pub async fn get_round_votes(&self, room_id: RoomId, round: u32) -> Result<Vec<Vote>, GameError> {
        match self.handle(room_id) {
            Some(handle) => handle.round_votes(round).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_player_vote(
        &self,
        room_id: RoomId,
        round: u32,
        address: Address,
    ) -> Result<Option<Vote>, GameError> {
        match self.handle(room_id) {
            Some(handle) => handle.player_vote(round, address).await,
            None => Ok(None),
        }
    }

    pub async fn get_police_summary(
        &self,
        room_id: RoomId,
        round: u32,
    ) -> Result<PoliceSummary, GameError> {
        match self.handle(room_id) {
            Some(handle) => handle.police_summary(round).await,
            None => Ok(PoliceSummary::default()),
        }
    }

    // -----------------------------------------------------------------------
    // RoundResolver
    // -----------------------------------------------------------------------

    /// Resolves the room's current round.
    ///
    /// A missing room has no active game. With `expected_round` set, only
    /// the first of several callers racing on the same round succeeds; the
    /// rest get `StaleRound`.
    pub async fn resolve_round(
        &self,
        room_id: RoomId,
        expected_round: Option<u32>,
    ) -> Result<RoundOutcome, GameError> {
        let handle = self
            .handle(room_id)
            .ok_or(GameError::GameNotActive(room_id))?;
        let config = self.config.get_or_default();
        handle
            .resolve(expected_round, config, self.clock.now_ms())
            .await
    }
}
