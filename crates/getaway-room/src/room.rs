//! Room actor: an isolated Tokio task that owns one [`GameRoom`].
//!
//! Each room runs in its own task and processes one command at a time,
//! so every operation on a room is atomic with respect to the others. Two
//! concurrent resolutions of the same round simply queue; the second sees
//! the advanced round.

use std::sync::Arc;

use getaway_protocol::{
    Address, GameConfig, Player, PoliceSummary, Role, Room, RoomId, RoundOutcome, Vote,
};
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};

use crate::GameError;
use crate::game::{GameRoom, SettlementStep};

type Reply<T> = oneshot::Sender<T>;

/// Commands sent to a room actor through its channel.
///
/// Every variant carries a reply channel; the caller waits on it for the
/// result.
pub(crate) enum RoomCommand {
    Snapshot {
        reply: Reply<RoomSnapshot>,
    },
    Players {
        reply: Reply<Vec<Player>>,
    },
    Join {
        address: Address,
        nickname: Option<String>,
        role: Role,
        config: Arc<GameConfig>,
        reply: Reply<Result<(), GameError>>,
    },
    BeginStart {
        caller: Address,
        entry_fee: f64,
        config: Arc<GameConfig>,
        reply: Reply<Result<(), GameError>>,
    },
    CommitStart {
        caller: Address,
        entry_fee: f64,
        game_id: u64,
        config: Arc<GameConfig>,
        now: u64,
        reply: Reply<Result<(), GameError>>,
    },
    SubmitVote {
        address: Address,
        choice: String,
        reply: Reply<Result<(), GameError>>,
    },
    RoundVotes {
        round: u32,
        reply: Reply<Vec<Vote>>,
    },
    PlayerVote {
        round: u32,
        address: Address,
        reply: Reply<Option<Vote>>,
    },
    PoliceSummary {
        round: u32,
        reply: Reply<PoliceSummary>,
    },
    Resolve {
        expected_round: Option<u32>,
        config: Arc<GameConfig>,
        now: u64,
        reply: Reply<Result<RoundOutcome, GameError>>,
    },
    BeginFinalize {
        caller: Address,
        winners: Vec<Address>,
        reply: Reply<Result<(u64, Vec<Address>), GameError>>,
    },
    CommitFinalize {
        caller: Address,
        vault: f64,
        reply: Reply<Result<(), GameError>>,
    },
    BeginRefund {
        caller: Address,
        reply: Reply<Result<u64, GameError>>,
    },
    CommitRefund {
        caller: Address,
        reply: Reply<Result<(), GameError>>,
    },
    /// Releases a settlement reservation after the bridge failed.
    AbortSettlement {
        step: SettlementStep,
        reply: Reply<()>,
    },
    /// Stops the actor if the caller may delete the room.
    Delete {
        caller: Address,
        reply: Reply<Result<(), GameError>>,
    },
}

/// The room record plus its live player count.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub room: Room,
    pub player_count: usize,
}

/// Handle to a running room actor.
///
/// Cheap to clone; it only wraps the command sender.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Sends a command built around a fresh reply channel and waits for
    /// the answer.
    async fn call<T>(&self, command: impl FnOnce(Reply<T>) -> RoomCommand) -> Result<T, GameError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> GameError {
        GameError::Unavailable(format!("room {}", self.room_id))
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, GameError> {
        self.call(|reply| RoomCommand::Snapshot { reply }).await
    }

    pub async fn players(&self) -> Result<Vec<Player>, GameError> {
        self.call(|reply| RoomCommand::Players { reply }).await
    }

    pub async fn join(
        &self,
        address: Address,
        nickname: Option<String>,
        role: Role,
        config: Arc<GameConfig>,
    ) -> Result<(), GameError> {
        self.call(|reply| RoomCommand::Join {
            address,
            nickname,
            role,
            config,
            reply,
        })
        .await?
    }

    /// Validates a start and reserves the room for it.
    pub async fn begin_start(
        &self,
        caller: Address,
        entry_fee: f64,
        config: Arc<GameConfig>,
    ) -> Result<(), GameError> {
        self.call(|reply| RoomCommand::BeginStart {
            caller,
            entry_fee,
            config,
            reply,
        })
        .await?
    }

    pub async fn commit_start(
        &self,
        caller: Address,
        entry_fee: f64,
        game_id: u64,
        config: Arc<GameConfig>,
        now: u64,
    ) -> Result<(), GameError> {
        self.call(|reply| RoomCommand::CommitStart {
            caller,
            entry_fee,
            game_id,
            config,
            now,
            reply,
        })
        .await?
    }

    pub async fn submit_vote(&self, address: Address, choice: String) -> Result<(), GameError> {
        self.call(|reply| RoomCommand::SubmitVote {
            address,
            choice,
            reply,
        })
        .await?
    }

    pub async fn round_votes(&self, round: u32) -> Result<Vec<Vote>, GameError> {
        self.call(|reply| RoomCommand::RoundVotes { round, reply }).await
    }

    pub async fn player_vote(&self, round: u32, address: Address) -> Result<Option<Vote>, GameError> {
        self.call(|reply| RoomCommand::PlayerVote {
            round,
            address,
            reply,
        })
        .await
    }

    pub async fn police_summary(&self, round: u32) -> Result<PoliceSummary, GameError> {
        self.call(|reply| RoomCommand::PoliceSummary { round, reply })
            .await
    }

    pub async fn resolve(
        &self,
        expected_round: Option<u32>,
        config: Arc<GameConfig>,
        now: u64,
    ) -> Result<RoundOutcome, GameError> {
        self.call(|reply| RoomCommand::Resolve {
            expected_round,
            config,
            now,
            reply,
        })
        .await?
    }

    /// Validates a finalize against the stored winners and reserves the
    /// room. Returns the game id and the winners to pay.
    pub async fn begin_finalize(
        &self,
        caller: Address,
        winners: Vec<Address>,
    ) -> Result<(u64, Vec<Address>), GameError> {
        self.call(|reply| RoomCommand::BeginFinalize {
            caller,
            winners,
            reply,
        })
        .await?
    }

    pub async fn commit_finalize(&self, caller: Address, vault: f64) -> Result<(), GameError> {
        self.call(|reply| RoomCommand::CommitFinalize {
            caller,
            vault,
            reply,
        })
        .await?
    }

    pub async fn begin_refund(&self, caller: Address) -> Result<u64, GameError> {
        self.call(|reply| RoomCommand::BeginRefund { caller, reply })
            .await?
    }

    pub async fn commit_refund(&self, caller: Address) -> Result<(), GameError> {
        self.call(|reply| RoomCommand::CommitRefund { caller, reply })
            .await?
    }

    pub async fn abort_settlement(&self, step: SettlementStep) -> Result<(), GameError> {
        self.call(|reply| RoomCommand::AbortSettlement { step, reply })
            .await
    }

    pub async fn delete(&self, caller: Address) -> Result<(), GameError> {
        self.call(|reply| RoomCommand::Delete { caller, reply })
            .await?
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct RoomActor {
    game: GameRoom,
    rng: StdRng,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Processes commands until the room is deleted or every handle is
    /// dropped.
    async fn run(mut self) {
        let room_id = self.game.room().room_id;
        tracing::debug!(%room_id, "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            if self.handle(cmd) {
                break;
            }
        }

        tracing::debug!(%room_id, "room actor stopped");
    }

    /// Handles one command. Returns `true` when the actor should stop.
    fn handle(&mut self, cmd: RoomCommand) -> bool {
        let game = &mut self.game;
        // A dropped reply receiver only means the caller gave up waiting.
        match cmd {
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(RoomSnapshot {
                    room: game.room().clone(),
                    player_count: game.player_count(),
                });
            }
            RoomCommand::Players { reply } => {
                let _ = reply.send(game.players().to_vec());
            }
            RoomCommand::Join {
                address,
                nickname,
                role,
                config,
                reply,
            } => {
                let _ = reply.send(game.join(address, nickname, role, &config, &mut self.rng));
            }
            RoomCommand::BeginStart {
                caller,
                entry_fee,
                config,
                reply,
            } => {
                let _ = reply.send(game.begin_start(&caller, entry_fee, &config));
            }
            RoomCommand::CommitStart {
                caller,
                entry_fee,
                game_id,
                config,
                now,
                reply,
            } => {
                let _ = reply.send(game.commit_start(&caller, entry_fee, game_id, &config, now));
            }
            RoomCommand::SubmitVote {
                address,
                choice,
                reply,
            } => {
                let _ = reply.send(game.submit_vote(address, choice));
            }
            RoomCommand::RoundVotes { round, reply } => {
                let _ = reply.send(game.round_votes(round));
            }
            RoomCommand::PlayerVote {
                round,
                address,
                reply,
            } => {
                let _ = reply.send(game.player_vote(round, &address));
            }
            RoomCommand::PoliceSummary { round, reply } => {
                let _ = reply.send(game.police_summary(round));
            }
            RoomCommand::Resolve {
                expected_round,
                config,
                now,
                reply,
            } => {
                let _ = reply.send(game.resolve(expected_round, &config, now, &mut self.rng));
            }
            RoomCommand::BeginFinalize {
                caller,
                winners,
                reply,
            } => {
                let _ = reply.send(game.begin_finalize(&caller, &winners));
            }
            RoomCommand::CommitFinalize {
                caller,
                vault,
                reply,
            } => {
                let _ = reply.send(game.commit_finalize(&caller, vault));
            }
            RoomCommand::BeginRefund { caller, reply } => {
                let _ = reply.send(game.begin_refund(&caller));
            }
            RoomCommand::CommitRefund { caller, reply } => {
                let _ = reply.send(game.commit_refund(&caller));
            }
            RoomCommand::AbortSettlement { step, reply } => {
                game.abort_settlement(step);
                let _ = reply.send(());
            }
            RoomCommand::Delete { caller, reply } => {
                let result = game.check_delete(&caller);
                let stop = result.is_ok();
                if stop {
                    tracing::info!(
                        room_id = %game.room().room_id,
                        players = game.player_count(),
                        "room deleted"
                    );
                }
                let _ = reply.send(result);
                return stop;
            }
        }
        false
    }
}

/// Spawns a room actor task and returns a handle to it.
///
/// `channel_size` bounds the command queue; senders wait when it is full.
pub(crate) fn spawn_room(game: GameRoom, rng: StdRng, channel_size: usize) -> RoomHandle {
    let room_id = game.room().room_id;
    let (tx, rx) = mpsc::channel(channel_size);

    let actor = RoomActor {
        game,
        rng,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}
