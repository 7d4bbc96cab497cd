//! `GetawayServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → room manager.

use std::net::SocketAddr;
use std::sync::Arc;

use getaway_protocol::{Codec, JsonCodec};
use getaway_room::{Clock, ConfigStore, RoomManager, SystemClock};
use getaway_settlement::SettlementBridge;
use getaway_transport::{Transport, WebSocketTransport};

use crate::GetawayError;
use crate::handler::handle_connection;

/// Clients must send this version in their handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Default listen address.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Shared by every connection task.
///
/// The room manager synchronizes internally, so no outer lock is needed.
pub(crate) struct ServerState<B: SettlementBridge, C: Codec> {
    pub(crate) rooms: RoomManager<B>,
    pub(crate) codec: C,
}

/// Configures and binds a [`GetawayServer`].
///
/// ```rust,ignore
/// let server = GetawayServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .config(ConfigStore::from_env())
///     .build(Arc::new(InMemoryEscrow::default()))
///     .await?;
/// server.run().await
/// ```
pub struct GetawayServerBuilder {
    bind_addr: String,
    config: ConfigStore,
    seed: Option<u64>,
    clock: Arc<dyn Clock>,
}

impl GetawayServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            config: ConfigStore::new(),
            seed: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the game config store shared with the room manager.
    pub fn config(mut self, config: ConfigStore) -> Self {
        self.config = config;
        self
    }

    /// Makes room codes and path draws reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the clock behind room deadlines and the `server_time` sent to
    /// clients.
    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Binds the listener and builds the server around `bridge`.
    pub async fn build<B: SettlementBridge>(
        self,
        bridge: Arc<B>,
    ) -> Result<GetawayServer<B, JsonCodec>, GetawayError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let mut rooms = RoomManager::new(self.config, bridge).with_clock(self.clock);
        if let Some(seed) = self.seed {
            rooms = rooms.with_seed(seed);
        }

        Ok(GetawayServer {
            transport,
            state: Arc::new(ServerState {
                rooms,
                codec: JsonCodec,
            }),
        })
    }
}

impl Default for GetawayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound game server. Call [`run()`](Self::run) to accept connections.
pub struct GetawayServer<B: SettlementBridge, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<B, C>>,
}

impl<B: SettlementBridge, C: Codec> GetawayServer<B, C> {
    pub fn local_addr(&self) -> Result<SocketAddr, GetawayError> {
        Ok(self.transport.local_addr()?)
    }

    /// The room manager behind the server.
    pub fn rooms(&self) -> &RoomManager<B> {
        &self.state.rooms
    }

    /// Accepts connections and spawns one handler task per client. Runs
    /// until the process ends.
    pub async fn run(mut self) -> Result<(), GetawayError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "getaway server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
