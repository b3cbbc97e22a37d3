//! `MineralServer` builder and server loop.
//!
//! This is the entry point for running a Mineral server. It ties together
//! all the layers: transport → protocol → session, with the tick loop
//! running beside the accept loop.

use std::sync::Arc;
use std::time::Duration;

use mineral_protocol::EntityDestroy;
use mineral_session::{HttpSessionVerifier, IdAllocator, SessionRegistry, SessionVerifier};
use mineral_tick::{TickCounter, TickLoop, Ticker, TickerRegistry};
use mineral_transport::{TcpTransport, Transport};
use tracing::{debug, error, info};

use crate::handler::handle_connection;
use crate::world::{FlatColumn, WorldClock};
use crate::{MineralError, ServerConfig, ServerKeys};

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. Each
/// registry serialises its own mutations; nothing here needs an outer
/// lock.
pub(crate) struct ServerState<V> {
    pub(crate) config: ServerConfig,
    pub(crate) sessions: Arc<SessionRegistry>,
    pub(crate) tickers: Arc<TickerRegistry>,
    pub(crate) ids: IdAllocator,
    pub(crate) keys: ServerKeys,
    pub(crate) verifier: V,
    pub(crate) spawn_column: FlatColumn,
}

impl<V: SessionVerifier> ServerState<V> {
    /// Notifies and disconnects the player called `name`, then tells
    /// everyone else. Returns `false` if nobody by that name is online.
    pub(crate) async fn kick(&self, name: &str, reason: &str) -> bool {
        let Some(target) = self.sessions.get(name) else {
            return false;
        };
        if let Err(e) = target.send_chat(format!("Kicked: {reason}")).await {
            debug!(entity = %target.id(), error = %e, "kick notice not delivered");
        }
        target.disconnect(reason).await;
        info!(entity = %target.id(), name, reason, "player kicked");

        // Gone from /list now, not when the socket finally closes. The
        // connection guard then finds nothing to remove, so the despawn
        // happens here.
        if self.sessions.remove(&target) && target.is_ready() {
            let destroy = EntityDestroy {
                entities: vec![target.id()],
            };
            if let Err(e) = self.sessions.broadcast_packet(&destroy).await {
                debug!(entity = %target.id(), error = %e, "despawn broadcast failed");
            }
        }

        let notice = format!("Player {name:?} was kicked from the server.");
        if let Err(e) = self.sessions.broadcast_message(&notice).await {
            debug!(error = %e, "kick notice broadcast failed");
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and starting a Mineral server.
///
/// # Example
///
/// ```rust,no_run
/// use mineral::prelude::*;
///
/// # async fn run() -> Result<(), MineralError> {
/// let server = MineralServer::builder()
///     .bind("127.0.0.1:25565")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct MineralServerBuilder<V = HttpSessionVerifier> {
    config: ServerConfig,
    bind_addr: Option<String>,
    verifier: V,
}

impl MineralServerBuilder<HttpSessionVerifier> {
    /// Creates a new builder with default settings, verifying online
    /// players over HTTP.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            bind_addr: None,
            verifier: HttpSessionVerifier::new(),
        }
    }
}

impl Default for MineralServerBuilder<HttpSessionVerifier> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: SessionVerifier> MineralServerBuilder<V> {
    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds to `addr` instead of the configured host and port.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = Some(addr.to_string());
        self
    }

    /// Uses `verifier` for online-mode identity checks.
    pub fn verifier<W: SessionVerifier>(self, verifier: W) -> MineralServerBuilder<W> {
        MineralServerBuilder {
            config: self.config,
            bind_addr: self.bind_addr,
            verifier,
        }
    }

    /// Binds the listener, generates keys, and prepares the world.
    ///
    /// The tick loop does not start until [`MineralServer::run`].
    pub async fn build(self) -> Result<MineralServer<V>, MineralError> {
        let config = self.config.validated();
        let addr = self.bind_addr.unwrap_or_else(|| config.bind_addr());
        let transport = TcpTransport::bind(addr.as_str(), config.write_timeout).await?;

        let keys = ServerKeys::generate()?;
        let spawn_column = FlatColumn::build().map_err(mineral_protocol::ProtocolError::Io)?;

        let sessions = Arc::new(SessionRegistry::new());
        let tickers = Arc::new(TickerRegistry::new());
        let ids = IdAllocator::new();

        // The clock holds its id for the life of the server.
        let clock_id = ids.acquire();
        let clock: Arc<dyn Ticker> = Arc::new(WorldClock::new(Arc::clone(&sessions)));
        tickers.add(clock_id, clock);

        let tick_loop = TickLoop::new(config.tick.clone(), Arc::clone(&tickers));
        let ticks = tick_loop.counter();

        info!(
            %addr,
            online_mode = config.online_mode,
            max_players = config.max_players,
            server_id = keys.server_id(),
            "server built"
        );

        let state = Arc::new(ServerState {
            config,
            sessions,
            tickers,
            ids,
            keys,
            verifier: self.verifier,
            spawn_column,
        });

        Ok(MineralServer {
            transport,
            tick_loop,
            handle: ServerHandle { state, ticks },
        })
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// A built Mineral server.
///
/// Call [`run()`](Self::run) to start ticking and accepting connections.
pub struct MineralServer<V = HttpSessionVerifier> {
    transport: TcpTransport,
    tick_loop: TickLoop,
    handle: ServerHandle<V>,
}

impl MineralServer<HttpSessionVerifier> {
    /// Creates a new builder.
    pub fn builder() -> MineralServerBuilder {
        MineralServerBuilder::new()
    }
}

impl<V: SessionVerifier> MineralServer<V> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, MineralError> {
        Ok(self.transport.local_addr()?)
    }

    /// A handle for inspecting and administering the server while it runs.
    pub fn handle(&self) -> ServerHandle<V> {
        self.handle.clone()
    }

    /// Starts the tick loop and runs the accept loop.
    ///
    /// Each accepted connection gets its own handler task. Runs until
    /// the process is terminated.
    pub async fn run(mut self) -> Result<(), MineralError> {
        let _ticks = self.tick_loop.spawn();
        info!("Mineral server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.handle.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept failed");
                    // Usually out of file descriptors; give handlers a
                    // moment to close some.
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
    }
}

/// Cheap, cloneable access to a running server.
pub struct ServerHandle<V = HttpSessionVerifier> {
    state: Arc<ServerState<V>>,
    ticks: TickCounter,
}

impl<V> Clone for ServerHandle<V> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            ticks: self.ticks.clone(),
        }
    }
}

impl<V: SessionVerifier> ServerHandle<V> {
    /// Logged-in players.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.state.sessions
    }

    /// Everything the tick loop calls: the world clock plus one entry per
    /// logged-in player.
    pub fn tickers(&self) -> &TickerRegistry {
        &self.state.tickers
    }

    /// Number of logged-in players.
    pub fn online(&self) -> usize {
        self.state.sessions.len()
    }

    /// The most recent tick number, 0 before the first tick.
    pub fn tick(&self) -> u64 {
        self.ticks.get()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Disconnects `name` with `reason` and announces it. Returns `false`
    /// if no such player is online.
    pub async fn kick(&self, name: &str, reason: &str) -> bool {
        self.state.kick(name, reason).await
    }
}
