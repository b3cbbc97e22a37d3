//! # Mineral
//!
//! A Minecraft 1.5.1 server core. It speaks protocol 60 over TCP,
//! performs the RSA plus AES/CFB8 login handshake, and keeps a flat
//! world ticking at 20 Hz with players walking, chatting, and placing
//! blocks.
//!
//! The layers live in their own crates:
//! transport (TCP, cipher) and protocol (messages) at the bottom, then
//! tick (the 50 ms loop) and session (players, ids), with this crate wiring
//! them into a server.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mineral::prelude::*;
//!
//! # async fn run() -> Result<(), MineralError> {
//! mineral::init_tracing();
//! let server = MineralServer::builder()
//!     .config(ServerConfig {
//!         online_mode: false,
//!         ..ServerConfig::default()
//!     })
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

pub mod config;
mod commands;
mod error;
mod handler;
mod keys;
mod login;
mod server;
mod world;

pub use config::{ConfigError, ConfigSource, ServerConfig};
pub use error::{ConnectionError, MineralError};
pub use keys::{KeyError, ServerKeys};
pub use server::{MineralServer, MineralServerBuilder, ServerHandle};
pub use world::WorldClock;

/// Installs a `tracing` subscriber that prints to stderr.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Calling this
/// more than once, or after another subscriber is installed, does nothing.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Convenience re-exports for running a server.
pub mod prelude {
    pub use crate::{
        ConfigSource, ConnectionError, MineralError, MineralServer, MineralServerBuilder,
        ServerConfig, ServerHandle,
    };
    pub use mineral_protocol::{EntityId, GAME_VERSION, PROTOCOL_VERSION};
    pub use mineral_session::{HttpSessionVerifier, SessionConfig, SessionError, SessionVerifier};
    pub use mineral_tick::{TickConfig, TickPolicy};
}
