//! A single player's session: the server's record of one connection.
//!
//! A session tracks:
//! - WHO the player is (entity id, and the name once handshaken)
//! - WHERE they are (position, stance, and look)
//! - HOW to reach them (the outbound half of their connection)
//! - WHETHER they are ready (have reported their first position)
//!
//! Sessions are shared as `Arc<Session>` between the connection handler,
//! the [`SessionRegistry`](crate::SessionRegistry), and the tick registry.
//! Every field is either immutable after construction or behind interior
//! mutability, so all methods take `&self`.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::Instant;

use mineral_protocol::{
    AbsolutePos, Angle, ChatMessage, Direction, Disconnect, EntityId, EntityNamedSpawn, KeepAlive,
    Message, Metadata,
};
use mineral_tick::{BoxFuture, Ticker};
use mineral_transport::PacketWriter;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{IdAllocator, SessionError};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Per-session behavior shared by every session on a server.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Ticks between keep-alive probes. Default: 1000 (50 s at 20 Hz).
    /// Zero disables them.
    pub keep_alive_interval: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keep_alive_interval: 1000,
        }
    }
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// Where a player stands and which way they face, in block units and
/// degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Eye height. Always at or above `y` for a valid update.
    pub stance: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub on_ground: bool,
}

impl Placement {
    /// Height of a standing player's eyes above their feet.
    pub const EYE_HEIGHT: f64 = 1.62;

    /// A player standing at the given block position, facing south.
    pub fn standing_at(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            stance: y + Self::EYE_HEIGHT,
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One connected player.
pub struct Session {
    id: EntityId,
    /// Set once, at handshake.
    name: OnceLock<String>,
    writer: PacketWriter,
    placement: Mutex<Placement>,
    ready: AtomicBool,
    released: AtomicBool,
    /// Id of the most recent keep-alive probe, 0 if none is outstanding.
    pending_keep_alive: AtomicI32,
    config: SessionConfig,
    created_at: Instant,
}

impl Session {
    /// Creates an unnamed, not-yet-ready session.
    pub fn new(id: EntityId, writer: PacketWriter, config: SessionConfig) -> Self {
        Self {
            id,
            name: OnceLock::new(),
            writer,
            placement: Mutex::new(Placement::default()),
            ready: AtomicBool::new(false),
            released: AtomicBool::new(false),
            pending_keep_alive: AtomicI32::new(0),
            config,
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The player's name, once the handshake has set it.
    pub fn name(&self) -> Option<&str> {
        self.name.get().map(String::as_str)
    }

    /// Records the name claimed in the handshake.
    ///
    /// # Errors
    /// [`SessionError::AlreadyNamed`] if a name was set before.
    pub fn set_name(&self, name: impl Into<String>) -> Result<(), SessionError> {
        self.name
            .set(name.into())
            .map_err(|_| SessionError::AlreadyNamed(self.id))
    }

    /// The outbound half of this session's connection.
    pub fn writer(&self) -> &PacketWriter {
        &self.writer
    }

    /// When the connection was accepted.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// `true` once the client has reported its first position. Only
    /// ready sessions receive broadcasts.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Marks the session ready. Returns `true` the first time only.
    pub fn mark_ready(&self) -> bool {
        !self.ready.swap(true, Ordering::AcqRel)
    }

    /// A copy of the current placement.
    pub fn placement(&self) -> Placement {
        *self.placement.lock()
    }

    /// Replaces the placement wholesale.
    pub fn set_placement(&self, placement: Placement) {
        *self.placement.lock() = placement;
    }

    /// Updates position and stance, leaving the look untouched.
    pub fn set_position(&self, x: f64, y: f64, stance: f64, z: f64, on_ground: bool) {
        let mut p = self.placement.lock();
        p.x = x;
        p.y = y;
        p.stance = stance;
        p.z = z;
        p.on_ground = on_ground;
    }

    /// Updates the look, leaving the position untouched.
    pub fn set_look(&self, yaw: f32, pitch: f32, on_ground: bool) {
        let mut p = self.placement.lock();
        p.yaw = yaw;
        p.pitch = pitch;
        p.on_ground = on_ground;
    }

    pub fn set_on_ground(&self, on_ground: bool) {
        self.placement.lock().on_ground = on_ground;
    }

    // -- Sending ------------------------------------------------------------

    /// Encodes `message` for the client and writes it.
    pub async fn send<M: Message>(&self, message: &M) -> Result<(), SessionError> {
        let bytes = message.encode(Direction::Clientbound)?;
        self.send_raw(&bytes).await
    }

    /// Writes already-encoded bytes. Used by broadcasts, which encode
    /// once for every recipient.
    pub async fn send_raw(&self, bytes: &[u8]) -> Result<(), SessionError> {
        self.writer.send(bytes).await?;
        Ok(())
    }

    /// Sends one chat line.
    pub async fn send_chat(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.send(&ChatMessage {
            message: text.into(),
        })
        .await
    }

    /// Sends a Disconnect with `reason` and closes the writer.
    ///
    /// Best effort: the peer may already be gone, so a failed send is
    /// only logged.
    pub async fn disconnect(&self, reason: &str) {
        let message = Disconnect {
            reason: reason.to_string(),
        };
        if let Err(e) = self.send(&message).await {
            debug!(entity = %self.id, error = %e, "disconnect not delivered");
        }
        if let Err(e) = self.writer.close().await {
            trace!(entity = %self.id, error = %e, "shutdown after disconnect failed");
        }
    }

    // -- Entity view --------------------------------------------------------

    /// The message that makes this player appear to other clients.
    /// `None` until the session has a name.
    pub fn spawn_message(&self) -> Option<EntityNamedSpawn> {
        let name = self.name()?;
        let p = self.placement();
        Some(EntityNamedSpawn {
            entity: self.id,
            name: name.to_string(),
            x: AbsolutePos::from_blocks(p.x),
            y: AbsolutePos::from_blocks(p.y),
            z: AbsolutePos::from_blocks(p.z),
            yaw: Angle::from_degrees(p.yaw),
            pitch: Angle::from_degrees(p.pitch),
            current_item: 0,
            metadata: Metadata::for_new_player(name),
        })
    }

    // -- Keep-alive ---------------------------------------------------------

    /// Checks a client's keep-alive echo against the last probe sent.
    /// Returns `true` on a match and clears the pending probe.
    pub fn acknowledge_keep_alive(&self, id: i32) -> bool {
        id != 0
            && self
                .pending_keep_alive
                .compare_exchange(id, 0, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    // -- Cleanup ------------------------------------------------------------

    /// Returns this session's entity id to `ids`.
    ///
    /// Only the first call releases; later calls return `Ok(false)`, so
    /// cleanup paths that overlap cannot free the id twice.
    pub fn release_id(&self, ids: &IdAllocator) -> Result<bool, SessionError> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        ids.release(self.id)?;
        Ok(true)
    }
}

impl Ticker for Session {
    fn tick(&self, tick: u64) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let interval = self.config.keep_alive_interval;
            if interval == 0 || tick % interval != 0 {
                return;
            }
            // Zero is reserved for "no probe outstanding".
            let mut id = rand::random::<i32>();
            if id == 0 {
                id = 1;
            }
            self.pending_keep_alive.store(id, Ordering::Release);
            trace!(entity = %self.id, tick, id, "keep-alive");
            if let Err(e) = self.send(&KeepAlive { id }).await {
                debug!(entity = %self.id, error = %e, "keep-alive not delivered");
            }
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}
