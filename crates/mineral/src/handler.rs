//! Per-connection handler: the login state machine and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Handshake → check the protocol version, remember the name
//!   2. Online mode only: EncryptionKeyRequest, then EncryptionKeyResponse
//!      → check the token, ask the session server, switch on the cipher
//!   3. ClientStatuses(0) → register the player and send the world
//!   4. First PlayerPosLook → ready; broadcasts to and about them begin
//!   5. Loop: read one message at a time and dispatch it, in order

use std::io;
use std::sync::Arc;

use mineral_protocol::{
    Angle, AbsolutePos, BlockChange, ChatMessage, ClientStatuses, Direction, Disconnect,
    EncryptionKeyRequest, EncryptionKeyResponse, Entity, EntityDestroy, EntityHeadLook,
    EntityLook, EntityTeleport, EntityId, GAME_VERSION, Handshake, KeepAlive, Message, Packet,
    PacketId, Player, PlayerBlockPlace, PlayerLook, PlayerPos, PlayerPosLook, PROTOCOL_VERSION,
    ProtocolError, ServerListPing,
};
use mineral_session::{Placement, Session, SessionVerifier};
use mineral_transport::cipher::SHARED_SECRET_LEN;
use mineral_transport::{Connection, ConnectionId, PacketReader, TransportError};
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info, trace, warn};

use crate::commands::{self, Command};
use crate::keys::{self, VERIFY_TOKEN_LEN};
use crate::login;
use crate::server::ServerState;
use crate::ConnectionError;

/// Longest name a client may claim.
const MAX_NAME_LEN: usize = 16;

/// Block placed when the player's hand is empty.
const STONE: i16 = 1;

/// Where a connection is in its lifecycle.
///
/// ```text
///   Connected ──Handshake──→ HandshakeReceived ──(online)──→ AwaitingEncryptionResponse
///                                   │                                  │
///                               (offline)                     EncryptionKeyResponse
///                                   │                                  ↓
///                                   └──────ClientStatuses(0)────── Encrypted
///                                                  ↓
///                         LoggedIn ──first PlayerPosLook──→ Ready
/// ```
///
/// Any state can move to `Closed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum State {
    Connected,
    HandshakeReceived,
    /// Holds the token sent in the request until the client echoes it.
    AwaitingEncryptionResponse {
        verify_token: [u8; VERIFY_TOKEN_LEN],
    },
    Encrypted,
    LoggedIn,
    Ready,
    Closed,
}

impl State {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            State::Connected => "connected",
            State::HandshakeReceived => "handshake received",
            State::AwaitingEncryptionResponse { .. } => "awaiting encryption response",
            State::Encrypted => "encrypted",
            State::LoggedIn => "logged in",
            State::Ready => "ready",
            State::Closed => "closed",
        }
    }

    fn may_log_in(&self, online_mode: bool) -> bool {
        match self {
            State::Encrypted => true,
            State::HandshakeReceived => !online_mode,
            _ => false,
        }
    }

    fn is_logged_in(&self) -> bool {
        matches!(self, State::LoggedIn | State::Ready)
    }
}

/// What the read loop does after a message.
enum Next {
    Continue,
    Close,
}

/// Drop guard that takes a session out of every shared structure when
/// the handler exits, however it exits.
///
/// Registry and ticker removal are synchronous; the goodbye broadcast to
/// other players needs I/O, so it is spawned as a fire-and-forget task.
struct SessionGuard<V: SessionVerifier> {
    session: Arc<Session>,
    server: Arc<ServerState<V>>,
}

impl<V: SessionVerifier> Drop for SessionGuard<V> {
    fn drop(&mut self) {
        let entity = self.session.id();
        let was_registered = self.server.sessions.remove(&self.session);
        self.server.tickers.remove(entity);

        match self.session.release_id(&self.server.ids) {
            Ok(_) => {}
            Err(e) => {
                let e = ConnectionError::IdentifierExhaustion(e);
                error!(%entity, error = %e, "entity id not released");
            }
        }

        if was_registered && self.session.is_ready() {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                let sessions = Arc::clone(&self.server.sessions);
                runtime.spawn(async move {
                    let destroy = EntityDestroy {
                        entities: vec![entity],
                    };
                    if let Err(e) = sessions.broadcast_packet(&destroy).await {
                        debug!(%entity, error = %e, "despawn broadcast failed");
                    }
                });
            }
        }

        info!(
            %entity,
            name = self.session.name().unwrap_or_default(),
            "session closed"
        );
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<V: SessionVerifier>(
    conn: Connection,
    server: Arc<ServerState<V>>,
) -> Result<(), ConnectionError> {
    let Connection {
        id: conn_id,
        peer,
        reader,
        writer,
    } = conn;

    let entity = server.ids.acquire();
    debug!(%conn_id, ?peer, %entity, "handling new connection");

    let session = Arc::new(Session::new(entity, writer, server.config.session.clone()));
    let _guard = SessionGuard {
        session: Arc::clone(&session),
        server: Arc::clone(&server),
    };

    let mut handler = Handler {
        conn_id,
        server: &server,
        session: &session,
        reader,
        state: State::Connected,
    };
    let result = handler.run().await;

    match &result {
        Ok(()) => {
            if let Err(e) = session.writer().close().await {
                trace!(%conn_id, error = %e, "shutdown failed");
            }
        }
        Err(e) if e.should_notify() => session.disconnect(&e.reason()).await,
        Err(_) => {
            if let Err(e) = session.writer().close().await {
                trace!(%conn_id, error = %e, "shutdown failed");
            }
        }
    }

    // _guard drops here → registries and the entity id are cleaned up.
    result
}

struct Handler<'a, V: SessionVerifier> {
    conn_id: ConnectionId,
    server: &'a ServerState<V>,
    session: &'a Arc<Session>,
    reader: PacketReader,
    state: State,
}

impl<V: SessionVerifier> Handler<'_, V> {
    async fn run(&mut self) -> Result<(), ConnectionError> {
        let result = self.serve().await;
        let last = std::mem::replace(&mut self.state, State::Closed);
        match &result {
            Ok(()) => debug!(conn_id = %self.conn_id, state = last.name(), "connection finished"),
            Err(e) => debug!(
                conn_id = %self.conn_id,
                state = last.name(),
                error = %e,
                "connection failed"
            ),
        }
        result
    }

    async fn serve(&mut self) -> Result<(), ConnectionError> {
        loop {
            let Some(packet) = self.next_packet().await? else {
                debug!(conn_id = %self.conn_id, "peer closed the connection");
                return Ok(());
            };
            trace!(conn_id = %self.conn_id, id = %packet.id(), "message");
            if let Next::Close = self.dispatch(packet).await? {
                return Ok(());
            }
        }
    }

    /// Reads the next message, bounded by the idle timeout. `None` on a
    /// clean end of stream between messages.
    async fn next_packet(&mut self) -> Result<Option<Packet>, ConnectionError> {
        let idle = self.server.config.read_timeout;
        match tokio::time::timeout(idle, read_packet(&mut self.reader)).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Transport(TransportError::ReceiveFailed(
                io::Error::new(io::ErrorKind::TimedOut, format!("no data for {idle:?}")),
            ))),
        }
    }

    /// Routes one message. Every kind is listed, so a new kind fails to
    /// compile until it is handled here.
    async fn dispatch(&mut self, packet: Packet) -> Result<Next, ConnectionError> {
        let id = packet.id();
        match packet {
            Packet::KeepAlive(m) => self.on_keep_alive(m),
            Packet::Handshake(m) => self.on_handshake(m).await,
            Packet::EncryptionKeyResponse(m) => self.on_encryption_response(m).await,
            Packet::ClientStatuses(m) => self.on_client_status(m).await,
            Packet::ServerListPing(m) => self.on_ping(m).await,
            Packet::Disconnect(m) => self.on_disconnect(m).await,
            Packet::ChatMessage(m) => self.on_chat(m).await,
            Packet::Player(m) => self.on_player(m).await,
            Packet::PlayerPos(m) => self.on_player_pos(m).await,
            Packet::PlayerLook(m) => self.on_player_look(m).await,
            Packet::PlayerPosLook(m) => self.on_player_pos_look(m).await,
            Packet::PlayerBlockPlace(m) => self.on_block_place(m).await,

            // Accepted and logged; they have no server-side effect.
            Packet::EntityInteract(_)
            | Packet::PlayerAction(_)
            | Packet::ItemHeldChange(_)
            | Packet::Animation(_)
            | Packet::EntityAction(_)
            | Packet::WindowClose(_)
            | Packet::WindowClick(_)
            | Packet::ConfirmTransaction(_)
            | Packet::CreativeInventoryAction(_)
            | Packet::EnchantItem(_)
            | Packet::SignUpdate(_)
            | Packet::PlayerAbilities(_)
            | Packet::TabComplete(_)
            | Packet::ClientSettings(_)
            | Packet::PluginMessage(_) => {
                debug!(conn_id = %self.conn_id, ?packet, "ignored");
                Ok(Next::Continue)
            }

            // Server-to-client only; next_packet already refuses them.
            Packet::LoginInfo(_)
            | Packet::TimeUpdate(_)
            | Packet::EntityEquipment(_)
            | Packet::SpawnPosition(_)
            | Packet::HealthUpdate(_)
            | Packet::Respawn(_)
            | Packet::BedUse(_)
            | Packet::EntityNamedSpawn(_)
            | Packet::ItemCollect(_)
            | Packet::SpawnObjectVehicle(_)
            | Packet::SpawnMob(_)
            | Packet::SpawnPainting(_)
            | Packet::SpawnExperienceOrb(_)
            | Packet::EntityVelocity(_)
            | Packet::EntityDestroy(_)
            | Packet::Entity(_)
            | Packet::EntityRelMove(_)
            | Packet::EntityLook(_)
            | Packet::EntityLookRelMove(_)
            | Packet::EntityTeleport(_)
            | Packet::EntityHeadLook(_)
            | Packet::EntityStatus(_)
            | Packet::EntityAttach(_)
            | Packet::EntityMetadata(_)
            | Packet::EntityEffect(_)
            | Packet::EntityEffectRemove(_)
            | Packet::SetExperience(_)
            | Packet::ChunkData(_)
            | Packet::BlockChangeMulti(_)
            | Packet::BlockChange(_)
            | Packet::BlockAction(_)
            | Packet::BlockBreakAnimation(_)
            | Packet::MapChunkBulk(_)
            | Packet::Explosion(_)
            | Packet::SoundEffect(_)
            | Packet::NamedSoundEffect(_)
            | Packet::Particle(_)
            | Packet::GameState(_)
            | Packet::GlobalEntity(_)
            | Packet::WindowOpen(_)
            | Packet::SlotSet(_)
            | Packet::SetWindowItems(_)
            | Packet::WindowProperty(_)
            | Packet::ItemData(_)
            | Packet::TileEntityUpdate(_)
            | Packet::StatIncrement(_)
            | Packet::PlayerListItem(_)
            | Packet::ScoreObjective(_)
            | Packet::ScoreUpdate(_)
            | Packet::ScoreDisplay(_)
            | Packet::Teams(_)
            | Packet::EncryptionKeyRequest(_) => Err(ConnectionError::UnknownMessageId(id.into())),
        }
    }

    fn unexpected(&self, id: PacketId) -> ConnectionError {
        ConnectionError::UnexpectedMessage {
            id,
            state: self.state.name(),
        }
    }

    fn require_login(&self, id: PacketId) -> Result<(), ConnectionError> {
        if self.state.is_logged_in() {
            Ok(())
        } else {
            Err(self.unexpected(id))
        }
    }

    fn entity(&self) -> EntityId {
        self.session.id()
    }

    fn name(&self) -> &str {
        self.session.name().unwrap_or_default()
    }

    /// Sends `message` to every other ready player, but only once this
    /// player is ready themselves.
    async fn broadcast_about<M: Message>(&self, message: &M) -> Result<(), ConnectionError> {
        if self.state == State::Ready {
            self.server
                .sessions
                .broadcast_packet_except(message, self.entity())
                .await?;
        }
        Ok(())
    }

    // -- Login --------------------------------------------------------------

    async fn on_handshake(&mut self, m: Handshake) -> Result<Next, ConnectionError> {
        if self.state != State::Connected {
            return Err(self.unexpected(PacketId::Handshake));
        }
        if m.version != PROTOCOL_VERSION {
            return Err(ConnectionError::ProtocolVersionMismatch {
                expected: PROTOCOL_VERSION,
                got: m.version,
            });
        }
        if m.username.is_empty() || m.username.chars().count() > MAX_NAME_LEN {
            return Err(ConnectionError::Rejected("Invalid username".to_string()));
        }

        debug!(
            conn_id = %self.conn_id,
            name = m.username.as_str(),
            host = m.host.as_str(),
            port = m.port,
            "handshake"
        );
        self.session.set_name(m.username)?;
        self.state = State::HandshakeReceived;

        if self.server.config.online_mode {
            let keys = &self.server.keys;
            let verify_token = keys::verify_token();
            self.session
                .send(&EncryptionKeyRequest {
                    server_id: keys.server_id().to_string(),
                    public_key: keys.public_key_der().to_vec(),
                    verify_token: verify_token.to_vec(),
                })
                .await?;
            self.state = State::AwaitingEncryptionResponse { verify_token };
        }
        Ok(Next::Continue)
    }

    async fn on_encryption_response(
        &mut self,
        m: EncryptionKeyResponse,
    ) -> Result<Next, ConnectionError> {
        let State::AwaitingEncryptionResponse { verify_token } = self.state else {
            return Err(self.unexpected(PacketId::EncryptionKeyResponse));
        };
        let keys = &self.server.keys;

        let token = keys.decrypt(&m.verify_token).map_err(|e| {
            debug!(conn_id = %self.conn_id, error = %e, "verification token undecryptable");
            ConnectionError::HandshakeTokenMismatch
        })?;
        if token[..] != verify_token[..] {
            return Err(ConnectionError::HandshakeTokenMismatch);
        }

        let secret = keys.decrypt(&m.shared_secret).map_err(|e| {
            debug!(conn_id = %self.conn_id, error = %e, "shared secret undecryptable");
            ConnectionError::HandshakeTokenMismatch
        })?;
        if secret.len() != SHARED_SECRET_LEN {
            return Err(ConnectionError::MalformedMessage(ProtocolError::InvalidMessage(
                format!("shared secret is {} bytes", secret.len()),
            )));
        }

        let verified = self
            .server
            .verifier
            .verify(self.name(), keys.server_id(), &secret, keys.public_key_der())
            .await;
        match verified {
            Ok(true) => {}
            Ok(false) => return Err(ConnectionError::SessionVerificationFailed),
            Err(e) => {
                warn!(conn_id = %self.conn_id, name = self.name(), error = %e, "could not verify player");
                return Err(ConnectionError::SessionVerificationFailed);
            }
        }

        // The empty reply is the last plaintext message.
        self.session
            .send(&EncryptionKeyResponse {
                shared_secret: Vec::new(),
                verify_token: Vec::new(),
            })
            .await?;
        self.reader.enable_encryption(&secret)?;
        self.session.writer().enable_encryption(&secret).await?;
        self.state = State::Encrypted;
        debug!(conn_id = %self.conn_id, name = self.name(), "encryption enabled");
        Ok(Next::Continue)
    }

    async fn on_client_status(&mut self, m: ClientStatuses) -> Result<Next, ConnectionError> {
        match m.status {
            0 if self.state.may_log_in(self.server.config.online_mode) => {
                login::log_in(self.server, self.session).await?;
                self.state = State::LoggedIn;
            }
            0 | 1 if !self.state.is_logged_in() => {
                return Err(self.unexpected(PacketId::ClientStatuses));
            }
            0 | 1 => debug!(conn_id = %self.conn_id, status = m.status, "respawn request ignored"),
            other => {
                return Err(ConnectionError::Rejected(format!(
                    "Unknown client status {other}"
                )));
            }
        }
        Ok(Next::Continue)
    }

    async fn on_ping(&mut self, m: ServerListPing) -> Result<Next, ConnectionError> {
        if self.state != State::Connected {
            return Err(self.unexpected(PacketId::ServerListPing));
        }
        let reason = if m.magic == 1 {
            let config = &self.server.config;
            format!(
                "§1\0{}\0{}\0{}\0{}\0{}",
                PROTOCOL_VERSION,
                GAME_VERSION,
                config.motd,
                self.server.sessions.len(),
                config.max_players
            )
        } else {
            format!("Invalid 0xfe packet: magic {}", m.magic)
        };
        debug!(conn_id = %self.conn_id, magic = m.magic, "server list ping");
        self.session.send(&Disconnect { reason }).await?;
        Ok(Next::Close)
    }

    async fn on_disconnect(&mut self, m: Disconnect) -> Result<Next, ConnectionError> {
        info!(
            entity = %self.entity(),
            name = self.name(),
            reason = m.reason.as_str(),
            "client disconnected"
        );
        if self.state.is_logged_in() {
            let notice = ChatMessage {
                message: format!("{} disconnected.", self.name()),
            };
            self.server
                .sessions
                .broadcast_packet_except(&notice, self.entity())
                .await?;
        }
        Ok(Next::Close)
    }

    fn on_keep_alive(&mut self, m: KeepAlive) -> Result<Next, ConnectionError> {
        if self.session.acknowledge_keep_alive(m.id) {
            trace!(entity = %self.entity(), id = m.id, "keep-alive acknowledged");
        } else {
            trace!(entity = %self.entity(), id = m.id, "unsolicited keep-alive");
        }
        Ok(Next::Continue)
    }

    // -- Chat ---------------------------------------------------------------

    async fn on_chat(&mut self, m: ChatMessage) -> Result<Next, ConnectionError> {
        self.require_login(PacketId::ChatMessage)?;
        let text = m.message.trim();
        if text.is_empty() {
            return Ok(Next::Continue);
        }
        if text.starts_with('/') {
            if let Some(command) = Command::parse(text) {
                commands::execute(self.server, self.session, command).await?;
            }
            return Ok(Next::Continue);
        }

        info!(name = self.name(), text, "chat");
        let line = format!("<{}> {}", self.name(), text);
        self.server.sessions.broadcast_message(&line).await?;
        Ok(Next::Continue)
    }

    // -- Movement -----------------------------------------------------------

    async fn on_player(&mut self, m: Player) -> Result<Next, ConnectionError> {
        self.require_login(PacketId::Player)?;
        self.session.set_on_ground(m.on_ground);
        self.broadcast_about(&Entity {
            entity: self.entity(),
        })
        .await?;
        Ok(Next::Continue)
    }

    async fn on_player_pos(&mut self, m: PlayerPos) -> Result<Next, ConnectionError> {
        self.require_login(PacketId::PlayerPos)?;
        self.session
            .set_position(m.x, m.y, m.stance, m.z, m.on_ground);
        self.broadcast_about(&teleport(self.entity(), &self.session.placement()))
            .await?;
        Ok(Next::Continue)
    }

    async fn on_player_look(&mut self, m: PlayerLook) -> Result<Next, ConnectionError> {
        self.require_login(PacketId::PlayerLook)?;
        self.session.set_look(m.yaw, m.pitch, m.on_ground);
        self.broadcast_about(&EntityLook {
            entity: self.entity(),
            yaw: Angle::from_degrees(m.yaw),
            pitch: Angle::from_degrees(m.pitch),
        })
        .await?;
        Ok(Next::Continue)
    }

    async fn on_player_pos_look(&mut self, m: PlayerPosLook) -> Result<Next, ConnectionError> {
        self.require_login(PacketId::PlayerPosLook)?;
        if m.y > m.stance {
            return Err(ConnectionError::Rejected("Illegal stance".to_string()));
        }

        let placement = Placement {
            x: m.x,
            y: m.y,
            z: m.z,
            stance: m.stance,
            yaw: m.yaw,
            pitch: m.pitch,
            on_ground: m.on_ground,
        };
        self.session.set_placement(placement);
        if self.session.mark_ready() {
            self.state = State::Ready;
            info!(entity = %self.entity(), name = self.name(), "player ready");
        }

        self.broadcast_about(&teleport(self.entity(), &placement))
            .await?;
        self.broadcast_about(&EntityHeadLook {
            entity: self.entity(),
            head_yaw: Angle::from_degrees(m.yaw),
        })
        .await?;
        Ok(Next::Continue)
    }

    // -- World --------------------------------------------------------------

    async fn on_block_place(&mut self, m: PlayerBlockPlace) -> Result<Next, ConnectionError> {
        self.require_login(PacketId::PlayerBlockPlace)?;
        // Direction -1 means "use the held item", not a placement.
        let Some((x, y, z)) = placement_target(m.x, m.y, m.z, m.direction) else {
            debug!(entity = %self.entity(), "use item");
            return Ok(Next::Continue);
        };
        let (block, metadata) = match &m.held_item {
            None => (STONE, 0),
            Some(item) if (0..256).contains(&item.item_id) => (item.item_id, item.damage as i8),
            Some(item) => {
                debug!(entity = %self.entity(), item = item.item_id, "not a block");
                return Ok(Next::Continue);
            }
        };

        self.server
            .sessions
            .broadcast_packet(&BlockChange {
                x,
                y,
                z,
                block,
                metadata,
            })
            .await?;
        Ok(Next::Continue)
    }
}

/// Reads one id byte and the body it introduces.
async fn read_packet(reader: &mut PacketReader) -> Result<Option<Packet>, ConnectionError> {
    let byte = match reader.read_u8().await {
        Ok(byte) => byte,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(ConnectionError::Transport(TransportError::ReceiveFailed(e))),
    };
    let id = match PacketId::try_from(byte) {
        Ok(id) if id.accepts(Direction::Serverbound) => id,
        _ => return Err(ConnectionError::UnknownMessageId(byte)),
    };
    Packet::decode_body(id, reader, Direction::Serverbound)
        .await
        .map(Some)
        .map_err(ConnectionError::MalformedMessage)
}

/// The block next to `(x, y, z)` on the clicked `face`, or `None` for the
/// "use item" form and for targets past the edge of the world.
fn placement_target(x: i32, y: u8, z: i32, face: i8) -> Option<(i32, u8, i32)> {
    let (dx, dy, dz) = match face {
        0 => (0, -1, 0),
        1 => (0, 1, 0),
        2 => (0, 0, -1),
        3 => (0, 0, 1),
        4 => (-1, 0, 0),
        5 => (1, 0, 0),
        _ => return None,
    };
    let y = u8::try_from(i32::from(y) + dy).ok()?;
    Some((x.checked_add(dx)?, y, z.checked_add(dz)?))
}

fn teleport(entity: EntityId, p: &Placement) -> EntityTeleport {
    EntityTeleport {
        entity,
        x: AbsolutePos::from_blocks(p.x),
        y: AbsolutePos::from_blocks(p.y),
        z: AbsolutePos::from_blocks(p.z),
        yaw: Angle::from_degrees(p.yaw),
        pitch: Angle::from_degrees(p.pitch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_target_offsets_by_face() {
        assert_eq!(placement_target(5, 64, 5, 0), Some((5, 63, 5)));
        assert_eq!(placement_target(5, 64, 5, 1), Some((5, 65, 5)));
        assert_eq!(placement_target(5, 64, 5, 2), Some((5, 64, 4)));
        assert_eq!(placement_target(5, 64, 5, 5), Some((6, 64, 5)));
    }

    #[test]
    fn test_placement_target_use_item_and_out_of_world() {
        assert_eq!(placement_target(-1, 255, -1, -1), None);
        assert_eq!(placement_target(0, 0, 0, 0), None);
        assert_eq!(placement_target(0, 255, 0, 1), None);
    }

    #[test]
    fn test_placement_target_world_edge_returns_none() {
        assert_eq!(placement_target(i32::MAX, 64, 0, 5), None);
        assert_eq!(placement_target(i32::MIN, 64, 0, 4), None);
        assert_eq!(placement_target(0, 64, i32::MAX, 3), None);
        assert_eq!(placement_target(0, 64, i32::MIN, 2), None);
        assert_eq!(placement_target(i32::MAX, 64, 0, 4), Some((i32::MAX - 1, 64, 0)));
    }

    #[test]
    fn test_state_login_gate_depends_on_mode() {
        assert!(State::HandshakeReceived.may_log_in(false));
        assert!(!State::HandshakeReceived.may_log_in(true));
        assert!(State::Encrypted.may_log_in(true));
        assert!(!State::Connected.may_log_in(false));
        assert!(!State::Ready.may_log_in(false));
    }

    #[test]
    fn test_teleport_uses_fixed_point() {
        let p = Placement {
            yaw: 90.0,
            ..Placement::standing_at(1.5, 64.0, -2.0)
        };
        let t = teleport(EntityId(3), &p);
        assert_eq!(t.x, AbsolutePos(48));
        assert_eq!(t.y, AbsolutePos(2048));
        assert_eq!(t.z, AbsolutePos(-64));
        assert_eq!(t.yaw, Angle(64));
    }
}
