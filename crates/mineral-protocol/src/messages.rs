//! Message definitions.
//!
//! Most messages are a flat list of fields and are declared through the
//! [`message!`] macro, which generates the struct, its [`Field`] impl,
//! and its [`Message`] impl. A field may name an alternate layout with
//! `=> Codec`, e.g. `data: Vec<u8> => Bytes16`.
//!
//! The handful of messages with conditional or cross-field layouts are
//! written out by hand at the bottom of the file.

use std::future::Future;

use bytes::BytesMut;
use tokio::io::AsyncRead;

use crate::ProtocolError;
use crate::metadata::Metadata;
use crate::packet::{Message, PacketId};
use crate::slot::ItemStack;
use crate::types::{AbsolutePos, Angle, Axis, Direction, EntityId, ObjectData};
use crate::wire::{Bytes16, Bytes32, Field, LengthPrefix, List8, List16, List32};

// ---------------------------------------------------------------------------
// Declaration macros
// ---------------------------------------------------------------------------

macro_rules! read_field {
    ($r:ident, $ty:ty) => {
        <$ty as Field>::read($r).await?
    };
    ($r:ident, $ty:ty, $codec:ty) => {
        <$codec as $crate::wire::FieldCodec<$ty>>::read($r).await?
    };
}

macro_rules! write_field {
    ($buf:ident, $value:expr, $ty:ty) => {
        <$ty as Field>::write($value, $buf)?
    };
    ($buf:ident, $value:expr, $ty:ty, $codec:ty) => {
        <$codec as $crate::wire::FieldCodec<$ty>>::write($value, $buf)?
    };
}

/// Declares plain structs whose wire form is their fields in order.
macro_rules! composite {
    ($(
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$fmeta:meta])* $field:ident : $ty:ty $(=> $codec:ty)? ),* $(,)?
        }
    )*) => {$(
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $ty, )*
        }

        impl Field for $name {
            async fn read<R>(r: &mut R) -> Result<Self, ProtocolError>
            where
                R: AsyncRead + Unpin + Send,
            {
                $( let $field = read_field!(r, $ty $(, $codec)?); )*
                Ok(Self { $( $field, )* })
            }

            fn write(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
                $( write_field!(buf, &self.$field, $ty $(, $codec)?); )*
                Ok(())
            }
        }
    )*};
}

/// Declares messages with direction-independent layouts.
macro_rules! message {
    ($(
        $(#[$meta:meta])*
        $name:ident { $($body:tt)* }
    )*) => {$(
        composite! {
            $(#[$meta])*
            $name { $($body)* }
        }

        impl Message for $name {
            const ID: PacketId = PacketId::$name;

            fn read_body<R>(
                r: &mut R,
                _dir: Direction,
            ) -> impl Future<Output = Result<Self, ProtocolError>> + Send
            where
                R: AsyncRead + Unpin + Send,
            {
                <Self as Field>::read(r)
            }

            fn write_body(&self, buf: &mut BytesMut, _dir: Direction) -> Result<(), ProtocolError> {
                <Self as Field>::write(self, buf)
            }
        }
    )*};
}

// ---------------------------------------------------------------------------
// Connection and login
// ---------------------------------------------------------------------------

message! {
    /// Liveness probe. The client echoes the id back.
    KeepAlive {
        id: i32,
    }

    /// First message from a client: protocol version and claimed name.
    Handshake {
        version: i8,
        username: String,
        host: String,
        port: i32,
    }

    /// Chat line, either direction.
    ChatMessage {
        message: String,
    }

    /// World age and time of day, in ticks.
    TimeUpdate {
        world_age: i64,
        time: i64,
    }

    /// Server's half of the encryption handshake.
    EncryptionKeyRequest {
        server_id: String,
        /// DER-encoded (PKIX) RSA public key.
        public_key: Vec<u8> => Bytes16,
        verify_token: Vec<u8> => Bytes16,
    }

    /// Client's half of the encryption handshake, both fields RSA
    /// encrypted. The server answers with an empty one.
    EncryptionKeyResponse {
        shared_secret: Vec<u8> => Bytes16,
        verify_token: Vec<u8> => Bytes16,
    }

    /// Server list ping; `magic` is 1 for 1.4+ clients.
    ServerListPing {
        magic: i8,
    }

    /// Closes the connection with a reason, either direction.
    Disconnect {
        reason: String,
    }

    /// 0 = initial spawn, 1 = respawn after death.
    ClientStatuses {
        status: i8,
    }

    ClientSettings {
        locale: String,
        view_distance: i8,
        chat_flags: i8,
        difficulty: i8,
        show_cape: bool,
    }

    PluginMessage {
        channel: String,
        data: Vec<u8> => Bytes16,
    }

    TabComplete {
        text: String,
    }
}

// ---------------------------------------------------------------------------
// Player state
// ---------------------------------------------------------------------------

message! {
    SpawnPosition {
        x: i32,
        y: i32,
        z: i32,
    }

    HealthUpdate {
        health: i16,
        food: i16,
        saturation: f32,
    }

    Respawn {
        dimension: i32,
        difficulty: i8,
        game_mode: i8,
        world_height: i16,
        level_type: String,
    }

    /// On-ground flag only; sent when the player neither moves nor turns.
    Player {
        on_ground: bool,
    }

    /// Client position update. Serverbound only, so the field order is
    /// fixed.
    PlayerPos {
        x: f64,
        y: f64,
        stance: f64,
        z: f64,
        on_ground: bool,
    }

    PlayerLook {
        yaw: f32,
        pitch: f32,
        on_ground: bool,
    }

    /// Digging: status 0 started, 2 finished, 4 drop item, ...
    PlayerAction {
        status: i8,
        x: i32,
        y: i8,
        z: i32,
        face: i8,
    }

    PlayerBlockPlace {
        x: i32,
        y: u8,
        z: i32,
        direction: i8,
        held_item: Option<ItemStack>,
        cursor_x: i8,
        cursor_y: i8,
        cursor_z: i8,
    }

    ItemHeldChange {
        slot: i16,
    }

    BedUse {
        entity: EntityId,
        /// Always zero in practice; meaning unknown.
        unknown: i8,
        x: i32,
        y: i8,
        z: i32,
    }

    Animation {
        entity: EntityId,
        animation: i8,
    }

    /// Crouch, leave bed, sprint.
    EntityAction {
        entity: EntityId,
        action: i8,
    }

    EntityInteract {
        user: EntityId,
        target: EntityId,
        left_click: bool,
    }

    SetExperience {
        bar: f32,
        level: i16,
        total: i16,
    }

    StatIncrement {
        stat: i32,
        amount: i8,
    }

    PlayerListItem {
        name: String,
        online: bool,
        ping: i16,
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

message! {
    EntityEquipment {
        entity: EntityId,
        slot: i16,
        item: Option<ItemStack>,
    }

    /// Spawns another player for this client.
    EntityNamedSpawn {
        entity: EntityId,
        name: String,
        x: AbsolutePos,
        y: AbsolutePos,
        z: AbsolutePos,
        yaw: Angle,
        pitch: Angle,
        current_item: i16,
        metadata: Metadata,
    }

    ItemCollect {
        collected: EntityId,
        collector: EntityId,
    }

    SpawnObjectVehicle {
        entity: EntityId,
        kind: i8,
        x: AbsolutePos,
        y: AbsolutePos,
        z: AbsolutePos,
        pitch: Angle,
        yaw: Angle,
        data: ObjectData,
    }

    SpawnMob {
        entity: EntityId,
        kind: i8,
        x: AbsolutePos,
        y: AbsolutePos,
        z: AbsolutePos,
        pitch: Angle,
        head_pitch: Angle,
        yaw: Angle,
        velocity_x: i16,
        velocity_y: i16,
        velocity_z: i16,
        metadata: Metadata,
    }

    SpawnPainting {
        entity: EntityId,
        title: String,
        x: i32,
        y: i32,
        z: i32,
        direction: i32,
    }

    SpawnExperienceOrb {
        entity: EntityId,
        x: AbsolutePos,
        y: AbsolutePos,
        z: AbsolutePos,
        count: i16,
    }

    EntityVelocity {
        entity: EntityId,
        velocity_x: i16,
        velocity_y: i16,
        velocity_z: i16,
    }

    EntityDestroy {
        entities: Vec<EntityId> => List8,
    }

    /// Keeps an entity alive on the client without moving it.
    Entity {
        entity: EntityId,
    }

    EntityRelMove {
        entity: EntityId,
        dx: i8,
        dy: i8,
        dz: i8,
    }

    EntityLook {
        entity: EntityId,
        yaw: Angle,
        pitch: Angle,
    }

    EntityLookRelMove {
        entity: EntityId,
        dx: i8,
        dy: i8,
        dz: i8,
        yaw: Angle,
        pitch: Angle,
    }

    EntityTeleport {
        entity: EntityId,
        x: AbsolutePos,
        y: AbsolutePos,
        z: AbsolutePos,
        yaw: Angle,
        pitch: Angle,
    }

    EntityHeadLook {
        entity: EntityId,
        head_yaw: Angle,
    }

    EntityStatus {
        entity: EntityId,
        status: i8,
    }

    EntityAttach {
        entity: EntityId,
        vehicle: EntityId,
    }

    EntityMetadata {
        entity: EntityId,
        metadata: Metadata,
    }

    EntityEffect {
        entity: EntityId,
        effect: i8,
        amplifier: i8,
        duration: i16,
    }

    EntityEffectRemove {
        entity: EntityId,
        effect: i8,
    }

    /// Lightning bolts.
    GlobalEntity {
        entity: EntityId,
        kind: i8,
        x: AbsolutePos,
        y: AbsolutePos,
        z: AbsolutePos,
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

message! {
    /// One chunk column. `data` is zlib-compressed.
    ChunkData {
        x: i32,
        z: i32,
        ground_up: bool,
        primary_bitmap: u16,
        add_bitmap: u16,
        data: Vec<u8> => Bytes32,
    }

    BlockChange {
        x: i32,
        y: u8,
        z: i32,
        block: i16,
        metadata: i8,
    }

    BlockAction {
        x: i32,
        y: i16,
        z: i32,
        byte1: i8,
        byte2: i8,
        block: i16,
    }

    BlockBreakAnimation {
        entity: EntityId,
        x: i32,
        y: i32,
        z: i32,
        stage: i8,
    }

    Explosion {
        x: f64,
        y: f64,
        z: f64,
        radius: f32,
        /// Destroyed block offsets relative to the centre.
        records: Vec<[i8; 3]> => List32,
        motion_x: f32,
        motion_y: f32,
        motion_z: f32,
    }

    SoundEffect {
        effect: i32,
        x: i32,
        y: i8,
        z: i32,
        data: i32,
        disable_relative_volume: bool,
    }

    NamedSoundEffect {
        name: String,
        x: i32,
        y: i32,
        z: i32,
        volume: f32,
        pitch: i8,
    }

    Particle {
        name: String,
        x: f32,
        y: f32,
        z: f32,
        offset_x: f32,
        offset_y: f32,
        offset_z: f32,
        speed: f32,
        count: i32,
    }

    /// Bed messages, rain, game mode changes.
    GameState {
        reason: i8,
        game_mode: i8,
    }

    SignUpdate {
        x: i32,
        y: i16,
        z: i32,
        lines: [String; 4],
    }

    /// Map contents.
    ItemData {
        kind: i16,
        item: i16,
        data: Vec<u8> => Bytes16,
    }

    TileEntityUpdate {
        x: i32,
        y: i16,
        z: i32,
        action: i8,
        data: Vec<u8> => Bytes16,
    }
}

// ---------------------------------------------------------------------------
// Windows and inventory
// ---------------------------------------------------------------------------

message! {
    WindowOpen {
        window: i8,
        kind: i8,
        title: String,
        slots: i8,
        use_title: bool,
    }

    WindowClose {
        window: i8,
    }

    WindowClick {
        window: i8,
        slot: i16,
        button: i8,
        action: i16,
        mode: i8,
        item: Option<ItemStack>,
    }

    SlotSet {
        window: i8,
        slot: i16,
        item: Option<ItemStack>,
    }

    SetWindowItems {
        window: i8,
        items: Vec<Option<ItemStack>> => List16,
    }

    WindowProperty {
        window: i8,
        property: i16,
        value: i16,
    }

    ConfirmTransaction {
        window: i8,
        action: i16,
        accepted: bool,
    }

    CreativeInventoryAction {
        slot: i16,
        item: Option<ItemStack>,
    }

    EnchantItem {
        window: i8,
        enchantment: i8,
    }
}

// ---------------------------------------------------------------------------
// Scoreboard
// ---------------------------------------------------------------------------

message! {
    ScoreObjective {
        name: String,
        value: String,
        /// 0 create, 1 remove, 2 update.
        action: i8,
    }

    /// All four fields are always present, even when removing.
    ScoreUpdate {
        item: String,
        action: i8,
        score_name: String,
        value: i32,
    }

    ScoreDisplay {
        position: i8,
        score_name: String,
    }

    Teams {
        name: String,
        mode: i8,
        display_name: String,
        prefix: String,
        suffix: String,
        friendly_fire: i8,
        players: Vec<String> => List16,
    }
}

// ---------------------------------------------------------------------------
// Hand-written layouts
// ---------------------------------------------------------------------------

/// Sent once after a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginInfo {
    pub entity: EntityId,
    pub level_type: String,
    pub game_mode: i8,
    pub dimension: i8,
    pub difficulty: i8,
    pub max_players: i8,
}

impl LoginInfo {
    /// Value of the unused byte between `difficulty` and `max_players`.
    pub const RESERVED: i8 = 0;
}

impl Message for LoginInfo {
    const ID: PacketId = PacketId::LoginInfo;

    async fn read_body<R>(r: &mut R, _dir: Direction) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let entity = EntityId::read(r).await?;
        let level_type = String::read(r).await?;
        let game_mode = i8::read(r).await?;
        let dimension = i8::read(r).await?;
        let difficulty = i8::read(r).await?;
        let _reserved = i8::read(r).await?;
        let max_players = i8::read(r).await?;
        Ok(Self {
            entity,
            level_type,
            game_mode,
            dimension,
            difficulty,
            max_players,
        })
    }

    fn write_body(&self, buf: &mut BytesMut, _dir: Direction) -> Result<(), ProtocolError> {
        self.entity.write(buf)?;
        self.level_type.write(buf)?;
        self.game_mode.write(buf)?;
        self.dimension.write(buf)?;
        self.difficulty.write(buf)?;
        Self::RESERVED.write(buf)?;
        self.max_players.write(buf)
    }
}

/// Position and look together.
///
/// The four `f64`s are ordered differently depending on direction; see
/// [`Direction::position_order`]. Field names always mean the same
/// thing: `y` is the feet, `stance` the eyes-ish bounding box top.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayerPosLook {
    pub x: f64,
    pub y: f64,
    pub stance: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub on_ground: bool,
}

impl PlayerPosLook {
    fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Stance => self.stance,
            Axis::Z => self.z,
        }
    }

    fn axis_mut(&mut self, axis: Axis) -> &mut f64 {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Stance => &mut self.stance,
            Axis::Z => &mut self.z,
        }
    }
}

impl Message for PlayerPosLook {
    const ID: PacketId = PacketId::PlayerPosLook;

    async fn read_body<R>(r: &mut R, dir: Direction) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut out = Self::default();
        for axis in dir.position_order() {
            *out.axis_mut(axis) = f64::read(r).await?;
        }
        out.yaw = f32::read(r).await?;
        out.pitch = f32::read(r).await?;
        out.on_ground = bool::read(r).await?;
        Ok(out)
    }

    fn write_body(&self, buf: &mut BytesMut, dir: Direction) -> Result<(), ProtocolError> {
        for axis in dir.position_order() {
            self.axis(axis).write(buf)?;
        }
        self.yaw.write(buf)?;
        self.pitch.write(buf)?;
        self.on_ground.write(buf)
    }
}

/// Player abilities. The four booleans share one flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerAbilities {
    pub god_mode: bool,
    pub can_fly: bool,
    pub flying: bool,
    pub creative: bool,
    pub fly_speed: i8,
    pub walk_speed: i8,
}

impl PlayerAbilities {
    pub const GOD_MODE: i8 = 0x08;
    pub const CAN_FLY: i8 = 0x04;
    pub const FLYING: i8 = 0x02;
    pub const CREATIVE: i8 = 0x01;

    /// Packs the booleans into the flag byte.
    pub fn flags(&self) -> i8 {
        [
            (self.god_mode, Self::GOD_MODE),
            (self.can_fly, Self::CAN_FLY),
            (self.flying, Self::FLYING),
            (self.creative, Self::CREATIVE),
        ]
        .into_iter()
        .filter(|(set, _)| *set)
        .fold(0, |acc, (_, bit)| acc | bit)
    }
}

impl Message for PlayerAbilities {
    const ID: PacketId = PacketId::PlayerAbilities;

    async fn read_body<R>(r: &mut R, _dir: Direction) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let flags = i8::read(r).await?;
        Ok(Self {
            god_mode: flags & Self::GOD_MODE != 0,
            can_fly: flags & Self::CAN_FLY != 0,
            flying: flags & Self::FLYING != 0,
            creative: flags & Self::CREATIVE != 0,
            fly_speed: i8::read(r).await?,
            walk_speed: i8::read(r).await?,
        })
    }

    fn write_body(&self, buf: &mut BytesMut, _dir: Direction) -> Result<(), ProtocolError> {
        self.flags().write(buf)?;
        self.fly_speed.write(buf)?;
        self.walk_speed.write(buf)
    }
}

/// Several block changes inside one chunk column.
///
/// The header carries both the record count (`i16`) and the payload
/// size in bytes (`i32`, always `4 * count`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockChangeMulti {
    pub chunk_x: i32,
    pub chunk_z: i32,
    pub records: Vec<i32>,
}

impl BlockChangeMulti {
    /// Packs one record: chunk-relative x/z (4 bits), y (8 bits), block
    /// id (12 bits), metadata (4 bits).
    pub fn record(x: u8, y: u8, z: u8, block: u16, metadata: u8) -> i32 {
        let packed = (u32::from(x & 0x0F) << 28)
            | (u32::from(z & 0x0F) << 24)
            | (u32::from(y) << 16)
            | (u32::from(block & 0x0FFF) << 4)
            | u32::from(metadata & 0x0F);
        packed as i32
    }
}

impl Message for BlockChangeMulti {
    const ID: PacketId = PacketId::BlockChangeMulti;

    async fn read_body<R>(r: &mut R, _dir: Direction) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let chunk_x = i32::read(r).await?;
        let chunk_z = i32::read(r).await?;
        let count = i16::read(r).await?.to_len()?;
        let size = i32::read(r).await?.to_len()?;
        if size != count * 4 {
            return Err(ProtocolError::InvalidMessage(format!(
                "block change payload is {size} bytes for {count} records"
            )));
        }
        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            records.push(i32::read(r).await?);
        }
        Ok(Self {
            chunk_x,
            chunk_z,
            records,
        })
    }

    fn write_body(&self, buf: &mut BytesMut, _dir: Direction) -> Result<(), ProtocolError> {
        self.chunk_x.write(buf)?;
        self.chunk_z.write(buf)?;
        i16::from_len(self.records.len())?.write(buf)?;
        i32::from_len(self.records.len() * 4)?.write(buf)?;
        self.records.iter().try_for_each(|record| record.write(buf))
    }
}

composite! {
    /// Per-column header inside [`MapChunkBulk`].
    ChunkMeta {
        x: i32,
        z: i32,
        primary_bitmap: u16,
        add_bitmap: u16,
    }
}

/// Several chunk columns sharing one compressed payload.
///
/// The column count comes first but the column headers come last,
/// after the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct MapChunkBulk {
    pub sky_light: bool,
    /// zlib-compressed data of every column, concatenated.
    pub data: Vec<u8>,
    pub chunks: Vec<ChunkMeta>,
}

impl Message for MapChunkBulk {
    const ID: PacketId = PacketId::MapChunkBulk;

    async fn read_body<R>(r: &mut R, _dir: Direction) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let count = i16::read(r).await?.to_len()?;
        let size = i32::read(r).await?.to_len()?;
        let sky_light = bool::read(r).await?;
        let mut data = vec![0u8; size];
        tokio::io::AsyncReadExt::read_exact(r, &mut data).await?;
        let mut chunks = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            chunks.push(ChunkMeta::read(r).await?);
        }
        Ok(Self {
            sky_light,
            data,
            chunks,
        })
    }

    fn write_body(&self, buf: &mut BytesMut, _dir: Direction) -> Result<(), ProtocolError> {
        i16::from_len(self.chunks.len())?.write(buf)?;
        i32::from_len(self.data.len())?.write(buf)?;
        self.sky_light.write(buf)?;
        buf.extend_from_slice(&self.data);
        self.chunks.iter().try_for_each(|chunk| chunk.write(buf))
    }
}
