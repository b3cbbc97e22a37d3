//! The world clock and the flat spawn terrain.

use std::io::{self, Write};
use std::sync::Arc;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use mineral_protocol::{ChunkData, TimeUpdate};
use mineral_session::SessionRegistry;
use mineral_tick::{BoxFuture, Ticker};
use tracing::{debug, trace};

/// Ticks in one in-game day.
pub const DAY_LENGTH: u64 = 24_000;

/// The server's own ticker: tells every ready player what time it is.
pub struct WorldClock {
    sessions: Arc<SessionRegistry>,
}

impl WorldClock {
    pub fn new(sessions: Arc<SessionRegistry>) -> Self {
        Self { sessions }
    }

    /// The TimeUpdate for `tick`: world age is the tick itself, time of
    /// day wraps every [`DAY_LENGTH`] ticks.
    pub fn time_update(tick: u64) -> TimeUpdate {
        TimeUpdate {
            world_age: tick as i64,
            time: (tick % DAY_LENGTH) as i64,
        }
    }
}

impl Ticker for WorldClock {
    fn tick(&self, tick: u64) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            match self.sessions.broadcast_packet(&Self::time_update(tick)).await {
                Ok(n) => trace!(tick, delivered = n, "time update"),
                Err(e) => debug!(tick, error = %e, "time update failed"),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Flat terrain
// ---------------------------------------------------------------------------

/// One chunk column of solid stone, 64 blocks high, under open sky.
///
/// Every spawn column is identical, so the compressed body is built once
/// and only the coordinates change per column.
#[derive(Debug, Clone)]
pub(crate) struct FlatColumn {
    compressed: Arc<Vec<u8>>,
}

impl FlatColumn {
    const HEIGHT: usize = 64;
    const SECTIONS: usize = Self::HEIGHT / 16;
    const BLOCKS_PER_SECTION: usize = 16 * 16 * 16;
    const NIBBLES_PER_SECTION: usize = Self::BLOCKS_PER_SECTION / 2;
    const STONE: u8 = 1;
    const PLAINS: u8 = 1;
    /// Two nibbles of sky light level 12.
    const SKY_LIGHT: u8 = 0xCC;

    pub(crate) fn build() -> io::Result<Self> {
        let n = Self::SECTIONS;
        let mut raw = Vec::with_capacity(n * (Self::BLOCKS_PER_SECTION + 3 * Self::NIBBLES_PER_SECTION) + 256);
        // Block ids, then metadata, block light, and sky light, section by
        // section in YZX order, then one biome byte per column.
        raw.resize(n * Self::BLOCKS_PER_SECTION, Self::STONE);
        raw.resize(raw.len() + 2 * n * Self::NIBBLES_PER_SECTION, 0);
        raw.resize(raw.len() + n * Self::NIBBLES_PER_SECTION, Self::SKY_LIGHT);
        raw.resize(raw.len() + 256, Self::PLAINS);

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        let compressed = encoder.finish()?;
        debug!(raw = raw.len(), compressed = compressed.len(), "flat column built");
        Ok(Self {
            compressed: Arc::new(compressed),
        })
    }

    /// Bitmap of the non-empty 16-block sections.
    pub(crate) const fn primary_bitmap() -> u16 {
        (1u16 << Self::SECTIONS) - 1
    }

    pub(crate) fn at(&self, x: i32, z: i32) -> ChunkData {
        ChunkData {
            x,
            z,
            ground_up: true,
            primary_bitmap: Self::primary_bitmap(),
            add_bitmap: 0,
            data: self.compressed.as_ref().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::ZlibDecoder;

    use super::*;

    #[test]
    fn test_time_update_wraps_time_of_day() {
        let t = WorldClock::time_update(24_005);
        assert_eq!(t.world_age, 24_005);
        assert_eq!(t.time, 5);
    }

    #[test]
    fn test_flat_column_layout() {
        let column = FlatColumn::build().unwrap();
        let chunk = column.at(-1, 2);
        assert_eq!((chunk.x, chunk.z), (-1, 2));
        assert_eq!(chunk.primary_bitmap, 0b1111);
        assert!(chunk.ground_up);

        let mut raw = Vec::new();
        ZlibDecoder::new(&chunk.data[..])
            .read_to_end(&mut raw)
            .unwrap();
        assert_eq!(raw.len(), 4 * 4096 + 3 * 4 * 2048 + 256);
        assert!(raw[..4 * 4096].iter().all(|&b| b == 1));
        assert!(raw[4 * 4096..4 * 4096 + 2 * 4 * 2048].iter().all(|&b| b == 0));
        assert_eq!(raw[raw.len() - 257], 0xCC);
        assert_eq!(raw[raw.len() - 1], 1);
    }
}
