//! The login sequence, run once a client reports it is ready to spawn.

use std::sync::Arc;

use mineral_protocol::{LoginInfo, PlayerPosLook, SpawnPosition};
use mineral_session::{Placement, Session, SessionVerifier};
use mineral_tick::Ticker;
use tracing::info;

use crate::ConnectionError;
use crate::server::ServerState;

/// Where every player appears, in block units.
pub(crate) const SPAWN: (f64, f64, f64) = (8.0, 65.0, 8.0);

/// Radius, in chunk columns, of the terrain sent around spawn.
const VIEW_RADIUS: i32 = 1;

/// Registers `session` and sends it the world.
///
/// Order matters to the client: LoginInfo first, then terrain, then the
/// spawn point and the player's own position. Other players learn about
/// the newcomer, and the newcomer about them, last.
///
/// # Errors
/// [`ConnectionError::Rejected`] when the server is full or the name is
/// taken; a transport error if the client goes away mid-sequence.
pub(crate) async fn log_in<V: SessionVerifier>(
    server: &ServerState<V>,
    session: &Arc<Session>,
) -> Result<(), ConnectionError> {
    let config = &server.config;
    server
        .sessions
        .add_limited(Arc::clone(session), config.max_players)?;
    let ticker: Arc<dyn Ticker> = session.clone();
    server.tickers.add(session.id(), ticker);

    let (x, y, z) = SPAWN;
    session.set_placement(Placement::standing_at(x, y, z));

    session
        .send(&LoginInfo {
            entity: session.id(),
            level_type: config.level_type.clone(),
            game_mode: config.game_mode,
            dimension: 0,
            difficulty: config.difficulty,
            max_players: i8::try_from(config.max_players).unwrap_or(i8::MAX),
        })
        .await?;

    for cz in -VIEW_RADIUS..=VIEW_RADIUS {
        for cx in -VIEW_RADIUS..=VIEW_RADIUS {
            session.send(&server.spawn_column.at(cx, cz)).await?;
        }
    }

    session
        .send(&SpawnPosition {
            x: x as i32,
            y: y as i32,
            z: z as i32,
        })
        .await?;

    let p = session.placement();
    session
        .send(&PlayerPosLook {
            x: p.x,
            y: p.y,
            stance: p.stance,
            z: p.z,
            yaw: p.yaw,
            pitch: p.pitch,
            on_ground: true,
        })
        .await?;

    if let Some(spawn) = session.spawn_message() {
        server
            .sessions
            .broadcast_packet_except(&spawn, session.id())
            .await?;
    }
    server.sessions.announce_new_arrival(session).await?;

    info!(
        entity = %session.id(),
        name = session.name().unwrap_or_default(),
        online = server.sessions.len(),
        "player logged in"
    );
    Ok(())
}
