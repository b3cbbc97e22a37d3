//! The session registry: every logged-in player, keyed by name.
//!
//! Broadcasts take a snapshot of the ready sessions under the read lock,
//! drop the lock, and only then write. A slow or dead connection can delay
//! its own delivery but never blocks registration or removal.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use mineral_protocol::{ChatMessage, Direction, EntityId, Message};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::{Session, SessionError};

/// All registered sessions.
///
/// Names are unique; at most one session per name is registered at a time.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a named session.
    ///
    /// # Errors
    /// - [`SessionError::Unnamed`] if the handshake has not set a name.
    /// - [`SessionError::NameTaken`] if another session uses the name.
    pub fn add(&self, session: Arc<Session>) -> Result<(), SessionError> {
        self.add_limited(session, usize::MAX)
    }

    /// Registers a named session unless `max` sessions are already present.
    /// The capacity check and the insert happen under one lock.
    ///
    /// # Errors
    /// As [`add`](Self::add), plus [`SessionError::Full`].
    pub fn add_limited(&self, session: Arc<Session>, max: usize) -> Result<(), SessionError> {
        let name = session
            .name()
            .ok_or(SessionError::Unnamed(session.id()))?
            .to_string();

        let mut sessions = self.sessions.write();
        if sessions.contains_key(&name) {
            return Err(SessionError::NameTaken(name));
        }
        if sessions.len() >= max {
            return Err(SessionError::Full(max));
        }
        info!(entity = %session.id(), %name, "session registered");
        sessions.insert(name, session);
        Ok(())
    }

    /// Removes the session registered under `name`, if it is `session`.
    ///
    /// Removing something that is not present is not an error, and a
    /// session never removes a different session that happens to hold
    /// its name. Returns `true` if an entry was removed.
    pub fn remove(&self, session: &Session) -> bool {
        let Some(name) = session.name() else {
            return false;
        };
        let mut sessions = self.sessions.write();
        match sessions.get(name) {
            Some(found) if found.id() == session.id() => {
                sessions.remove(name);
                info!(entity = %session.id(), %name, "session removed");
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sessions.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sessions.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Every registered session, ready or not.
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    /// Sessions that have reported their first position.
    pub fn ready_snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions
            .read()
            .values()
            .filter(|s| s.is_ready())
            .cloned()
            .collect()
    }

    // -- Broadcasts ---------------------------------------------------------

    /// Sends a chat line to every ready session. Returns how many
    /// deliveries succeeded.
    pub async fn broadcast_message(&self, text: &str) -> Result<usize, SessionError> {
        self.broadcast_packet(&ChatMessage {
            message: text.to_string(),
        })
        .await
    }

    /// Sends `message` to every ready session.
    pub async fn broadcast_packet<M: Message>(&self, message: &M) -> Result<usize, SessionError> {
        let bytes = message.encode(Direction::Clientbound)?;
        Ok(deliver(self.ready_snapshot(), &bytes).await)
    }

    /// Sends `message` to every ready session except `except`.
    pub async fn broadcast_packet_except<M: Message>(
        &self,
        message: &M,
        except: EntityId,
    ) -> Result<usize, SessionError> {
        let bytes = message.encode(Direction::Clientbound)?;
        let targets = self
            .ready_snapshot()
            .into_iter()
            .filter(|s| s.id() != except)
            .collect();
        Ok(deliver(targets, &bytes).await)
    }

    /// Shows `to` every other ready player by sending one
    /// [`EntityNamedSpawn`](mineral_protocol::EntityNamedSpawn) each.
    pub async fn announce_new_arrival(&self, to: &Session) -> Result<(), SessionError> {
        for other in self.ready_snapshot() {
            if other.id() == to.id() {
                continue;
            }
            if let Some(spawn) = other.spawn_message() {
                to.send(&spawn).await?;
            }
        }
        Ok(())
    }
}

/// Writes `bytes` to every target concurrently and counts the successes.
/// A failed write only affects its own session.
async fn deliver(targets: Vec<Arc<Session>>, bytes: &[u8]) -> usize {
    let results = join_all(targets.iter().map(|s| s.send_raw(bytes))).await;
    let mut delivered = 0;
    for (session, result) in targets.iter().zip(results) {
        match result {
            Ok(()) => delivered += 1,
            Err(e) => debug!(entity = %session.id(), error = %e, "broadcast not delivered"),
        }
    }
    delivered
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("names", &self.names())
            .finish()
    }
}
