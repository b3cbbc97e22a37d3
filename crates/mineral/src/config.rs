//! Server configuration.
//!
//! [`ServerConfig`] is a plain struct with sensible defaults. Values can
//! be overridden field by field, or read from any key/value
//! [`ConfigSource`] (a parsed properties file, environment, a test map).
//! The server only ever reads configuration.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use mineral_session::SessionConfig;
use mineral_tick::TickConfig;
use tracing::warn;

/// Read-only key lookup.
pub trait ConfigSource {
    /// Returns the raw value for `key`, or `None` if it is not set.
    fn get(&self, key: &str) -> Option<String>;
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Errors from reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A key was present but its value could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Everything the server needs to know before it starts.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind. Empty means every interface.
    pub host: String,
    pub port: u16,
    /// Encrypt connections and verify players with the session server.
    pub online_mode: bool,
    /// Logged-in players allowed at once. 1..=127.
    pub max_players: usize,
    /// Shown in the multiplayer server list.
    pub motd: String,
    pub level_type: String,
    /// 0 survival, 1 creative, 2 adventure.
    pub game_mode: i8,
    /// 0 peaceful to 3 hard.
    pub difficulty: i8,
    /// Upper bound on any single write to a client.
    pub write_timeout: Duration,
    /// A client that sends nothing for this long is dropped.
    pub read_timeout: Duration,
    pub tick: TickConfig,
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 25565,
            online_mode: true,
            max_players: 20,
            motd: "A minero server".to_string(),
            level_type: "default".to_string(),
            game_mode: 0,
            difficulty: 1,
            write_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            tick: TickConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// The most players LoginInfo can announce; it carries the count as
    /// a signed byte.
    pub const MAX_PLAYERS_LIMIT: usize = 127;

    /// Builds a config from `source`, using defaults for missing keys.
    ///
    /// Recognised keys: `server.host`, `server.port`, `server.online_mode`,
    /// `server.max_players`, `server.motd`, `server.level_type`,
    /// `server.gamemode`, `server.difficulty`.
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] if a present value does not parse.
    pub fn from_source(source: &impl ConfigSource) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(host) = source.get("server.host") {
            cfg.host = host;
        }
        if let Some(port) = parse(source, "server.port")? {
            cfg.port = port;
        }
        if let Some(online) = parse(source, "server.online_mode")? {
            cfg.online_mode = online;
        }
        if let Some(max) = parse(source, "server.max_players")? {
            cfg.max_players = max;
        }
        if let Some(motd) = source.get("server.motd") {
            cfg.motd = motd;
        }
        if let Some(level_type) = source.get("server.level_type") {
            cfg.level_type = level_type;
        }
        if let Some(mode) = parse(source, "server.gamemode")? {
            cfg.game_mode = mode;
        }
        if let Some(difficulty) = parse(source, "server.difficulty")? {
            cfg.difficulty = difficulty;
        }
        Ok(cfg)
    }

    /// Clamps out-of-range values so the config is safe to use.
    ///
    /// Called automatically by the server builder.
    pub fn validated(mut self) -> Self {
        let clamped = self.max_players.clamp(1, Self::MAX_PLAYERS_LIMIT);
        if clamped != self.max_players {
            warn!(
                max_players = self.max_players,
                clamped, "max_players out of range, clamping"
            );
            self.max_players = clamped;
        }
        self.tick = self.tick.validated();
        self
    }

    /// `host:port`, with an empty host meaning every interface.
    pub fn bind_addr(&self) -> String {
        let host = if self.host.is_empty() {
            "0.0.0.0"
        } else {
            &self.host
        };
        format!("{host}:{}", self.port)
    }
}

fn parse<T: FromStr>(source: &impl ConfigSource, key: &'static str) -> Result<Option<T>, ConfigError> {
    match source.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_values() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 25565);
        assert!(cfg.online_mode);
        assert_eq!(cfg.max_players, 20);
        assert_eq!(cfg.motd, "A minero server");
        assert_eq!(cfg.bind_addr(), "0.0.0.0:25565");
    }

    #[test]
    fn test_from_source_overrides_present_keys() {
        let cfg = ServerConfig::from_source(&source(&[
            ("server.host", "127.0.0.1"),
            ("server.port", "25570"),
            ("server.online_mode", "false"),
            ("server.max_players", "8"),
            ("server.motd", "hello"),
            ("server.gamemode", "1"),
        ]))
        .unwrap();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:25570");
        assert!(!cfg.online_mode);
        assert_eq!(cfg.max_players, 8);
        assert_eq!(cfg.motd, "hello");
        assert_eq!(cfg.game_mode, 1);
        assert_eq!(cfg.difficulty, 1);
        assert_eq!(cfg.level_type, "default");
    }

    #[test]
    fn test_from_source_empty_gives_defaults() {
        let cfg = ServerConfig::from_source(&HashMap::new()).unwrap();
        assert_eq!(cfg.port, 25565);
        assert!(cfg.online_mode);
    }

    #[test]
    fn test_from_source_unparsable_value_is_invalid() {
        let err = ServerConfig::from_source(&source(&[("server.port", "lots")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "server.port", ref value } if value == "lots"
        ));
    }

    #[test]
    fn test_validated_clamps_max_players() {
        let cfg = ServerConfig {
            max_players: 500,
            ..ServerConfig::default()
        }
        .validated();
        assert_eq!(cfg.max_players, 127);

        let cfg = ServerConfig {
            max_players: 0,
            ..ServerConfig::default()
        }
        .validated();
        assert_eq!(cfg.max_players, 1);
    }
}
