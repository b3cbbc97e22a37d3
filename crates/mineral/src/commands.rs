//! Chat commands: lines starting with `/`.

use mineral_session::{Session, SessionError, SessionVerifier};
use tracing::info;

use crate::server::ServerState;

/// Reason used when `/kick` is given none.
const DEFAULT_KICK_REASON: &str = "Kicked by an operator";

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Command<'a> {
    /// `/list`: who is online.
    List,
    /// `/kick <name> [reason]`.
    Kick {
        target: Option<&'a str>,
        reason: &'a str,
    },
    /// `/me <action>`: an emote.
    Me(&'a str),
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    /// Parses a chat line. `None` if it is not a command, or is a bare `/`.
    pub(crate) fn parse(line: &'a str) -> Option<Self> {
        let body = line.strip_prefix('/')?.trim();
        let (name, rest) = match body.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (body, ""),
        };
        if name.is_empty() {
            return None;
        }
        Some(match name {
            "list" => Command::List,
            "kick" => {
                let (target, reason) = match rest.split_once(char::is_whitespace) {
                    Some((target, reason)) => (target, reason.trim()),
                    None => (rest, ""),
                };
                Command::Kick {
                    target: (!target.is_empty()).then_some(target),
                    reason: if reason.is_empty() {
                        DEFAULT_KICK_REASON
                    } else {
                        reason
                    },
                }
            }
            "me" => Command::Me(rest),
            other => Command::Unknown(other),
        })
    }
}

/// Runs `command` on behalf of `sender`.
pub(crate) async fn execute<V: SessionVerifier>(
    server: &ServerState<V>,
    sender: &Session,
    command: Command<'_>,
) -> Result<(), SessionError> {
    let name = sender.name().unwrap_or_default();
    info!(entity = %sender.id(), name, ?command, "command");

    match command {
        Command::List => {
            let names = server.sessions.names();
            sender
                .send_chat(format!(
                    "Online ({}/{}): {}",
                    names.len(),
                    server.config.max_players,
                    names.join(", ")
                ))
                .await
        }
        Command::Kick { target: None, .. } => sender.send_chat("Usage: /kick <name> [reason]").await,
        Command::Kick {
            target: Some(target),
            reason,
        } => {
            if server.kick(target, reason).await {
                Ok(())
            } else {
                sender
                    .send_chat(format!("Player {target:?} is not online."))
                    .await
            }
        }
        Command::Me("") => sender.send_chat("Usage: /me <action>").await,
        Command::Me(action) => server
            .sessions
            .broadcast_message(&format!("* {name} {action}"))
            .await
            .map(|_| ()),
        Command::Unknown(other) => sender.send_chat(format!("Unknown command {other:?}.")).await,
    }
}
