//! Interpretation of `getstatus` replies.
//!
//! A `getstatus` response is a marker line containing `statusResponse`, one
//! backslash-delimited info string of key/value pairs, then one
//! `<score> <ping> "name"` line per connected player.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::RconError;

/// One connected player as reported by `getstatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerStatus {
    pub score: i32,
    pub ping: i32,
    pub name: String,
}

/// Parsed `getstatus` reply.
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    /// Server cvars from the info string (`sv_hostname`, `mapname`, ...).
    pub info: HashMap<String, String>,
    pub players: Vec<PlayerStatus>,
}

impl ServerStatus {
    /// Parses the response lines of a `getstatus` query, as returned by
    /// [`RconConnection::send_query`](crate::RconConnection::send_query).
    pub fn parse(lines: &[String]) -> Result<Self, RconError> {
        let marker = lines
            .iter()
            .position(|line| line.contains("statusResponse"))
            .ok_or_else(|| RconError::Malformed("missing statusResponse marker".to_string()))?;

        let mut remaining = lines[marker + 1..].iter();
        let info_line = remaining
            .next()
            .ok_or_else(|| RconError::Malformed("missing info string".to_string()))?;

        let mut players = Vec::new();
        for line in remaining {
            players.push(parse_player_line(line)?);
        }

        Ok(Self {
            info: parse_info_string(info_line),
            players,
        })
    }

    /// Convenience accessor for the advertised map name.
    pub fn map_name(&self) -> Option<&str> {
        self.info.get("mapname").map(String::as_str)
    }

    /// Convenience accessor for the advertised hostname.
    pub fn host_name(&self) -> Option<&str> {
        self.info.get("sv_hostname").map(String::as_str)
    }
}

fn parse_info_string(line: &str) -> HashMap<String, String> {
    let mut info = HashMap::new();
    let mut parts = line.trim_start_matches('\\').split('\\');
    while let (Some(key), Some(value)) = (parts.next(), parts.next()) {
        info.insert(key.to_string(), value.to_string());
    }
    info
}

fn parse_player_line(line: &str) -> Result<PlayerStatus, RconError> {
    let mut fields = line.splitn(3, ' ');
    let score = fields.next().and_then(|field| field.parse().ok());
    let ping = fields.next().and_then(|field| field.parse().ok());
    let name = fields
        .next()
        .map(|field| field.trim().trim_matches('"').to_string());

    match (score, ping, name) {
        (Some(score), Some(ping), Some(name)) => Ok(PlayerStatus { score, ping, name }),
        _ => Err(RconError::Malformed(format!("bad player line: {line}"))),
    }
}
