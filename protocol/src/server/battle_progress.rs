//! Turn flow, requests, timer, and battle outcome

use super::request::BattleRequest;
use super::{ServerMessage, required};
use crate::ParseError;
use anyhow::Result;

/// |request|REQUEST
///
/// The JSON payload may itself contain `|` characters, so everything after
/// the command is rejoined. An empty or `null` payload is a cleared request
/// and is reported as [`ServerMessage::Raw`].
pub fn parse_request(parts: &[&str], line: &str) -> Result<ServerMessage> {
    let json = parts[2..].join("|");
    let json = json.trim();
    if json.is_empty() || json == "null" {
        return Ok(ServerMessage::Raw(line.to_string()));
    }

    let request: BattleRequest = serde_json::from_str(json)
        .map_err(|e| ParseError::InvalidFormat(format!("invalid request json: {}", e)))?;
    Ok(ServerMessage::Request(Box::new(request)))
}

/// |inactive|MESSAGE
pub fn parse_inactive(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::Inactive(parts[2..].join("|")))
}

/// |inactiveoff|MESSAGE
pub fn parse_inactiveoff(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::InactiveOff(parts[2..].join("|")))
}

/// |turn|NUMBER
pub fn parse_turn(parts: &[&str]) -> Result<ServerMessage> {
    let turn = required(parts, 2, "turn number")?
        .parse()
        .map_err(|_| ParseError::InvalidFormat("turn number".to_string()))?;

    Ok(ServerMessage::Turn(turn))
}

/// |win|USER
pub fn parse_win(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::Win(parts.get(2).unwrap_or(&"").to_string()))
}

/// |error|MESSAGE, e.g. "[Invalid choice] Can't move: ..."
pub fn parse_error(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::Error(parts[2..].join("|")))
}
