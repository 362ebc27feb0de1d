//! Messages sent once at the start of a battle

use super::battle::{GameType, Player};
use super::{ServerMessage, required};
use crate::ParseError;
use anyhow::Result;

fn parse_player_field(parts: &[&str]) -> Result<Player> {
    let raw = required(parts, 2, "player")?;
    Player::parse(raw)
        .ok_or_else(|| ParseError::InvalidFormat(format!("unknown player: {}", raw)).into())
}

/// |player|PLAYER|USERNAME|AVATAR|RATING
///
/// The server also sends a bare `|player|p1|` when a player leaves.
pub fn parse_player(parts: &[&str]) -> Result<ServerMessage> {
    let player = parse_player_field(parts)?;
    let username = parts.get(3).unwrap_or(&"").to_string();
    let avatar = parts.get(4).unwrap_or(&"").to_string();
    let rating = parts.get(5).and_then(|s| s.parse().ok());

    Ok(ServerMessage::BattlePlayer {
        player,
        username,
        avatar,
        rating,
    })
}

/// |teamsize|PLAYER|NUMBER
pub fn parse_teamsize(parts: &[&str]) -> Result<ServerMessage> {
    let player = parse_player_field(parts)?;
    let size = required(parts, 3, "team size")?
        .parse()
        .map_err(|_| ParseError::InvalidFormat("team size".to_string()))?;

    Ok(ServerMessage::TeamSize { player, size })
}

/// |gametype|GAMETYPE
pub fn parse_gametype(parts: &[&str]) -> Result<ServerMessage> {
    let raw = required(parts, 2, "game type")?;
    let game_type = GameType::parse(raw)
        .ok_or_else(|| ParseError::InvalidFormat(format!("unknown game type: {}", raw)))?;

    Ok(ServerMessage::GameType(game_type))
}

/// |gen|GENNUM
pub fn parse_gen(parts: &[&str]) -> Result<ServerMessage> {
    let generation = required(parts, 2, "generation")?
        .parse()
        .map_err(|_| ParseError::InvalidFormat("generation".to_string()))?;

    Ok(ServerMessage::Gen(generation))
}

/// |tier|FORMATNAME
pub fn parse_tier(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::Tier(parts.get(2).unwrap_or(&"").to_string()))
}

/// |rated| or |rated|MESSAGE
pub fn parse_rated(parts: &[&str]) -> Result<ServerMessage> {
    let message = parts
        .get(2)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());
    Ok(ServerMessage::Rated(message))
}
