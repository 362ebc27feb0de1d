//! Major actions: moves, switches, faints

use super::battle::{
    find_from_tag, has_tag, parse_details, parse_hp_status, parse_optional_pokemon, parse_pokemon,
};
use super::{ServerMessage, required};
use anyhow::Result;

/// |move|POKEMON|MOVE|TARGET followed by optional `[miss]`, `[still]`,
/// `[from] EFFECT` tags
pub fn parse_move(parts: &[&str]) -> Result<ServerMessage> {
    let pokemon = parse_pokemon(parts, 2)?;
    let move_name = required(parts, 3, "move")?.to_string();
    let target = parse_optional_pokemon(parts, 4);

    Ok(ServerMessage::Move {
        pokemon,
        move_name,
        target,
        miss: has_tag(parts, 5, "[miss]"),
        still: has_tag(parts, 5, "[still]"),
        from: find_from_tag(parts, 5),
    })
}

/// |switch|POKEMON|DETAILS|HP STATUS
pub fn parse_switch(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::Switch {
        pokemon: parse_pokemon(parts, 2)?,
        details: parse_details(parts, 3),
        hp_status: parse_hp_status(parts, 4),
    })
}

/// |drag|POKEMON|DETAILS|HP STATUS
pub fn parse_drag(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::Drag {
        pokemon: parse_pokemon(parts, 2)?,
        details: parse_details(parts, 3),
        hp_status: parse_hp_status(parts, 4),
    })
}

/// |detailschange|POKEMON|DETAILS|HP STATUS
pub fn parse_detailschange(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::DetailsChange {
        pokemon: parse_pokemon(parts, 2)?,
        details: parse_details(parts, 3),
        hp_status: parse_hp_status(parts, 4),
    })
}

/// |replace|POKEMON|DETAILS|HP STATUS (Illusion breaking)
pub fn parse_replace(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::Replace {
        pokemon: parse_pokemon(parts, 2)?,
        details: parse_details(parts, 3),
        hp_status: parse_hp_status(parts, 4),
    })
}

/// |cant|POKEMON|REASON or |cant|POKEMON|REASON|MOVE
pub fn parse_cant(parts: &[&str]) -> Result<ServerMessage> {
    let pokemon = parse_pokemon(parts, 2)?;
    let reason = parts.get(3).unwrap_or(&"").to_string();
    let move_name = parts
        .get(4)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    Ok(ServerMessage::Cant {
        pokemon,
        reason,
        move_name,
    })
}

/// |faint|POKEMON
pub fn parse_faint(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::Faint(parse_pokemon(parts, 2)?))
}
