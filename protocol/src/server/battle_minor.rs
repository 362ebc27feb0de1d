//! Minor actions: damage, stat stages, status, field effects
//!
//! Only the effects that change tracked battle state are modelled. Purely
//! cosmetic minor lines (`-crit`, `-miss`, `-hint`, ...) fall through to
//! [`ServerMessage::Raw`].

use super::battle::{
    Pokemon, Stat, has_tag, parse_hp_status, parse_pokemon, parse_side, parse_stat,
};
use super::{ServerMessage, required};
use crate::ParseError;
use anyhow::Result;

fn text(parts: &[&str], index: usize) -> String {
    parts.get(index).unwrap_or(&"").to_string()
}

fn stat_change(parts: &[&str]) -> Result<(Pokemon, Stat, i8)> {
    let pokemon = parse_pokemon(parts, 2)?;
    let stat = parse_stat(parts, 3)?;
    let amount = required(parts, 4, "amount")?
        .parse()
        .map_err(|_| ParseError::InvalidFormat("boost amount".to_string()))?;
    Ok((pokemon, stat, amount))
}

/// |-damage|POKEMON|HP STATUS
pub fn parse_damage(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::Damage {
        pokemon: parse_pokemon(parts, 2)?,
        hp_status: parse_hp_status(parts, 3),
    })
}

/// |-heal|POKEMON|HP STATUS
pub fn parse_heal(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::Heal {
        pokemon: parse_pokemon(parts, 2)?,
        hp_status: parse_hp_status(parts, 3),
    })
}

/// |-sethp|POKEMON|HP
pub fn parse_sethp(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::SetHp {
        pokemon: parse_pokemon(parts, 2)?,
        hp_status: parse_hp_status(parts, 3),
    })
}

/// |-status|POKEMON|STATUS
pub fn parse_status(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::Status {
        pokemon: parse_pokemon(parts, 2)?,
        status: required(parts, 3, "status")?.to_string(),
    })
}

/// |-curestatus|POKEMON|STATUS
pub fn parse_curestatus(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::CureStatus {
        pokemon: parse_pokemon(parts, 2)?,
        status: text(parts, 3),
    })
}

/// |-cureteam|POKEMON
pub fn parse_cureteam(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::CureTeam(parse_pokemon(parts, 2)?))
}

/// |-boost|POKEMON|STAT|AMOUNT
pub fn parse_boost(parts: &[&str]) -> Result<ServerMessage> {
    let (pokemon, stat, amount) = stat_change(parts)?;
    Ok(ServerMessage::Boost {
        pokemon,
        stat,
        amount,
    })
}

/// |-unboost|POKEMON|STAT|AMOUNT
pub fn parse_unboost(parts: &[&str]) -> Result<ServerMessage> {
    let (pokemon, stat, amount) = stat_change(parts)?;
    Ok(ServerMessage::Unboost {
        pokemon,
        stat,
        amount,
    })
}

/// |-setboost|POKEMON|STAT|AMOUNT
pub fn parse_setboost(parts: &[&str]) -> Result<ServerMessage> {
    let (pokemon, stat, amount) = stat_change(parts)?;
    Ok(ServerMessage::SetBoost {
        pokemon,
        stat,
        amount,
    })
}

/// |-swapboost|SOURCE|TARGET|STATS
///
/// An empty stat list means every stage is swapped.
pub fn parse_swapboost(parts: &[&str]) -> Result<ServerMessage> {
    let source = parse_pokemon(parts, 2)?;
    let target = parse_pokemon(parts, 3)?;
    let stats = parts
        .get(4)
        .filter(|s| !s.starts_with('['))
        .map(|s| s.split(',').filter_map(|s| Stat::parse(s.trim())).collect())
        .unwrap_or_default();

    Ok(ServerMessage::SwapBoost {
        source,
        target,
        stats,
    })
}

/// |-invertboost|POKEMON
pub fn parse_invertboost(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::InvertBoost(parse_pokemon(parts, 2)?))
}

/// |-clearboost|POKEMON
pub fn parse_clearboost(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::ClearBoost(parse_pokemon(parts, 2)?))
}

/// |-clearpositiveboost|TARGET|POKEMON|EFFECT
pub fn parse_clearpositiveboost(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::ClearPositiveBoost {
        target: parse_pokemon(parts, 2)?,
    })
}

/// |-clearnegativeboost|POKEMON
pub fn parse_clearnegativeboost(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::ClearNegativeBoost(parse_pokemon(parts, 2)?))
}

/// |-copyboost|SOURCE|TARGET
pub fn parse_copyboost(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::CopyBoost {
        source: parse_pokemon(parts, 2)?,
        target: parse_pokemon(parts, 3)?,
    })
}

/// |-weather|WEATHER with optional `[upkeep]`
pub fn parse_weather(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::Weather {
        weather: parts.get(2).unwrap_or(&"none").to_string(),
        upkeep: has_tag(parts, 3, "[upkeep]"),
    })
}

/// |-fieldstart|CONDITION
pub fn parse_fieldstart(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::FieldStart(text(parts, 2)))
}

/// |-fieldend|CONDITION
pub fn parse_fieldend(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::FieldEnd(text(parts, 2)))
}

/// |-sidestart|SIDE|CONDITION
pub fn parse_sidestart(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::SideStart {
        side: parse_side(parts, 2)?,
        condition: text(parts, 3),
    })
}

/// |-sideend|SIDE|CONDITION
pub fn parse_sideend(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::SideEnd {
        side: parse_side(parts, 2)?,
        condition: text(parts, 3),
    })
}

/// |-start|POKEMON|EFFECT
pub fn parse_start(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::VolatileStart {
        pokemon: parse_pokemon(parts, 2)?,
        effect: text(parts, 3),
    })
}

/// |-end|POKEMON|EFFECT
pub fn parse_end(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::VolatileEnd {
        pokemon: parse_pokemon(parts, 2)?,
        effect: text(parts, 3),
    })
}

pub fn parse_supereffective(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::SuperEffective(parse_pokemon(parts, 2)?))
}

pub fn parse_resisted(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::Resisted(parse_pokemon(parts, 2)?))
}

pub fn parse_immune(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::Immune(parse_pokemon(parts, 2)?))
}

/// |-item|POKEMON|ITEM
pub fn parse_item(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::Item {
        pokemon: parse_pokemon(parts, 2)?,
        item: text(parts, 3),
    })
}

/// |-enditem|POKEMON|ITEM
pub fn parse_enditem(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::EndItem {
        pokemon: parse_pokemon(parts, 2)?,
        item: text(parts, 3),
    })
}

/// |-ability|POKEMON|ABILITY
pub fn parse_ability(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::Ability {
        pokemon: parse_pokemon(parts, 2)?,
        ability: text(parts, 3),
    })
}

/// |-endability|POKEMON
pub fn parse_endability(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::EndAbility(parse_pokemon(parts, 2)?))
}

/// |-transform|POKEMON|SPECIES
///
/// SPECIES is usually the target's identifier ("p2a: Ditto") rather than
/// a bare species name; the name part after the colon is kept.
pub fn parse_transform(parts: &[&str]) -> Result<ServerMessage> {
    let pokemon = parse_pokemon(parts, 2)?;
    let raw = text(parts, 3);
    let species = match raw.split_once(": ") {
        Some((_, name)) => name.to_string(),
        None => raw,
    };

    Ok(ServerMessage::Transform { pokemon, species })
}

/// |-formechange|POKEMON|SPECIES|HP STATUS
pub fn parse_formechange(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::FormeChange {
        pokemon: parse_pokemon(parts, 2)?,
        species: text(parts, 3),
        hp_status: parse_hp_status(parts, 4),
    })
}

/// |-mega|POKEMON|MEGASTONE
pub fn parse_mega(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::Mega(parse_pokemon(parts, 2)?))
}

/// |-terastallize|POKEMON|TYPE
pub fn parse_terastallize(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::Terastallize {
        pokemon: parse_pokemon(parts, 2)?,
        tera_type: required(parts, 3, "tera type")?.to_string(),
    })
}

/// |-mustrecharge|POKEMON
pub fn parse_mustrecharge(parts: &[&str]) -> Result<ServerMessage> {
    Ok(ServerMessage::MustRecharge(parse_pokemon(parts, 2)?))
}
