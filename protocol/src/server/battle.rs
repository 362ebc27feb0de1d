//! Identifiers shared by battle messages

use crate::ParseError;
use std::fmt;

/// Battle side owner. Singles only ever uses p1 and p2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Player {
    P1,
    P2,
}

impl Player {
    pub fn parse(s: &str) -> Option<Self> {
        match s.get(..2)? {
            "p1" => Some(Player::P1),
            "p2" => Some(Player::P2),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Player::P1 => "p1",
            Player::P2 => "p2",
        }
    }

    pub fn opponent(&self) -> Player {
        match self {
            Player::P1 => Player::P2,
            Player::P2 => Player::P1,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pokemon reference of the form "p1a: Pikachu"
///
/// The position letter is present when the message refers to an active
/// slot and absent for bench references such as "p1: Pikachu".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pokemon {
    pub player: Player,
    pub position: Option<char>,
    pub name: String,
}

impl Pokemon {
    pub fn parse(s: &str) -> Option<Self> {
        let (pos_part, name) = s.split_once(": ")?;
        let player = Player::parse(pos_part)?;
        let position = pos_part.chars().nth(2);

        Some(Pokemon {
            player,
            position,
            name: name.to_string(),
        })
    }
}

impl fmt::Display for Pokemon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "{}{}: {}", self.player, pos, self.name),
            None => write!(f, "{}: {}", self.player, self.name),
        }
    }
}

/// Details string: "Pikachu, L50, M, shiny, tera:Electric"
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PokemonDetails {
    pub species: String,
    pub level: Option<u8>,
    pub gender: Option<char>,
    pub shiny: bool,
    pub tera_type: Option<String>,
}

impl PokemonDetails {
    pub fn parse(s: &str) -> Self {
        let mut parts = s.split(", ");
        let mut details = PokemonDetails {
            species: parts.next().unwrap_or_default().to_string(),
            ..Default::default()
        };

        for part in parts {
            match part {
                "M" => details.gender = Some('M'),
                "F" => details.gender = Some('F'),
                "shiny" => details.shiny = true,
                _ => {
                    if let Some(level) = part.strip_prefix('L') {
                        details.level = level.parse().ok();
                    } else if let Some(tera) = part.strip_prefix("tera:") {
                        details.tera_type = Some(tera.to_string());
                    }
                }
            }
        }

        details
    }
}

/// HP and status: "100/100", "50/100 slp", "0 fnt"
///
/// Our own side reports exact HP; the opponent's side reports a value
/// out of 100 (or 48 with exact-HP-percentage mods off).
#[derive(Debug, Clone, PartialEq)]
pub struct HpStatus {
    pub current: u32,
    pub max: Option<u32>,
    pub status: Option<String>,
}

impl HpStatus {
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split_whitespace();
        let hp_part = parts.next()?;
        let status = parts.next().map(str::to_string);

        let (current, max) = match hp_part.split_once('/') {
            Some((current, max)) => (current.parse().ok()?, Some(max.parse().ok()?)),
            None => (hp_part.parse().ok()?, None),
        };

        Some(HpStatus {
            current,
            max,
            status,
        })
    }

    pub fn is_fainted(&self) -> bool {
        self.current == 0 || self.status.as_deref() == Some("fnt")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameType {
    Singles,
    Doubles,
    Triples,
    Multi,
    FreeForAll,
}

impl GameType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "singles" => Some(GameType::Singles),
            "doubles" => Some(GameType::Doubles),
            "triples" => Some(GameType::Triples),
            "multi" => Some(GameType::Multi),
            "freeforall" => Some(GameType::FreeForAll),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stat {
    Atk,
    Def,
    Spa,
    Spd,
    Spe,
    Accuracy,
    Evasion,
}

impl Stat {
    pub const ALL: [Stat; 7] = [
        Stat::Atk,
        Stat::Def,
        Stat::Spa,
        Stat::Spd,
        Stat::Spe,
        Stat::Accuracy,
        Stat::Evasion,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "atk" => Some(Stat::Atk),
            "def" => Some(Stat::Def),
            "spa" => Some(Stat::Spa),
            "spd" => Some(Stat::Spd),
            "spe" => Some(Stat::Spe),
            "accuracy" => Some(Stat::Accuracy),
            "evasion" => Some(Stat::Evasion),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stat::Atk => "atk",
            Stat::Def => "def",
            Stat::Spa => "spa",
            Stat::Spd => "spd",
            Stat::Spe => "spe",
            Stat::Accuracy => "accuracy",
            Stat::Evasion => "evasion",
        }
    }
}

/// Side reference in side-condition messages: "p1: Alice"
#[derive(Debug, Clone, PartialEq)]
pub struct Side {
    pub player: Player,
    pub raw: String,
}

impl Side {
    pub fn parse(s: &str) -> Option<Self> {
        Some(Side {
            player: Player::parse(s)?,
            raw: s.to_string(),
        })
    }
}

pub(super) fn parse_pokemon(parts: &[&str], index: usize) -> anyhow::Result<Pokemon> {
    parts
        .get(index)
        .and_then(|s| Pokemon::parse(s))
        .ok_or_else(|| ParseError::MissingField("pokemon".to_string()).into())
}

pub(super) fn parse_optional_pokemon(parts: &[&str], index: usize) -> Option<Pokemon> {
    parts.get(index).and_then(|s| Pokemon::parse(s))
}

pub(super) fn parse_details(parts: &[&str], index: usize) -> PokemonDetails {
    parts
        .get(index)
        .map(|s| PokemonDetails::parse(s))
        .unwrap_or_default()
}

pub(super) fn parse_hp_status(parts: &[&str], index: usize) -> Option<HpStatus> {
    parts.get(index).and_then(|s| HpStatus::parse(s))
}

pub(super) fn parse_side(parts: &[&str], index: usize) -> anyhow::Result<Side> {
    parts
        .get(index)
        .and_then(|s| Side::parse(s))
        .ok_or_else(|| ParseError::MissingField("side".to_string()).into())
}

pub(super) fn parse_stat(parts: &[&str], index: usize) -> anyhow::Result<Stat> {
    parts
        .get(index)
        .and_then(|s| Stat::parse(s))
        .ok_or_else(|| ParseError::MissingField("stat".to_string()).into())
}

/// Find a `[from] EFFECT` tag among the trailing message parts
pub(super) fn find_from_tag(parts: &[&str], start: usize) -> Option<String> {
    parts
        .iter()
        .skip(start)
        .find_map(|p| p.strip_prefix("[from] "))
        .map(str::to_string)
}

pub(super) fn has_tag(parts: &[&str], start: usize, tag: &str) -> bool {
    parts.iter().skip(start).any(|p| *p == tag)
}
