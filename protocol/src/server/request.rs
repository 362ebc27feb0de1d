//! JSON payload of `|request|`
//!
//! A request tells one player what it may do next: pick a move for each
//! active slot, replace a fainted Pokemon, order its team, or wait.

use super::battle::{HpStatus, Player, PokemonDetails};
use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleRequest {
    /// Request id echoed back in `/choose` so the server can reject stale choices
    pub rqid: Option<u64>,

    #[serde(default)]
    pub active: Option<Vec<ActivePokemon>>,

    pub side: Option<SideInfo>,

    #[serde(default)]
    pub force_switch: Option<Vec<bool>>,

    #[serde(default)]
    pub team_preview: bool,

    #[serde(default)]
    pub wait: bool,

    #[serde(default)]
    pub no_cancel: bool,
}

impl BattleRequest {
    /// Whether this request asks for a choice at all
    pub fn needs_decision(&self) -> bool {
        !self.wait && (self.team_preview || self.is_force_switch() || self.active.is_some())
    }

    pub fn is_force_switch(&self) -> bool {
        self.force_switch
            .as_ref()
            .is_some_and(|fs| fs.iter().any(|&b| b))
    }

    /// Number of active slots the request covers
    pub fn active_slots(&self) -> usize {
        match (&self.force_switch, &self.active) {
            (Some(fs), _) => fs.len(),
            (None, Some(active)) => active.len(),
            (None, None) => 0,
        }
    }

    /// Bench Pokemon that can be switched in, with their 1-based team slot
    pub fn available_switches(&self) -> Vec<(usize, &SidePokemon)> {
        self.side
            .as_ref()
            .map(|s| {
                s.pokemon
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| !p.active && !p.is_fainted())
                    .map(|(i, p)| (i + 1, p))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn team_size(&self) -> usize {
        self.side.as_ref().map_or(0, |s| s.pokemon.len())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePokemon {
    #[serde(default)]
    pub moves: Vec<MoveSlot>,

    #[serde(default)]
    pub trapped: bool,

    #[serde(default)]
    pub maybe_trapped: bool,

    #[serde(default)]
    pub can_terastallize: Option<String>,
}

impl ActivePokemon {
    /// Usable moves with their 1-based slot number
    pub fn available_moves(&self) -> Vec<(usize, &MoveSlot)> {
        self.moves
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_available())
            .map(|(i, m)| (i + 1, m))
            .collect()
    }

    pub fn can_switch(&self) -> bool {
        !self.trapped
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveSlot {
    #[serde(rename = "move")]
    pub name: String,

    pub id: String,

    /// Absent for locked-in moves such as Outrage's continuation or Struggle
    #[serde(default)]
    pub pp: Option<u32>,

    #[serde(default, rename = "maxpp")]
    pub max_pp: Option<u32>,

    #[serde(default)]
    pub target: Option<String>,

    /// The server sends `true`/`false`, or a string naming the source of
    /// the restriction in some formats
    #[serde(default, deserialize_with = "bool_or_reason")]
    pub disabled: bool,
}

impl MoveSlot {
    pub fn is_available(&self) -> bool {
        !self.disabled && self.pp.is_none_or(|pp| pp > 0)
    }

    /// Whether the move lets the player pick a target slot
    pub fn needs_target(&self) -> bool {
        matches!(
            self.target.as_deref(),
            Some("normal" | "any" | "adjacentAlly" | "adjacentFoe" | "adjacentAllyOrSelf")
        )
    }
}

fn bool_or_reason<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Reason(String),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Reason(_)) => true,
        None => false,
    })
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideInfo {
    pub name: String,

    /// "p1" or "p2"
    pub id: String,

    #[serde(default)]
    pub pokemon: Vec<SidePokemon>,
}

impl SideInfo {
    pub fn player(&self) -> Option<Player> {
        Player::parse(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidePokemon {
    /// "p1: Pikachu"
    pub ident: String,

    pub details: String,

    /// "245/301 par" or "0 fnt"
    pub condition: String,

    #[serde(default)]
    pub active: bool,

    #[serde(default)]
    pub stats: PokemonStats,

    #[serde(default)]
    pub moves: Vec<String>,

    #[serde(default)]
    pub base_ability: String,

    #[serde(default)]
    pub ability: String,

    #[serde(default)]
    pub item: String,

    #[serde(default)]
    pub teratype: Option<String>,

    #[serde(default)]
    pub terastallized: Option<String>,
}

impl SidePokemon {
    pub fn is_fainted(&self) -> bool {
        self.hp_status().is_some_and(|hp| hp.is_fainted())
    }

    pub fn hp_status(&self) -> Option<HpStatus> {
        HpStatus::parse(&self.condition)
    }

    pub fn status(&self) -> Option<&str> {
        self.condition
            .split_whitespace()
            .nth(1)
            .filter(|s| *s != "fnt")
    }

    pub fn parsed_details(&self) -> PokemonDetails {
        PokemonDetails::parse(&self.details)
    }

    pub fn species(&self) -> &str {
        self.details.split(',').next().unwrap_or(&self.details)
    }

    /// Nickname part of the ident
    pub fn name(&self) -> &str {
        self.ident
            .split_once(": ")
            .map_or(self.ident.as_str(), |(_, name)| name)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PokemonStats {
    pub atk: u32,
    pub def: u32,
    pub spa: u32,
    pub spd: u32,
    pub spe: u32,
}
