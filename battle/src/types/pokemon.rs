//! Per-Pokemon battle state

use std::collections::HashSet;

use pokellm_protocol::{HpStatus, PokemonDetails, to_id};

use super::stats::StatStages;
use super::status::{Status, Volatile};

#[derive(Debug, Clone, PartialEq)]
pub struct PokemonState {
    /// Name used in protocol identifiers ("p2a: NAME")
    pub name: String,
    /// Species including forme, e.g. "Ogerpon-Wellspring"
    pub species: String,
    pub level: u8,

    /// Exact HP for our side, a value out of `hp_max` (usually 100) for the opponent
    pub hp_current: u32,
    pub hp_max: u32,
    pub status: Option<Status>,
    pub fainted: bool,
    pub active: bool,

    pub boosts: StatStages,
    pub volatiles: HashSet<Volatile>,

    /// Move ids revealed so far, in order of first use
    pub known_moves: Vec<String>,
    pub ability: Option<String>,
    pub item: Option<String>,
    pub item_consumed: bool,
    pub tera_type: Option<String>,
    pub terastallized: bool,
    pub transformed_into: Option<String>,

    /// Id of the last move this Pokemon used while on the field
    pub last_move: Option<String>,
}

impl PokemonState {
    pub fn new(name: impl Into<String>, details: &PokemonDetails) -> Self {
        Self {
            name: name.into(),
            species: details.species.clone(),
            level: details.level.unwrap_or(100),
            hp_current: 100,
            hp_max: 100,
            status: None,
            fainted: false,
            active: false,
            boosts: StatStages::default(),
            volatiles: HashSet::new(),
            known_moves: Vec::new(),
            ability: None,
            item: None,
            item_consumed: false,
            tera_type: details.tera_type.clone(),
            terastallized: false,
            transformed_into: None,
            last_move: None,
        }
    }

    /// Remaining HP as a fraction in 0.0..=1.0
    pub fn hp_fraction(&self) -> f32 {
        if self.fainted || self.hp_max == 0 {
            return 0.0;
        }
        (self.hp_current as f32 / self.hp_max as f32).clamp(0.0, 1.0)
    }

    pub fn hp_percent(&self) -> u32 {
        (self.hp_fraction() * 100.0).round() as u32
    }

    pub fn is_alive(&self) -> bool {
        !self.fainted
    }

    pub fn has_volatile(&self, volatile: &Volatile) -> bool {
        self.volatiles.contains(volatile)
    }

    /// Apply an "HP STATUS" field. A missing status means the Pokemon has none.
    pub fn apply_hp_status(&mut self, hp: &HpStatus) {
        self.hp_current = hp.current;
        if let Some(max) = hp.max {
            self.hp_max = max;
        }
        if hp.is_fainted() {
            self.faint();
            return;
        }
        self.fainted = false;
        self.status = hp.status.as_deref().and_then(Status::from_protocol);
    }

    pub fn faint(&mut self) {
        self.fainted = true;
        self.hp_current = 0;
        self.status = None;
    }

    /// Record a move use, revealing it and remembering it as the last move
    pub fn record_move(&mut self, move_name: &str) {
        let id = to_id(move_name);
        if id.is_empty() {
            return;
        }
        if !self.known_moves.contains(&id) {
            self.known_moves.push(id.clone());
        }
        self.last_move = Some(id);
        self.volatiles.remove(&Volatile::MustRecharge);
    }

    pub fn on_switch_in(&mut self) {
        self.active = true;
    }

    /// Leaving the field clears everything tied to being active
    pub fn on_switch_out(&mut self) {
        self.active = false;
        self.boosts.clear();
        self.volatiles.clear();
        self.transformed_into = None;
        self.last_move = None;
    }
}
