//! One player's side of the field

use std::collections::BTreeMap;

use pokellm_protocol::Player;

use super::conditions::SideCondition;
use super::pokemon::PokemonState;

#[derive(Debug, Clone, PartialEq)]
pub struct SideState {
    pub player: Player,
    pub username: String,
    pub team_size: Option<u8>,

    /// Every Pokemon seen on this side, in order of appearance (or party
    /// order for our own side once a request has been applied)
    pub pokemon: Vec<PokemonState>,

    /// Index into `pokemon` for each active slot
    pub active_indices: Vec<Option<usize>>,

    /// Side conditions and their layer count
    pub conditions: BTreeMap<SideCondition, u8>,
}

impl SideState {
    pub fn new(player: Player, username: impl Into<String>, active_slots: usize) -> Self {
        Self {
            player,
            username: username.into(),
            team_size: None,
            pokemon: Vec::new(),
            active_indices: vec![None; active_slots],
            conditions: BTreeMap::new(),
        }
    }

    pub fn set_active_slots(&mut self, count: usize) {
        self.active_indices.resize(count, None);
    }

    pub fn active(&self, slot: usize) -> Option<&PokemonState> {
        let idx = (*self.active_indices.get(slot)?)?;
        self.pokemon.get(idx)
    }

    pub fn active_mut(&mut self, slot: usize) -> Option<&mut PokemonState> {
        let idx = (*self.active_indices.get(slot)?)?;
        self.pokemon.get_mut(idx)
    }

    /// The active Pokemon in singles
    pub fn active_pokemon(&self) -> Option<&PokemonState> {
        self.active(0)
    }

    /// Non-active Pokemon that have not fainted
    pub fn bench(&self) -> impl Iterator<Item = &PokemonState> {
        self.pokemon.iter().filter(|p| !p.active && p.is_alive())
    }

    pub fn alive_count(&self) -> usize {
        self.pokemon.iter().filter(|p| p.is_alive()).count()
    }

    pub fn fainted_count(&self) -> usize {
        self.pokemon.iter().filter(|p| p.fainted).count()
    }

    /// Pokemon not yet revealed, when the team size is known
    pub fn unrevealed_count(&self) -> Option<usize> {
        self.team_size
            .map(|size| (size as usize).saturating_sub(self.pokemon.len()))
    }

    pub fn find_pokemon(&self, name: &str) -> Option<usize> {
        self.pokemon.iter().position(|p| p.name == name)
    }

    pub fn find_pokemon_mut(&mut self, name: &str) -> Option<&mut PokemonState> {
        self.pokemon.iter_mut().find(|p| p.name == name)
    }

    /// Put `pokemon_index` into `slot`, switching out whoever was there
    pub fn set_active(&mut self, slot: usize, pokemon_index: usize) {
        if slot >= self.active_indices.len() {
            return;
        }
        if let Some(old) = self.active_indices[slot]
            && old != pokemon_index
            && let Some(previous) = self.pokemon.get_mut(old)
        {
            previous.on_switch_out();
        }
        self.active_indices[slot] = Some(pokemon_index);
        if let Some(poke) = self.pokemon.get_mut(pokemon_index) {
            poke.on_switch_in();
        }
    }

    pub fn layers(&self, condition: SideCondition) -> u8 {
        self.conditions.get(&condition).copied().unwrap_or(0)
    }

    /// Add a condition, or one more layer of a stackable hazard
    pub fn add_condition(&mut self, condition: SideCondition) {
        let layers = self.conditions.entry(condition).or_insert(0);
        *layers = (*layers + 1).min(condition.max_layers());
    }

    pub fn remove_condition(&mut self, condition: SideCondition) {
        self.conditions.remove(&condition);
    }

    /// Whether any teammate, active or benched, has a major status
    pub fn any_statused(&self) -> bool {
        self.pokemon
            .iter()
            .any(|p| p.is_alive() && p.status.is_some())
    }
}
