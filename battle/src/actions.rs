//! Legal actions for the current request
//!
//! Every action carries a label, the exact token a decision maker answers
//! with, and renders the `/choose` payload the server expects.

use std::fmt;

use crate::tracking::BattleState;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LegalAction {
    /// Use the move in 1-based `slot` of the active Pokemon
    UseMove {
        slot: u8,
        target: Option<i8>,
        id: String,
        name: String,
    },
    /// Switch to the Pokemon in 1-based party position `target`
    Switch { target: u8, species: String },
}

impl LegalAction {
    pub fn label(&self) -> String {
        match self {
            LegalAction::UseMove { id, .. } => normalize_label(id),
            LegalAction::Switch { species, .. } => format!("switch-{}", normalize_label(species)),
        }
    }

    /// Payload for `/choose`
    pub fn to_choice(&self) -> String {
        match self {
            LegalAction::UseMove {
                slot,
                target: Some(target),
                ..
            } => format!("move {} {}", slot, target),
            LegalAction::UseMove { slot, .. } => format!("move {}", slot),
            LegalAction::Switch { target, .. } => format!("switch {}", target),
        }
    }

    pub fn is_switch(&self) -> bool {
        matches!(self, LegalAction::Switch { .. })
    }

    pub fn move_id(&self) -> Option<&str> {
        match self {
            LegalAction::UseMove { id, .. } => Some(id),
            LegalAction::Switch { .. } => None,
        }
    }
}

impl fmt::Display for LegalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegalAction::UseMove { name, .. } => write!(f, "{}", name),
            LegalAction::Switch { species, .. } => write!(f, "switch to {}", species),
        }
    }
}

/// Lowercase, whitespace to `-`, anything outside `[a-z0-9-]` dropped
pub fn normalize_label(s: &str) -> String {
    s.trim()
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('-')
            } else {
                let c = c.to_ascii_lowercase();
                (c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-').then_some(c)
            }
        })
        .collect()
}

/// The actions open to us for one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegalActionSet {
    pub turn: u32,
    pub rqid: Option<u64>,
    actions: Vec<LegalAction>,
}

impl LegalActionSet {
    pub fn new(turn: u32, rqid: Option<u64>, actions: Vec<LegalAction>) -> Self {
        let mut set = Self {
            turn,
            rqid,
            actions: Vec::with_capacity(actions.len()),
        };
        for action in actions {
            if !set.contains(&action.label()) {
                set.actions.push(action);
            }
        }
        set
    }

    /// Derive the legal actions from the latest request and tracked state.
    ///
    /// Only single-slot battles produce actions; waiting, team preview and
    /// multi-slot requests give an empty set.
    pub fn from_state(state: &BattleState) -> Self {
        let Some(request) = &state.request else {
            return Self::default();
        };
        let empty = Self::new(state.turn, request.rqid, Vec::new());
        if request.wait || request.team_preview || request.active_slots() > 1 {
            return empty;
        }

        let switches: Vec<LegalAction> = request
            .available_switches()
            .into_iter()
            .map(|(position, poke)| LegalAction::Switch {
                target: position as u8,
                species: poke.parsed_details().species,
            })
            .collect();

        if request.is_force_switch() || state.my_active_fainted() {
            return Self::new(state.turn, request.rqid, switches);
        }

        let Some(active) = request.active.as_ref().and_then(|a| a.first()) else {
            return empty;
        };

        let mut actions: Vec<LegalAction> = active
            .available_moves()
            .into_iter()
            .map(|(slot, m)| LegalAction::UseMove {
                slot: slot as u8,
                target: None,
                id: m.id.clone(),
                name: m.name.clone(),
            })
            .collect();
        if active.can_switch() {
            actions.extend(switches);
        }

        Self::new(state.turn, request.rqid, actions)
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LegalAction> {
        self.actions.iter()
    }

    pub fn get(&self, label: &str) -> Option<&LegalAction> {
        self.actions.iter().find(|a| a.label() == label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    pub fn labels(&self) -> Vec<String> {
        self.actions.iter().map(LegalAction::label).collect()
    }

    /// First legal move, else first switch
    pub fn default_action(&self) -> Option<&LegalAction> {
        self.actions
            .iter()
            .find(|a| !a.is_switch())
            .or_else(|| self.actions.first())
    }

    /// Subset keeping the actions `keep` accepts, with the same turn and rqid
    pub fn filter(&self, mut keep: impl FnMut(&LegalAction) -> bool) -> Self {
        Self {
            turn: self.turn,
            rqid: self.rqid,
            actions: self.actions.iter().filter(|a| keep(a)).cloned().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a LegalActionSet {
    type Item = &'a LegalAction;
    type IntoIter = std::slice::Iter<'a, LegalAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}
