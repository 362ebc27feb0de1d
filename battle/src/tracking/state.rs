//! BattleState - the tracked view of one battle

use pokellm_protocol::{BattleRequest, GameType, Player};

use crate::actions::LegalActionSet;
use crate::types::{FieldState, PokemonState, SideState};

/// How a move fared against its target, as announced by the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effectiveness {
    SuperEffective,
    Resisted,
    Immune,
}

/// An observed move outcome: `attacker` used `move_id` on `defender`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Matchup {
    pub attacker: Player,
    pub attacker_species: String,
    pub move_id: String,
    pub defender_species: String,
    pub effectiveness: Effectiveness,
}

/// The most recent move, kept until an effectiveness line can be tied to it
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PendingMove {
    pub player: Player,
    pub species: String,
    pub move_id: String,
}

/// A battle reconstructed from server messages, from one player's perspective
///
/// Mutated only through [`crate::BattleTracker`]; everything else sees it as
/// an immutable snapshot behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct BattleState {
    pub game_type: Option<GameType>,
    pub generation: u8,
    pub tier: String,
    /// Current turn (0 before the first `|turn|`)
    pub turn: u32,

    pub field: FieldState,
    pub(crate) sides: [Option<SideState>; 2],
    perspective: Option<Player>,

    /// Latest request addressed to us
    pub request: Option<BattleRequest>,
    /// Legal actions derived from `request` and the tracked state
    pub legal_actions: LegalActionSet,
    /// Seconds left on our turn timer, when the server has told us
    pub timer_seconds_left: Option<u32>,

    pub matchups: Vec<Matchup>,
    pub(crate) pending_move: Option<PendingMove>,

    pub ended: bool,
    pub winner: Option<String>,
    pub tie: bool,
}

impl BattleState {
    pub fn new() -> Self {
        Self {
            game_type: None,
            generation: 9,
            tier: String::new(),
            turn: 0,
            field: FieldState::default(),
            sides: [None, None],
            perspective: None,
            request: None,
            legal_actions: LegalActionSet::default(),
            timer_seconds_left: None,
            matchups: Vec::new(),
            pending_move: None,
            ended: false,
            winner: None,
            tie: false,
        }
    }

    pub fn set_perspective(&mut self, player: Player) {
        self.perspective = Some(player);
    }

    pub fn perspective(&self) -> Option<Player> {
        self.perspective
    }

    pub fn me(&self) -> Option<&SideState> {
        self.side(self.perspective?)
    }

    pub fn opponent(&self) -> Option<&SideState> {
        self.side(self.perspective?.opponent())
    }

    pub fn side(&self, player: Player) -> Option<&SideState> {
        self.sides[player_to_index(player)].as_ref()
    }

    pub fn side_mut(&mut self, player: Player) -> Option<&mut SideState> {
        self.sides[player_to_index(player)].as_mut()
    }

    pub fn get_or_create_side(&mut self, player: Player, username: &str) -> &mut SideState {
        let slots = self.active_slots();
        let side = self.sides[player_to_index(player)]
            .get_or_insert_with(|| SideState::new(player, username, slots));
        if side.username.is_empty() && !username.is_empty() {
            side.username = username.to_string();
        }
        side
    }

    pub fn sides(&self) -> impl Iterator<Item = &SideState> {
        self.sides.iter().flatten()
    }

    pub(crate) fn sides_mut(&mut self) -> impl Iterator<Item = &mut SideState> {
        self.sides.iter_mut().flatten()
    }

    /// Active slots per side for the current game type
    pub fn active_slots(&self) -> usize {
        match self.game_type {
            Some(GameType::Doubles) | Some(GameType::Multi) => 2,
            Some(GameType::Triples) => 3,
            _ => 1,
        }
    }

    pub fn set_game_type(&mut self, game_type: GameType) {
        self.game_type = Some(game_type);
        let slots = self.active_slots();
        for side in self.sides_mut() {
            side.set_active_slots(slots);
        }
    }

    /// Our active Pokemon in singles
    pub fn my_active(&self) -> Option<&PokemonState> {
        self.me()?.active_pokemon()
    }

    /// The opponent's active Pokemon in singles
    pub fn opponent_active(&self) -> Option<&PokemonState> {
        self.opponent()?.active_pokemon()
    }

    /// Whether our tracked active Pokemon has fainted and must be replaced
    pub fn my_active_fainted(&self) -> bool {
        self.my_active().is_some_and(|p| p.fainted)
    }

    /// Observed outcomes of moves used by `player`
    pub fn matchups_for(&self, player: Player) -> impl Iterator<Item = &Matchup> {
        self.matchups.iter().filter(move |m| m.attacker == player)
    }

    pub fn is_active(&self) -> bool {
        self.turn > 0 && !self.ended
    }
}

impl Default for BattleState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn player_to_index(player: Player) -> usize {
    match player {
        Player::P1 => 0,
        Player::P2 => 1,
    }
}

/// Slot index for a position letter; `None` for letters past the third slot
pub fn position_to_slot(pos: char) -> Option<usize> {
    match pos {
        'a' => Some(0),
        'b' => Some(1),
        'c' => Some(2),
        _ => None,
    }
}
