//! Server-to-client messages
//!
//! A websocket frame holds one or more lines. When the first line is
//! `>ROOMID`, every following line belongs to that room. Lines are
//! pipe-delimited; anything this crate does not model is kept as
//! [`ServerMessage::Raw`] so callers can still log or forward it.

mod battle;
mod battle_init;
mod battle_major;
mod battle_minor;
mod battle_progress;
mod global;
mod request;
mod room;

pub use battle::{GameType, HpStatus, Player, Pokemon, PokemonDetails, Side, Stat};
pub use request::{
    ActivePokemon, BattleRequest, MoveSlot, PokemonStats, SideInfo, SidePokemon,
};

use crate::ParseError;
use anyhow::Result;
use serde::Deserialize;
use std::collections::HashMap;

/// A user as shown by the server: rank symbol followed by the name,
/// optionally suffixed with `@STATUS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub rank: char,
    pub username: String,
    pub status: Option<String>,
}

impl User {
    /// Parse a user string like " Alice", "@Bob" or "+Carol@!"
    pub fn parse(s: &str) -> Option<Self> {
        let mut chars = s.chars();
        let rank = chars.next()?;
        let rest = chars.as_str();
        let (username, status) = match rest.split_once('@') {
            Some((name, status)) => (name, Some(status.to_string())),
            None => (rest, None),
        };
        let username = username.trim();
        if username.is_empty() {
            return None;
        }

        Some(User {
            rank,
            username: username.to_string(),
            status,
        })
    }

    /// Showdown user id: lowercase alphanumerics only
    pub fn id(&self) -> String {
        to_id(&self.username)
    }
}

/// Normalize a name into a Showdown id ("Great Tusk" -> "greattusk")
pub fn to_id(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomType {
    Chat,
    Battle,
}

/// Payload of `|updatechallenges|`
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeState {
    /// Incoming challenges keyed by user id, valued by format
    #[serde(default)]
    pub challenges_from: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    // === Global ===
    Challstr(String),
    UpdateUser {
        user: User,
        named: bool,
        avatar: String,
    },
    NameTaken {
        username: String,
        message: String,
    },
    Popup(String),
    UpdateChallenges(ChallengeState),

    // === Room ===
    Init(RoomType),
    DeInit,
    NoInit {
        reason: String,
        message: String,
    },
    Title(String),

    // === Battle initialization ===
    BattlePlayer {
        player: Player,
        username: String,
        avatar: String,
        rating: Option<u32>,
    },
    TeamSize {
        player: Player,
        size: u8,
    },
    GameType(GameType),
    Gen(u8),
    Tier(String),
    Rated(Option<String>),
    BattleStart,

    // === Battle progress ===
    Request(Box<BattleRequest>),
    Inactive(String),
    InactiveOff(String),
    Upkeep,
    Turn(u32),
    Win(String),
    Tie,
    Error(String),

    // === Major actions ===
    Move {
        pokemon: Pokemon,
        move_name: String,
        target: Option<Pokemon>,
        miss: bool,
        still: bool,
        from: Option<String>,
    },
    Switch {
        pokemon: Pokemon,
        details: PokemonDetails,
        hp_status: Option<HpStatus>,
    },
    Drag {
        pokemon: Pokemon,
        details: PokemonDetails,
        hp_status: Option<HpStatus>,
    },
    DetailsChange {
        pokemon: Pokemon,
        details: PokemonDetails,
        hp_status: Option<HpStatus>,
    },
    Replace {
        pokemon: Pokemon,
        details: PokemonDetails,
        hp_status: Option<HpStatus>,
    },
    Cant {
        pokemon: Pokemon,
        reason: String,
        move_name: Option<String>,
    },
    Faint(Pokemon),

    // === Minor actions ===
    Damage {
        pokemon: Pokemon,
        hp_status: Option<HpStatus>,
    },
    Heal {
        pokemon: Pokemon,
        hp_status: Option<HpStatus>,
    },
    SetHp {
        pokemon: Pokemon,
        hp_status: Option<HpStatus>,
    },
    Status {
        pokemon: Pokemon,
        status: String,
    },
    CureStatus {
        pokemon: Pokemon,
        status: String,
    },
    CureTeam(Pokemon),
    Boost {
        pokemon: Pokemon,
        stat: Stat,
        amount: i8,
    },
    Unboost {
        pokemon: Pokemon,
        stat: Stat,
        amount: i8,
    },
    SetBoost {
        pokemon: Pokemon,
        stat: Stat,
        amount: i8,
    },
    SwapBoost {
        source: Pokemon,
        target: Pokemon,
        stats: Vec<Stat>,
    },
    InvertBoost(Pokemon),
    ClearBoost(Pokemon),
    ClearAllBoost,
    ClearPositiveBoost {
        target: Pokemon,
    },
    ClearNegativeBoost(Pokemon),
    CopyBoost {
        source: Pokemon,
        target: Pokemon,
    },
    Weather {
        weather: String,
        upkeep: bool,
    },
    FieldStart(String),
    FieldEnd(String),
    SideStart {
        side: Side,
        condition: String,
    },
    SideEnd {
        side: Side,
        condition: String,
    },
    SwapSideConditions,
    VolatileStart {
        pokemon: Pokemon,
        effect: String,
    },
    VolatileEnd {
        pokemon: Pokemon,
        effect: String,
    },
    SuperEffective(Pokemon),
    Resisted(Pokemon),
    Immune(Pokemon),
    Item {
        pokemon: Pokemon,
        item: String,
    },
    EndItem {
        pokemon: Pokemon,
        item: String,
    },
    Ability {
        pokemon: Pokemon,
        ability: String,
    },
    EndAbility(Pokemon),
    Transform {
        pokemon: Pokemon,
        species: String,
    },
    FormeChange {
        pokemon: Pokemon,
        species: String,
        hp_status: Option<HpStatus>,
    },
    Mega(Pokemon),
    Terastallize {
        pokemon: Pokemon,
        tera_type: String,
    },
    MustRecharge(Pokemon),

    Raw(String),
}

impl ServerMessage {
    /// Whether this message is part of a battle room's replayable log.
    ///
    /// Requests, errors and timer notices may be addressed to one player
    /// and are not replayed when the room is re-joined; room chrome (init,
    /// title, chat) carries no battle state.
    pub fn is_battle_log(&self) -> bool {
        !matches!(
            self,
            ServerMessage::Challstr(_)
                | ServerMessage::UpdateUser { .. }
                | ServerMessage::NameTaken { .. }
                | ServerMessage::Popup(_)
                | ServerMessage::UpdateChallenges(_)
                | ServerMessage::Init(_)
                | ServerMessage::DeInit
                | ServerMessage::NoInit { .. }
                | ServerMessage::Title(_)
                | ServerMessage::Request(_)
                | ServerMessage::Inactive(_)
                | ServerMessage::InactiveOff(_)
                | ServerMessage::Error(_)
                | ServerMessage::Raw(_)
        )
    }

    /// Whether this message ends the battle
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServerMessage::Win(_) | ServerMessage::Tie)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerFrame {
    pub room_id: Option<String>,
    pub messages: Vec<ServerMessage>,
}

/// Parse a complete WebSocket frame into structured messages
pub fn parse_server_frame(frame: &str) -> Result<ServerFrame> {
    let mut lines = frame.lines();
    let mut room_id = None;

    // Check if first line is >ROOMID
    if let Some(first_line) = lines.clone().next()
        && let Some(room) = first_line.strip_prefix('>')
    {
        room_id = Some(room.trim().to_string());
        lines.next();
    }

    let messages: Vec<ServerMessage> = lines
        .filter(|line| !line.trim().is_empty())
        .map(parse_server_message)
        .collect::<Result<Vec<_>>>()?;

    Ok(ServerFrame { room_id, messages })
}

/// Parse a single line from the server into a ServerMessage
pub fn parse_server_message(line: &str) -> Result<ServerMessage> {
    let line = line.trim_end_matches(['\r', '\n']);

    if line.is_empty() {
        return Ok(ServerMessage::Raw(String::new()));
    }

    if !line.starts_with('|') {
        return Ok(ServerMessage::Raw(line.to_string()));
    }

    let parts: Vec<&str> = line.split('|').collect();

    if parts.len() < 2 {
        return Ok(ServerMessage::Raw(line.to_string()));
    }

    match parts[1] {
        // Global
        "challstr" => global::parse_challstr(&parts),
        "updateuser" => global::parse_updateuser(&parts),
        "nametaken" => global::parse_nametaken(&parts),
        "popup" => global::parse_popup(&parts),
        "updatechallenges" => global::parse_updatechallenges(&parts),

        // Room
        "init" => room::parse_init(&parts),
        "deinit" => Ok(ServerMessage::DeInit),
        "noinit" => room::parse_noinit(&parts),
        "title" => room::parse_title(&parts),

        // Battle initialization
        "player" => battle_init::parse_player(&parts),
        "teamsize" => battle_init::parse_teamsize(&parts),
        "gametype" => battle_init::parse_gametype(&parts),
        "gen" => battle_init::parse_gen(&parts),
        "tier" => battle_init::parse_tier(&parts),
        "rated" => battle_init::parse_rated(&parts),
        "start" => Ok(ServerMessage::BattleStart),

        // Battle progress
        "request" => battle_progress::parse_request(&parts, line),
        "inactive" => battle_progress::parse_inactive(&parts),
        "inactiveoff" => battle_progress::parse_inactiveoff(&parts),
        "upkeep" => Ok(ServerMessage::Upkeep),
        "turn" => battle_progress::parse_turn(&parts),
        "win" => battle_progress::parse_win(&parts),
        "tie" => Ok(ServerMessage::Tie),
        "error" => battle_progress::parse_error(&parts),

        // Major actions
        "move" => battle_major::parse_move(&parts),
        "switch" => battle_major::parse_switch(&parts),
        "drag" => battle_major::parse_drag(&parts),
        "detailschange" => battle_major::parse_detailschange(&parts),
        "replace" => battle_major::parse_replace(&parts),
        "cant" => battle_major::parse_cant(&parts),
        "faint" => battle_major::parse_faint(&parts),

        // Minor actions
        "-damage" => battle_minor::parse_damage(&parts),
        "-heal" => battle_minor::parse_heal(&parts),
        "-sethp" => battle_minor::parse_sethp(&parts),
        "-status" => battle_minor::parse_status(&parts),
        "-curestatus" => battle_minor::parse_curestatus(&parts),
        "-cureteam" => battle_minor::parse_cureteam(&parts),
        "-boost" => battle_minor::parse_boost(&parts),
        "-unboost" => battle_minor::parse_unboost(&parts),
        "-setboost" => battle_minor::parse_setboost(&parts),
        "-swapboost" => battle_minor::parse_swapboost(&parts),
        "-invertboost" => battle_minor::parse_invertboost(&parts),
        "-clearboost" => battle_minor::parse_clearboost(&parts),
        "-clearallboost" => Ok(ServerMessage::ClearAllBoost),
        "-clearpositiveboost" => battle_minor::parse_clearpositiveboost(&parts),
        "-clearnegativeboost" => battle_minor::parse_clearnegativeboost(&parts),
        "-copyboost" => battle_minor::parse_copyboost(&parts),
        "-weather" => battle_minor::parse_weather(&parts),
        "-fieldstart" => battle_minor::parse_fieldstart(&parts),
        "-fieldend" => battle_minor::parse_fieldend(&parts),
        "-sidestart" => battle_minor::parse_sidestart(&parts),
        "-sideend" => battle_minor::parse_sideend(&parts),
        "-swapsideconditions" => Ok(ServerMessage::SwapSideConditions),
        "-start" => battle_minor::parse_start(&parts),
        "-end" => battle_minor::parse_end(&parts),
        "-supereffective" => battle_minor::parse_supereffective(&parts),
        "-resisted" => battle_minor::parse_resisted(&parts),
        "-immune" => battle_minor::parse_immune(&parts),
        "-item" => battle_minor::parse_item(&parts),
        "-enditem" => battle_minor::parse_enditem(&parts),
        "-ability" => battle_minor::parse_ability(&parts),
        "-endability" => battle_minor::parse_endability(&parts),
        "-transform" => battle_minor::parse_transform(&parts),
        "-formechange" => battle_minor::parse_formechange(&parts),
        "-mega" => battle_minor::parse_mega(&parts),
        "-terastallize" => battle_minor::parse_terastallize(&parts),
        "-mustrecharge" => battle_minor::parse_mustrecharge(&parts),

        _ => Ok(ServerMessage::Raw(line.to_string())),
    }
}

/// Require a field at `index`, failing with a named MissingField error
pub(crate) fn required<'a>(parts: &[&'a str], index: usize, name: &str) -> Result<&'a str> {
    parts
        .get(index)
        .copied()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ParseError::MissingField(name.to_string()).into())
}
