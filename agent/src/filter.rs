//! Tactical pruning of the legal set before the model sees it
//!
//! Only what the protocol reveals is used: move ids, HP fractions, statuses,
//! volatiles, field and side conditions, and the moves used last turn.

use pokellm_battle::{
    BattleState, Effectiveness, LegalAction, LegalActionSet, Player, PokemonState, SideCondition,
    Stat, Status, Volatile,
};
use pokellm_protocol::to_id;
use tracing::debug;

use crate::engine::HistoryEntry;

const HEALING: &[&str] = &[
    "healorder",
    "milkdrink",
    "moonlight",
    "morningsun",
    "recover",
    "rest",
    "roost",
    "shoreup",
    "slackoff",
    "softboiled",
    "swallow",
    "synthesis",
];

const PROTECTING: &[&str] = &[
    "protect",
    "detect",
    "spikyshield",
    "kingsshield",
    "banefulbunker",
    "obstruct",
    "burningbulwark",
    "silktrap",
];

/// Moves that backfire when repeated the very next turn
const NO_REPEAT: &[&str] = &["wish", "yawn", "trickroom"];

const RECHARGE: &[&str] = &[
    "hyperbeam",
    "gigaimpact",
    "rockwrecker",
    "frenzyplant",
    "blastburn",
    "hydrocannon",
    "roaroftime",
    "eternabeam",
];

const PIVOTS: &[&str] = &["batonpass", "teleport", "flipturn", "voltswitch", "uturn", "partingshot"];

const STATUSING: &[&str] = &[
    "glare",
    "poisonpowder",
    "poisongas",
    "stunspore",
    "thunderwave",
    "toxic",
    "willowisp",
    "darkvoid",
    "grasswhistle",
    "hypnosis",
    "lovelykiss",
    "sing",
    "sleeppowder",
    "spore",
    "yawn",
];

const SLEEPING: &[&str] = &[
    "darkvoid",
    "grasswhistle",
    "hypnosis",
    "lovelykiss",
    "sing",
    "sleeppowder",
    "spore",
    "yawn",
];

const TRAPPING: &[&str] = &[
    "bind",
    "clamp",
    "firespin",
    "infestation",
    "sandtomb",
    "snaptrap",
    "thundercage",
    "whirlpool",
    "wrap",
];

const SELF_KO: &[&str] = &["explosion", "selfdestruct", "mistyexplosion"];

const CLERIC: &[&str] = &["healbell", "aromatherapy"];

/// Setup moves and the stages at which they stop being worth a turn
const SETUP: &[(&str, &[(Stat, i8)])] = &[
    ("swordsdance", &[(Stat::Atk, 2)]),
    ("nastyplot", &[(Stat::Spa, 2)]),
    ("irondefense", &[(Stat::Def, 2)]),
    ("acidarmor", &[(Stat::Def, 2)]),
    ("amnesia", &[(Stat::Spd, 2)]),
    ("agility", &[(Stat::Spe, 2)]),
    ("rockpolish", &[(Stat::Spe, 2)]),
    ("bulkup", &[(Stat::Atk, 1), (Stat::Def, 1)]),
    ("coil", &[(Stat::Atk, 1), (Stat::Def, 1)]),
    ("dragondance", &[(Stat::Atk, 1), (Stat::Spe, 1)]),
    ("calmmind", &[(Stat::Spa, 1), (Stat::Spd, 1)]),
    ("quiverdance", &[(Stat::Spa, 1), (Stat::Spd, 1), (Stat::Spe, 1)]),
];

/// Opponent HP at or below which a move already seen to be super effective
/// against it is the only move offered
const FINISHING_HP: f32 = 0.35;

/// Candidates worth offering to the model: `legal` minus tactically poor
/// actions. Falls back to `legal` unchanged rather than return nothing.
pub fn prune(
    state: &BattleState,
    legal: &LegalActionSet,
    history: &[HistoryEntry],
    hold_after_switch: bool,
) -> LegalActionSet {
    let hold = hold_after_switch && switched_last_turn(history, legal.turn);
    let has_moves = legal.iter().any(|a| !a.is_switch());

    let kept = legal.filter(|action| match action {
        LegalAction::UseMove { id, .. } => match poor_move(state, id) {
            Some(reason) => {
                debug!(action = %id, reason, "Pruned move");
                false
            }
            None => true,
        },
        LegalAction::Switch { species, .. } => {
            if hold && has_moves {
                return false;
            }
            let weak = weak_switch_in(state, species);
            if weak {
                debug!(species = %species, "Pruned switch into a known super effective move");
            }
            !weak
        }
    });
    if kept.is_empty() {
        return legal.clone();
    }

    let finishers = kept.filter(|action| action.move_id().is_some_and(|id| finishes(state, id)));
    if !finishers.is_empty() {
        debug!(moves = ?finishers.labels(), "Opponent is low, offering only finishing moves");
        return finishers;
    }

    if threatened(state) {
        let switches = kept.filter(LegalAction::is_switch);
        if !switches.is_empty() {
            debug!("Active Pokemon faces a known super effective move, offering only switches");
            return switches;
        }
    }

    kept
}

/// Whether `attacker`'s `move_id` was seen to hit `defender` super effectively
fn seen_super_effective(
    state: &BattleState,
    attacker: Player,
    attacker_species: &str,
    move_id: Option<&str>,
    defender_species: &str,
) -> bool {
    state.matchups_for(attacker).any(|m| {
        m.effectiveness == Effectiveness::SuperEffective
            && to_id(&m.attacker_species) == to_id(attacker_species)
            && to_id(&m.defender_species) == to_id(defender_species)
            && move_id.is_none_or(|id| m.move_id == id)
    })
}

/// The opponent's active Pokemon already hit `species` super effectively
fn weak_switch_in(state: &BattleState, species: &str) -> bool {
    let (Some(us), Some(opponent)) = (state.perspective(), state.opponent_active()) else {
        return false;
    };
    seen_super_effective(state, us.opponent(), &opponent.species, None, species)
}

/// `move_id` was super effective against the opponent's active Pokemon,
/// which is now low enough to finish
fn finishes(state: &BattleState, move_id: &str) -> bool {
    let (Some(us), Some(me), Some(opponent)) =
        (state.perspective(), state.my_active(), state.opponent_active())
    else {
        return false;
    };
    opponent.hp_fraction() <= FINISHING_HP
        && seen_super_effective(state, us, &me.species, Some(move_id), &opponent.species)
}

/// The opponent's active Pokemon has a move seen to be super effective
/// against ours
fn threatened(state: &BattleState) -> bool {
    let (Some(us), Some(me), Some(opponent)) =
        (state.perspective(), state.my_active(), state.opponent_active())
    else {
        return false;
    };
    seen_super_effective(state, us.opponent(), &opponent.species, None, &me.species)
}

fn switched_last_turn(history: &[HistoryEntry], turn: u32) -> bool {
    history
        .last()
        .is_some_and(|entry| entry.voluntary_switch && entry.turn + 1 >= turn)
}

/// Why using `id` now would waste the turn, if it would
fn poor_move(state: &BattleState, id: &str) -> Option<&'static str> {
    let me = state.my_active()?;
    let opponent = state.opponent_active();
    let my_side = state.me()?;
    let their_side = state.opponent();
    let weather = state.field.weather;
    let last = me.last_move.as_deref();

    if HEALING.contains(&id) && me.hp_fraction() >= 0.66 {
        return Some("hp already high");
    }
    if PROTECTING.contains(&id) && last.is_some_and(|m| PROTECTING.contains(&m)) {
        return Some("protected last turn");
    }
    if NO_REPEAT.contains(&id) && last == Some(id) {
        return Some("used last turn");
    }
    if RECHARGE.contains(&id) {
        return Some("must recharge after");
    }
    if PIVOTS.contains(&id) && my_side.bench().next().is_none() {
        return Some("nothing to switch to");
    }

    match id {
        "solarbeam" | "solarblade" if !weather.is_some_and(|w| w.is_sunny()) => {
            return Some("no sun");
        }
        "electroshot" if !weather.is_some_and(|w| w.is_rainy()) => return Some("no rain"),
        "auroraveil" if !weather.is_some_and(|w| w.is_icy()) => return Some("no hail or snow"),
        "weatherball" if weather.is_none() => return Some("no weather"),
        "substitute" if me.has_volatile(&Volatile::Substitute) => {
            return Some("substitute already up");
        }
        "sleeptalk" if me.status != Some(Status::Sleep) => {
            return Some("not asleep");
        }
        "trickroom" if state.field.trick_room => return Some("trick room already up"),
        _ => {}
    }

    if let Some(condition) = SideCondition::from_protocol(id) {
        let (side, max) = if condition.is_hazard() {
            (their_side, condition.max_layers())
        } else {
            (Some(my_side), 1)
        };
        if side.is_some_and(|s| s.layers(condition) >= max) {
            return Some("already set");
        }
    }
    if matches!(id, "rapidspin" | "mortalspin")
        && !my_side.conditions.keys().any(SideCondition::is_hazard)
    {
        return Some("no hazards to clear");
    }
    if id == "defog"
        && !my_side.conditions.keys().any(SideCondition::is_hazard)
        && their_side.is_none_or(|s| s.conditions.is_empty())
    {
        return Some("nothing to clear");
    }

    if let Some((_, caps)) = SETUP.iter().find(|(setup, _)| *setup == id)
        && caps.iter().all(|&(stat, cap)| me.boosts.get(stat) >= cap)
    {
        return Some("already boosted");
    }
    if id == "shellsmash"
        && (me.boosts.get(Stat::Atk) >= 2 || me.boosts.get(Stat::Spa) >= 2)
        && me.boosts.get(Stat::Spe) >= 2
    {
        return Some("already boosted");
    }

    if SELF_KO.contains(&id)
        && !(me.hp_fraction() < 0.34 && opponent.is_some_and(|o| o.hp_fraction() > 0.66))
    {
        return Some("not a favorable trade");
    }
    if CLERIC.contains(&id) && !my_side.any_statused() {
        return Some("no teammate statused");
    }

    if let Some(reason) = opponent.and_then(|o| poor_against(o, id)) {
        return Some(reason);
    }
    if SLEEPING.contains(&id)
        && their_side.is_some_and(|s| {
            s.pokemon
                .iter()
                .any(|p| p.status == Some(Status::Sleep))
        })
    {
        return Some("sleep clause");
    }

    None
}

fn poor_against(target: &PokemonState, id: &str) -> Option<&'static str> {
    if STATUSING.contains(&id) && target.status.is_some() {
        return Some("target already statused");
    }
    let repeated = match id {
        "leechseed" => Some(Volatile::LeechSeed),
        "taunt" => Some(Volatile::Taunt),
        "encore" => Some(Volatile::Encore),
        _ if TRAPPING.contains(&id) => Some(Volatile::PartialTrap),
        _ => None,
    };
    if repeated.is_some_and(|v| target.has_volatile(&v)) {
        return Some("effect already active on target");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{REQUEST_HEADER, force_switch_request, tracker_with};

    /// A request for Pikachu holding `moves`, with Raichu on the bench
    fn request(moves: &[&str]) -> String {
        let slots: Vec<String> = moves
            .iter()
            .map(|m| {
                format!(
                    r#"{{"move":"{m}","id":"{m}","pp":10,"maxpp":10,"target":"normal","disabled":false}}"#
                )
            })
            .collect();
        format!(
            r#"{{"active":[{{"moves":[{}]}}],{}"#,
            slots.join(","),
            REQUEST_HEADER
        )
    }

    fn labels(log: &[&str], moves: &[&str], history: &[HistoryEntry]) -> Vec<String> {
        let tracker = tracker_with(log, &request(moves));
        let state = tracker.state();
        prune(&state, &state.legal_actions, history, true).labels()
    }

    const START: &[&str] = &[
        "|player|p1|bot|1|",
        "|player|p2|alice|2|",
        "|gametype|singles",
        "|switch|p1a: Pikachu|Pikachu, L88, M|201/201",
        "|switch|p2a: Gyarados|Gyarados, L80, F|100/100",
        "|turn|1",
    ];

    fn log(extra: &[&'static str]) -> Vec<&'static str> {
        START.iter().copied().chain(extra.iter().copied()).collect()
    }

    #[test]
    fn test_healing_at_high_hp() {
        assert_eq!(
            labels(START, &["recover", "thunderbolt"], &[]),
            vec!["thunderbolt", "switch-raichu"]
        );
        let hurt = log(&["|-damage|p1a: Pikachu|60/201"]);
        assert_eq!(
            labels(&hurt, &["recover", "thunderbolt"], &[]),
            vec!["recover", "thunderbolt", "switch-raichu"]
        );
    }

    #[test]
    fn test_no_double_protect() {
        let protected = log(&[
            "|move|p1a: Pikachu|Protect|p1a: Pikachu",
            "|turn|2",
        ]);
        assert_eq!(
            labels(&protected, &["protect", "detect", "thunderbolt"], &[]),
            vec!["thunderbolt", "switch-raichu"]
        );
    }

    #[test]
    fn test_weather_moves() {
        assert_eq!(
            labels(START, &["solarbeam", "weatherball", "thunderbolt"], &[]),
            vec!["thunderbolt", "switch-raichu"]
        );
        let sunny = log(&["|-weather|SunnyDay"]);
        assert_eq!(
            labels(&sunny, &["solarbeam", "weatherball", "thunderbolt"], &[]),
            vec!["solarbeam", "weatherball", "thunderbolt", "switch-raichu"]
        );
    }

    #[test]
    fn test_hazards_at_max_layers() {
        let rocks = log(&["|-sidestart|p2: alice|move: Stealth Rock"]);
        assert_eq!(
            labels(&rocks, &["stealthrock", "spikes"], &[]),
            vec!["spikes", "switch-raichu"]
        );
    }

    #[test]
    fn test_status_against_statused_target() {
        let burned = log(&["|-status|p2a: Gyarados|brn"]);
        assert_eq!(
            labels(&burned, &["thunderwave", "thunderbolt"], &[]),
            vec!["thunderbolt", "switch-raichu"]
        );
    }

    #[test]
    fn test_setup_when_boosted() {
        let boosted = log(&["|-boost|p1a: Pikachu|spa|2"]);
        assert_eq!(
            labels(&boosted, &["nastyplot", "thunderbolt"], &[]),
            vec!["thunderbolt", "switch-raichu"]
        );
    }

    #[test]
    fn test_hold_after_voluntary_switch() {
        let history = [HistoryEntry {
            turn: 0,
            label: "switch-pikachu".to_string(),
            voluntary_switch: true,
            fallback: false,
        }];
        assert_eq!(
            labels(START, &["thunderbolt"], &history),
            vec!["thunderbolt"]
        );
    }

    #[test]
    fn test_never_prunes_to_empty() {
        assert_eq!(
            labels(START, &["recover"], &[HistoryEntry {
                turn: 1,
                label: "switch-pikachu".to_string(),
                voluntary_switch: true,
                fallback: false,
            }]),
            vec!["recover", "switch-raichu"]
        );
    }

    /// Gyarados Earthquake was super effective on Raichu, then Pikachu came back
    const RAICHU_HIT: &[&str] = &[
        "|switch|p1a: Raichu|Raichu, L86|250/250",
        "|move|p2a: Gyarados|Earthquake|p1a: Raichu",
        "|-supereffective|p1a: Raichu",
        "|-damage|p1a: Raichu|60/250",
        "|switch|p1a: Pikachu|Pikachu, L88, M|201/201",
        "|turn|2",
    ];

    #[test]
    fn test_switch_into_known_weakness() {
        let hit = log(RAICHU_HIT);
        assert_eq!(
            labels(&hit, &["thunderbolt", "voltswitch"], &[]),
            vec!["thunderbolt", "voltswitch"]
        );
    }

    #[test]
    fn test_weak_switch_in_kept_when_it_is_the_only_one() {
        let mut fainted = log(RAICHU_HIT);
        fainted.extend([
            "|move|p2a: Gyarados|Waterfall|p1a: Pikachu",
            "|-damage|p1a: Pikachu|0 fnt",
            "|faint|p1a: Pikachu",
        ]);

        let tracker = tracker_with(&fainted, &force_switch_request(1));
        let state = tracker.state();
        assert_eq!(
            prune(&state, &state.legal_actions, &[], true).labels(),
            vec!["switch-raichu"]
        );

        let tracker = tracker_with(&fainted, &force_switch_request(2));
        let state = tracker.state();
        assert_eq!(
            prune(&state, &state.legal_actions, &[], true).labels(),
            vec!["switch-jolteon"]
        );
    }

    #[test]
    fn test_finishing_move_on_low_opponent() {
        let low = log(&[
            "|move|p1a: Pikachu|Thunderbolt|p2a: Gyarados",
            "|-supereffective|p2a: Gyarados",
            "|-damage|p2a: Gyarados|30/100",
            "|turn|2",
        ]);
        assert_eq!(
            labels(&low, &["thunderbolt", "voltswitch"], &[]),
            vec!["thunderbolt"]
        );

        let healthy = log(&[
            "|move|p1a: Pikachu|Thunderbolt|p2a: Gyarados",
            "|-supereffective|p2a: Gyarados",
            "|-damage|p2a: Gyarados|60/100",
            "|turn|2",
        ]);
        assert_eq!(
            labels(&healthy, &["thunderbolt", "voltswitch"], &[]),
            vec!["thunderbolt", "voltswitch", "switch-raichu"]
        );
    }

    #[test]
    fn test_known_threat_forces_switch() {
        let threatened = log(&[
            "|move|p2a: Gyarados|Earthquake|p1a: Pikachu",
            "|-supereffective|p1a: Pikachu",
            "|-damage|p1a: Pikachu|80/201",
            "|turn|2",
        ]);
        assert_eq!(
            labels(&threatened, &["thunderbolt", "voltswitch"], &[]),
            vec!["switch-raichu"]
        );

        // switching was just done; stay in rather than offer nothing
        let history = [HistoryEntry {
            turn: 1,
            label: "switch-pikachu".to_string(),
            voluntary_switch: true,
            fallback: false,
        }];
        assert_eq!(
            labels(&threatened, &["thunderbolt", "voltswitch"], &history),
            vec!["thunderbolt", "voltswitch"]
        );
    }
}
