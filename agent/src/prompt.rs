//! Prompt text and output schema for the model

use pokellm_battle::{
    BattleState, Effectiveness, LegalAction, LegalActionSet, PokemonState, SideState,
};
use serde_json::{Value, json};

use crate::engine::{DecisionFailure, HistoryEntry};

pub const SYSTEM_PROMPT: &str = "You are a master Pokémon battler playing a singles battle on \
Pokémon Showdown. Each turn you are shown the battle state and the exact list of actions \
available to you. Pick the action most likely to win the battle. Answer with exactly one \
action from the list, written exactly as listed, and nothing else.";

/// Decisions shown to the model, newest last
const HISTORY_SHOWN: usize = 5;

/// JSON schema restricting the answer to one of `labels`
pub fn action_schema(labels: &[String]) -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": { "type": "string", "enum": labels }
        },
        "required": ["action"]
    })
}

/// Prompt for a regular turn: moves and, unless trapped, switches
pub fn build_turn_prompt(
    state: &BattleState,
    candidates: &LegalActionSet,
    history: &[HistoryEntry],
) -> String {
    let mut lines = vec![format!("Turn {}.", state.turn)];

    if let Some(last) = state.my_active().and_then(|p| p.last_move.as_deref()) {
        lines.push(format!(
            "Your last move was {}. DO NOT repeatedly use the same move unless it is clearly the best option.",
            last
        ));
    }

    if let Some(me) = state.my_active() {
        lines.push(format!("Your active Pokémon: {}.", describe(me)));
    }
    if let Some(opponent) = state.opponent_active() {
        lines.push(format!("Opponent's active Pokémon: {}.", describe(opponent)));
    }

    lines.push(String::new());
    lines.push("Battle state:".to_string());
    lines.extend(battle_summary(state));

    let recent = recent_decisions(history);
    if !recent.is_empty() {
        lines.push(String::new());
        lines.push(format!("Your recent decisions: {}.", recent));
    }

    lines.push(String::new());
    lines.push(
        "Choose a MOVE or a tactical SWITCH. Prioritize super-effective moves that share a type \
         with your Pokémon. Switch when your active Pokémon is outmatched and a teammate handles \
         the opponent better."
            .to_string(),
    );
    lines.push(String::new());
    lines.push(format!("Your ONLY available actions are: {}", label_list(candidates)));
    lines.extend(annotated_actions(state, candidates));
    lines.push(String::new());
    lines.push(r#"Answer as {"action": "<one of the actions above>"}."#.to_string());

    lines.join("\n")
}

/// Prompt for replacing a fainted or pivoting Pokemon
pub fn build_switch_prompt(state: &BattleState, candidates: &LegalActionSet) -> String {
    let mut lines = Vec::new();

    if let Some(opponent) = state.opponent_active() {
        lines.push(format!("Opponent's active Pokémon: {}.", describe(opponent)));
    }
    lines.push(String::new());
    lines.push("Battle state:".to_string());
    lines.extend(battle_summary(state));
    lines.push(String::new());
    lines.push(
        "You MUST choose a replacement from ONLY the list below. Pick the Pokémon that best \
         handles the opponent's active Pokémon."
            .to_string(),
    );
    lines.push(format!("Your ONLY available actions are: {}", label_list(candidates)));
    lines.extend(annotated_actions(state, candidates));
    lines.push(String::new());
    lines.push(r#"Answer as {"action": "<one of the actions above>"}."#.to_string());

    lines.join("\n")
}

/// `base` again, with the rejected answer and the exact choices spelled out
pub fn corrective_prompt(
    base: &str,
    rejected: &str,
    failure: &DecisionFailure,
    candidates: &LegalActionSet,
) -> String {
    let problem = match failure {
        DecisionFailure::IllegalActionChosen(label) => {
            format!("\"{}\" is not one of your available actions.", label)
        }
        _ => "It could not be read as a single action.".to_string(),
    };
    format!(
        "{}\n\nYour previous answer was: {}\n{}\nAnswer again with exactly one of: {}",
        base,
        rejected.trim(),
        problem,
        label_list(candidates)
    )
}

fn label_list(candidates: &LegalActionSet) -> String {
    candidates.labels().join(", ")
}

/// "Pikachu (62% HP, paralyzed, +2 spa, seeded)"
fn describe(pokemon: &PokemonState) -> String {
    let mut traits = vec![format!("{}% HP", pokemon.hp_percent())];
    if let Some(status) = pokemon.status {
        traits.push(status.to_string());
    }
    for (stat, stage) in pokemon.boosts.changed() {
        traits.push(format!("{:+} {}", stage, stat.as_str()));
    }
    let mut volatiles: Vec<&str> = pokemon.volatiles.iter().map(|v| v.label()).collect();
    volatiles.sort_unstable();
    traits.extend(volatiles.into_iter().map(str::to_string));
    if pokemon.terastallized
        && let Some(tera) = &pokemon.tera_type
    {
        traits.push(format!("terastallized {}", tera));
    }
    format!("{} ({})", pokemon.species, traits.join(", "))
}

fn battle_summary(state: &BattleState) -> Vec<String> {
    let mut lines = Vec::new();

    let weather = state
        .field
        .weather
        .map_or_else(|| "none".to_string(), |w| w.to_string());
    let terrain = state
        .field
        .terrain
        .map_or_else(|| "none".to_string(), |t| t.to_string());
    lines.push(format!("- Weather: {}. Terrain: {}.", weather, terrain));
    let effects = state.field.effects();
    if !effects.is_empty() {
        lines.push(format!("- Field: {}.", effects.join(", ")));
    }

    if let Some(me) = state.me() {
        lines.push(format!("- Your side: {}.", conditions(me)));
        let bench: Vec<String> = me.bench().map(describe).collect();
        if bench.is_empty() {
            lines.push("- Your bench: nobody left to switch to.".to_string());
        } else {
            lines.push(format!("- Your bench: {}.", bench.join("; ")));
        }
    }

    if let Some(opponent) = state.opponent() {
        lines.push(format!("- Opponent's side: {}.", conditions(opponent)));
        let seen: Vec<String> = opponent
            .pokemon
            .iter()
            .map(|p| {
                if p.fainted {
                    format!("{} (fainted)", p.species)
                } else {
                    format!("{} ({}% HP)", p.species, p.hp_percent())
                }
            })
            .collect();
        let unrevealed = opponent
            .unrevealed_count()
            .map(|n| format!(", {} not yet seen", n))
            .unwrap_or_default();
        lines.push(format!(
            "- Opponent's revealed Pokémon: {}; {} fainted{}.",
            seen.join(", "),
            opponent.fainted_count(),
            unrevealed
        ));
    }

    let observed: Vec<String> = state
        .matchups
        .iter()
        .map(|m| {
            let outcome = match m.effectiveness {
                Effectiveness::SuperEffective => "super effective",
                Effectiveness::Resisted => "resisted",
                Effectiveness::Immune => "no effect",
            };
            format!(
                "{}'s {} on {}: {}",
                m.attacker_species, m.move_id, m.defender_species, outcome
            )
        })
        .collect();
    if !observed.is_empty() {
        lines.push(format!("- Observed so far: {}.", observed.join("; ")));
    }

    lines
}

fn conditions(side: &SideState) -> String {
    if side.conditions.is_empty() {
        return "no hazards or screens".to_string();
    }
    side.conditions
        .iter()
        .map(|(condition, layers)| {
            if condition.max_layers() > 1 {
                format!("{} x{}", condition, layers)
            } else {
                condition.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn recent_decisions(history: &[HistoryEntry]) -> String {
    let start = history.len().saturating_sub(HISTORY_SHOWN);
    history[start..]
        .iter()
        .map(|entry| format!("turn {}: {}", entry.turn, entry.label))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One line per candidate with what is known about it
fn annotated_actions(state: &BattleState, candidates: &LegalActionSet) -> Vec<String> {
    let opponent = state.opponent_active();
    let me = state.my_active();
    let slots = state
        .request
        .as_ref()
        .and_then(|r| r.active.as_ref())
        .and_then(|a| a.first());

    candidates
        .iter()
        .map(|action| match action {
            LegalAction::UseMove { id, name, .. } => {
                let mut notes = vec![name.clone()];
                if let Some(slot) = slots.and_then(|s| s.moves.iter().find(|m| &m.id == id))
                    && let (Some(pp), Some(max)) = (slot.pp, slot.max_pp)
                {
                    notes.push(format!("{}/{} PP", pp, max));
                }
                let seen = state.matchups.iter().find(|m| {
                    &m.move_id == id
                        && me.is_some_and(|p| p.species == m.attacker_species)
                        && opponent.is_some_and(|o| o.species == m.defender_species)
                });
                match seen.map(|m| m.effectiveness) {
                    Some(Effectiveness::SuperEffective) => {
                        notes.push("was super effective on this target".to_string())
                    }
                    Some(Effectiveness::Resisted) => {
                        notes.push("was resisted by this target".to_string())
                    }
                    Some(Effectiveness::Immune) => {
                        notes.push("had no effect on this target".to_string())
                    }
                    None => {}
                }
                format!("- {}: {}", action.label(), notes.join(", "))
            }
            LegalAction::Switch { species, .. } => {
                let teammate = state
                    .me()
                    .and_then(|side| side.pokemon.iter().find(|p| &p.species == species));
                match teammate {
                    Some(p) => format!("- {}: {}", action.label(), describe(p)),
                    None => format!("- {}: {}", action.label(), species),
                }
            }
        })
        .collect()
}
