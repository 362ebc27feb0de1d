//! Strict reading of model answers

use pokellm_battle::{LegalAction, LegalActionSet, normalize_label};
use serde::Deserialize;

use crate::engine::DecisionFailure;

/// Longest bare answer still read as an attempt at a label
const MAX_LABEL_WORDS: usize = 4;

#[derive(Deserialize)]
struct Answer {
    action: String,
}

/// Match a raw answer to one of `candidates`.
///
/// `{"action": "<label>"}` and a bare label are accepted. A label naming a
/// legal action that was pruned from the candidates, or naming nothing, is
/// an illegal choice; anything that does not read as a label is unparseable.
pub fn parse_answer(
    raw: &str,
    candidates: &LegalActionSet,
    legal: &LegalActionSet,
) -> Result<LegalAction, DecisionFailure> {
    let text = extract(raw)?;
    let label = normalize_label(&text);
    if label.is_empty() {
        return Err(DecisionFailure::InferenceUnparseable(raw.trim().to_string()));
    }

    if let Some(action) = lookup(candidates, &label) {
        return Ok(action.clone());
    }
    if lookup(legal, &label).is_some() {
        return Err(DecisionFailure::IllegalActionChosen(label));
    }
    if text.split_whitespace().count() > MAX_LABEL_WORDS {
        return Err(DecisionFailure::InferenceUnparseable(raw.trim().to_string()));
    }
    Err(DecisionFailure::IllegalActionChosen(label))
}

/// The answer text: the `action` field of a JSON object, or the bare line
fn extract(raw: &str) -> Result<String, DecisionFailure> {
    let trimmed = raw
        .trim()
        .trim_start_matches("```json")
        .trim_matches('`')
        .trim();
    if trimmed.is_empty() {
        return Err(DecisionFailure::InferenceUnparseable("empty answer".to_string()));
    }

    if trimmed.starts_with('{') {
        return serde_json::from_str::<Answer>(trimmed)
            .map(|answer| answer.action)
            .map_err(|e| DecisionFailure::InferenceUnparseable(format!("{}: {}", trimmed, e)));
    }

    let mut lines = trimmed.lines().map(str::trim).filter(|l| !l.is_empty());
    match (lines.next(), lines.next()) {
        (Some(line), None) => Ok(line.trim_matches(['"', '\'', '.']).to_string()),
        _ => Err(DecisionFailure::InferenceUnparseable(trimmed.to_string())),
    }
}

/// Exact label, or a bare species when only switches are on offer
fn lookup<'a>(set: &'a LegalActionSet, label: &str) -> Option<&'a LegalAction> {
    set.get(label).or_else(|| {
        set.iter()
            .all(LegalAction::is_switch)
            .then(|| set.get(&format!("switch-{}", label)))
            .flatten()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(labels: &[&str]) -> LegalActionSet {
        let actions = labels
            .iter()
            .enumerate()
            .map(|(i, label)| match label.strip_prefix("switch-") {
                Some(species) => LegalAction::Switch {
                    target: i as u8 + 2,
                    species: species.to_string(),
                },
                None => LegalAction::UseMove {
                    slot: i as u8 + 1,
                    target: None,
                    id: label.to_string(),
                    name: label.to_string(),
                },
            })
            .collect();
        LegalActionSet::new(4, Some(9), actions)
    }

    #[test]
    fn test_json_answer() {
        let legal = set(&["thunderbolt", "voltswitch", "switch-raichu"]);
        let action = parse_answer(r#"{"action": "voltswitch"}"#, &legal, &legal).unwrap();
        assert_eq!(action.label(), "voltswitch");
    }

    #[test]
    fn test_bare_label_is_normalized() {
        let legal = set(&["thunderbolt", "switch-great-tusk"]);
        assert_eq!(
            parse_answer("  Switch Great Tusk.\n", &legal, &legal).unwrap().label(),
            "switch-great-tusk"
        );
        assert_eq!(
            parse_answer("\"Thunderbolt\"", &legal, &legal).unwrap().label(),
            "thunderbolt"
        );
    }

    #[test]
    fn test_fenced_json() {
        let legal = set(&["thunderbolt", "surf"]);
        let raw = "```json\n{\"action\":\"surf\"}\n```";
        assert_eq!(parse_answer(raw, &legal, &legal).unwrap().label(), "surf");
    }

    #[test]
    fn test_species_only_on_forced_switch() {
        let legal = set(&["switch-raichu", "switch-jolteon"]);
        assert_eq!(
            parse_answer("jolteon", &legal, &legal).unwrap().to_choice(),
            "switch 3"
        );

        let mixed = set(&["thunderbolt", "switch-raichu"]);
        assert_eq!(
            parse_answer("raichu", &mixed, &mixed),
            Err(DecisionFailure::IllegalActionChosen("raichu".to_string()))
        );
    }

    #[test]
    fn test_pruned_action_is_illegal() {
        let legal = set(&["thunderbolt", "recover"]);
        let candidates = legal.filter(|a| a.label() != "recover");
        assert_eq!(
            parse_answer("recover", &candidates, &legal),
            Err(DecisionFailure::IllegalActionChosen("recover".to_string()))
        );
    }

    #[test]
    fn test_unknown_label_is_illegal() {
        let legal = set(&["thunderbolt"]);
        assert_eq!(
            parse_answer(r#"{"action":"hydro pump"}"#, &legal, &legal),
            Err(DecisionFailure::IllegalActionChosen("hydro-pump".to_string()))
        );
    }

    #[test]
    fn test_unparseable_answers() {
        let legal = set(&["thunderbolt"]);
        for raw in [
            "",
            "   ",
            "I think the best move here would be thunderbolt",
            "thunderbolt\nbecause it is super effective",
            "{\"move\": \"thunderbolt\"}",
            "???",
        ] {
            assert!(
                matches!(
                    parse_answer(raw, &legal, &legal),
                    Err(DecisionFailure::InferenceUnparseable(_))
                ),
                "{:?}",
                raw
            );
        }
    }
}
