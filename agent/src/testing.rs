//! Battle fixtures and a recording sink shared by the agent's tests

use std::sync::Mutex;
use std::time::Duration;

use pokellm_battle::{BattleTracker, Update};
use pokellm_client::{RoomId, TransportError};
use pokellm_protocol::{BattleRequest, ServerMessage, parse_server_message};
use tokio::time::Instant;

use crate::engine::DecisionRequest;
use crate::submitter::BattleSink;

pub const ROOM: &str = "battle-gen9randombattle-1";

/// Our side in every fixture request: Pikachu active, Raichu benched
pub const REQUEST_HEADER: &str = r#""side":{"name":"bot","id":"p1","pokemon":[
    {"ident":"p1: Pikachu","details":"Pikachu, L88, M","condition":"201/201","active":true,"moves":["thunderbolt","voltswitch"],"baseAbility":"static","ability":"static","item":"lightball"},
    {"ident":"p1: Raichu","details":"Raichu, L86","condition":"250/250","active":false,"moves":["surf"],"baseAbility":"lightningrod","ability":"lightningrod","item":"choicespecs"}
]},"rqid":3}"#;

pub const TURN_LOG: &[&str] = &[
    "|player|p1|bot|1|",
    "|player|p2|alice|2|",
    "|teamsize|p1|2",
    "|teamsize|p2|2",
    "|gametype|singles",
    "|gen|9",
    "|start",
    "|switch|p1a: Pikachu|Pikachu, L88, M|201/201",
    "|switch|p2a: Gyarados|Gyarados, L80, F|100/100",
    "|turn|1",
];

pub fn turn_request() -> String {
    format!(
        r#"{{"active":[{{"moves":[
            {{"move":"Thunderbolt","id":"thunderbolt","pp":24,"maxpp":24,"target":"normal","disabled":false}},
            {{"move":"Volt Switch","id":"voltswitch","pp":32,"maxpp":32,"target":"normal","disabled":false}}]}}],{}"#,
        REQUEST_HEADER
    )
}

pub fn message(line: &str) -> ServerMessage {
    parse_server_message(line).unwrap()
}

pub fn request(json: &str) -> BattleRequest {
    serde_json::from_str(json).unwrap()
}

/// A tracker that received `request`, then the numbered `log`
pub fn tracker_with(log: &[&str], request_json: &str) -> BattleTracker {
    let mut tracker = BattleTracker::new();
    tracker.apply_request(request(request_json));
    for (seq, line) in log.iter().enumerate() {
        tracker.apply(&Update::new(seq as u64, message(line))).unwrap();
    }
    tracker
}

/// Pikachu vs Gyarados at turn 1, moves and one switch available
pub fn turn_tracker() -> BattleTracker {
    tracker_with(TURN_LOG, &turn_request())
}

/// Replacement request after Pikachu fainted, with `bench` (1 or 2)
/// healthy teammates
pub fn force_switch_request(bench: usize) -> String {
    let jolteon = r#",{"ident":"p1: Jolteon","details":"Jolteon, L84","condition":"230/230","active":false,"moves":["thunderbolt"],"baseAbility":"voltabsorb","ability":"voltabsorb","item":"leftovers"}"#;
    format!(
        r#"{{"forceSwitch":[true],"side":{{"name":"bot","id":"p1","pokemon":[
            {{"ident":"p1: Pikachu","details":"Pikachu, L88, M","condition":"0 fnt","active":true,"moves":["thunderbolt"],"baseAbility":"static","ability":"static","item":"lightball"}},
            {{"ident":"p1: Raichu","details":"Raichu, L86","condition":"250/250","active":false,"moves":["surf"],"baseAbility":"lightningrod","ability":"lightningrod","item":"choicespecs"}}{}
        ]}},"rqid":5}}"#,
        if bench > 1 { jolteon } else { "" }
    )
}

/// Pikachu has fainted; `bench` healthy teammates can replace it
pub fn fainted_tracker(bench: usize) -> BattleTracker {
    let mut log = TURN_LOG.to_vec();
    log.extend([
        "|move|p2a: Gyarados|Earthquake|p1a: Pikachu",
        "|-supereffective|p1a: Pikachu",
        "|-damage|p1a: Pikachu|0 fnt",
        "|faint|p1a: Pikachu",
    ]);
    tracker_with(&log, &force_switch_request(bench))
}

pub fn decision_request(tracker: &BattleTracker, within: Duration) -> DecisionRequest {
    DecisionRequest::new(
        RoomId::from(ROOM),
        tracker.state(),
        Vec::new(),
        Instant::now() + within,
    )
}

/// What a [`RecordingSink`] was asked to send
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Choose {
        room: String,
        choice: String,
        rqid: Option<u64>,
    },
    Resync(String),
}

#[derive(Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<Sent>>,
}

impl RecordingSink {
    pub fn choices(&self) -> Vec<(String, Option<u64>)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| match s {
                Sent::Choose { choice, rqid, .. } => Some((choice.clone(), *rqid)),
                Sent::Resync(_) => None,
            })
            .collect()
    }

    pub fn resyncs(&self) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|s| matches!(s, Sent::Resync(_)))
            .count()
    }
}

impl BattleSink for RecordingSink {
    fn choose(&self, room: &RoomId, choice: &str, rqid: Option<u64>) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(Sent::Choose {
            room: room.to_string(),
            choice: choice.to_string(),
            rqid,
        });
        Ok(())
    }

    fn resync(&self, room: &RoomId) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(Sent::Resync(room.to_string()));
        Ok(())
    }
}
