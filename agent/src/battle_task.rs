//! One task per battle: track, decide, submit
//!
//! ```text
//! Idle -> AwaitingUpdate -> Deciding -> Submitting -> AwaitingUpdate ...
//!                                                  \-> BattleEnded
//! ```
//!
//! A request is decided once the log for its turn has arrived: on the
//! `|turn|` line, or after the log has been quiet for a short settle period
//! (force switches and team preview have no turn line). Events that arrive
//! while deciding are buffered and applied in order after the choice is sent.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use pokellm_battle::{BattleTracker, TrackerError, Update};
use pokellm_client::{BattleEvent, RoomId};
use pokellm_protocol::{BattleRequest, ServerMessage, to_id};
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, info, warn};

use crate::engine::{
    DecisionEngine, DecisionFailure, DecisionRequest, DecisionResult, HistoryEntry,
};
use crate::submitter::{ActionSubmitter, BattleSink, Submission};

#[derive(Debug, Clone)]
pub struct BattleConfig {
    /// Time allowed per decision when the server has not said otherwise
    pub turn_timer: Duration,
    /// Taken off the turn timer to leave room for the network
    pub safety_margin: Duration,
    /// How far past the deadline a decision may run before it is abandoned
    pub submit_grace: Duration,
    /// Quiet period after which the log for a request is taken as complete
    pub settle: Duration,
    pub history_len: usize,
    /// Forced resyncs before a bad update is skipped instead
    pub max_resyncs: u32,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            turn_timer: Duration::from_secs(90),
            safety_margin: Duration::from_secs(5),
            submit_grace: Duration::from_secs(2),
            settle: Duration::from_millis(300),
            history_len: 10,
            max_resyncs: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingUpdate,
    Deciding,
    Submitting,
    BattleEnded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BattleOutcome {
    pub room: RoomId,
    pub winner: Option<String>,
    pub tie: bool,
    /// `None` when the battle stopped before a result
    pub won: Option<bool>,
    pub turns: u32,
    pub decisions: u32,
    pub fallbacks: u32,
}

/// A request waiting for its log to catch up
#[derive(Debug, Clone, Copy)]
struct Pending {
    arrived: Instant,
    settle_at: Instant,
    ready: bool,
}

#[derive(Debug, Default)]
struct Resync {
    /// Leave and rejoin sent; replay not started yet
    in_flight: bool,
    count: u32,
    /// Malformed update that already forced one resync
    failed_seq: Option<u64>,
}

pub struct BattleTask<S> {
    room: RoomId,
    events: mpsc::Receiver<BattleEvent>,
    engine: DecisionEngine,
    submitter: ActionSubmitter<S>,
    sink: Arc<S>,
    tracker: BattleTracker,
    config: BattleConfig,

    phase: Phase,
    pending: Option<Pending>,
    /// Last request a choice was sent for, kept for rejected choices
    answered: Option<DecisionRequest>,
    history: VecDeque<HistoryEntry>,
    resync: Resync,
    decisions: u32,
    fallbacks: u32,
}

impl<S: BattleSink> BattleTask<S> {
    pub fn new(
        room: RoomId,
        events: mpsc::Receiver<BattleEvent>,
        engine: DecisionEngine,
        sink: Arc<S>,
        config: BattleConfig,
    ) -> Self {
        Self {
            room,
            events,
            engine,
            submitter: ActionSubmitter::new(Arc::clone(&sink)),
            sink,
            tracker: BattleTracker::new(),
            config,
            phase: Phase::Idle,
            pending: None,
            answered: None,
            history: VecDeque::new(),
            resync: Resync::default(),
            decisions: 0,
            fallbacks: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Play until the battle ends or its event channel closes
    pub async fn run(mut self) -> BattleOutcome {
        info!(room = %self.room, "Battle started");
        self.phase = Phase::AwaitingUpdate;

        while self.phase != Phase::BattleEnded {
            let event = match self.pending {
                Some(pending) if pending.ready => {
                    self.decide_and_submit().await;
                    continue;
                }
                Some(pending) => match timeout_at(pending.settle_at, self.events.recv()).await {
                    Ok(event) => event,
                    Err(_) => {
                        self.decide_and_submit().await;
                        continue;
                    }
                },
                None => self.events.recv().await,
            };

            match event {
                Some(event) => self.handle(event).await,
                None => {
                    warn!(room = %self.room, "Battle channel closed before the battle ended");
                    break;
                }
            }
        }

        self.finish()
    }

    async fn handle(&mut self, event: BattleEvent) {
        match event {
            BattleEvent::Update(update) => self.on_update(update),
            BattleEvent::Request(request) => self.on_request(*request),
            BattleEvent::Timer { message, on } => {
                let state = self.tracker.apply_timer(&message, on);
                debug!(room = %self.room, seconds = ?state.timer_seconds_left, "Timer notice");
            }
            BattleEvent::Error(message) => self.on_error(&message).await,
        }
    }

    fn on_update(&mut self, update: Update) {
        let turn_line = matches!(update.message, ServerMessage::Turn(_));
        self.apply_update(update);

        if self.tracker.state().ended {
            self.phase = Phase::BattleEnded;
            self.pending = None;
            return;
        }
        if let Some(pending) = self.pending.as_mut() {
            pending.settle_at = Instant::now() + self.config.settle;
            pending.ready |= turn_line;
        }
    }

    fn apply_update(&mut self, update: Update) {
        if update.seq == 0 && self.resync.in_flight {
            debug!(room = %self.room, "Replay started");
            self.resync.in_flight = false;
        }

        match self.tracker.apply(&update) {
            Ok(_) => {}
            Err(TrackerError::SequenceGap { expected, received }) => {
                if self.resync.in_flight {
                    debug!(room = %self.room, expected, received, "Gap while resyncing");
                } else if self.resync.count >= self.config.max_resyncs {
                    warn!(room = %self.room, expected, received, "Out of resyncs, skipping ahead");
                    self.tracker.skip(received - 1);
                    self.apply_update(update);
                } else {
                    warn!(room = %self.room, expected, received, "Missed battle updates");
                    self.request_resync();
                }
            }
            Err(TrackerError::MalformedUpdate { seq, reason }) => {
                if self.resync.failed_seq == Some(seq)
                    || self.resync.count >= self.config.max_resyncs
                {
                    warn!(room = %self.room, seq, reason = %reason, "Update still malformed, skipping it");
                    self.tracker.skip(seq);
                } else {
                    error!(room = %self.room, seq, reason = %reason, "Malformed update, rebuilding battle");
                    self.resync.failed_seq = Some(seq);
                    let before = self.tracker.snapshot();
                    self.tracker.reset();
                    if !self.request_resync() {
                        self.tracker.restore(before);
                        self.tracker.skip(seq);
                    }
                }
            }
        }
    }

    /// Ask for a replay; false if the request could not be sent
    fn request_resync(&mut self) -> bool {
        self.resync.count += 1;
        match self.sink.resync(&self.room) {
            Ok(()) => {
                self.resync.in_flight = true;
                true
            }
            Err(e) => {
                warn!(room = %self.room, error = %e, "Could not request resync");
                false
            }
        }
    }

    fn on_request(&mut self, request: BattleRequest) {
        let needs_decision = request.needs_decision();
        let team_preview = request.team_preview;
        debug!(room = %self.room, rqid = ?request.rqid, needs_decision, "Request");
        self.tracker.apply_request(request);

        self.pending = needs_decision.then(|| {
            let now = Instant::now();
            Pending {
                arrived: now,
                settle_at: now + self.config.settle,
                ready: team_preview,
            }
        });
    }

    async fn on_error(&mut self, message: &str) {
        let rejected =
            message.starts_with("[Invalid choice]") || message.starts_with("[Unavailable choice]");
        if !rejected {
            warn!(room = %self.room, message, "Server error");
            return;
        }
        let Some(request) = self.answered.clone() else {
            warn!(room = %self.room, message, "Choice rejected with no choice sent");
            return;
        };
        if !self.submitter.release(&request).await {
            warn!(room = %self.room, message, "Fallback choice rejected too");
            return;
        }

        warn!(room = %self.room, message, "Choice rejected, sending fallback");
        let failed = DecisionResult::Failed {
            failure: DecisionFailure::IllegalActionChosen(message.to_string()),
            attempts: 0,
        };
        match self.submitter.submit(failed, &request).await {
            Ok(submission) => self.record(&request, &submission),
            Err(e) => warn!(room = %self.room, error = %e, "Could not resubmit"),
        }
    }

    /// Time allowed for the decision, from the turn timer and any timer notice
    fn budget(&self) -> Duration {
        let mut timer = self.config.turn_timer;
        if let Some(seconds) = self.tracker.state().timer_seconds_left {
            timer = timer.min(Duration::from_secs(seconds.into()));
        }
        timer.saturating_sub(self.config.safety_margin)
    }

    async fn decide_and_submit(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let request = DecisionRequest::new(
            self.room.clone(),
            self.tracker.state(),
            self.history.iter().cloned().collect(),
            pending.arrived + self.budget(),
        );
        if self.submitter.submitted(&request).await {
            debug!(room = %self.room, rqid = ?request.rqid(), "Request already answered");
            return;
        }

        self.phase = Phase::Deciding;
        let mut buffered = VecDeque::new();
        let result = {
            let hard_stop = request.deadline + self.config.submit_grace;
            let decide = timeout_at(hard_stop, self.engine.decide(&request));
            tokio::pin!(decide);
            let mut open = true;
            loop {
                tokio::select! {
                    outcome = &mut decide => break outcome.unwrap_or(DecisionResult::Failed {
                        failure: DecisionFailure::InferenceTimeout,
                        attempts: 0,
                    }),
                    event = self.events.recv(), if open => match event {
                        Some(event) => buffered.push_back(event),
                        None => open = false,
                    },
                }
            }
        };

        self.phase = Phase::Submitting;
        match self.submitter.submit(result, &request).await {
            Ok(submission) => {
                self.record(&request, &submission);
                self.answered = Some(request);
            }
            Err(e) => warn!(room = %self.room, error = %e, "Nothing submitted"),
        }
        self.phase = Phase::AwaitingUpdate;

        if !buffered.is_empty() {
            debug!(room = %self.room, count = buffered.len(), "Applying buffered events");
        }
        while let Some(event) = buffered.pop_front() {
            self.handle(event).await;
        }
    }

    fn record(&mut self, request: &DecisionRequest, submission: &Submission) {
        self.decisions += 1;
        if submission.fallback {
            self.fallbacks += 1;
        }
        let has_moves = request.actions.iter().any(|a| !a.is_switch());
        let entry = HistoryEntry {
            turn: request.actions.turn,
            label: submission
                .action
                .as_ref()
                .map(|a| a.label())
                .unwrap_or_else(|| submission.choice.clone()),
            voluntary_switch: has_moves
                && submission.action.as_ref().is_some_and(|a| a.is_switch()),
            fallback: submission.fallback,
        };
        self.history.push_back(entry);
        while self.history.len() > self.config.history_len {
            self.history.pop_front();
        }
    }

    fn finish(self) -> BattleOutcome {
        let state = self.tracker.state();
        let our_id = state.me().map(|side| to_id(&side.username));
        let won = state
            .winner
            .as_ref()
            .map(|winner| our_id.as_deref() == Some(to_id(winner).as_str()))
            .or_else(|| state.tie.then_some(false));

        let outcome = BattleOutcome {
            room: self.room,
            winner: state.winner.clone(),
            tie: state.tie,
            won,
            turns: state.turn,
            decisions: self.decisions,
            fallbacks: self.fallbacks,
        };
        info!(
            room = %outcome.room,
            winner = ?outcome.winner,
            tie = outcome.tie,
            turns = outcome.turns,
            decisions = outcome.decisions,
            fallbacks = outcome.fallbacks,
            "Battle finished"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::inference::InferencePool;
    use crate::inference::testing::ScriptedBackend;
    use crate::testing::{
        ROOM, RecordingSink, TURN_LOG, force_switch_request, message, request, turn_request,
    };

    struct Harness {
        tx: mpsc::Sender<BattleEvent>,
        sink: Arc<RecordingSink>,
        backend: Arc<ScriptedBackend>,
        task: BattleTask<RecordingSink>,
    }

    fn harness(backend: ScriptedBackend, config: BattleConfig) -> Harness {
        let (tx, rx) = mpsc::channel(128);
        let sink = Arc::new(RecordingSink::default());
        let backend = Arc::new(backend);
        let engine = DecisionEngine::new(
            InferencePool::new(backend.clone(), 1),
            EngineConfig::default(),
        );
        let task = BattleTask::new(RoomId::from(ROOM), rx, engine, Arc::clone(&sink), config);
        Harness {
            tx,
            sink,
            backend,
            task,
        }
    }

    async fn send_request(tx: &mpsc::Sender<BattleEvent>, json: &str) {
        tx.send(BattleEvent::Request(Box::new(request(json))))
            .await
            .unwrap();
    }

    async fn send_log(tx: &mpsc::Sender<BattleEvent>, first_seq: u64, lines: &[&str]) {
        for (i, line) in lines.iter().enumerate() {
            let update = Update::new(first_seq + i as u64, message(line));
            tx.send(BattleEvent::Update(update)).await.unwrap();
        }
    }

    fn turn2_request() -> String {
        turn_request().replace(r#""rqid":3"#, r#""rqid":4"#)
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_turn_and_finishes() {
        let h = harness(ScriptedBackend::new(&["thunderbolt"]), BattleConfig::default());
        send_request(&h.tx, &turn_request()).await;
        send_log(&h.tx, 0, TURN_LOG).await;
        send_log(&h.tx, 10, &["|win|bot"]).await;

        let outcome = h.task.run().await;
        assert_eq!(h.sink.choices(), vec![("move 1".to_string(), Some(3))]);
        assert_eq!(outcome.won, Some(true));
        assert_eq!(outcome.decisions, 1);
        assert_eq!(outcome.fallbacks, 0);
        assert_eq!(h.backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_buffered_while_deciding() {
        let backend = ScriptedBackend::new(&["voltswitch", "thunderbolt"])
            .slow(Duration::from_secs(3));
        let h = harness(backend, BattleConfig::default());
        send_request(&h.tx, &turn_request()).await;
        send_log(&h.tx, 0, TURN_LOG).await;
        // arrives while the first decision is in flight
        send_request(&h.tx, &turn2_request()).await;
        send_log(
            &h.tx,
            10,
            &[
                "|move|p1a: Pikachu|Thunderbolt|p2a: Gyarados",
                "|-damage|p2a: Gyarados|40/100",
                "|turn|2",
            ],
        )
        .await;

        let backend = Arc::clone(&h.backend);
        let sink = Arc::clone(&h.sink);
        let tx = h.tx.clone();
        let task = tokio::spawn(h.task.run());
        tokio::time::sleep(Duration::from_secs(10)).await;
        send_log(&tx, 13, &["|win|alice"]).await;
        let outcome = task.await.unwrap();

        let prompts: Vec<String> = backend
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.prompt.clone())
            .collect();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].starts_with("Turn 1."));
        assert!(prompts[0].contains("Gyarados (100% HP)"));
        assert!(prompts[1].starts_with("Turn 2."));
        assert!(prompts[1].contains("Gyarados (40% HP)"));

        assert_eq!(
            sink.choices(),
            vec![("move 2".to_string(), Some(3)), ("move 1".to_string(), Some(4))]
        );
        assert_eq!(outcome.won, Some(false));
        assert_eq!(outcome.turns, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_submits_fallback_within_grace() {
        let backend = ScriptedBackend::new(&["thunderbolt"]).slow(Duration::from_secs(600));
        let config = BattleConfig {
            turn_timer: Duration::from_secs(10),
            safety_margin: Duration::from_secs(2),
            submit_grace: Duration::from_secs(1),
            ..BattleConfig::default()
        };
        let h = harness(backend, config);
        send_request(&h.tx, &turn_request()).await;
        send_log(&h.tx, 0, TURN_LOG).await;

        let sink = Arc::clone(&h.sink);
        let tx = h.tx.clone();
        let task = tokio::spawn(h.task.run());

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert!(sink.choices().is_empty());

        // deadline at 8s, grace ends at 9s
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(sink.choices(), vec![("move 1".to_string(), Some(3))]);

        send_log(&tx, 10, &["|tie"]).await;
        let outcome = task.await.unwrap();
        assert_eq!(outcome.fallbacks, 1);
        assert_eq!(outcome.won, Some(false));
        assert!(outcome.tie);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_notice_tightens_deadline() {
        let backend = ScriptedBackend::new(&["thunderbolt"]).slow(Duration::from_secs(600));
        let h = harness(backend, BattleConfig::default());
        send_request(&h.tx, &turn_request()).await;
        h.tx.send(BattleEvent::Timer {
            message: "Time left: 20 sec this turn | 150 sec total".to_string(),
            on: true,
        })
        .await
        .unwrap();
        send_log(&h.tx, 0, TURN_LOG).await;

        let sink = Arc::clone(&h.sink);
        let task = tokio::spawn(h.task.run());

        // 20s timer less the 5s margin
        tokio::time::sleep(Duration::from_secs(16)).await;
        assert_eq!(sink.choices(), vec![("move 1".to_string(), Some(3))]);
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_switch_decided_after_settle() {
        let backend = ScriptedBackend::new(&["thunderbolt", "switch-jolteon"]);
        let h = harness(backend, BattleConfig::default());
        send_request(&h.tx, &turn_request()).await;
        send_log(&h.tx, 0, TURN_LOG).await;
        send_request(&h.tx, &force_switch_request(2)).await;
        send_log(
            &h.tx,
            10,
            &[
                "|move|p2a: Gyarados|Earthquake|p1a: Pikachu",
                "|-damage|p1a: Pikachu|0 fnt",
                "|faint|p1a: Pikachu",
                "|upkeep",
            ],
        )
        .await;

        let sink = Arc::clone(&h.sink);
        let tx = h.tx.clone();
        let task = tokio::spawn(h.task.run());

        // no turn line follows a faint; the settle period closes the log
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(
            sink.choices(),
            vec![("move 1".to_string(), Some(3)), ("switch 3".to_string(), Some(5))]
        );

        send_log(&tx, 14, &["|win|bot"]).await;
        assert_eq!(task.await.unwrap().won, Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gap_requests_one_resync() {
        let h = harness(ScriptedBackend::new(&[]), BattleConfig::default());
        send_log(&h.tx, 0, &TURN_LOG[..4]).await;
        // seq 4 lost; 5 and 6 arrive before the rejoin
        send_log(&h.tx, 5, &TURN_LOG[5..7]).await;
        // replay from the start after rejoining
        send_log(&h.tx, 0, TURN_LOG).await;
        send_log(&h.tx, 10, &["|win|alice"]).await;

        let outcome = h.task.run().await;
        assert_eq!(h.sink.resyncs(), 1);
        assert_eq!(outcome.turns, 1);
        assert_eq!(outcome.winner.as_deref(), Some("alice"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_update_rebuilds_then_quarantines() {
        let h = harness(ScriptedBackend::new(&[]), BattleConfig::default());
        let mut log = TURN_LOG.to_vec();
        log.push("|-damage|p2a: Missingno|50/100");
        log.push("|turn|2");

        send_log(&h.tx, 0, &log).await;
        // the replay carries the same bad line
        send_log(&h.tx, 0, &log).await;
        send_log(&h.tx, 12, &["|win|bot"]).await;

        let outcome = h.task.run().await;
        assert_eq!(h.sink.resyncs(), 1);
        assert_eq!(outcome.turns, 2);
        assert_eq!(outcome.winner.as_deref(), Some("bot"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_choice_resubmits_once() {
        let h = harness(ScriptedBackend::new(&["thunderbolt"]), BattleConfig::default());
        send_request(&h.tx, &turn_request()).await;
        send_log(&h.tx, 0, TURN_LOG).await;
        h.tx.send(BattleEvent::Error(
            "[Invalid choice] Can't move: Pikachu's Thunderbolt is disabled".to_string(),
        ))
        .await
        .unwrap();
        h.tx.send(BattleEvent::Error("[Invalid choice] again".to_string()))
            .await
            .unwrap();
        send_log(&h.tx, 10, &["|win|bot"]).await;

        let outcome = h.task.run().await;
        assert_eq!(
            h.sink.choices(),
            vec![("move 1".to_string(), Some(3)), ("default".to_string(), Some(3))]
        );
        assert_eq!(outcome.decisions, 2);
        assert_eq!(outcome.fallbacks, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_channel_stops_task() {
        let h = harness(ScriptedBackend::new(&[]), BattleConfig::default());
        send_log(&h.tx, 0, &TURN_LOG[..3]).await;
        drop(h.tx);

        let outcome = h.task.run().await;
        assert_eq!(outcome.won, None);
        assert_eq!(outcome.decisions, 0);
    }
}
