//! Sends exactly one choice per request

use std::sync::Arc;

use pokellm_battle::LegalAction;
use pokellm_client::{ClientHandle, RoomId, TransportError};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::engine::{DecisionFailure, DecisionRequest, DecisionResult};

/// Where a battle's commands go
pub trait BattleSink: Send + Sync {
    fn choose(&self, room: &RoomId, choice: &str, rqid: Option<u64>) -> Result<(), TransportError>;

    /// Ask the server to replay the battle from the start
    fn resync(&self, room: &RoomId) -> Result<(), TransportError>;
}

impl BattleSink for ClientHandle {
    fn choose(&self, room: &RoomId, choice: &str, rqid: Option<u64>) -> Result<(), TransportError> {
        ClientHandle::choose(self, room, choice, rqid)
    }

    fn resync(&self, room: &RoomId) -> Result<(), TransportError> {
        ClientHandle::resync(self, room)
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("a choice was already submitted for request {0:?}")]
    AlreadySubmitted(Option<u64>),

    #[error("request needs no choice")]
    NothingToSubmit,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// What was sent for a request
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub choice: String,
    pub rqid: Option<u64>,
    /// `None` for choices outside the legal set, like `default` or a team order
    pub action: Option<LegalAction>,
    pub fallback: bool,
    /// Why the fallback was used
    pub reason: Option<DecisionFailure>,
}

/// A request is identified by its turn and rqid, since the rqid is optional
type RequestKey = (u32, Option<u64>);

fn key(request: &DecisionRequest) -> RequestKey {
    (request.actions.turn, request.rqid())
}

#[derive(Default)]
struct Ledger {
    /// Request answered last
    submitted: Option<RequestKey>,
    /// Request already granted its one resubmission
    released: Option<RequestKey>,
    last_choice: Option<String>,
}

pub struct ActionSubmitter<S> {
    sink: Arc<S>,
    ledger: Mutex<Ledger>,
}

impl<S: BattleSink> ActionSubmitter<S> {
    pub fn new(sink: Arc<S>) -> Self {
        Self {
            sink,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Send the choice for `request`, or the deterministic fallback when the
    /// decision failed or came in after the deadline.
    pub async fn submit(
        &self,
        result: DecisionResult,
        request: &DecisionRequest,
    ) -> Result<Submission, SubmitError> {
        let mut ledger = self.ledger.lock().await;
        let rqid = request.rqid();
        if ledger.submitted == Some(key(request)) {
            return Err(SubmitError::AlreadySubmitted(rqid));
        }

        let late = Instant::now() >= request.deadline;
        let (action, reason) = match result {
            DecisionResult::Chosen { action, .. } if !late => (Some(action), None),
            DecisionResult::Chosen { .. } => (None, Some(DecisionFailure::InferenceTimeout)),
            DecisionResult::Failed { failure, .. } => (None, Some(failure)),
        };

        let mut submission = match action {
            Some(action) => Submission {
                choice: action.to_choice(),
                rqid,
                action: Some(action),
                fallback: false,
                reason: None,
            },
            None => fallback(request, reason)?,
        };
        // a resubmission must not repeat the choice the server just rejected
        if ledger.released == Some(key(request))
            && ledger.last_choice.as_deref() == Some(submission.choice.as_str())
        {
            submission.choice = "default".to_string();
            submission.action = None;
            submission.fallback = true;
        }

        self.sink.choose(&request.room, &submission.choice, rqid)?;
        ledger.submitted = Some(key(request));
        ledger.last_choice = Some(submission.choice.clone());

        let room = request.room.as_str();
        if submission.fallback {
            let reason = submission
                .reason
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            warn!(room, rqid, choice = %submission.choice, reason = %reason, "Submitted fallback");
        } else {
            info!(room, rqid, choice = %submission.choice, "Submitted choice");
        }
        Ok(submission)
    }

    /// Allow one more submission for `request` after the server rejected
    /// the first. Returns false if that request was already released once.
    pub async fn release(&self, request: &DecisionRequest) -> bool {
        let mut ledger = self.ledger.lock().await;
        let key = key(request);
        if ledger.submitted != Some(key) || ledger.released == Some(key) {
            return false;
        }
        ledger.submitted = None;
        ledger.released = Some(key);
        true
    }

    /// Whether the choice for `request` has been sent
    pub async fn submitted(&self, request: &DecisionRequest) -> bool {
        self.ledger.lock().await.submitted == Some(key(request))
    }
}

fn fallback(
    request: &DecisionRequest,
    reason: Option<DecisionFailure>,
) -> Result<Submission, SubmitError> {
    let pending = request.state.request.as_ref();

    let (choice, action) = if let Some(action) = request.actions.default_action() {
        (action.to_choice(), Some(action.clone()))
    } else if let Some(req) = pending.filter(|r| r.team_preview) {
        let order: String = (1..=req.team_size().max(1)).map(|n| n.to_string()).collect();
        (format!("team {}", order), None)
    } else if pending.is_some_and(|r| !r.wait) {
        ("default".to_string(), None)
    } else {
        return Err(SubmitError::NothingToSubmit);
    };

    Ok(Submission {
        choice,
        rqid: request.rqid(),
        action,
        fallback: true,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pokellm_battle::Update;

    use super::*;
    use crate::engine::DecisionSource;
    use crate::testing::{
        RecordingSink, TURN_LOG, decision_request, fainted_tracker, message, request,
        tracker_with, turn_request, turn_tracker,
    };

    fn chosen(request: &DecisionRequest, label: &str) -> DecisionResult {
        DecisionResult::Chosen {
            action: request.actions.get(label).unwrap().clone(),
            source: DecisionSource::Model,
            attempts: 1,
        }
    }

    #[tokio::test]
    async fn test_submits_chosen_action() {
        let sink = Arc::new(RecordingSink::default());
        let submitter = ActionSubmitter::new(Arc::clone(&sink));
        let req = decision_request(&turn_tracker(), Duration::from_secs(30));

        let submission = submitter.submit(chosen(&req, "voltswitch"), &req).await.unwrap();
        assert_eq!(submission.choice, "move 2");
        assert!(!submission.fallback);
        assert_eq!(sink.choices(), vec![("move 2".to_string(), Some(3))]);
    }

    #[tokio::test]
    async fn test_second_submit_is_rejected() {
        let sink = Arc::new(RecordingSink::default());
        let submitter = ActionSubmitter::new(Arc::clone(&sink));
        let req = decision_request(&turn_tracker(), Duration::from_secs(30));

        submitter.submit(chosen(&req, "thunderbolt"), &req).await.unwrap();
        let again = submitter.submit(chosen(&req, "voltswitch"), &req).await;
        assert!(matches!(again, Err(SubmitError::AlreadySubmitted(Some(3)))));
        assert_eq!(sink.choices().len(), 1);
    }

    #[tokio::test]
    async fn test_requests_without_rqid_are_told_apart_by_turn() {
        let sink = Arc::new(RecordingSink::default());
        let submitter = ActionSubmitter::new(Arc::clone(&sink));
        let mut tracker = tracker_with(TURN_LOG, &turn_request().replace(r#","rqid":3"#, ""));
        let first = decision_request(&tracker, Duration::from_secs(30));
        assert_eq!(first.rqid(), None);

        submitter.submit(chosen(&first, "thunderbolt"), &first).await.unwrap();
        assert!(submitter.submitted(&first).await);
        assert!(matches!(
            submitter.submit(chosen(&first, "voltswitch"), &first).await,
            Err(SubmitError::AlreadySubmitted(None))
        ));

        tracker
            .apply(&Update::new(TURN_LOG.len() as u64, message("|turn|2")))
            .unwrap();
        let second = decision_request(&tracker, Duration::from_secs(30));
        assert!(!submitter.submitted(&second).await);
        let submission = submitter.submit(chosen(&second, "voltswitch"), &second).await.unwrap();
        assert_eq!(submission.rqid, None);
        assert_eq!(
            sink.choices(),
            vec![("move 1".to_string(), None), ("move 2".to_string(), None)]
        );
    }

    #[tokio::test]
    async fn test_failed_decision_uses_default_action() {
        let sink = Arc::new(RecordingSink::default());
        let submitter = ActionSubmitter::new(Arc::clone(&sink));
        let req = decision_request(&turn_tracker(), Duration::from_secs(30));

        let failed = DecisionResult::Failed {
            failure: DecisionFailure::InferenceUnparseable("empty answer".to_string()),
            attempts: 2,
        };
        let submission = submitter.submit(failed, &req).await.unwrap();
        assert!(submission.fallback);
        assert_eq!(submission.choice, "move 1");
        assert_eq!(
            submission.reason,
            Some(DecisionFailure::InferenceUnparseable("empty answer".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_choice_falls_back() {
        let sink = Arc::new(RecordingSink::default());
        let submitter = ActionSubmitter::new(Arc::clone(&sink));
        let req = decision_request(&turn_tracker(), Duration::from_secs(1));

        tokio::time::sleep(Duration::from_secs(2)).await;
        let submission = submitter.submit(chosen(&req, "voltswitch"), &req).await.unwrap();
        assert!(submission.fallback);
        assert_eq!(submission.choice, "move 1");
        assert_eq!(submission.reason, Some(DecisionFailure::InferenceTimeout));
    }

    #[tokio::test]
    async fn test_release_allows_one_resubmission() {
        let sink = Arc::new(RecordingSink::default());
        let submitter = ActionSubmitter::new(Arc::clone(&sink));
        let req = decision_request(&fainted_tracker(2), Duration::from_secs(30));

        submitter.submit(chosen(&req, "switch-jolteon"), &req).await.unwrap();
        assert!(submitter.release(&req).await);
        let failed = DecisionResult::Failed {
            failure: DecisionFailure::IllegalActionChosen("switch-jolteon".to_string()),
            attempts: 0,
        };
        let resubmitted = submitter.submit(failed.clone(), &req).await.unwrap();
        assert_eq!(resubmitted.choice, "switch 2");

        assert!(!submitter.release(&req).await);
        assert!(matches!(
            submitter.submit(failed, &req).await,
            Err(SubmitError::AlreadySubmitted(Some(5)))
        ));
        assert_eq!(
            sink.choices(),
            vec![
                ("switch 3".to_string(), Some(5)),
                ("switch 2".to_string(), Some(5)),
            ]
        );
    }

    #[tokio::test]
    async fn test_resubmission_never_repeats_rejected_choice() {
        let sink = Arc::new(RecordingSink::default());
        let submitter = ActionSubmitter::new(Arc::clone(&sink));
        let req = decision_request(&turn_tracker(), Duration::from_secs(30));

        submitter.submit(chosen(&req, "thunderbolt"), &req).await.unwrap();
        assert!(submitter.release(&req).await);
        let failed = DecisionResult::Failed {
            failure: DecisionFailure::IllegalActionChosen("[Invalid choice]".to_string()),
            attempts: 0,
        };
        let resubmitted = submitter.submit(failed, &req).await.unwrap();
        assert_eq!(resubmitted.choice, "default");
        assert!(resubmitted.action.is_none());
    }

    #[tokio::test]
    async fn test_team_preview_fallback() {
        let sink = Arc::new(RecordingSink::default());
        let submitter = ActionSubmitter::new(Arc::clone(&sink));
        let json = r#"{"teamPreview":true,"side":{"name":"bot","id":"p1","pokemon":[
            {"ident":"p1: Pikachu","details":"Pikachu, L88, M","condition":"201/201","active":false,"moves":[],"baseAbility":"static","ability":"static","item":""},
            {"ident":"p1: Raichu","details":"Raichu, L86","condition":"250/250","active":false,"moves":[],"baseAbility":"static","ability":"static","item":""},
            {"ident":"p1: Jolteon","details":"Jolteon, L84","condition":"230/230","active":false,"moves":[],"baseAbility":"voltabsorb","ability":"voltabsorb","item":""}
        ]},"rqid":1}"#;
        let tracker = tracker_with(&[], json);
        let req = decision_request(&tracker, Duration::from_secs(30));
        assert!(req.actions.is_empty());

        let failed = DecisionResult::Failed {
            failure: DecisionFailure::Backend("no legal actions".to_string()),
            attempts: 0,
        };
        let submission = submitter.submit(failed, &req).await.unwrap();
        assert_eq!(submission.choice, "team 123");
        assert_eq!(sink.choices(), vec![("team 123".to_string(), Some(1))]);
    }

    #[tokio::test]
    async fn test_wait_request_sends_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let submitter = ActionSubmitter::new(Arc::clone(&sink));
        let mut tracker = turn_tracker();
        tracker.apply_request(request(
            r#"{"wait":true,"side":{"name":"bot","id":"p1","pokemon":[]},"rqid":4}"#,
        ));
        let req = decision_request(&tracker, Duration::from_secs(30));

        let failed = DecisionResult::Failed {
            failure: DecisionFailure::Backend("no legal actions".to_string()),
            attempts: 0,
        };
        assert!(matches!(
            submitter.submit(failed, &req).await,
            Err(SubmitError::NothingToSubmit)
        ));
        assert!(sink.choices().is_empty());
    }
}
