//! Turn state machine: one question in, one answer (or error) out.

use tracing::{info, warn};

use crate::analyst::{Analyst, AnalystResponse};
use crate::conversation::ConversationStore;
use crate::error::{AnalystError, TurnError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    Sending,
    Succeeded,
    Failed,
}

/// Where a question came from. All three go through the same path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnTrigger {
    Typed(String),
    Example(String),
    Suggestion(String),
}

impl TurnTrigger {
    pub fn prompt(&self) -> &str {
        match self {
            TurnTrigger::Typed(p) | TurnTrigger::Example(p) | TurnTrigger::Suggestion(p) => {
                p.trim()
            }
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            TurnTrigger::Typed(_) => "typed",
            TurnTrigger::Example(_) => "example",
            TurnTrigger::Suggestion(_) => "suggestion",
        }
    }
}

/// Single-slot mailbox for a trigger raised while drawing.
///
/// Posting replaces whatever was there; the shell takes it once per pass.
#[derive(Debug, Default)]
pub struct PendingAction {
    slot: Option<TurnTrigger>,
}

impl PendingAction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&mut self, trigger: TurnTrigger) {
        self.slot = Some(trigger);
    }

    pub fn take(&mut self) -> Option<TurnTrigger> {
        self.slot.take()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Succeeded {
        /// Index of the assistant turn in the store.
        turn_index: usize,
        response: AnalystResponse,
    },
    Failed {
        error: AnalystError,
    },
}

#[derive(Debug, Default)]
pub struct TurnProcessor {
    store: ConversationStore,
    state: TurnState,
    prompt: Option<String>,
}

impl TurnProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn is_sending(&self) -> bool {
        self.state == TurnState::Sending
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Prompt of the turn currently in flight.
    pub fn in_flight(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    /// Record the user turn and enter `Sending`. Returns the prompt to send.
    pub fn begin(&mut self, trigger: &TurnTrigger) -> Result<String, TurnError> {
        if self.is_sending() {
            return Err(TurnError::Busy);
        }
        let prompt = trigger.prompt();
        if prompt.is_empty() {
            return Err(TurnError::EmptyPrompt);
        }

        self.store.push_user(prompt);
        self.state = TurnState::Sending;
        self.prompt = Some(prompt.to_string());
        info!(source = trigger.source(), "Turn started");
        Ok(prompt.to_string())
    }

    /// Settle the in-flight turn with the analyst's result.
    pub fn complete(
        &mut self,
        result: Result<AnalystResponse, AnalystError>,
    ) -> Result<TurnOutcome, TurnError> {
        if !self.is_sending() {
            return Err(TurnError::NotSending);
        }
        self.prompt = None;

        match result {
            Ok(response) => {
                if let Err(err) = self
                    .store
                    .push_assistant(response.content.clone(), response.request_id.clone())
                {
                    self.state = TurnState::Failed;
                    warn!(error = %err, "Assistant turn rejected");
                    return Err(err.into());
                }
                self.state = TurnState::Succeeded;
                info!(request_id = ?response.request_id, blocks = response.content.len(), "Turn succeeded");
                Ok(TurnOutcome::Succeeded {
                    turn_index: self.store.len() - 1,
                    response,
                })
            }
            Err(error) => {
                self.state = TurnState::Failed;
                warn!(request_id = ?error.request_id, error = %error, "Turn failed");
                Ok(TurnOutcome::Failed { error })
            }
        }
    }

    /// Back to `Idle` once the outcome has been shown.
    pub fn settle(&mut self) {
        if !self.is_sending() {
            self.state = TurnState::Idle;
        }
    }

    /// Run a whole turn against `analyst`.
    pub async fn process(
        &mut self,
        trigger: &TurnTrigger,
        analyst: &dyn Analyst,
    ) -> Result<TurnOutcome, TurnError> {
        let prompt = self.begin(trigger)?;
        let result = analyst.ask(&prompt).await;
        self.complete(result)
    }

    /// Drop the whole conversation. Refused while a turn is in flight.
    pub fn clear(&mut self) -> Result<(), TurnError> {
        if self.is_sending() {
            return Err(TurnError::Busy);
        }
        self.store.clear();
        self.state = TurnState::Idle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ChatRole, ContentBlock};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeAnalyst {
        reply: Result<AnalystResponse, AnalystError>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeAnalyst {
        fn ok(request_id: &str) -> Self {
            Self {
                reply: Ok(AnalystResponse {
                    content: vec![ContentBlock::text("answer")],
                    request_id: Some(request_id.to_string()),
                    warnings: vec![],
                }),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(AnalystError::status(500, Some("err-1".to_string()), "boom")),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Analyst for FakeAnalyst {
        async fn ask(&self, prompt: &str) -> Result<AnalystResponse, AnalystError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone()
        }
    }

    #[test]
    fn test_user_turn_is_recorded_before_sending() {
        let mut processor = TurnProcessor::new();
        let prompt = processor
            .begin(&TurnTrigger::Typed("  Show trends  ".to_string()))
            .unwrap();

        assert_eq!(prompt, "Show trends");
        assert_eq!(processor.state(), TurnState::Sending);
        assert_eq!(processor.store().len(), 1);
        assert_eq!(processor.store().turns()[0].first_text(), Some("Show trends"));
        assert_eq!(processor.in_flight(), Some("Show trends"));
    }

    #[test]
    fn test_second_submission_while_sending_is_refused() {
        let mut processor = TurnProcessor::new();
        processor.begin(&TurnTrigger::Typed("one".to_string())).unwrap();
        let err = processor
            .begin(&TurnTrigger::Typed("two".to_string()))
            .unwrap_err();
        assert_eq!(err, TurnError::Busy);
        assert_eq!(processor.store().len(), 1);
    }

    #[test]
    fn test_empty_prompt_is_rejected() {
        let mut processor = TurnProcessor::new();
        let err = processor.begin(&TurnTrigger::Typed("   ".to_string())).unwrap_err();
        assert_eq!(err, TurnError::EmptyPrompt);
        assert!(processor.store().is_empty());
        assert_eq!(processor.state(), TurnState::Idle);
    }

    #[test]
    fn test_complete_without_begin() {
        let mut processor = TurnProcessor::new();
        let err = processor.complete(Err(AnalystError::transport("x"))).unwrap_err();
        assert_eq!(err, TurnError::NotSending);
    }

    #[tokio::test]
    async fn test_success_adds_two_turns_with_request_id() {
        let analyst = FakeAnalyst::ok("abc123");
        let mut processor = TurnProcessor::new();

        let outcome = processor
            .process(&TurnTrigger::Typed("Show me utilization trends".to_string()), &analyst)
            .await
            .unwrap();

        assert_eq!(processor.state(), TurnState::Succeeded);
        assert_eq!(processor.store().len(), 2);
        let last = processor.store().last().unwrap();
        assert_eq!(last.role, ChatRole::Assistant);
        assert_eq!(last.request_id.as_deref(), Some("abc123"));
        match outcome {
            TurnOutcome::Succeeded { turn_index, response } => {
                assert_eq!(turn_index, 1);
                assert_eq!(response.request_id.as_deref(), Some("abc123"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        processor.settle();
        assert_eq!(processor.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn test_failure_adds_only_user_turn() {
        let analyst = FakeAnalyst::failing();
        let mut processor = TurnProcessor::new();

        let outcome = processor
            .process(&TurnTrigger::Typed("q".to_string()), &analyst)
            .await
            .unwrap();

        assert_eq!(processor.state(), TurnState::Failed);
        assert_eq!(processor.store().len(), 1);
        match outcome {
            TurnOutcome::Failed { error } => assert_eq!(error.request_id.as_deref(), Some("err-1")),
            other => panic!("unexpected outcome {:?}", other),
        }

        // A failed turn does not block the next one
        assert!(processor.begin(&TurnTrigger::Typed("again".to_string())).is_ok());
    }

    #[tokio::test]
    async fn test_suggestion_behaves_like_typed_prompt() {
        let typed = FakeAnalyst::ok("r1");
        let picked = FakeAnalyst::ok("r1");
        let mut a = TurnProcessor::new();
        let mut b = TurnProcessor::new();

        a.process(&TurnTrigger::Typed("By consultant?".to_string()), &typed)
            .await
            .unwrap();
        b.process(&TurnTrigger::Suggestion("By consultant?".to_string()), &picked)
            .await
            .unwrap();

        assert_eq!(*typed.prompts.lock().unwrap(), *picked.prompts.lock().unwrap());
        let contents = |p: &TurnProcessor| {
            p.store()
                .turns()
                .iter()
                .map(|t| (t.role, t.content.clone(), t.request_id.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(contents(&a), contents(&b));
    }

    #[tokio::test]
    async fn test_duplicate_request_id_fails_turn() {
        let analyst = FakeAnalyst::ok("same");
        let mut processor = TurnProcessor::new();
        processor
            .process(&TurnTrigger::Typed("one".to_string()), &analyst)
            .await
            .unwrap();
        processor.settle();

        let err = processor
            .process(&TurnTrigger::Typed("two".to_string()), &analyst)
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::Conversation(_)));
        assert_eq!(processor.state(), TurnState::Failed);
        assert_eq!(processor.store().len(), 3);
    }

    #[test]
    fn test_pending_action_is_single_slot() {
        let mut pending = PendingAction::new();
        assert!(pending.take().is_none());

        pending.post(TurnTrigger::Example("first".to_string()));
        pending.post(TurnTrigger::Suggestion("second".to_string()));
        assert_eq!(
            pending.take(),
            Some(TurnTrigger::Suggestion("second".to_string()))
        );
        assert!(pending.take().is_none());
        assert!(pending.is_empty());
    }

    #[test]
    fn test_clear_refused_while_sending() {
        let mut processor = TurnProcessor::new();
        processor.begin(&TurnTrigger::Typed("q".to_string())).unwrap();
        assert_eq!(processor.clear(), Err(TurnError::Busy));

        processor.complete(Err(AnalystError::transport("down"))).unwrap();
        processor.clear().unwrap();
        assert!(processor.store().is_empty());
        assert_eq!(processor.state(), TurnState::Idle);
    }
}
