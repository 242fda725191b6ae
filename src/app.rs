use chrono::Utc;
use ratatui::widgets::ListState;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use cortex_core::samples::{all_samples, EXAMPLE_QUESTIONS};
use cortex_core::{
    export, Analyst, AnalystClient, AnalystError, AnalystResponse, Config, ConnectedSessions,
    PendingAction, RenderedResponse, Renderer, ResultView, ResultViews, TurnError, TurnOutcome,
    TurnProcessor, TurnTrigger,
};

const REPLAY_RUNNING: &str = "Wait for the history replay to finish";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Chat,
    Samples,
    Setup,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Chat, Tab::Samples, Tab::Setup];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Chat => "Cortex Chat",
            Tab::Samples => "Sample Questions",
            Tab::Setup => "Setup Guide",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Tab::Chat => 0,
            Tab::Samples => 1,
            Tab::Setup => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Chat,
    Results,
    Suggestions,
}

pub struct App {
    pub should_quit: bool,
    pub tab: Tab,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    pub config: Config,
    pub sessions: ConnectedSessions,
    analyst: Arc<AnalystClient>,
    renderer: Renderer,

    // Conversation
    pub processor: TurnProcessor,
    pub pending: PendingAction,
    /// Rendered assistant turns, keyed by index in the conversation store.
    pub renders: HashMap<usize, RenderedResponse>,
    pub turn_task: Option<JoinHandle<Result<AnalystResponse, AnalystError>>>,
    /// SQL execution for recorded assistant turns, keyed by store index.
    pub render_tasks: Vec<(usize, JoinHandle<RenderedResponse>)>,
    pub replay_task: Option<JoinHandle<Vec<(usize, RenderedResponse)>>>,
    pub check_task: Option<JoinHandle<Result<AnalystResponse, AnalystError>>>,

    // Input box
    pub input: String,
    pub cursor: usize,

    // Chat transcript
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,
    pub follow_chat: bool,

    // Results pane
    pub result_turn: Option<usize>,
    pub result_index: usize,
    pub result_view: ResultView,
    pub result_scroll: usize,

    pub suggestions_state: ListState,
    pub samples_state: ListState,

    pub banner: Option<String>,
    pub status: Option<String>,
    pub check_status: Option<Result<String, String>>,
    pub animation_frame: u8,
}

impl App {
    pub fn new(config: Config, sessions: ConnectedSessions) -> Self {
        let analyst = Arc::new(AnalystClient::new(
            sessions.get(cortex_core::SessionLeg::Analyst),
            &config.semantic_model_path(),
        ));
        let renderer = Renderer::new(sessions.get(config.sql_session));

        let mut samples_state = ListState::default();
        samples_state.select(Some(0));

        Self {
            should_quit: false,
            tab: Tab::Chat,
            input_mode: InputMode::Editing,
            focus: FocusPane::Chat,
            config,
            sessions,
            analyst,
            renderer,
            processor: TurnProcessor::new(),
            pending: PendingAction::new(),
            renders: HashMap::new(),
            turn_task: None,
            render_tasks: Vec::new(),
            replay_task: None,
            check_task: None,
            input: String::new(),
            cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_chat: true,
            result_turn: None,
            result_index: 0,
            result_view: ResultView::Table,
            result_scroll: 0,
            suggestions_state: ListState::default(),
            samples_state,
            banner: None,
            status: None,
            check_status: None,
            animation_frame: 0,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.turn_task.is_some() || self.replay_task.is_some() || !self.render_tasks.is_empty()
    }

    /// Whether the SQL of assistant turn `index` is still running.
    pub fn is_rendering(&self, index: usize) -> bool {
        self.render_tasks.iter().any(|(i, _)| *i == index)
    }

    /// Start the pending turn, if any. Called once per draw.
    pub fn drain_pending(&mut self) {
        let Some(trigger) = self.pending.take() else {
            return;
        };
        if self.replay_task.is_some() {
            if let TurnTrigger::Typed(prompt) = trigger {
                if self.input.is_empty() {
                    self.cursor = prompt.chars().count();
                    self.input = prompt;
                }
            }
            self.banner = Some(REPLAY_RUNNING.to_string());
            return;
        }

        let prompt = match self.processor.begin(&trigger) {
            Ok(prompt) => prompt,
            Err(TurnError::EmptyPrompt) => return,
            Err(err) => {
                self.banner = Some(err.to_string());
                return;
            }
        };

        self.banner = None;
        self.status = None;
        self.follow_chat = true;

        let analyst = Arc::clone(&self.analyst);
        self.turn_task = Some(tokio::spawn(async move { analyst.ask(&prompt).await }));
    }

    /// Collect finished background work. Called on every tick.
    pub async fn poll_tasks(&mut self) {
        if self.turn_task.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(task) = self.turn_task.take() {
                match task.await {
                    Ok(result) => self.finish_turn(result),
                    Err(err) => {
                        // Task panicked; the turn still has to leave Sending
                        let _ = self
                            .processor
                            .complete(Err(AnalystError::transport(err.to_string())));
                        self.banner = Some(format!("Request aborted: {}", err));
                    }
                }
            }
        }

        if self.render_tasks.iter().any(|(_, t)| t.is_finished()) {
            let mut rendered_any = false;
            for (index, task) in std::mem::take(&mut self.render_tasks) {
                if !task.is_finished() {
                    self.render_tasks.push((index, task));
                    continue;
                }
                match task.await {
                    Ok(rendered) => {
                        self.renders.insert(index, rendered);
                        rendered_any = true;
                    }
                    Err(err) => self.banner = Some(format!("Rendering aborted: {}", err)),
                }
            }
            if rendered_any {
                self.select_latest_results();
            }
        }

        if self.replay_task.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(task) = self.replay_task.take() {
                match task.await {
                    Ok(replayed) => {
                        let count = replayed.len();
                        self.renders = replayed.into_iter().collect();
                        self.select_latest_results();
                        self.status = Some(format!("Re-rendered {} responses", count));
                    }
                    Err(err) => self.banner = Some(format!("Replay aborted: {}", err)),
                }
            }
        }

        if self.check_task.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(task) = self.check_task.take() {
                self.check_status = Some(match task.await {
                    Ok(Ok(response)) => Ok(format!(
                        "Cortex Analyst connection successful (request id: {})",
                        response.request_id.as_deref().unwrap_or("none")
                    )),
                    Ok(Err(err)) => Err(err.to_string()),
                    Err(err) => Err(err.to_string()),
                });
            }
        }
    }

    /// Record the analyst's answer, then run its SQL in the background.
    fn finish_turn(&mut self, result: Result<AnalystResponse, AnalystError>) {
        match self.processor.complete(result) {
            Ok(TurnOutcome::Succeeded { turn_index, response }) => {
                if !response.warnings.is_empty() {
                    self.status = Some(format!("Analyst warnings: {}", response.warnings.join("; ")));
                }
                let renderer = self.renderer.clone();
                let task = tokio::spawn(async move {
                    renderer
                        .render(&response.content, response.request_id.as_deref())
                        .await
                });
                self.render_tasks.push((turn_index, task));
            }
            Ok(TurnOutcome::Failed { error }) => {
                self.banner = Some(error.to_string());
            }
            Err(err) => {
                warn!(error = %err, "Turn could not be recorded");
                self.banner = Some(err.to_string());
            }
        }
        self.follow_chat = true;
    }

    pub fn submit_input(&mut self) {
        if self.input.trim().is_empty() {
            return;
        }
        if self.processor.is_sending() {
            self.banner = Some(TurnError::Busy.to_string());
            return;
        }
        if self.replay_task.is_some() {
            self.banner = Some(REPLAY_RUNNING.to_string());
            return;
        }
        let prompt = std::mem::take(&mut self.input);
        self.cursor = 0;
        self.pending.post(TurnTrigger::Typed(prompt));
    }

    pub fn ask_selected_suggestion(&mut self) {
        let suggestion = self
            .suggestions_state
            .selected()
            .and_then(|i| self.current_suggestions().get(i).cloned());
        if let Some(suggestion) = suggestion {
            self.pending.post(TurnTrigger::Suggestion(suggestion));
        }
    }

    pub fn ask_selected_sample(&mut self) {
        let selected = self
            .samples_state
            .selected()
            .and_then(|i| sample_items().get(i).map(|(_, q)| q.to_string()));
        if let Some(question) = selected {
            self.pending.post(TurnTrigger::Example(question));
            self.tab = Tab::Chat;
        }
    }

    pub fn ask_example(&mut self, number: usize) {
        if let Some(question) = EXAMPLE_QUESTIONS.get(number.wrapping_sub(1)) {
            self.pending.post(TurnTrigger::Example(question.to_string()));
        }
    }

    /// Suggestions of the newest assistant turn.
    pub fn current_suggestions(&self) -> Vec<String> {
        self.latest_render()
            .map(|r| r.suggestions().map(String::from).collect())
            .unwrap_or_default()
    }

    fn latest_render(&self) -> Option<&RenderedResponse> {
        self.renders
            .iter()
            .max_by_key(|(index, _)| **index)
            .map(|(_, rendered)| rendered)
    }

    fn select_latest_results(&mut self) {
        self.result_turn = self.renders.keys().max().copied();
        self.result_index = 0;
        self.result_view = ResultView::Table;
        self.result_scroll = 0;
        let has_suggestions = !self.current_suggestions().is_empty();
        self.suggestions_state
            .select(if has_suggestions { Some(0) } else { None });
    }

    /// Executed SQL blocks of the turn shown in the results pane.
    pub fn result_blocks(&self) -> Vec<(&str, &Result<ResultViews, cortex_core::QueryExecutionError>)> {
        self.result_turn
            .and_then(|i| self.renders.get(&i))
            .map(|r| r.results().collect())
            .unwrap_or_default()
    }

    pub fn selected_views(&self) -> Option<&ResultViews> {
        self.result_blocks()
            .into_iter()
            .nth(self.result_index)
            .and_then(|(_, outcome)| outcome.as_ref().ok())
    }

    pub fn next_result(&mut self) {
        let count = self.result_blocks().len();
        if count > 0 {
            self.result_index = (self.result_index + 1) % count;
            self.result_view = ResultView::Table;
            self.result_scroll = 0;
        }
    }

    pub fn prev_result(&mut self) {
        let count = self.result_blocks().len();
        if count > 0 {
            self.result_index = (self.result_index + count - 1) % count;
            self.result_view = ResultView::Table;
            self.result_scroll = 0;
        }
    }

    /// Step through the views this result offers.
    pub fn cycle_view(&mut self) {
        let Some(views) = self.selected_views() else {
            return;
        };
        let available = views.available();
        let current = available
            .iter()
            .position(|v| *v == self.result_view)
            .unwrap_or(0);
        self.result_view = available[(current + 1) % available.len()];
    }

    pub fn export_selected(&mut self) -> Option<PathBuf> {
        let Some(result) = self.selected_views().map(|v| v.result.clone()) else {
            self.status = Some("No query result to export".to_string());
            return None;
        };
        match export::write_csv(&self.config.export_dir(), &result, Utc::now()) {
            Ok(path) => {
                info!(path = %path.display(), rows = result.row_count(), "Exported results");
                self.status = Some(format!("Exported to {}", path.display()));
                Some(path)
            }
            Err(err) => {
                self.banner = Some(format!("Export failed: {}", err));
                None
            }
        }
    }

    /// Drop the conversation and everything derived from it.
    pub fn clear_history(&mut self) {
        if self.is_busy() {
            self.banner = Some(TurnError::Busy.to_string());
            return;
        }
        if let Err(err) = self.processor.clear() {
            self.banner = Some(err.to_string());
            return;
        }
        self.pending.clear();
        self.renders.clear();
        self.result_turn = None;
        self.result_index = 0;
        self.suggestions_state.select(None);
        self.chat_scroll = 0;
        self.banner = None;
        self.status = Some("Chat history cleared".to_string());
    }

    pub fn replay_history(&mut self) {
        if self.is_busy() {
            self.banner = Some(TurnError::Busy.to_string());
            return;
        }
        let store = self.processor.store().clone();
        let renderer = self.renderer.clone();
        self.status = Some("Re-running history...".to_string());
        self.replay_task = Some(tokio::spawn(async move { renderer.replay(&store).await }));
    }

    pub fn run_check(&mut self) {
        if self.check_task.is_some() {
            return;
        }
        let analyst = Arc::clone(&self.analyst);
        self.check_status = None;
        self.check_task = Some(tokio::spawn(async move {
            analyst.ask(cortex_core::analyst::GREETING_PROMPT).await
        }));
    }

    pub fn tick_animation(&mut self) {
        if self.processor.is_sending()
            || self.replay_task.is_some()
            || self.check_task.is_some()
            || !self.render_tasks.is_empty()
        {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_chat_down(&mut self) {
        self.follow_chat = false;
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn scroll_chat_up(&mut self) {
        self.follow_chat = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn suggestions_nav(&mut self, down: bool) {
        let len = self.current_suggestions().len();
        nav(&mut self.suggestions_state, len, down);
    }

    pub fn samples_nav(&mut self, down: bool) {
        nav(&mut self.samples_state, sample_items().len(), down);
    }

    pub fn cycle_focus(&mut self) {
        self.focus = match self.focus {
            FocusPane::Chat => FocusPane::Results,
            FocusPane::Results => FocusPane::Suggestions,
            FocusPane::Suggestions => FocusPane::Chat,
        };
    }
}

/// Quick examples followed by every categorized sample, as `(group, question)`.
pub fn sample_items() -> Vec<(&'static str, &'static str)> {
    EXAMPLE_QUESTIONS
        .iter()
        .map(|q| ("Quick examples", *q))
        .chain(all_samples())
        .collect()
}

fn nav(state: &mut ListState, len: usize, down: bool) {
    if len == 0 {
        state.select(None);
        return;
    }
    let next = match state.selected() {
        Some(i) if down => (i + 1).min(len - 1),
        Some(i) => i.saturating_sub(1),
        None => 0,
    };
    state.select(Some(next));
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_core::{ContentBlock, Session, SessionLeg, TurnState};

    fn test_app() -> App {
        let config = Config::new();
        let session = |leg, target| Arc::new(Session::new(leg, "http://127.0.0.1:1", "tok", target));
        let sessions = ConnectedSessions {
            query: session(SessionLeg::Query, config.query_target()),
            analyst: session(SessionLeg::Analyst, config.analyst_target()),
        };
        App::new(config, sessions)
    }

    /// Take over the in-flight request so tests decide how it ends.
    fn stop_turn(app: &mut App) {
        if let Some(task) = app.turn_task.take() {
            task.abort();
        }
    }

    fn answer(request_id: &str, suggestion: &str) -> AnalystResponse {
        AnalystResponse {
            content: vec![
                ContentBlock::text("Here is what I found."),
                ContentBlock::Suggestions {
                    suggestions: vec![suggestion.to_string()],
                },
            ],
            request_id: Some(request_id.to_string()),
            warnings: vec![],
        }
    }

    async fn wait_for_renders(app: &mut App) {
        for _ in 0..100 {
            if app.render_tasks.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
            app.poll_tasks().await;
        }
        assert!(app.render_tasks.is_empty());
    }

    #[tokio::test]
    async fn test_one_submission_starts_one_turn() {
        let mut app = test_app();
        app.input = "How busy are we?".to_string();
        app.cursor = app.input.len();

        app.submit_input();
        assert!(!app.pending.is_empty());
        assert!(app.input.is_empty());

        app.drain_pending();
        app.drain_pending();

        assert!(app.pending.is_empty());
        assert_eq!(app.processor.store().len(), 1);
        assert!(app.processor.is_sending());
        assert!(app.turn_task.is_some());
        stop_turn(&mut app);
    }

    #[tokio::test]
    async fn test_trigger_while_sending_adds_no_user_turn() {
        let mut app = test_app();
        app.ask_example(1);
        app.drain_pending();
        assert_eq!(app.processor.store().len(), 1);

        app.pending.post(TurnTrigger::Suggestion("Show me the bench".to_string()));
        app.drain_pending();

        assert_eq!(app.processor.store().len(), 1);
        assert!(app.pending.is_empty());
        assert_eq!(app.banner.as_deref(), Some(TurnError::Busy.to_string().as_str()));
        stop_turn(&mut app);
    }

    #[tokio::test]
    async fn test_assistant_turn_is_recorded_before_its_sql_runs() {
        let mut app = test_app();
        app.ask_example(2);
        app.drain_pending();
        assert_eq!(
            app.processor.store().turns()[0].first_text(),
            Some(EXAMPLE_QUESTIONS[1])
        );
        stop_turn(&mut app);

        app.finish_turn(Ok(answer("r1", "Who is on the bench?")));

        assert_eq!(app.processor.state(), TurnState::Succeeded);
        assert_eq!(app.processor.store().len(), 2);
        assert!(app.is_rendering(1));
        assert!(app.renders.is_empty());

        wait_for_renders(&mut app).await;
        assert!(app.renders.contains_key(&1));
        assert_eq!(app.current_suggestions(), vec!["Who is on the bench?".to_string()]);
    }

    #[tokio::test]
    async fn test_suggestion_goes_through_the_same_turn_path() {
        let mut app = test_app();
        app.ask_example(1);
        app.drain_pending();
        stop_turn(&mut app);
        app.finish_turn(Ok(answer("r1", "Who is on the bench?")));
        wait_for_renders(&mut app).await;
        app.processor.settle();

        assert_eq!(app.suggestions_state.selected(), Some(0));
        app.ask_selected_suggestion();
        app.drain_pending();
        app.drain_pending();

        let store = app.processor.store();
        assert_eq!(store.len(), 3);
        assert_eq!(store.turns()[2].first_text(), Some("Who is on the bench?"));
        assert!(app.processor.is_sending());
        stop_turn(&mut app);
    }

    #[tokio::test]
    async fn test_duplicate_request_id_runs_no_sql() {
        let mut app = test_app();
        app.ask_example(1);
        app.drain_pending();
        stop_turn(&mut app);
        app.finish_turn(Ok(answer("dup", "a")));
        wait_for_renders(&mut app).await;
        app.processor.settle();

        app.ask_example(2);
        app.drain_pending();
        stop_turn(&mut app);
        app.finish_turn(Ok(answer("dup", "b")));

        assert_eq!(app.processor.state(), TurnState::Failed);
        assert_eq!(app.processor.store().len(), 3);
        assert!(app.render_tasks.is_empty());
        assert!(app.banner.is_some());
    }

    #[tokio::test]
    async fn test_failed_turn_keeps_only_the_user_turn() {
        let mut app = test_app();
        app.ask_example(3);
        app.drain_pending();
        stop_turn(&mut app);

        app.finish_turn(Err(AnalystError::transport("connection refused")));

        assert_eq!(app.processor.state(), TurnState::Failed);
        assert_eq!(app.processor.store().len(), 1);
        assert!(app.render_tasks.is_empty());
        assert!(app.banner.is_some());
    }

    #[tokio::test]
    async fn test_typed_question_survives_a_running_replay() {
        let mut app = test_app();
        app.replay_task = Some(tokio::spawn(async { Vec::new() }));

        app.input = "Utilization by month".to_string();
        app.submit_input();
        assert_eq!(app.input, "Utilization by month");
        assert!(app.pending.is_empty());
        assert_eq!(app.banner.as_deref(), Some(REPLAY_RUNNING));

        app.input.clear();
        app.pending.post(TurnTrigger::Typed("Bench by practice".to_string()));
        app.drain_pending();
        assert_eq!(app.input, "Bench by practice");
        assert_eq!(app.cursor, "Bench by practice".chars().count());
        assert!(app.processor.store().is_empty());
    }

    #[test]
    fn test_sample_items_start_with_examples() {
        let items = sample_items();
        assert_eq!(items.len(), EXAMPLE_QUESTIONS.len() + 20);
        assert_eq!(items[0], ("Quick examples", EXAMPLE_QUESTIONS[0]));
        assert_eq!(items[6].0, "Dashboard & Overview");
    }

    #[test]
    fn test_nav_clamps() {
        let mut state = ListState::default();
        nav(&mut state, 2, true);
        assert_eq!(state.selected(), Some(0));
        nav(&mut state, 2, true);
        nav(&mut state, 2, true);
        assert_eq!(state.selected(), Some(1));
        nav(&mut state, 2, false);
        nav(&mut state, 2, false);
        assert_eq!(state.selected(), Some(0));
        nav(&mut state, 0, true);
        assert_eq!(state.selected(), None);
    }
}
