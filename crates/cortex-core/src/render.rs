//! Turns analyst content blocks into displayable, chart-ready output.
//!
//! Blocks are rendered strictly in the order the analyst returned them. SQL
//! blocks are executed here; a failing statement only marks its own block.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::conversation::ConversationStore;
use crate::error::QueryExecutionError;
use crate::export;
use crate::query::{QueryResult, SqlExecutor};
use crate::state::{ChatRole, ContentBlock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultView {
    Table,
    Line,
    Bar,
}

impl ResultView {
    pub fn label(&self) -> &'static str {
        match self {
            ResultView::Table => "Data",
            ResultView::Line => "Line Chart",
            ResultView::Bar => "Bar Chart",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub name: String,
    pub points: Vec<Option<f64>>,
}

/// Column 0 is always the category axis; every other column with at least
/// one numeric cell becomes a series.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    pub category_column: String,
    pub categories: Vec<String>,
    pub series: Vec<ChartSeries>,
}

impl ChartData {
    pub fn from_result(result: &QueryResult) -> Self {
        let category_column = result
            .columns
            .first()
            .map(|c| c.name.clone())
            .unwrap_or_default();
        let categories = (0..result.row_count())
            .map(|row| result.cell(row, 0).unwrap_or_default().to_string())
            .collect();

        let series = result
            .columns
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(col, column)| {
                let points: Vec<Option<f64>> =
                    (0..result.row_count()).map(|row| result.numeric(row, col)).collect();
                points.iter().any(Option::is_some).then(|| ChartSeries {
                    name: column.name.clone(),
                    points,
                })
            })
            .collect();

        Self {
            category_column,
            categories,
            series,
        }
    }

    /// (min, max) over all points, if any point exists.
    pub fn value_bounds(&self) -> Option<(f64, f64)> {
        self.series
            .iter()
            .flat_map(|s| s.points.iter().flatten().copied())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Views offered for one executed statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultViews {
    pub result: QueryResult,
    /// Shared by the line and bar views; present only for more than one row.
    pub chart: Option<ChartData>,
}

impl ResultViews {
    pub fn new(result: QueryResult) -> Self {
        let chart = (result.row_count() > 1).then(|| ChartData::from_result(&result));
        Self { result, chart }
    }

    pub fn available(&self) -> Vec<ResultView> {
        if self.chart.is_some() {
            vec![ResultView::Table, ResultView::Line, ResultView::Bar]
        } else {
            vec![ResultView::Table]
        }
    }

    pub fn to_csv(&self) -> String {
        export::to_csv(&self.result)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderedBlock {
    Prose(String),
    /// Each entry is independently selectable and re-enters turn processing.
    Suggestions(Vec<String>),
    Sql {
        statement: String,
        outcome: Result<ResultViews, QueryExecutionError>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedResponse {
    pub request_id: Option<String>,
    pub blocks: Vec<RenderedBlock>,
}

impl RenderedResponse {
    pub fn suggestions(&self) -> impl Iterator<Item = &str> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                RenderedBlock::Suggestions(items) => Some(items),
                _ => None,
            })
            .flatten()
            .map(String::as_str)
    }

    pub fn results(&self) -> impl Iterator<Item = (&str, &Result<ResultViews, QueryExecutionError>)> {
        self.blocks.iter().filter_map(|b| match b {
            RenderedBlock::Sql { statement, outcome } => Some((statement.as_str(), outcome)),
            _ => None,
        })
    }
}

#[derive(Clone)]
pub struct Renderer {
    executor: Arc<dyn SqlExecutor>,
}

impl Renderer {
    pub fn new(executor: Arc<dyn SqlExecutor>) -> Self {
        Self { executor }
    }

    pub async fn render(&self, content: &[ContentBlock], request_id: Option<&str>) -> RenderedResponse {
        let mut blocks = Vec::with_capacity(content.len());

        for block in content {
            let rendered = match block {
                ContentBlock::Text { text } => RenderedBlock::Prose(text.clone()),
                ContentBlock::Suggestions { suggestions } => {
                    RenderedBlock::Suggestions(suggestions.clone())
                }
                ContentBlock::SqlStatement { statement } => {
                    debug!(request_id = ?request_id, "Running analyst SQL");
                    let outcome = self.executor.execute(statement).await.map(ResultViews::new);
                    if let Err(err) = &outcome {
                        warn!(request_id = ?request_id, error = %err, "Analyst SQL failed");
                    }
                    RenderedBlock::Sql {
                        statement: statement.clone(),
                        outcome,
                    }
                }
            };
            blocks.push(rendered);
        }

        RenderedResponse {
            request_id: request_id.map(String::from),
            blocks,
        }
    }

    /// Re-render every assistant turn, keyed by its index in the store.
    pub async fn replay(&self, store: &ConversationStore) -> Vec<(usize, RenderedResponse)> {
        let mut out = Vec::new();
        for (index, turn) in store.turns().iter().enumerate() {
            if turn.role == ChatRole::Assistant {
                let rendered = self.render(&turn.content, turn.request_id.as_deref()).await;
                out.push((index, rendered));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Column;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedExecutor {
        rows: usize,
        fail_on: Option<&'static str>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SqlExecutor for ScriptedExecutor {
        async fn execute(&self, statement: &str) -> Result<QueryResult, QueryExecutionError> {
            self.seen.lock().unwrap().push(statement.to_string());
            if Some(statement) == self.fail_on {
                return Err(QueryExecutionError::new("invalid identifier 'RATE'"));
            }
            Ok(monthly(self.rows))
        }
    }

    fn executor(rows: usize, fail_on: Option<&'static str>) -> Arc<ScriptedExecutor> {
        Arc::new(ScriptedExecutor {
            rows,
            fail_on,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn monthly(rows: usize) -> QueryResult {
        QueryResult::new(
            vec![
                Column { name: "MONTH".into(), data_type: "text".into() },
                Column { name: "RATE".into(), data_type: "fixed".into() },
                Column { name: "NOTE".into(), data_type: "text".into() },
            ],
            (0..rows)
                .map(|i| {
                    vec![
                        Some(format!("2024-{:02}", i + 1)),
                        Some(format!("0.{}", 5 + i)),
                        Some("n/a".to_string()),
                    ]
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_blocks_render_in_received_order() {
        let renderer = Renderer::new(executor(6, None));
        let content = vec![
            ContentBlock::text("Here are the trends..."),
            ContentBlock::sql("SELECT month, rate FROM u"),
            ContentBlock::suggestions(["By team?"]),
        ];

        let rendered = renderer.render(&content, Some("abc123")).await;
        assert_eq!(rendered.request_id.as_deref(), Some("abc123"));
        assert!(matches!(rendered.blocks[0], RenderedBlock::Prose(_)));
        assert!(matches!(rendered.blocks[1], RenderedBlock::Sql { .. }));
        assert!(matches!(rendered.blocks[2], RenderedBlock::Suggestions(_)));
        assert_eq!(rendered.suggestions().collect::<Vec<_>>(), vec!["By team?"]);
    }

    #[tokio::test]
    async fn test_multi_row_result_offers_three_views_on_same_rows() {
        let renderer = Renderer::new(executor(6, None));
        let rendered = renderer.render(&[ContentBlock::sql("SELECT 1")], None).await;

        let (_, outcome) = rendered.results().next().unwrap();
        let views = outcome.as_ref().unwrap();
        assert_eq!(
            views.available(),
            vec![ResultView::Table, ResultView::Line, ResultView::Bar]
        );

        let chart = views.chart.as_ref().unwrap();
        assert_eq!(chart.category_column, "MONTH");
        assert_eq!(chart.categories.len(), views.result.row_count());
        assert_eq!(chart.categories[0], "2024-01");
        // NOTE has no numeric cells, so only RATE is charted
        assert_eq!(chart.series.len(), 1);
        assert_eq!(chart.series[0].name, "RATE");
        assert_eq!(chart.series[0].points[0], Some(0.5));
    }

    #[tokio::test]
    async fn test_single_and_empty_results_are_table_only() {
        for rows in [0, 1] {
            let renderer = Renderer::new(executor(rows, None));
            let rendered = renderer.render(&[ContentBlock::sql("SELECT 1")], None).await;
            let (_, outcome) = rendered.results().next().unwrap();
            let views = outcome.as_ref().unwrap();
            assert_eq!(views.available(), vec![ResultView::Table]);
            assert!(views.chart.is_none());
        }
    }

    #[tokio::test]
    async fn test_failed_statement_does_not_stop_rendering() {
        let exec = executor(3, Some("SELECT bad"));
        let renderer = Renderer::new(exec.clone());
        let content = vec![
            ContentBlock::sql("SELECT bad"),
            ContentBlock::text("after"),
            ContentBlock::sql("SELECT good"),
        ];

        let rendered = renderer.render(&content, Some("r")).await;
        assert_eq!(rendered.blocks.len(), 3);
        let outcomes: Vec<bool> = rendered.results().map(|(_, o)| o.is_ok()).collect();
        assert_eq!(outcomes, vec![false, true]);
        assert_eq!(rendered.blocks[1], RenderedBlock::Prose("after".to_string()));
        assert_eq!(exec.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_replay_renders_only_assistant_turns() {
        let exec = executor(2, None);
        let renderer = Renderer::new(exec.clone());
        let mut store = ConversationStore::new();
        store.push_user("q1");
        store
            .push_assistant(vec![ContentBlock::sql("SELECT a")], Some("r1".to_string()))
            .unwrap();
        store.push_user("q2");
        store
            .push_assistant(vec![ContentBlock::text("t")], Some("r2".to_string()))
            .unwrap();

        let replayed = renderer.replay(&store).await;
        let indices: Vec<usize> = replayed.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![1, 3]);
        assert_eq!(replayed[1].1.request_id.as_deref(), Some("r2"));
        assert_eq!(exec.seen.lock().unwrap().as_slice(), ["SELECT a".to_string()]);
    }

    #[test]
    fn test_value_bounds() {
        let chart = ChartData::from_result(&monthly(3));
        assert_eq!(chart.value_bounds(), Some((0.5, 0.7)));
        let empty = ChartData::from_result(&QueryResult::default());
        assert_eq!(empty.value_bounds(), None);
    }
}
