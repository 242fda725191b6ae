pub mod analyst;
pub mod auth;
pub mod config;
pub mod connection;
pub mod conversation;
pub mod error;
pub mod export;
pub mod query;
pub mod render;
pub mod samples;
pub mod session;
pub mod state;
pub mod turn;

// Re-export main types for convenience
pub use analyst::{Analyst, AnalystClient, AnalystResponse};
pub use auth::{AuthMethod, Credentials};
pub use config::{Config, CortexConfig};
pub use connection::{ConnectedSessions, ConnectionManager, ConnectionState};
pub use conversation::{ConversationStore, HistoryEntry};
pub use error::{
    AnalystError, AnalystErrorKind, ConfigError, ConnectionError, ConversationError,
    QueryExecutionError, TurnError,
};
pub use query::{Column, QueryResult, SqlExecutor};
pub use render::{ChartData, ChartSeries, RenderedBlock, RenderedResponse, Renderer, ResultView, ResultViews};
pub use session::{Authenticator, Identity, Session, SessionLeg, SessionTarget, SnowflakeAuthenticator};
pub use state::{ChatRole, ContentBlock, ConversationTurn};
pub use turn::{PendingAction, TurnOutcome, TurnProcessor, TurnState, TurnTrigger};
