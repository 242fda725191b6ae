//! Creation and caching of the query and analyst sessions.

use std::sync::Arc;
use tracing::{error, info};

use crate::config::Config;
use crate::error::ConnectionError;
use crate::session::{Authenticator, Session, SessionLeg, SessionTarget};

/// Process-wide session handles for one user session.
#[derive(Debug, Default, Clone)]
pub struct ConnectionState {
    pub query: Option<Arc<Session>>,
    pub analyst: Option<Arc<Session>>,
}

/// Both sessions, only ever handed out together.
#[derive(Debug, Clone)]
pub struct ConnectedSessions {
    pub query: Arc<Session>,
    pub analyst: Arc<Session>,
}

impl ConnectedSessions {
    pub fn get(&self, leg: SessionLeg) -> Arc<Session> {
        match leg {
            SessionLeg::Query => Arc::clone(&self.query),
            SessionLeg::Analyst => Arc::clone(&self.analyst),
        }
    }
}

pub struct ConnectionManager<A: Authenticator> {
    authenticator: A,
    query_target: SessionTarget,
    analyst_target: SessionTarget,
    state: ConnectionState,
}

impl<A: Authenticator> ConnectionManager<A> {
    pub fn new(authenticator: A, query_target: SessionTarget, analyst_target: SessionTarget) -> Self {
        Self {
            authenticator,
            query_target,
            analyst_target,
            state: ConnectionState::default(),
        }
    }

    pub fn from_config(authenticator: A, config: &Config) -> Self {
        Self::new(
            authenticator,
            config.target_for(SessionLeg::Query),
            config.target_for(SessionLeg::Analyst),
        )
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state.query.is_some() && self.state.analyst.is_some()
    }

    /// Open whichever sessions are missing. A no-op once both exist.
    ///
    /// The query leg is opened first. If either leg fails the error names
    /// it and no sessions are returned; a leg that did open stays cached.
    pub async fn ensure_connections(&mut self) -> Result<ConnectedSessions, ConnectionError> {
        if let (Some(query), Some(analyst)) = (&self.state.query, &self.state.analyst) {
            return Ok(ConnectedSessions {
                query: Arc::clone(query),
                analyst: Arc::clone(analyst),
            });
        }

        let query = match self.state.query.clone() {
            Some(session) => session,
            None => {
                let session = self.open(SessionLeg::Query).await?;
                self.state.query = Some(Arc::clone(&session));
                session
            }
        };

        let analyst = match self.state.analyst.clone() {
            Some(session) => session,
            None => {
                let session = self.open(SessionLeg::Analyst).await?;
                self.state.analyst = Some(Arc::clone(&session));
                session
            }
        };

        Ok(ConnectedSessions { query, analyst })
    }

    async fn open(&self, leg: SessionLeg) -> Result<Arc<Session>, ConnectionError> {
        let target = match leg {
            SessionLeg::Query => &self.query_target,
            SessionLeg::Analyst => &self.analyst_target,
        };
        info!(%leg, warehouse = %target.warehouse, database = %target.database, "Opening session");

        match self.authenticator.open(leg, target).await {
            Ok(session) => Ok(Arc::new(session)),
            Err(err) => {
                error!(%leg, error = %err, "Session could not be opened");
                Err(err)
            }
        }
    }
}
