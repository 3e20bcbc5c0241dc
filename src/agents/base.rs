//! Agent trait and lifecycle types
//!
//! Background agents keep the session state current without user action:
//! one follows changes made by other instances sharing the store, another
//! re-validates the session once it goes stale.

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised while driving an agent
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("Agent is already running")]
    AlreadyRunning,

    #[error("Agent '{0}' not found")]
    NotFound(String),

    /// The agent's work could not be performed
    #[error("Agent operation failed: {0}")]
    OperationFailed(String),
}

/// Lifecycle state of an agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStatus {
    Idle,
    Running,
    Error(String),
    Stopped,
}

impl AgentStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, AgentStatus::Running)
    }

    /// True for agents that can be started
    pub fn is_stopped(&self) -> bool {
        matches!(self, AgentStatus::Idle | AgentStatus::Stopped)
    }

    pub fn has_error(&self) -> bool {
        matches!(self, AgentStatus::Error(_))
    }
}

/// A long-running background task
///
/// `start` runs the agent loop until `stop` is called; implementations select
/// on a cancellation token. `trigger` performs one iteration immediately.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable identifier used by [`super::AgentManager`]
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn status(&self) -> AgentStatus;

    async fn start(&self) -> Result<(), AgentError>;

    async fn stop(&self) -> Result<(), AgentError>;

    async fn trigger(&self) -> Result<(), AgentError> {
        Ok(())
    }
}
