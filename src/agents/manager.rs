//! Agent manager - Starts, stops and triggers the session agents

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::base::{Agent, AgentError, AgentStatus};

/// Owns the registered agents and their spawned tasks
pub struct AgentManager {
    agents: RwLock<HashMap<&'static str, Arc<dyn Agent>>>,
    handles: RwLock<HashMap<&'static str, JoinHandle<()>>>,
}

impl AgentManager {
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Registers an agent, replacing any agent with the same id
    pub async fn register(&self, agent: Arc<dyn Agent>) {
        let id = agent.id();
        if let Some(previous) = self.agents.write().await.insert(id, agent) {
            if let Err(e) = self.stop_agent_internal(id, previous).await {
                tracing::warn!("Failed to stop replaced agent '{}': {}", id, e);
            }
        }
    }

    pub async fn get(&self, id: &str) -> Option<Arc<dyn Agent>> {
        self.agents.read().await.get(id).cloned()
    }

    /// Spawns every agent that is not already running
    pub async fn start_all(&self) {
        let agents = self.agents.read().await.clone();
        for (id, agent) in agents {
            if !agent.status().is_running() {
                self.spawn(id, agent).await;
            }
        }
    }

    pub async fn start_agent(&self, id: &str) -> Result<(), AgentError> {
        let (static_id, agent) = self.find(id).await?;
        if agent.status().is_running() {
            return Err(AgentError::AlreadyRunning);
        }
        self.spawn(static_id, agent).await;
        Ok(())
    }

    async fn spawn(&self, id: &'static str, agent: Arc<dyn Agent>) {
        let runner = Arc::clone(&agent);
        let handle = tokio::spawn(async move {
            if let Err(e) = runner.start().await {
                tracing::error!("Agent '{}' error: {}", runner.id(), e);
            }
        });

        self.handles.write().await.insert(id, handle);
        tracing::info!("Started agent: {}", id);
    }

    pub async fn stop_all(&self) {
        let agents = self.agents.read().await.clone();
        for (id, agent) in agents {
            if let Err(e) = self.stop_agent_internal(id, agent).await {
                tracing::warn!("Failed to stop agent '{}': {}", id, e);
            }
        }
    }

    pub async fn stop_agent(&self, id: &str) -> Result<(), AgentError> {
        let (static_id, agent) = self.find(id).await?;
        self.stop_agent_internal(static_id, agent).await
    }

    async fn stop_agent_internal(
        &self,
        id: &'static str,
        agent: Arc<dyn Agent>,
    ) -> Result<(), AgentError> {
        agent.stop().await?;

        if let Some(handle) = self.handles.write().await.remove(id) {
            handle.abort();
            tracing::info!("Stopped agent: {}", id);
        }
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<(&'static str, Arc<dyn Agent>), AgentError> {
        self.agents
            .read()
            .await
            .iter()
            .find(|(k, _)| **k == id)
            .map(|(k, v)| (*k, Arc::clone(v)))
            .ok_or_else(|| AgentError::NotFound(id.to_string()))
    }

    /// Status of every registered agent
    pub async fn status(&self) -> HashMap<&'static str, AgentStatus> {
        self.agents
            .read()
            .await
            .iter()
            .map(|(id, agent)| (*id, agent.status()))
            .collect()
    }

    pub async fn running_count(&self) -> usize {
        self.agents
            .read()
            .await
            .values()
            .filter(|a| a.status().is_running())
            .count()
    }

    /// Runs one iteration of every agent, logging failures
    pub async fn trigger_all(&self) {
        let agents = self.agents.read().await.clone();
        for agent in agents.values() {
            if let Err(e) = agent.trigger().await {
                tracing::warn!("Failed to trigger agent '{}': {}", agent.id(), e);
            }
        }
    }

    pub async fn trigger_agent(&self, id: &str) -> Result<(), AgentError> {
        let (_, agent) = self.find(id).await?;
        agent.trigger().await
    }
}

impl Default for AgentManager {
    fn default() -> Self {
        Self::new()
    }
}
