//! Storage sync agent - Follows session changes made by other instances
//!
//! Every instance that changes the session writes the `auth_last_updated`
//! marker. This agent polls the marker and, when it moves, re-hydrates the
//! cache and republishes the store state. Last write wins.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::base::{Agent, AgentError, AgentStatus};
use crate::auth::AuthStore;

/// Agent that keeps one instance in step with the shared session store
pub struct StorageSyncAgent {
    store: Arc<AuthStore>,
    interval: Duration,
    status: RwLock<AgentStatus>,
    cancel_token: RwLock<CancellationToken>,
    last_marker: RwLock<Option<String>>,
}

impl StorageSyncAgent {
    /// Creates an agent polling every `interval`
    pub fn new(store: Arc<AuthStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            status: RwLock::new(AgentStatus::Idle),
            cancel_token: RwLock::new(CancellationToken::new()),
            last_marker: RwLock::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Checks the marker once
    ///
    /// Returns true when it changed and the session was re-read.
    pub async fn poll(&self) -> bool {
        let service = self.store.service();
        if !service.is_available().await {
            return false;
        }

        let marker = service.last_updated_marker().await;
        {
            let mut last = self.last_marker.write().await;
            if *last == marker {
                return false;
            }
            *last = marker;
        }

        tracing::debug!("Session marker changed, re-reading shared store");
        service.sync_from_storage().await;
        self.store.revalidate().await;
        true
    }
}

#[async_trait]
impl Agent for StorageSyncAgent {
    fn id(&self) -> &'static str {
        "storage-sync"
    }

    fn name(&self) -> &'static str {
        "Storage Sync Agent"
    }

    fn status(&self) -> AgentStatus {
        self.status
            .try_read()
            .map(|s| s.clone())
            .unwrap_or(AgentStatus::Idle)
    }

    async fn start(&self) -> Result<(), AgentError> {
        let token = {
            let mut status = self.status.write().await;
            if status.is_running() {
                return Err(AgentError::AlreadyRunning);
            }
            // a stop() racing this start must see the new token
            let token = CancellationToken::new();
            *self.cancel_token.write().await = token.clone();
            *status = AgentStatus::Running;
            token
        };

        loop {
            self.poll().await;
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = token.cancelled() => {
                    tracing::info!("Storage sync agent cancelled");
                    break;
                }
            }
        }

        *self.status.write().await = AgentStatus::Stopped;
        Ok(())
    }

    async fn stop(&self) -> Result<(), AgentError> {
        if !self.status.read().await.is_running() {
            return Ok(());
        }

        self.cancel_token.read().await.cancel();
        *self.status.write().await = AgentStatus::Stopped;
        Ok(())
    }

    async fn trigger(&self) -> Result<(), AgentError> {
        self.poll().await;
        Ok(())
    }
}
