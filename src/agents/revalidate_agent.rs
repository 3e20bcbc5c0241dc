//! Revalidate agent - Re-checks the session on the staleness cadence

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::base::{Agent, AgentError, AgentStatus};
use crate::auth::AuthStore;

/// Agent that periodically runs [`AuthStore::check_auth`]
///
/// Subscribers see an expired or externally cleared session without waiting
/// for the next user action.
pub struct RevalidateAgent {
    store: Arc<AuthStore>,
    interval: Duration,
    status: RwLock<AgentStatus>,
    cancel_token: RwLock<CancellationToken>,
}

impl RevalidateAgent {
    pub fn new(store: Arc<AuthStore>, interval: Duration) -> Self {
        Self {
            store,
            interval: interval.max(Duration::from_secs(1)),
            status: RwLock::new(AgentStatus::Idle),
            cancel_token: RwLock::new(CancellationToken::new()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl Agent for RevalidateAgent {
    fn id(&self) -> &'static str {
        "revalidate"
    }

    fn name(&self) -> &'static str {
        "Session Revalidate Agent"
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
            let authenticated = self.store.check_auth().await;
            tracing::trace!("Session check: authenticated = {}", authenticated);

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = token.cancelled() => {
                    tracing::info!("Revalidate agent cancelled");
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

    /// Forces a re-check regardless of staleness
    async fn trigger(&self) -> Result<(), AgentError> {
        self.store.revalidate().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthService;
    use crate::config::AppConfig;
    use crate::storage::{MemoryStorage, Storage};

    fn store_on(storage: &MemoryStorage, staleness: Duration) -> Arc<AuthStore> {
        let service = AuthService::new(&AppConfig::default(), Arc::new(storage.clone())).unwrap();
        Arc::new(AuthStore::new(Arc::new(service), staleness))
    }

    #[test]
    fn test_interval_floor() {
        let storage = MemoryStorage::new();
        let agent = RevalidateAgent::new(store_on(&storage, Duration::ZERO), Duration::ZERO);
        assert_eq!(agent.interval(), Duration::from_secs(1));
        assert_eq!(agent.id(), "revalidate");
    }

    #[tokio::test]
    async fn test_trigger_publishes_cleared_session() {
        let storage = MemoryStorage::with_entries([("token", "abc123")]);
        let store = store_on(&storage, Duration::from_secs(300));
        let agent = RevalidateAgent::new(Arc::clone(&store), Duration::from_secs(300));
        let mut rx = store.subscribe();

        agent.trigger().await.unwrap();
        assert!(store.state().is_authenticated);

        // another instance logs out and the cache is re-read
        storage.remove("token").unwrap();
        store.service().sync_from_storage().await;
        agent.trigger().await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().is_authenticated);
    }

    #[tokio::test]
    async fn test_run_loop_checks_immediately() {
        let storage = MemoryStorage::with_entries([("token", "abc123")]);
        let store = store_on(&storage, Duration::from_secs(300));
        let agent = Arc::new(RevalidateAgent::new(Arc::clone(&store), Duration::from_secs(60)));

        let runner = Arc::clone(&agent);
        let handle = tokio::spawn(async move { runner.start().await });

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(agent.status().is_running());
        assert!(store.state().is_authenticated);
        assert!(store.state().last_checked.is_some());

        agent.stop().await.unwrap();
        handle.await.unwrap().unwrap();
        assert_eq!(agent.status(), AgentStatus::Stopped);
    }

    #[tokio::test]
    async fn test_stop_queued_behind_start_cancels_loop() {
        let storage = MemoryStorage::new();
        let agent = Arc::new(RevalidateAgent::new(
            store_on(&storage, Duration::from_secs(300)),
            Duration::from_secs(60),
        ));

        let held = agent.status.write().await;
        let runner = Arc::clone(&agent);
        let handle = tokio::spawn(async move { runner.start().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        let stopper = Arc::clone(&agent);
        let stopped = tokio::spawn(async move { stopper.stop().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(held);

        stopped.await.unwrap().unwrap();
        let finished = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(finished.is_ok(), "agent loop kept running after stop");
        assert_eq!(agent.status(), AgentStatus::Stopped);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let storage = MemoryStorage::new();
        let agent = Arc::new(RevalidateAgent::new(
            store_on(&storage, Duration::from_secs(300)),
            Duration::from_secs(60),
        ));

        for _ in 0..2 {
            let runner = Arc::clone(&agent);
            let handle = tokio::spawn(async move { runner.start().await });
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert!(agent.status().is_running());

            agent.stop().await.unwrap();
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .unwrap()
                .unwrap()
                .unwrap();
        }
    }
}
