//! API call monitor
//!
//! Keeps the most recent API calls made through [`super::ApiClient`] for
//! debugging panels and health summaries.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

/// One recorded API call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiCall {
    pub method: String,
    /// Request path without query string
    pub path: String,
    /// HTTP status, `None` when no response arrived
    pub status: Option<u16>,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    /// Whether this was the single retry after a token refresh
    pub retried: bool,
    pub error: Option<String>,
}

impl ApiCall {
    /// True when a response arrived with a 2xx status
    pub fn is_success(&self) -> bool {
        self.status.map_or(false, |s| (200..300).contains(&s))
    }
}

/// Aggregate view of the recorded calls
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonitorStats {
    pub total: usize,
    pub failures: usize,
    pub unauthorized: usize,
    pub retried: usize,
    pub avg_duration_ms: u64,
}

/// Bounded log of recent API calls
pub struct ApiMonitor {
    capacity: usize,
    calls: RwLock<VecDeque<ApiCall>>,
}

impl ApiMonitor {
    /// Creates a monitor keeping at most `capacity` calls
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            calls: RwLock::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    /// Records a call, evicting the oldest one when full
    pub async fn record(&self, call: ApiCall) {
        if !call.is_success() {
            tracing::debug!(
                "API {} {} -> {:?} ({} ms)",
                call.method,
                call.path,
                call.status,
                call.duration_ms
            );
        }

        let mut calls = self.calls.write().await;
        if calls.len() == self.capacity {
            calls.pop_front();
        }
        calls.push_back(call);
    }

    /// Returns up to `n` most recent calls, newest first
    pub async fn recent(&self, n: usize) -> Vec<ApiCall> {
        self.calls.read().await.iter().rev().take(n).cloned().collect()
    }

    /// Summarizes the recorded calls
    pub async fn stats(&self) -> MonitorStats {
        let calls = self.calls.read().await;
        if calls.is_empty() {
            return MonitorStats::default();
        }

        let total_ms: u64 = calls.iter().map(|c| c.duration_ms).sum();
        MonitorStats {
            total: calls.len(),
            failures: calls.iter().filter(|c| !c.is_success()).count(),
            unauthorized: calls.iter().filter(|c| c.status == Some(401)).count(),
            retried: calls.iter().filter(|c| c.retried).count(),
            avg_duration_ms: total_ms / calls.len() as u64,
        }
    }

    /// Forgets every recorded call
    pub async fn clear(&self) {
        self.calls.write().await.clear();
    }
}

impl Default for ApiMonitor {
    fn default() -> Self {
        Self::new(100)
    }
}
