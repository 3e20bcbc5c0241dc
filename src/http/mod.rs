//! HTTP module - Authenticated API client and call monitor

mod client;
mod monitor;

pub use client::{ApiClient, ApiError, ApiRequest};
pub use monitor::{ApiCall, ApiMonitor, MonitorStats};
