//! Agent module - Background session upkeep
//!
//! - `StorageSyncAgent`: follows logins and logouts made by other instances
//! - `RevalidateAgent`: re-checks the session once it goes stale

mod base;
mod manager;
mod revalidate_agent;
mod sync_agent;

pub use base::{Agent, AgentError, AgentStatus};
pub use manager::AgentManager;
pub use revalidate_agent::RevalidateAgent;
pub use sync_agent::StorageSyncAgent;
