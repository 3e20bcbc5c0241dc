//! Doca Session - Client-side session layer for the Doca storefront
//!
//! Keeps the signed-in user's tokens and profile in a persistent store shared
//! by every running instance, exposes them to UI code as observable state, and
//! authenticates API calls with transparent token refresh.
//!
//! ## Architecture
//!
//! - **Storage**: key/value backends (SQLite, OS keyring, memory, unavailable)
//! - **Auth**: session cache, auth service, reactive store and cookie mirror
//! - **HTTP**: bearer-authenticated API client with one-shot refresh on 401
//! - **Agents**: cross-instance sync and periodic session revalidation
//! - **Cart**: shopping cart persisted next to the session
//! - **Security**: input sanitization and zeroizing token strings

pub mod agents;
pub mod auth;
pub mod cart;
pub mod config;
pub mod http;
pub mod security;
pub mod storage;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use agents::{AgentManager, RevalidateAgent, StorageSyncAgent};
use auth::{AuthService, AuthStore};
use cart::CartStore;
use config::AppConfig;
use http::{ApiClient, ApiMonitor};
use storage::{SqliteStorage, Storage};

/// Default log directives when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "doca_session=debug,info";

/// Installs the global tracing subscriber
///
/// `RUST_LOG` takes precedence over [`DEFAULT_LOG_FILTER`]. Calling this more
/// than once is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Everything a front end needs, wired together
pub struct AppState {
    pub config: AppConfig,
    pub auth: Arc<AuthService>,
    pub store: Arc<AuthStore>,
    pub api: ApiClient,
    pub monitor: Arc<ApiMonitor>,
    pub cart: CartStore,
    pub agent_manager: AgentManager,
}

impl AppState {
    /// Wires the session layer on top of `storage`
    pub async fn new(config: AppConfig, storage: Arc<dyn Storage>) -> Result<Self> {
        let auth = Arc::new(
            AuthService::new(&config, Arc::clone(&storage)).context("Failed to create auth service")?,
        );
        let store = Arc::new(AuthStore::new(Arc::clone(&auth), config.staleness()));
        let monitor = Arc::new(ApiMonitor::new(config.monitor_capacity));
        let api = ApiClient::new(Arc::clone(&auth), Arc::clone(&monitor));
        let cart = CartStore::new(storage);

        let agent_manager = AgentManager::new();
        agent_manager
            .register(Arc::new(StorageSyncAgent::new(
                Arc::clone(&store),
                config.storage_sync_interval(),
            )))
            .await;
        agent_manager
            .register(Arc::new(RevalidateAgent::new(Arc::clone(&store), config.staleness())))
            .await;

        Ok(Self {
            config,
            auth,
            store,
            api,
            monitor,
            cart,
            agent_manager,
        })
    }

    /// Wires the session layer on the SQLite store in the config directory
    pub async fn open(config: AppConfig) -> Result<Self> {
        let path = Self::storage_path().context("Could not determine storage path")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data dir {:?}", parent))?;
        }
        let storage = SqliteStorage::open(&path)
            .with_context(|| format!("Failed to open session store {:?}", path))?;
        Self::new(config, Arc::new(storage)).await
    }

    /// Location of the shared session database
    pub fn storage_path() -> Option<PathBuf> {
        AppConfig::config_dir().map(|dir| dir.join("session.db"))
    }

    /// Hydrates the session and starts the background agents
    pub async fn start(&self) {
        self.auth.initialize().await;
        self.store.revalidate().await;
        self.agent_manager.start_all().await;
        tracing::info!("Session layer started (API: {})", self.auth.base_url());
    }

    /// Stops the background agents
    pub async fn shutdown(&self) {
        self.agent_manager.stop_all().await;
        tracing::info!("Session layer stopped");
    }
}
