mod tabs;

pub use tabs::{SettingsUpdate, SimTab};

use crate::broadcast::BroadcastSink;
use crate::clock::{Clock, SystemClock};
use crate::config::SandboxConfig;
use crate::coordinator::HandleError;
use crate::origin::MemoryOrigin;
use crate::protocol::ServerMessage;
use crate::ticker::{ProgressSink, Session};
use crate::types::*;
use crate::xp::XpTable;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("Unknown tab {0}")]
    UnknownTab(TabId),

    #[error(transparent)]
    Coordinator(#[from] HandleError),
}

/// Shared application state: one simulated origin and its open tabs
#[derive(Clone)]
pub struct AppState {
    pub config: SandboxConfig,
    pub origin: MemoryOrigin,
    pub clock: Arc<dyn Clock>,
    pub tabs: Arc<RwLock<HashMap<TabId, SimTab>>>,
    /// Progress advanced by whichever tab is primary
    pub session: Arc<RwLock<Session>>,
    pub xp_table: Arc<XpTable>,
    pub sink: Arc<dyn ProgressSink>,
    /// Broadcast channel for sending events to every WebSocket client
    pub broadcast: broadcast::Sender<ServerMessage>,
}

impl AppState {
    pub fn new(config: SandboxConfig) -> Self {
        Self::with_parts(config, XpTable::default(), Arc::new(SystemClock))
    }

    pub fn with_parts(config: SandboxConfig, xp_table: XpTable, clock: Arc<dyn Clock>) -> Self {
        let (tx, _rx) = broadcast::channel(100);
        Self {
            origin: MemoryOrigin::with_drop_rate(config.drop_rate),
            config,
            clock,
            tabs: Arc::new(RwLock::new(HashMap::new())),
            session: Arc::new(RwLock::new(Session::default())),
            xp_table: Arc::new(xp_table),
            sink: Arc::new(BroadcastSink::new(tx.clone())),
            broadcast: tx,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(SandboxConfig::default())
    }
}
