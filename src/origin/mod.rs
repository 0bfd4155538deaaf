//! Same-origin primitives a tab coordinator talks through.
//!
//! A browser offers each tab a broadcast channel (lossy, unordered, never
//! echoed to the sender), a shared key-value store whose writes notify every
//! *other* tab, and the tab's own visibility state. The traits here are that
//! boundary; [`memory`] implements them in-process.

pub mod memory;

use crate::protocol::ChannelMessage;
use crate::types::Visibility;
use async_trait::async_trait;
use std::sync::Arc;

pub use memory::{MemoryInbox, MemoryOrigin, MemoryTab, VisibilityControl};

/// Change notification for the shared store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    /// None when the whole store changed (cleared, or notifications were lost)
    pub key: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl StorageChange {
    pub fn whole_store() -> Self {
        Self {
            key: None,
            old_value: None,
            new_value: None,
        }
    }

    /// Whether this change may have touched `key`
    pub fn affects(&self, key: &str) -> bool {
        self.key.as_deref().is_none_or(|changed| changed == key)
    }
}

/// Everything a tab can observe from the outside
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabEvent {
    Message(ChannelMessage),
    StorageChanged(StorageChange),
    VisibilityChanged(Visibility),
}

pub trait BroadcastChannel: Send + Sync {
    /// Fire-and-forget delivery to every other subscriber
    fn post(&self, message: &ChannelMessage);
}

pub trait SharedStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

pub trait VisibilitySource: Send + Sync {
    fn current(&self) -> Visibility;
}

/// Capabilities available to a tab running in a browser-like context
#[derive(Clone)]
pub struct BrowserContext {
    pub channel: Arc<dyn BroadcastChannel>,
    pub store: Arc<dyn SharedStore>,
    pub visibility: Arc<dyn VisibilitySource>,
}

/// Stream of events delivered to one tab
#[async_trait]
pub trait TabInbox: Send {
    /// Next event, or None once the origin is gone
    async fn next(&mut self) -> Option<TabEvent>;
}
