//! In-process origin: every tab opened here shares one store and one set of
//! named broadcast channels, with browser delivery rules.

use super::{
    BroadcastChannel, BrowserContext, SharedStore, StorageChange, TabEvent, TabInbox,
    VisibilitySource,
};
use crate::protocol::ChannelMessage;
use crate::types::{Visibility, DEFAULT_CHANNEL_NAME};
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch};

/// Per-channel buffer. A receiver that falls further behind loses messages.
const CHANNEL_CAPACITY: usize = 256;

/// Browsing-context id, used only to keep senders from hearing themselves
type ContextId = u64;

#[derive(Debug, Clone)]
struct Envelope<T> {
    from: ContextId,
    payload: T,
}

struct OriginInner {
    storage: Mutex<HashMap<String, String>>,
    storage_events: broadcast::Sender<Envelope<StorageChange>>,
    channels: Mutex<HashMap<String, broadcast::Sender<Envelope<ChannelMessage>>>>,
    next_context: AtomicU64,
    drop_rate: f64,
}

impl OriginInner {
    fn storage(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn channel(&self, name: &str) -> broadcast::Sender<Envelope<ChannelMessage>> {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Publish while the storage lock is held so events leave in write order
    fn notify(&self, from: ContextId, change: StorageChange) {
        // No receivers is fine
        let _ = self.storage_events.send(Envelope {
            from,
            payload: change,
        });
    }
}

/// Shared state of one simulated browser profile + origin
#[derive(Clone)]
pub struct MemoryOrigin {
    inner: Arc<OriginInner>,
}

impl MemoryOrigin {
    pub fn new() -> Self {
        Self::with_drop_rate(0.0)
    }

    /// Each receiving tab independently loses a broadcast message with this
    /// probability. Storage notifications are never dropped.
    pub fn with_drop_rate(drop_rate: f64) -> Self {
        let (storage_events, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(OriginInner {
                storage: Mutex::new(HashMap::new()),
                storage_events,
                channels: Mutex::new(HashMap::new()),
                next_context: AtomicU64::new(1),
                drop_rate: drop_rate.clamp(0.0, 1.0),
            }),
        }
    }

    /// Open a tab subscribed to the default channel
    pub fn open_tab(&self, visibility: Visibility) -> MemoryTab {
        self.open_tab_on(DEFAULT_CHANNEL_NAME, visibility)
    }

    pub fn open_tab_on(&self, channel_name: &str, visibility: Visibility) -> MemoryTab {
        let context = self.inner.next_context.fetch_add(1, Ordering::Relaxed);
        let channel = self.inner.channel(channel_name);
        let (visibility_tx, visibility_rx) = watch::channel(visibility);
        let visibility_tx = Arc::new(visibility_tx);

        let inbox = MemoryInbox {
            context,
            messages: channel.subscribe(),
            storage: self.inner.storage_events.subscribe(),
            visibility: visibility_rx,
            drop_rate: self.inner.drop_rate,
        };

        let browser = BrowserContext {
            channel: Arc::new(MemoryChannel { context, channel }),
            store: Arc::new(MemoryStore {
                origin: self.inner.clone(),
                context,
            }),
            visibility: Arc::new(MemoryVisibility {
                state: visibility_tx.clone(),
            }),
        };

        tracing::debug!(context, channel = channel_name, ?visibility, "Opened tab");

        MemoryTab {
            context: browser,
            inbox,
            visibility: VisibilityControl { tx: visibility_tx },
        }
    }

    /// Read a key without being a tab (devtools view)
    pub fn peek(&self, key: &str) -> Option<String> {
        self.inner.storage().get(key).cloned()
    }

    /// Write a key from outside every tab; all tabs are notified
    pub fn poke(&self, key: &str, value: &str) {
        MemoryStore {
            origin: self.inner.clone(),
            context: 0,
        }
        .set(key, value);
    }

    /// Clear the whole store; all tabs receive a whole-store change
    pub fn clear(&self) {
        let mut storage = self.inner.storage();
        if storage.is_empty() {
            return;
        }
        storage.clear();
        self.inner.notify(0, StorageChange::whole_store());
    }
}

impl Default for MemoryOrigin {
    fn default() -> Self {
        Self::new()
    }
}

struct MemoryChannel {
    context: ContextId,
    channel: broadcast::Sender<Envelope<ChannelMessage>>,
}

impl BroadcastChannel for MemoryChannel {
    fn post(&self, message: &ChannelMessage) {
        let _ = self.channel.send(Envelope {
            from: self.context,
            payload: message.clone(),
        });
    }
}

struct MemoryStore {
    origin: Arc<OriginInner>,
    context: ContextId,
}

impl SharedStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.origin.storage().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut storage = self.origin.storage();
        let old_value = storage.insert(key.to_string(), value.to_string());
        // Writing the same value again is not a change
        if old_value.as_deref() == Some(value) {
            return;
        }
        self.origin.notify(
            self.context,
            StorageChange {
                key: Some(key.to_string()),
                old_value,
                new_value: Some(value.to_string()),
            },
        );
    }

    fn remove(&self, key: &str) {
        let mut storage = self.origin.storage();
        if let Some(old_value) = storage.remove(key) {
            self.origin.notify(
                self.context,
                StorageChange {
                    key: Some(key.to_string()),
                    old_value: Some(old_value),
                    new_value: None,
                },
            );
        }
    }
}

struct MemoryVisibility {
    state: Arc<watch::Sender<Visibility>>,
}

impl VisibilitySource for MemoryVisibility {
    fn current(&self) -> Visibility {
        *self.state.borrow()
    }
}

/// Lets the embedder (user, window manager, test) foreground or hide a tab
#[derive(Clone)]
pub struct VisibilityControl {
    tx: Arc<watch::Sender<Visibility>>,
}

impl VisibilityControl {
    pub fn current(&self) -> Visibility {
        *self.tx.borrow()
    }

    /// Returns true if the visibility actually changed
    pub fn set(&self, visibility: Visibility) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == visibility {
                false
            } else {
                *current = visibility;
                true
            }
        })
    }
}

/// One open tab: what its coordinator gets plus the embedder's controls.
/// Dropping it is an abrupt close.
pub struct MemoryTab {
    context: BrowserContext,
    inbox: MemoryInbox,
    visibility: VisibilityControl,
}

impl MemoryTab {
    pub fn context(&self) -> BrowserContext {
        self.context.clone()
    }

    pub fn visibility(&self) -> VisibilityControl {
        self.visibility.clone()
    }

    pub fn inbox_mut(&mut self) -> &mut MemoryInbox {
        &mut self.inbox
    }

    pub fn into_parts(self) -> (BrowserContext, MemoryInbox, VisibilityControl) {
        (self.context, self.inbox, self.visibility)
    }
}

pub struct MemoryInbox {
    context: ContextId,
    messages: broadcast::Receiver<Envelope<ChannelMessage>>,
    storage: broadcast::Receiver<Envelope<StorageChange>>,
    visibility: watch::Receiver<Visibility>,
    drop_rate: f64,
}

impl MemoryInbox {
    fn accept_message(&self, envelope: Envelope<ChannelMessage>) -> Option<ChannelMessage> {
        if envelope.from == self.context {
            return None;
        }
        if self.drop_rate > 0.0 && rand::rng().random_bool(self.drop_rate) {
            tracing::trace!(context = self.context, "Dropped broadcast message");
            return None;
        }
        Some(envelope.payload)
    }

    fn accept_change(&self, envelope: Envelope<StorageChange>) -> Option<StorageChange> {
        (envelope.from != self.context).then_some(envelope.payload)
    }

    /// Deliver one pending event without waiting.
    ///
    /// Visibility changes come first, then storage notifications, then
    /// broadcast messages.
    pub fn try_next(&mut self) -> Option<TabEvent> {
        if self.visibility.has_changed().unwrap_or(false) {
            let visibility = *self.visibility.borrow_and_update();
            return Some(TabEvent::VisibilityChanged(visibility));
        }

        loop {
            match self.storage.try_recv() {
                Ok(envelope) => {
                    if let Some(change) = self.accept_change(envelope) {
                        return Some(TabEvent::StorageChanged(change));
                    }
                }
                Err(TryRecvError::Lagged(missed)) => {
                    tracing::warn!(
                        context = self.context,
                        missed,
                        "Storage notifications lagged, rescanning"
                    );
                    return Some(TabEvent::StorageChanged(StorageChange::whole_store()));
                }
                Err(_) => break,
            }
        }

        loop {
            match self.messages.try_recv() {
                Ok(envelope) => {
                    if let Some(message) = self.accept_message(envelope) {
                        return Some(TabEvent::Message(message));
                    }
                }
                Err(TryRecvError::Lagged(missed)) => {
                    tracing::debug!(context = self.context, missed, "Broadcast messages lost");
                }
                Err(_) => return None,
            }
        }
    }

    /// Drain everything currently pending
    pub fn drain(&mut self) -> Vec<TabEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

#[async_trait]
impl TabInbox for MemoryInbox {
    async fn next(&mut self) -> Option<TabEvent> {
        loop {
            tokio::select! {
                changed = self.visibility.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                    let visibility = *self.visibility.borrow_and_update();
                    return Some(TabEvent::VisibilityChanged(visibility));
                }
                received = self.storage.recv() => match received {
                    Ok(envelope) => {
                        if let Some(change) = self.accept_change(envelope) {
                            return Some(TabEvent::StorageChanged(change));
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(
                            context = self.context,
                            missed,
                            "Storage notifications lagged, rescanning"
                        );
                        return Some(TabEvent::StorageChanged(StorageChange::whole_store()));
                    }
                    Err(RecvError::Closed) => return None,
                },
                received = self.messages.recv() => match received {
                    Ok(envelope) => {
                        if let Some(message) = self.accept_message(envelope) {
                            return Some(TabEvent::Message(message));
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::debug!(context = self.context, missed, "Broadcast messages lost");
                    }
                    Err(RecvError::Closed) => return None,
                },
            }
        }
    }
}
