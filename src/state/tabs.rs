use super::{AppState, SandboxError};
use crate::broadcast::spawn_primary_watcher;
use crate::coordinator::{spawn_coordinator, ClaimOutcome, Coordinator, CoordinatorHandle};
use crate::origin::{SharedStore, VisibilityControl};
use crate::protocol::{ServerMessage, TabSnapshot};
use crate::settings::{Preferences, Settings};
use crate::ticker::{spawn_primary_ticker, TickerContext};
use crate::types::*;
use serde::Deserialize;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Partial preference update; absent fields are left alone
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SettingsUpdate {
    pub show_delete_warning: Option<bool>,
    pub locale: Option<String>,
}

/// A tab opened through the sandbox
pub struct SimTab {
    pub label: String,
    pub handle: CoordinatorHandle,
    pub visibility: VisibilityControl,
    store: Arc<dyn SharedStore>,
    tasks: Vec<JoinHandle<()>>,
}

impl SimTab {
    pub fn snapshot(&self) -> TabSnapshot {
        TabSnapshot {
            id: self.handle.id().clone(),
            label: self.label.clone(),
            visibility: self.visibility.current(),
            is_primary: self.handle.is_primary(),
        }
    }
}

impl AppState {
    /// Open a tab and start its coordinator, ticker and flag watcher
    pub async fn open_tab(&self, visibility: Visibility) -> TabSnapshot {
        let (context, inbox, control) = self
            .origin
            .open_tab_on(&self.config.coordinator.channel_name, visibility)
            .into_parts();
        let store = context.store.clone();

        let coordinator = Coordinator::detect(
            Some(context),
            self.config.coordinator.clone(),
            self.clock.clone(),
        );
        let handle = spawn_coordinator(coordinator, Some(Box::new(inbox)));
        let id = handle.id().clone();
        let label = petname::petname(2, "-").unwrap_or_else(|| id.to_string());

        let ticker = spawn_primary_ticker(
            id.clone(),
            handle.primary(),
            self.config.tick_period,
            TickerContext {
                session: self.session.clone(),
                table: self.xp_table.clone(),
                sink: self.sink.clone(),
            },
        );
        let watcher = spawn_primary_watcher(
            self.broadcast.clone(),
            id.clone(),
            label.clone(),
            handle.primary(),
        );

        let tab = SimTab {
            label,
            handle,
            visibility: control,
            store,
            tasks: vec![ticker, watcher],
        };
        let snapshot = tab.snapshot();
        self.tabs.write().await.insert(id.clone(), tab);

        tracing::info!(tab = %id, label = %snapshot.label, ?visibility, "Tab opened");
        let _ = self.broadcast.send(ServerMessage::TabOpened {
            tab: snapshot.clone(),
        });
        snapshot
    }

    /// Kill a tab without resigning; its record stays in the slot
    pub async fn close_tab(&self, id: &TabId) -> Result<(), SandboxError> {
        let tab = self
            .tabs
            .write()
            .await
            .remove(id)
            .ok_or_else(|| SandboxError::UnknownTab(id.clone()))?;

        tab.handle.shutdown().await;
        for task in &tab.tasks {
            task.abort();
        }

        tracing::info!(tab = %id, "Tab closed");
        let _ = self.broadcast.send(ServerMessage::TabClosed { tab: id.clone() });
        Ok(())
    }

    pub async fn set_visibility(
        &self,
        id: &TabId,
        visibility: Visibility,
    ) -> Result<bool, SandboxError> {
        let changed = self.tab(id).await?.visibility.set(visibility);
        if changed {
            let _ = self.broadcast.send(ServerMessage::VisibilityChanged {
                tab: id.clone(),
                visibility,
            });
        }
        Ok(changed)
    }

    pub async fn claim(&self, id: &TabId) -> Result<ClaimOutcome, SandboxError> {
        let handle = self.tab(id).await?.handle;
        Ok(handle.claim_primary().await?)
    }

    pub async fn resign(&self, id: &TabId) -> Result<(), SandboxError> {
        let handle = self.tab(id).await?.handle;
        handle.resign().await?;
        let _ = self.broadcast.send(ServerMessage::Resigned { tab: id.clone() });
        Ok(())
    }

    /// Preferences as this tab reads them from the shared store
    pub async fn settings(&self, id: &TabId) -> Result<Preferences, SandboxError> {
        let store = self.tab(id).await?.store;
        Ok(Settings::load(store).preferences())
    }

    /// Write preferences from one tab; every tab of the origin sees them
    pub async fn update_settings(
        &self,
        id: &TabId,
        update: SettingsUpdate,
    ) -> Result<Preferences, SandboxError> {
        let mut settings = Settings::load(self.tab(id).await?.store);
        if let Some(show) = update.show_delete_warning {
            settings.set_show_delete_warning(show);
        }
        if let Some(locale) = &update.locale {
            settings.set_locale(locale);
        }

        let preferences = settings.preferences();
        tracing::debug!(tab = %id, ?preferences, "Settings updated");
        let _ = self.broadcast.send(ServerMessage::SettingsChanged {
            tab: id.clone(),
            settings: preferences.clone(),
        });
        Ok(preferences)
    }

    /// All open tabs, oldest first
    pub async fn snapshot(&self) -> Vec<TabSnapshot> {
        let mut tabs: Vec<TabSnapshot> = self
            .tabs
            .read()
            .await
            .values()
            .map(SimTab::snapshot)
            .collect();
        tabs.sort_by(|a, b| a.id.cmp(&b.id));
        tabs
    }

    /// Decoded contents of the leader slot
    pub fn slot(&self) -> Option<LeaderRecord> {
        let raw = self.origin.peek(&self.config.coordinator.leader_key)?;
        match LeaderRecord::decode(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        }
    }

    async fn tab(&self, id: &TabId) -> Result<TabRef, SandboxError> {
        self.tabs
            .read()
            .await
            .get(id)
            .map(|tab| TabRef {
                handle: tab.handle.clone(),
                visibility: tab.visibility.clone(),
                store: tab.store.clone(),
            })
            .ok_or_else(|| SandboxError::UnknownTab(id.clone()))
    }
}

/// Clones taken out of the tab map so no lock is held across awaits
struct TabRef {
    handle: CoordinatorHandle,
    visibility: VisibilityControl,
    store: Arc<dyn SharedStore>,
}
