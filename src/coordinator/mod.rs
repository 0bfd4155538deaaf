//! Per-tab election of the primary tab.
//!
//! Every open tab runs its own coordinator. There is no central authority:
//! tabs write themselves into a shared leader slot, announce the claim on the
//! broadcast channel, and downgrade when they see someone else's claim. The
//! slot has no compare-and-swap, so two tabs can both win a race briefly; the
//! loser corrects itself on the next storage notification.

mod active;
mod driver;

pub use active::ActiveCoordinator;
pub use driver::{spawn_coordinator, CoordinatorHandle, HandleError};

use crate::clock::Clock;
use crate::config::CoordinatorConfig;
use crate::origin::{BrowserContext, TabEvent};
use crate::types::TabId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// What a claim attempt did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "holder", rename_all = "snake_case")]
pub enum ClaimOutcome {
    /// Slot written, claim broadcast, flag set
    Claimed,
    /// Already primary and still holding the slot; nothing written
    AlreadyPrimary,
    /// Suppressed because the tab is in the background
    Hidden,
    /// Another live tab holds the slot
    Occupied(TabId),
    /// No browser context; coordination is disabled
    Inert,
}

/// Stand-in used outside a browser-like context: never primary, never talks
pub struct InertCoordinator {
    id: TabId,
    primary: watch::Sender<bool>,
}

impl InertCoordinator {
    pub fn new() -> Self {
        let (primary, _) = watch::channel(false);
        Self {
            id: TabId::generate(),
            primary,
        }
    }
}

impl Default for InertCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

pub enum Coordinator {
    Active(ActiveCoordinator),
    Inert(InertCoordinator),
}

impl Coordinator {
    /// Pick the implementation once, based on whether browser capabilities
    /// are available
    pub fn detect(
        context: Option<BrowserContext>,
        config: CoordinatorConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        match context {
            Some(context) => Coordinator::Active(ActiveCoordinator::start(context, config, clock)),
            None => {
                tracing::debug!("No browser context available, tab coordination disabled");
                Coordinator::Inert(InertCoordinator::new())
            }
        }
    }

    pub fn id(&self) -> &TabId {
        match self {
            Coordinator::Active(active) => active.id(),
            Coordinator::Inert(inert) => &inert.id,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Coordinator::Active(_))
    }

    pub fn is_primary(&self) -> bool {
        match self {
            Coordinator::Active(active) => active.is_primary(),
            Coordinator::Inert(_) => false,
        }
    }

    /// Observable primary flag for downstream consumers
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        match self {
            Coordinator::Active(active) => active.subscribe(),
            Coordinator::Inert(inert) => inert.primary.subscribe(),
        }
    }

    pub fn claim_primary(&mut self) -> ClaimOutcome {
        match self {
            Coordinator::Active(active) => active.claim_primary(),
            Coordinator::Inert(_) => ClaimOutcome::Inert,
        }
    }

    pub fn handle_event(&mut self, event: TabEvent) {
        if let Coordinator::Active(active) = self {
            active.handle_event(event);
        }
    }

    /// Lease maintenance; a no-op without a lease
    pub fn tick(&mut self) {
        if let Coordinator::Active(active) = self {
            active.tick();
        }
    }

    pub fn resign(&mut self) {
        if let Coordinator::Active(active) = self {
            active.resign();
        }
    }

    /// How often `tick` should run, if at all
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        match self {
            Coordinator::Active(active) => active.heartbeat_interval(),
            Coordinator::Inert(_) => None,
        }
    }
}
