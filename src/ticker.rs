//! Periodic progress that only the primary tab may drive.

use crate::stone::{CurrentStone, StoneKind};
use crate::types::TabId;
use crate::xp::{XpProgress, XpTable};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// What one primary tick changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub tab: TabId,
    pub elapsed_secs: u64,
    pub stone_id: String,
    pub stone_kind: StoneKind,
    pub stone_elapsed: u64,
    pub xp: u64,
    pub level: u32,
    pub leveled_up: bool,
}

/// Player progress shared by every tab of the origin
#[derive(Debug, Clone)]
pub struct Session {
    pub stone: CurrentStone,
    pub xp: XpProgress,
    /// Sub-second remainder carried into the next tick
    carry: Duration,
}

impl Session {
    pub fn new(stone: CurrentStone) -> Self {
        Self {
            stone,
            xp: XpProgress::default(),
            carry: Duration::ZERO,
        }
    }

    /// Advance by whole seconds of `elapsed`, keeping the fraction for later
    pub fn advance(&mut self, tab: &TabId, table: &XpTable, elapsed: Duration) -> TickReport {
        let total = self.carry + elapsed;
        let secs = total.as_secs();
        self.carry = total - Duration::from_secs(secs);

        self.stone.grow(secs);
        let leveled_up = self.xp.advance(table, secs);

        TickReport {
            tab: tab.clone(),
            elapsed_secs: secs,
            stone_id: self.stone.id.clone(),
            stone_kind: self.stone.kind,
            stone_elapsed: self.stone.total_elapsed,
            xp: self.xp.xp,
            level: self.xp.level,
            leveled_up,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(CurrentStone::random())
    }
}

/// Where tick results go (a backend in production)
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn record(&self, report: &TickReport);
}

/// Everything a ticker needs besides its tab's primary flag
#[derive(Clone)]
pub struct TickerContext {
    pub session: Arc<RwLock<Session>>,
    pub table: Arc<XpTable>,
    pub sink: Arc<dyn ProgressSink>,
}

/// Tick every `period` for as long as `primary` has a sender. Ticks while the
/// flag is false are skipped.
pub fn spawn_primary_ticker(
    tab: TabId,
    mut primary: watch::Receiver<bool>,
    period: Duration,
    ctx: TickerContext,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;
        let mut last = Instant::now();

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = Instant::now();
                    let elapsed = now - last;
                    last = now;

                    if !*primary.borrow() {
                        continue;
                    }

                    let report = ctx
                        .session
                        .write()
                        .await
                        .advance(&tab, &ctx.table, elapsed);
                    ctx.sink.record(&report).await;
                }
                changed = primary.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::debug!(tab = %tab, "Ticker stopped");
    })
}
