use crate::protocol::ServerMessage;
use crate::ticker::{ProgressSink, TickReport};
use crate::types::TabId;
use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Spawn a background task that forwards every change of a tab's primary
/// flag to WebSocket clients. Ends when the coordinator stops.
pub fn spawn_primary_watcher(
    tx: broadcast::Sender<ServerMessage>,
    tab: TabId,
    label: String,
    mut primary: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = *primary.borrow_and_update();

        while primary.changed().await.is_ok() {
            let is_primary = *primary.borrow_and_update();
            if is_primary == last {
                continue;
            }
            last = is_primary;

            // Ignore send errors (no receivers connected is fine)
            let _ = tx.send(ServerMessage::PrimaryChanged {
                tab: tab.clone(),
                label: label.clone(),
                is_primary,
            });
        }
    })
}

/// Publishes ticker progress to WebSocket clients
pub struct BroadcastSink {
    tx: broadcast::Sender<ServerMessage>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<ServerMessage>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ProgressSink for BroadcastSink {
    async fn record(&self, report: &TickReport) {
        tracing::debug!(
            tab = %report.tab,
            stone = %report.stone_kind,
            xp = report.xp,
            level = report.level,
            "Progress"
        );
        if report.leveled_up {
            tracing::info!(tab = %report.tab, level = report.level, "Player leveled up");
        }
        let _ = self.tx.send(ServerMessage::Tick {
            report: report.clone(),
        });
    }
}
