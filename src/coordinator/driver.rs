//! Runs a coordinator on its own task, feeding it inbox events, lease ticks
//! and commands from any number of handles.

use super::{ClaimOutcome, Coordinator};
use crate::origin::TabInbox;
use crate::types::TabId;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;

const COMMAND_BUFFER: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    #[error("Coordinator task has stopped")]
    Closed,
}

enum Command {
    Claim(oneshot::Sender<ClaimOutcome>),
    Resign(oneshot::Sender<()>),
    Shutdown,
}

/// Cloneable client for a running coordinator
#[derive(Clone)]
pub struct CoordinatorHandle {
    id: TabId,
    tx: mpsc::Sender<Command>,
    primary: watch::Receiver<bool>,
}

impl CoordinatorHandle {
    pub fn id(&self) -> &TabId {
        &self.id
    }

    /// Receiver for the primary flag; closes when the task stops
    pub fn primary(&self) -> watch::Receiver<bool> {
        self.primary.clone()
    }

    pub fn is_primary(&self) -> bool {
        *self.primary.borrow()
    }

    pub async fn claim_primary(&self) -> Result<ClaimOutcome, HandleError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Claim(reply_tx))
            .await
            .map_err(|_| HandleError::Closed)?;
        reply_rx.await.map_err(|_| HandleError::Closed)
    }

    pub async fn resign(&self) -> Result<(), HandleError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Resign(reply_tx))
            .await
            .map_err(|_| HandleError::Closed)?;
        reply_rx.await.map_err(|_| HandleError::Closed)
    }

    /// Stop the task without resigning, as if the tab was killed
    pub async fn shutdown(&self) {
        if self.tx.send(Command::Shutdown).await.is_err() {
            tracing::debug!(tab = %self.id, "Coordinator already stopped");
        }
    }

    /// Wait until the primary flag equals `value`
    pub async fn wait_for(&self, value: bool) -> Result<(), HandleError> {
        let mut primary = self.primary.clone();
        primary
            .wait_for(|current| *current == value)
            .await
            .map(|_| ())
            .map_err(|_| HandleError::Closed)
    }
}

/// Move `coordinator` onto a background task.
///
/// Without an inbox the coordinator only reacts to commands and lease ticks.
pub fn spawn_coordinator(
    mut coordinator: Coordinator,
    inbox: Option<Box<dyn TabInbox>>,
) -> CoordinatorHandle {
    let (tx, mut rx) = mpsc::channel(COMMAND_BUFFER);
    let id = coordinator.id().clone();
    let primary = coordinator.subscribe();

    let mut heartbeat = coordinator.heartbeat_interval().map(|every| {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });
    let mut inbox = inbox;
    let task_id = id.clone();

    tokio::spawn(async move {
        tracing::debug!(tab = %task_id, active = coordinator.is_active(), "Coordinator task started");

        loop {
            tokio::select! {
                event = async {
                    match &mut inbox {
                        Some(inbox) => inbox.next().await,
                        None => std::future::pending().await,
                    }
                } => match event {
                    Some(event) => coordinator.handle_event(event),
                    None => {
                        tracing::debug!(tab = %task_id, "Inbox closed");
                        inbox = None;
                    }
                },
                _ = async {
                    match &mut heartbeat {
                        Some(interval) => {
                            interval.tick().await;
                        }
                        None => std::future::pending::<()>().await,
                    }
                } => coordinator.tick(),
                command = rx.recv() => match command {
                    Some(Command::Claim(reply)) => {
                        let _ = reply.send(coordinator.claim_primary());
                    }
                    Some(Command::Resign(reply)) => {
                        coordinator.resign();
                        let _ = reply.send(());
                    }
                    Some(Command::Shutdown) | None => break,
                },
            }
        }

        tracing::debug!(tab = %task_id, "Coordinator task stopped");
    });

    CoordinatorHandle { id, tx, primary }
}
