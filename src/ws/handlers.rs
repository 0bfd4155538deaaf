//! WebSocket message dispatch

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{AppState, SandboxError};
use crate::types::Visibility;
use std::sync::Arc;

fn error_message(e: SandboxError) -> ServerMessage {
    let code = match &e {
        SandboxError::UnknownTab(_) => "UNKNOWN_TAB",
        SandboxError::Coordinator(_) => "COORDINATOR_STOPPED",
    };
    ServerMessage::Error {
        code: code.to_string(),
        msg: e.to_string(),
    }
}

/// Handle client messages and return optional response
pub async fn handle_message(msg: ClientMessage, state: &Arc<AppState>) -> Option<ServerMessage> {
    match msg {
        // Lifecycle and visibility changes reach every client, the caller
        // included, through the broadcast
        ClientMessage::OpenTab { hidden } => {
            state.open_tab(Visibility::from_visible(!hidden)).await;
            None
        }

        ClientMessage::CloseTab { tab } => match state.close_tab(&tab).await {
            Ok(()) => None,
            Err(e) => Some(error_message(e)),
        },

        ClientMessage::SetVisibility { tab, visible } => {
            let visibility = Visibility::from_visible(visible);
            match state.set_visibility(&tab, visibility).await {
                Ok(_) => None,
                Err(e) => Some(error_message(e)),
            }
        }

        ClientMessage::Claim { tab } => match state.claim(&tab).await {
            Ok(outcome) => Some(ServerMessage::ClaimResult { tab, outcome }),
            Err(e) => Some(error_message(e)),
        },

        ClientMessage::Resign { tab } => match state.resign(&tab).await {
            Ok(()) => None,
            Err(e) => Some(error_message(e)),
        },

        ClientMessage::Snapshot => Some(ServerMessage::Snapshot {
            tabs: state.snapshot().await,
            slot: state.slot(),
        }),
    }
}
