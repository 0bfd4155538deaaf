use crate::coordinator::ClaimOutcome;
use crate::settings::Preferences;
use crate::ticker::TickReport;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Message carried on the cross-tab broadcast channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ChannelMessage {
    /// A tab announces it has written itself into the leader slot
    ClaimPrimary {
        id: TabId,
        /// Absent when sent by clients that predate epochs
        #[serde(default)]
        epoch: u64,
    },
}

/// Commands accepted by the sandbox WebSocket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    OpenTab {
        #[serde(default)]
        hidden: bool,
    },
    /// Close without resigning, like a crashed or killed tab
    CloseTab {
        tab: TabId,
    },
    SetVisibility {
        tab: TabId,
        visible: bool,
    },
    Claim {
        tab: TabId,
    },
    Resign {
        tab: TabId,
    },
    Snapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        tabs: Vec<TabSnapshot>,
        slot: Option<LeaderRecord>,
        server_now: String,
    },
    TabOpened {
        tab: TabSnapshot,
    },
    TabClosed {
        tab: TabId,
    },
    PrimaryChanged {
        tab: TabId,
        label: String,
        is_primary: bool,
    },
    VisibilityChanged {
        tab: TabId,
        visibility: Visibility,
    },
    ClaimResult {
        tab: TabId,
        outcome: ClaimOutcome,
    },
    Resigned {
        tab: TabId,
    },
    SettingsChanged {
        tab: TabId,
        settings: Preferences,
    },
    Snapshot {
        tabs: Vec<TabSnapshot>,
        slot: Option<LeaderRecord>,
    },
    /// Progress produced by the primary tab's ticker
    Tick {
        report: TickReport,
    },
    Error {
        code: String,
        msg: String,
    },
}

/// Public view of one simulated tab
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabSnapshot {
    pub id: TabId,
    pub label: String,
    pub visibility: Visibility,
    pub is_primary: bool,
}
