use serde::{Deserialize, Serialize};
use std::fmt;

/// Broadcast channel name shared by every tab of the origin
pub const DEFAULT_CHANNEL_NAME: &str = "active-session";

/// Shared-storage key holding the current leader record
pub const DEFAULT_LEADER_KEY: &str = "active-session-primary";

/// Identity of a single tab, generated once when its coordinator starts.
///
/// ULID strings sort by creation time, which makes them usable as a
/// deterministic tie-breaker between claims carrying the same epoch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(String);

impl TabId {
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TabId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TabId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

impl Visibility {
    pub fn from_visible(visible: bool) -> Self {
        if visible {
            Visibility::Visible
        } else {
            Visibility::Hidden
        }
    }
}

/// A claim on the leader slot. Ordered by epoch first, then by tab id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Claim {
    pub epoch: u64,
    pub id: TabId,
}

/// Errors decoding the value found in the leader slot
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Malformed leader record: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Value stored in the shared leader slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderRecord {
    pub id: TabId,
    /// Logical clock of the claim that wrote this record
    #[serde(default)]
    pub epoch: u64,
    /// Wall-clock milliseconds of the holder's last heartbeat
    #[serde(default)]
    pub heartbeat_at: Option<i64>,
}

impl LeaderRecord {
    /// Decode a raw slot value.
    ///
    /// Empty values mean the slot is vacant. Values that are not JSON objects
    /// are bare tab ids written by older clients and decode as epoch 0 with
    /// no heartbeat.
    pub fn decode(raw: &str) -> Result<Option<Self>, RecordError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        if trimmed.starts_with('{') {
            return Ok(Some(serde_json::from_str(trimmed)?));
        }
        Ok(Some(Self {
            id: TabId::from(trimmed),
            epoch: 0,
            heartbeat_at: None,
        }))
    }

    pub fn encode(&self) -> String {
        serde_json::json!({
            "id": self.id,
            "epoch": self.epoch,
            "heartbeat_at": self.heartbeat_at,
        })
        .to_string()
    }

    pub fn claim(&self) -> Claim {
        Claim {
            epoch: self.epoch,
            id: self.id.clone(),
        }
    }
}
