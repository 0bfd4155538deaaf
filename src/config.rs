//! Runtime configuration loaded from environment variables.

use crate::types::{DEFAULT_CHANNEL_NAME, DEFAULT_LEADER_KEY};
use std::str::FromStr;
use std::time::Duration;

/// When a tab coming to the foreground tries to take the leader slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClaimPolicy {
    /// Claim only if the slot is vacant, expired, or already ours
    #[default]
    WhenVacant,
    /// Claim on every foregrounding, overwriting any holder
    Always,
}

impl FromStr for ClaimPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "when-vacant" | "when_vacant" | "vacant" => Ok(ClaimPolicy::WhenVacant),
            "always" => Ok(ClaimPolicy::Always),
            other => Err(format!("Unknown claim policy '{}'", other)),
        }
    }
}

/// Liveness lease for the leader slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseConfig {
    /// A record whose heartbeat is older than this is considered abandoned
    pub ttl: Duration,
    /// How often coordinators refresh or inspect the slot
    pub heartbeat_interval: Duration,
}

impl LeaseConfig {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            heartbeat_interval: (ttl / 3).max(Duration::from_millis(1)),
        }
    }

    /// Override the heartbeat period. It must stay below the ttl, otherwise
    /// a live leader's record expires between refreshes; such values are
    /// rejected and the default period is kept.
    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        if interval >= self.ttl {
            tracing::warn!(
                heartbeat_ms = interval.as_millis() as u64,
                ttl_ms = self.ttl.as_millis() as u64,
                "Heartbeat must be shorter than the lease ttl, using ttl/3"
            );
        } else {
            self.heartbeat_interval = interval.max(Duration::from_millis(1));
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    pub channel_name: String,
    pub leader_key: String,
    pub claim_policy: ClaimPolicy,
    /// Remove the leader record when a coordinator starts, forcing re-election
    pub clear_on_startup: bool,
    /// Visible tabs try to claim as soon as they see the slot vacated
    pub claim_on_vacancy: bool,
    /// None keeps the record alive until overwritten or removed
    pub lease: Option<LeaseConfig>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            channel_name: DEFAULT_CHANNEL_NAME.to_string(),
            leader_key: DEFAULT_LEADER_KEY.to_string(),
            claim_policy: ClaimPolicy::WhenVacant,
            clear_on_startup: false,
            claim_on_vacancy: true,
            lease: None,
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let claim_policy = match env_string("STONETAB_CLAIM_POLICY") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!("{}, falling back to when-vacant", e);
                ClaimPolicy::WhenVacant
            }),
            None => defaults.claim_policy,
        };

        let lease = env_parse::<u64>("STONETAB_LEASE_TTL_MS").map(|ttl_ms| {
            let lease = LeaseConfig::new(Duration::from_millis(ttl_ms.max(1)));
            match env_parse::<u64>("STONETAB_HEARTBEAT_MS") {
                Some(every) => lease.with_heartbeat(Duration::from_millis(every)),
                None => lease,
            }
        });

        Self {
            channel_name: env_string("STONETAB_CHANNEL").unwrap_or(defaults.channel_name),
            leader_key: env_string("STONETAB_LEADER_KEY").unwrap_or(defaults.leader_key),
            claim_policy,
            clear_on_startup: env_bool("STONETAB_CLEAR_ON_STARTUP")
                .unwrap_or(defaults.clear_on_startup),
            claim_on_vacancy: env_bool("STONETAB_CLAIM_ON_VACANCY")
                .unwrap_or(defaults.claim_on_vacancy),
            lease,
        }
    }
}

/// Configuration for the sandbox server binary
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub coordinator: CoordinatorConfig,
    /// Probability that a broadcast message is lost per receiving tab
    pub drop_rate: f64,
    /// Period of the primary-gated ticker
    pub tick_period: Duration,
    /// Optional CSV file with the XP level table
    pub xp_table_path: Option<String>,
    pub port: u16,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorConfig::default(),
            drop_rate: 0.0,
            tick_period: Duration::from_secs(1),
            xp_table_path: None,
            port: 7867,
        }
    }
}

impl SandboxConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            coordinator: CoordinatorConfig::from_env(),
            drop_rate: env_parse::<f64>("STONETAB_DROP_RATE")
                .map(|rate| rate.clamp(0.0, 1.0))
                .unwrap_or(defaults.drop_rate),
            tick_period: env_parse::<u64>("STONETAB_TICK_MS")
                .map(|ms| Duration::from_millis(ms.max(1)))
                .unwrap_or(defaults.tick_period),
            xp_table_path: env_string("STONETAB_XP_TABLE"),
            port: env_parse("STONETAB_PORT").unwrap_or(defaults.port),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: '{}'", name, raw);
            None
        }
    }
}

fn env_bool(name: &str) -> Option<bool> {
    env_string(name).map(|v| v != "0" && v.to_lowercase() != "false")
}
