use super::ClaimOutcome;
use crate::clock::Clock;
use crate::config::{ClaimPolicy, CoordinatorConfig};
use crate::origin::{BrowserContext, StorageChange, TabEvent};
use crate::protocol::ChannelMessage;
use crate::types::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Coordinator for a tab that has browser capabilities.
///
/// All methods run to completion without waiting; the caller feeds events in
/// whatever order the origin delivers them.
pub struct ActiveCoordinator {
    id: TabId,
    config: CoordinatorConfig,
    context: BrowserContext,
    clock: Arc<dyn Clock>,
    primary: watch::Sender<bool>,
    /// Highest claim observed from any source, our own included
    highest_seen: Option<Claim>,
}

impl ActiveCoordinator {
    pub fn start(context: BrowserContext, config: CoordinatorConfig, clock: Arc<dyn Clock>) -> Self {
        let (primary, _) = watch::channel(false);
        let mut coordinator = Self {
            id: TabId::generate(),
            config,
            context,
            clock,
            primary,
            highest_seen: None,
        };

        tracing::debug!(tab = %coordinator.id, "Coordinator starting");

        if coordinator.config.clear_on_startup {
            tracing::info!(tab = %coordinator.id, "Clearing leader slot to force re-election");
            coordinator.context.store.remove(&coordinator.config.leader_key);
        }

        if coordinator.is_visible() {
            coordinator.on_visible();
        }

        coordinator
    }

    pub fn id(&self) -> &TabId {
        &self.id
    }

    pub fn is_primary(&self) -> bool {
        *self.primary.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.primary.subscribe()
    }

    pub fn highest_seen(&self) -> Option<&Claim> {
        self.highest_seen.as_ref()
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.config.lease.map(|lease| lease.heartbeat_interval)
    }

    fn is_visible(&self) -> bool {
        self.context.visibility.current() == Visibility::Visible
    }

    fn read_slot(&self) -> Option<LeaderRecord> {
        let raw = self.context.store.get(&self.config.leader_key)?;
        match LeaderRecord::decode(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(tab = %self.id, "Treating leader slot as vacant: {}", e);
                None
            }
        }
    }

    fn slot_is_mine(&self) -> bool {
        self.read_slot().is_some_and(|record| record.id == self.id)
    }

    fn set_primary(&self, value: bool) {
        let changed = self.primary.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
        if changed {
            tracing::info!(tab = %self.id, primary = value, "Primary flag changed");
        }
    }

    fn observe(&mut self, claim: Claim) {
        let newer = match &self.highest_seen {
            Some(seen) => claim > *seen,
            None => true,
        };
        if newer {
            self.highest_seen = Some(claim);
        }
    }

    /// A record is expired when a lease is configured and its holder has not
    /// refreshed it within the ttl. Records without a heartbeat never prove
    /// liveness.
    fn is_expired(&self, record: &LeaderRecord) -> bool {
        let Some(lease) = &self.config.lease else {
            return false;
        };
        match record.heartbeat_at {
            Some(at) => {
                let ttl = i64::try_from(lease.ttl.as_millis()).unwrap_or(i64::MAX);
                self.clock.now_ms().saturating_sub(at) > ttl
            }
            None => true,
        }
    }

    /// Take the leader slot for this tab.
    ///
    /// Suppressed while hidden. A tab that is primary and still holds the
    /// slot writes nothing.
    pub fn claim_primary(&mut self) -> ClaimOutcome {
        if !self.is_visible() {
            tracing::debug!(tab = %self.id, "Not claiming primary while hidden");
            return ClaimOutcome::Hidden;
        }

        let current = self.read_slot();
        if self.is_primary() && current.as_ref().is_some_and(|r| r.id == self.id) {
            return ClaimOutcome::AlreadyPrimary;
        }

        let base = current
            .iter()
            .map(|record| record.epoch)
            .chain(self.highest_seen.iter().map(|claim| claim.epoch))
            .max()
            .unwrap_or(0);
        let epoch = base.checked_add(1).unwrap_or_else(|| {
            tracing::warn!(tab = %self.id, "Claim epoch exhausted, reusing the maximum");
            u64::MAX
        });

        let record = LeaderRecord {
            id: self.id.clone(),
            epoch,
            heartbeat_at: Some(self.clock.now_ms()),
        };
        self.context
            .store
            .set(&self.config.leader_key, &record.encode());
        self.context.channel.post(&ChannelMessage::ClaimPrimary {
            id: self.id.clone(),
            epoch,
        });
        self.observe(record.claim());
        self.set_primary(true);

        tracing::info!(tab = %self.id, epoch, "Claimed primary");
        ClaimOutcome::Claimed
    }

    /// The tab came to the foreground (or started there)
    pub fn on_visible(&mut self) -> ClaimOutcome {
        match self.config.claim_policy {
            ClaimPolicy::Always => self.claim_primary(),
            ClaimPolicy::WhenVacant => self.claim_if_vacant(),
        }
    }

    /// Read-check-then-write. Not atomic: two tabs can both see a vacant slot.
    fn claim_if_vacant(&mut self) -> ClaimOutcome {
        match self.read_slot() {
            Some(record) if record.id != self.id && !self.is_expired(&record) => {
                tracing::debug!(tab = %self.id, holder = %record.id, "Leader slot occupied");
                self.observe(record.claim());
                self.set_primary(false);
                ClaimOutcome::Occupied(record.id)
            }
            Some(record) if record.id != self.id => {
                tracing::info!(tab = %self.id, holder = %record.id, "Leader lease expired, taking over");
                self.claim_primary()
            }
            _ => self.claim_primary(),
        }
    }

    pub fn handle_event(&mut self, event: TabEvent) {
        match event {
            TabEvent::Message(message) => self.on_message(message),
            TabEvent::StorageChanged(change) => self.on_storage_change(&change),
            TabEvent::VisibilityChanged(Visibility::Visible) => {
                self.on_visible();
            }
            TabEvent::VisibilityChanged(Visibility::Hidden) => {
                tracing::debug!(tab = %self.id, "Tab hidden");
            }
        }
    }

    fn on_message(&mut self, message: ChannelMessage) {
        match message {
            ChannelMessage::ClaimPrimary { id, epoch } => {
                let claim = Claim { epoch, id };
                // The slot holder's own announcement is never stale, even when
                // a saturated epoch ties with a higher id
                let holds_slot = self.read_slot().is_some_and(|record| record.id == claim.id);
                if !holds_slot && self.highest_seen.as_ref().is_some_and(|seen| claim < *seen) {
                    tracing::debug!(tab = %self.id, from = %claim.id, epoch, "Ignoring stale claim");
                    return;
                }
                let claimer_is_me = claim.id == self.id;
                self.observe(claim);

                if claimer_is_me {
                    self.set_primary(true);
                } else if self.slot_is_mine() {
                    // Claimers write before they announce, so our record
                    // landed after theirs
                    tracing::debug!(tab = %self.id, "Claim superseded by our own write");
                } else {
                    self.set_primary(false);
                }
            }
        }
    }

    fn on_storage_change(&mut self, change: &StorageChange) {
        if !change.affects(&self.config.leader_key) {
            return;
        }

        // The notification says what was written; the store says what won
        match self.read_slot() {
            Some(record) => {
                let mine = record.id == self.id;
                self.observe(record.claim());
                self.set_primary(mine);
            }
            None => {
                self.set_primary(false);
                if self.config.claim_on_vacancy && self.is_visible() {
                    tracing::debug!(tab = %self.id, "Leader slot vacated");
                    self.on_visible();
                }
            }
        }
    }

    /// Lease maintenance: refresh our heartbeat, or take over an abandoned
    /// or vacant slot while visible. Does nothing without a lease.
    pub fn tick(&mut self) {
        if self.config.lease.is_none() {
            return;
        }

        match self.read_slot() {
            Some(record) if record.id == self.id => {
                self.set_primary(true);
                let refreshed = LeaderRecord {
                    heartbeat_at: Some(self.clock.now_ms()),
                    ..record
                };
                self.context
                    .store
                    .set(&self.config.leader_key, &refreshed.encode());
            }
            Some(record) if self.is_expired(&record) => {
                if self.is_visible() {
                    tracing::info!(tab = %self.id, holder = %record.id, "Leader lease expired, taking over");
                    self.claim_primary();
                }
            }
            Some(_) => {}
            None => {
                if self.config.claim_on_vacancy && self.is_visible() {
                    self.on_visible();
                }
            }
        }
    }

    /// Give up leadership, clearing the slot if we still hold it
    pub fn resign(&mut self) {
        if self.slot_is_mine() {
            self.context.store.remove(&self.config.leader_key);
            tracing::info!(tab = %self.id, "Resigned primary");
        }
        self.set_primary(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SystemClock};
    use crate::config::LeaseConfig;
    use crate::origin::{MemoryOrigin, MemoryTab, SharedStore};
    use rand::{Rng, SeedableRng};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Tab {
        coordinator: ActiveCoordinator,
        mem: MemoryTab,
    }

    impl Tab {
        fn open(origin: &MemoryOrigin, visibility: Visibility, config: &CoordinatorConfig) -> Self {
            Self::open_with_clock(origin, visibility, config, Arc::new(SystemClock))
        }

        fn open_with_clock(
            origin: &MemoryOrigin,
            visibility: Visibility,
            config: &CoordinatorConfig,
            clock: Arc<dyn Clock>,
        ) -> Self {
            let mem = origin.open_tab(visibility);
            let coordinator = ActiveCoordinator::start(mem.context(), config.clone(), clock);
            Self { coordinator, mem }
        }

        fn set_visibility(&mut self, visibility: Visibility) {
            self.mem.visibility().set(visibility);
        }

        fn deliver(&mut self) -> bool {
            let mut delivered = false;
            while let Some(event) = self.mem.inbox_mut().try_next() {
                self.coordinator.handle_event(event);
                delivered = true;
            }
            delivered
        }

        fn primary(&self) -> bool {
            self.coordinator.is_primary()
        }
    }

    /// Deliver events round-robin until nothing is pending
    fn settle(tabs: &mut [&mut Tab]) {
        loop {
            let mut any = false;
            for tab in tabs.iter_mut() {
                any |= tab.deliver();
            }
            if !any {
                break;
            }
        }
    }

    fn slot(origin: &MemoryOrigin) -> Option<LeaderRecord> {
        origin
            .peek(DEFAULT_LEADER_KEY)
            .and_then(|raw| LeaderRecord::decode(&raw).ok().flatten())
    }

    /// Store whose next read can be made to miss every write, as if it ran
    /// in the same tick as a competing tab
    struct BlindStore {
        inner: Arc<dyn SharedStore>,
        blind_next_read: AtomicBool,
    }

    impl SharedStore for BlindStore {
        fn get(&self, key: &str) -> Option<String> {
            if self.blind_next_read.swap(false, Ordering::SeqCst) {
                return None;
            }
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) {
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_scenario_a_first_visible_tab_wins() {
        let origin = MemoryOrigin::new();
        let config = CoordinatorConfig::default();

        let mut a = Tab::open(&origin, Visibility::Visible, &config);
        assert!(a.primary());
        assert_eq!(slot(&origin).unwrap().id, *a.coordinator.id());

        let mut b = Tab::open(&origin, Visibility::Visible, &config);
        settle(&mut [&mut a, &mut b]);

        assert!(a.primary());
        assert!(!b.primary());
        assert_eq!(slot(&origin).unwrap().id, *a.coordinator.id());
    }

    #[test]
    fn test_scenario_b_stale_slot_without_lease_stays_leaderless() {
        let origin = MemoryOrigin::new();
        let config = CoordinatorConfig::default();

        let a = Tab::open(&origin, Visibility::Visible, &config);
        let a_id = a.coordinator.id().clone();
        drop(a);

        let mut b = Tab::open(&origin, Visibility::Hidden, &config);
        b.set_visibility(Visibility::Visible);
        b.deliver();
        b.coordinator.tick();

        assert!(!b.primary());
        assert_eq!(slot(&origin).unwrap().id, a_id);
    }

    #[test]
    fn test_scenario_c_same_tick_race_converges() {
        let origin = MemoryOrigin::new();
        let config = CoordinatorConfig::default();

        let mut a = Tab::open(&origin, Visibility::Hidden, &config);

        let b_mem = origin.open_tab(Visibility::Hidden);
        let real = b_mem.context();
        let blind = Arc::new(BlindStore {
            inner: real.store.clone(),
            blind_next_read: AtomicBool::new(false),
        });
        let b_context = BrowserContext {
            store: blind.clone(),
            ..real
        };
        let mut b = Tab {
            coordinator: ActiveCoordinator::start(b_context, config.clone(), Arc::new(SystemClock)),
            mem: b_mem,
        };

        // A wins the empty slot
        a.set_visibility(Visibility::Visible);
        a.deliver();
        assert!(a.primary());

        // B read the slot in the same tick, before A's write was visible
        blind.blind_next_read.store(true, Ordering::SeqCst);
        b.set_visibility(Visibility::Visible);
        let event = b.mem.inbox_mut().try_next().unwrap();
        assert_eq!(event, TabEvent::VisibilityChanged(Visibility::Visible));
        b.coordinator.handle_event(event);

        // Both believe they are primary; B's write landed last
        assert!(a.primary());
        assert!(b.primary());
        assert_eq!(slot(&origin).unwrap().id, *b.coordinator.id());

        // A's notification of B's write corrects it
        a.deliver();
        assert!(!a.primary());

        settle(&mut [&mut a, &mut b]);
        assert!(!a.primary());
        assert!(b.primary());
    }

    #[test]
    fn test_hidden_claim_is_suppressed() {
        let origin = MemoryOrigin::new();
        let mut a = Tab::open(&origin, Visibility::Hidden, &CoordinatorConfig::default());

        assert_eq!(a.coordinator.claim_primary(), ClaimOutcome::Hidden);
        assert!(!a.primary());
        assert!(origin.peek(DEFAULT_LEADER_KEY).is_none());
    }

    #[test]
    fn test_repeat_claim_is_idempotent() {
        let origin = MemoryOrigin::new();
        let mut a = Tab::open(&origin, Visibility::Visible, &CoordinatorConfig::default());
        let mut b = Tab::open(&origin, Visibility::Hidden, &CoordinatorConfig::default());
        let before = origin.peek(DEFAULT_LEADER_KEY);
        b.deliver();

        assert_eq!(a.coordinator.claim_primary(), ClaimOutcome::AlreadyPrimary);
        assert!(a.primary());
        assert_eq!(origin.peek(DEFAULT_LEADER_KEY), before);
        // Nothing new was written or broadcast
        assert!(!b.deliver());
    }

    #[test]
    fn test_downgrade_on_foreign_claim() {
        let origin = MemoryOrigin::new();
        let config = CoordinatorConfig::default();
        let mut a = Tab::open(&origin, Visibility::Visible, &config);
        let mut b = Tab::open(&origin, Visibility::Visible, &config);
        settle(&mut [&mut a, &mut b]);
        assert!(a.primary());

        // Explicit claim overrides the holder
        assert_eq!(b.coordinator.claim_primary(), ClaimOutcome::Claimed);

        // The broadcast alone is enough to downgrade A
        let message = loop {
            match a.mem.inbox_mut().try_next() {
                Some(TabEvent::Message(message)) => break message,
                Some(_) => continue,
                None => panic!("Claim message should reach A"),
            }
        };
        a.coordinator.handle_event(TabEvent::Message(message));
        assert!(!a.primary());

        settle(&mut [&mut a, &mut b]);
        assert!(!a.primary());
        assert!(b.primary());
        assert_eq!(slot(&origin).unwrap().epoch, 2);
    }

    #[test]
    fn test_downgrade_on_storage_change_alone() {
        let origin = MemoryOrigin::with_drop_rate(1.0);
        let config = CoordinatorConfig::default();
        let mut a = Tab::open(&origin, Visibility::Visible, &config);
        let mut b = Tab::open(&origin, Visibility::Visible, &config);
        settle(&mut [&mut a, &mut b]);

        b.coordinator.claim_primary();
        settle(&mut [&mut a, &mut b]);

        assert!(!a.primary());
        assert!(b.primary());
    }

    #[test]
    fn test_stale_claim_is_ignored() {
        let origin = MemoryOrigin::new();
        let config = CoordinatorConfig::default();
        let mut a = Tab::open(&origin, Visibility::Visible, &config);
        let mut b = Tab::open(&origin, Visibility::Visible, &config);
        b.coordinator.claim_primary();
        settle(&mut [&mut a, &mut b]);
        assert!(b.primary());
        let highest = b.coordinator.highest_seen().cloned().unwrap();
        assert_eq!(highest.epoch, 2);

        b.coordinator
            .handle_event(TabEvent::Message(ChannelMessage::ClaimPrimary {
                id: TabId::from("ghost"),
                epoch: 1,
            }));
        assert!(b.primary());
        assert_eq!(b.coordinator.highest_seen(), Some(&highest));
    }

    #[test]
    fn test_claim_while_slot_still_ours_keeps_primary() {
        let origin = MemoryOrigin::new();
        let mut a = Tab::open(&origin, Visibility::Visible, &CoordinatorConfig::default());

        // Announcement whose write was overtaken by ours
        a.coordinator
            .handle_event(TabEvent::Message(ChannelMessage::ClaimPrimary {
                id: TabId::from("zzzz-late"),
                epoch: 1,
            }));
        assert!(a.primary());
    }

    #[test]
    fn test_always_policy_reclaims_on_foreground() {
        let origin = MemoryOrigin::new();
        let config = CoordinatorConfig {
            claim_policy: ClaimPolicy::Always,
            ..CoordinatorConfig::default()
        };
        let mut a = Tab::open(&origin, Visibility::Visible, &config);
        let mut b = Tab::open(&origin, Visibility::Visible, &config);
        settle(&mut [&mut a, &mut b]);
        assert!(!a.primary());
        assert!(b.primary());

        a.set_visibility(Visibility::Hidden);
        a.set_visibility(Visibility::Visible);
        settle(&mut [&mut a, &mut b]);
        assert!(a.primary());
        assert!(!b.primary());
    }

    #[test]
    fn test_clear_on_startup_forces_reelection() {
        let origin = MemoryOrigin::new();
        let mut a = Tab::open(&origin, Visibility::Visible, &CoordinatorConfig::default());
        assert!(a.primary());

        let config = CoordinatorConfig {
            clear_on_startup: true,
            ..CoordinatorConfig::default()
        };
        let mut c = Tab::open(&origin, Visibility::Hidden, &config);
        settle(&mut [&mut a, &mut c]);

        // A saw the slot vacated and, being visible, took it again
        assert!(a.primary());
        assert!(!c.primary());
        let record = slot(&origin).unwrap();
        assert_eq!(record.id, *a.coordinator.id());
        assert_eq!(record.epoch, 2);
    }

    #[test]
    fn test_vacancy_without_reclaim_leaves_slot_empty() {
        let origin = MemoryOrigin::new();
        let config = CoordinatorConfig {
            claim_on_vacancy: false,
            ..CoordinatorConfig::default()
        };
        let mut a = Tab::open(&origin, Visibility::Visible, &config);
        origin.clear();
        a.deliver();

        assert!(!a.primary());
        assert!(origin.peek(DEFAULT_LEADER_KEY).is_none());
    }

    #[test]
    fn test_resign_hands_over_to_visible_tab() {
        let origin = MemoryOrigin::new();
        let config = CoordinatorConfig::default();
        let mut a = Tab::open(&origin, Visibility::Visible, &config);
        let mut b = Tab::open(&origin, Visibility::Visible, &config);
        settle(&mut [&mut a, &mut b]);

        a.coordinator.resign();
        assert!(!a.primary());
        settle(&mut [&mut a, &mut b]);

        assert!(!a.primary());
        assert!(b.primary());
        assert_eq!(slot(&origin).unwrap().id, *b.coordinator.id());
    }

    #[test]
    fn test_resign_does_not_clear_foreign_slot() {
        let origin = MemoryOrigin::new();
        let config = CoordinatorConfig::default();
        let a = Tab::open(&origin, Visibility::Visible, &config);
        let mut b = Tab::open(&origin, Visibility::Visible, &config);

        b.coordinator.resign();
        assert_eq!(slot(&origin).unwrap().id, *a.coordinator.id());
    }

    #[test]
    fn test_malformed_slot_is_claimable() {
        let origin = MemoryOrigin::new();
        origin.poke(DEFAULT_LEADER_KEY, "{not json");
        let a = Tab::open(&origin, Visibility::Visible, &CoordinatorConfig::default());

        assert!(a.primary());
        assert_eq!(slot(&origin).unwrap().id, *a.coordinator.id());
    }

    #[test]
    fn test_claim_over_exhausted_epoch() {
        let exhausted = format!(r#"{{"id":"other","epoch":{}}}"#, u64::MAX);

        let origin = MemoryOrigin::new();
        origin.poke(DEFAULT_LEADER_KEY, &exhausted);
        let config = CoordinatorConfig {
            claim_policy: ClaimPolicy::Always,
            ..CoordinatorConfig::default()
        };
        let a = Tab::open(&origin, Visibility::Visible, &config);

        assert!(a.primary());
        let record = slot(&origin).unwrap();
        assert_eq!(record.id, *a.coordinator.id());
        assert_eq!(record.epoch, u64::MAX);

        // Same record, taken over because it carries no heartbeat
        let origin = MemoryOrigin::new();
        origin.poke(DEFAULT_LEADER_KEY, &exhausted);
        let config = CoordinatorConfig {
            lease: Some(LeaseConfig::new(Duration::from_secs(3))),
            ..CoordinatorConfig::default()
        };
        let b = Tab::open_with_clock(&origin, Visibility::Visible, &config, Arc::new(ManualClock::new(0)));
        assert!(b.primary());
        assert_eq!(slot(&origin).unwrap().id, *b.coordinator.id());
    }

    #[test]
    fn test_saturated_claim_from_slot_holder_is_not_stale() {
        let origin = MemoryOrigin::new();
        let mut a = Tab::open(&origin, Visibility::Visible, &CoordinatorConfig::default());
        assert!(a.primary());

        // An announcement at the maximum epoch whose write we overtook
        a.coordinator
            .handle_event(TabEvent::Message(ChannelMessage::ClaimPrimary {
                id: TabId::from("zzzz"),
                epoch: u64::MAX,
            }));
        assert!(a.primary());

        // A lower id saturates at the same epoch and wins the slot
        origin.poke(
            DEFAULT_LEADER_KEY,
            &format!(r#"{{"id":"0000","epoch":{}}}"#, u64::MAX),
        );
        a.coordinator
            .handle_event(TabEvent::Message(ChannelMessage::ClaimPrimary {
                id: TabId::from("0000"),
                epoch: u64::MAX,
            }));
        assert!(!a.primary());
        assert_eq!(
            a.coordinator.highest_seen(),
            Some(&Claim {
                epoch: u64::MAX,
                id: TabId::from("zzzz"),
            })
        );
    }

    #[test]
    fn test_legacy_bare_id_occupies_slot() {
        let origin = MemoryOrigin::new();
        origin.poke(DEFAULT_LEADER_KEY, "8d3c5f7e-legacy");
        let a = Tab::open(&origin, Visibility::Visible, &CoordinatorConfig::default());

        assert!(!a.primary());
    }

    #[test]
    fn test_lease_takeover_after_abrupt_close() {
        let origin = MemoryOrigin::new();
        let clock = ManualClock::new(1_000_000);
        let config = CoordinatorConfig {
            lease: Some(LeaseConfig::new(Duration::from_secs(3))),
            ..CoordinatorConfig::default()
        };

        let a = Tab::open_with_clock(&origin, Visibility::Visible, &config, Arc::new(clock.clone()));
        drop(a);

        let mut b = Tab::open_with_clock(&origin, Visibility::Visible, &config, Arc::new(clock.clone()));
        assert!(!b.primary());

        clock.advance(Duration::from_secs(2));
        b.coordinator.tick();
        assert!(!b.primary());

        clock.advance(Duration::from_secs(2));
        b.coordinator.tick();
        assert!(b.primary());
        assert_eq!(slot(&origin).unwrap().id, *b.coordinator.id());
    }

    #[test]
    fn test_heartbeat_keeps_leader_alive() {
        let origin = MemoryOrigin::new();
        let clock = ManualClock::new(0);
        let config = CoordinatorConfig {
            lease: Some(LeaseConfig::new(Duration::from_secs(3))),
            ..CoordinatorConfig::default()
        };
        let mut a = Tab::open_with_clock(&origin, Visibility::Visible, &config, Arc::new(clock.clone()));
        let mut b = Tab::open_with_clock(&origin, Visibility::Visible, &config, Arc::new(clock.clone()));

        for _ in 0..5 {
            clock.advance(Duration::from_secs(1));
            a.coordinator.tick();
            b.coordinator.tick();
            settle(&mut [&mut a, &mut b]);
        }

        assert!(a.primary());
        assert!(!b.primary());
        let record = slot(&origin).unwrap();
        assert_eq!(record.heartbeat_at, Some(5_000));
        assert_eq!(record.epoch, 1);
    }

    #[test]
    fn test_hidden_tab_does_not_take_over_expired_lease() {
        let origin = MemoryOrigin::new();
        let clock = ManualClock::new(0);
        let config = CoordinatorConfig {
            lease: Some(LeaseConfig::new(Duration::from_secs(1))),
            ..CoordinatorConfig::default()
        };
        drop(Tab::open_with_clock(&origin, Visibility::Visible, &config, Arc::new(clock.clone())));
        let mut b = Tab::open_with_clock(&origin, Visibility::Hidden, &config, Arc::new(clock.clone()));

        clock.advance(Duration::from_secs(5));
        b.coordinator.tick();
        assert!(!b.primary());

        b.set_visibility(Visibility::Visible);
        b.deliver();
        assert!(b.primary());
    }

    #[test]
    fn test_random_toggles_converge_to_single_primary() {
        for policy in [ClaimPolicy::WhenVacant, ClaimPolicy::Always] {
            let origin = MemoryOrigin::new();
            let config = CoordinatorConfig {
                claim_policy: policy,
                ..CoordinatorConfig::default()
            };
            let mut rng = rand::rngs::StdRng::seed_from_u64(7);
            let mut tabs: Vec<Tab> = (0..5)
                .map(|_| Tab::open(&origin, Visibility::Hidden, &config))
                .collect();

            tabs[0].set_visibility(Visibility::Visible);
            tabs[0].deliver();
            for _ in 0..200 {
                let i = rng.random_range(0..tabs.len());
                let visibility = Visibility::from_visible(rng.random_bool(0.5));
                tabs[i].set_visibility(visibility);

                let mut refs: Vec<&mut Tab> = tabs.iter_mut().collect();
                settle(&mut refs);

                let primaries: Vec<&TabId> = tabs
                    .iter()
                    .filter(|t| t.primary())
                    .map(|t| t.coordinator.id())
                    .collect();
                assert_eq!(primaries.len(), 1, "policy {:?}", policy);
                assert_eq!(*primaries[0], slot(&origin).unwrap().id);
            }
        }
    }
}
