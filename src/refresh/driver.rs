use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{FetchState, FetchSupervisor, RefreshPolicy, Settled, SharedStore};
use crate::snapshot::SourceId;
use crate::source::DataSource;

/// The refresh half of a compositor tick.
///
/// One driver serves one effect.  Multi-item effects pass every item id to
/// [`tick`](Self::tick); the policy is shared across them while each id is
/// fetched, and published, on its own.  The driver remembers which config
/// fingerprint each id was last fetched under, so an item whose fetch was
/// still running when the config changed is fetched again once it lands.
pub struct RefreshDriver<S: DataSource> {
    policy: RefreshPolicy,
    supervisor: FetchSupervisor<S>,
    fetched_under: HashMap<SourceId, u64>,
}

impl<S: DataSource> RefreshDriver<S> {
    pub fn new(policy: RefreshPolicy, supervisor: FetchSupervisor<S>) -> Self {
        Self {
            policy,
            supervisor,
            fetched_under: HashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<SharedStore<S::Values>> {
        self.supervisor.store()
    }

    #[cfg(test)]
    pub fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    /// Apply interval changes from a reloaded config.
    pub fn set_intervals(&mut self, min_interval: Duration, error_backoff: Duration, worker_timeout: Duration) {
        self.policy.set_intervals(min_interval, error_backoff);
        self.supervisor.set_timeout(worker_timeout);
    }

    /// Settle finished fetches, then start new ones if they are due.
    ///
    /// `online` is the connectivity precondition; nothing is spawned while
    /// it is false.  When the policy says a refresh is due every id is
    /// tried; otherwise only ids last fetched under a different
    /// `fingerprint` are.  Returns how many fetches were started.
    pub fn tick(&mut self, now: Instant, online: bool, fingerprint: u64, sources: &[SourceId]) -> usize {
        self.settle();
        self.fetched_under.retain(|id, _| sources.contains(id));

        if !online || sources.is_empty() {
            return 0;
        }

        let due = self.policy.should_refresh(now, fingerprint);
        let store = Arc::clone(self.supervisor.store());
        let mut spawned = 0;
        for id in sources {
            let stale = self.fetched_under.get(id) != Some(&fingerprint);
            if !(due || stale) || store.state(id) == FetchState::InFlight {
                continue;
            }
            if self.supervisor.try_spawn(id) {
                self.fetched_under.insert(id.clone(), fingerprint);
                spawned += 1;
            }
        }
        if spawned > 0 {
            self.policy.record_attempt(now, fingerprint);
        }
        spawned
    }

    fn settle(&mut self) {
        let store = Arc::clone(self.supervisor.store());
        for id in store.ids() {
            match store.settle(&id) {
                Some(Settled::Succeeded { at }) => {
                    if self.policy.is_failing() {
                        tracing::info!(source = %id, "source recovered");
                    }
                    if let Some(&fingerprint) = self.fetched_under.get(&id) {
                        self.policy.record_success(at, fingerprint);
                    }
                }
                Some(Settled::Failed { at }) => self.policy.record_failure(at),
                None => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refresh::testing::{wait_for, ScriptedSource};
    use crate::refresh::FetchState;
    use crate::source::FetchError;
    use tokio::runtime::Handle;

    const INTERVAL: Duration = Duration::from_secs(60);
    const BACKOFF: Duration = Duration::from_secs(20);

    fn driver(source: ScriptedSource) -> RefreshDriver<ScriptedSource> {
        let supervisor = FetchSupervisor::new(
            source,
            Arc::new(SharedStore::new()),
            Handle::current(),
            Duration::from_secs(5),
        );
        RefreshDriver::new(RefreshPolicy::new(INTERVAL, BACKOFF), supervisor)
    }

    fn ids(names: &[&str]) -> Vec<SourceId> {
        names.iter().map(|n| SourceId::from(*n)).collect()
    }

    async fn wait_idle_or_done(driver: &RefreshDriver<ScriptedSource>, id: &SourceId) {
        wait_for(|| driver.store().read(id).1 != FetchState::InFlight).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn offline_never_spawns() {
        let source = ScriptedSource::new();
        let mut driver = driver(source.clone());

        assert_eq!(driver.tick(Instant::now(), false, 1, &ids(&["A"])), 0);
        assert!(driver.policy().last_attempt().is_none());
        assert_eq!(source.calls("A"), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn repeated_failures_keep_stale_data_and_back_off() {
        let source = ScriptedSource::new().value("Q", 42.0);
        let mut driver = driver(source.clone());
        let id = SourceId::from("Q");
        let sources = vec![id.clone()];
        let t0 = Instant::now();

        // A first good fetch establishes the data that must survive.
        assert_eq!(driver.tick(t0, true, 1, &sources), 1);
        wait_idle_or_done(&driver, &id).await;
        driver.tick(t0, true, 1, &sources);
        let original = driver.store().read(&id).0.unwrap();

        let source = source.fail("Q", FetchError::Network("unreachable".into()));
        let mut attempt_at = t0 + INTERVAL;
        for round in 0..3 {
            assert_eq!(driver.tick(attempt_at, true, 1, &sources), 1, "round {round} spawns");
            assert_eq!(driver.policy().last_attempt(), Some(attempt_at));
            wait_idle_or_done(&driver, &id).await;

            // Settling happens on the next tick, which must not retry early.
            assert_eq!(driver.tick(attempt_at + Duration::from_secs(1), true, 1, &sources), 0);
            let (snapshot, state) = driver.store().read(&id);
            assert_eq!(state, FetchState::Idle);
            assert_eq!(*snapshot.unwrap(), *original, "stale data stays visible");

            attempt_at += BACKOFF;
        }
        assert_eq!(source.calls("Q"), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn recovery_returns_to_normal_interval() {
        let source = ScriptedSource::new().fail("Q", FetchError::Status(503));
        let mut driver = driver(source.clone());
        let id = SourceId::from("Q");
        let sources = vec![id.clone()];
        let t0 = Instant::now();

        driver.tick(t0, true, 1, &sources);
        wait_idle_or_done(&driver, &id).await;
        source.recover("Q");

        assert_eq!(driver.tick(t0 + BACKOFF, true, 1, &sources), 1);
        wait_idle_or_done(&driver, &id).await;
        assert_eq!(driver.tick(t0 + BACKOFF * 2, true, 1, &sources), 0, "back on the long interval");
        assert!(driver.store().read(&id).0.is_some());
        assert!(driver.policy().last_success().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn config_change_refreshes_immediately() {
        let source = ScriptedSource::new();
        let mut driver = driver(source.clone());
        let id = SourceId::from("W");
        let sources = vec![id.clone()];
        let t0 = Instant::now();

        driver.tick(t0, true, 1, &sources);
        wait_idle_or_done(&driver, &id).await;
        assert_eq!(driver.tick(t0 + Duration::from_secs(10), true, 1, &sources), 0);
        assert_eq!(driver.tick(t0 + Duration::from_secs(10), true, 2, &sources), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn multi_item_arrivals_out_of_order_all_land() {
        let source = ScriptedSource::new()
            .delay("A", Duration::from_millis(10))
            .delay("B", Duration::from_millis(150))
            .delay("C", Duration::from_millis(40));
        let mut driver = driver(source);
        let sources = ids(&["A", "B", "C"]);

        assert_eq!(driver.tick(Instant::now(), true, 1, &sources), 3);

        wait_for(|| driver.store().read_all().len() == 2).await;
        let partial = driver.store().read_all();
        assert!(partial.contains_key(&SourceId::from("C")), "C lands before B");
        assert!(!partial.contains_key(&SourceId::from("B")));

        wait_for(|| driver.store().read_all().len() == 3).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn in_flight_items_are_not_doubled_when_due_again() {
        let source = ScriptedSource::new().delay("SLOW", Duration::from_millis(300));
        let mut driver = driver(source.clone());
        let sources = ids(&["FAST", "SLOW"]);
        let t0 = Instant::now();

        assert_eq!(driver.tick(t0, true, 1, &sources), 2);
        wait_for(|| driver.store().read(&"FAST".into()).1 != FetchState::InFlight).await;

        // Forced by a config change while SLOW is still outstanding.
        assert_eq!(driver.tick(t0, true, 2, &sources), 1);
        wait_for(|| driver.store().read_all().len() == 2).await;
        assert_eq!(source.calls("SLOW"), 1);
        assert_eq!(source.calls("FAST"), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn item_fetched_under_an_old_config_is_fetched_again() {
        let source = ScriptedSource::new().delay("SLOW", Duration::from_millis(200));
        let mut driver = driver(source.clone());
        let sources = ids(&["FAST", "SLOW"]);
        let slow = SourceId::from("SLOW");
        let t0 = Instant::now();

        assert_eq!(driver.tick(t0, true, 1, &sources), 2);
        wait_for(|| driver.store().state(&"FAST".into()) != FetchState::InFlight).await;
        assert_eq!(driver.tick(t0, true, 2, &sources), 1, "only FAST is free to refetch");

        // SLOW lands with data from config 1; the next tick must fetch it again.
        wait_for(|| driver.store().state(&slow) != FetchState::InFlight).await;
        let later = t0 + Duration::from_secs(1);
        assert_eq!(driver.tick(later, true, 2, &sources), 1);
        assert_eq!(driver.store().state(&slow), FetchState::InFlight);

        wait_for(|| driver.store().state(&slow) != FetchState::InFlight).await;
        assert_eq!(driver.tick(later, true, 2, &sources), 0, "nothing left to refresh");
        assert_eq!(source.calls("SLOW"), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn new_item_is_fetched_without_waiting_for_the_interval() {
        let source = ScriptedSource::new();
        let mut driver = driver(source.clone());
        let t0 = Instant::now();

        assert_eq!(driver.tick(t0, true, 1, &ids(&["A"])), 1);
        wait_for(|| driver.store().state(&"A".into()) != FetchState::InFlight).await;
        assert_eq!(driver.tick(t0, true, 1, &ids(&["A", "B"])), 1);
        assert_eq!(source.calls("A"), 1);
    }
}
