use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use arc_swap::ArcSwap;

use crate::snapshot::{DataSnapshot, SourceId};
use crate::source::FetchError;

/// Lifecycle of one source's fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    InFlight,
    /// Published a new snapshot; waiting for the render loop to settle it.
    Succeeded,
    /// Published a failure; waiting for the render loop to settle it.
    Failed,
}

/// Proof of a successful [`SharedStore::begin_fetch`].  Only the fetch
/// holding the current claim for a source may publish to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Claim(u64);

/// A completed fetch handed back to the render loop by [`SharedStore::settle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    Succeeded { at: Instant },
    Failed { at: Instant },
}

/// One source's entry.  Never mutated in place: every transition builds a
/// new `Slot` and swaps it in, so a reader always sees a consistent
/// (snapshot, state) pair.
struct Slot<V> {
    snapshot: Option<Arc<DataSnapshot<V>>>,
    state: FetchState,
    claim: Option<Claim>,
    completed_at: Option<Instant>,
    last_error: Option<FetchError>,
}

impl<V> Clone for Slot<V> {
    fn clone(&self) -> Self {
        Self {
            snapshot: self.snapshot.clone(),
            state: self.state,
            claim: self.claim,
            completed_at: self.completed_at,
            last_error: self.last_error.clone(),
        }
    }
}

impl<V> Slot<V> {
    fn idle() -> Self {
        Self {
            snapshot: None,
            state: FetchState::Idle,
            claim: None,
            completed_at: None,
            last_error: None,
        }
    }

    fn with_state(&self, state: FetchState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    fn claimed(&self, claim: Claim) -> Self {
        Self {
            state: FetchState::InFlight,
            claim: Some(claim),
            ..self.clone()
        }
    }
}

/// Latest snapshot and fetch state per source.
///
/// The only state shared between the render loop and fetch workers.  Each
/// source lives in its own [`ArcSwap`], so a publish for one source never
/// blocks readers of another and readers never wait on a writer.  The outer
/// map is only write-locked to insert or drop a source.
pub struct SharedStore<V> {
    slots: RwLock<BTreeMap<SourceId, Arc<ArcSwap<Slot<V>>>>>,
    /// Claims are numbered store-wide, so a source that is dropped and
    /// re-added never hands out a claim an old worker still holds.
    next_claim: AtomicU64,
}

impl<V> Default for SharedStore<V> {
    fn default() -> Self {
        Self {
            slots: RwLock::new(BTreeMap::new()),
            next_claim: AtomicU64::new(1),
        }
    }
}

impl<V> SharedStore<V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: &SourceId) -> Option<Arc<ArcSwap<Slot<V>>>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn slot_or_insert(&self, id: &SourceId) -> Arc<ArcSwap<Slot<V>>> {
        if let Some(slot) = self.slot(id) {
            return slot;
        }
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id.clone())
            .or_insert_with(|| Arc::new(ArcSwap::from_pointee(Slot::idle())))
            .clone()
    }

    /// Claim `id` for a new fetch.
    ///
    /// Atomically moves the source to [`FetchState::InFlight`] unless it is
    /// already there.  Returns `None` when another fetch owns the source;
    /// at most one caller can win, however many race.
    pub fn begin_fetch(&self, id: &SourceId) -> Option<Claim> {
        let slot = self.slot_or_insert(id);
        let claim = Claim(self.next_claim.fetch_add(1, Ordering::Relaxed));
        let mut claimed = false;
        slot.rcu(|current| {
            if current.state == FetchState::InFlight {
                claimed = false;
                Arc::clone(current)
            } else {
                claimed = true;
                Arc::new(current.claimed(claim))
            }
        });
        claimed.then_some(claim)
    }

    /// Record the result of the fetch holding `claim` for `id`.
    ///
    /// Success replaces the snapshot; failure keeps the previous one readable
    /// and remembers the error.  Results for a source that is not in flight,
    /// or whose current claim is a different one, are dropped.
    pub fn publish(&self, id: &SourceId, claim: Claim, result: Result<DataSnapshot<V>, FetchError>) {
        let Some(slot) = self.slot(id) else {
            tracing::debug!(source = %id, "dropping result for removed source");
            return;
        };
        let result = result.map(Arc::new);
        let now = Instant::now();
        let mut accepted = false;
        slot.rcu(|current| {
            if current.state != FetchState::InFlight || current.claim != Some(claim) {
                accepted = false;
                return Arc::clone(current);
            }
            accepted = true;
            let mut next = (**current).clone();
            next.completed_at = Some(now);
            match &result {
                Ok(snapshot) => {
                    next.snapshot = Some(Arc::clone(snapshot));
                    next.state = FetchState::Succeeded;
                    next.last_error = None;
                }
                Err(e) => {
                    next.state = FetchState::Failed;
                    next.last_error = Some(e.clone());
                }
            }
            Arc::new(next)
        });
        if !accepted {
            tracing::warn!(source = %id, "dropping result from a superseded fetch");
        }
    }

    /// Current snapshot (if any) and fetch state for `id`.
    pub fn read(&self, id: &SourceId) -> (Option<Arc<DataSnapshot<V>>>, FetchState) {
        match self.slot(id) {
            Some(slot) => {
                let current = slot.load();
                (current.snapshot.clone(), current.state)
            }
            None => (None, FetchState::Idle),
        }
    }

    /// Every source that has a snapshot, ordered by id.
    pub fn read_all(&self) -> BTreeMap<SourceId, Arc<DataSnapshot<V>>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|(id, slot)| slot.load().snapshot.clone().map(|snap| (id.clone(), snap)))
            .collect()
    }

    /// Move a completed fetch back to [`FetchState::Idle`] and return its
    /// outcome, or `None` if `id` has nothing to settle.
    pub fn settle(&self, id: &SourceId) -> Option<Settled> {
        let slot = self.slot(id)?;
        let mut settled = None;
        slot.rcu(|current| {
            let at = current.completed_at.unwrap_or_else(Instant::now);
            settled = match current.state {
                FetchState::Succeeded => Some(Settled::Succeeded { at }),
                FetchState::Failed => Some(Settled::Failed { at }),
                FetchState::Idle | FetchState::InFlight => None,
            };
            if settled.is_some() {
                Arc::new(current.with_state(FetchState::Idle))
            } else {
                Arc::clone(current)
            }
        });
        settled
    }

    pub fn state(&self, id: &SourceId) -> FetchState {
        self.slot(id).map_or(FetchState::Idle, |slot| slot.load().state)
    }

    pub fn last_error(&self, id: &SourceId) -> Option<FetchError> {
        self.slot(id).and_then(|slot| slot.load().last_error.clone())
    }

    pub fn ids(&self) -> Vec<SourceId> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Fetch state of every known source, ordered by id.
    pub fn states(&self) -> Vec<(SourceId, FetchState)> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, slot)| (id.clone(), slot.load().state))
            .collect()
    }

    /// Drop every source not listed in `keep`.
    pub fn retain(&self, keep: &[SourceId]) {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|id, _| keep.contains(id));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use crate::snapshot::HistoryPoint;

    fn snap(id: &str, value: f64) -> DataSnapshot<f64> {
        let at = Utc.with_ymd_and_hms(2026, 5, 7, 14, 30, 0).unwrap();
        DataSnapshot::new(id.into(), at, value, vec![HistoryPoint { at, value }])
    }

    fn claim(store: &SharedStore<f64>, id: &str) -> Claim {
        store.begin_fetch(&id.into()).unwrap()
    }

    fn publish_ok(store: &SharedStore<f64>, id: &str, value: f64) {
        let claim = claim(store, id);
        store.publish(&id.into(), claim, Ok(snap(id, value)));
    }

    // -- single flight -------------------------------------------------------

    #[test]
    fn begin_fetch_is_single_flight() {
        let store = SharedStore::<f64>::new();
        let id = SourceId::from("AAPL");

        let claim = store.begin_fetch(&id).unwrap();
        assert!(store.begin_fetch(&id).is_none(), "second claim must lose");
        assert_eq!(store.state(&id), FetchState::InFlight);

        store.publish(&id, claim, Err(FetchError::Status(500)));
        assert!(store.begin_fetch(&id).is_some(), "free again after publishing");
    }

    #[test]
    fn concurrent_claims_have_exactly_one_winner() {
        let store = Arc::new(SharedStore::<f64>::new());
        let id = SourceId::from("race");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                let id = id.clone();
                std::thread::spawn(move || store.begin_fetch(&id).is_some())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
    }

    // -- publish / read ------------------------------------------------------

    #[test]
    fn unknown_source_reads_as_idle_and_empty() {
        let store = SharedStore::<f64>::new();
        let (snapshot, state) = store.read(&"nope".into());
        assert!(snapshot.is_none());
        assert_eq!(state, FetchState::Idle);
    }

    #[test]
    fn published_snapshot_reads_back_identical() {
        let store = SharedStore::<f64>::new();
        let original = snap("AAPL", 184.123_456_789);
        let claim = claim(&store, "AAPL");
        store.publish(&"AAPL".into(), claim, Ok(original.clone()));

        let (read, state) = store.read(&"AAPL".into());
        assert_eq!(state, FetchState::Succeeded);
        let read = read.unwrap();
        assert_eq!(*read, original);
        assert_eq!(read.values().to_bits(), original.values().to_bits());
    }

    #[test]
    fn failure_keeps_the_stale_snapshot() {
        let store = SharedStore::<f64>::new();
        publish_ok(&store, "AAPL", 1.0);
        store.settle(&"AAPL".into());

        let claim = claim(&store, "AAPL");
        store.publish(&"AAPL".into(), claim, Err(FetchError::Network("down".into())));

        let (read, state) = store.read(&"AAPL".into());
        assert_eq!(state, FetchState::Failed);
        assert_eq!(*read.unwrap().values(), 1.0);
        assert_eq!(
            store.last_error(&"AAPL".into()),
            Some(FetchError::Network("down".into()))
        );
    }

    #[test]
    fn success_clears_last_error() {
        let store = SharedStore::<f64>::new();
        let claim = claim(&store, "X");
        store.publish(&"X".into(), claim, Err(FetchError::Status(502)));
        store.settle(&"X".into());
        publish_ok(&store, "X", 2.0);

        assert_eq!(store.last_error(&"X".into()), None);
    }

    #[test]
    fn publish_without_a_live_claim_is_ignored() {
        let store = SharedStore::<f64>::new();
        let spent = claim(&store, "X");
        store.publish(&"X".into(), spent, Ok(snap("X", 1.0)));
        store.settle(&"X".into());

        store.publish(&"X".into(), spent, Ok(snap("X", 99.0)));
        let (read, state) = store.read(&"X".into());
        assert_eq!(*read.unwrap().values(), 1.0);
        assert_eq!(state, FetchState::Idle);

        store.publish(&"unknown".into(), spent, Ok(snap("unknown", 5.0)));
        assert!(store.read(&"unknown".into()).0.is_none());
    }

    #[test]
    fn worker_from_before_a_retain_cannot_publish_into_the_new_slot() {
        let store = SharedStore::<f64>::new();
        let old = claim(&store, "AAPL");
        store.retain(&[]);

        let new = claim(&store, "AAPL");
        store.publish(&"AAPL".into(), old, Ok(snap("AAPL", 1.0)));
        assert_eq!(store.state(&"AAPL".into()), FetchState::InFlight, "old result is dropped");
        assert!(store.read(&"AAPL".into()).0.is_none());

        store.publish(&"AAPL".into(), new, Ok(snap("AAPL", 2.0)));
        assert_eq!(*store.read(&"AAPL".into()).0.unwrap().values(), 2.0);
    }

    #[test]
    fn read_all_collects_out_of_order_arrivals() {
        let store = SharedStore::<f64>::new();
        let [a, b, c] = ["A", "B", "C"].map(|id| claim(&store, id));
        store.publish(&"C".into(), c, Ok(snap("C", 3.0)));
        store.publish(&"A".into(), a, Ok(snap("A", 1.0)));
        assert_eq!(store.read_all().len(), 2, "B still in flight");

        store.publish(&"B".into(), b, Ok(snap("B", 2.0)));
        let all = store.read_all();
        let ids: Vec<_> = all.keys().map(SourceId::as_str).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    // -- settle / retain -----------------------------------------------------

    #[test]
    fn settle_returns_outcome_once_and_goes_idle() {
        let store = SharedStore::<f64>::new();
        publish_ok(&store, "X", 1.0);

        assert!(matches!(store.settle(&"X".into()), Some(Settled::Succeeded { .. })));
        assert_eq!(store.read(&"X".into()).1, FetchState::Idle);
        assert_eq!(store.settle(&"X".into()), None);

        let claim = claim(&store, "X");
        assert_eq!(store.settle(&"X".into()), None, "in-flight fetches are not settled");
        store.publish(&"X".into(), claim, Err(FetchError::Status(404)));
        assert!(matches!(store.settle(&"X".into()), Some(Settled::Failed { .. })));
    }

    #[test]
    fn retain_drops_unlisted_sources() {
        let store = SharedStore::<f64>::new();
        publish_ok(&store, "A", 1.0);
        publish_ok(&store, "B", 2.0);

        store.retain(&["B".into()]);

        assert_eq!(store.ids(), vec![SourceId::from("B")]);
        assert_eq!(store.states(), vec![(SourceId::from("B"), FetchState::Succeeded)]);
    }
}
