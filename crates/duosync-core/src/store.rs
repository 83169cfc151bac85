// ── Device state store ──
//
// Copy-on-write map of canonical device statuses. The controller task is
// the only writer; readers get immutable `Arc` snapshots. Every commit is
// published twice: synchronously to registered callbacks (in registration
// order) and to a `watch` channel for async consumers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::model::{DeviceStatus, StatusBatch, StatusPatch};
use crate::stream::StatusStream;

/// Device id to canonical status.
pub type StatusMap = BTreeMap<String, DeviceStatus>;

/// Immutable view of the whole map at one commit.
pub type StatusSnapshot = Arc<StatusMap>;

/// Delivered to subscribers after each commit.
#[derive(Debug, Clone)]
pub struct StoreChange {
    /// Monotonic commit counter, starting at 1.
    pub version: u64,
    /// Ids touched by this commit.
    pub changed: Vec<String>,
    /// The map as of this commit.
    pub snapshot: StatusSnapshot,
}

type Callback = Arc<dyn Fn(&StoreChange) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<(u64, Callback)>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    // A panicking callback never runs under this lock, so the data is intact.
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reactive store of device statuses.
pub struct StateStore {
    statuses: watch::Sender<StatusSnapshot>,
    version: AtomicU64,
    last_update: watch::Sender<Option<DateTime<Utc>>>,
    subscribers: Arc<Mutex<Registry>>,
}

impl StateStore {
    pub fn new() -> Self {
        let (statuses, _) = watch::channel(StatusSnapshot::default());
        let (last_update, _) = watch::channel(None);

        Self {
            statuses,
            version: AtomicU64::new(0),
            last_update,
            subscribers: Arc::new(Mutex::new(Registry::default())),
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> StatusSnapshot {
        self.statuses.borrow().clone()
    }

    pub fn get(&self, device_id: &str) -> Option<DeviceStatus> {
        self.statuses.borrow().get(device_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.statuses.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.borrow().is_empty()
    }

    /// Number of commits so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.last_update.borrow()
    }

    /// How long ago the last commit happened, or `None` if never.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_update().map(|t| Utc::now() - t)
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Register a callback run after every commit.
    ///
    /// Callbacks run on the writer's task, in registration order, outside
    /// any store lock. They should return quickly.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StoreChange) + Send + Sync + 'static,
    {
        let mut registry = lock(&self.subscribers);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.entries.push((id, Arc::new(callback)));

        Subscription {
            id,
            registry: Arc::downgrade(&self.subscribers),
        }
    }

    /// Latest-value stream for async consumers.
    pub fn watch(&self) -> StatusStream {
        StatusStream::new(self.statuses.subscribe())
    }

    // ── Writes (controller only) ─────────────────────────────────────

    /// Merge `patch` onto the record for `device_id` (or the default
    /// record) and notify.
    pub(crate) fn update(&self, device_id: &str, patch: &StatusPatch) {
        let mut next = StatusMap::clone(&self.statuses.borrow());
        patch.apply_to(next.entry(device_id.to_owned()).or_default());
        self.commit(next, vec![device_id.to_owned()]);
    }

    /// Merge every entry of `batch` into a staging copy, then publish it in
    /// one step. Returns `false` (and notifies nobody) for an empty batch.
    pub(crate) fn replace_all(&self, batch: &StatusBatch) -> bool {
        if batch.is_empty() {
            return false;
        }

        let mut staging = StatusMap::clone(&self.statuses.borrow());
        for (device_id, patch) in batch {
            patch.apply_to(staging.entry(device_id.clone()).or_default());
        }
        self.commit(staging, batch.keys().cloned().collect());
        true
    }

    fn commit(&self, next: StatusMap, changed: Vec<String>) {
        let snapshot = Arc::new(next);
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;

        self.statuses.send_replace(Arc::clone(&snapshot));
        self.last_update.send_replace(Some(Utc::now()));

        let change = StoreChange {
            version,
            changed,
            snapshot,
        };

        let callbacks: Vec<Callback> = lock(&self.subscribers)
            .entries
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(&change);
        }
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("devices", &self.len())
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

// ── Subscription ─────────────────────────────────────────────────────

/// Handle for a registered callback. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).entries.retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{ColorMode, PowerState};

    fn patch() -> StatusPatch {
        StatusPatch::default()
    }

    fn recorder(store: &StateStore) -> (Subscription, Arc<Mutex<Vec<StoreChange>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = store.subscribe(move |change| sink.lock().unwrap().push(change.clone()));
        (sub, seen)
    }

    #[test]
    fn update_merges_onto_default_record() {
        let store = StateStore::new();
        store.update("a", &patch().with_state(PowerState::On).with_power(5.0));

        let a = store.get("a").unwrap();
        assert_eq!(a.state, PowerState::On);
        assert_eq!(a.power, 5.0);
        assert_eq!(a.brightness, 100);
        assert_eq!(store.version(), 1);
        assert!(store.last_update().is_some());
    }

    #[test]
    fn result_is_fieldwise_merge_in_commit_order() {
        let store = StateStore::new();
        let ops: Vec<(&str, StatusPatch)> = vec![
            ("a", patch().with_state(PowerState::On)),
            ("b", patch().with_brightness(20)),
            ("a", patch().with_power(7.5).with_mode(ColorMode::White)),
            ("b", patch().with_state(PowerState::On).with_brightness(60)),
            ("a", patch().with_state(PowerState::Off)),
        ];

        let mut expected = StatusMap::new();
        for (i, (id, p)) in ops.iter().enumerate() {
            if i % 2 == 0 {
                store.update(id, p);
            } else {
                let batch: StatusBatch = [((*id).to_owned(), p.clone())].into();
                store.replace_all(&batch);
            }
            p.apply_to(expected.entry((*id).to_owned()).or_default());
        }

        assert_eq!(*store.snapshot(), expected);
        assert_eq!(store.version(), 5);
    }

    #[test]
    fn replace_all_publishes_once_with_every_entry() {
        let store = StateStore::new();
        let (_sub, seen) = recorder(&store);

        let batch: StatusBatch = [
            ("a".to_owned(), patch().with_state(PowerState::On)),
            ("b".to_owned(), patch().with_state(PowerState::On)),
            ("c".to_owned(), patch().with_state(PowerState::Off)),
        ]
        .into();
        assert!(store.replace_all(&batch));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].snapshot.len(), 3);
        assert_eq!(seen[0].changed, vec!["a", "b", "c"]);
    }

    #[test]
    fn empty_batch_is_not_a_commit() {
        let store = StateStore::new();
        let (_sub, seen) = recorder(&store);
        assert!(!store.replace_all(&StatusBatch::new()));
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn subscribers_run_in_registration_order() {
        let store = StateStore::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&order);
        let _s1 = store.subscribe(move |_| first.lock().unwrap().push(1));
        let second = Arc::clone(&order);
        let _s2 = store.subscribe(move |_| second.lock().unwrap().push(2));

        store.update("a", &patch());
        store.update("a", &patch());
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 1, 2]);
    }

    #[test]
    fn dropping_subscription_stops_delivery() {
        let store = StateStore::new();
        let (sub, seen) = recorder(&store);

        store.update("a", &patch());
        sub.unsubscribe();
        store.update("a", &patch());

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn callback_may_touch_the_registry() {
        let store = Arc::new(StateStore::new());
        let inner = Arc::clone(&store);
        let late = Arc::new(Mutex::new(Vec::new()));

        let slot = Arc::clone(&late);
        let _sub = store.subscribe(move |_| {
            let sub = inner.subscribe(|_| {});
            slot.lock().unwrap().push(sub);
        });

        store.update("a", &patch());
        assert_eq!(late.lock().unwrap().len(), 1);
    }

    #[test]
    fn snapshots_are_immutable_views() {
        let store = StateStore::new();
        store.update("a", &patch().with_brightness(10));
        let before = store.snapshot();
        store.update("a", &patch().with_brightness(90));

        assert_eq!(before["a"].brightness, 10);
        assert_eq!(store.snapshot()["a"].brightness, 90);
    }
}
