use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::{Duration, SystemTime},
};

use taskboard_model::{StoreStats, TaskId, TaskState};
use tracing::{debug, trace, warn};

use crate::{
    clock::{Clock, SystemClock},
    config::{ENTRY_OVERHEAD_BYTES, StoreConfig},
    error::StoreError,
    reaper::{Reaper, ReaperHandle},
    repository::TaskStateRepository,
};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// In-memory, capacity and age bounded task state storage.
///
/// Completed or failed tasks are evicted once older than the configured age,
/// either when a save pushes the store above capacity or when cleanup is
/// called (directly or by the [`Reaper`]). Tasks in any other state are never
/// evicted, so a store full of in-flight tasks keeps growing past capacity.
#[derive(Clone)]
pub struct TaskStateStore {
    inner: Arc<RwLock<TaskStateInner>>,
    config: StoreConfig,
    clock: Arc<dyn Clock>,
}

struct Entry {
    state: TaskState,
    /// Set on first sight of the id, never updated.
    created_at: SystemTime,
}

#[derive(Default)]
struct TaskStateInner {
    /// Tasks indexed by TaskId.
    entries: HashMap<TaskId, Entry>,
    /// Index: (created_at, id) in creation order, used to find aged entries.
    by_created: BTreeSet<(SystemTime, TaskId)>,
}

impl TaskStateInner {
    fn upsert(&mut self, id: TaskId, state: TaskState, now: SystemTime) {
        match self.entries.get_mut(&id) {
            Some(entry) => entry.state = state,
            None => {
                self.by_created.insert((now, id.clone()));
                self.entries.insert(
                    id,
                    Entry {
                        state,
                        created_at: now,
                    },
                );
            }
        }
    }

    /// Remove terminal entries with `now - created_at > max_age`.
    ///
    /// Only the part of the creation index older than the cutoff is visited.
    fn evict_terminal_older_than(&mut self, now: SystemTime, max_age: Duration) -> usize {
        let Some(cutoff) = now.checked_sub(max_age) else {
            return 0;
        };

        // `(cutoff, "")` sorts before every key stamped exactly at the cutoff,
        // so entries whose age equals max_age stay.
        let evictable: Vec<(SystemTime, TaskId)> = self
            .by_created
            .range(..(cutoff, TaskId::default()))
            .filter(|(_, id)| {
                self.entries
                    .get(id)
                    .is_some_and(|entry| entry.state.is_terminal())
            })
            .cloned()
            .collect();

        for key in &evictable {
            self.by_created.remove(key);
            self.entries.remove(&key.1);
        }
        evictable.len()
    }

    fn memory_usage(&self) -> u64 {
        self.entries
            .keys()
            .map(|id| id.len() as u64 + ENTRY_OVERHEAD_BYTES)
            .sum()
    }
}

impl TaskStateStore {
    /// Create an empty store with default limits and no reaper.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: StoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(TaskStateInner::default())),
            config,
            clock,
        }
    }

    /// Create a store and start its reaper on the current tokio runtime.
    ///
    /// The returned handle owns the reaper; shut it down (or drop it) on teardown.
    pub fn spawn(config: StoreConfig) -> Result<(Self, ReaperHandle), StoreError> {
        Self::spawn_with_clock(config, Arc::new(SystemClock))
    }

    pub fn spawn_with_clock(
        config: StoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, ReaperHandle), StoreError> {
        config.validate()?;
        let store = Self::with_clock(config, clock);
        let handle = Reaper::from_store(store.clone()).spawn();
        Ok((store, handle))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Snapshot copy of every task state.
    pub fn load_all(&self) -> Result<HashMap<TaskId, TaskState>, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .entries
            .iter()
            .map(|(id, entry)| (id.clone(), entry.state.clone()))
            .collect())
    }

    /// Get the state of a single task.
    pub fn get(&self, id: &TaskId) -> Result<Option<TaskState>, StoreError> {
        let inner = self.read()?;
        Ok(inner.entries.get(id).map(|entry| entry.state.clone()))
    }

    /// Merge `updates` into the store, last write wins per key.
    ///
    /// When the merge leaves more than `capacity` entries, an eviction pass
    /// with the configured max age runs before the write lock is released.
    pub fn save_all<I>(&self, updates: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (TaskId, TaskState)>,
    {
        let mut inner = self.write()?;
        let now = self.clock.now();

        let mut count = 0usize;
        for (id, state) in updates {
            inner.upsert(id, state, now);
            count += 1;
        }
        trace!(updates = count, total = inner.entries.len(), "task states saved");

        if inner.entries.len() > self.config.capacity {
            let removed = inner.evict_terminal_older_than(now, self.config.max_completed_age);
            let remaining = inner.entries.len();
            if removed > 0 {
                debug!(removed, remaining, "capacity eviction removed aged tasks");
            }
            if remaining > self.config.capacity {
                warn!(
                    remaining,
                    capacity = self.config.capacity,
                    "task store above capacity with no evictable tasks"
                );
            }
        }
        Ok(())
    }

    /// Remove completed or failed tasks older than `max_age`.
    ///
    /// Returns how many entries were removed.
    pub fn cleanup_older_than(&self, max_age: Duration) -> Result<usize, StoreError> {
        let mut inner = self.write()?;
        let removed = inner.evict_terminal_older_than(self.clock.now(), max_age);
        if removed > 0 {
            debug!(removed, remaining = inner.entries.len(), "aged tasks cleaned up");
        }
        Ok(removed)
    }

    /// Approximate footprint in bytes: key length plus a fixed overhead per entry.
    pub fn memory_usage_estimate(&self) -> u64 {
        self.read_advisory().memory_usage()
    }

    /// Counts by category, computed on every call.
    pub fn stats(&self) -> StoreStats {
        let inner = self.read_advisory();

        let completed_tasks = inner
            .entries
            .values()
            .filter(|entry| entry.state.is_terminal())
            .count();
        let total_tasks = inner.entries.len();

        StoreStats {
            total_tasks,
            active_tasks: total_tasks - completed_tasks,
            completed_tasks,
            memory_usage_mb: inner.memory_usage() / BYTES_PER_MB,
        }
    }

    pub fn len(&self) -> usize {
        self.read_advisory().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, TaskStateInner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Poisoned("task state"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, TaskStateInner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Poisoned("task state"))
    }

    /// Statistics keep working on a poisoned lock; they never drive eviction.
    fn read_advisory(&self) -> RwLockReadGuard<'_, TaskStateInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TaskStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStateRepository for TaskStateStore {
    fn load_all(&self) -> Result<HashMap<TaskId, TaskState>, StoreError> {
        TaskStateStore::load_all(self)
    }

    fn save_all(&self, updates: HashMap<TaskId, TaskState>) -> Result<(), StoreError> {
        TaskStateStore::save_all(self, updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn manual_store(config: StoreConfig) -> (TaskStateStore, ManualClock) {
        let clock = ManualClock::new(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        let store = TaskStateStore::with_clock(config, Arc::new(clock.clone()));
        (store, clock)
    }

    fn updates(pairs: &[(&str, TaskState)]) -> Vec<(TaskId, TaskState)> {
        pairs
            .iter()
            .map(|(id, state)| (TaskId::from(*id), state.clone()))
            .collect()
    }

    #[test]
    fn save_and_load_roundtrip() {
        let store = TaskStateStore::new();
        store
            .save_all(updates(&[
                ("scan-1", TaskState::Running),
                ("scan-2", TaskState::Pending),
            ]))
            .unwrap();

        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[&TaskId::from("scan-1")], TaskState::Running);
        assert_eq!(all[&TaskId::from("scan-2")], TaskState::Pending);
    }

    #[test]
    fn last_write_wins() {
        let store = TaskStateStore::new();
        store
            .save_all(updates(&[("build", TaskState::Pending)]))
            .unwrap();
        store
            .save_all(updates(&[("build", TaskState::Running)]))
            .unwrap();
        store
            .save_all(updates(&[("build", TaskState::Failed)]))
            .unwrap();

        assert_eq!(
            store.get(&TaskId::from("build")).unwrap(),
            Some(TaskState::Failed)
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn load_all_returns_detached_snapshot() {
        let store = TaskStateStore::new();
        store.save_all(updates(&[("a", TaskState::Running)])).unwrap();

        let mut snapshot = store.load_all().unwrap();
        snapshot.insert(TaskId::from("b"), TaskState::Completed);
        store.save_all(updates(&[("a", TaskState::Completed)])).unwrap();

        assert_eq!(snapshot[&TaskId::from("a")], TaskState::Running);
        assert!(store.get(&TaskId::from("b")).unwrap().is_none());
    }

    #[test]
    fn cleanup_drops_only_aged_terminal_tasks() {
        let (store, clock) = manual_store(StoreConfig::default());
        store
            .save_all(updates(&[
                ("A", TaskState::Running),
                ("B", TaskState::Completed),
            ]))
            .unwrap();

        clock.advance(8 * DAY);
        let removed = store.cleanup_older_than(7 * DAY).unwrap();

        assert_eq!(removed, 1);
        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[&TaskId::from("A")], TaskState::Running);
    }

    #[test]
    fn cleanup_never_removes_active_tasks() {
        let (store, clock) = manual_store(StoreConfig::default());
        store
            .save_all(updates(&[
                ("pending", TaskState::Pending),
                ("running", TaskState::Running),
                ("blocked", TaskState::from("blocked")),
            ]))
            .unwrap();

        clock.advance(365 * DAY);
        assert_eq!(store.cleanup_older_than(Duration::ZERO).unwrap(), 0);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn cleanup_keeps_young_terminal_tasks() {
        let (store, clock) = manual_store(StoreConfig::default());
        store
            .save_all(updates(&[
                ("done", TaskState::Completed),
                ("broken", TaskState::Failed),
            ]))
            .unwrap();

        clock.advance(DAY);
        assert_eq!(store.cleanup_older_than(7 * DAY).unwrap(), 0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn age_equal_to_max_is_not_evicted() {
        let (store, clock) = manual_store(StoreConfig::default());
        store
            .save_all(updates(&[("edge", TaskState::Completed)]))
            .unwrap();

        clock.advance(7 * DAY);
        assert_eq!(store.cleanup_older_than(7 * DAY).unwrap(), 0);

        clock.advance(Duration::from_nanos(1));
        assert_eq!(store.cleanup_older_than(7 * DAY).unwrap(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn created_at_survives_state_changes() {
        let (store, clock) = manual_store(StoreConfig::default());
        store.save_all(updates(&[("t", TaskState::Running)])).unwrap();

        clock.advance(10 * DAY);
        // Flipping to a terminal state must not reset the age.
        store.save_all(updates(&[("t", TaskState::Completed)])).unwrap();

        assert_eq!(store.cleanup_older_than(7 * DAY).unwrap(), 1);
    }

    #[test]
    fn terminal_task_flipped_back_to_active_is_kept() {
        let (store, clock) = manual_store(StoreConfig::default());
        store.save_all(updates(&[("t", TaskState::Failed)])).unwrap();
        store.save_all(updates(&[("t", TaskState::Running)])).unwrap();

        clock.advance(30 * DAY);
        assert_eq!(store.cleanup_older_than(7 * DAY).unwrap(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn cleanup_is_idempotent() {
        let (store, clock) = manual_store(StoreConfig::default());
        store
            .save_all(updates(&[
                ("a", TaskState::Completed),
                ("b", TaskState::Failed),
                ("c", TaskState::Running),
            ]))
            .unwrap();

        clock.advance(8 * DAY);
        assert_eq!(store.cleanup_older_than(7 * DAY).unwrap(), 2);
        assert_eq!(store.cleanup_older_than(7 * DAY).unwrap(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn huge_max_age_evicts_nothing() {
        let (store, clock) = manual_store(StoreConfig::default());
        store.save_all(updates(&[("a", TaskState::Completed)])).unwrap();
        clock.advance(DAY);

        assert_eq!(store.cleanup_older_than(Duration::MAX).unwrap(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn capacity_overflow_evicts_aged_completed_task() {
        let (store, clock) = manual_store(StoreConfig::default());
        store
            .save_all(updates(&[("old", TaskState::Completed)]))
            .unwrap();

        clock.advance(8 * DAY);
        let batch: Vec<_> = (0..1000)
            .map(|i| (TaskId::from(format!("task-{i}")), TaskState::Running))
            .collect();
        store.save_all(batch).unwrap();

        assert_eq!(store.len(), 1000);
        assert!(store.get(&TaskId::from("old")).unwrap().is_none());
    }

    #[test]
    fn capacity_overflow_without_evictable_tasks_keeps_growing() {
        let (store, clock) = manual_store(StoreConfig::default().with_capacity(3));
        store
            .save_all(updates(&[
                ("a", TaskState::Running),
                ("b", TaskState::Running),
                ("c", TaskState::Completed),
            ]))
            .unwrap();

        // "c" is terminal but too young to be evicted.
        clock.advance(DAY);
        store.save_all(updates(&[("d", TaskState::Pending)])).unwrap();
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn no_eviction_at_exact_capacity() {
        let (store, clock) = manual_store(StoreConfig::default().with_capacity(2));
        store
            .save_all(updates(&[("a", TaskState::Completed)]))
            .unwrap();
        clock.advance(8 * DAY);

        store.save_all(updates(&[("b", TaskState::Running)])).unwrap();
        assert_eq!(store.len(), 2);

        store.save_all(updates(&[("c", TaskState::Running)])).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.get(&TaskId::from("a")).unwrap().is_none());
    }

    #[test]
    fn stats_counts_by_category() {
        let store = TaskStateStore::new();
        store
            .save_all(updates(&[
                ("a", TaskState::Pending),
                ("b", TaskState::Running),
                ("c", TaskState::from("blocked")),
                ("d", TaskState::Completed),
                ("e", TaskState::Failed),
            ]))
            .unwrap();

        let stats = store.stats();
        assert_eq!(stats.total_tasks, 5);
        assert_eq!(stats.active_tasks, 3);
        assert_eq!(stats.completed_tasks, 2);
        assert_eq!(stats.memory_usage_mb, 0);
        assert_eq!(stats.total_tasks, store.load_all().unwrap().len());
    }

    #[test]
    fn memory_estimate_is_key_length_plus_overhead() {
        let store = TaskStateStore::new();
        assert_eq!(store.memory_usage_estimate(), 0);

        store
            .save_all(updates(&[
                ("abc", TaskState::Running),
                ("", TaskState::Completed),
            ]))
            .unwrap();
        assert_eq!(store.memory_usage_estimate(), 3 + 100 + 100);
    }

    #[test]
    fn memory_mb_rounds_down() {
        let store = TaskStateStore::with_config(StoreConfig::default().with_capacity(usize::MAX));
        let id = "x".repeat(1024 * 1024);
        store
            .save_all(vec![(TaskId::from(id), TaskState::Running)])
            .unwrap();

        assert_eq!(store.memory_usage_estimate(), 1024 * 1024 + 100);
        assert_eq!(store.stats().memory_usage_mb, 1);
    }

    #[test]
    fn concurrent_disjoint_saves_are_not_lost() {
        let store = TaskStateStore::with_config(StoreConfig::default().with_capacity(usize::MAX));

        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let id = TaskId::from(format!("w{worker}-t{i}"));
                        let state = if i % 2 == 0 {
                            TaskState::Running
                        } else {
                            TaskState::Completed
                        };
                        store.save_all(vec![(id, state)]).unwrap();
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 800);
        assert_eq!(all[&TaskId::from("w3-t10")], TaskState::Running);
        assert_eq!(all[&TaskId::from("w7-t99")], TaskState::Completed);

        let stats = store.stats();
        assert_eq!(stats.active_tasks + stats.completed_tasks, stats.total_tasks);
    }

    #[test]
    fn poisoned_lock_surfaces_as_error() {
        let store = TaskStateStore::new();
        store.save_all(updates(&[("a", TaskState::Running)])).unwrap();

        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.inner.write().unwrap();
            panic!("writer panicked");
        })
        .join();

        assert!(matches!(store.load_all(), Err(StoreError::Poisoned(_))));
        assert!(matches!(
            store.cleanup_older_than(Duration::ZERO),
            Err(StoreError::Poisoned(_))
        ));
        // Advisory reads still answer.
        assert_eq!(store.stats().total_tasks, 1);
    }

    #[test]
    fn works_through_repository_trait() {
        let store = TaskStateStore::new();
        let repo: &dyn TaskStateRepository = &store;

        let mut batch = HashMap::new();
        batch.insert(TaskId::from("x"), TaskState::Running);
        repo.save_all(batch).unwrap();

        assert_eq!(repo.load_all().unwrap().len(), 1);
    }
}
