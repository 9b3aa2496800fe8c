//! Debounced position saves
//!
//! While playing, ticks call [`PersistenceSync::record_progress`]; a save is
//! scheduled only once the position has moved far enough from the last saved
//! or scheduled value, and each newer schedule supersedes the pending one.
//! Pause, stop, backgrounding and interruptions call
//! [`PersistenceSync::flush`] instead.
//!
//! Every write is a single `SetPosition` op resolved by episode id inside the
//! store's own transaction. Failures are logged and superseded by the next
//! write.
//!
//! Writes are serialized by a shared lock. A debounced save carries the
//! sequence number it was scheduled under and only writes while that number
//! is still current, so a save that wakes after a flush or cancel is dropped.
//! [`PersistenceSync::flush`] and [`PersistenceSync::cancel`] wait for a save
//! already inside the store to finish before returning.

use cast_core::{EpisodeId, PlaybackStore, WriteBatch};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

pub struct PersistenceSync {
    store: Arc<dyn PlaybackStore>,
    min_delta: f64,
    debounce: Duration,
    /// Last saved or scheduled position
    last: Option<(EpisodeId, f64)>,
    pending: Option<(EpisodeId, JoinHandle<()>)>,
    /// Stamp of the newest write intent
    sequence: Arc<AtomicU64>,
    /// Held across every position write
    write_lock: Arc<Mutex<()>>,
}

async fn save_position(store: &dyn PlaybackStore, episode_id: &EpisodeId, position: f64) {
    let mut batch = WriteBatch::new();
    batch.set_position(episode_id, position);
    match store.save(batch).await {
        Ok(()) => trace!(episode_id = %episode_id, position, "Position saved"),
        Err(e) => warn!(episode_id = %episode_id, error = %e, "Failed to save position"),
    }
}

impl PersistenceSync {
    pub fn new(store: Arc<dyn PlaybackStore>, min_delta: f64, debounce: Duration) -> Self {
        Self {
            store,
            min_delta,
            debounce,
            last: None,
            pending: None,
            sequence: Arc::new(AtomicU64::new(0)),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Start following an episode whose stored position is `baseline`
    pub fn track(&mut self, episode_id: &EpisodeId, baseline: f64) {
        self.supersede();
        self.last = Some((episode_id.clone(), baseline));
    }

    /// Schedule a debounced save if the position moved enough
    ///
    /// Returns whether a save was scheduled.
    pub fn record_progress(&mut self, episode_id: &EpisodeId, position: f64) -> bool {
        let moved = match &self.last {
            Some((id, saved)) if id == episode_id => (position - saved).abs() >= self.min_delta,
            _ => true,
        };
        if !moved {
            return false;
        }

        let stamp = self.supersede();
        let store = Arc::clone(&self.store);
        let sequence = Arc::clone(&self.sequence);
        let write_lock = Arc::clone(&self.write_lock);
        let id = episode_id.clone();
        let delay = self.debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _guard = write_lock.lock().await;
            if sequence.load(Ordering::SeqCst) != stamp {
                trace!(episode_id = %id, position, "Dropping superseded position save");
                return;
            }
            save_position(store.as_ref(), &id, position).await;
        });

        self.pending = Some((episode_id.clone(), handle));
        self.last = Some((episode_id.clone(), position));
        true
    }

    /// Save now, replacing any pending save
    pub async fn flush(&mut self, episode_id: &EpisodeId, position: f64) {
        self.supersede();
        {
            let _guard = self.write_lock.lock().await;
            save_position(self.store.as_ref(), episode_id, position).await;
        }
        self.last = Some((episode_id.clone(), position));
    }

    /// Drop a pending save for this episode without writing
    ///
    /// Returns once no save for it can land afterwards.
    pub async fn cancel(&mut self, episode_id: &EpisodeId) {
        if matches!(&self.pending, Some((id, _)) if id == episode_id) {
            self.supersede();
            let _barrier = self.write_lock.lock().await;
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }

    /// Invalidate every scheduled save and return the new stamp
    ///
    /// Tasks are not aborted: one already inside the store keeps the write
    /// lock until its commit resolves.
    fn supersede(&mut self) -> u64 {
        if let Some((id, handle)) = self.pending.take() {
            if !handle.is_finished() {
                trace!(episode_id = %id, "Superseding pending position save");
            }
        }
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Drop for PersistenceSync {
    fn drop(&mut self) {
        self.supersede();
    }
}
