//! Persisted "Up Next" queue
//!
//! The queue is the set of playback records with `is_queued` ordered by
//! `queue_position`. Every mutation here holds one lock across
//! read → compute → persist and commits a single batch, so positions stay a
//! dense `0..n` permutation and an episode is never queued twice.

use crate::error::Result;
use crate::events::PlaybackEvent;
use cast_core::{EpisodeId, PlaybackRecord, PlaybackStore, PodcastId, WriteBatch};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

/// Ordered queue of episodes, backed by the store
pub struct QueueManager {
    store: Arc<dyn PlaybackStore>,
    lock: Mutex<()>,
    events: broadcast::Sender<PlaybackEvent>,
}

/// Batch that turns the stored queue into `next`
///
/// Only rows whose slot actually changes are written; records missing from
/// `next` are dequeued.
fn plan(current: &[PlaybackRecord], next: &[EpisodeId]) -> WriteBatch {
    let slots: HashMap<&EpisodeId, i64> = current
        .iter()
        .map(|r| (&r.episode_id, r.queue_position))
        .collect();
    let keep: HashSet<&EpisodeId> = next.iter().collect();

    let mut batch = WriteBatch::new();
    for (index, id) in next.iter().enumerate() {
        let index = index as i64;
        if slots.get(id) != Some(&index) {
            batch.enqueue(id, index);
        }
    }
    for record in current {
        if !keep.contains(&record.episode_id) {
            batch.dequeue(&record.episode_id);
        }
    }
    batch
}

/// Order requested ids first, then every other queued id in its old order
fn reordered(current: &[EpisodeId], requested: &[EpisodeId]) -> Vec<EpisodeId> {
    let queued: HashSet<&EpisodeId> = current.iter().collect();
    let mut seen = HashSet::new();
    let mut next = Vec::with_capacity(current.len());

    for id in requested {
        if !queued.contains(id) {
            warn!(episode_id = %id, "Ignoring reorder of an episode that is not queued");
            continue;
        }
        if seen.insert(id) {
            next.push(id.clone());
        }
    }
    next.extend(current.iter().filter(|id| !seen.contains(id)).cloned());
    next
}

impl QueueManager {
    pub fn new(store: Arc<dyn PlaybackStore>, events: broadcast::Sender<PlaybackEvent>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
            events,
        }
    }

    /// Queued episode ids, head first
    pub async fn queued_ids(&self) -> Result<Vec<EpisodeId>> {
        let records = self.store.get_queued_records().await?;
        Ok(records.into_iter().map(|r| r.episode_id).collect())
    }

    /// Put an episode at the head, queueing it if needed
    pub async fn move_to_front(&self, episode_id: &EpisodeId) -> Result<()> {
        self.mutate(WriteBatch::new(), |ids| {
            if ids.first() == Some(episode_id) {
                return;
            }
            ids.retain(|id| id != episode_id);
            ids.insert(0, episode_id.clone());
        })
        .await
    }

    /// Apply a full or partial ordering
    ///
    /// Listed ids take the first slots in the given order; the rest follow in
    /// their previous relative order. Unqueued and repeated ids are ignored.
    pub async fn reorder(&self, ordered: &[EpisodeId]) -> Result<()> {
        self.mutate(WriteBatch::new(), |ids| {
            *ids = reordered(ids, ordered);
        })
        .await
    }

    /// Take episodes out of the queue and close the gaps
    pub async fn remove(&self, episode_ids: &[EpisodeId]) -> Result<()> {
        self.remove_with(episode_ids, WriteBatch::new()).await
    }

    /// Dequeue and commit extra ops in the same transaction
    pub(crate) async fn remove_with(
        &self,
        episode_ids: &[EpisodeId],
        extra: WriteBatch,
    ) -> Result<()> {
        let remove: HashSet<&EpisodeId> = episode_ids.iter().collect();
        self.mutate(extra, |ids| ids.retain(|id| !remove.contains(id)))
            .await
    }

    /// Append an episode at the tail; no-op if already queued
    pub async fn enqueue(&self, episode_id: &EpisodeId) -> Result<()> {
        self.mutate(WriteBatch::new(), |ids| {
            if !ids.contains(episode_id) {
                ids.push(episode_id.clone());
            }
        })
        .await
    }

    /// Queue the newest unplayed episode of a podcast at the tail
    ///
    /// Returns the episode, or `None` if the podcast has nothing unplayed.
    /// An episode that is already queued keeps its slot.
    pub async fn insert_latest_unplayed(&self, podcast_id: &PodcastId) -> Result<Option<EpisodeId>> {
        let _guard = self.lock.lock().await;

        let Some(episode) = self.store.get_latest_unplayed_episode(podcast_id).await? else {
            debug!(podcast_id = %podcast_id, "No unplayed episode to queue");
            return Ok(None);
        };

        self.commit_locked(WriteBatch::new(), |ids| {
            if !ids.contains(&episode.id) {
                ids.push(episode.id.clone());
            }
        })
        .await?;
        Ok(Some(episode.id))
    }

    pub async fn clear(&self) -> Result<()> {
        self.mutate(WriteBatch::new(), Vec::clear).await
    }

    async fn mutate<F>(&self, extra: WriteBatch, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<EpisodeId>),
    {
        let _guard = self.lock.lock().await;
        self.commit_locked(extra, edit).await
    }

    /// Caller must hold `self.lock`
    async fn commit_locked<F>(&self, extra: WriteBatch, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<EpisodeId>),
    {
        let current = self.store.get_queued_records().await?;
        let mut next: Vec<EpisodeId> = current.iter().map(|r| r.episode_id.clone()).collect();
        edit(&mut next);

        let mut batch = plan(&current, &next);
        let queue_changed = !batch.is_empty();
        batch.append(extra);
        if batch.is_empty() {
            return Ok(());
        }

        self.store.save(batch).await.map_err(|e| {
            warn!(error = %e, "Queue update rolled back");
            e
        })?;

        if queue_changed {
            info!(len = next.len(), "Queue updated");
            let _ = self.events.send(PlaybackEvent::QueueChanged { queue: next });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cast_core::WriteOp;

    fn ids(names: &[&str]) -> Vec<EpisodeId> {
        names.iter().map(|n| EpisodeId::new(*n)).collect()
    }

    fn records(names: &[&str]) -> Vec<PlaybackRecord> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let mut record = PlaybackRecord::new(EpisodeId::new(*n));
                record.is_queued = true;
                record.queue_position = i as i64;
                record
            })
            .collect()
    }

    #[test]
    fn test_plan_writes_only_moved_rows() {
        let batch = plan(&records(&["a", "b", "c"]), &ids(&["c", "a", "b"]));
        let ops: Vec<_> = batch.into_iter().collect();
        assert_eq!(ops.len(), 3);

        let batch = plan(&records(&["a", "b", "c"]), &ids(&["a", "c"]));
        let ops: Vec<_> = batch.into_iter().collect();
        assert_eq!(
            ops,
            vec![
                WriteOp::Enqueue {
                    episode_id: EpisodeId::new("c"),
                    queue_position: 1
                },
                WriteOp::Dequeue {
                    episode_id: EpisodeId::new("b")
                },
            ]
        );
    }

    #[test]
    fn test_plan_unchanged_queue_is_empty() {
        assert!(plan(&records(&["a", "b"]), &ids(&["a", "b"])).is_empty());
    }

    #[test]
    fn test_reordered_partial_keeps_rest() {
        let next = reordered(&ids(&["a", "b", "c", "d"]), &ids(&["d", "b"]));
        assert_eq!(next, ids(&["d", "b", "a", "c"]));
    }

    #[test]
    fn test_reordered_ignores_unknown_and_duplicates() {
        let next = reordered(&ids(&["a", "b", "c"]), &ids(&["c", "x", "c", "a"]));
        assert_eq!(next, ids(&["c", "a", "b"]));
    }
}
