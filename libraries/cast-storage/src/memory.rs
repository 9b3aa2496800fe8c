//! In-memory playback store
//!
//! Same contract as [`SqliteStore`](crate::SqliteStore): batches are applied
//! to a copy of the state and swapped in only if every op succeeds.

use async_trait::async_trait;
use cast_core::{
    error::{CastError, Result},
    storage::PlaybackStore,
    types::{Episode, EpisodeId, PlaybackRecord, Podcast, PodcastId, WriteBatch, WriteOp},
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    podcasts: HashMap<PodcastId, Podcast>,
    episodes: HashMap<EpisodeId, Episode>,
    records: HashMap<EpisodeId, PlaybackRecord>,
    now_playing: Option<EpisodeId>,
}

impl MemoryState {
    fn record_mut(&mut self, episode_id: &EpisodeId) -> &mut PlaybackRecord {
        self.records
            .entry(episode_id.clone())
            .or_insert_with(|| PlaybackRecord::new(episode_id.clone()))
    }

    fn apply(&mut self, op: &WriteOp) -> Result<()> {
        match op {
            WriteOp::SetPosition {
                episode_id,
                position,
            } => self.record_mut(episode_id).position_seconds = position.max(0.0),
            WriteOp::Enqueue {
                episode_id,
                queue_position,
            } => {
                let record = self.record_mut(episode_id);
                record.is_queued = true;
                record.queue_position = *queue_position;
            }
            WriteOp::Dequeue { episode_id } => {
                let record = self.record_mut(episode_id);
                record.is_queued = false;
                record.queue_position = cast_core::NOT_QUEUED;
            }
            WriteOp::MarkPlayed { episode_id, at } => {
                let record = self.record_mut(episode_id);
                record.is_played = true;
                record.played_at = Some(*at);
            }
            WriteOp::MarkUnplayed { episode_id } => {
                let record = self.record_mut(episode_id);
                record.is_played = false;
                record.played_at = None;
            }
            WriteOp::IncrementPlayCount { episode_id } => {
                self.record_mut(episode_id).play_count += 1;
            }
            WriteOp::SetFavorite {
                episode_id,
                favorite,
                at,
            } => {
                let record = self.record_mut(episode_id);
                record.is_favorite = *favorite;
                record.favorited_at = favorite.then_some(*at);
            }
            WriteOp::RecordPodcastPlay {
                podcast_id,
                seconds,
            } => {
                let podcast = self
                    .podcasts
                    .get_mut(podcast_id)
                    .ok_or_else(|| CastError::not_found("Podcast", podcast_id.as_str()))?;
                podcast.play_count += 1;
                podcast.played_seconds += seconds.max(0.0);
            }
            WriteOp::SetActualDuration {
                episode_id,
                seconds,
            } => {
                let episode = self
                    .episodes
                    .get_mut(episode_id)
                    .ok_or_else(|| CastError::not_found("Episode", episode_id.as_str()))?;
                episode.actual_duration = Some(*seconds);
            }
            WriteOp::SetNowPlaying { episode_id } => {
                if let Some(id) = episode_id {
                    if !self.episodes.contains_key(id) {
                        return Err(CastError::not_found("Episode", id.as_str()));
                    }
                }
                self.now_playing.clone_from(episode_id);
            }
        }
        Ok(())
    }
}

/// Playback store held entirely in memory
///
/// Saves can be made to fail on demand, which lets callers exercise their
/// rollback and error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_saves: AtomicBool,
    committed: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| CastError::storage("memory store lock poisoned"))
    }

    /// Insert or replace a podcast
    pub fn insert_podcast(&self, podcast: Podcast) -> Result<()> {
        self.lock()?.podcasts.insert(podcast.id.clone(), podcast);
        Ok(())
    }

    /// Insert or replace an episode
    pub fn insert_episode(&self, episode: Episode) -> Result<()> {
        self.lock()?.episodes.insert(episode.id.clone(), episode);
        Ok(())
    }

    /// Make every subsequent `save` fail without applying anything
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of batches committed so far
    pub fn committed_saves(&self) -> usize {
        self.committed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlaybackStore for MemoryStore {
    async fn get_record(&self, episode_id: &EpisodeId) -> Result<Option<PlaybackRecord>> {
        Ok(self.lock()?.records.get(episode_id).cloned())
    }

    async fn create_or_get_record(&self, episode_id: &EpisodeId) -> Result<PlaybackRecord> {
        Ok(self.lock()?.record_mut(episode_id).clone())
    }

    async fn get_queued_records(&self) -> Result<Vec<PlaybackRecord>> {
        let state = self.lock()?;
        let mut queued: Vec<PlaybackRecord> = state
            .records
            .values()
            .filter(|r| r.is_queued)
            .cloned()
            .collect();
        queued.sort_by(|a, b| {
            a.queue_position
                .cmp(&b.queue_position)
                .then_with(|| a.episode_id.cmp(&b.episode_id))
        });
        Ok(queued)
    }

    async fn get_episode(&self, episode_id: &EpisodeId) -> Result<Option<Episode>> {
        Ok(self.lock()?.episodes.get(episode_id).cloned())
    }

    async fn get_latest_unplayed_episode(
        &self,
        podcast_id: &PodcastId,
    ) -> Result<Option<Episode>> {
        let state = self.lock()?;
        let latest = state
            .episodes
            .values()
            .filter(|e| &e.podcast_id == podcast_id)
            .filter(|e| !state.records.get(&e.id).is_some_and(|r| r.is_played))
            .max_by(|a, b| {
                a.published_at
                    .cmp(&b.published_at)
                    .then_with(|| a.id.cmp(&b.id))
            })
            .cloned();
        Ok(latest)
    }

    async fn get_podcast(&self, podcast_id: &PodcastId) -> Result<Option<Podcast>> {
        Ok(self.lock()?.podcasts.get(podcast_id).cloned())
    }

    async fn get_now_playing(&self) -> Result<Option<EpisodeId>> {
        Ok(self.lock()?.now_playing.clone())
    }

    async fn save(&self, batch: WriteBatch) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CastError::storage("save rejected"));
        }

        let mut state = self.lock()?;
        let mut next = state.clone();
        for op in &batch {
            next.apply(op)?;
        }
        *state = next;
        drop(state);

        self.committed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
