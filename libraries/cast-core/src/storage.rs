//! Store trait consumed by the playback core

use crate::error::Result;
use crate::types::{Episode, EpisodeId, PlaybackRecord, Podcast, PodcastId, WriteBatch};
use async_trait::async_trait;

/// Durable store of episodes, podcasts, and playback records
///
/// Every call runs in its own execution context (a pooled connection or an
/// independent lock scope), so a write never blocks foreground reads and
/// never depends on an object captured elsewhere: targets are resolved by id
/// at commit time.
#[async_trait]
pub trait PlaybackStore: Send + Sync {
    // ========================================================================
    // Playback records
    // ========================================================================

    /// Get the record for an episode, if one was ever written
    async fn get_record(&self, episode_id: &EpisodeId) -> Result<Option<PlaybackRecord>>;

    /// Get the record for an episode, creating a default one if absent
    ///
    /// Concurrent callers for the same id observe a single record.
    async fn create_or_get_record(&self, episode_id: &EpisodeId) -> Result<PlaybackRecord>;

    /// All queued records ordered by `queue_position`
    async fn get_queued_records(&self) -> Result<Vec<PlaybackRecord>>;

    // ========================================================================
    // Episodes and podcasts (read side of ingestion-owned data)
    // ========================================================================

    /// Get an episode by id
    async fn get_episode(&self, episode_id: &EpisodeId) -> Result<Option<Episode>>;

    /// Newest episode of a podcast whose record is not marked played
    async fn get_latest_unplayed_episode(&self, podcast_id: &PodcastId)
        -> Result<Option<Episode>>;

    /// Get a podcast and its listening aggregate
    async fn get_podcast(&self, podcast_id: &PodcastId) -> Result<Option<Podcast>>;

    /// Episode carrying the "currently playing" marker
    async fn get_now_playing(&self) -> Result<Option<EpisodeId>>;

    // ========================================================================
    // Writes
    // ========================================================================

    /// Commit every op of the batch in one transaction
    ///
    /// On error nothing from the batch is applied.
    async fn save(&self, batch: WriteBatch) -> Result<()>;
}
