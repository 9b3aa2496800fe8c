use crate::{episodes, podcasts, records};
use async_trait::async_trait;
use cast_core::{
    error::Result,
    storage::PlaybackStore,
    types::{Episode, EpisodeId, PlaybackRecord, Podcast, PodcastId, WriteBatch, WriteOp},
};
use sqlx::{SqliteConnection, SqlitePool};

/// Playback store backed by a `SQLite` pool
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or refresh a podcast (ingestion side)
    pub async fn upsert_podcast(&self, podcast: &Podcast) -> Result<()> {
        Ok(podcasts::upsert(&self.pool, podcast).await?)
    }

    /// Insert or refresh an episode (ingestion side)
    pub async fn upsert_episode(&self, episode: &Episode) -> Result<()> {
        Ok(episodes::upsert(&self.pool, episode).await?)
    }
}

async fn apply(conn: &mut SqliteConnection, op: &WriteOp) -> crate::Result<()> {
    match op {
        WriteOp::SetPosition {
            episode_id,
            position,
        } => records::set_position(conn, episode_id, *position).await,
        WriteOp::Enqueue {
            episode_id,
            queue_position,
        } => records::enqueue(conn, episode_id, *queue_position).await,
        WriteOp::Dequeue { episode_id } => records::dequeue(conn, episode_id).await,
        WriteOp::MarkPlayed { episode_id, at } => records::mark_played(conn, episode_id, *at).await,
        WriteOp::MarkUnplayed { episode_id } => records::mark_unplayed(conn, episode_id).await,
        WriteOp::IncrementPlayCount { episode_id } => {
            records::increment_play_count(conn, episode_id).await
        }
        WriteOp::SetFavorite {
            episode_id,
            favorite,
            at,
        } => records::set_favorite(conn, episode_id, *favorite, *at).await,
        WriteOp::RecordPodcastPlay {
            podcast_id,
            seconds,
        } => podcasts::record_play(conn, podcast_id, *seconds).await,
        WriteOp::SetActualDuration {
            episode_id,
            seconds,
        } => episodes::set_actual_duration(conn, episode_id, *seconds).await,
        WriteOp::SetNowPlaying { episode_id } => {
            episodes::set_now_playing(conn, episode_id.as_ref()).await
        }
    }
}

#[async_trait]
impl PlaybackStore for SqliteStore {
    // Playback records
    async fn get_record(&self, episode_id: &EpisodeId) -> Result<Option<PlaybackRecord>> {
        Ok(records::get(&self.pool, episode_id).await?)
    }

    async fn create_or_get_record(&self, episode_id: &EpisodeId) -> Result<PlaybackRecord> {
        Ok(records::create_or_get(&self.pool, episode_id).await?)
    }

    async fn get_queued_records(&self) -> Result<Vec<PlaybackRecord>> {
        Ok(records::get_queued(&self.pool).await?)
    }

    // Episodes and podcasts
    async fn get_episode(&self, episode_id: &EpisodeId) -> Result<Option<Episode>> {
        Ok(episodes::get(&self.pool, episode_id).await?)
    }

    async fn get_latest_unplayed_episode(
        &self,
        podcast_id: &PodcastId,
    ) -> Result<Option<Episode>> {
        Ok(episodes::get_latest_unplayed(&self.pool, podcast_id).await?)
    }

    async fn get_podcast(&self, podcast_id: &PodcastId) -> Result<Option<Podcast>> {
        Ok(podcasts::get(&self.pool, podcast_id).await?)
    }

    async fn get_now_playing(&self) -> Result<Option<EpisodeId>> {
        Ok(episodes::get_now_playing(&self.pool).await?)
    }

    // Writes
    async fn save(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(crate::StorageError::from)?;
        for op in &batch {
            // Dropping `tx` on error rolls the whole batch back
            if let Err(e) = apply(&mut *tx, op).await {
                tracing::warn!(error = %e, ?op, "Write batch rejected");
                return Err(e.into());
            }
        }
        tx.commit().await.map_err(crate::StorageError::from)?;

        tracing::trace!(ops = batch.len(), "Write batch committed");
        Ok(())
    }
}
