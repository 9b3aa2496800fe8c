//! Episode rows: ingestion writes them, playback reads them and maintains
//! the measured duration and the "now playing" marker.

use crate::error::{Result, StorageError};
use crate::from_timestamp;
use cast_core::types::{Episode, EpisodeId, PodcastId};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};

fn from_row(row: &SqliteRow) -> Result<Episode> {
    Ok(Episode {
        id: EpisodeId::new(row.get::<String, _>("id")),
        podcast_id: PodcastId::new(row.get::<String, _>("podcast_id")),
        title: row.get("title"),
        audio_url: row.get("audio_url"),
        feed_duration: row.get("feed_duration"),
        actual_duration: row.get("actual_duration"),
        published_at: from_timestamp(row.get::<i64, _>("published_at"))?,
    })
}

/// Insert or refresh an episode from the feed
///
/// A measured duration already on the row survives a refresh that carries none.
pub async fn upsert(pool: &SqlitePool, episode: &Episode) -> Result<()> {
    sqlx::query(
        "INSERT INTO episodes (id, podcast_id, title, audio_url, feed_duration, actual_duration, published_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            podcast_id = excluded.podcast_id,
            title = excluded.title,
            audio_url = excluded.audio_url,
            feed_duration = excluded.feed_duration,
            actual_duration = COALESCE(excluded.actual_duration, episodes.actual_duration),
            published_at = excluded.published_at",
    )
    .bind(episode.id.as_str())
    .bind(episode.podcast_id.as_str())
    .bind(&episode.title)
    .bind(&episode.audio_url)
    .bind(episode.feed_duration)
    .bind(episode.actual_duration)
    .bind(episode.published_at.timestamp())
    .execute(pool)
    .await?;

    Ok(())
}

/// Get an episode by id
pub async fn get(pool: &SqlitePool, id: &EpisodeId) -> Result<Option<Episode>> {
    let row = sqlx::query(
        "SELECT id, podcast_id, title, audio_url, feed_duration, actual_duration, published_at
         FROM episodes WHERE id = ?",
    )
    .bind(id.as_str())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(from_row).transpose()
}

/// Newest episode of a podcast that has not been played
///
/// Episodes without a playback record count as unplayed.
pub async fn get_latest_unplayed(pool: &SqlitePool, podcast_id: &PodcastId) -> Result<Option<Episode>> {
    let row = sqlx::query(
        "SELECT e.id, e.podcast_id, e.title, e.audio_url, e.feed_duration, e.actual_duration, e.published_at
         FROM episodes e
         LEFT JOIN playback_records r ON r.episode_id = e.id
         WHERE e.podcast_id = ? AND COALESCE(r.is_played, 0) = 0
         ORDER BY e.published_at DESC, e.id DESC
         LIMIT 1",
    )
    .bind(podcast_id.as_str())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(from_row).transpose()
}

/// Episode currently flagged as playing
pub async fn get_now_playing(pool: &SqlitePool) -> Result<Option<EpisodeId>> {
    let id: Option<String> =
        sqlx::query_scalar("SELECT id FROM episodes WHERE is_now_playing = 1 LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(id.map(EpisodeId::new))
}

/// Store the engine-measured duration
pub async fn set_actual_duration(
    conn: &mut SqliteConnection,
    id: &EpisodeId,
    seconds: f64,
) -> Result<()> {
    let result = sqlx::query("UPDATE episodes SET actual_duration = ? WHERE id = ?")
        .bind(seconds)
        .bind(id.as_str())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("Episode", id.as_str()));
    }

    Ok(())
}

/// Move the "now playing" marker; at most one episode carries it
pub async fn set_now_playing(conn: &mut SqliteConnection, id: Option<&EpisodeId>) -> Result<()> {
    sqlx::query("UPDATE episodes SET is_now_playing = 0 WHERE is_now_playing = 1")
        .execute(&mut *conn)
        .await?;

    if let Some(id) = id {
        let result = sqlx::query("UPDATE episodes SET is_now_playing = 1 WHERE id = ?")
            .bind(id.as_str())
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Episode", id.as_str()));
        }
    }

    Ok(())
}
