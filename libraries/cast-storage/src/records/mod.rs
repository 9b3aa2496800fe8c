//! Playback records: position, queue slot and played/favorite flags
//!
//! Every mutation here resolves its row by episode id on the connection it is
//! given, so callers can run several of them inside one transaction.

use crate::error::Result;
use crate::from_timestamp;
use cast_core::types::{EpisodeId, PlaybackRecord, NOT_QUEUED};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};

fn from_row(row: &SqliteRow) -> Result<PlaybackRecord> {
    let played_at: Option<i64> = row.get("played_at");
    let favorited_at: Option<i64> = row.get("favorited_at");

    Ok(PlaybackRecord {
        episode_id: EpisodeId::new(row.get::<String, _>("episode_id")),
        position_seconds: row.get("position_seconds"),
        queue_position: row.get("queue_position"),
        is_queued: row.get::<i64, _>("is_queued") != 0,
        is_played: row.get::<i64, _>("is_played") != 0,
        is_favorite: row.get::<i64, _>("is_favorite") != 0,
        play_count: row.get("play_count"),
        played_at: played_at.map(from_timestamp).transpose()?,
        favorited_at: favorited_at.map(from_timestamp).transpose()?,
    })
}

/// Get the record for an episode
pub async fn get(pool: &SqlitePool, episode_id: &EpisodeId) -> Result<Option<PlaybackRecord>> {
    let row = sqlx::query(
        "SELECT episode_id, position_seconds, queue_position, is_queued, is_played,
                is_favorite, play_count, played_at, favorited_at
         FROM playback_records WHERE episode_id = ?",
    )
    .bind(episode_id.as_str())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(from_row).transpose()
}

/// Get the record for an episode, inserting defaults first if absent
///
/// The insert is a no-op on conflict, so racing callers converge on one row.
pub async fn create_or_get(pool: &SqlitePool, episode_id: &EpisodeId) -> Result<PlaybackRecord> {
    let mut conn = pool.acquire().await?;
    ensure(&mut conn, episode_id).await?;

    let row = sqlx::query(
        "SELECT episode_id, position_seconds, queue_position, is_queued, is_played,
                is_favorite, play_count, played_at, favorited_at
         FROM playback_records WHERE episode_id = ?",
    )
    .bind(episode_id.as_str())
    .fetch_one(&mut *conn)
    .await?;

    from_row(&row)
}

/// Queued records in queue order
pub async fn get_queued(pool: &SqlitePool) -> Result<Vec<PlaybackRecord>> {
    let rows = sqlx::query(
        "SELECT episode_id, position_seconds, queue_position, is_queued, is_played,
                is_favorite, play_count, played_at, favorited_at
         FROM playback_records
         WHERE is_queued = 1
         ORDER BY queue_position ASC, episode_id ASC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(from_row).collect()
}

/// Insert a default record unless one exists
pub async fn ensure(conn: &mut SqliteConnection, episode_id: &EpisodeId) -> Result<()> {
    sqlx::query(
        "INSERT INTO playback_records (episode_id, queue_position)
         VALUES (?, ?)
         ON CONFLICT(episode_id) DO NOTHING",
    )
    .bind(episode_id.as_str())
    .bind(NOT_QUEUED)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn set_position(
    conn: &mut SqliteConnection,
    episode_id: &EpisodeId,
    position: f64,
) -> Result<()> {
    ensure(conn, episode_id).await?;
    sqlx::query("UPDATE playback_records SET position_seconds = ? WHERE episode_id = ?")
        .bind(position.max(0.0))
        .bind(episode_id.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn enqueue(
    conn: &mut SqliteConnection,
    episode_id: &EpisodeId,
    queue_position: i64,
) -> Result<()> {
    ensure(conn, episode_id).await?;
    sqlx::query(
        "UPDATE playback_records SET is_queued = 1, queue_position = ? WHERE episode_id = ?",
    )
    .bind(queue_position)
    .bind(episode_id.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn dequeue(conn: &mut SqliteConnection, episode_id: &EpisodeId) -> Result<()> {
    ensure(conn, episode_id).await?;
    sqlx::query(
        "UPDATE playback_records SET is_queued = 0, queue_position = ? WHERE episode_id = ?",
    )
    .bind(NOT_QUEUED)
    .bind(episode_id.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn mark_played(
    conn: &mut SqliteConnection,
    episode_id: &EpisodeId,
    at: DateTime<Utc>,
) -> Result<()> {
    ensure(conn, episode_id).await?;
    sqlx::query("UPDATE playback_records SET is_played = 1, played_at = ? WHERE episode_id = ?")
        .bind(at.timestamp())
        .bind(episode_id.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn mark_unplayed(conn: &mut SqliteConnection, episode_id: &EpisodeId) -> Result<()> {
    ensure(conn, episode_id).await?;
    sqlx::query(
        "UPDATE playback_records SET is_played = 0, played_at = NULL WHERE episode_id = ?",
    )
    .bind(episode_id.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn increment_play_count(
    conn: &mut SqliteConnection,
    episode_id: &EpisodeId,
) -> Result<()> {
    ensure(conn, episode_id).await?;
    sqlx::query("UPDATE playback_records SET play_count = play_count + 1 WHERE episode_id = ?")
        .bind(episode_id.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn set_favorite(
    conn: &mut SqliteConnection,
    episode_id: &EpisodeId,
    favorite: bool,
    at: DateTime<Utc>,
) -> Result<()> {
    ensure(conn, episode_id).await?;
    let favorited_at = favorite.then(|| at.timestamp());
    sqlx::query(
        "UPDATE playback_records SET is_favorite = ?, favorited_at = ? WHERE episode_id = ?",
    )
    .bind(i64::from(favorite))
    .bind(favorited_at)
    .bind(episode_id.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(())
}
