//! Podcast rows and their listening aggregate

use crate::error::{Result, StorageError};
use cast_core::types::{Podcast, PodcastId};
use sqlx::{Row, SqliteConnection, SqlitePool};

/// Insert or rename a podcast, leaving its aggregate untouched
pub async fn upsert(pool: &SqlitePool, podcast: &Podcast) -> Result<()> {
    sqlx::query(
        "INSERT INTO podcasts (id, title, play_count, played_seconds)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET title = excluded.title",
    )
    .bind(podcast.id.as_str())
    .bind(&podcast.title)
    .bind(podcast.play_count)
    .bind(podcast.played_seconds)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a podcast by id
pub async fn get(pool: &SqlitePool, id: &PodcastId) -> Result<Option<Podcast>> {
    let row = sqlx::query("SELECT id, title, play_count, played_seconds FROM podcasts WHERE id = ?")
        .bind(id.as_str())
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| Podcast {
        id: PodcastId::new(r.get::<String, _>("id")),
        title: r.get("title"),
        play_count: r.get("play_count"),
        played_seconds: r.get("played_seconds"),
    }))
}

/// Count one finished listen of `seconds` on the aggregate
pub async fn record_play(conn: &mut SqliteConnection, id: &PodcastId, seconds: f64) -> Result<()> {
    let result = sqlx::query(
        "UPDATE podcasts SET play_count = play_count + 1, played_seconds = played_seconds + ?
         WHERE id = ?",
    )
    .bind(seconds.max(0.0))
    .bind(id.as_str())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("Podcast", id.as_str()));
    }

    Ok(())
}
