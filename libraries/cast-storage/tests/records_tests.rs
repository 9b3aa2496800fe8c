//! Integration tests for the playback records slice
//!
//! Covers lazy record creation, queue ordering and field-level updates.


use cast_core::types::{EpisodeId, WriteBatch, NOT_QUEUED};
use cast_core::PlaybackStore;
use chrono::Utc;
use test_helpers::*;

#[tokio::test]
async fn test_get_record_absent_until_written() {
    let db = TestDb::new().await;
    let ep = EpisodeId::new("ep-1");

    assert!(db.store.get_record(&ep).await.unwrap().is_none());

    let mut batch = WriteBatch::new();
    batch.set_position(&ep, 120.5);
    db.store.save(batch).await.unwrap();

    let record = db.store.get_record(&ep).await.unwrap().expect("record exists");
    assert_eq!(record.position_seconds, 120.5);
    assert!(!record.is_queued);
    assert_eq!(record.queue_position, NOT_QUEUED);
}

#[tokio::test]
async fn test_create_or_get_is_idempotent() {
    let db = TestDb::new().await;
    let ep = EpisodeId::new("ep-1");

    let first = db.store.create_or_get_record(&ep).await.unwrap();
    let mut batch = WriteBatch::new();
    batch.set_position(&ep, 42.0);
    db.store.save(batch).await.unwrap();
    let second = db.store.create_or_get_record(&ep).await.unwrap();

    assert_eq!(first.position_seconds, 0.0);
    assert_eq!(second.position_seconds, 42.0);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM playback_records")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_concurrent_create_or_get_yields_one_record() {
    let db = TestDb::new().await;
    let ep = EpisodeId::new("ep-1");

    let (a, b) = tokio::join!(
        db.store.create_or_get_record(&ep),
        db.store.create_or_get_record(&ep)
    );
    assert_eq!(a.unwrap().episode_id, b.unwrap().episode_id);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM playback_records")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_queued_records_ordered_by_position() {
    let db = TestDb::new().await;
    let (a, b, c) = (EpisodeId::new("a"), EpisodeId::new("b"), EpisodeId::new("c"));

    let mut batch = WriteBatch::new();
    batch.enqueue(&c, 0);
    batch.enqueue(&a, 1);
    batch.enqueue(&b, 2);
    db.store.save(batch).await.unwrap();

    let queued: Vec<String> = db
        .store
        .get_queued_records()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.episode_id.to_string())
        .collect();
    assert_eq!(queued, vec!["c", "a", "b"]);

    let mut batch = WriteBatch::new();
    batch.dequeue(&a);
    db.store.save(batch).await.unwrap();

    let record = db.store.get_record(&a).await.unwrap().unwrap();
    assert!(!record.is_queued);
    assert_eq!(record.queue_position, NOT_QUEUED);
    assert_eq!(db.store.get_queued_records().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_played_and_favorite_flags() {
    let db = TestDb::new().await;
    let ep = EpisodeId::new("ep-1");
    let now = Utc::now();

    let mut batch = WriteBatch::new();
    batch.mark_played(&ep, now);
    batch.increment_play_count(&ep);
    batch.set_favorite(&ep, true, now);
    db.store.save(batch).await.unwrap();

    let record = db.store.get_record(&ep).await.unwrap().unwrap();
    assert!(record.is_played);
    assert_eq!(record.play_count, 1);
    assert!(record.is_favorite);
    assert_eq!(record.played_at.map(|t| t.timestamp()), Some(now.timestamp()));
    assert!(record.favorited_at.is_some());

    let mut batch = WriteBatch::new();
    batch.mark_unplayed(&ep);
    batch.set_favorite(&ep, false, now);
    db.store.save(batch).await.unwrap();

    let record = db.store.get_record(&ep).await.unwrap().unwrap();
    assert!(!record.is_played);
    assert!(record.played_at.is_none());
    assert!(!record.is_favorite);
    assert!(record.favorited_at.is_none());
    assert_eq!(record.play_count, 1, "play count survives unmarking");
}
