//! Integration tests for the SQLite store: episodes, podcasts and
//! transactional batches


use cast_core::types::{EpisodeId, PodcastId, WriteBatch};
use cast_core::{CastError, PlaybackStore};
use chrono::Utc;
use test_helpers::*;

#[tokio::test]
async fn test_episode_roundtrip_and_actual_duration() {
    let db = TestDb::new().await;
    create_test_podcast(&db, "pod-1").await;
    let episode = create_test_episode(&db, "ep-1", "pod-1", 3).await;

    let loaded = db.store.get_episode(&episode.id).await.unwrap().unwrap();
    assert_eq!(loaded, episode);
    assert!(loaded.actual_duration.is_none());

    let mut batch = WriteBatch::new();
    batch.set_actual_duration(&episode.id, 1795.0);
    db.store.save(batch).await.unwrap();

    // A feed refresh without a measured duration keeps the measured one
    db.store.upsert_episode(&episode).await.unwrap();
    let loaded = db.store.get_episode(&episode.id).await.unwrap().unwrap();
    assert_eq!(loaded.actual_duration, Some(1795.0));
    assert_eq!(loaded.known_duration(), 1795.0);
}

#[tokio::test]
async fn test_latest_unplayed_skips_played_episodes() {
    let db = TestDb::new().await;
    create_test_podcast(&db, "pod-1").await;
    create_test_episode(&db, "old", "pod-1", 1).await;
    create_test_episode(&db, "mid", "pod-1", 2).await;
    create_test_episode(&db, "new", "pod-1", 3).await;
    let pod = PodcastId::new("pod-1");

    let latest = db.store.get_latest_unplayed_episode(&pod).await.unwrap();
    assert_eq!(latest.map(|e| e.id), Some(EpisodeId::new("new")));

    let mut batch = WriteBatch::new();
    batch.mark_played(&EpisodeId::new("new"), Utc::now());
    db.store.save(batch).await.unwrap();

    let latest = db.store.get_latest_unplayed_episode(&pod).await.unwrap();
    assert_eq!(latest.map(|e| e.id), Some(EpisodeId::new("mid")));

    let other = db
        .store
        .get_latest_unplayed_episode(&PodcastId::new("pod-2"))
        .await
        .unwrap();
    assert!(other.is_none());
}

#[tokio::test]
async fn test_podcast_aggregate_accumulates() {
    let db = TestDb::new().await;
    let podcast = create_test_podcast(&db, "pod-1").await;

    let mut batch = WriteBatch::new();
    batch.record_podcast_play(&podcast.id, 1800.0);
    batch.record_podcast_play(&podcast.id, 600.0);
    db.store.save(batch).await.unwrap();

    let loaded = db.store.get_podcast(&podcast.id).await.unwrap().unwrap();
    assert_eq!(loaded.play_count, 2);
    assert_eq!(loaded.played_seconds, 2400.0);

    // Re-ingesting the podcast does not reset its aggregate
    db.store.upsert_podcast(&podcast).await.unwrap();
    let loaded = db.store.get_podcast(&podcast.id).await.unwrap().unwrap();
    assert_eq!(loaded.play_count, 2);
}

#[tokio::test]
async fn test_now_playing_marker_moves() {
    let db = TestDb::new().await;
    create_test_podcast(&db, "pod-1").await;
    let a = create_test_episode(&db, "a", "pod-1", 1).await;
    let b = create_test_episode(&db, "b", "pod-1", 2).await;

    let mut batch = WriteBatch::new();
    batch.set_now_playing(Some(&a.id));
    db.store.save(batch).await.unwrap();
    assert_eq!(db.store.get_now_playing().await.unwrap(), Some(a.id.clone()));

    let mut batch = WriteBatch::new();
    batch.set_now_playing(Some(&b.id));
    db.store.save(batch).await.unwrap();
    assert_eq!(db.store.get_now_playing().await.unwrap(), Some(b.id.clone()));

    let mut batch = WriteBatch::new();
    batch.set_now_playing(None);
    db.store.save(batch).await.unwrap();
    assert!(db.store.get_now_playing().await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_batch_rolls_back_every_op() {
    let db = TestDb::new().await;
    let ep = EpisodeId::new("ep-1");

    let mut batch = WriteBatch::new();
    batch.set_position(&ep, 0.0);
    batch.mark_played(&ep, Utc::now());
    batch.enqueue(&ep, 0);
    batch.record_podcast_play(&PodcastId::new("missing"), 1800.0);

    let err = db.store.save(batch).await.unwrap_err();
    assert!(matches!(err, CastError::NotFound { .. }), "got {err:?}");

    assert!(db.store.get_record(&ep).await.unwrap().is_none());
    assert!(db.store.get_queued_records().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_batch_is_noop() {
    let db = TestDb::new().await;
    db.store.save(WriteBatch::new()).await.unwrap();
    assert!(db.store.get_queued_records().await.unwrap().is_empty());
}
