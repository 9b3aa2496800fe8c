//! Property-based tests for the queue
//!
//! Random sequences of queue mutations must always leave a dense,
//! duplicate-free ordering in the store.

use cast_core::{Episode, EpisodeId, PlaybackStore, Podcast, PodcastId, WriteBatch};
use cast_playback::{PlaybackConfig, QueueManager};
use cast_storage::MemoryStore;
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;

const POOL: usize = 8;

#[derive(Debug, Clone)]
enum Op {
    Enqueue(usize),
    MoveToFront(usize),
    Reorder(Vec<usize>),
    Remove(Vec<usize>),
    MarkPlayed(usize),
    InsertLatestUnplayed,
    Clear,
}

fn arbitrary_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..POOL).prop_map(Op::Enqueue),
        3 => (0..POOL).prop_map(Op::MoveToFront),
        2 => prop::collection::vec(0..POOL, 0..POOL).prop_map(Op::Reorder),
        2 => prop::collection::vec(0..POOL, 1..3).prop_map(Op::Remove),
        1 => (0..POOL).prop_map(Op::MarkPlayed),
        1 => Just(Op::InsertLatestUnplayed),
        1 => Just(Op::Clear),
    ]
}

fn episode_id(index: usize) -> EpisodeId {
    EpisodeId::new(format!("ep-{index}"))
}

fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.insert_podcast(Podcast::new("pod", "Show")).unwrap();
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    for index in 0..POOL {
        let id = episode_id(index);
        store
            .insert_episode(
                Episode::new(id.clone(), "pod", format!("Episode {index}"), format!("https://cdn.example.com/{id}.mp3"))
                    .with_published_at(base + Duration::days(index as i64)),
            )
            .unwrap();
    }
    store
}

/// Apply ops and return (final stored order, model order)
fn run_ops(ops: &[Op]) -> (Vec<(EpisodeId, i64)>, Vec<EpisodeId>) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let store = seeded_store();
        let queue = QueueManager::new(store.clone(), broadcast::channel(16).0);
        let mut model: Vec<EpisodeId> = Vec::new();
        let mut played: HashSet<EpisodeId> = HashSet::new();

        for op in ops {
            match op {
                Op::Enqueue(i) => {
                    let id = episode_id(*i);
                    queue.enqueue(&id).await.unwrap();
                    if !model.contains(&id) {
                        model.push(id);
                    }
                }
                Op::MoveToFront(i) => {
                    let id = episode_id(*i);
                    queue.move_to_front(&id).await.unwrap();
                    model.retain(|m| m != &id);
                    model.insert(0, id);
                }
                Op::Reorder(indices) => {
                    let requested: Vec<EpisodeId> = indices.iter().map(|i| episode_id(*i)).collect();
                    queue.reorder(&requested).await.unwrap();
                    let mut next = Vec::new();
                    for id in requested {
                        if model.contains(&id) && !next.contains(&id) {
                            next.push(id);
                        }
                    }
                    for id in &model {
                        if !next.contains(id) {
                            next.push(id.clone());
                        }
                    }
                    model = next;
                }
                Op::Remove(indices) => {
                    let ids: Vec<EpisodeId> = indices.iter().map(|i| episode_id(*i)).collect();
                    queue.remove(&ids).await.unwrap();
                    model.retain(|m| !ids.contains(m));
                }
                Op::MarkPlayed(i) => {
                    let id = episode_id(*i);
                    let mut batch = WriteBatch::new();
                    batch.mark_played(&id, Utc::now());
                    store.save(batch).await.unwrap();
                    played.insert(id);
                }
                Op::InsertLatestUnplayed => {
                    let inserted = queue
                        .insert_latest_unplayed(&PodcastId::new("pod"))
                        .await
                        .unwrap();
                    let expected = (0..POOL)
                        .rev()
                        .map(episode_id)
                        .find(|id| !played.contains(id));
                    assert_eq!(inserted, expected);
                    if let Some(id) = inserted {
                        if !model.contains(&id) {
                            model.push(id);
                        }
                    }
                }
                Op::Clear => {
                    queue.clear().await.unwrap();
                    model.clear();
                }
            }
        }

        let stored = store
            .get_queued_records()
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.episode_id, r.queue_position))
            .collect();
        (stored, model)
    })
}

// ===== Property Tests =====

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: positions are always exactly 0..n with no duplicates
    #[test]
    fn queue_positions_stay_dense(ops in prop::collection::vec(arbitrary_op(), 1..40)) {
        let (stored, _) = run_ops(&ops);

        let positions: Vec<i64> = stored.iter().map(|(_, p)| *p).collect();
        let expected: Vec<i64> = (0..stored.len() as i64).collect();
        prop_assert_eq!(positions, expected);

        let unique: HashSet<&EpisodeId> = stored.iter().map(|(id, _)| id).collect();
        prop_assert_eq!(unique.len(), stored.len());
    }

    /// Property: the stored order matches a plain list model
    #[test]
    fn queue_order_matches_model(ops in prop::collection::vec(arbitrary_op(), 1..40)) {
        let (stored, model) = run_ops(&ops);
        let order: Vec<EpisodeId> = stored.into_iter().map(|(id, _)| id).collect();
        prop_assert_eq!(order, model);
    }

    /// Property: clamped rates are always inside the supported range
    #[test]
    fn clamped_rate_in_range(rate in proptest::num::f32::ANY) {
        let clamped = PlaybackConfig::clamp_rate(rate);
        prop_assert!(clamped.is_finite());
        prop_assert!((PlaybackConfig::MIN_RATE..=PlaybackConfig::MAX_RATE).contains(&clamped));
    }

    /// Property: a resume position never lands past the end or below zero
    #[test]
    fn resume_position_in_bounds(saved in -100.0f64..5000.0, duration in 0.0f64..4000.0) {
        let position = PlaybackConfig::default().resume_position(saved, duration);
        prop_assert!(position >= 0.0);
        if duration > 0.0 {
            prop_assert!(position <= duration);
        }
    }
}
