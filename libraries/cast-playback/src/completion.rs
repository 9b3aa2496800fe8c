//! Single-fire completion bookkeeping

use cast_core::{Episode, EpisodeId, WriteBatch};
use chrono::{DateTime, Utc};

/// Tagged record of which episode's completion already fired
///
/// Did-reach-end, a tick at the end and a confirmed stall can all report the
/// same completion. The first one arms the guard; the rest see it armed and
/// do nothing. Only starting a new episode clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CompletionGuard {
    #[default]
    Clear,
    Fired(EpisodeId),
}

impl CompletionGuard {
    /// Arm the guard for `episode_id`; false if it already fired for it
    pub fn begin(&mut self, episode_id: &EpisodeId) -> bool {
        match self {
            Self::Fired(id) if id == episode_id => false,
            _ => {
                *self = Self::Fired(episode_id.clone());
                true
            }
        }
    }

    pub fn clear(&mut self) {
        *self = Self::Clear;
    }

    pub fn current(&self) -> Option<&EpisodeId> {
        match self {
            Self::Clear => None,
            Self::Fired(id) => Some(id),
        }
    }
}

/// Record-side writes for a finished listen
///
/// Position back to 0, played flag and timestamp, one more listen on the
/// record, one play and the episode's known duration on the podcast
/// aggregate, and the "now playing" marker cleared.
pub fn completion_batch(episode: &Episode, now: DateTime<Utc>) -> WriteBatch {
    let mut batch = WriteBatch::new();
    batch.set_position(&episode.id, 0.0);
    batch.mark_played(&episode.id, now);
    batch.increment_play_count(&episode.id);
    batch.record_podcast_play(&episode.podcast_id, episode.known_duration());
    batch.set_now_playing(None);
    batch
}

/// Writes for an explicit "mark as played"
///
/// The podcast aggregate only counts the episode if it was not played yet.
pub fn mark_played_batch(
    episode: &Episode,
    already_played: bool,
    clear_now_playing: bool,
    now: DateTime<Utc>,
) -> WriteBatch {
    let mut batch = WriteBatch::new();
    batch.set_position(&episode.id, 0.0);
    batch.mark_played(&episode.id, now);
    if !already_played {
        batch.record_podcast_play(&episode.podcast_id, episode.known_duration());
    }
    if clear_now_playing {
        batch.set_now_playing(None);
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use cast_core::WriteOp;

    #[test]
    fn test_guard_fires_once_per_episode() {
        let a = EpisodeId::new("a");
        let b = EpisodeId::new("b");
        let mut guard = CompletionGuard::default();

        assert!(guard.begin(&a));
        assert!(!guard.begin(&a));
        assert_eq!(guard.current(), Some(&a));

        assert!(guard.begin(&b));
        guard.clear();
        assert!(guard.current().is_none());
        assert!(guard.begin(&b));
    }

    #[test]
    fn test_completion_batch_uses_measured_duration() {
        let mut episode = Episode::new("ep", "pod", "Title", "https://example.com/ep.mp3")
            .with_feed_duration(1700.0);
        episode.actual_duration = Some(1800.0);

        let ops: Vec<_> = completion_batch(&episode, Utc::now()).into_iter().collect();
        assert!(ops.contains(&WriteOp::RecordPodcastPlay {
            podcast_id: "pod".into(),
            seconds: 1800.0
        }));
        assert!(ops.contains(&WriteOp::SetPosition {
            episode_id: "ep".into(),
            position: 0.0
        }));
        assert_eq!(ops.last(), Some(&WriteOp::SetNowPlaying { episode_id: None }));
    }

    #[test]
    fn test_mark_played_skips_aggregate_when_already_played() {
        let episode = Episode::new("ep", "pod", "Title", "https://example.com/ep.mp3");
        let batch = mark_played_batch(&episode, true, false, Utc::now());
        assert!(!batch
            .iter()
            .any(|op| matches!(op, WriteOp::RecordPodcastPlay { .. })));
        assert!(!batch
            .iter()
            .any(|op| matches!(op, WriteOp::IncrementPlayCount { .. })));
    }
}
