/// Write batches: the unit of transactional persistence
use super::ids::{EpisodeId, PodcastId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single field-level mutation, addressed by stable id
///
/// Ops never carry whole records, so a write resolves its target inside the
/// store's own transaction and cannot clobber fields changed elsewhere.
/// Record ops create the record if it does not exist yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WriteOp {
    /// Save the playback position
    SetPosition { episode_id: EpisodeId, position: f64 },

    /// Put the episode in the queue at the given index
    Enqueue {
        episode_id: EpisodeId,
        queue_position: i64,
    },

    /// Take the episode out of the queue
    Dequeue { episode_id: EpisodeId },

    /// Flag the episode as played
    MarkPlayed {
        episode_id: EpisodeId,
        at: DateTime<Utc>,
    },

    /// Clear the played flag
    MarkUnplayed { episode_id: EpisodeId },

    /// Count one completed listen on the record
    IncrementPlayCount { episode_id: EpisodeId },

    /// Set or clear the favorite flag
    SetFavorite {
        episode_id: EpisodeId,
        favorite: bool,
        at: DateTime<Utc>,
    },

    /// Add one play and its seconds to the podcast aggregate
    ///
    /// Fails the batch if the podcast does not exist.
    RecordPodcastPlay { podcast_id: PodcastId, seconds: f64 },

    /// Store the engine-measured duration on the episode
    ///
    /// Fails the batch if the episode does not exist.
    SetActualDuration { episode_id: EpisodeId, seconds: f64 },

    /// Move the "currently playing" marker (`None` clears it)
    SetNowPlaying { episode_id: Option<EpisodeId> },
}

impl WriteOp {
    /// The episode this op targets, if any
    pub fn episode_id(&self) -> Option<&EpisodeId> {
        match self {
            Self::SetPosition { episode_id, .. }
            | Self::Enqueue { episode_id, .. }
            | Self::Dequeue { episode_id }
            | Self::MarkPlayed { episode_id, .. }
            | Self::MarkUnplayed { episode_id }
            | Self::IncrementPlayCount { episode_id }
            | Self::SetFavorite { episode_id, .. }
            | Self::SetActualDuration { episode_id, .. } => Some(episode_id),
            Self::SetNowPlaying { episode_id } => episode_id.as_ref(),
            Self::RecordPodcastPlay { .. } => None,
        }
    }
}

/// Ordered list of ops committed all-or-nothing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an op
    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    /// Append all ops of another batch
    pub fn append(&mut self, other: WriteBatch) {
        self.ops.extend(other.ops);
    }

    /// Number of ops
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch has no ops
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Iterate over the ops in commit order
    pub fn iter(&self) -> std::slice::Iter<'_, WriteOp> {
        self.ops.iter()
    }

    pub fn set_position(&mut self, episode_id: &EpisodeId, position: f64) {
        self.push(WriteOp::SetPosition {
            episode_id: episode_id.clone(),
            position,
        });
    }

    pub fn enqueue(&mut self, episode_id: &EpisodeId, queue_position: i64) {
        self.push(WriteOp::Enqueue {
            episode_id: episode_id.clone(),
            queue_position,
        });
    }

    pub fn dequeue(&mut self, episode_id: &EpisodeId) {
        self.push(WriteOp::Dequeue {
            episode_id: episode_id.clone(),
        });
    }

    pub fn mark_played(&mut self, episode_id: &EpisodeId, at: DateTime<Utc>) {
        self.push(WriteOp::MarkPlayed {
            episode_id: episode_id.clone(),
            at,
        });
    }

    pub fn mark_unplayed(&mut self, episode_id: &EpisodeId) {
        self.push(WriteOp::MarkUnplayed {
            episode_id: episode_id.clone(),
        });
    }

    pub fn increment_play_count(&mut self, episode_id: &EpisodeId) {
        self.push(WriteOp::IncrementPlayCount {
            episode_id: episode_id.clone(),
        });
    }

    pub fn set_favorite(&mut self, episode_id: &EpisodeId, favorite: bool, at: DateTime<Utc>) {
        self.push(WriteOp::SetFavorite {
            episode_id: episode_id.clone(),
            favorite,
            at,
        });
    }

    pub fn record_podcast_play(&mut self, podcast_id: &PodcastId, seconds: f64) {
        self.push(WriteOp::RecordPodcastPlay {
            podcast_id: podcast_id.clone(),
            seconds,
        });
    }

    pub fn set_actual_duration(&mut self, episode_id: &EpisodeId, seconds: f64) {
        self.push(WriteOp::SetActualDuration {
            episode_id: episode_id.clone(),
            seconds,
        });
    }

    pub fn set_now_playing(&mut self, episode_id: Option<&EpisodeId>) {
        self.push(WriteOp::SetNowPlaying {
            episode_id: episode_id.cloned(),
        });
    }
}

impl From<WriteOp> for WriteBatch {
    fn from(op: WriteOp) -> Self {
        Self { ops: vec![op] }
    }
}

impl IntoIterator for WriteBatch {
    type Item = WriteOp;
    type IntoIter = std::vec::IntoIter<WriteOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

impl<'a> IntoIterator for &'a WriteBatch {
    type Item = &'a WriteOp;
    type IntoIter = std::slice::Iter<'a, WriteOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}
