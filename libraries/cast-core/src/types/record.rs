/// Durable per-episode playback facts
use super::ids::EpisodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Queue position of an episode that is not queued
pub const NOT_QUEUED: i64 = -1;

/// Persisted playback progress and flags for one episode
///
/// Exactly one record exists per episode id. Records are created lazily the
/// first time anything is written for an episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackRecord {
    /// Episode this record belongs to
    pub episode_id: EpisodeId,

    /// Last saved playback position in seconds
    pub position_seconds: f64,

    /// Dense index within the queue, or `NOT_QUEUED`
    pub queue_position: i64,

    /// Whether the episode is in the queue
    pub is_queued: bool,

    /// Whether the episode has been played to completion (or marked so)
    pub is_played: bool,

    /// Whether the user favorited the episode
    pub is_favorite: bool,

    /// Number of completed listens
    pub play_count: i64,

    /// When the episode was last marked played
    pub played_at: Option<DateTime<Utc>>,

    /// When the episode was favorited
    pub favorited_at: Option<DateTime<Utc>>,
}

impl PlaybackRecord {
    /// A freshly created record with default values
    pub fn new(episode_id: EpisodeId) -> Self {
        Self {
            episode_id,
            position_seconds: 0.0,
            queue_position: NOT_QUEUED,
            is_queued: false,
            is_played: false,
            is_favorite: false,
            play_count: 0,
            played_at: None,
            favorited_at: None,
        }
    }
}
