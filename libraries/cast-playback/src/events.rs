//! Playback Events
//!
//! Notifications broadcast after each committed mutation:
//! - Snapshot changes (load/play/pause/idle, position, duration)
//! - Queue membership or order changes
//! - Completions, explicit "mark as played", and fatal engine failures

use crate::types::PlaybackState;
use cast_core::EpisodeId;
use serde::{Deserialize, Serialize};

/// Events emitted by the playback system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// The snapshot was replaced
    StateChanged {
        /// The new snapshot
        state: PlaybackState,
    },

    /// The queue changed; carries the new order
    QueueChanged {
        /// Queued episode ids, head first
        queue: Vec<EpisodeId>,
    },

    /// An episode played to its end and the completion was committed
    EpisodeCompleted { episode_id: EpisodeId },

    /// An episode was marked as played without finishing it
    EpisodeMarkedPlayed { episode_id: EpisodeId },

    /// The engine gave up on an episode after its retry
    PlaybackFailed {
        episode_id: EpisodeId,
        /// Engine-provided reason
        message: String,
    },
}

impl PlaybackEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::QueueChanged { .. } => "queue_changed",
            Self::EpisodeCompleted { .. } => "episode_completed",
            Self::EpisodeMarkedPlayed { .. } => "episode_marked_played",
            Self::PlaybackFailed { .. } => "playback_failed",
        }
    }
}
