//! Error types for playback management

use cast_core::{CastError, EpisodeId};
use thiserror::Error;

/// Playback errors
///
/// Only intent-boundary rejections and explicit bookkeeping writes surface to
/// callers. Engine and position-save failures are handled inside the manager.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Episode id is blank, unknown, or has no playable URL
    #[error("Invalid episode: {0}")]
    InvalidEpisode(String),

    /// The engine could not load or play the episode
    #[error("Engine failure for {episode_id}: {message}")]
    EngineFailure {
        episode_id: EpisodeId,
        message: String,
    },

    /// A store write or read failed
    #[error("Persistence failure: {0}")]
    Persistence(#[from] CastError),

    /// The playback manager task has stopped
    #[error("Playback manager is not running")]
    ManagerClosed,
}

impl PlaybackError {
    pub fn invalid_episode(msg: impl Into<String>) -> Self {
        Self::InvalidEpisode(msg.into())
    }

    pub fn engine(episode_id: &EpisodeId, message: impl Into<String>) -> Self {
        Self::EngineFailure {
            episode_id: episode_id.clone(),
            message: message.into(),
        }
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
