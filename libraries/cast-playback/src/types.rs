//! Core types for playback management

use crate::adapters::IntentFlags;
use cast_core::EpisodeId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Coarse playback status derived from a [`PlaybackState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackStatus {
    /// Nothing loaded
    Idle,

    /// Engine is preparing the current episode
    Loading,

    /// Audio is advancing
    Playing,

    /// Current episode is held at a position
    Paused,
}

/// Snapshot of what is playing
///
/// There is exactly one live snapshot. The manager replaces it wholesale on
/// every transition and never writes it to the store; after a restart it is
/// rebuilt from the episode and its playback record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    /// Episode being played, paused or loaded
    pub current_episode_id: Option<EpisodeId>,

    /// Position in seconds
    pub position: f64,

    /// Best known duration in seconds (0 = unknown)
    pub duration: f64,

    /// Audio is advancing
    pub is_playing: bool,

    /// Engine is preparing the episode
    pub is_loading: bool,
}

impl PlaybackState {
    /// The initial and terminal snapshot
    pub fn idle() -> Self {
        Self {
            current_episode_id: None,
            position: 0.0,
            duration: 0.0,
            is_playing: false,
            is_loading: false,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        match (&self.current_episode_id, self.is_loading, self.is_playing) {
            (None, _, _) => PlaybackStatus::Idle,
            (Some(_), true, _) => PlaybackStatus::Loading,
            (Some(_), false, true) => PlaybackStatus::Playing,
            (Some(_), false, false) => PlaybackStatus::Paused,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.current_episode_id.is_none()
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::idle()
    }
}

/// Tunable thresholds and delays for the playback manager
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Minimum tick movement, in seconds, before the snapshot position changes (default: 0.5)
    pub tick_threshold_secs: f64,

    /// Minimum movement, in seconds, before a position save is scheduled (default: 1.0)
    pub save_threshold_secs: f64,

    /// Debounce window for position saves while playing (default: 500 ms)
    pub save_debounce_ms: u64,

    /// How long an episode may stay loading (default: 10 s)
    pub loading_timeout_ms: u64,

    /// Distance from the end, in seconds, that counts as finished (default: 1.0)
    pub near_end_epsilon_secs: f64,

    /// Delay before the single retry of a failed item (default: 1 s)
    pub recovery_delay_ms: u64,

    /// How long a stall near the end must last to count as completion (default: 3 s)
    pub stall_confirmation_ms: u64,

    /// A stall within this many seconds of the end may be a completion (default: 10)
    pub stall_end_window_secs: f64,

    /// Start the queue head after a completion (default: true)
    pub autoplay: bool,

    /// Delay between a completion and autoplay (default: 500 ms)
    pub autoplay_delay_ms: u64,

    /// Playback rate used for new episodes (default: 1.0)
    pub default_rate: f32,

    /// Skip-forward interval in seconds (default: 30)
    pub skip_forward_secs: f64,

    /// Skip-backward interval in seconds (default: 15)
    pub skip_backward_secs: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_threshold_secs: 0.5,
            save_threshold_secs: 1.0,
            save_debounce_ms: 500,
            loading_timeout_ms: 10_000,
            near_end_epsilon_secs: 1.0,
            recovery_delay_ms: 1_000,
            stall_confirmation_ms: 3_000,
            stall_end_window_secs: 10.0,
            autoplay: true,
            autoplay_delay_ms: 500,
            default_rate: 1.0,
            skip_forward_secs: 30.0,
            skip_backward_secs: 15.0,
        }
    }
}

impl PlaybackConfig {
    /// Lowest accepted playback rate
    pub const MIN_RATE: f32 = 0.5;

    /// Highest accepted playback rate
    pub const MAX_RATE: f32 = 3.0;

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    pub fn loading_timeout(&self) -> Duration {
        Duration::from_millis(self.loading_timeout_ms)
    }

    pub fn recovery_delay(&self) -> Duration {
        Duration::from_millis(self.recovery_delay_ms)
    }

    pub fn stall_confirmation(&self) -> Duration {
        Duration::from_millis(self.stall_confirmation_ms)
    }

    pub fn autoplay_delay(&self) -> Duration {
        Duration::from_millis(self.autoplay_delay_ms)
    }

    /// Clamp a requested rate into the accepted range
    pub fn clamp_rate(rate: f32) -> f32 {
        if rate.is_finite() {
            rate.clamp(Self::MIN_RATE, Self::MAX_RATE)
        } else {
            1.0
        }
    }

    /// Where playback of an episode should start given its saved position
    ///
    /// A position within the near-end epsilon starts over from 0.
    pub fn resume_position(&self, saved: f64, duration: f64) -> f64 {
        let saved = saved.max(0.0);
        if duration > 0.0 && saved >= duration - self.near_end_epsilon_secs {
            0.0
        } else {
            saved
        }
    }
}

/// Read-only view of the manager's internal bookkeeping
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub status: PlaybackStatus,
    pub intent: IntentFlags,
    /// Episode whose completion already fired, if any
    pub completion_guard: Option<EpisodeId>,
    /// A manual seek is waiting for its completion signal
    pub seeking: bool,
    pub engine_attached: bool,
    pub recovery_attempted: bool,
    pub rate: f32,
    /// A debounced position save is scheduled
    pub pending_save: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_snapshot() {
        let mut state = PlaybackState::idle();
        assert_eq!(state.status(), PlaybackStatus::Idle);

        state.current_episode_id = Some(EpisodeId::new("ep"));
        state.is_loading = true;
        assert_eq!(state.status(), PlaybackStatus::Loading);

        state.is_loading = false;
        state.is_playing = true;
        assert_eq!(state.status(), PlaybackStatus::Playing);

        state.is_playing = false;
        assert_eq!(state.status(), PlaybackStatus::Paused);
    }

    #[test]
    fn test_resume_position_restarts_near_end() {
        let config = PlaybackConfig::default();
        assert_eq!(config.resume_position(120.0, 1800.0), 120.0);
        assert_eq!(config.resume_position(1799.5, 1800.0), 0.0);
        assert_eq!(config.resume_position(50.0, 0.0), 50.0);
        assert_eq!(config.resume_position(-3.0, 1800.0), 0.0);
    }

    #[test]
    fn test_rate_clamped() {
        assert_eq!(PlaybackConfig::clamp_rate(0.1), 0.5);
        assert_eq!(PlaybackConfig::clamp_rate(5.0), 3.0);
        assert_eq!(PlaybackConfig::clamp_rate(1.5), 1.5);
        assert_eq!(PlaybackConfig::clamp_rate(f32::NAN), 1.0);
    }

    #[test]
    fn test_config_partial_deserialize_uses_defaults() {
        let config: PlaybackConfig =
            serde_json::from_str(r#"{"autoplay": false, "skip_forward_secs": 45.0}"#).unwrap();
        assert!(!config.autoplay);
        assert_eq!(config.skip_forward_secs, 45.0);
        assert_eq!(config.loading_timeout_ms, 10_000);
    }
}
