//! Native audio boundary
//!
//! The engine wraps a single decoder/session. Commands go in through
//! [`PlaybackEngine`]; everything the engine observes comes back as an
//! [`EngineSignal`] posted to the manager's inbox, tagged with the episode
//! the engine had loaded when it fired.

use crate::command::{Command, Envelope};
use crate::error::Result;
use cast_core::EpisodeId;
use tokio::sync::mpsc::WeakUnboundedSender;

/// Readiness of the loaded item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemStatus {
    /// Item can play; carries the measured duration when the engine knows it
    Ready { duration: Option<f64> },

    /// Item cannot play
    Failed { message: String },
}

/// Observations from the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineSignal {
    RateChanged { episode_id: EpisodeId, rate: f32 },
    StatusChanged { episode_id: EpisodeId, status: ItemStatus },
    /// Playback stopped advancing for lack of data
    Stalled { episode_id: EpisodeId },
    DidReachEnd { episode_id: EpisodeId },
    /// Periodic position report
    TimeTick { episode_id: EpisodeId, position: f64 },
    SeekCompleted { episode_id: EpisodeId, position: f64 },
}

impl EngineSignal {
    /// Episode the engine had loaded when the signal fired
    pub fn episode_id(&self) -> &EpisodeId {
        match self {
            Self::RateChanged { episode_id, .. }
            | Self::StatusChanged { episode_id, .. }
            | Self::Stalled { episode_id }
            | Self::DidReachEnd { episode_id }
            | Self::TimeTick { episode_id, .. }
            | Self::SeekCompleted { episode_id, .. } => episode_id,
        }
    }
}

/// Commands understood by a native player
///
/// Calls must return promptly: loading and readiness are reported later
/// through [`EngineSignal::StatusChanged`], seeks through
/// [`EngineSignal::SeekCompleted`].
pub trait PlaybackEngine: Send + 'static {
    /// Replace the current item and prepare it at `start_at` seconds
    fn load(&mut self, episode_id: &EpisodeId, url: &str, start_at: f64) -> Result<()>;

    /// Start or continue at the given rate
    fn play(&mut self, rate: f32);

    fn pause(&mut self);

    fn seek(&mut self, to: f64);

    /// Current rate (0 when not advancing)
    fn rate(&self) -> f32;

    /// Drop the item and detach every observer
    fn teardown(&mut self);
}

/// Sender half for engine observations
///
/// Holds only a weak reference to the inbox, so a running engine never keeps
/// the manager alive after the last handle is dropped.
#[derive(Clone)]
pub struct EngineSignals {
    inbox: WeakUnboundedSender<Envelope>,
}

impl EngineSignals {
    pub(crate) fn new(inbox: WeakUnboundedSender<Envelope>) -> Self {
        Self { inbox }
    }

    /// Post a signal; returns false once the manager has stopped
    pub fn send(&self, signal: EngineSignal) -> bool {
        match self.inbox.upgrade() {
            Some(tx) => tx.send(Envelope::new(Command::Engine(signal))).is_ok(),
            None => false,
        }
    }
}

impl std::fmt::Debug for EngineSignals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSignals").finish_non_exhaustive()
    }
}
