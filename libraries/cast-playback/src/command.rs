//! Messages accepted by the playback manager's inbox

use crate::engine::EngineSignal;
use crate::error::Result;
use crate::types::Diagnostics;
use cast_core::EpisodeId;
use tokio::sync::oneshot;

/// Why playback was taken away from us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InterruptCause {
    /// Audio session interruption (call, alarm, another app)
    Session,
    /// The output device went away
    RouteLost,
}

/// Why the position must be saved now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlushReason {
    Background,
    Terminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SkipDirection {
    Forward,
    Backward,
}

/// Deferred work that re-enters the manager when its delay expires
///
/// Each carries the generation it was scheduled under and is dropped at fire
/// time if the manager has moved on.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TimerEvent {
    LoadingTimeout {
        episode_id: EpisodeId,
        generation: u64,
    },
    RetryLoad {
        episode_id: EpisodeId,
        generation: u64,
    },
    StallCheck {
        episode_id: EpisodeId,
        generation: u64,
        position: f64,
    },
    Autoplay {
        generation: u64,
        after: EpisodeId,
    },
}

#[derive(Debug)]
pub(crate) enum Command {
    // User intents
    Toggle(EpisodeId),
    Play(EpisodeId),
    Resume,
    Pause,
    TogglePlayPause,
    Stop,
    Seek(f64),
    Skip(SkipDirection),
    SetRate(f32),
    MarkPlayed {
        episode_id: EpisodeId,
        manually: bool,
    },
    MarkUnplayed(EpisodeId),
    Restore,

    // OS events
    Interrupt(InterruptCause),
    InterruptionEnded { should_resume: bool },
    Flush(FlushReason),
    Note(&'static str),

    // Internal
    Engine(EngineSignal),
    Timer(TimerEvent),
    Inspect(oneshot::Sender<Diagnostics>),
    Shutdown,
}

/// A command plus the optional channel its outcome is reported on
#[derive(Debug)]
pub(crate) struct Envelope {
    pub command: Command,
    pub reply: Option<oneshot::Sender<Result<()>>>,
}

impl Envelope {
    /// Fire-and-forget message
    pub fn new(command: Command) -> Self {
        Self {
            command,
            reply: None,
        }
    }

    pub fn with_reply(command: Command) -> (Self, oneshot::Receiver<Result<()>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                command,
                reply: Some(tx),
            },
            rx,
        )
    }
}
