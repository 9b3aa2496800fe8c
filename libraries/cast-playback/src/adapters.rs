//! Translation of OS notifications and remote commands into manager input
//!
//! Platform glue turns audio-session, route, lifecycle and hardware remote
//! callbacks into these enums and hands them to
//! [`PlayerHandle`](crate::PlayerHandle). Every variant maps onto exactly one
//! inbox message.

use crate::command::{Command, FlushReason, InterruptCause, SkipDirection};
use serde::{Deserialize, Serialize};

/// Output route change reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteChange {
    /// The active output disappeared (headphones unplugged, Bluetooth lost)
    DeviceUnavailable,
    NewDeviceAvailable,
    Other,
}

/// Audio session and application lifecycle notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemEvent {
    InterruptionBegan,
    InterruptionEnded { should_resume: bool },
    RouteChanged(RouteChange),
    EnteredBackground,
    EnteredForeground,
    WillTerminate,
}

/// Lock screen, headset and car remote commands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RemoteCommand {
    Play,
    Pause,
    TogglePlayPause,
    SkipForward,
    SkipBackward,
    /// Scrub to an absolute position in seconds
    ChangePlaybackPosition(f64),
    ChangePlaybackRate(f32),
}

/// Why playback last stopped, as far as resuming is concerned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentFlags {
    /// The user paused explicitly
    pub user_initiated_pause: bool,

    /// Playback stopped because the output device went away
    pub interrupted_by_route_change: bool,
}

impl IntentFlags {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Whether an ended interruption should restart playback
    ///
    /// Policy hook: never auto-resume, whatever the flags say.
    pub fn should_auto_resume(&self) -> bool {
        false
    }
}

impl From<SystemEvent> for Command {
    fn from(event: SystemEvent) -> Self {
        match event {
            SystemEvent::InterruptionBegan => Command::Interrupt(InterruptCause::Session),
            SystemEvent::InterruptionEnded { should_resume } => {
                Command::InterruptionEnded { should_resume }
            }
            SystemEvent::RouteChanged(RouteChange::DeviceUnavailable) => {
                Command::Interrupt(InterruptCause::RouteLost)
            }
            SystemEvent::RouteChanged(RouteChange::NewDeviceAvailable) => {
                Command::Note("new output device available")
            }
            SystemEvent::RouteChanged(RouteChange::Other) => Command::Note("output route changed"),
            SystemEvent::EnteredBackground => Command::Flush(FlushReason::Background),
            SystemEvent::EnteredForeground => Command::Note("entered foreground"),
            SystemEvent::WillTerminate => Command::Flush(FlushReason::Terminate),
        }
    }
}

impl From<RemoteCommand> for Command {
    fn from(command: RemoteCommand) -> Self {
        match command {
            RemoteCommand::Play => Command::Resume,
            RemoteCommand::Pause => Command::Pause,
            RemoteCommand::TogglePlayPause => Command::TogglePlayPause,
            RemoteCommand::SkipForward => Command::Skip(SkipDirection::Forward),
            RemoteCommand::SkipBackward => Command::Skip(SkipDirection::Backward),
            RemoteCommand::ChangePlaybackPosition(position) => Command::Seek(position),
            RemoteCommand::ChangePlaybackRate(rate) => Command::SetRate(rate),
        }
    }
}
