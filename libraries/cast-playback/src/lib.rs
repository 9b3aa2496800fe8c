//! Castaway - Playback Core
//!
//! The podcast playback engine: one authoritative "what is playing" state,
//! kept consistent with the durable per-episode facts in a
//! [`PlaybackStore`](cast_core::PlaybackStore).
//!
//! This crate provides:
//! - Playback state machine (`Idle` / `Loading` / `Playing` / `Paused`) run as a single task
//! - Persisted "Up Next" queue with dense positions
//! - Debounced position saves with immediate flushes on pause, stop and OS events
//! - Single-fire completion with podcast aggregates and autoplay
//! - Translation of interruptions, route changes, lifecycle and remote commands
//!
//! # Architecture
//!
//! `cast-playback` has no audio code of its own. The platform provides a
//! [`PlaybackEngine`] and feeds its observations back through
//! [`EngineSignals`]; the manager decides every transition.
//!
//! # Example
//!
//! ```rust,no_run
//! use cast_playback::{EngineSignals, PlaybackConfig, PlaybackEngine, PlaybackManager, Result};
//! use cast_core::{EpisodeId, PlaybackStore};
//! use std::sync::Arc;
//!
//! struct NativePlayer {
//!     signals: EngineSignals,
//!     rate: f32,
//! }
//!
//! impl PlaybackEngine for NativePlayer {
//!     fn load(&mut self, _episode_id: &EpisodeId, _url: &str, _start_at: f64) -> Result<()> {
//!         Ok(())
//!     }
//!     fn play(&mut self, rate: f32) {
//!         self.rate = rate;
//!     }
//!     fn pause(&mut self) {
//!         self.rate = 0.0;
//!     }
//!     fn seek(&mut self, _to: f64) {}
//!     fn rate(&self) -> f32 {
//!         self.rate
//!     }
//!     fn teardown(&mut self) {
//!         self.rate = 0.0;
//!     }
//! }
//!
//! # async fn example(store: Arc<dyn PlaybackStore>) -> Result<()> {
//! let player = PlaybackManager::spawn(PlaybackConfig::default(), store, |signals| NativePlayer {
//!     signals,
//!     rate: 0.0,
//! });
//!
//! player.toggle("episode-1").await?;
//! player.skip_forward().await?;
//! println!("{:?}", player.state());
//! # Ok(())
//! # }
//! ```

mod command;
mod completion;
mod error;
mod handle;
mod manager;
mod sync;

pub mod adapters;
pub mod engine;
pub mod events;
pub mod queue;
pub mod types;

// Public exports
pub use adapters::{IntentFlags, RemoteCommand, RouteChange, SystemEvent};
pub use completion::CompletionGuard;
pub use engine::{EngineSignal, EngineSignals, ItemStatus, PlaybackEngine};
pub use error::{PlaybackError, Result};
pub use events::PlaybackEvent;
pub use handle::PlayerHandle;
pub use manager::PlaybackManager;
pub use queue::QueueManager;
pub use sync::PersistenceSync;
pub use types::{Diagnostics, PlaybackConfig, PlaybackState, PlaybackStatus};
