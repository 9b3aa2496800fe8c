//! Cloneable front door to a running playback manager

use crate::adapters::{RemoteCommand, SystemEvent};
use crate::command::{Command, Envelope, SkipDirection};
use crate::error::{PlaybackError, Result};
use crate::events::PlaybackEvent;
use crate::queue::QueueManager;
use crate::types::{Diagnostics, PlaybackState};
use cast_core::{EpisodeId, PlaybackStore, WriteBatch};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{info, warn};

/// Handle to the playback manager task
///
/// Every method that changes playback state posts a message and waits until
/// the manager has handled it. Dropping the last handle shuts the manager
/// down.
#[derive(Clone)]
pub struct PlayerHandle {
    tx: mpsc::UnboundedSender<Envelope>,
    state: watch::Receiver<PlaybackState>,
    events: broadcast::Sender<PlaybackEvent>,
    queue: Arc<QueueManager>,
    store: Arc<dyn PlaybackStore>,
}

fn validated(episode_id: EpisodeId) -> Result<EpisodeId> {
    if episode_id.is_empty() {
        warn!("Rejecting blank episode id");
        return Err(PlaybackError::invalid_episode("episode id is empty"));
    }
    Ok(episode_id)
}

impl PlayerHandle {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<Envelope>,
        state: watch::Receiver<PlaybackState>,
        events: broadcast::Sender<PlaybackEvent>,
        queue: Arc<QueueManager>,
        store: Arc<dyn PlaybackStore>,
    ) -> Self {
        Self {
            tx,
            state,
            events,
            queue,
            store,
        }
    }

    async fn request(&self, command: Command) -> Result<()> {
        let (envelope, reply) = Envelope::with_reply(command);
        self.tx
            .send(envelope)
            .map_err(|_| PlaybackError::ManagerClosed)?;
        reply.await.map_err(|_| PlaybackError::ManagerClosed)?
    }

    // ========================================================================
    // Observation
    // ========================================================================

    /// Current snapshot
    pub fn state(&self) -> PlaybackState {
        self.state.borrow().clone()
    }

    /// Receiver that sees every snapshot replacement
    pub fn watch(&self) -> watch::Receiver<PlaybackState> {
        self.state.clone()
    }

    /// Subscribe to the notification bus
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// The queue shared with the manager
    pub fn queue(&self) -> &QueueManager {
        &self.queue
    }

    pub async fn diagnostics(&self) -> Result<Diagnostics> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Envelope::new(Command::Inspect(tx)))
            .map_err(|_| PlaybackError::ManagerClosed)?;
        rx.await.map_err(|_| PlaybackError::ManagerClosed)
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Play/pause the episode, or switch to it if another one is active
    pub async fn toggle(&self, episode_id: impl Into<EpisodeId>) -> Result<()> {
        let episode_id = validated(episode_id.into())?;
        self.request(Command::Toggle(episode_id)).await
    }

    /// Make the episode play, switching to it if needed
    pub async fn play(&self, episode_id: impl Into<EpisodeId>) -> Result<()> {
        let episode_id = validated(episode_id.into())?;
        self.request(Command::Play(episode_id)).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.request(Command::Resume).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(Command::Pause).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(Command::Stop).await
    }

    /// Jump to an absolute position in seconds
    pub async fn seek(&self, to: f64) -> Result<()> {
        self.request(Command::Seek(to)).await
    }

    pub async fn skip_forward(&self) -> Result<()> {
        self.request(Command::Skip(SkipDirection::Forward)).await
    }

    pub async fn skip_backward(&self) -> Result<()> {
        self.request(Command::Skip(SkipDirection::Backward)).await
    }

    /// Set the playback rate (clamped to 0.5–3.0)
    pub async fn set_rate(&self, rate: f32) -> Result<()> {
        self.request(Command::SetRate(rate)).await
    }

    /// Rebuild a paused snapshot from the last episode that was playing
    pub async fn restore(&self) -> Result<()> {
        self.request(Command::Restore).await
    }

    // ========================================================================
    // Bookkeeping
    // ========================================================================

    /// Mark an episode as played
    ///
    /// With `manually` set on the current episode, playback stops without
    /// autoplay; otherwise the current episode goes through the normal
    /// completion path.
    pub async fn mark_as_played(&self, episode_id: impl Into<EpisodeId>, manually: bool) -> Result<()> {
        let episode_id = validated(episode_id.into())?;
        self.request(Command::MarkPlayed {
            episode_id,
            manually,
        })
        .await
    }

    pub async fn mark_as_unplayed(&self, episode_id: impl Into<EpisodeId>) -> Result<()> {
        let episode_id = validated(episode_id.into())?;
        self.request(Command::MarkUnplayed(episode_id)).await
    }

    pub async fn set_favorite(&self, episode_id: impl Into<EpisodeId>, favorite: bool) -> Result<()> {
        let episode_id = validated(episode_id.into())?;
        let mut batch = WriteBatch::new();
        batch.set_favorite(&episode_id, favorite, Utc::now());
        self.store.save(batch).await?;
        info!(episode_id = %episode_id, favorite, "Favorite updated");
        Ok(())
    }

    // ========================================================================
    // Platform events
    // ========================================================================

    pub async fn handle_system_event(&self, event: SystemEvent) -> Result<()> {
        self.request(Command::from(event)).await
    }

    pub async fn handle_remote_command(&self, command: RemoteCommand) -> Result<()> {
        self.request(Command::from(command)).await
    }

    /// Flush the position, tear the engine down and stop the manager
    pub async fn shutdown(&self) -> Result<()> {
        self.request(Command::Shutdown).await
    }
}
