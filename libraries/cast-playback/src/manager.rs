//! Playback state machine
//!
//! A single task owns the snapshot, the engine and all bookkeeping. User
//! intents, engine signals, OS events and expired timers all arrive as
//! messages on one inbox and are handled strictly one at a time, so no
//! transition ever observes a half-applied one.
//!
//! Every engine load bumps a generation counter; timers carry the generation
//! they were scheduled under and engine signals carry their episode id, and
//! anything that no longer matches is dropped.

use crate::adapters::IntentFlags;
use crate::command::{Command, Envelope, InterruptCause, SkipDirection, TimerEvent};
use crate::completion::{completion_batch, mark_played_batch, CompletionGuard};
use crate::engine::{EngineSignal, EngineSignals, ItemStatus, PlaybackEngine};
use crate::error::{PlaybackError, Result};
use crate::events::PlaybackEvent;
use crate::handle::PlayerHandle;
use crate::queue::QueueManager;
use crate::sync::PersistenceSync;
use crate::types::{Diagnostics, PlaybackConfig, PlaybackState, PlaybackStatus};
use cast_core::{Episode, EpisodeId, PlaybackStore, WriteBatch};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Capacity of the notification bus
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Idle,
    Loading(EpisodeId),
    Playing(EpisodeId),
    Paused(EpisodeId),
}

impl Phase {
    fn episode_id(&self) -> Option<&EpisodeId> {
        match self {
            Self::Idle => None,
            Self::Loading(id) | Self::Playing(id) | Self::Paused(id) => Some(id),
        }
    }

    fn status(&self) -> PlaybackStatus {
        match self {
            Self::Idle => PlaybackStatus::Idle,
            Self::Loading(_) => PlaybackStatus::Loading,
            Self::Playing(_) => PlaybackStatus::Playing,
            Self::Paused(_) => PlaybackStatus::Paused,
        }
    }
}

/// Owner of the playback state
///
/// Never used directly: [`PlaybackManager::spawn`] moves it onto a task and
/// returns the [`PlayerHandle`] through which everything else talks to it.
pub struct PlaybackManager<E: PlaybackEngine> {
    config: PlaybackConfig,
    store: Arc<dyn PlaybackStore>,
    queue: Arc<QueueManager>,
    sync: PersistenceSync,

    engine: E,
    engine_attached: bool,
    /// Last rate reported by the engine
    observed_rate: f32,
    /// Rate requested for playback
    rate: f32,

    phase: Phase,
    current: Option<Episode>,
    position: f64,
    duration: f64,

    intent: IntentFlags,
    completion: CompletionGuard,
    seeking: bool,
    recovery_attempted: bool,

    generation: u64,
    timers: Vec<JoinHandle<()>>,

    state_tx: watch::Sender<PlaybackState>,
    events: broadcast::Sender<PlaybackEvent>,
    inbox: mpsc::WeakUnboundedSender<Envelope>,
    closed: bool,
}

impl<E: PlaybackEngine> PlaybackManager<E> {
    /// Start the manager on the current Tokio runtime
    ///
    /// `make_engine` receives the sender the engine must use for its
    /// observations. The task runs until [`PlayerHandle::shutdown`] or until
    /// every handle is dropped; either way the position is flushed and the
    /// engine torn down.
    pub fn spawn<F>(config: PlaybackConfig, store: Arc<dyn PlaybackStore>, make_engine: F) -> PlayerHandle
    where
        F: FnOnce(EngineSignals) -> E,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(PlaybackState::idle());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let queue = Arc::new(QueueManager::new(Arc::clone(&store), events.clone()));
        let sync = PersistenceSync::new(
            Arc::clone(&store),
            config.save_threshold_secs,
            config.save_debounce(),
        );
        let engine = make_engine(EngineSignals::new(tx.downgrade()));
        let rate = PlaybackConfig::clamp_rate(config.default_rate);

        let manager = Self {
            config,
            store: Arc::clone(&store),
            queue: Arc::clone(&queue),
            sync,
            engine,
            engine_attached: false,
            observed_rate: 0.0,
            rate,
            phase: Phase::Idle,
            current: None,
            position: 0.0,
            duration: 0.0,
            intent: IntentFlags::default(),
            completion: CompletionGuard::default(),
            seeking: false,
            recovery_attempted: false,
            generation: 0,
            timers: Vec::new(),
            state_tx,
            events: events.clone(),
            inbox: tx.downgrade(),
            closed: false,
        };

        tokio::spawn(manager.run(rx));
        PlayerHandle::new(tx, state_rx, events, queue, store)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Envelope>) {
        info!("Playback manager started");

        while let Some(Envelope { command, reply }) = rx.recv().await {
            let result = self.handle(command).await;
            match reply {
                Some(reply) => {
                    let _ = reply.send(result);
                }
                None => {
                    if let Err(e) = result {
                        debug!(error = %e, "Unacknowledged command failed");
                    }
                }
            }
            if self.closed {
                break;
            }
        }

        self.close().await;
        info!("Playback manager stopped");
    }

    async fn handle(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Toggle(id) => self.toggle(id).await,
            Command::Play(id) => self.play(id).await,
            Command::Resume => self.resume().await,
            Command::Pause => {
                self.pause(true).await;
                Ok(())
            }
            Command::TogglePlayPause => match self.phase.status() {
                PlaybackStatus::Playing | PlaybackStatus::Loading => {
                    self.pause(true).await;
                    Ok(())
                }
                PlaybackStatus::Paused => self.resume().await,
                PlaybackStatus::Idle => {
                    debug!("Play/pause ignored while idle");
                    Ok(())
                }
            },
            Command::Stop => {
                self.stop().await;
                Ok(())
            }
            Command::Seek(to) => {
                self.seek(to).await;
                Ok(())
            }
            Command::Skip(direction) => {
                let target = match direction {
                    SkipDirection::Forward => self.position + self.config.skip_forward_secs,
                    SkipDirection::Backward => self.position - self.config.skip_backward_secs,
                };
                self.seek(target).await;
                Ok(())
            }
            Command::SetRate(rate) => {
                self.set_rate(rate);
                Ok(())
            }
            Command::MarkPlayed {
                episode_id,
                manually,
            } => self.mark_played(episode_id, manually).await,
            Command::MarkUnplayed(episode_id) => self.mark_unplayed(&episode_id).await,
            Command::Restore => self.restore().await,
            Command::Interrupt(cause) => {
                self.interrupt(cause).await;
                Ok(())
            }
            Command::InterruptionEnded { should_resume } => {
                info!(should_resume, "Interruption ended");
                if should_resume && self.intent.should_auto_resume() {
                    self.resume().await
                } else {
                    debug!(intent = ?self.intent, "Not resuming automatically");
                    Ok(())
                }
            }
            Command::Flush(reason) => {
                debug!(?reason, "Flushing position");
                self.flush_current().await;
                Ok(())
            }
            Command::Note(note) => {
                debug!(note, "System event");
                Ok(())
            }
            Command::Engine(signal) => {
                self.on_engine_signal(signal).await;
                Ok(())
            }
            Command::Timer(event) => {
                self.on_timer(event).await;
                Ok(())
            }
            Command::Inspect(reply) => {
                let _ = reply.send(self.diagnostics());
                Ok(())
            }
            Command::Shutdown => {
                self.close().await;
                Ok(())
            }
        }
    }

    // ========================================================================
    // User intents
    // ========================================================================

    async fn toggle(&mut self, episode_id: EpisodeId) -> Result<()> {
        if self.phase.episode_id() != Some(&episode_id) {
            return self.start(episode_id).await;
        }

        match self.phase.status() {
            PlaybackStatus::Playing => {
                self.pause(true).await;
                Ok(())
            }
            PlaybackStatus::Paused => self.resume().await,
            PlaybackStatus::Loading => {
                debug!(episode_id = %episode_id, "Toggle ignored while loading");
                Ok(())
            }
            PlaybackStatus::Idle => self.start(episode_id).await,
        }
    }

    async fn play(&mut self, episode_id: EpisodeId) -> Result<()> {
        if self.phase.episode_id() != Some(&episode_id) {
            return self.start(episode_id).await;
        }

        match self.phase.status() {
            PlaybackStatus::Paused => self.resume().await,
            status => {
                debug!(episode_id = %episode_id, ?status, "Episode already active");
                Ok(())
            }
        }
    }

    /// Replace whatever is active with `episode_id`, from its saved position
    async fn start(&mut self, episode_id: EpisodeId) -> Result<()> {
        let episode = self.playable_episode(&episode_id).await?;

        self.flush_current().await;
        self.detach_engine();
        self.intent.clear();
        self.completion.clear();
        self.recovery_attempted = false;

        let saved = match self.store.get_record(&episode_id).await {
            Ok(record) => record.map_or(0.0, |r| r.position_seconds),
            Err(e) => {
                warn!(episode_id = %episode_id, error = %e, "Failed to read saved position");
                0.0
            }
        };
        let duration = episode.known_duration();
        let start_at = self.config.resume_position(saved, duration);

        info!(episode_id = %episode_id, start_at, "Starting episode");
        self.phase = Phase::Loading(episode_id.clone());
        self.current = Some(episode);
        self.position = start_at;
        self.duration = duration;
        self.publish();
        self.sync.track(&episode_id, saved);

        if let Err(e) = self.queue.move_to_front(&episode_id).await {
            warn!(episode_id = %episode_id, error = %e, "Failed to move episode to the queue head");
        }
        let mut batch = WriteBatch::new();
        batch.set_now_playing(Some(&episode_id));
        self.save_logged(batch, "now playing marker").await;

        self.begin_load().await;
        Ok(())
    }

    async fn playable_episode(&mut self, episode_id: &EpisodeId) -> Result<Episode> {
        let Some(episode) = self.store.get_episode(episode_id).await? else {
            warn!(episode_id = %episode_id, "Rejecting unknown episode");
            return Err(PlaybackError::invalid_episode(format!(
                "unknown episode {episode_id}"
            )));
        };
        if episode.audio_url.trim().is_empty() {
            warn!(episode_id = %episode_id, "Rejecting episode without audio URL");
            return Err(PlaybackError::invalid_episode(format!(
                "episode {episode_id} has no audio URL"
            )));
        }
        Ok(episode)
    }

    async fn begin_load(&mut self) {
        let Some(episode) = self.current.clone() else {
            return;
        };

        self.engine_attached = true;
        self.observed_rate = 0.0;
        match self.engine.load(&episode.id, &episode.audio_url, self.position) {
            Ok(()) => {
                self.engine.play(self.rate);
                self.schedule(
                    self.config.loading_timeout(),
                    TimerEvent::LoadingTimeout {
                        episode_id: episode.id,
                        generation: self.generation,
                    },
                );
            }
            Err(e) => self.on_item_failure(&episode.id, e).await,
        }
    }

    async fn resume(&mut self) -> Result<()> {
        let Phase::Paused(episode_id) = &self.phase else {
            debug!(status = ?self.phase.status(), "Nothing paused to resume");
            return Ok(());
        };
        let episode_id = episode_id.clone();
        self.intent.clear();

        if self.engine_attached {
            info!(episode_id = %episode_id, "Resuming");
            self.engine.play(self.rate);
            Ok(())
        } else {
            // Restored snapshot: the engine attaches on first resume
            self.start(episode_id).await
        }
    }

    async fn pause(&mut self, user_initiated: bool) {
        let episode_id = match &self.phase {
            Phase::Loading(id) | Phase::Playing(id) => id.clone(),
            Phase::Paused(_) | Phase::Idle => {
                trace!("Pause ignored; nothing advancing");
                return;
            }
        };

        if user_initiated {
            self.intent.user_initiated_pause = true;
        }
        if self.engine_attached {
            self.engine.pause();
        }
        self.observed_rate = 0.0;

        info!(episode_id = %episode_id, user_initiated, position = self.position, "Paused");
        self.phase = Phase::Paused(episode_id.clone());
        self.publish();
        self.sync.flush(&episode_id, self.position).await;
    }

    async fn stop(&mut self) {
        let Some(episode_id) = self.phase.episode_id().cloned() else {
            return;
        };

        info!(episode_id = %episode_id, "Stopping");
        self.sync.flush(&episode_id, self.position).await;
        self.detach_engine();
        self.go_idle();
        self.clear_now_playing().await;
    }

    async fn seek(&mut self, to: f64) {
        let Some(episode_id) = self.phase.episode_id().cloned() else {
            debug!("Seek ignored while idle");
            return;
        };

        let mut target = if to.is_finite() { to.max(0.0) } else { 0.0 };
        if self.duration > 0.0 {
            target = target.min(self.duration);
        }
        self.position = target;
        self.publish();

        if self.engine_attached {
            self.seeking = true;
            self.engine.seek(target);
        } else {
            self.sync.flush(&episode_id, target).await;
        }
    }

    fn set_rate(&mut self, requested: f32) {
        let rate = PlaybackConfig::clamp_rate(requested);
        if rate != requested {
            debug!(requested, rate, "Clamped playback rate");
        }
        self.rate = rate;

        if self.engine_attached && matches!(self.phase, Phase::Playing(_)) {
            self.engine.play(rate);
        }
    }

    async fn mark_played(&mut self, episode_id: EpisodeId, manually: bool) -> Result<()> {
        let is_current = self.phase.episode_id() == Some(&episode_id);
        if is_current && !manually {
            self.complete(&episode_id).await;
            return Ok(());
        }

        let episode = match &self.current {
            Some(current) if is_current => current.clone(),
            _ => self.store.get_episode(&episode_id).await?.ok_or_else(|| {
                PlaybackError::invalid_episode(format!("unknown episode {episode_id}"))
            })?,
        };
        let already_played = self
            .store
            .get_record(&episode_id)
            .await?
            .is_some_and(|r| r.is_played);

        if is_current {
            if !self.completion.begin(&episode_id) {
                trace!(episode_id = %episode_id, "Completion already handled");
                return Ok(());
            }
            self.sync.cancel(&episode_id).await;
        }

        let batch = mark_played_batch(&episode, already_played, is_current, Utc::now());
        let result = self
            .queue
            .remove_with(std::slice::from_ref(&episode_id), batch)
            .await;

        if is_current {
            self.detach_engine();
            self.go_idle();
        }

        result?;
        info!(episode_id = %episode_id, is_current, "Marked as played");
        let _ = self.events.send(PlaybackEvent::EpisodeMarkedPlayed { episode_id });
        Ok(())
    }

    async fn mark_unplayed(&mut self, episode_id: &EpisodeId) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.mark_unplayed(episode_id);
        self.store.save(batch).await?;
        info!(episode_id = %episode_id, "Marked as unplayed");
        Ok(())
    }

    /// Rebuild a paused snapshot from the episode flagged as playing
    async fn restore(&mut self) -> Result<()> {
        if self.phase != Phase::Idle {
            debug!("Restore skipped; playback already active");
            return Ok(());
        }
        let Some(episode_id) = self.store.get_now_playing().await? else {
            debug!("Nothing to restore");
            return Ok(());
        };
        let Some(episode) = self.store.get_episode(&episode_id).await? else {
            warn!(episode_id = %episode_id, "Now-playing episode no longer exists");
            return Ok(());
        };

        let saved = self
            .store
            .get_record(&episode_id)
            .await?
            .map_or(0.0, |r| r.position_seconds);
        let duration = episode.known_duration();

        self.intent.clear();
        self.completion.clear();
        self.phase = Phase::Paused(episode_id.clone());
        self.position = self.config.resume_position(saved, duration);
        self.duration = duration;
        self.current = Some(episode);
        self.sync.track(&episode_id, saved);
        self.publish();

        info!(episode_id = %episode_id, position = self.position, "Restored paused episode");
        Ok(())
    }

    // ========================================================================
    // OS events
    // ========================================================================

    async fn interrupt(&mut self, cause: InterruptCause) {
        self.intent.user_initiated_pause = false;
        if cause == InterruptCause::RouteLost {
            self.intent.interrupted_by_route_change = true;
        }
        info!(?cause, "Playback interrupted");

        if matches!(self.phase, Phase::Loading(_) | Phase::Playing(_)) {
            self.pause(false).await;
        } else {
            self.flush_current().await;
        }
    }

    // ========================================================================
    // Engine signals
    // ========================================================================

    async fn on_engine_signal(&mut self, signal: EngineSignal) {
        let Some(current) = self.phase.episode_id() else {
            trace!(?signal, "Dropping engine signal while idle");
            return;
        };
        if signal.episode_id() != current {
            trace!(
                signal_episode = %signal.episode_id(),
                current_episode = %current,
                "Dropping stale engine signal"
            );
            return;
        }
        let episode_id = current.clone();

        match signal {
            EngineSignal::RateChanged { rate, .. } => self.on_rate_changed(&episode_id, rate).await,
            EngineSignal::StatusChanged {
                status: ItemStatus::Ready { duration },
                ..
            } => self.on_ready(&episode_id, duration).await,
            EngineSignal::StatusChanged {
                status: ItemStatus::Failed { message },
                ..
            } => {
                let error = PlaybackError::engine(&episode_id, message);
                self.on_item_failure(&episode_id, error).await;
            }
            EngineSignal::Stalled { .. } => self.on_stalled(&episode_id),
            EngineSignal::DidReachEnd { .. } => self.complete(&episode_id).await,
            EngineSignal::TimeTick { position, .. } => self.on_tick(&episode_id, position).await,
            EngineSignal::SeekCompleted { position, .. } => {
                self.seeking = false;
                self.position = position.max(0.0);
                self.publish();
                self.sync.flush(&episode_id, self.position).await;
            }
        }
    }

    async fn on_rate_changed(&mut self, episode_id: &EpisodeId, rate: f32) {
        let previous = std::mem::replace(&mut self.observed_rate, rate);

        if rate > 0.0 && previous <= 0.0 {
            if matches!(self.phase, Phase::Loading(_) | Phase::Paused(_)) {
                info!(episode_id = %episode_id, rate, "Playing");
                self.phase = Phase::Playing(episode_id.clone());
                self.publish();
            }
        } else if rate <= 0.0 && previous > 0.0 && matches!(self.phase, Phase::Playing(_)) {
            info!(episode_id = %episode_id, "Engine stopped advancing");
            self.phase = Phase::Paused(episode_id.clone());
            self.publish();
            self.sync.flush(episode_id, self.position).await;
        }
    }

    async fn on_ready(&mut self, episode_id: &EpisodeId, duration: Option<f64>) {
        self.recovery_attempted = false;

        let Some(measured) = duration.filter(|d| d.is_finite() && *d > 0.0) else {
            return;
        };
        if (self.duration - measured).abs() > f64::EPSILON {
            self.duration = measured;
            self.publish();
        }

        let Some(episode) = self.current.as_mut() else {
            return;
        };
        if episode.actual_duration.is_some() {
            return;
        }
        episode.actual_duration = Some(measured);

        info!(episode_id = %episode_id, duration = measured, "Recording measured duration");
        let mut batch = WriteBatch::new();
        batch.set_actual_duration(episode_id, measured);
        self.save_logged(batch, "measured duration").await;
    }

    async fn on_item_failure(&mut self, episode_id: &EpisodeId, failure: PlaybackError) {
        if self.recovery_attempted {
            error!(episode_id = %episode_id, error = %failure, "Episode failed again; giving up");
            self.fail(episode_id, failure).await;
            return;
        }

        warn!(episode_id = %episode_id, error = %failure, "Episode failed; retrying once");
        self.recovery_attempted = true;
        self.sync.flush(episode_id, self.position).await;
        self.detach_engine();
        self.phase = Phase::Loading(episode_id.clone());
        self.publish();
        self.schedule(
            self.config.recovery_delay(),
            TimerEvent::RetryLoad {
                episode_id: episode_id.clone(),
                generation: self.generation,
            },
        );
    }

    fn on_stalled(&mut self, episode_id: &EpisodeId) {
        let remaining = self.duration - self.position;
        if self.duration > 0.0 && remaining <= self.config.stall_end_window_secs {
            debug!(episode_id = %episode_id, remaining, "Stalled near the end; confirming");
            self.schedule(
                self.config.stall_confirmation(),
                TimerEvent::StallCheck {
                    episode_id: episode_id.clone(),
                    generation: self.generation,
                    position: self.position,
                },
            );
        } else {
            debug!(episode_id = %episode_id, position = self.position, "Playback stalled");
        }
    }

    async fn on_tick(&mut self, episode_id: &EpisodeId, position: f64) {
        if self.seeking {
            trace!(episode_id = %episode_id, "Tick suppressed during seek");
            return;
        }
        if !position.is_finite() {
            return;
        }
        let position = position.max(0.0);

        if (position - self.position).abs() >= self.config.tick_threshold_secs {
            self.position = position;
            self.publish();
        }

        if matches!(self.phase, Phase::Playing(_)) {
            self.sync.record_progress(episode_id, position);
            if self.duration > 0.0 && position >= self.duration - self.config.near_end_epsilon_secs
            {
                self.complete(episode_id).await;
            }
        }
    }

    // ========================================================================
    // Timers
    // ========================================================================

    fn schedule(&mut self, delay: Duration, event: TimerEvent) {
        let inbox = self.inbox.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = inbox.upgrade() {
                let _ = tx.send(Envelope::new(Command::Timer(event)));
            }
        });

        self.timers.retain(|t| !t.is_finished());
        self.timers.push(handle);
    }

    async fn on_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::LoadingTimeout {
                episode_id,
                generation,
            } => {
                if generation != self.generation
                    || self.phase != Phase::Loading(episode_id.clone())
                {
                    trace!(episode_id = %episode_id, "Loading timeout no longer relevant");
                    return;
                }
                if self.engine.rate() > 0.0 {
                    info!(episode_id = %episode_id, "Loading timed out but audio is advancing");
                    self.phase = Phase::Playing(episode_id);
                    self.publish();
                } else {
                    error!(episode_id = %episode_id, "Loading timed out");
                    let failure = PlaybackError::engine(&episode_id, "loading timed out");
                    self.fail(&episode_id, failure).await;
                }
            }
            TimerEvent::RetryLoad {
                episode_id,
                generation,
            } => {
                if generation != self.generation
                    || self.phase != Phase::Loading(episode_id.clone())
                {
                    trace!(episode_id = %episode_id, "Retry no longer relevant");
                    return;
                }
                info!(episode_id = %episode_id, position = self.position, "Retrying episode");
                self.begin_load().await;
            }
            TimerEvent::StallCheck {
                episode_id,
                generation,
                position,
            } => {
                if generation != self.generation || self.phase != Phase::Playing(episode_id.clone()) {
                    trace!(episode_id = %episode_id, "Stall check no longer relevant");
                    return;
                }
                if (self.position - position).abs() < self.config.tick_threshold_secs {
                    info!(episode_id = %episode_id, "Stall near the end confirmed as completion");
                    self.complete(&episode_id).await;
                } else {
                    debug!(episode_id = %episode_id, "Playback recovered from stall");
                }
            }
            TimerEvent::Autoplay { generation, after } => {
                if generation != self.generation || self.phase != Phase::Idle {
                    trace!("Autoplay no longer relevant");
                    return;
                }
                let next = match self.queue.queued_ids().await {
                    Ok(ids) => ids.into_iter().find(|id| *id != after),
                    Err(e) => {
                        warn!(error = %e, "Failed to read queue for autoplay");
                        return;
                    }
                };
                match next {
                    Some(next) => {
                        info!(episode_id = %next, "Autoplaying queue head");
                        if let Err(e) = self.start(next).await {
                            warn!(error = %e, "Autoplay failed");
                        }
                    }
                    None => debug!("Queue empty; autoplay stops"),
                }
            }
        }
    }

    // ========================================================================
    // Completion and teardown
    // ========================================================================

    async fn complete(&mut self, episode_id: &EpisodeId) {
        if !self.completion.begin(episode_id) {
            trace!(episode_id = %episode_id, "Completion already handled");
            return;
        }
        self.sync.cancel(episode_id).await;
        info!(episode_id = %episode_id, "Episode finished");

        match self.persist_completion(episode_id).await {
            Ok(()) => {
                let _ = self.events.send(PlaybackEvent::EpisodeCompleted {
                    episode_id: episode_id.clone(),
                });
            }
            Err(e) => warn!(episode_id = %episode_id, error = %e, "Failed to record completion"),
        }

        self.detach_engine();
        self.go_idle();

        if self.config.autoplay {
            self.schedule(
                self.config.autoplay_delay(),
                TimerEvent::Autoplay {
                    generation: self.generation,
                    after: episode_id.clone(),
                },
            );
        }
    }

    /// One transaction: played bookkeeping, aggregate, and dequeue unless
    /// the episode had already been played
    async fn persist_completion(&mut self, episode_id: &EpisodeId) -> Result<()> {
        let episode = match &self.current {
            Some(current) if current.id == *episode_id => current.clone(),
            _ => self.store.get_episode(episode_id).await?.ok_or_else(|| {
                PlaybackError::invalid_episode(format!("unknown episode {episode_id}"))
            })?,
        };
        let already_played = self
            .store
            .get_record(episode_id)
            .await?
            .is_some_and(|r| r.is_played);

        let batch = completion_batch(&episode, Utc::now());
        if already_played {
            self.store.save(batch).await?;
        } else {
            self.queue
                .remove_with(std::slice::from_ref(episode_id), batch)
                .await?;
        }
        Ok(())
    }

    async fn fail(&mut self, episode_id: &EpisodeId, failure: PlaybackError) {
        self.sync.flush(episode_id, self.position).await;
        self.detach_engine();
        self.go_idle();
        self.clear_now_playing().await;
        let message = match failure {
            PlaybackError::EngineFailure { message, .. } => message,
            other => other.to_string(),
        };
        let _ = self.events.send(PlaybackEvent::PlaybackFailed {
            episode_id: episode_id.clone(),
            message,
        });
    }

    /// Tear the engine down and invalidate every pending timer
    fn detach_engine(&mut self) {
        self.generation += 1;
        for timer in self.timers.drain(..) {
            timer.abort();
        }
        self.seeking = false;
        self.observed_rate = 0.0;
        if self.engine_attached {
            self.engine.teardown();
            self.engine_attached = false;
        }
    }

    fn go_idle(&mut self) {
        self.phase = Phase::Idle;
        self.current = None;
        self.position = 0.0;
        self.duration = 0.0;
        self.publish();
    }

    async fn flush_current(&mut self) {
        if let Some(episode_id) = self.phase.episode_id().cloned() {
            self.sync.flush(&episode_id, self.position).await;
        }
    }

    async fn clear_now_playing(&mut self) {
        let mut batch = WriteBatch::new();
        batch.set_now_playing(None);
        self.save_logged(batch, "now playing marker").await;
    }

    async fn save_logged(&mut self, batch: WriteBatch, what: &'static str) {
        if let Err(e) = self.store.save(batch).await {
            warn!(error = %e, what, "Failed to persist");
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.flush_current().await;
        self.detach_engine();
        info!("Playback manager shut down");
    }

    // ========================================================================
    // Snapshot
    // ========================================================================

    fn snapshot(&self) -> PlaybackState {
        let Some(episode_id) = self.phase.episode_id() else {
            return PlaybackState::idle();
        };
        PlaybackState {
            current_episode_id: Some(episode_id.clone()),
            position: self.position,
            duration: self.duration,
            is_playing: matches!(self.phase, Phase::Playing(_)),
            is_loading: matches!(self.phase, Phase::Loading(_)),
        }
    }

    /// Replace the snapshot and announce it if anything changed
    fn publish(&self) {
        let state = self.snapshot();
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state.clone();
                true
            }
        });
        if changed {
            let _ = self.events.send(PlaybackEvent::StateChanged { state });
        }
    }

    fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            status: self.phase.status(),
            intent: self.intent,
            completion_guard: self.completion.current().cloned(),
            seeking: self.seeking,
            engine_attached: self.engine_attached,
            recovery_attempted: self.recovery_attempted,
            rate: self.rate,
            pending_save: self.sync.has_pending(),
        }
    }
}
