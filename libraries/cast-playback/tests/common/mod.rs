//! Shared fixtures: a scripted engine and a player over an in-memory store

#![allow(dead_code)]

use cast_core::{Episode, EpisodeId, PlaybackRecord, PlaybackStore, Podcast, PodcastId};
use cast_playback::{
    EngineSignal, EngineSignals, ItemStatus, PlaybackConfig, PlaybackEngine, PlaybackError,
    PlaybackEvent, PlaybackManager, PlayerHandle,
};
use cast_storage::MemoryStore;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

pub const PODCAST: &str = "pod-1";

/// Every call the manager made on the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Load { episode_id: EpisodeId, start_at: f64 },
    Play(f32),
    Pause,
    Seek(f64),
    Teardown,
}

#[derive(Default)]
struct ControlState {
    calls: Vec<EngineCall>,
    signals: Option<EngineSignals>,
    loaded: Option<EpisodeId>,
    rate: f32,
    /// Report rate and seek changes back like a real player
    responsive: bool,
    /// `rate()` reports the requested rate; otherwise 0
    advancing: bool,
    /// Every `load` fails
    fail_loads: bool,
}

/// Test-side view and remote control of the fake engine
#[derive(Clone)]
pub struct EngineControl {
    inner: Arc<Mutex<ControlState>>,
}

impl EngineControl {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ControlState {
                responsive: true,
                advancing: true,
                ..ControlState::default()
            })),
        }
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn loads(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, EngineCall::Load { .. }))
            .count()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    pub fn set_responsive(&self, responsive: bool) {
        self.inner.lock().unwrap().responsive = responsive;
    }

    pub fn set_advancing(&self, advancing: bool) {
        self.inner.lock().unwrap().advancing = advancing;
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.inner.lock().unwrap().fail_loads = fail;
    }

    /// Post a signal as if the engine observed it
    pub fn signal(&self, signal: EngineSignal) {
        let signals = self.inner.lock().unwrap().signals.clone();
        if let Some(signals) = signals {
            signals.send(signal);
        }
    }

    pub fn tick(&self, episode: &str, position: f64) {
        self.signal(EngineSignal::TimeTick {
            episode_id: EpisodeId::new(episode),
            position,
        });
    }

    pub fn ready(&self, episode: &str, duration: Option<f64>) {
        self.signal(EngineSignal::StatusChanged {
            episode_id: EpisodeId::new(episode),
            status: ItemStatus::Ready { duration },
        });
    }

    pub fn fail(&self, episode: &str) {
        self.signal(EngineSignal::StatusChanged {
            episode_id: EpisodeId::new(episode),
            status: ItemStatus::Failed {
                message: "decoder error".to_string(),
            },
        });
    }

    pub fn reach_end(&self, episode: &str) {
        self.signal(EngineSignal::DidReachEnd {
            episode_id: EpisodeId::new(episode),
        });
    }

    pub fn rate_changed(&self, episode: &str, rate: f32) {
        self.signal(EngineSignal::RateChanged {
            episode_id: EpisodeId::new(episode),
            rate,
        });
    }
}

pub struct FakeEngine {
    control: EngineControl,
    signals: EngineSignals,
}

impl FakeEngine {
    fn emit(&self, signal: EngineSignal) {
        self.signals.send(signal);
    }
}

impl PlaybackEngine for FakeEngine {
    fn load(&mut self, episode_id: &EpisodeId, _url: &str, start_at: f64) -> cast_playback::Result<()> {
        let mut state = self.control.inner.lock().unwrap();
        state.calls.push(EngineCall::Load {
            episode_id: episode_id.clone(),
            start_at,
        });
        if state.fail_loads {
            return Err(PlaybackError::engine(episode_id, "cannot open stream"));
        }
        state.loaded = Some(episode_id.clone());
        state.rate = 0.0;
        Ok(())
    }

    fn play(&mut self, rate: f32) {
        let signal = {
            let mut state = self.control.inner.lock().unwrap();
            state.calls.push(EngineCall::Play(rate));
            state.rate = rate;
            match (&state.loaded, state.responsive) {
                (Some(id), true) => Some(EngineSignal::RateChanged {
                    episode_id: id.clone(),
                    rate,
                }),
                _ => None,
            }
        };
        if let Some(signal) = signal {
            self.emit(signal);
        }
    }

    fn pause(&mut self) {
        let signal = {
            let mut state = self.control.inner.lock().unwrap();
            state.calls.push(EngineCall::Pause);
            let was_playing = state.rate > 0.0;
            state.rate = 0.0;
            match (&state.loaded, state.responsive && was_playing) {
                (Some(id), true) => Some(EngineSignal::RateChanged {
                    episode_id: id.clone(),
                    rate: 0.0,
                }),
                _ => None,
            }
        };
        if let Some(signal) = signal {
            self.emit(signal);
        }
    }

    fn seek(&mut self, to: f64) {
        let signal = {
            let mut state = self.control.inner.lock().unwrap();
            state.calls.push(EngineCall::Seek(to));
            match (&state.loaded, state.responsive) {
                (Some(id), true) => Some(EngineSignal::SeekCompleted {
                    episode_id: id.clone(),
                    position: to,
                }),
                _ => None,
            }
        };
        if let Some(signal) = signal {
            self.emit(signal);
        }
    }

    fn rate(&self) -> f32 {
        let state = self.control.inner.lock().unwrap();
        if state.advancing {
            state.rate
        } else {
            0.0
        }
    }

    fn teardown(&mut self) {
        let mut state = self.control.inner.lock().unwrap();
        state.calls.push(EngineCall::Teardown);
        state.loaded = None;
        state.rate = 0.0;
    }
}

/// Route manager logs to the test output; `RUST_LOG` picks the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Config with autoplay off so tests opt into it explicitly
pub fn test_config() -> PlaybackConfig {
    PlaybackConfig {
        autoplay: false,
        ..PlaybackConfig::default()
    }
}

/// A running player over a `MemoryStore` seeded with one podcast
pub struct Harness {
    pub handle: PlayerHandle,
    pub store: Arc<MemoryStore>,
    pub control: EngineControl,
    episodes: Mutex<u32>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: PlaybackConfig) -> Self {
        init_tracing();
        let store = Arc::new(MemoryStore::new());
        store
            .insert_podcast(Podcast::new(PODCAST, "Test Podcast"))
            .unwrap();

        let control = EngineControl::new();
        let engine_control = control.clone();
        let handle = PlaybackManager::spawn(config, store.clone(), move |signals| {
            engine_control.inner.lock().unwrap().signals = Some(signals.clone());
            FakeEngine {
                control: engine_control,
                signals,
            }
        });

        Self {
            handle,
            store,
            control,
            episodes: Mutex::new(0),
        }
    }

    /// Add an episode with a feed duration; later episodes are newer
    pub fn episode(&self, id: &str, feed_duration: f64) -> EpisodeId {
        let mut count = self.episodes.lock().unwrap();
        *count += 1;
        let published = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + ChronoDuration::days(i64::from(*count));

        let episode = Episode::new(id, PODCAST, format!("Episode {id}"), format!("https://cdn.example.com/{id}.mp3"))
            .with_feed_duration(feed_duration)
            .with_published_at(published);
        self.store.insert_episode(episode).unwrap();
        EpisodeId::new(id)
    }

    /// Let the manager drain everything already posted to it
    pub async fn settle(&self) {
        for _ in 0..3 {
            self.handle.diagnostics().await.unwrap();
        }
    }

    pub async fn record(&self, id: &str) -> Option<PlaybackRecord> {
        self.store.get_record(&EpisodeId::new(id)).await.unwrap()
    }

    pub async fn stored_episode(&self, id: &str) -> Episode {
        self.store
            .get_episode(&EpisodeId::new(id))
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn podcast(&self) -> Podcast {
        self.store
            .get_podcast(&PodcastId::new(PODCAST))
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn queue(&self) -> Vec<String> {
        self.handle
            .queue()
            .queued_ids()
            .await
            .unwrap()
            .into_iter()
            .map(|id| id.to_string())
            .collect()
    }

    /// Start an episode and wait until it is playing
    pub async fn play(&self, id: &str) {
        self.handle.toggle(id).await.unwrap();
        self.settle().await;
    }
}

/// Drain events currently buffered on a receiver
pub fn drain(rx: &mut broadcast::Receiver<PlaybackEvent>) -> Vec<PlaybackEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
