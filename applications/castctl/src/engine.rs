//! Engine that accepts every command and produces no audio
//!
//! Lets castctl drive the real state machine for bookkeeping commands.

use cast_core::EpisodeId;
use cast_playback::{EngineSignal, EngineSignals, ItemStatus, PlaybackEngine};

pub struct SilentEngine {
    signals: EngineSignals,
    loaded: Option<EpisodeId>,
    rate: f32,
}

impl SilentEngine {
    pub fn new(signals: EngineSignals) -> Self {
        Self {
            signals,
            loaded: None,
            rate: 0.0,
        }
    }

    fn emit(&self, signal: impl FnOnce(EpisodeId) -> EngineSignal) {
        if let Some(id) = &self.loaded {
            self.signals.send(signal(id.clone()));
        }
    }
}

impl PlaybackEngine for SilentEngine {
    fn load(&mut self, episode_id: &EpisodeId, url: &str, start_at: f64) -> cast_playback::Result<()> {
        tracing::debug!(episode_id = %episode_id, url, start_at, "Silent load");
        self.loaded = Some(episode_id.clone());
        self.rate = 0.0;
        self.emit(|episode_id| EngineSignal::StatusChanged {
            episode_id,
            status: ItemStatus::Ready { duration: None },
        });
        Ok(())
    }

    fn play(&mut self, rate: f32) {
        self.rate = rate;
        self.emit(|episode_id| EngineSignal::RateChanged { episode_id, rate });
    }

    fn pause(&mut self) {
        let was_playing = self.rate > 0.0;
        self.rate = 0.0;
        if was_playing {
            self.emit(|episode_id| EngineSignal::RateChanged {
                episode_id,
                rate: 0.0,
            });
        }
    }

    fn seek(&mut self, to: f64) {
        self.emit(|episode_id| EngineSignal::SeekCompleted {
            episode_id,
            position: to,
        });
    }

    fn rate(&self) -> f32 {
        self.rate
    }

    fn teardown(&mut self) {
        self.loaded = None;
        self.rate = 0.0;
    }
}
