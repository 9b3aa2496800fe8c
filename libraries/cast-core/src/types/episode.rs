/// Episode and podcast types owned by feed ingestion
use super::ids::{EpisodeId, PodcastId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A podcast episode as known from its feed
///
/// Ingestion owns these facts. The playback core only reads them and writes
/// back two derived facts: the measured duration and the "now playing" marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    /// Stable episode identifier
    pub id: EpisodeId,

    /// Owning podcast
    pub podcast_id: PodcastId,

    /// Episode title
    pub title: String,

    /// Enclosure URL handed to the engine
    pub audio_url: String,

    /// Duration declared by the feed, in seconds (0 = unknown)
    pub feed_duration: f64,

    /// Duration measured by the engine, filled in lazily
    pub actual_duration: Option<f64>,

    /// Publication date from the feed
    pub published_at: DateTime<Utc>,
}

impl Episode {
    /// Create an episode with no measured duration
    pub fn new(
        id: impl Into<EpisodeId>,
        podcast_id: impl Into<PodcastId>,
        title: impl Into<String>,
        audio_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            podcast_id: podcast_id.into(),
            title: title.into(),
            audio_url: audio_url.into(),
            feed_duration: 0.0,
            actual_duration: None,
            published_at: Utc::now(),
        }
    }

    /// Set the feed-declared duration
    #[must_use]
    pub fn with_feed_duration(mut self, seconds: f64) -> Self {
        self.feed_duration = seconds;
        self
    }

    /// Set the publication date
    #[must_use]
    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = published_at;
        self
    }

    /// Best known duration: measured if available, else feed-declared
    ///
    /// Returns 0 when neither is known.
    pub fn known_duration(&self) -> f64 {
        match self.actual_duration {
            Some(actual) if actual > 0.0 => actual,
            _ => self.feed_duration.max(0.0),
        }
    }
}

/// A podcast and its listening aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Podcast {
    /// Podcast identifier
    pub id: PodcastId,

    /// Podcast title
    pub title: String,

    /// Number of completed or marked-played episodes
    pub play_count: i64,

    /// Seconds of audio listened to completion
    pub played_seconds: f64,
}

impl Podcast {
    /// Create a podcast with an empty aggregate
    pub fn new(id: impl Into<PodcastId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            play_count: 0,
            played_seconds: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_duration_prefers_measured() {
        let mut episode = Episode::new("ep-1", "pod-1", "Pilot", "https://example.com/1.mp3")
            .with_feed_duration(1200.0);
        assert_eq!(episode.known_duration(), 1200.0);

        episode.actual_duration = Some(1234.5);
        assert_eq!(episode.known_duration(), 1234.5);
    }

    #[test]
    fn known_duration_ignores_zero_measurement() {
        let mut episode = Episode::new("ep-1", "pod-1", "Pilot", "https://example.com/1.mp3");
        episode.actual_duration = Some(0.0);
        assert_eq!(episode.known_duration(), 0.0);
    }
}
