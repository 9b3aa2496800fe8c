mod batch;
mod episode;
mod ids;
mod record;

pub use batch::{WriteBatch, WriteOp};
pub use episode::{Episode, Podcast};
pub use ids::{EpisodeId, PodcastId};
pub use record::{PlaybackRecord, NOT_QUEUED};
