//! Castaway Core
//!
//! Platform-agnostic core types, traits, and error handling for Castaway.
//!
//! This crate provides the foundational building blocks shared by the
//! storage layer, the playback core, and the applications.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Episode`, `Podcast`, `PlaybackRecord`
//! - **Write Batches**: `WriteOp` / `WriteBatch`, the unit of transactional persistence
//! - **Core Traits**: `PlaybackStore`
//! - **Error Handling**: Unified `CastError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use cast_core::types::{EpisodeId, WriteBatch};
//!
//! let episode = EpisodeId::new("ep-42");
//!
//! let mut batch = WriteBatch::new();
//! batch.set_position(&episode, 754.5);
//! batch.enqueue(&episode, 0);
//!
//! assert_eq!(batch.len(), 2);
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use error::{CastError, Result};
pub use storage::PlaybackStore;

pub use types::{
    Episode, EpisodeId, PlaybackRecord, Podcast, PodcastId, WriteBatch, WriteOp,
    NOT_QUEUED,
};
