//! # Predwatch-Data
//! Live, bounded, multi-stream time-series state for three independently paced feeds:
//! - `hft` fast-horizon predictions
//! - `idt` slow-horizon predictions
//! - market snapshots
//!
//! Each feed is delivered either as a full snapshot or as a delta referenced to a client
//! held watermark. This crate owns the synchronisation and merge core:
//! - [`epoch`]: canonicalises second/ms/µs/ns timestamps into epoch milliseconds.
//! - [`store`]: bounded, deduplicated-by-timestamp [`StreamStore`] per feed.
//! - [`cursor`]: one monotonic watermark per feed plus the `since` clamp policy.
//! - [`merge`]: full-replace and delta ingestion into a [`FeedContext`].
//! - [`timeline`]: the shared, strictly increasing x-axis across all feeds.
//! - [`scheduler`]: non-overlapping, self-rescheduling poll loop over a [`FeedSource`].
//!
//! ## Example
//! ```rust,no_run
//! use predwatch_data::{FeedConfig, FeedContext, HttpFeedClient, PollScheduler};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = FeedConfig::from_env();
//!     let context = FeedContext::shared(config.symbol.clone(), config.capacity);
//!     let client = HttpFeedClient::new(&config).expect("valid base url");
//!
//!     let (handle, mut events) = PollScheduler::new(Arc::new(client), context.clone(), config).start();
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!     handle.stop();
//! }
//! ```

/// Non-2xx diagnostics and the [`FeedError`] taxonomy.
pub mod error;

/// Epoch Normalizer: magnitude based second/ms/µs/ns detection.
pub mod epoch;

/// [`StreamKind`] identity and the fixed-size [`StreamMap`].
pub mod stream;

/// Canonical [`Row`] model, horizon maps and field accessor chains.
pub mod row;

/// Bounded per-stream row storage.
pub mod store;

/// Per-stream watermarks and the fetch-bound clamp.
pub mod cursor;

/// Full-replace and delta ingestion protocols.
pub mod merge;

/// Sorted union of timestamps across every store.
pub mod timeline;

/// Explicit owner of all stores and cursors for one symbol.
pub mod context;

/// Remote source contract and its HTTP implementation.
pub mod client;

/// Environment driven [`FeedConfig`].
pub mod config;

/// Non-overlapping poll loop.
pub mod scheduler;

pub use client::{FeedSource, HttpFeedClient};
pub use config::FeedConfig;
pub use context::{FeedContext, SharedContext};
pub use cursor::{Cursor, CursorRegistry};
pub use epoch::normalize_epoch_ms;
pub use error::{ErrorBody, FeedError};
pub use merge::FeedPayload;
pub use row::{FieldAccessor, Row, ValueUnit};
pub use scheduler::{CycleKind, CycleReport, FeedEvent, PollHandle, PollScheduler, PollStatus, StreamOutcome};
pub use store::{StreamStore, DEFAULT_CAPACITY};
pub use stream::{StreamKind, StreamMap};
pub use timeline::{Timeline, build_timeline};
