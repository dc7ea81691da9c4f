use crate::stream::{StreamKind, StreamMap};
use serde::{Deserialize, Serialize};

/// Watermark of one stream: the latest millisecond timestamp confirmed received.
///
/// Non-decreasing for the lifetime of a stream identity; only [`CursorRegistry::reset`]
/// moves it back to zero.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct Cursor(i64);

impl Cursor {
    pub fn ms(&self) -> i64 {
        self.0
    }

    /// Advance to `candidate` if it is ahead of the current watermark.
    /// Returns `true` if the cursor moved.
    pub fn advance(&mut self, candidate: i64) -> bool {
        if candidate > self.0 {
            self.0 = candidate;
            true
        } else {
            false
        }
    }
}

/// One [`Cursor`] per stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CursorRegistry {
    cursors: StreamMap<Cursor>,
}

impl CursorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_ms(&self, stream: StreamKind) -> i64 {
        self.cursors[stream].ms()
    }

    pub fn get(&self, stream: StreamKind) -> Cursor {
        self.cursors[stream]
    }

    pub fn advance(&mut self, stream: StreamKind, candidate: i64) -> bool {
        self.cursors[stream].advance(candidate)
    }

    /// Bound a requested `since` to `[0, last known timestamp of stream]`.
    ///
    /// Guards against a drifting clock or a racing caller asking the remote source for
    /// data beyond the stream's own watermark.
    pub fn clamp_since(&self, stream: StreamKind, requested_since: i64) -> i64 {
        requested_since.max(0).min(self.last_ms(stream))
    }

    /// `since` for the next delta fetch of `stream`.
    pub fn next_since(&self, stream: StreamKind) -> i64 {
        self.clamp_since(stream, self.last_ms(stream))
    }

    /// Forget every watermark (symbol change or explicit reset).
    pub fn reset(&mut self) {
        self.cursors = StreamMap::default();
    }

    pub fn iter(&self) -> impl Iterator<Item = (StreamKind, Cursor)> + '_ {
        self.cursors.iter().map(|(stream, cursor)| (stream, *cursor))
    }
}
