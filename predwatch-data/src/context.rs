use crate::{
    cursor::CursorRegistry,
    row::Row,
    store::{DEFAULT_CAPACITY, StreamStore},
    stream::{StreamKind, StreamMap},
    timeline::Timeline,
};
use parking_lot::RwLock;
use smol_str::SmolStr;
use std::sync::Arc;
use tracing::info;

/// [`FeedContext`] shared between the poll loop (sole writer) and the renderer.
pub type SharedContext = Arc<RwLock<FeedContext>>;

/// Owns every [`StreamStore`] and the [`CursorRegistry`] for one symbol.
///
/// The merge entry points ([`FeedContext::ingest_full`], [`FeedContext::ingest_delta`])
/// live in [`crate::merge`].
#[derive(Debug, Clone)]
pub struct FeedContext {
    pub(crate) symbol: SmolStr,
    pub(crate) generation: u64,
    pub(crate) stores: StreamMap<StreamStore>,
    pub(crate) cursors: CursorRegistry,
}

impl Default for FeedContext {
    fn default() -> Self {
        Self::new("BTCUSDT", DEFAULT_CAPACITY)
    }
}

impl FeedContext {
    pub fn new(symbol: impl Into<SmolStr>, capacity: usize) -> Self {
        Self {
            symbol: symbol.into(),
            generation: 0,
            stores: StreamMap::from_fn(|_| StreamStore::new(capacity)),
            cursors: CursorRegistry::new(),
        }
    }

    pub fn shared(symbol: impl Into<SmolStr>, capacity: usize) -> SharedContext {
        Arc::new(RwLock::new(Self::new(symbol, capacity)))
    }

    pub fn symbol(&self) -> &SmolStr {
        &self.symbol
    }

    /// Incremented on every [`FeedContext::reset`]. Results fetched under an older
    /// generation belong to a discarded identity and must not be ingested.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn store(&self, stream: StreamKind) -> &StreamStore {
        &self.stores[stream]
    }

    pub fn cursors(&self) -> &CursorRegistry {
        &self.cursors
    }

    pub fn last_ms(&self, stream: StreamKind) -> i64 {
        self.cursors.last_ms(stream)
    }

    pub fn clamp_since(&self, stream: StreamKind, requested_since: i64) -> i64 {
        self.cursors.clamp_since(stream, requested_since)
    }

    /// Shared x-axis across all three stores.
    pub fn timeline(&self) -> Timeline {
        Timeline::build(self.stores.values())
    }

    /// Row of `stream` at exactly `ts_ms`. `None` means that stream had no update at
    /// that instant; no interpolation or carry-forward happens here.
    pub fn row_at(&self, stream: StreamKind, ts_ms: i64) -> Option<&Row> {
        self.stores[stream].get(ts_ms)
    }

    pub fn prediction_at(&self, stream: StreamKind, ts_ms: i64, horizon: u32) -> Option<f64> {
        self.row_at(stream, ts_ms)?.prediction(horizon)
    }

    pub fn total_rows(&self) -> usize {
        self.stores.values().map(StreamStore::len).sum()
    }

    /// Discard every store and cursor and switch to `symbol`.
    pub fn reset(&mut self, symbol: impl Into<SmolStr>) {
        let symbol = symbol.into();
        info!(from = %self.symbol, to = %symbol, "resetting feed context");

        for stream in StreamKind::ALL {
            self.stores[stream].clear();
        }
        self.cursors.reset();
        self.symbol = symbol;
        self.generation += 1;
    }
}
