use crate::row::{Row, ValueUnit};
use std::collections::{BTreeMap, BTreeSet};

/// Maximum rows retained per stream.
pub const DEFAULT_CAPACITY: usize = 3000;

/// Bounded, deduplicated-by-timestamp row set for one stream.
///
/// The ordered row sequence and the timestamp index are the same `BTreeMap`, so they
/// always share one key set and iterate in ascending timestamp order.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamStore {
    index: BTreeMap<i64, Row>,
    horizons: BTreeSet<u32>,
    unit: Option<ValueUnit>,
    capacity: usize,
}

impl Default for StreamStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl StreamStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            index: BTreeMap::new(),
            horizons: BTreeSet::new(),
            unit: None,
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Rows in ascending timestamp order.
    pub fn rows(&self) -> impl DoubleEndedIterator<Item = &Row> + ExactSizeIterator {
        self.index.values()
    }

    /// Distinct timestamps in ascending order.
    pub fn timestamps(&self) -> impl DoubleEndedIterator<Item = i64> + ExactSizeIterator + '_ {
        self.index.keys().copied()
    }

    pub fn get(&self, ts_ms: i64) -> Option<&Row> {
        self.index.get(&ts_ms)
    }

    pub fn first_ts(&self) -> Option<i64> {
        self.index.first_key_value().map(|(ts, _)| *ts)
    }

    pub fn last_ts(&self) -> Option<i64> {
        self.index.last_key_value().map(|(ts, _)| *ts)
    }

    pub fn latest(&self) -> Option<&Row> {
        self.index.last_key_value().map(|(_, row)| row)
    }

    pub fn horizons(&self) -> &BTreeSet<u32> {
        &self.horizons
    }

    pub fn unit(&self) -> Option<ValueUnit> {
        self.unit
    }

    pub(crate) fn set_unit(&mut self, unit: ValueUnit) {
        self.unit = Some(unit);
    }

    pub(crate) fn extend_horizons(&mut self, horizons: impl IntoIterator<Item = u32>) {
        self.horizons.extend(horizons);
    }

    /// Insert or overwrite the row at its timestamp. Returns the replaced row, if any.
    pub(crate) fn upsert(&mut self, row: Row) -> Option<Row> {
        self.index.insert(row.ts_ms, row)
    }

    /// Evict the oldest rows until the store is back within capacity.
    /// Returns the number of rows evicted.
    pub(crate) fn evict_overflow(&mut self) -> usize {
        let mut evicted = 0;
        while self.index.len() > self.capacity {
            self.index.pop_first();
            evicted += 1;
        }
        evicted
    }

    /// Drop every row, horizon and the resolved unit, keeping the capacity.
    pub(crate) fn clear(&mut self) {
        *self = Self::new(self.capacity);
    }
}
