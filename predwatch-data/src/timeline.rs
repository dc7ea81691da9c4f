//! Shared x-axis for every chart.
//!
//! The timeline is derived on demand from the current stores and never cached, so it
//! cannot drift out of sync with them. Each store already iterates in ascending order,
//! which makes the union a k-way merge followed by adjacent dedup.

use crate::store::StreamStore;
use itertools::Itertools;
use std::ops::RangeInclusive;

/// Sorted, distinct union of the timestamps of every store.
pub fn build_timeline<'a>(stores: impl IntoIterator<Item = &'a StreamStore>) -> Vec<i64> {
    stores
        .into_iter()
        .map(StreamStore::timestamps)
        .kmerge()
        .dedup()
        .collect()
}

/// Strictly increasing timestamps addressed by index.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Timeline {
    timestamps: Vec<i64>,
}

impl Timeline {
    pub fn build<'a>(stores: impl IntoIterator<Item = &'a StreamStore>) -> Self {
        Self {
            timestamps: build_timeline(stores),
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<i64> {
        self.timestamps.get(index).copied()
    }

    pub fn first(&self) -> Option<i64> {
        self.timestamps.first().copied()
    }

    pub fn last(&self) -> Option<i64> {
        self.timestamps.last().copied()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.timestamps.len().checked_sub(1)
    }

    /// Exact index of `ts_ms`, if present.
    pub fn index_of(&self, ts_ms: i64) -> Option<usize> {
        self.timestamps.binary_search(&ts_ms).ok()
    }

    /// Index of the last timestamp `<= ts_ms`.
    pub fn floor_index(&self, ts_ms: i64) -> Option<usize> {
        self.timestamps
            .partition_point(|ts| *ts <= ts_ms)
            .checked_sub(1)
    }

    /// `(index, timestamp)` pairs inside `range`, clipped to the timeline.
    pub fn window(&self, range: RangeInclusive<usize>) -> impl Iterator<Item = (usize, i64)> + '_ {
        let start = (*range.start()).min(self.timestamps.len());
        let end = range.end().saturating_add(1).min(self.timestamps.len()).max(start);
        self.timestamps[start..end]
            .iter()
            .enumerate()
            .map(move |(offset, ts)| (start + offset, *ts))
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.timestamps
    }
}
