//! Merge Engine.
//!
//! Two entry protocols per stream:
//! - **full replace**: discard the store and rebuild it from a snapshot.
//! - **delta merge**: upsert rows newer than the watermark and evict the oldest overflow.
//!
//! Rows whose timestamp cannot be normalised are dropped without failing the batch.
//! Cursors only ever move forward.

use crate::{
    context::FeedContext,
    epoch::watermark_ms,
    row::{RawRow, Row, ValueUnit, infer_horizons},
    stream::StreamKind,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Response body of every latest/delta endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FeedPayload {
    /// Non-object entries are tolerated on the wire and skipped during ingestion.
    #[serde(default)]
    pub rows: Vec<Value>,
    #[serde(default)]
    pub horizons: Option<Vec<u32>>,
    #[serde(default)]
    pub unit: Option<String>,
    /// Feed's authoritative watermark in milliseconds, present even without rows.
    #[serde(default)]
    pub max_epoch_ms: Option<f64>,
}

impl FeedPayload {
    pub fn from_rows(rows: impl IntoIterator<Item = Value>) -> Self {
        Self {
            rows: rows.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_max_epoch_ms(mut self, max_epoch_ms: f64) -> Self {
        self.max_epoch_ms = Some(max_epoch_ms);
        self
    }

    pub fn with_horizons(mut self, horizons: impl IntoIterator<Item = u32>) -> Self {
        self.horizons = Some(horizons.into_iter().collect());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    fn into_raw_rows(self) -> (Vec<RawRow>, PayloadMeta) {
        let rows = self
            .rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(fields) => Some(fields),
                _ => None,
            })
            .collect();
        let meta = PayloadMeta {
            horizons: self.horizons,
            unit: self.unit,
            max_epoch_ms: self.max_epoch_ms.and_then(watermark_ms),
        };
        (rows, meta)
    }
}

struct PayloadMeta {
    horizons: Option<Vec<u32>>,
    unit: Option<String>,
    max_epoch_ms: Option<i64>,
}

impl FeedContext {
    /// Replace the store of `stream` with `payload` and return the number of valid rows.
    ///
    /// The cursor moves to the timestamp of the last valid row in arrival order, per the
    /// feed's ordering contract, and never below its current value. An empty payload
    /// leaves an empty store and an unchanged cursor.
    pub fn ingest_full(&mut self, stream: StreamKind, payload: FeedPayload) -> usize {
        let (rows, meta) = payload.into_raw_rows();
        let store = &mut self.stores[stream];
        store.clear();

        let unit = resolve_unit(meta.unit.as_deref(), None, &rows);
        if stream.is_prediction() {
            store.set_unit(unit);
            match meta.horizons {
                Some(horizons) => store.extend_horizons(horizons),
                None => store.extend_horizons(infer_horizons(&rows)),
            }
        }

        let total = rows.len();
        let mut admitted = 0;
        let mut last_row_ms = None;
        for row in rows.into_iter().filter_map(|raw| Row::from_raw(raw, unit)) {
            last_row_ms = Some(row.ts_ms);
            store.upsert(row);
            admitted += 1;
        }
        let evicted = store.evict_overflow();

        if let Some(last_row_ms) = last_row_ms {
            self.cursors.advance(stream, last_row_ms);
        }

        debug!(
            %stream,
            total,
            admitted,
            evicted,
            cursor = self.cursors.last_ms(stream),
            "ingested full snapshot"
        );
        admitted
    }

    /// Merge `payload` into the store of `stream` and return the number of rows admitted.
    ///
    /// The cursor advances to `max(prior, payload max)` when the feed supplies its own
    /// watermark, otherwise to `max(prior, batch max, last row, store max)`. An empty batch
    /// with a watermark still advances, so an exhausted window is not requested forever.
    /// Without one the cursor still catches up to the newest stored row, which a full
    /// replace delivered out of order can leave ahead of it.
    pub fn ingest_delta(&mut self, stream: StreamKind, payload: FeedPayload) -> usize {
        let (rows, meta) = payload.into_raw_rows();
        let store = &mut self.stores[stream];

        let unit = resolve_unit(meta.unit.as_deref(), store.unit(), &rows);
        if stream.is_prediction() {
            store.set_unit(unit);
            match meta.horizons {
                Some(horizons) => store.extend_horizons(horizons),
                None => store.extend_horizons(infer_horizons(&rows)),
            }
        }

        let total = rows.len();
        let mut admitted = 0;
        let mut batch_max_ms = None;
        let mut last_row_ms = None;
        for row in rows.into_iter().filter_map(|raw| Row::from_raw(raw, unit)) {
            batch_max_ms = batch_max_ms.max(Some(row.ts_ms));
            last_row_ms = Some(row.ts_ms);
            store.upsert(row);
            admitted += 1;
        }
        let evicted = store.evict_overflow();

        let local_max_ms = batch_max_ms.max(last_row_ms).max(store.last_ts());
        let candidate = meta.max_epoch_ms.or(local_max_ms);
        if let Some(candidate) = candidate {
            self.cursors.advance(stream, candidate);
        }

        debug!(
            %stream,
            total,
            admitted,
            evicted,
            cursor = self.cursors.last_ms(stream),
            "merged delta"
        );
        admitted
    }
}

/// Payload tag first, then the unit already resolved for the store, then field-name
/// detection, defaulting to basis points.
fn resolve_unit(tag: Option<&str>, current: Option<ValueUnit>, rows: &[RawRow]) -> ValueUnit {
    tag.and_then(ValueUnit::from_tag)
        .or(current)
        .or_else(|| ValueUnit::detect(rows))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    const BASE: i64 = 1_700_000_000_000;

    fn context() -> FeedContext {
        FeedContext::new("BTCUSDT", 3000)
    }

    #[test]
    fn test_delta_single_row_on_empty_store() {
        let mut context = context();
        let payload = FeedPayload::from_rows([json!({"epoch_ms": 1000, "pred_bps_250": 1.5})])
            .with_max_epoch_ms(1000.0);

        let added = context.ingest_delta(StreamKind::Hft, payload);

        assert_eq!(added, 1);
        assert_eq!(context.store(StreamKind::Hft).len(), 1);
        assert_eq!(context.last_ms(StreamKind::Hft), 1000);
    }

    #[test]
    fn test_delta_empty_batch_with_watermark_advances_cursor() {
        let mut context = context();
        context.ingest_delta(StreamKind::Idt, FeedPayload::default().with_max_epoch_ms(3000.0));
        assert_eq!(context.last_ms(StreamKind::Idt), 3000);

        let added = context.ingest_delta(StreamKind::Idt, FeedPayload::default().with_max_epoch_ms(5000.0));

        assert_eq!(added, 0);
        assert_eq!(context.last_ms(StreamKind::Idt), 5000);
        assert!(context.store(StreamKind::Idt).is_empty());
    }

    #[test]
    fn test_delta_empty_batch_without_watermark_keeps_cursor() {
        let mut context = context();
        context.ingest_delta(StreamKind::Hft, FeedPayload::default().with_max_epoch_ms(3000.0));
        assert_eq!(context.ingest_delta(StreamKind::Hft, FeedPayload::default()), 0);
        assert_eq!(context.last_ms(StreamKind::Hft), 3000);
    }

    #[test]
    fn test_delta_cursor_sources() {
        struct TestCase {
            prior: i64,
            rows: Vec<Value>,
            max_epoch_ms: Option<f64>,
            expected_added: usize,
            expected_cursor: i64,
        }

        let tests = vec![
            TestCase {
                // TC0: no watermark, falls back to batch max (rows out of order)
                prior: 0,
                rows: vec![json!({"epoch_ms": BASE + 20}), json!({"epoch_ms": BASE + 10})],
                max_epoch_ms: None,
                expected_added: 2,
                expected_cursor: BASE + 20,
            },
            TestCase {
                // TC1: watermark preferred over local rows
                prior: 0,
                rows: vec![json!({"epoch_ms": BASE + 10})],
                max_epoch_ms: Some((BASE + 50) as f64),
                expected_added: 1,
                expected_cursor: BASE + 50,
            },
            TestCase {
                // TC2: stale watermark never lowers the cursor
                prior: BASE + 100,
                rows: vec![json!({"epoch_ms": BASE + 10})],
                max_epoch_ms: Some((BASE + 5) as f64),
                expected_added: 1,
                expected_cursor: BASE + 100,
            },
            TestCase {
                // TC3: stale rows never lower the cursor
                prior: BASE + 100,
                rows: vec![json!({"epoch_ms": BASE + 1}), json!({"epoch_ms": BASE + 2})],
                max_epoch_ms: None,
                expected_added: 2,
                expected_cursor: BASE + 100,
            },
            TestCase {
                // TC4: malformed rows dropped and not counted
                prior: 0,
                rows: vec![
                    json!({"epoch_ms": -1}),
                    json!({"pred_bps_250": 1.0}),
                    json!("not-a-row"),
                    json!({"epoch_ms": BASE + 7}),
                ],
                max_epoch_ms: None,
                expected_added: 1,
                expected_cursor: BASE + 7,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let mut context = context();
            context.cursors.advance(StreamKind::Hft, test.prior);
            let mut payload = FeedPayload::from_rows(test.rows);
            payload.max_epoch_ms = test.max_epoch_ms;

            let added = context.ingest_delta(StreamKind::Hft, payload);
            assert_eq!(added, test.expected_added, "TC{} added failed", index);
            assert_eq!(
                context.last_ms(StreamKind::Hft),
                test.expected_cursor,
                "TC{} cursor failed",
                index
            );
        }
    }

    #[test]
    fn test_delta_is_idempotent_for_repeated_rows() {
        let row = json!({"epoch_ms": BASE, "pred_bps_250": 1.5, "pred_bps_1000": -0.5});

        let mut once = context();
        once.ingest_delta(StreamKind::Hft, FeedPayload::from_rows([row.clone()]));

        let mut twice = context();
        twice.ingest_delta(StreamKind::Hft, FeedPayload::from_rows([row.clone()]));
        twice.ingest_delta(StreamKind::Hft, FeedPayload::from_rows([row]));

        assert_eq!(once.store(StreamKind::Hft), twice.store(StreamKind::Hft));
        assert_eq!(once.cursors(), twice.cursors());
    }

    #[test]
    fn test_delta_later_row_replaces_earlier_at_same_ms() {
        let mut context = context();
        context.ingest_delta(
            StreamKind::Hft,
            FeedPayload::from_rows([json!({"epoch_ms": BASE, "pred_bps_250": 1.0})]),
        );
        // Same instant in seconds with sub-ms noise canonicalises to the same key
        context.ingest_delta(
            StreamKind::Hft,
            FeedPayload::from_rows([json!({"ts": 1_700_000_000.0001, "pred_bps_250": 2.0})]),
        );

        let store = context.store(StreamKind::Hft);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(BASE).and_then(|row| row.prediction(250)), Some(2.0));
    }

    #[test]
    fn test_delta_horizons_union() {
        let mut context = context();
        context.ingest_delta(
            StreamKind::Idt,
            FeedPayload::from_rows([json!({"epoch_ms": BASE, "pred_bps_60000": 1.0})]),
        );
        context.ingest_delta(
            StreamKind::Idt,
            FeedPayload::from_rows([json!({"epoch_ms": BASE + 1})]).with_horizons([300_000]),
        );

        assert_eq!(
            context.store(StreamKind::Idt).horizons(),
            &BTreeSet::from([60_000, 300_000])
        );
    }

    #[test]
    fn test_delta_sequential_ingests_keep_latest_capacity() {
        let mut context = context();
        for i in 0..3500 {
            let added = context.ingest_delta(
                StreamKind::Hft,
                FeedPayload::from_rows([json!({"epoch_ms": BASE + i, "pred_bps_250": 0.1})]),
            );
            assert_eq!(added, 1);
        }

        let store = context.store(StreamKind::Hft);
        assert_eq!(store.len(), 3000);
        assert_eq!(store.first_ts(), Some(BASE + 500));
        assert_eq!(store.last_ts(), Some(BASE + 3499));
        assert!(store.timestamps().eq(BASE + 500..BASE + 3500));
        assert_eq!(context.last_ms(StreamKind::Hft), BASE + 3499);
    }

    #[test]
    fn test_full_replace_discards_previous_store() {
        let mut context = context();
        context.ingest_delta(
            StreamKind::Hft,
            FeedPayload::from_rows([json!({"epoch_ms": BASE, "pred_bps_250": 1.0})]),
        );

        let added = context.ingest_full(
            StreamKind::Hft,
            FeedPayload::from_rows([
                json!({"epoch_ms": BASE + 10, "pred_bps_1000": 1.0}),
                json!({"epoch_ms": BASE + 20, "pred_bps_1000": 2.0}),
            ]),
        );

        let store = context.store(StreamKind::Hft);
        assert_eq!(added, 2);
        assert_eq!(store.timestamps().collect::<Vec<_>>(), vec![BASE + 10, BASE + 20]);
        assert_eq!(store.horizons(), &BTreeSet::from([1000]));
        assert_eq!(context.last_ms(StreamKind::Hft), BASE + 20);
    }

    #[test]
    fn test_full_replace_cursor_uses_last_row_not_max() {
        let mut context = context();
        context.ingest_full(
            StreamKind::Idt,
            FeedPayload::from_rows([
                json!({"epoch_ms": BASE + 30}),
                json!({"epoch_ms": BASE + 10}),
            ]),
        );
        assert_eq!(context.last_ms(StreamKind::Idt), BASE + 10);
    }

    #[test]
    fn test_delta_without_watermark_catches_up_to_store_max() {
        let mut context = context();
        context.ingest_full(
            StreamKind::Idt,
            FeedPayload::from_rows([
                json!({"epoch_ms": BASE + 30}),
                json!({"epoch_ms": BASE + 10}),
            ]),
        );
        assert_eq!(context.last_ms(StreamKind::Idt), BASE + 10);

        let added = context.ingest_delta(StreamKind::Idt, FeedPayload::default());

        assert_eq!(added, 0);
        assert_eq!(context.last_ms(StreamKind::Idt), BASE + 30);
    }

    #[test]
    fn test_full_replace_empty_rows() {
        let mut context = context();
        context.cursors.advance(StreamKind::Snapshot, BASE);
        context.ingest_delta(
            StreamKind::Snapshot,
            FeedPayload::from_rows([json!({"epoch_ms": BASE, "mid": 1.0})]),
        );

        let added = context.ingest_full(StreamKind::Snapshot, FeedPayload::default());

        assert_eq!(added, 0);
        assert!(context.store(StreamKind::Snapshot).is_empty());
        assert_eq!(context.last_ms(StreamKind::Snapshot), BASE);
    }

    #[test]
    fn test_full_replace_decimal_unit_derives_bps() {
        let mut context = context();
        context.ingest_full(
            StreamKind::Hft,
            FeedPayload::from_rows([json!({"epoch_ms": BASE, "pred_250": 0.00015})]).with_unit("decimal"),
        );
        // Later deltas without a tag keep the resolved unit
        context.ingest_delta(
            StreamKind::Hft,
            FeedPayload::from_rows([json!({"epoch_ms": BASE + 1, "pred_250": 0.0002})]),
        );

        let store = context.store(StreamKind::Hft);
        assert_eq!(store.unit(), Some(ValueUnit::Decimal));
        assert!((store.get(BASE).unwrap().prediction(250).unwrap() - 1.5).abs() < 1e-9);
        assert!((store.get(BASE + 1).unwrap().prediction(250).unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_full_replace_bounds_to_capacity() {
        let mut context = FeedContext::new("BTCUSDT", 10);
        let rows = (0..25).map(|i| json!({"epoch_ms": BASE + i}));

        let added = context.ingest_full(StreamKind::Snapshot, FeedPayload::from_rows(rows));

        let store = context.store(StreamKind::Snapshot);
        assert_eq!(added, 25);
        assert_eq!(store.len(), 10);
        assert_eq!(store.first_ts(), Some(BASE + 15));
        assert!(store.horizons().is_empty());
    }

    #[test]
    fn test_payload_deserialises_wire_shape() {
        let payload: FeedPayload = serde_json::from_str(
            r#"{"rows":[{"epoch_ms":1700000000000,"pred_bps_250":1.0}],"unit":"bps","max_epoch_ms":1700000000000}"#,
        )
        .unwrap();
        assert_eq!(payload.rows.len(), 1);
        assert_eq!(payload.max_epoch_ms, Some(1_700_000_000_000.0));
        assert_eq!(payload.horizons, None);

        let empty: FeedPayload = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, FeedPayload::default());
    }
}
