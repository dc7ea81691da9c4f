use crate::epoch::epoch_ms_from_value;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Row exactly as delivered by the remote source.
pub type RawRow = serde_json::Map<String, Value>;

/// Rows scanned when inferring the horizon set of a full snapshot.
pub const HORIZON_SCAN_ROWS: usize = 30;

/// Multiplier from decimal returns to basis points.
const BPS_PER_UNIT: f64 = 10_000.0;

/// Value unit of a prediction stream.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Deserialize, Serialize)]
pub enum ValueUnit {
    /// Values are already expressed in basis points.
    #[default]
    Bps,
    /// Values are decimal returns (0.0001 == 1bp).
    Decimal,
}

impl ValueUnit {
    /// Parse the `unit` tag of a payload.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "bps" | "bp" | "basis_points" => Some(ValueUnit::Bps),
            "decimal" | "ret" | "return" | "fraction" => Some(ValueUnit::Decimal),
            _ => None,
        }
    }

    /// Detect the unit from field names when no tag is supplied.
    ///
    /// Decimal-only payloads (`pred_ret_{h}` without any `pred_bps_{h}`) resolve to
    /// [`ValueUnit::Decimal`].
    pub fn detect<'a>(rows: impl IntoIterator<Item = &'a RawRow>) -> Option<Self> {
        let (mut bps, mut decimal) = (false, false);
        for row in rows.into_iter().take(HORIZON_SCAN_ROWS) {
            for key in row.keys() {
                match HorizonField::parse(key) {
                    Some(HorizonField::Bps(_)) => bps = true,
                    Some(HorizonField::Decimal(_)) => decimal = true,
                    _ => {}
                }
            }
        }
        match (bps, decimal) {
            (false, true) => Some(ValueUnit::Decimal),
            (true, _) => Some(ValueUnit::Bps),
            (false, false) => None,
        }
    }

    fn to_bps(self, value: f64) -> f64 {
        match self {
            ValueUnit::Bps => value,
            ValueUnit::Decimal => value * BPS_PER_UNIT,
        }
    }
}

/// Horizon-encoding field names understood on prediction rows.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum HorizonField {
    /// `pred_bps_{h}`, always basis points.
    Bps(u32),
    /// `pred_ret_{h}`, always a decimal return.
    Decimal(u32),
    /// `pred_{h}`, unit given by the stream's [`ValueUnit`].
    Unitless(u32),
}

impl HorizonField {
    fn parse(key: &str) -> Option<Self> {
        let rest = key.strip_prefix("pred_")?;
        if let Some(horizon) = rest.strip_prefix("bps_") {
            parse_horizon(horizon).map(HorizonField::Bps)
        } else if let Some(horizon) = rest.strip_prefix("ret_") {
            parse_horizon(horizon).map(HorizonField::Decimal)
        } else {
            parse_horizon(rest).map(HorizonField::Unitless)
        }
    }

    fn horizon(&self) -> u32 {
        match self {
            HorizonField::Bps(h) | HorizonField::Decimal(h) | HorizonField::Unitless(h) => *h,
        }
    }
}

fn parse_horizon(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Collect the distinct horizons encoded in the field names of the first
/// [`HORIZON_SCAN_ROWS`] rows.
pub fn infer_horizons<'a>(rows: impl IntoIterator<Item = &'a RawRow>) -> BTreeSet<u32> {
    rows.into_iter()
        .take(HORIZON_SCAN_ROWS)
        .flat_map(|row| row.keys().filter_map(|key| HorizonField::parse(key)))
        .map(|field| field.horizon())
        .collect()
}

/// Ordered candidate field names for one logical field.
///
/// Candidates are tried in order and the first numeric hit wins, so feeds that rename a
/// field stay readable without scattering fallbacks through the renderer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FieldAccessor {
    pub name: &'static str,
    pub candidates: &'static [&'static str],
}

impl FieldAccessor {
    pub const TIMESTAMP: FieldAccessor = FieldAccessor {
        name: "timestamp",
        candidates: &["epoch_ms", "ts_ms", "timestamp_ms", "ts", "timestamp", "time", "epoch"],
    };
    pub const BID_PRICE: FieldAccessor = FieldAccessor {
        name: "bid",
        candidates: &["bid", "best_bid", "bid_px", "bid_price", "b"],
    };
    pub const ASK_PRICE: FieldAccessor = FieldAccessor {
        name: "ask",
        candidates: &["ask", "best_ask", "ask_px", "ask_price", "a"],
    };
    pub const BID_SIZE: FieldAccessor = FieldAccessor {
        name: "bid_size",
        candidates: &["bid_qty", "bid_size", "bid_sz", "bid_amount"],
    };
    pub const ASK_SIZE: FieldAccessor = FieldAccessor {
        name: "ask_size",
        candidates: &["ask_qty", "ask_size", "ask_sz", "ask_amount"],
    };
    pub const MID_PRICE: FieldAccessor = FieldAccessor {
        name: "mid",
        candidates: &["mid", "mid_px", "mid_price", "mark"],
    };
    pub const LAST_PRICE: FieldAccessor = FieldAccessor {
        name: "last",
        candidates: &["last", "last_px", "price", "close", "px"],
    };

    /// First candidate present on the row, whatever its type.
    pub fn value<'a>(&self, fields: &'a RawRow) -> Option<&'a Value> {
        self.candidates.iter().find_map(|key| fields.get(*key))
    }

    /// First candidate that resolves to a finite number (numeric strings included).
    pub fn number(&self, fields: &RawRow) -> Option<f64> {
        self.candidates
            .iter()
            .filter_map(|key| fields.get(*key))
            .find_map(value_as_f64)
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// One instant of one stream, keyed by its canonical millisecond timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub ts_ms: i64,
    /// Predictions in basis points keyed by horizon, resolved once at ingestion.
    pub predictions: BTreeMap<u32, f64>,
    pub fields: RawRow,
}

impl Row {
    /// Canonicalise a raw row. Returns `None` when no candidate timestamp normalises.
    pub fn from_raw(fields: RawRow, unit: ValueUnit) -> Option<Self> {
        let ts_ms = FieldAccessor::TIMESTAMP
            .candidates
            .iter()
            .filter_map(|key| fields.get(*key))
            .find_map(epoch_ms_from_value)?;

        // Explicit bps beats explicit decimal beats unitless for the same horizon.
        let mut ranked: BTreeMap<u32, (u8, f64)> = BTreeMap::new();
        for (key, value) in &fields {
            let (Some(field), Some(value)) = (HorizonField::parse(key), value_as_f64(value))
            else {
                continue;
            };
            let (rank, bps) = match field {
                HorizonField::Bps(_) => (2, value),
                HorizonField::Decimal(_) => (1, ValueUnit::Decimal.to_bps(value)),
                HorizonField::Unitless(_) => (0, unit.to_bps(value)),
            };
            match ranked.get(&field.horizon()) {
                Some((existing, _)) if *existing >= rank => {}
                _ => {
                    ranked.insert(field.horizon(), (rank, bps));
                }
            }
        }
        let predictions = ranked
            .into_iter()
            .map(|(horizon, (_, bps))| (horizon, bps))
            .collect();

        Some(Self {
            ts_ms,
            predictions,
            fields,
        })
    }

    pub fn prediction(&self, horizon: u32) -> Option<f64> {
        self.predictions.get(&horizon).copied()
    }

    pub fn horizons(&self) -> impl Iterator<Item = u32> + '_ {
        self.predictions.keys().copied()
    }

    pub fn field(&self, accessor: &FieldAccessor) -> Option<f64> {
        accessor.number(&self.fields)
    }

    pub fn bid(&self) -> Option<f64> {
        self.field(&FieldAccessor::BID_PRICE)
    }

    pub fn ask(&self) -> Option<f64> {
        self.field(&FieldAccessor::ASK_PRICE)
    }

    /// Mid price, falling back to the bid/ask midpoint and then the last trade price.
    pub fn mid(&self) -> Option<f64> {
        self.field(&FieldAccessor::MID_PRICE)
            .or_else(|| match (self.bid(), self.ask()) {
                (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
                _ => None,
            })
            .or_else(|| self.field(&FieldAccessor::LAST_PRICE))
    }

    /// Quoted spread in basis points of mid.
    pub fn spread_bps(&self) -> Option<f64> {
        let (bid, ask) = (self.bid()?, self.ask()?);
        let mid = (bid + ask) / 2.0;
        (mid > 0.0).then(|| (ask - bid) / mid * BPS_PER_UNIT)
    }
}
