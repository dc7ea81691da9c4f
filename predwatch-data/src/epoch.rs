//! Canonical millisecond epochs.
//!
//! Feeds mix second, millisecond, microsecond and nanosecond encodings. The unit is
//! inferred from magnitude alone, so the thresholds below decide which encoding a raw
//! number belongs to:
//!
//! | raw value         | assumed unit | conversion   |
//! |-------------------|--------------|--------------|
//! | `> 1e17`          | nanoseconds  | `/ 1e6`      |
//! | `> 1e14`          | microseconds | `/ 1e3`      |
//! | `> 1e11`          | milliseconds | as is        |
//! | otherwise         | seconds      | `* 1e3`      |

use chrono::DateTime;
use serde_json::Value;

const NANOS_THRESHOLD: f64 = 1e17;
const MICROS_THRESHOLD: f64 = 1e14;
const MILLIS_THRESHOLD: f64 = 1e11;

/// Normalise a raw epoch of unknown unit into integer milliseconds.
///
/// Returns `None` for non-finite or non-positive input; callers skip such rows.
pub fn normalize_epoch_ms(raw: f64) -> Option<i64> {
    if !raw.is_finite() || raw <= 0.0 {
        return None;
    }

    let millis = if raw > NANOS_THRESHOLD {
        raw / 1e6
    } else if raw > MICROS_THRESHOLD {
        raw / 1e3
    } else if raw > MILLIS_THRESHOLD {
        raw
    } else {
        raw * 1e3
    };

    let rounded = millis.round();
    (rounded >= 1.0 && rounded < i64::MAX as f64).then_some(rounded as i64)
}

/// Normalise a JSON timestamp value.
///
/// Accepts numbers, numeric strings and RFC 3339 strings.
pub fn epoch_ms_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => normalize_epoch_ms(number.as_f64()?),
        Value::String(text) => {
            let text = text.trim();
            match text.parse::<f64>() {
                Ok(raw) => normalize_epoch_ms(raw),
                Err(_) => DateTime::parse_from_rfc3339(text)
                    .ok()
                    .map(|time| time.timestamp_millis())
                    .filter(|millis| *millis > 0),
            }
        }
        _ => None,
    }
}

/// Interpret an authoritative watermark that is already expressed in milliseconds.
pub fn watermark_ms(raw: f64) -> Option<i64> {
    (raw.is_finite() && raw >= 0.0 && raw < i64::MAX as f64).then(|| raw.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_epoch_ms() {
        struct TestCase {
            input: f64,
            expected: Option<i64>,
        }

        let tests = vec![
            TestCase {
                // TC0: seconds
                input: 1_700_000_000.0,
                expected: Some(1_700_000_000_000),
            },
            TestCase {
                // TC1: fractional seconds round to the nearest ms
                input: 1_700_000_000.2346,
                expected: Some(1_700_000_000_235),
            },
            TestCase {
                // TC2: milliseconds
                input: 1_700_000_000_123.0,
                expected: Some(1_700_000_000_123),
            },
            TestCase {
                // TC3: microseconds
                input: 1_700_000_000_123_456.0,
                expected: Some(1_700_000_000_123),
            },
            TestCase {
                // TC4: nanoseconds
                input: 1_700_000_000_123_456_789.0,
                expected: Some(1_700_000_000_123),
            },
            TestCase {
                // TC5: zero is invalid
                input: 0.0,
                expected: None,
            },
            TestCase {
                // TC6: negative is invalid
                input: -1_700_000_000.0,
                expected: None,
            },
            TestCase {
                // TC7: NaN is invalid
                input: f64::NAN,
                expected: None,
            },
            TestCase {
                // TC8: infinity is invalid
                input: f64::INFINITY,
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = normalize_epoch_ms(test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_normalize_epoch_ms_threshold_boundaries() {
        struct TestCase {
            input: f64,
            expected: Option<i64>,
        }

        let tests = vec![
            TestCase {
                // TC0: exactly 1e11 is still seconds
                input: 1e11,
                expected: Some(100_000_000_000_000),
            },
            TestCase {
                // TC1: just above 1e11 is milliseconds
                input: 100_000_000_001.0,
                expected: Some(100_000_000_001),
            },
            TestCase {
                // TC2: exactly 1e14 is still milliseconds
                input: 1e14,
                expected: Some(100_000_000_000_000),
            },
            TestCase {
                // TC3: just above 1e14 is microseconds
                input: 100_000_000_000_500.0,
                expected: Some(100_000_000_001),
            },
            TestCase {
                // TC4: exactly 1e17 is still microseconds
                input: 1e17,
                expected: Some(100_000_000_000_000),
            },
            TestCase {
                // TC5: just above 1e17 is nanoseconds
                input: 100_000_000_000_000_512.0,
                expected: Some(100_000_000_000),
            },
            TestCase {
                // TC6: tiny positive seconds value
                input: 0.0004,
                expected: None,
            },
            TestCase {
                // TC7: 0.0006 s rounds up to 1 ms
                input: 0.0006,
                expected: Some(1),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = normalize_epoch_ms(test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_epoch_ms_from_value() {
        assert_eq!(epoch_ms_from_value(&json!(1_700_000_000)), Some(1_700_000_000_000));
        assert_eq!(epoch_ms_from_value(&json!("1700000000123")), Some(1_700_000_000_123));
        assert_eq!(
            epoch_ms_from_value(&json!("2023-11-14T22:13:20.5Z")),
            Some(1_700_000_000_500)
        );
        assert_eq!(epoch_ms_from_value(&json!("yesterday")), None);
        assert_eq!(epoch_ms_from_value(&json!(null)), None);
        assert_eq!(epoch_ms_from_value(&json!(true)), None);
    }

    #[test]
    fn test_watermark_ms() {
        assert_eq!(watermark_ms(5000.0), Some(5000));
        assert_eq!(watermark_ms(0.0), Some(0));
        assert_eq!(watermark_ms(-1.0), None);
        assert_eq!(watermark_ms(f64::NAN), None);
    }
}
