use smol_str::SmolStr;

/// Zoom factor applied to the span when zooming in.
pub const ZOOM_IN_FACTOR: f64 = 0.85;

/// Zoom factor applied to the span when zooming out.
pub const ZOOM_OUT_FACTOR: f64 = 1.15;

/// Interaction parameters shared by every [`ViewWindow`](crate::view::ViewWindow).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewConfig {
    /// Span in indices of a freshly reset, right-anchored window
    pub default_span: f64,
    /// Smallest span a zoom may reach
    pub min_span: f64,
    pub zoom_in: f64,
    pub zoom_out: f64,
    /// Swap scroll directions for zooming
    pub invert_zoom: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            default_span: 300.0,
            min_span: 20.0,
            zoom_in: ZOOM_IN_FACTOR,
            zoom_out: ZOOM_OUT_FACTOR,
            invert_zoom: false,
        }
    }
}

impl ViewConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| {
            lookup(key)
                .and_then(|value| value.trim().parse::<f64>().ok())
                .filter(|value| value.is_finite() && *value >= 1.0)
        };

        let min_span = parse("PREDWATCH_MIN_SPAN").unwrap_or(defaults.min_span);
        Self {
            default_span: parse("PREDWATCH_DEFAULT_SPAN")
                .unwrap_or(defaults.default_span)
                .max(min_span),
            min_span,
            invert_zoom: lookup("PREDWATCH_INVERT_ZOOM")
                .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
                .unwrap_or(defaults.invert_zoom),
            ..defaults
        }
    }

    /// Span multiplier for a zoom gesture, honouring [`ViewConfig::invert_zoom`].
    pub fn zoom_factor(&self, zoom_in: bool) -> f64 {
        if zoom_in != self.invert_zoom {
            self.zoom_in
        } else {
            self.zoom_out
        }
    }
}

/// Symbols cycled through with `s`. The active symbol always comes first.
pub fn symbols_from_env(active: &SmolStr) -> Vec<SmolStr> {
    parse_symbols(std::env::var("PREDWATCH_SYMBOLS").ok().as_deref(), active)
}

fn parse_symbols(raw: Option<&str>, active: &SmolStr) -> Vec<SmolStr> {
    let mut symbols = vec![active.clone()];
    for symbol in raw.unwrap_or("BTCUSDT,ETHUSDT,SOLUSDT").split(',') {
        let symbol = SmolStr::new(symbol.trim().to_uppercase());
        if !symbol.is_empty() && !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    symbols
}

/// Log file path, `PREDWATCH_LOG_FILE` or `predwatch.log`.
pub fn log_file_path() -> String {
    std::env::var("PREDWATCH_LOG_FILE").unwrap_or_else(|_| "predwatch.log".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ViewConfig::default();
        assert_eq!(config.default_span, 300.0);
        assert_eq!(config.min_span, 20.0);
        assert_eq!(config.zoom_factor(true), 0.85);
        assert_eq!(config.zoom_factor(false), 1.15);
    }

    #[test]
    fn test_config_from_lookup() {
        let env = HashMap::from([
            ("PREDWATCH_INVERT_ZOOM", "1"),
            ("PREDWATCH_MIN_SPAN", "50"),
            ("PREDWATCH_DEFAULT_SPAN", "10"),
        ]);
        let config = ViewConfig::from_lookup(|key| env.get(key).map(|value| value.to_string()));

        assert!(config.invert_zoom);
        assert_eq!(config.zoom_factor(true), 1.15);
        assert_eq!(config.min_span, 50.0);
        assert_eq!(config.default_span, 50.0);
    }

    #[test]
    fn test_parse_symbols() {
        struct TestCase {
            raw: Option<&'static str>,
            expected: Vec<&'static str>,
        }

        let active = SmolStr::new_static("ETHUSDT");
        let tests = vec![
            TestCase {
                // TC0: default list, active first and not repeated
                raw: None,
                expected: vec!["ETHUSDT", "BTCUSDT", "SOLUSDT"],
            },
            TestCase {
                // TC1: trimmed, upper-cased, empties skipped
                raw: Some(" btcusdt, ,xrpusdt,"),
                expected: vec!["ETHUSDT", "BTCUSDT", "XRPUSDT"],
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = parse_symbols(test.raw, &active);
            assert_eq!(actual, test.expected, "TC{index} failed");
        }
    }
}
