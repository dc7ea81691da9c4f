use crate::store::DEFAULT_CAPACITY;
use smol_str::SmolStr;
use std::time::Duration;

/// Lowest accepted poll cadence; bounds the request rate against the remote source.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Remote feed and poll loop configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    /// Base URL of the prediction service
    pub base_url: String,
    /// Symbol being tracked
    pub symbol: SmolStr,
    /// `n` for the `/pred/latest` bootstrap fetch
    pub latest_rows: usize,
    /// `seconds` of history for the `/snapshot` bootstrap fetch
    pub snapshot_seconds: u64,
    /// Profile passed to the `/snapshot` bootstrap fetch
    pub snapshot_profile: SmolStr,
    /// Delay between the end of one poll cycle and the start of the next
    pub poll_interval: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Maximum rows retained per stream
    pub capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            symbol: SmolStr::new_static("BTCUSDT"),
            latest_rows: 1500,
            snapshot_seconds: 900,
            snapshot_profile: SmolStr::new_static("hft"),
            poll_interval: Duration::from_millis(1000),
            request_timeout: Duration::from_secs(10),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl FeedConfig {
    /// Create a new configuration with a custom base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Build from `PREDWATCH_*` environment variables, falling back to defaults for
    /// anything missing or unparseable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).and_then(|value| value.trim().parse::<u64>().ok());

        let mut config = Self {
            base_url: lookup("PREDWATCH_API_URL").unwrap_or(defaults.base_url),
            symbol: lookup("PREDWATCH_SYMBOL")
                .map(|symbol| SmolStr::new(symbol.trim().to_uppercase()))
                .filter(|symbol| !symbol.is_empty())
                .unwrap_or(defaults.symbol),
            latest_rows: parse("PREDWATCH_LATEST_ROWS")
                .map(|rows| rows as usize)
                .unwrap_or(defaults.latest_rows),
            snapshot_seconds: parse("PREDWATCH_SNAPSHOT_SECONDS").unwrap_or(defaults.snapshot_seconds),
            snapshot_profile: lookup("PREDWATCH_SNAPSHOT_PROFILE")
                .map(SmolStr::new)
                .unwrap_or(defaults.snapshot_profile),
            poll_interval: defaults.poll_interval,
            request_timeout: parse("PREDWATCH_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            capacity: defaults.capacity,
        };
        if let Some(millis) = parse("PREDWATCH_POLL_MS") {
            config = config.with_poll_interval(Duration::from_millis(millis));
        }
        config
    }

    /// Set the symbol
    pub fn with_symbol(mut self, symbol: impl Into<SmolStr>) -> Self {
        self.symbol = symbol.into();
        self
    }

    /// Set the poll cadence, floored at [`MIN_POLL_INTERVAL`]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Set the per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the bootstrap row count
    pub fn with_latest_rows(mut self, rows: usize) -> Self {
        self.latest_rows = rows;
        self
    }

    /// Set the per-stream capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }
}
