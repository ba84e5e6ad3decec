use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    /// Optional JSON file with `{component_name, instrument_id}` entries.
    ///
    /// Only consulted when the instruments table is empty.
    pub instruments_file: Option<String>,

    // =========================
    // Quote source configuration
    // =========================
    /// Base URL of the detailed-quote endpoint. The instrument id is appended
    /// as the last path segment.
    pub quote_endpoint: String,

    /// Per-request timeout applied by the HTTP client.
    pub quote_timeout: Duration,

    /// Attempts per fetch, including the first one. Only transient
    /// failures (connect / timeout) consume further attempts.
    pub quote_max_attempts: u32,

    /// Wait before the second attempt; doubled for each later one.
    pub quote_retry_backoff: Duration,

    // =========================
    // Scheduler configuration
    // =========================
    pub scheduler: SchedulerConfig,
}

/// Tunables of the cycle scheduler.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Target cadence of active cycles. The scheduler sleeps
    /// `max(0, cycle_period - elapsed)` after each one.
    pub cycle_period: Duration,

    /// Sleep between re-probes while the market is closed.
    pub idle_period: Duration,

    /// Window width W, in cycles (minutes at the default cadence).
    pub window_width: usize,

    /// Maximum number of fetches in flight during one cycle.
    pub concurrency: usize,

    /// Number of most recent ages inspected by the trend classifier.
    pub tail_len: usize,

    /// Poll even when the exchange reports the market as closed.
    pub force_open: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_period: Duration::from_secs(60),
            idle_period: Duration::from_secs(600),
            window_width: 720,
            concurrency: 10,
            tail_len: 5,
            force_open: false,
        }
    }
}

impl SchedulerConfig {
    /// Clamps values into a usable range: at least one worker and
    /// `window_width >= tail_len >= 1`.
    pub fn normalized(mut self) -> Self {
        self.concurrency = self.concurrency.max(1);
        self.tail_len = self.tail_len.max(1);
        self.window_width = self.window_width.max(self.tail_len);
        self
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://trend_dev.db?mode=rwc".to_string());

        let quote_endpoint = std::env::var("QUOTE_ENDPOINT").unwrap_or_else(|_| {
            "https://live.euronext.com/en/ajax/getDetailedQuote".to_string()
        });

        let defaults = SchedulerConfig::default();

        let scheduler = SchedulerConfig {
            cycle_period: Duration::from_secs(env_or(
                "CYCLE_PERIOD_SECS",
                defaults.cycle_period.as_secs(),
            )),
            idle_period: Duration::from_secs(env_or(
                "IDLE_PERIOD_SECS",
                defaults.idle_period.as_secs(),
            )),
            window_width: env_or("WINDOW_WIDTH", defaults.window_width),
            concurrency: env_or("FETCH_CONCURRENCY", defaults.concurrency),
            tail_len: env_or("TREND_TAIL", defaults.tail_len),
            force_open: env_or("FORCE_OPEN", defaults.force_open),
        }
        .normalized();

        Self {
            database_url,
            instruments_file: std::env::var("INSTRUMENTS_FILE").ok(),

            quote_endpoint,
            quote_timeout: Duration::from_secs(env_or("QUOTE_TIMEOUT_SECS", 10)),
            quote_max_attempts: env_or("QUOTE_MAX_ATTEMPTS", 3u32).max(1),
            quote_retry_backoff: Duration::from_millis(env_or("QUOTE_RETRY_BACKOFF_MS", 250)),

            scheduler,
        }
    }
}

fn env_or<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => parse_or(key, &raw, default),
        Err(_) => default,
    }
}

fn parse_or<T: FromStr + Copy>(key: &str, raw: &str, default: T) -> T {
    match raw.trim().parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            warn!(key = key, value = raw, "unparseable config value; using default");
            default
        }
    }
}
