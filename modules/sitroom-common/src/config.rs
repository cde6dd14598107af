use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // xAI
    pub xai_api_key: String,

    // GDACS feed
    pub gdacs_feed_url: String,
    /// Max feed items processed per run; bounds per-run classifier cost.
    pub gdacs_max_items: usize,

    // Live search
    pub search_window_hours: u32,

    // Cycle pacing
    pub cooldown_secs: u64,
    pub mission_pacing_secs: u64,
    pub mission_timeout_secs: u64,
    pub cycle_deadline_secs: u64,

    /// When true, duplicate incidents also accumulate evidence reports.
    /// Default false: evidence is attached only at creation time.
    pub append_duplicate_evidence: bool,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            xai_api_key: required_env("XAI_API_KEY"),
            gdacs_feed_url: env::var("GDACS_FEED_URL")
                .unwrap_or_else(|_| "https://www.gdacs.org/xml/rss.xml".to_string()),
            gdacs_max_items: numeric_env("GDACS_MAX_ITEMS", 5),
            search_window_hours: numeric_env("SEARCH_WINDOW_HOURS", 2),
            cooldown_secs: numeric_env("INGEST_COOLDOWN_SECS", 60),
            mission_pacing_secs: numeric_env("MISSION_PACING_SECS", 1),
            mission_timeout_secs: numeric_env("MISSION_TIMEOUT_SECS", 120),
            cycle_deadline_secs: numeric_env("CYCLE_DEADLINE_SECS", 300),
            append_duplicate_evidence: env::var("APPEND_DUPLICATE_EVIDENCE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn numeric_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a number")),
        Err(_) => default,
    }
}
