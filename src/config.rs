//! Environment configuration.
//!
//! Read once at startup (after `dotenv`). Numeric overrides that fail to parse
//! fall back to their defaults; only the service credential is mandatory.

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

pub const ANALYSIS_FILE: &str = "reviews_analysis.json";
pub const MAIN_REVIEWS_JSON: &str = "restaurant_reviews.json";
pub const MAIN_REVIEWS_CSV: &str = "restaurant_reviews.csv";
pub const COMPARISON_CSV: &str = "ratings_comparison.csv";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ANTHROPIC_API_KEY not found")]
    MissingApiKey,
}

/// Caps and pauses for one scrape pass.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Hard cap on pagination iterations.
    pub max_pages: usize,
    /// How long to wait for the reviews container after navigation.
    pub container_timeout: Duration,
    /// How long to wait for the next-page control to become clickable.
    pub next_timeout: Duration,
    /// Attempts at clicking the next-page control before giving up.
    pub click_attempts: u32,
    /// Pause after a successful next-page click.
    pub page_pause: Duration,
    /// Pause after refreshing a page that failed to render.
    pub refresh_pause: Duration,
    pub headless: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_pages: 100,
            container_timeout: Duration::from_secs(20),
            next_timeout: Duration::from_secs(10),
            click_attempts: 3,
            page_pause: Duration::from_secs(1),
            refresh_pause: Duration::from_secs(5),
            headless: true,
        }
    }
}

/// Text-analysis service settings.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    /// Cost cap on reviews sent per generation run.
    pub max_reviews: usize,
    pub batch_size: usize,
}

impl AnalysisConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: 1000,
            max_reviews: 900,
            batch_size: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    pub scrape: ScrapeConfig,
    pub data_dir: PathBuf,
    pub dashboard_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, so tests need not touch the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = get("ANTHROPIC_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let parsed = |key: &str| get(key).and_then(|v| v.trim().parse::<u64>().ok());

        let mut analysis = AnalysisConfig::new(api_key);
        if let Some(model) = get("ANTHROPIC_MODEL") {
            analysis.model = model;
        }
        if let Some(url) = get("ANTHROPIC_BASE_URL") {
            analysis.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(n) = parsed("ANALYSIS_MAX_TOKENS").and_then(|n| u32::try_from(n).ok()) {
            analysis.max_tokens = n;
        }
        if let Some(n) = parsed("ANALYSIS_MAX_REVIEWS") {
            analysis.max_reviews = n as usize;
        }
        if let Some(n) = parsed("ANALYSIS_BATCH_SIZE").filter(|n| *n > 0) {
            analysis.batch_size = n as usize;
        }

        let mut scrape = ScrapeConfig::default();
        if let Some(n) = parsed("SCRAPE_MAX_PAGES") {
            scrape.max_pages = n as usize;
        }
        if let Some(n) = parsed("SCRAPE_CONTAINER_TIMEOUT_SECS") {
            scrape.container_timeout = Duration::from_secs(n);
        }
        if let Some(n) = parsed("SCRAPE_NEXT_TIMEOUT_SECS") {
            scrape.next_timeout = Duration::from_secs(n);
        }
        if let Some(n) = parsed("SCRAPE_CLICK_ATTEMPTS")
            .filter(|n| *n > 0)
            .and_then(|n| u32::try_from(n).ok())
        {
            scrape.click_attempts = n;
        }
        if let Some(n) = parsed("SCRAPE_PAGE_PAUSE_SECS") {
            scrape.page_pause = Duration::from_secs(n);
        }
        if let Some(n) = parsed("SCRAPE_REFRESH_PAUSE_SECS") {
            scrape.refresh_pause = Duration::from_secs(n);
        }
        if let Some(v) = get("SCRAPE_HEADLESS") {
            scrape.headless = !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no");
        }

        Ok(Self {
            analysis,
            scrape,
            data_dir: get("DATA_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
            dashboard_addr: get("DASHBOARD_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
        })
    }

    pub fn data_path(&self, file: impl AsRef<Path>) -> PathBuf {
        self.data_dir.join(file)
    }
}
