//! Configuration - search tuning, retry policy and API settings loaded from the environment

use crate::valuation::error::ConfigError;
use crate::valuation::types::Strictness;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Acceptable lot size relative to the target, as ratios of target acreage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcreageBand {
    pub min_ratio: f64,
    pub max_ratio: f64,
}

impl Default for AcreageBand {
    fn default() -> Self {
        AcreageBand {
            min_ratio: 0.4,
            max_ratio: 3.0,
        }
    }
}

/// Price backfill fan-out limits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackfillConfig {
    pub workers: usize,
    pub item_timeout: Duration,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        BackfillConfig {
            workers: 10,
            item_timeout: Duration::from_secs(10),
        }
    }
}

/// Retry policy injected into the HTTP collaborators
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retrying after failed attempt number `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

/// Comparable search tuning
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub initial_radius: f64,
    pub radius_increment: f64,
    pub max_radius: f64,
    pub min_comparables: usize,
    pub acreage_band: AcreageBand,
    /// Upper bound on pages walked per radius
    pub max_pages: usize,
    pub strictness: Strictness,
    pub backfill: BackfillConfig,
    /// Stop expanding the radius on the first rate-limited fetch
    pub abort_on_rate_limit: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            initial_radius: 1.0,
            radius_increment: 1.0,
            max_radius: 5.0,
            min_comparables: 2,
            acreage_band: AcreageBand::default(),
            max_pages: 20,
            strictness: Strictness::ConfirmedOnly,
            backfill: BackfillConfig::default(),
            abort_on_rate_limit: false,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("initial_radius", self.initial_radius)?;
        positive("radius_increment", self.radius_increment)?;
        positive("max_radius", self.max_radius)?;
        positive("min_acreage_ratio", self.acreage_band.min_ratio)?;
        positive("max_acreage_ratio", self.acreage_band.max_ratio)?;

        if self.initial_radius > self.max_radius {
            return Err(ConfigError::RadiusOrder {
                initial: self.initial_radius,
                max: self.max_radius,
            });
        }
        if self.acreage_band.min_ratio > self.acreage_band.max_ratio {
            return Err(ConfigError::RatioOrder {
                min: self.acreage_band.min_ratio,
                max: self.acreage_band.max_ratio,
            });
        }
        if self.min_comparables == 0 {
            return Err(ConfigError::Zero("min_comparables"));
        }
        if self.max_pages == 0 {
            return Err(ConfigError::Zero("max_pages"));
        }
        if self.backfill.workers == 0 {
            return Err(ConfigError::Zero("backfill.workers"));
        }
        if self.backfill.item_timeout.is_zero() {
            return Err(ConfigError::Zero("backfill.item_timeout"));
        }
        Ok(())
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}

/// Configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub regrid_api_url: String,
    pub regrid_api_token: String,
    pub zillow_api_url: String,
    pub zillow_api_key: String,
    pub bind_addr: SocketAddr,
    pub http_timeout: Duration,
    pub retry: RetryPolicy,
    pub search: SearchConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; `from_env` passes the process environment
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = SearchConfig::default();
        let default_retry = RetryPolicy::default();

        let search = SearchConfig {
            initial_radius: parse_or(&lookup, "INITIAL_SEARCH_RADIUS_MILES", defaults.initial_radius)?,
            radius_increment: parse_or(&lookup, "SEARCH_RADIUS_INCREMENT", defaults.radius_increment)?,
            max_radius: parse_or(&lookup, "MAX_SEARCH_RADIUS_MILES", defaults.max_radius)?,
            min_comparables: parse_or(&lookup, "MIN_COMPARABLE_PROPERTIES", defaults.min_comparables)?,
            acreage_band: AcreageBand {
                min_ratio: parse_or(&lookup, "MIN_ACREAGE_RATIO", defaults.acreage_band.min_ratio)?,
                max_ratio: parse_or(&lookup, "MAX_ACREAGE_RATIO", defaults.acreage_band.max_ratio)?,
            },
            max_pages: parse_or(&lookup, "MAX_PAGES_PER_SEARCH", defaults.max_pages)?,
            strictness: if flag(&lookup, "ALLOW_POTENTIAL_SALES") {
                Strictness::AllowPotential
            } else {
                Strictness::ConfirmedOnly
            },
            backfill: BackfillConfig {
                workers: parse_or(&lookup, "BACKFILL_WORKERS", defaults.backfill.workers)?,
                item_timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "BACKFILL_TIMEOUT_SECS",
                    defaults.backfill.item_timeout.as_secs(),
                )?),
            },
            abort_on_rate_limit: flag(&lookup, "ABORT_ON_RATE_LIMIT"),
        };
        search.validate().context("Invalid search configuration")?;

        Ok(AppConfig {
            regrid_api_url: lookup("REGRID_API_URL")
                .unwrap_or_else(|| "https://app.regrid.com".to_string()),

            regrid_api_token: lookup("REGRID_API_TOKEN").context("REGRID_API_TOKEN must be set")?,

            zillow_api_url: lookup("ZILLOW_API_URL")
                .unwrap_or_else(|| "https://zillow-com1.p.rapidapi.com".to_string()),

            zillow_api_key: lookup("ZILLOW_RAPID_API_KEY")
                .context("ZILLOW_RAPID_API_KEY must be set")?,

            bind_addr: parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8000)))?,

            http_timeout: Duration::from_secs(parse_or(&lookup, "HTTP_TIMEOUT_SECS", 30)?),

            retry: RetryPolicy {
                max_attempts: parse_or(&lookup, "RETRY_MAX_ATTEMPTS", default_retry.max_attempts)?,
                initial_backoff: Duration::from_millis(parse_or(
                    &lookup,
                    "RETRY_INITIAL_BACKOFF_MS",
                    default_retry.initial_backoff.as_millis() as u64,
                )?),
                max_backoff: default_retry.max_backoff,
            },

            search,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid value, got {:?}", name, raw)),
        None => Ok(default),
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> bool {
    matches!(
        lookup(name)
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
            .as_str(),
        "1" | "true" | "yes"
    )
}
