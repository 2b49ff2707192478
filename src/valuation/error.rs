//! Error types for the valuation pipeline

use thiserror::Error;

/// Failures resolving the target parcel. Always fatal to the request.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No parcel matched the APN in the given county/state.
    #[error("Parcel not found: {0}")]
    NotFound(String),
    /// The parcel exists but no usable coordinates were returned.
    #[error("Coordinates unavailable for parcel {0}")]
    CoordinatesUnavailable(String),
    /// The parcel service could not be reached or answered with an error.
    #[error("Parcel lookup failed: {0}")]
    Fetch(#[from] FetchError),
    /// The parcel service answered with something we could not read.
    #[error("Parcel response could not be decoded: {0}")]
    Decode(String),
}

/// Failures fetching sales or price history.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The upstream API is throttling us.
    #[error("Rate limited by upstream")]
    RateLimited,
    /// Non-success HTTP status other than 429.
    #[error("HTTP request failed with status {0}")]
    Status(u16),
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
    /// The body was not the JSON shape we expected.
    #[error("Response could not be decoded: {0}")]
    Decode(String),
}

impl FetchError {
    /// Worth retrying with the same request
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            FetchError::Status(code) => *code >= 500,
            FetchError::RateLimited | FetchError::Decode(_) => false,
        }
    }
}

/// Errors surfaced to the caller of a valuation
#[derive(Debug, Error)]
pub enum ValuationError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// Resolved coordinates were out of range or not finite.
    #[error("Invalid target parcel: {0}")]
    InvalidTarget(String),
    #[error("Invalid search configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Invalid search/backfill configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a positive finite number, got {value}")]
    NotPositive { name: &'static str, value: f64 },
    #[error("initial radius {initial} exceeds max radius {max}")]
    RadiusOrder { initial: f64, max: f64 },
    #[error("min acreage ratio {min} exceeds max acreage ratio {max}")]
    RatioOrder { min: f64, max: f64 },
    #[error("{0} must be at least 1")]
    Zero(&'static str),
}
