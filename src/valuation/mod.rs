//! Comparable-sales valuation - functional pipeline from parcel lookup to price statistics

pub mod backfill;
pub mod batch;
pub mod calculate;
pub mod config;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod geo;
pub mod outliers;
pub mod parse;
pub mod regrid;
pub mod search;
pub mod types;
pub mod utils;
pub mod valuator;
pub mod zillow;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{AcreageBand, AppConfig, BackfillConfig, RetryPolicy, SearchConfig};
pub use error::{ConfigError, FetchError, ResolveError, ValuationError};
pub use fetch::{ParcelResolver, PriceHistorySource, SalesSource};
pub use types::*;
pub use valuator::Valuator;
