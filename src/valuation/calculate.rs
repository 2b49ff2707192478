//! Valuation statistics over valid comparables
//! Pure functions - no side effects

use crate::valuation::types::{PriceStats, Sale, Valuation};
use tracing::debug;

/// Arithmetic mean; `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median; even counts average the two middle values
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Sample standard deviation (n - 1); 0 for fewer than two values
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Summary statistics; `None` for an empty slice
pub fn price_stats(values: &[f64]) -> Option<PriceStats> {
    let avg = mean(values)?;
    let median = median(values)?;
    Some(PriceStats {
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        avg,
        median,
        std_dev: sample_std_dev(values),
    })
}

/// Reduce valid comparables to price-per-acre statistics and value estimates
pub fn calculate_value(target_acreage: f64, valid: &[Sale]) -> Valuation {
    let values: Vec<f64> = valid.iter().filter_map(Sale::price_per_acre).collect();

    let Some(stats) = price_stats(&values) else {
        debug!(
            "No priced comparables among {} valid sales; no estimate",
            valid.len()
        );
        return Valuation {
            comparable_count: valid.len(),
            ..Valuation::default()
        };
    };

    debug!(
        "Price per acre over {} comparables: avg {:.2}, median {:.2}",
        values.len(),
        stats.avg,
        stats.median
    );

    Valuation {
        comparable_count: valid.len(),
        stats: Some(stats),
        estimated_value_avg: Some(stats.avg * target_acreage),
        estimated_value_median: Some(stats.median * target_acreage),
    }
}
