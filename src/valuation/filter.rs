//! Acreage band filter - keep sales whose lot size resembles the target

use crate::valuation::config::AcreageBand;
use crate::valuation::types::Sale;

/// Inclusive acreage bounds for a target lot
pub fn acreage_bounds(target_acreage: f64, band: &AcreageBand) -> (f64, f64) {
    (target_acreage * band.min_ratio, target_acreage * band.max_ratio)
}

/// Keep sales within `[target * min_ratio, target * max_ratio]`
pub fn filter_by_acreage(sales: &[Sale], target_acreage: f64, band: &AcreageBand) -> Vec<Sale> {
    let (min_acreage, max_acreage) = acreage_bounds(target_acreage, band);

    sales
        .iter()
        .filter(|sale| (min_acreage..=max_acreage).contains(&sale.acreage()))
        .cloned()
        .collect()
}
