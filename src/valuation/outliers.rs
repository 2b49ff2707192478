//! Interquartile-range outlier detection on price per acre

use crate::valuation::types::Sale;
use tracing::debug;

/// Below this many priced samples the quartiles are meaningless and detection is skipped
pub const MIN_IQR_SAMPLES: usize = 4;

/// Tukey fence multiplier
pub const IQR_MULTIPLIER: f64 = 1.5;

/// Percentile with linear interpolation between closest ranks.
/// `sorted` must be ascending and non-empty; `p` is in `[0, 100]`.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Split sales into (valid, outliers) by price per acre.
///
/// With fewer than [`MIN_IQR_SAMPLES`] priced sales the input is returned
/// unchanged as valid. Otherwise sales without a price per acre appear in
/// neither list.
pub fn detect_outliers(sales: Vec<Sale>) -> (Vec<Sale>, Vec<Sale>) {
    let mut values: Vec<f64> = sales.iter().filter_map(Sale::price_per_acre).collect();

    if values.len() < MIN_IQR_SAMPLES {
        debug!(
            "Skipping outlier detection: {} priced samples (< {})",
            values.len(),
            MIN_IQR_SAMPLES
        );
        return (sales, Vec::new());
    }

    values.sort_by(|a, b| a.total_cmp(b));
    let q1 = percentile(&values, 25.0);
    let q3 = percentile(&values, 75.0);
    let iqr = q3 - q1;
    let lower_bound = q1 - IQR_MULTIPLIER * iqr;
    let upper_bound = q3 + IQR_MULTIPLIER * iqr;

    debug!(
        "IQR bounds: q1={:.2}, q3={:.2}, keep [{:.2}, {:.2}]",
        q1, q3, lower_bound, upper_bound
    );

    let (valid, outliers): (Vec<Sale>, Vec<Sale>) = sales
        .into_iter()
        .filter(|sale| sale.price_per_acre().is_some())
        .partition(|sale| {
            sale.price_per_acre()
                .is_some_and(|ppa| (lower_bound..=upper_bound).contains(&ppa))
        });

    (valid, outliers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sale(address: &str, price_per_acre: f64) -> Sale {
        Sale::new(address, Some(price_per_acre), 1.0).unwrap()
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&values, 25.0) - 1.75).abs() < 1e-12);
        assert!((percentile(&values, 75.0) - 3.25).abs() < 1e-12);
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 4.0);
        assert_eq!(percentile(&[7.0], 25.0), 7.0);
    }

    #[test]
    fn test_flags_high_outlier() {
        let sales = vec![
            sale("a", 50_000.0),
            sale("b", 52_000.0),
            sale("c", 55_000.0),
            sale("d", 58_000.0),
            sale("e", 500_000.0),
        ];

        let (valid, outliers) = detect_outliers(sales);

        assert_eq!(valid.len(), 4);
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].address(), "e");
    }

    #[test]
    fn test_fewer_than_four_skips_detection() {
        let sales = vec![
            sale("a", 50_000.0),
            sale("b", 60_000.0),
            sale("c", 500_000.0),
        ];

        let (valid, outliers) = detect_outliers(sales.clone());

        assert_eq!(valid, sales);
        assert!(outliers.is_empty());
    }

    #[test]
    fn test_unpriced_sales_excluded_when_detecting() {
        let mut sales: Vec<Sale> = (0..5).map(|i| sale(&format!("p{}", i), 1_000.0 + i as f64)).collect();
        sales.push(Sale::new("no price", None, 1.0).unwrap());

        let (valid, outliers) = detect_outliers(sales);

        assert_eq!(valid.len() + outliers.len(), 5);
        assert!(valid.iter().all(|s| s.address() != "no price"));
    }

    #[test]
    fn test_partition_covers_priced_input() {
        let prices = [10.0, 11.0, 12.0, 13.0, 14.0, 90.0, 0.5, 12.5];
        let sales: Vec<Sale> = prices
            .iter()
            .enumerate()
            .map(|(i, p)| sale(&format!("s{}", i), *p))
            .collect();
        let input: HashSet<String> = sales.iter().map(|s| s.address().to_string()).collect();

        let (valid, outliers) = detect_outliers(sales);

        let valid_set: HashSet<String> = valid.iter().map(|s| s.address().to_string()).collect();
        let outlier_set: HashSet<String> =
            outliers.iter().map(|s| s.address().to_string()).collect();
        assert!(valid_set.is_disjoint(&outlier_set));
        assert_eq!(&valid_set | &outlier_set, input);
        assert!(outlier_set.contains("s5"));
        assert!(outlier_set.contains("s6"));
    }

    #[test]
    fn test_identical_values_all_valid() {
        let sales: Vec<Sale> = (0..6).map(|i| sale(&format!("s{}", i), 42.0)).collect();
        let (valid, outliers) = detect_outliers(sales);
        assert_eq!(valid.len(), 6);
        assert!(outliers.is_empty());
    }
}
