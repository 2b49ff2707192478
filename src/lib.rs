// Library module for testable functions

pub mod api;
pub mod valuation;

/// Square feet in one acre
pub const SQFT_PER_ACRE: f64 = 43_560.0;

/// Calculate price per acre
/// Formula: price / acreage
pub fn calculate_price_per_acre(price: f64, acreage: f64) -> Option<f64> {
    if !price.is_finite() || !acreage.is_finite() || acreage <= 0.0 {
        return None;
    }
    Some(price / acreage)
}

/// Convert a lot area in square feet to acres
pub fn sqft_to_acres(sqft: f64) -> f64 {
    sqft / SQFT_PER_ACRE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_per_acre_calculation() {
        // Test normal case
        let ppa = calculate_price_per_acre(450_000.0, 9.0);
        assert!(ppa.is_some());
        let ppa = ppa.unwrap();
        assert!((ppa - 50_000.0).abs() < 0.01);
    }

    #[test]
    fn test_price_per_acre_fractional_lot() {
        // Half-acre lot doubles the per-acre figure
        let ppa = calculate_price_per_acre(120_000.0, 0.5).unwrap();
        assert!((ppa - 240_000.0).abs() < 0.01);
    }

    #[test]
    fn test_price_per_acre_zero_acreage() {
        // Test with zero acreage (should return None)
        assert!(calculate_price_per_acre(300_000.0, 0.0).is_none());
    }

    #[test]
    fn test_price_per_acre_negative_acreage() {
        assert!(calculate_price_per_acre(300_000.0, -2.0).is_none());
    }

    #[test]
    fn test_price_per_acre_non_finite() {
        assert!(calculate_price_per_acre(f64::NAN, 2.0).is_none());
        assert!(calculate_price_per_acre(100.0, f64::INFINITY).is_none());
    }

    #[test]
    fn test_sqft_to_acres() {
        assert!((sqft_to_acres(21_780.0) - 0.5).abs() < 1e-12);
        assert!((sqft_to_acres(43_560.0) - 1.0).abs() < 1e-12);
    }
}
