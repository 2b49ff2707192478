//! Core data types for the valuation pipeline
//! Mostly plain data; `Sale` guards its own invariants

use crate::calculate_price_per_acre;
use crate::valuation::utils::{format_usd, lenient_epoch_millis, lenient_f64, lenient_string};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Incoming valuation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRequest {
    pub apn: String,
    pub county: String,
    pub state: String,
}

impl PropertyRequest {
    pub fn label(&self) -> String {
        format!("APN# {}, {}, {}", self.apn, self.county, self.state)
    }
}

/// What a parcel resolver could find out about a parcel.
/// Any field may be missing; the valuator decides which gaps are fatal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedParcel {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub acreage: Option<f64>,
    pub address: Option<String>,
}

/// The subject property being valued
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetParcel {
    pub apn: String,
    pub county: String,
    pub state: String,
    pub latitude: f64,
    pub longitude: f64,
    pub acreage: f64,
}

/// Map rectangle in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

/// Raw recently-sold record as returned by the listings API.
/// Every field is optional, and a malformed field reads as absent rather than
/// failing the whole record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSaleRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub zpid: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub street_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub zipcode: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lot_area_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub lot_area_unit: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub bedrooms: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub bathrooms: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub living_area: Option<String>,
    /// Epoch milliseconds
    #[serde(default, deserialize_with = "lenient_epoch_millis")]
    pub date_sold: Option<i64>,
}

/// One page of raw records from a sales source
#[derive(Debug, Clone, Default)]
pub struct SalesPage {
    pub sales: Vec<RawSaleRecord>,
    pub next_page_token: Option<String>,
}

/// How the normalizer treats records without a price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Drop records with no price
    #[default]
    ConfirmedOnly,
    /// Keep them as potential sales, eligible for price backfill
    AllowPotential,
}

/// Canonical comparable sale.
///
/// Constructed only through [`Sale::new`], which refuses a non-positive or
/// non-finite acreage, so `price_per_acre` is always derivable when a price exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sale {
    address: String,
    price: Option<f64>,
    /// `price` formatted as "$450,000.00"
    price_text: Option<String>,
    acreage: f64,
    price_per_acre: Option<f64>,
    pub beds: Option<String>,
    pub baths: Option<String>,
    pub sqft: Option<String>,
    pub zpid: Option<String>,
    pub sold_at: Option<DateTime<Utc>>,
}

impl Sale {
    pub fn new(address: impl Into<String>, price: Option<f64>, acreage: f64) -> Option<Sale> {
        if !acreage.is_finite() || acreage <= 0.0 {
            return None;
        }
        let price = price.filter(|p| p.is_finite() && *p > 0.0);
        Some(Sale {
            address: address.into(),
            price,
            price_text: price.map(format_usd),
            acreage,
            price_per_acre: price.and_then(|p| calculate_price_per_acre(p, acreage)),
            beds: None,
            baths: None,
            sqft: None,
            zpid: None,
            sold_at: None,
        })
    }

    /// Same sale with a (backfilled) price; `price_per_acre` is re-derived
    pub fn with_price(self, price: f64) -> Sale {
        let price = Some(price).filter(|p| p.is_finite() && *p > 0.0);
        Sale {
            price,
            price_text: price.map(format_usd),
            price_per_acre: price.and_then(|p| calculate_price_per_acre(p, self.acreage)),
            ..self
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn price(&self) -> Option<f64> {
        self.price
    }

    pub fn price_text(&self) -> Option<&str> {
        self.price_text.as_deref()
    }

    pub fn acreage(&self) -> f64 {
        self.acreage
    }

    pub fn price_per_acre(&self) -> Option<f64> {
        self.price_per_acre
    }

    /// Listing found but no price known yet
    pub fn is_potential(&self) -> bool {
        self.price.is_none()
    }
}

/// Address-keyed sales accumulated across radius iterations.
/// First-seen wins: a later record for a known address is ignored.
#[derive(Debug, Clone, Default)]
pub struct SaleSet {
    sales: Vec<Sale>,
    addresses: HashSet<String>,
}

impl SaleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the address was already present
    pub fn insert(&mut self, sale: Sale) -> bool {
        if self.addresses.contains(sale.address()) {
            return false;
        }
        self.addresses.insert(sale.address().to_string());
        self.sales.push(sale);
        true
    }

    /// Insert many, returning how many were duplicates
    pub fn extend_first_seen(&mut self, sales: impl IntoIterator<Item = Sale>) -> usize {
        sales
            .into_iter()
            .map(|sale| self.insert(sale))
            .filter(|inserted| !inserted)
            .count()
    }

    pub fn len(&self) -> usize {
        self.sales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sales.is_empty()
    }

    pub fn as_slice(&self) -> &[Sale] {
        &self.sales
    }

    pub fn into_vec(self) -> Vec<Sale> {
        self.sales
    }
}

/// Price-per-acre summary over valid comparables
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub median: f64,
    pub std_dev: f64,
}

/// Calculator output
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Valuation {
    pub comparable_count: usize,
    pub stats: Option<PriceStats>,
    pub estimated_value_avg: Option<f64>,
    pub estimated_value_median: Option<f64>,
}

/// Terminal state of the radius search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchTermination {
    Found,
    Exhausted,
}

/// Everything the comparable search produced
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub valid: Vec<Sale>,
    pub outliers: Vec<Sale>,
    pub unpriced: Vec<Sale>,
    pub final_radius: f64,
    pub termination: SearchTermination,
    pub radii_searched: usize,
    pub failed_fetches: usize,
    pub backfilled: usize,
}

/// Final valuation response
#[derive(Debug, Clone, Serialize)]
pub struct ValuationResult {
    pub target_property: String,
    /// Situs address reported by the parcel lookup
    pub target_address: Option<String>,
    pub target_acreage: f64,
    pub search_radius_miles: f64,
    pub termination: SearchTermination,
    pub comparable_count: usize,
    pub estimated_value_avg: Option<f64>,
    pub estimated_value_median: Option<f64>,
    #[serde(rename = "price_per_acre_stats")]
    pub stats: Option<PriceStats>,
    #[serde(rename = "comparable_properties")]
    pub valid: Vec<Sale>,
    #[serde(rename = "outlier_properties")]
    pub outliers: Vec<Sale>,
    #[serde(rename = "unpriced_properties")]
    pub unpriced: Vec<Sale>,
    pub radii_searched: usize,
    pub failed_fetches: usize,
    /// Potential sales that gained a price from their price history
    pub backfilled_count: usize,
    pub valued_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sale_rejects_bad_acreage() {
        assert!(Sale::new("1 Main St", Some(100_000.0), 0.0).is_none());
        assert!(Sale::new("1 Main St", Some(100_000.0), -1.5).is_none());
        assert!(Sale::new("1 Main St", None, f64::NAN).is_none());
    }

    #[test]
    fn test_sale_derives_price_per_acre() {
        let sale = Sale::new("1 Main St", Some(100_000.0), 4.0).unwrap();
        assert_eq!(sale.price_per_acre(), Some(25_000.0));
        assert!(!sale.is_potential());
    }

    #[test]
    fn test_potential_sale_gains_price() {
        let sale = Sale::new("1 Main St", None, 2.0).unwrap();
        assert!(sale.is_potential());
        assert_eq!(sale.price_per_acre(), None);

        assert_eq!(sale.price_text(), None);

        let priced = sale.with_price(90_000.0);
        assert_eq!(priced.price(), Some(90_000.0));
        assert_eq!(priced.price_text(), Some("$90,000.00"));
        assert_eq!(priced.price_per_acre(), Some(45_000.0));
    }

    #[test]
    fn test_sale_serializes_price_text() {
        let sale = Sale::new("1 Main St", Some(450_000.0), 9.0).unwrap();
        let json = serde_json::to_value(&sale).unwrap();

        assert_eq!(json["price_text"], "$450,000.00");
        assert_eq!(json["price_per_acre"], 50_000.0);
    }

    #[test]
    fn test_sale_set_first_seen_wins() {
        let mut set = SaleSet::new();
        let first = Sale::new("9 Oak Rd", Some(100_000.0), 2.0).unwrap();
        let second = Sale::new("9 Oak Rd", Some(999_000.0), 2.0).unwrap();

        assert!(set.insert(first));
        assert!(!set.insert(second));
        assert_eq!(set.len(), 1);
        assert_eq!(set.as_slice()[0].price(), Some(100_000.0));
    }

    #[test]
    fn test_sale_set_counts_duplicates() {
        let mut set = SaleSet::new();
        let sales = ["A", "B", "A", "C", "B"]
            .iter()
            .map(|a| Sale::new(*a, Some(1.0), 1.0).unwrap());

        let duplicates = set.extend_first_seen(sales);

        assert_eq!(duplicates, 2);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_raw_record_tolerates_strings() {
        let raw: RawSaleRecord = serde_json::from_value(serde_json::json!({
            "zpid": 12345,
            "price": "$450,000",
            "lotAreaValue": "9",
            "lotAreaUnit": "acres",
            "bedrooms": 3,
            "zipcode": 78701
        }))
        .unwrap();

        assert_eq!(raw.zpid.as_deref(), Some("12345"));
        assert_eq!(raw.price, Some(450_000.0));
        assert_eq!(raw.lot_area_value, Some(9.0));
        assert_eq!(raw.bedrooms.as_deref(), Some("3"));
        assert_eq!(raw.zipcode.as_deref(), Some("78701"));
    }
}
