//! Parse functions - turn raw listing records into canonical `Sale` structs

use crate::sqft_to_acres;
use crate::valuation::types::{RawSaleRecord, Sale, Strictness};
use crate::valuation::utils::format_sale_address;
use chrono::{TimeZone, Utc};
use std::fmt;
use tracing::{debug, info};

/// Units a lot area may be reported in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LotUnit {
    Acres,
    SquareFeet,
}

impl LotUnit {
    pub fn parse(unit: &str) -> Option<LotUnit> {
        match unit.trim().to_lowercase().as_str() {
            "acres" | "acre" | "ac" => Some(LotUnit::Acres),
            "sqft" | "sq ft" | "sq. ft." | "square feet" | "squarefeet" => Some(LotUnit::SquareFeet),
            _ => None,
        }
    }

    pub fn to_acres(self, value: f64) -> f64 {
        match self {
            LotUnit::Acres => value,
            LotUnit::SquareFeet => sqft_to_acres(value),
        }
    }
}

/// Why a raw record never became a `Sale`
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    MissingAddress,
    MissingLotArea,
    UnknownLotUnit(Option<String>),
    MissingPrice,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::MissingAddress => write!(f, "missing address"),
            DropReason::MissingLotArea => write!(f, "missing or non-positive lot area"),
            DropReason::UnknownLotUnit(unit) => write!(f, "unknown lot area unit {:?}", unit),
            DropReason::MissingPrice => write!(f, "missing price"),
        }
    }
}

/// Normalize one raw record; `None` means the record is dropped
pub fn normalize(raw: &RawSaleRecord, strictness: Strictness) -> Option<Sale> {
    try_normalize(raw, strictness).ok()
}

/// Normalize one raw record, reporting why it was dropped
pub fn try_normalize(raw: &RawSaleRecord, strictness: Strictness) -> Result<Sale, DropReason> {
    let address = match raw.address.as_deref().map(str::trim) {
        Some(full) if !full.is_empty() => full.to_string(),
        _ => format_sale_address(
            raw.street_address.as_deref(),
            raw.city.as_deref(),
            raw.state.as_deref(),
            raw.zipcode.as_deref(),
        ),
    };
    if address.is_empty() {
        return Err(DropReason::MissingAddress);
    }

    let lot_value = raw
        .lot_area_value
        .filter(|v| v.is_finite() && *v > 0.0)
        .ok_or(DropReason::MissingLotArea)?;
    let unit = raw
        .lot_area_unit
        .as_deref()
        .and_then(LotUnit::parse)
        .ok_or_else(|| DropReason::UnknownLotUnit(raw.lot_area_unit.clone()))?;

    let price = raw.price.filter(|p| p.is_finite() && *p > 0.0);
    if price.is_none() && strictness == Strictness::ConfirmedOnly {
        return Err(DropReason::MissingPrice);
    }

    let mut sale =
        Sale::new(address, price, unit.to_acres(lot_value)).ok_or(DropReason::MissingLotArea)?;
    sale.beds = raw.bedrooms.clone();
    sale.baths = raw.bathrooms.clone();
    sale.sqft = raw.living_area.clone();
    sale.zpid = raw.zpid.clone();
    sale.sold_at = raw
        .date_sold
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

    Ok(sale)
}

/// Normalize a batch, dropping unusable records
pub fn normalize_all(raw: &[RawSaleRecord], strictness: Strictness) -> Vec<Sale> {
    let mut sales = Vec::with_capacity(raw.len());
    let mut dropped = 0;

    for (idx, record) in raw.iter().enumerate() {
        match try_normalize(record, strictness) {
            Ok(sale) => sales.push(sale),
            Err(reason) => {
                dropped += 1;
                if dropped <= 10 {
                    // Only log first 10 drops
                    debug!("Dropped record {} ({:?}): {}", idx, record.zpid, reason);
                }
            }
        }
    }

    info!(
        "Normalized {} sales from {} raw records ({} dropped)",
        sales.len(),
        raw.len(),
        dropped
    );

    sales
}
