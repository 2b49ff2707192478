//! Batch valuation - CSV of parcels in, CSV of estimates out

use crate::valuation::error::ValuationError;
use crate::valuation::types::{PropertyRequest, ValuationResult};
use crate::valuation::valuator::Valuator;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{error, info, warn};

#[derive(Debug, Deserialize)]
struct RequestRow {
    apn: String,
    county: String,
    state: String,
}

/// One line of the output CSV; `error` is set when the parcel could not be valued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRow {
    pub apn: String,
    pub county: String,
    pub state: String,
    pub target_acreage: Option<f64>,
    pub search_radius_miles: Option<f64>,
    pub comparable_count: Option<usize>,
    pub estimated_value_avg: Option<f64>,
    pub estimated_value_median: Option<f64>,
    pub error: Option<String>,
}

impl BatchRow {
    pub fn from_result(
        request: &PropertyRequest,
        result: &Result<ValuationResult, ValuationError>,
    ) -> Self {
        let mut row = BatchRow {
            apn: request.apn.clone(),
            county: request.county.clone(),
            state: request.state.clone(),
            target_acreage: None,
            search_radius_miles: None,
            comparable_count: None,
            estimated_value_avg: None,
            estimated_value_median: None,
            error: None,
        };

        match result {
            Ok(valuation) => {
                row.target_acreage = Some(valuation.target_acreage);
                row.search_radius_miles = Some(valuation.search_radius_miles);
                row.comparable_count = Some(valuation.comparable_count);
                row.estimated_value_avg = valuation.estimated_value_avg;
                row.estimated_value_median = valuation.estimated_value_median;
            }
            Err(e) => row.error = Some(e.to_string()),
        }
        row
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct BatchStats {
    pub valued: usize,
    pub no_comparables: usize,
    pub failed: usize,
}

impl std::fmt::Display for BatchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "valued: {}, no comparables: {}, failed: {}",
            self.valued, self.no_comparables, self.failed
        )
    }
}

/// Read `apn,county,state` rows. Rows with a blank field are skipped.
pub fn read_requests(path: &Path) -> Result<Vec<PropertyRequest>> {
    info!("Reading batch input from {:?}", path);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {:?}", path))?;

    let mut requests = Vec::new();
    let mut bad_rows = 0;

    for (idx, result) in reader.deserialize::<RequestRow>().enumerate() {
        match result {
            Ok(row) if row.apn.is_empty() || row.county.is_empty() || row.state.is_empty() => {
                bad_rows += 1;
                if bad_rows <= 10 {
                    warn!("Row {} has a blank apn, county or state", idx + 1);
                }
            }
            Ok(row) => requests.push(PropertyRequest {
                apn: row.apn,
                county: row.county,
                state: row.state,
            }),
            Err(e) => {
                bad_rows += 1;
                if bad_rows <= 10 {
                    warn!("Failed to deserialize row {}: {}", idx + 1, e);
                }
            }
        }
    }

    info!(
        "Read {} parcels ({} rows skipped)",
        requests.len(),
        bad_rows
    );

    Ok(requests)
}

/// Value each parcel in turn; one failure never stops the run
pub async fn run_batch(
    valuator: &Valuator,
    requests: &[PropertyRequest],
) -> (Vec<BatchRow>, BatchStats) {
    let mut rows = Vec::with_capacity(requests.len());
    let mut stats = BatchStats::default();

    for (idx, request) in requests.iter().enumerate() {
        info!("[{}/{}] {}", idx + 1, requests.len(), request.label());

        let result = valuator.valuate(request).await;
        match &result {
            Ok(v) if v.comparable_count > 0 => stats.valued += 1,
            Ok(_) => stats.no_comparables += 1,
            Err(e) => {
                stats.failed += 1;
                error!("✗ {} failed: {}", request.label(), e);
            }
        }
        rows.push(BatchRow::from_result(request, &result));
    }

    (rows, stats)
}

pub fn write_rows(path: &Path, rows: &[BatchRow]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("Failed to create {:?}", path))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!("Wrote {} rows to {:?}", rows.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::config::SearchConfig;
    use crate::valuation::error::ResolveError;
    use crate::valuation::test_support::{raw_sale_ppa, FakeResolver, ScriptedSales};
    use crate::valuation::types::ResolvedParcel;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn request(apn: &str) -> PropertyRequest {
        PropertyRequest {
            apn: apn.to_string(),
            county: "Bastrop".to_string(),
            state: "TX".to_string(),
        }
    }

    #[test]
    fn test_read_requests_skips_blank_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("input.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "apn,county,state").unwrap();
        writeln!(file, " R1 , Bastrop , TX ").unwrap();
        writeln!(file, "R2,,TX").unwrap();
        writeln!(file, "R3,Travis,Texas").unwrap();
        drop(file);

        let requests = read_requests(&path).unwrap();

        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], request("R1"));
        assert_eq!(requests[1].county, "Travis");
    }

    #[test]
    fn test_missing_input_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(read_requests(&dir.path().join("nope.csv")).is_err());
    }

    #[test]
    fn test_failed_row_carries_error() {
        let result: Result<ValuationResult, ValuationError> =
            Err(ResolveError::NotFound("R1".to_string()).into());
        let row = BatchRow::from_result(&request("R1"), &result);

        assert_eq!(row.error.as_deref(), Some("Parcel not found: R1"));
        assert!(row.comparable_count.is_none());
        assert!(row.estimated_value_avg.is_none());
    }

    #[test]
    fn test_write_rows_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let rows = vec![
            BatchRow {
                apn: "R1".to_string(),
                county: "Bastrop".to_string(),
                state: "TX".to_string(),
                target_acreage: Some(10.0),
                search_radius_miles: Some(2.0),
                comparable_count: Some(3),
                estimated_value_avg: Some(2_033_333.3),
                estimated_value_median: Some(600_000.0),
                error: None,
            },
            BatchRow::from_result(
                &request("R2"),
                &Err(ResolveError::CoordinatesUnavailable("R2".to_string()).into()),
            ),
        ];

        write_rows(&path, &rows).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(
            "apn,county,state,target_acreage,search_radius_miles,comparable_count,\
             estimated_value_avg,estimated_value_median,error"
        ));

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let back: Vec<BatchRow> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(back, rows);
    }

    #[tokio::test]
    async fn test_run_batch_continues_after_failure() {
        let parcel = ResolvedParcel {
            latitude: Some(30.1),
            longitude: Some(-97.3),
            acreage: Some(1.0),
            address: None,
        };
        let sales = ScriptedSales::per_call(vec![Ok(vec![
            raw_sale_ppa("A", 10_000.0, 1.0),
            raw_sale_ppa("B", 12_000.0, 1.2),
        ])]);
        let found = Valuator::new(
            Arc::new(FakeResolver::Found(parcel)),
            Arc::new(sales),
            SearchConfig::default(),
        )
        .unwrap();
        let missing = Valuator::new(
            Arc::new(FakeResolver::NotFound),
            Arc::new(ScriptedSales::per_call(vec![])),
            SearchConfig::default(),
        )
        .unwrap();

        let (ok_rows, ok_stats) = run_batch(&found, &[request("R1")]).await;
        let (bad_rows, bad_stats) = run_batch(&missing, &[request("R2"), request("R3")]).await;

        assert_eq!(ok_stats.valued, 1);
        assert_eq!(ok_rows[0].comparable_count, Some(2));
        assert!(ok_rows[0].error.is_none());

        assert_eq!(bad_stats.failed, 2);
        assert_eq!(bad_rows.len(), 2);
        assert!(bad_rows.iter().all(|r| r.error.is_some()));
    }
}
