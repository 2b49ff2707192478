//! Fetch boundary - the external collaborators the valuation engine depends on

use crate::valuation::error::{FetchError, ResolveError};
use crate::valuation::types::{BoundingBox, RawSaleRecord, ResolvedParcel, SalesPage};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Locates the target parcel
#[async_trait]
pub trait ParcelResolver: Send + Sync {
    async fn resolve(
        &self,
        apn: &str,
        county: &str,
        state: &str,
    ) -> Result<ResolvedParcel, ResolveError>;
}

/// Recently sold properties inside a map rectangle, one page at a time
#[async_trait]
pub trait SalesSource: Send + Sync {
    async fn fetch_page(
        &self,
        bbox: &BoundingBox,
        page_token: Option<&str>,
    ) -> Result<SalesPage, FetchError>;
}

/// Secondary price lookup for sales listed without one
#[async_trait]
pub trait PriceHistorySource: Send + Sync {
    /// `Ok(None)` means no price is known, not an error
    async fn price_history(&self, zpid: &str) -> Result<Option<f64>, FetchError>;
}

/// Walk every page for a bounding box, up to `max_pages`.
/// Any page failure fails the whole walk.
pub async fn fetch_all_pages(
    source: &dyn SalesSource,
    bbox: &BoundingBox,
    max_pages: usize,
) -> Result<Vec<RawSaleRecord>, FetchError> {
    let mut records = Vec::new();
    let mut token: Option<String> = None;

    for page in 1..=max_pages {
        let SalesPage {
            sales,
            next_page_token,
        } = source.fetch_page(bbox, token.as_deref()).await?;
        debug!("Page {} returned {} records", page, sales.len());
        records.extend(sales);

        match next_page_token {
            Some(next) => token = Some(next),
            None => return Ok(records),
        }
    }

    warn!(
        "Stopped after {} pages with more results available ({} records kept)",
        max_pages,
        records.len()
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::test_support::{raw_sale, ScriptedSales};

    fn bbox() -> BoundingBox {
        BoundingBox {
            north: 1.0,
            south: -1.0,
            east: 1.0,
            west: -1.0,
        }
    }

    #[tokio::test]
    async fn test_walks_all_pages() {
        let source = ScriptedSales::paged(vec![
            Ok(vec![raw_sale("a", Some(1.0), 1.0)]),
            Ok(vec![raw_sale("b", Some(1.0), 1.0), raw_sale("c", Some(1.0), 1.0)]),
        ]);

        let records = fetch_all_pages(&source, &bbox(), 10).await.unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_respects_page_cap() {
        let source = ScriptedSales::paged(vec![
            Ok(vec![raw_sale("a", Some(1.0), 1.0)]),
            Ok(vec![raw_sale("b", Some(1.0), 1.0)]),
            Ok(vec![raw_sale("c", Some(1.0), 1.0)]),
        ]);

        let records = fetch_all_pages(&source, &bbox(), 2).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_page_failure_fails_walk() {
        let source = ScriptedSales::paged(vec![
            Ok(vec![raw_sale("a", Some(1.0), 1.0)]),
            Err(FetchError::Status(502)),
        ]);

        let result = fetch_all_pages(&source, &bbox(), 10).await;

        assert!(matches!(result, Err(FetchError::Status(502))));
    }
}
