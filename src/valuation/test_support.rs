//! In-memory collaborators for tests

use crate::valuation::error::{FetchError, ResolveError};
use crate::valuation::fetch::{ParcelResolver, PriceHistorySource, SalesSource};
use crate::valuation::types::{BoundingBox, RawSaleRecord, ResolvedParcel, SalesPage};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Raw record with a lot size in acres; the address doubles as zpid
pub fn raw_sale(address: &str, price: Option<f64>, acres: f64) -> RawSaleRecord {
    RawSaleRecord {
        zpid: Some(address.to_string()),
        address: Some(address.to_string()),
        price,
        lot_area_value: Some(acres),
        lot_area_unit: Some("acres".to_string()),
        ..Default::default()
    }
}

/// Raw record priced so that it lands at exactly `price_per_acre`
pub fn raw_sale_ppa(address: &str, price_per_acre: f64, acres: f64) -> RawSaleRecord {
    raw_sale(address, Some(price_per_acre * acres), acres)
}

/// Sales source that replays scripted responses in order.
///
/// `per_call` answers every call with a single final page, so one response
/// equals one radius iteration. `paged` chains the responses as pages of one walk.
pub struct ScriptedSales {
    responses: Mutex<VecDeque<Result<Vec<RawSaleRecord>, FetchError>>>,
    paged: bool,
    calls: AtomicUsize,
    boxes: Mutex<Vec<BoundingBox>>,
}

impl ScriptedSales {
    pub fn per_call(responses: Vec<Result<Vec<RawSaleRecord>, FetchError>>) -> Self {
        Self::build(responses, false)
    }

    pub fn paged(responses: Vec<Result<Vec<RawSaleRecord>, FetchError>>) -> Self {
        Self::build(responses, true)
    }

    fn build(responses: Vec<Result<Vec<RawSaleRecord>, FetchError>>, paged: bool) -> Self {
        ScriptedSales {
            responses: Mutex::new(responses.into()),
            paged,
            calls: AtomicUsize::new(0),
            boxes: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn boxes(&self) -> Vec<BoundingBox> {
        self.boxes.lock().unwrap().clone()
    }
}

#[async_trait]
impl SalesSource for ScriptedSales {
    async fn fetch_page(
        &self,
        bbox: &BoundingBox,
        _page_token: Option<&str>,
    ) -> Result<SalesPage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.boxes.lock().unwrap().push(*bbox);

        let mut responses = self.responses.lock().unwrap();
        let sales = responses.pop_front().unwrap_or_else(|| Ok(Vec::new()))?;
        let next_page_token = if self.paged && !responses.is_empty() {
            Some(format!("page-{}", self.calls()))
        } else {
            None
        };

        Ok(SalesPage {
            sales,
            next_page_token,
        })
    }
}

/// Scripted behavior for one price-history lookup
#[derive(Debug, Clone, Copy)]
pub enum HistoryReply {
    Price(f64),
    NoPrice,
    RateLimited,
    Hang,
}

/// Price-history source keyed by zpid that tracks peak concurrency
pub struct FakeHistory {
    replies: HashMap<String, HistoryReply>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeHistory {
    pub fn new(replies: &[(&str, HistoryReply)]) -> Self {
        FakeHistory {
            replies: replies
                .iter()
                .map(|(zpid, reply)| (zpid.to_string(), *reply))
                .collect(),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceHistorySource for FakeHistory {
    async fn price_history(&self, zpid: &str) -> Result<Option<f64>, FetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let reply = self.replies.get(zpid).copied().unwrap_or(HistoryReply::NoPrice);
        if let HistoryReply::Hang = reply {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match reply {
            HistoryReply::Price(price) => Ok(Some(price)),
            HistoryReply::NoPrice | HistoryReply::Hang => Ok(None),
            HistoryReply::RateLimited => Err(FetchError::RateLimited),
        }
    }
}

/// Resolver returning a fixed parcel, or a fixed failure
pub enum FakeResolver {
    Found(ResolvedParcel),
    NotFound,
    NoCoordinates,
}

#[async_trait]
impl ParcelResolver for FakeResolver {
    async fn resolve(
        &self,
        apn: &str,
        _county: &str,
        _state: &str,
    ) -> Result<ResolvedParcel, ResolveError> {
        match self {
            FakeResolver::Found(parcel) => Ok(parcel.clone()),
            FakeResolver::NotFound => Err(ResolveError::NotFound(apn.to_string())),
            FakeResolver::NoCoordinates => {
                Err(ResolveError::CoordinatesUnavailable(apn.to_string()))
            }
        }
    }
}
