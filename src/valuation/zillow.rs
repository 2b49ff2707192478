//! Zillow (RapidAPI) lookups - recently sold search by map bounds and price history

use crate::valuation::config::RetryPolicy;
use crate::valuation::error::FetchError;
use crate::valuation::fetch::{PriceHistorySource, SalesSource};
use crate::valuation::types::{BoundingBox, RawSaleRecord, SalesPage};
use crate::valuation::utils::{get_json, lenient_f64};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

const RECENTLY_SOLD_URL: &str = "https://www.zillow.com/homes/recently_sold";

pub struct ZillowClient {
    client: Client,
    base_url: String,
    headers: HeaderMap,
    retry: RetryPolicy,
}

impl ZillowClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> anyhow::Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let host = Url::parse(&base_url)
            .with_context(|| format!("Invalid Zillow API URL: {}", base_url))?
            .host_str()
            .context("Zillow API URL has no host")?
            .to_string();

        let mut headers = HeaderMap::new();
        headers.insert("x-rapidapi-host", HeaderValue::from_str(&host)?);
        headers.insert("x-rapidapi-key", HeaderValue::from_str(api_key)?);

        let client = Client::builder().timeout(timeout).build()?;

        Ok(ZillowClient {
            client,
            base_url,
            headers,
            retry,
        })
    }
}

#[async_trait]
impl SalesSource for ZillowClient {
    async fn fetch_page(
        &self,
        bbox: &BoundingBox,
        page_token: Option<&str>,
    ) -> Result<SalesPage, FetchError> {
        let page = match page_token {
            Some(token) => token
                .parse::<u32>()
                .map_err(|_| FetchError::Decode(format!("bad page token {:?}", token)))?,
            None => 1,
        };
        info!("Fetching recently sold page {}", page);

        let url = format!("{}/searchByUrl", self.base_url);
        let query = [("url", recently_sold_url(bbox, page))];
        let body = get_json(&self.client, &url, &query, &self.headers, &self.retry).await?;

        parse_search_page(page, body)
    }
}

#[async_trait]
impl PriceHistorySource for ZillowClient {
    async fn price_history(&self, zpid: &str) -> Result<Option<f64>, FetchError> {
        let url = format!("{}/property", self.base_url);
        let query = [("zpid", zpid.to_string())];
        let body = get_json(&self.client, &url, &query, &self.headers, &self.retry).await?;

        let price = parse_price_history(&body);
        debug!("Price history for zpid {}: {:?}", zpid, price);
        Ok(price)
    }
}

/// Zillow recently-sold search URL for one page of a map rectangle
pub fn recently_sold_url(bbox: &BoundingBox, page: u32) -> String {
    let search_state = json!({
        "pagination": { "currentPage": page },
        "isMapVisible": true,
        "mapBounds": {
            "west": bbox.west,
            "east": bbox.east,
            "south": bbox.south,
            "north": bbox.north
        },
        "mapZoom": 14,
        "usersSearchTerm": "",
        "filterState": {
            "sort": { "value": "globalrelevanceex" },
            "fsba": { "value": false },
            "fsbo": { "value": false },
            "nc": { "value": false },
            "cmsn": { "value": false },
            "auc": { "value": false },
            "fore": { "value": false },
            "rs": { "value": true }
        }
    });

    let base = format!("{}/{}_p/", RECENTLY_SOLD_URL, page);
    match Url::parse_with_params(&base, &[("searchQueryState", search_state.to_string())]) {
        Ok(url) => url.to_string(),
        Err(_) => base,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    props: Vec<Value>,
    #[serde(default)]
    total_pages: Option<u32>,
}

/// Decode one search page; malformed listings are skipped, not fatal
pub fn parse_search_page(page: u32, body: Value) -> Result<SalesPage, FetchError> {
    let response: SearchResponse =
        serde_json::from_value(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    let mut sales = Vec::with_capacity(response.props.len());
    for (idx, prop) in response.props.into_iter().enumerate() {
        match serde_json::from_value::<RawSaleRecord>(prop) {
            Ok(record) => sales.push(record),
            Err(e) => warn!("Skipping listing {} on page {}: {}", idx, page, e),
        }
    }

    let total_pages = response.total_pages.unwrap_or(1);
    let next_page_token = (page < total_pages).then(|| (page + 1).to_string());
    debug!(
        "Page {}/{} decoded {} listings",
        page,
        total_pages,
        sales.len()
    );

    Ok(SalesPage {
        sales,
        next_page_token,
    })
}

#[derive(Debug, Deserialize)]
struct PriceEvent {
    #[serde(default)]
    event: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    price: Option<f64>,
    /// Epoch milliseconds
    #[serde(default)]
    time: Option<i64>,
}

/// Most recent positive "Sold" price, falling back to `lastSoldPrice`
pub fn parse_price_history(body: &Value) -> Option<f64> {
    let events: Vec<PriceEvent> = body
        .get("priceHistory")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();

    // Zillow lists newest first; `time` breaks ties when present
    let sold = events
        .iter()
        .enumerate()
        .filter(|(_, e)| {
            e.event
                .as_deref()
                .is_some_and(|name| name.trim().eq_ignore_ascii_case("sold"))
        })
        .filter_map(|(idx, e)| {
            e.price
                .filter(|p| *p > 0.0)
                .map(|p| (e.time.unwrap_or(i64::MIN), std::cmp::Reverse(idx), p))
        })
        .max_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)))
        .map(|(_, _, price)| price);

    sold.or_else(|| {
        body.get("lastSoldPrice")
            .and_then(Value::as_f64)
            .filter(|p| p.is_finite() && *p > 0.0)
    })
}
