//! Utility functions for common operations

use crate::valuation::config::RetryPolicy;
use crate::valuation::error::FetchError;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

/// GET a JSON document, retrying transient failures per `policy`.
/// 429 is never retried; it surfaces as `FetchError::RateLimited`.
pub async fn get_json(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
    headers: &HeaderMap,
    policy: &RetryPolicy,
) -> Result<Value, FetchError> {
    let mut attempt = 1;
    loop {
        match get_json_once(client, url, query, headers).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.backoff_for(attempt);
                warn!(
                    "Request to {} failed (attempt {}/{}): {}; retrying in {:?}",
                    url, attempt, policy.max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn get_json_once(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
    headers: &HeaderMap,
) -> Result<Value, FetchError> {
    let response = client
        .get(url)
        .headers(headers.clone())
        .query(query)
        .send()
        .await?;
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::RateLimited);
    }
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    let body = response.bytes().await?;
    debug!("Received {} bytes from {}", body.len(), url);
    serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
}

/// Parse a money string such as "$450,000" or "1,250.50"
pub fn parse_money(text: &str) -> Option<f64> {
    let clean = text.replace('$', "").replace(',', "").trim().to_string();
    clean.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Accept a number or a numeric string; anything else becomes `None`
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => parse_money(&s),
        _ => None,
    })
}

/// Accept a string or a number, rendered as text; blanks become `None`
pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Epoch milliseconds from an integer, a float or a numeric string.
/// Anything else (date text, objects) becomes `None`.
pub fn lenient_epoch_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    if let Some(Value::Number(n)) = &value {
        if let Some(ms) = n.as_i64() {
            return Ok(Some(ms));
        }
    }
    let millis = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(millis
        .filter(|ms| ms.is_finite() && ms.abs() < i64::MAX as f64)
        .map(|ms| ms as i64))
}

/// "$450,000.00"
pub fn format_usd(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, digit) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, cents)
}

const STATE_ABBREVIATIONS: &[(&str, &str)] = &[
    ("Alabama", "AL"),
    ("Alaska", "AK"),
    ("Arizona", "AZ"),
    ("Arkansas", "AR"),
    ("California", "CA"),
    ("Colorado", "CO"),
    ("Connecticut", "CT"),
    ("Delaware", "DE"),
    ("District of Columbia", "DC"),
    ("Florida", "FL"),
    ("Georgia", "GA"),
    ("Hawaii", "HI"),
    ("Idaho", "ID"),
    ("Illinois", "IL"),
    ("Indiana", "IN"),
    ("Iowa", "IA"),
    ("Kansas", "KS"),
    ("Kentucky", "KY"),
    ("Louisiana", "LA"),
    ("Maine", "ME"),
    ("Maryland", "MD"),
    ("Massachusetts", "MA"),
    ("Michigan", "MI"),
    ("Minnesota", "MN"),
    ("Mississippi", "MS"),
    ("Missouri", "MO"),
    ("Montana", "MT"),
    ("Nebraska", "NE"),
    ("Nevada", "NV"),
    ("New Hampshire", "NH"),
    ("New Jersey", "NJ"),
    ("New Mexico", "NM"),
    ("New York", "NY"),
    ("North Carolina", "NC"),
    ("North Dakota", "ND"),
    ("Ohio", "OH"),
    ("Oklahoma", "OK"),
    ("Oregon", "OR"),
    ("Pennsylvania", "PA"),
    ("Rhode Island", "RI"),
    ("South Carolina", "SC"),
    ("South Dakota", "SD"),
    ("Tennessee", "TN"),
    ("Texas", "TX"),
    ("Utah", "UT"),
    ("Vermont", "VT"),
    ("Virginia", "VA"),
    ("Washington", "WA"),
    ("West Virginia", "WV"),
    ("Wisconsin", "WI"),
    ("Wyoming", "WY"),
];

/// Normalize a US state name or code to its two-letter code.
/// Unknown names are passed through unchanged.
pub fn state_abbreviation(state: &str) -> String {
    let state = state.trim();
    if state.len() == 2 {
        return state.to_uppercase();
    }

    STATE_ABBREVIATIONS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(state))
        .map(|(_, code)| code.to_string())
        .unwrap_or_else(|| state.to_string())
}

/// Regrid path parameter, e.g. `/us/tx/fort_bend`
pub fn format_regrid_path(state: &str, county: &str) -> String {
    format!(
        "/us/{}/{}",
        state_abbreviation(state).to_lowercase(),
        county.trim().to_lowercase().replace(' ', "_")
    )
}

/// Format a sale address from listing components
pub fn format_sale_address(
    street: Option<&str>,
    city: Option<&str>,
    state: Option<&str>,
    zipcode: Option<&str>,
) -> String {
    let mut parts = Vec::new();

    for part in [street, city].into_iter().flatten() {
        if !part.trim().is_empty() {
            parts.push(part.trim().to_string());
        }
    }

    let state_zip = [state, zipcode]
        .iter()
        .flatten()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if !state_zip.is_empty() {
        parts.push(state_zip);
    }

    parts.join(", ")
}
