//! Regrid parcel lookup - resolves an APN to coordinates and acreage

use crate::valuation::config::RetryPolicy;
use crate::valuation::error::{FetchError, ResolveError};
use crate::valuation::fetch::ParcelResolver;
use crate::valuation::types::ResolvedParcel;
use crate::valuation::utils::{format_regrid_path, get_json};
use async_trait::async_trait;
use geojson::{GeoJson, Value as GeometryValue};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

pub struct RegridClient {
    client: Client,
    base_url: String,
    token: String,
    retry: RetryPolicy,
}

impl RegridClient {
    pub fn new(
        base_url: &str,
        token: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(RegridClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            retry,
        })
    }
}

#[async_trait]
impl ParcelResolver for RegridClient {
    async fn resolve(
        &self,
        apn: &str,
        county: &str,
        state: &str,
    ) -> Result<ResolvedParcel, ResolveError> {
        let path = format_regrid_path(state, county);
        info!("Looking up parcel {} at {}", apn, path);

        let url = format!("{}/api/v2/parcels/apn", self.base_url);
        let query = [
            ("parcelnumb", apn.to_string()),
            ("path", path),
            ("token", self.token.clone()),
            ("return_zoning", "true".to_string()),
            ("return_matched_addresses", "true".to_string()),
        ];
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let body = match get_json(&self.client, &url, &query, &headers, &self.retry).await {
            Ok(body) => body,
            Err(FetchError::Status(404)) => return Err(ResolveError::NotFound(apn.to_string())),
            Err(e) => return Err(e.into()),
        };

        parse_parcel_response(apn, &body)
    }
}

/// Decode a Regrid `{"parcels": FeatureCollection}` response
pub fn parse_parcel_response(apn: &str, body: &Value) -> Result<ResolvedParcel, ResolveError> {
    let parcels = body
        .get("parcels")
        .cloned()
        .ok_or_else(|| ResolveError::Decode("missing `parcels`".to_string()))?;
    let geojson =
        GeoJson::from_json_value(parcels).map_err(|e| ResolveError::Decode(e.to_string()))?;
    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(ResolveError::Decode("`parcels` is not a FeatureCollection".to_string()));
    };

    let feature = collection
        .features
        .into_iter()
        .next()
        .ok_or_else(|| ResolveError::NotFound(apn.to_string()))?;

    let empty = Map::new();
    let fields = feature
        .properties
        .as_ref()
        .and_then(|p| p.get("fields"))
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let acreage = field_f64(fields, "deeded_acres").or_else(|| field_f64(fields, "gisacre"));
    let address = fields
        .get("address")
        .and_then(Value::as_str)
        .map(str::to_string);

    let (longitude, latitude) = match (field_f64(fields, "lon"), field_f64(fields, "lat")) {
        (Some(lon), Some(lat)) => (lon, lat),
        _ => feature
            .geometry
            .as_ref()
            .and_then(|g| geometry_center(&g.value))
            .ok_or_else(|| ResolveError::CoordinatesUnavailable(apn.to_string()))?,
    };

    debug!(
        "Parcel {}: ({}, {}), acreage {:?}",
        apn, latitude, longitude, acreage
    );

    Ok(ResolvedParcel {
        latitude: Some(latitude),
        longitude: Some(longitude),
        acreage,
        address,
    })
}

fn field_f64(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    let value = match fields.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

/// (lon, lat) of a point, or the vertex mean of the first polygon ring
fn geometry_center(geometry: &GeometryValue) -> Option<(f64, f64)> {
    let ring = match geometry {
        GeometryValue::Point(p) if p.len() >= 2 => return Some((p[0], p[1])),
        GeometryValue::Polygon(rings) => rings.first()?,
        GeometryValue::MultiPolygon(polygons) => polygons.first()?.first()?,
        _ => return None,
    };

    let mut vertices: &[Vec<f64>] = ring;
    if vertices.len() > 1 && vertices.first() == vertices.last() {
        // Closing vertex repeats the first
        vertices = &vertices[..vertices.len() - 1];
    }
    let vertices: Vec<&Vec<f64>> = vertices.iter().filter(|v| v.len() >= 2).collect();
    if vertices.is_empty() {
        return None;
    }

    let n = vertices.len() as f64;
    let lon = vertices.iter().map(|v| v[0]).sum::<f64>() / n;
    let lat = vertices.iter().map(|v| v[1]).sum::<f64>() / n;
    Some((lon, lat))
}
