//! Valuator - resolves the target, runs the comparable search and prices the parcel

use crate::valuation::calculate::calculate_value;
use crate::valuation::config::{AppConfig, SearchConfig};
use crate::valuation::error::{ConfigError, ResolveError, ValuationError};
use crate::valuation::fetch::{ParcelResolver, PriceHistorySource, SalesSource};
use crate::valuation::regrid::RegridClient;
use crate::valuation::search::find_comparables;
use crate::valuation::types::{
    PropertyRequest, ResolvedParcel, Strictness, TargetParcel, ValuationResult,
};
use crate::valuation::utils::state_abbreviation;
use crate::valuation::zillow::ZillowClient;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Acreage assumed when the parcel record has none
pub const DEFAULT_ACREAGE: f64 = 1.0;

/// Owns the collaborators and search tuning; safe to share across requests
pub struct Valuator {
    resolver: Arc<dyn ParcelResolver>,
    sales: Arc<dyn SalesSource>,
    history: Option<Arc<dyn PriceHistorySource>>,
    config: SearchConfig,
}

impl Valuator {
    pub fn new(
        resolver: Arc<dyn ParcelResolver>,
        sales: Arc<dyn SalesSource>,
        config: SearchConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Valuator {
            resolver,
            sales,
            history: None,
            config,
        })
    }

    pub fn with_price_history(self, history: Arc<dyn PriceHistorySource>) -> Self {
        Valuator {
            history: Some(history),
            ..self
        }
    }

    /// Wire up the Regrid and Zillow clients from application config
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let resolver = RegridClient::new(
            &config.regrid_api_url,
            &config.regrid_api_token,
            config.http_timeout,
            config.retry,
        )?;
        let zillow = Arc::new(ZillowClient::new(
            &config.zillow_api_url,
            &config.zillow_api_key,
            config.http_timeout,
            config.retry,
        )?);

        let valuator = Valuator::new(Arc::new(resolver), zillow.clone(), config.search.clone())?;
        Ok(match config.search.strictness {
            Strictness::AllowPotential => valuator.with_price_history(zillow),
            Strictness::ConfirmedOnly => valuator,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Value one parcel.
    ///
    /// Errors only when the parcel cannot be located. Finding no comparables is
    /// an `Ok` result with empty estimates.
    pub async fn valuate(&self, request: &PropertyRequest) -> Result<ValuationResult, ValuationError> {
        let span = info_span!(
            "valuation",
            request_id = %Uuid::new_v4(),
            apn = %request.apn
        );
        self.valuate_inner(request).instrument(span).await
    }

    async fn valuate_inner(
        &self,
        request: &PropertyRequest,
    ) -> Result<ValuationResult, ValuationError> {
        info!("Valuing {}", request.label());

        // Step 1: Locate the target parcel
        let resolved = self
            .resolver
            .resolve(&request.apn, &request.county, &request.state)
            .await?;
        let target_address = resolved.address.clone();
        let target = target_from(request, resolved)?;
        info!(
            "Target at ({:.5}, {:.5}), {} acres",
            target.latitude, target.longitude, target.acreage
        );

        // Step 2: Search for comparables
        let outcome = find_comparables(
            &target,
            self.sales.as_ref(),
            self.history.as_deref(),
            &self.config,
        )
        .await?;

        // Step 3: Price the parcel
        let valuation = calculate_value(target.acreage, &outcome.valid);
        match valuation.estimated_value_median {
            Some(value) => info!(
                "Estimated value ${:.0} (median) from {} comparables",
                value, valuation.comparable_count
            ),
            None => warn!("Valuation could not be computed: no priced comparables"),
        }

        Ok(ValuationResult {
            target_property: request.label(),
            target_address,
            target_acreage: target.acreage,
            search_radius_miles: outcome.final_radius,
            termination: outcome.termination,
            comparable_count: valuation.comparable_count,
            estimated_value_avg: valuation.estimated_value_avg,
            estimated_value_median: valuation.estimated_value_median,
            stats: valuation.stats,
            valid: outcome.valid,
            outliers: outcome.outliers,
            unpriced: outcome.unpriced,
            radii_searched: outcome.radii_searched,
            failed_fetches: outcome.failed_fetches,
            backfilled_count: outcome.backfilled,
            valued_at: Utc::now(),
        })
    }
}

/// Build the immutable target from what the resolver found.
/// Missing coordinates are fatal; missing acreage falls back to [`DEFAULT_ACREAGE`].
pub fn target_from(
    request: &PropertyRequest,
    resolved: ResolvedParcel,
) -> Result<TargetParcel, ValuationError> {
    let (latitude, longitude) = match (resolved.latitude, resolved.longitude) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => {
            return Err(ResolveError::CoordinatesUnavailable(request.apn.clone()).into());
        }
    };

    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(ValuationError::InvalidTarget(format!("latitude {}", latitude)));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(ValuationError::InvalidTarget(format!("longitude {}", longitude)));
    }

    let acreage = match resolved.acreage {
        Some(acres) if acres.is_finite() && acres > 0.0 => acres,
        other => {
            warn!(
                "No usable acreage for {} ({:?}); assuming {} acre",
                request.apn, other, DEFAULT_ACREAGE
            );
            DEFAULT_ACREAGE
        }
    };

    Ok(TargetParcel {
        apn: request.apn.clone(),
        county: request.county.clone(),
        state: state_abbreviation(&request.state),
        latitude,
        longitude,
        acreage,
    })
}
