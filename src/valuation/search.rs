//! Comparable search - expand the radius until enough comparable sales turn up

use crate::valuation::backfill::backfill_prices;
use crate::valuation::config::SearchConfig;
use crate::valuation::error::{ConfigError, FetchError};
use crate::valuation::fetch::{fetch_all_pages, PriceHistorySource, SalesSource};
use crate::valuation::filter::filter_by_acreage;
use crate::valuation::geo::bounding_box;
use crate::valuation::outliers::detect_outliers;
use crate::valuation::parse::normalize_all;
use crate::valuation::types::{
    Sale, SaleSet, SearchOutcome, SearchTermination, Strictness, TargetParcel,
};
use tracing::{debug, info, warn};

/// Slack for float error when comparing the next radius against the maximum
const RADIUS_EPSILON: f64 = 1e-9;

fn priced_count(sales: &[Sale]) -> usize {
    sales.iter().filter(|sale| !sale.is_potential()).count()
}

/// Run the radius-expanding search for comparables around `target`.
///
/// Iterations are strictly sequential: each radius re-filters everything
/// accumulated so far before deciding whether to stop. A failed fetch
/// contributes nothing for that radius. Outlier detection runs on whatever
/// was found, whether the search ended `Found` or `Exhausted`.
pub async fn find_comparables(
    target: &TargetParcel,
    sales_source: &dyn SalesSource,
    history: Option<&dyn PriceHistorySource>,
    config: &SearchConfig,
) -> Result<SearchOutcome, ConfigError> {
    config.validate()?;

    let mut accumulated = SaleSet::new();
    let mut failed_fetches = 0;
    let mut step = 0usize;
    let mut radii_searched = 0;

    let (termination, final_radius, mut filtered) = loop {
        let radius =
            (config.initial_radius + step as f64 * config.radius_increment).min(config.max_radius);
        radii_searched += 1;
        info!("Searching for sales within {} miles...", radius);

        let bbox = bounding_box(target.latitude, target.longitude, radius);
        let mut rate_limited = false;
        match fetch_all_pages(sales_source, &bbox, config.max_pages).await {
            Ok(raw) => {
                let sales = normalize_all(&raw, config.strictness);
                let duplicates = accumulated.extend_first_seen(sales);
                debug!(
                    "Accumulated {} unique sales ({} duplicates ignored)",
                    accumulated.len(),
                    duplicates
                );
            }
            Err(e) => {
                failed_fetches += 1;
                rate_limited = matches!(e, FetchError::RateLimited);
                warn!("Sales fetch failed at {} miles, continuing: {}", radius, e);
            }
        }

        let filtered =
            filter_by_acreage(accumulated.as_slice(), target.acreage, &config.acreage_band);
        let priced = priced_count(&filtered);
        info!(
            "{} of {} accumulated sales within acreage band ({} priced, need {})",
            filtered.len(),
            accumulated.len(),
            priced,
            config.min_comparables
        );

        if priced >= config.min_comparables {
            break (SearchTermination::Found, radius, filtered);
        }
        if rate_limited && config.abort_on_rate_limit {
            warn!("Rate limited at {} miles; not expanding further", radius);
            break (SearchTermination::Exhausted, radius, filtered);
        }

        step += 1;
        let next = config.initial_radius + step as f64 * config.radius_increment;
        if next > config.max_radius + RADIUS_EPSILON {
            break (SearchTermination::Exhausted, config.max_radius, filtered);
        }
    };

    info!(
        "Search ended {:?} at {} miles with {} candidate comparables",
        termination,
        final_radius,
        filtered.len()
    );

    let mut backfilled = 0;
    if let Some(history) = history {
        let wants_backfill = config.strictness == Strictness::AllowPotential
            && priced_count(&filtered) < config.min_comparables
            && filtered.iter().any(Sale::is_potential);
        if wants_backfill {
            let (sales, count) = backfill_prices(filtered, history, &config.backfill).await;
            filtered = sales;
            backfilled = count;
        }
    }

    let (priced, unpriced): (Vec<Sale>, Vec<Sale>) =
        filtered.into_iter().partition(|sale| !sale.is_potential());
    let (valid, outliers) = detect_outliers(priced);

    info!(
        "{} valid comparables, {} outliers, {} unpriced",
        valid.len(),
        outliers.len(),
        unpriced.len()
    );

    Ok(SearchOutcome {
        valid,
        outliers,
        unpriced,
        final_radius,
        termination,
        radii_searched,
        failed_fetches,
        backfilled,
    })
}
