//! Price backfill - concurrent price-history lookups for potential sales

use crate::valuation::config::BackfillConfig;
use crate::valuation::fetch::PriceHistorySource;
use crate::valuation::types::Sale;
use futures::stream::{self, StreamExt};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Result of one lookup
#[derive(Debug)]
enum Lookup {
    Priced(f64),
    NoPrice,
    Failed(String),
    TimedOut,
}

/// Look up prices for potential sales that carry a zpid.
///
/// At most `config.workers` lookups run at once and each is cut off after
/// `config.item_timeout`. A failed lookup leaves its sale unpriced; it never
/// affects the others. Returns the sales in input order and how many gained a price.
pub async fn backfill_prices(
    sales: Vec<Sale>,
    source: &dyn PriceHistorySource,
    config: &BackfillConfig,
) -> (Vec<Sale>, usize) {
    let candidates: Vec<(usize, String)> = sales
        .iter()
        .enumerate()
        .filter(|(_, sale)| sale.is_potential())
        .filter_map(|(idx, sale)| sale.zpid.clone().map(|zpid| (idx, zpid)))
        .collect();

    if candidates.is_empty() {
        return (sales, 0);
    }

    info!(
        "Backfilling prices for {} potential sales ({} workers, {:?} timeout)",
        candidates.len(),
        config.workers,
        config.item_timeout
    );

    let item_timeout = config.item_timeout;
    let lookups: Vec<(usize, String, Lookup)> = stream::iter(candidates)
        .map(|(idx, zpid)| async move {
            let lookup = match timeout(item_timeout, source.price_history(&zpid)).await {
                Ok(Ok(Some(price))) if price.is_finite() && price > 0.0 => Lookup::Priced(price),
                Ok(Ok(_)) => Lookup::NoPrice,
                Ok(Err(e)) => Lookup::Failed(e.to_string()),
                Err(_) => Lookup::TimedOut,
            };
            (idx, zpid, lookup)
        })
        .buffer_unordered(config.workers.max(1))
        .collect()
        .await;

    let mut prices: Vec<Option<f64>> = vec![None; sales.len()];
    let mut failures = 0;
    for (idx, zpid, lookup) in lookups {
        match lookup {
            Lookup::Priced(price) => {
                debug!("Backfilled zpid {}: ${:.0}", zpid, price);
                prices[idx] = Some(price);
            }
            Lookup::NoPrice => debug!("No price history for zpid {}", zpid),
            Lookup::Failed(e) => {
                failures += 1;
                warn!("Price lookup failed for zpid {}: {}", zpid, e);
            }
            Lookup::TimedOut => {
                failures += 1;
                warn!("Price lookup timed out for zpid {}", zpid);
            }
        }
    }

    let backfilled = prices.iter().flatten().count();
    let sales = sales
        .into_iter()
        .zip(prices)
        .map(|(sale, price)| match price {
            Some(price) => sale.with_price(price),
            None => sale,
        })
        .collect();

    info!(
        "Backfill complete: {} priced, {} failed",
        backfilled, failures
    );

    (sales, backfilled)
}
