//! Marketplace statistics over a set of offers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::{GpuCatalog, GpuModelSpec};
use crate::model::{NormalizedInstance, Provider};

/// Minimum, maximum and mean price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    /// Lowest hourly price.
    pub min: f64,
    /// Highest hourly price.
    pub max: f64,
    /// Mean hourly price.
    pub avg: f64,
}

impl PriceRange {
    /// Computes the range over prices; all zero when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_prices(prices: &[f64]) -> Self {
        if prices.is_empty() {
            return Self::default();
        }

        let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = prices.iter().sum::<f64>() / prices.len() as f64;

        Self { min, max, avg }
    }
}

/// Aggregates for one GPU model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuModelStats {
    /// Catalog entry, when the model is known.
    pub model: Option<GpuModelSpec>,
    /// Number of offers.
    pub available_count: usize,
    /// Lowest hourly price.
    pub min_price: f64,
    /// Highest hourly price.
    pub max_price: f64,
    /// Mean hourly price.
    pub avg_price: f64,
    /// Providers offering the model, in order of first appearance.
    pub providers: Vec<Provider>,
}

/// Snapshot of the marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketplaceStats {
    /// Number of offers considered.
    pub total_instances: usize,
    /// Number of those offers that are available.
    pub available_instances: usize,
    /// Per-model aggregates keyed by reported model name.
    pub model_stats: BTreeMap<String, GpuModelStats>,
    /// Offer count per provider.
    pub provider_stats: BTreeMap<Provider, usize>,
    /// Mean hourly price over all offers.
    pub average_price: f64,
    /// Price range over all offers.
    pub price_range: PriceRange,
    /// When the snapshot was taken.
    pub generated_at: DateTime<Utc>,
}

impl MarketplaceStats {
    /// Aggregates statistics over the given offers.
    #[must_use]
    pub fn from_offers(offers: &[NormalizedInstance], catalog: &GpuCatalog) -> Self {
        let mut provider_stats: BTreeMap<Provider, usize> = BTreeMap::new();
        let mut by_model: BTreeMap<&str, (Vec<f64>, Vec<Provider>)> = BTreeMap::new();

        for offer in offers {
            *provider_stats.entry(offer.provider).or_default() += 1;

            let (prices, providers) = by_model.entry(offer.gpu_model.as_str()).or_default();
            prices.push(offer.price_per_hour);
            if !providers.contains(&offer.provider) {
                providers.push(offer.provider);
            }
        }

        let model_stats = by_model
            .into_iter()
            .map(|(name, (prices, providers))| {
                let range = PriceRange::from_prices(&prices);
                let stats = GpuModelStats {
                    model: catalog.get(name).cloned(),
                    available_count: prices.len(),
                    min_price: range.min,
                    max_price: range.max,
                    avg_price: range.avg,
                    providers,
                };
                (name.to_string(), stats)
            })
            .collect();

        let prices: Vec<f64> = offers.iter().map(|o| o.price_per_hour).collect();
        let price_range = PriceRange::from_prices(&prices);

        Self {
            total_instances: offers.len(),
            available_instances: offers.iter().filter(|o| o.is_available()).count(),
            model_stats,
            provider_stats,
            average_price: price_range.avg,
            price_range,
            generated_at: Utc::now(),
        }
    }
}
