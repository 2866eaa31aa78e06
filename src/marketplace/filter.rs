//! Post-filtering and ordering of aggregated offers.
//!
//! Adapters translate criteria best-effort, so every aggregated record is
//! checked again here against the whole filter.

use std::cmp::Ordering;

use crate::model::{AdvancedSearchFilter, NormalizedInstance, SortKey, SortOrder};

/// Keeps only the records satisfying every active constraint.
#[must_use]
pub fn apply_filter(
    instances: Vec<NormalizedInstance>,
    filter: &AdvancedSearchFilter,
) -> Vec<NormalizedInstance> {
    instances
        .into_iter()
        .filter(|instance| matches_filter(instance, filter))
        .collect()
}

/// True if the record satisfies every active constraint of the filter.
///
/// Zero-valued numeric constraints and blank strings are inactive. A record
/// without catalog data never matches a category constraint, and missing
/// reliability or performance counts as zero.
#[must_use]
pub fn matches_filter(instance: &NormalizedInstance, filter: &AdvancedSearchFilter) -> bool {
    if filter.provider.is_some_and(|p| p != instance.provider) {
        return false;
    }

    if !matches_any(&instance.gpu_model, &filter.model_terms()) {
        return false;
    }

    if !matches_any(&instance.region, &filter.region_terms()) {
        return false;
    }

    if let Some(category) = filter.gpu_category {
        if instance.gpu_info.as_ref().is_none_or(|g| g.category != category) {
            return false;
        }
    }

    if active(filter.min_gpu_count).is_some_and(|min| instance.gpu_count < min)
        || active(filter.max_gpu_count).is_some_and(|max| instance.gpu_count > max)
        || active(filter.min_ram_gb).is_some_and(|min| instance.ram_gb < min)
        || active(filter.max_ram_gb).is_some_and(|max| instance.ram_gb > max)
        || active(filter.min_storage_gb).is_some_and(|min| instance.storage_gb < min)
    {
        return false;
    }

    if active_price(filter.min_price).is_some_and(|min| instance.price_per_hour < min)
        || active_price(filter.max_price).is_some_and(|max| instance.price_per_hour > max)
    {
        return false;
    }

    if filter.available == Some(true) && !instance.is_available() {
        return false;
    }

    if active_price(filter.min_reliability)
        .is_some_and(|min| instance.reliability.unwrap_or(0.0) < min)
    {
        return false;
    }

    if active(filter.min_performance)
        .is_some_and(|min| instance.performance_score.unwrap_or(0) < min)
    {
        return false;
    }

    true
}

fn active(value: Option<u32>) -> Option<u32> {
    value.filter(|v| *v > 0)
}

fn active_price(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

/// Case-insensitive substring match against any term; no terms matches all.
fn matches_any(field: &str, terms: &[&str]) -> bool {
    if terms.is_empty() {
        return true;
    }
    let field = field.to_lowercase();
    terms.iter().any(|t| field.contains(&t.to_lowercase()))
}

fn compare(a: &NormalizedInstance, b: &NormalizedInstance, key: SortKey) -> Ordering {
    match key {
        SortKey::Price => a.price_per_hour.total_cmp(&b.price_per_hour),
        SortKey::Performance => a
            .performance_score
            .unwrap_or(0)
            .cmp(&b.performance_score.unwrap_or(0)),
        SortKey::Reliability => a
            .reliability
            .unwrap_or(0.0)
            .total_cmp(&b.reliability.unwrap_or(0.0)),
        SortKey::Memory => a.ram_gb.cmp(&b.ram_gb),
        SortKey::GpuCount => a.gpu_count.cmp(&b.gpu_count),
    }
}

/// Stable sort by key; descending reverses the comparator so ties keep their order.
pub fn sort_instances(instances: &mut [NormalizedInstance], key: SortKey, order: SortOrder) {
    match order {
        SortOrder::Asc => instances.sort_by(|a, b| compare(a, b, key)),
        SortOrder::Desc => instances.sort_by(|a, b| compare(b, a, key)),
    }
}
