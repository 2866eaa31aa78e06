//! Search criteria for offers.

use serde::{Deserialize, Serialize};

use crate::catalog::GpuCategory;

use super::Provider;

/// Field used to order search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Hourly price.
    #[default]
    Price,
    /// Catalog performance score.
    Performance,
    /// Host reliability.
    Reliability,
    /// System memory.
    Memory,
    /// Number of GPUs.
    GpuCount,
}

impl SortKey {
    /// Parses a sort key, falling back to [`SortKey::Price`] for anything unknown.
    #[must_use]
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "performance" => Self::Performance,
            "reliability" => Self::Reliability,
            "memory" => Self::Memory,
            "gpu_count" => Self::GpuCount,
            _ => Self::Price,
        }
    }

    /// Returns the wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Performance => "performance",
            Self::Reliability => "reliability",
            Self::Memory => "memory",
            Self::GpuCount => "gpu_count",
        }
    }
}

/// Direction of the sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Asc,
    /// Largest first.
    Desc,
}

impl SortOrder {
    /// Parses a sort order, falling back to [`SortOrder::Asc`].
    #[must_use]
    pub fn parse_lenient(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }
}

/// Basic search criteria.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilter {
    /// Restrict to one provider.
    pub provider: Option<Provider>,
    /// GPU model substring.
    pub gpu_model: Option<String>,
    /// Minimum number of GPUs.
    pub min_gpu_count: Option<u32>,
    /// Maximum hourly price.
    pub max_price: Option<f64>,
    /// Region substring.
    pub region: Option<String>,
    /// Only rentable offers.
    pub available: Option<bool>,
}

/// Full search criteria; every field is optional and combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedSearchFilter {
    /// Restrict to one provider.
    pub provider: Option<Provider>,
    /// GPU model substring.
    pub gpu_model: Option<String>,
    /// Any-of GPU model substrings.
    pub gpu_models: Vec<String>,
    /// Catalog category.
    pub gpu_category: Option<GpuCategory>,
    /// Minimum number of GPUs.
    pub min_gpu_count: Option<u32>,
    /// Maximum number of GPUs.
    pub max_gpu_count: Option<u32>,
    /// Minimum hourly price.
    pub min_price: Option<f64>,
    /// Maximum hourly price.
    pub max_price: Option<f64>,
    /// Minimum RAM in GB.
    pub min_ram_gb: Option<u32>,
    /// Maximum RAM in GB.
    pub max_ram_gb: Option<u32>,
    /// Minimum storage in GB.
    pub min_storage_gb: Option<u32>,
    /// Region substring.
    pub region: Option<String>,
    /// Any-of region substrings.
    pub regions: Vec<String>,
    /// Only rentable offers.
    pub available: Option<bool>,
    /// Minimum reliability in `[0, 1]`.
    pub min_reliability: Option<f64>,
    /// Minimum catalog performance score.
    pub min_performance: Option<u32>,
    /// Sort field.
    pub sort_by: SortKey,
    /// Sort direction.
    pub sort_order: SortOrder,
}

impl AdvancedSearchFilter {
    /// Returns the model constraint as a list, merging `gpu_model` and `gpu_models`.
    #[must_use]
    pub fn model_terms(&self) -> Vec<&str> {
        active_terms(self.gpu_model.as_deref(), &self.gpu_models)
    }

    /// Returns the region constraint as a list, merging `region` and `regions`.
    #[must_use]
    pub fn region_terms(&self) -> Vec<&str> {
        active_terms(self.region.as_deref(), &self.regions)
    }
}

fn active_terms<'a>(single: Option<&'a str>, many: &'a [String]) -> Vec<&'a str> {
    single
        .into_iter()
        .chain(many.iter().map(String::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

impl From<SearchFilter> for AdvancedSearchFilter {
    fn from(filter: SearchFilter) -> Self {
        Self {
            provider: filter.provider,
            gpu_model: filter.gpu_model,
            min_gpu_count: filter.min_gpu_count,
            max_price: filter.max_price,
            region: filter.region,
            available: filter.available,
            sort_by: SortKey::Price,
            sort_order: SortOrder::Asc,
            ..Self::default()
        }
    }
}
