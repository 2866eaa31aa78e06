//! Static directory of supported providers.

use serde::{Deserialize, Serialize};

use crate::catalog::GpuCatalog;
use crate::model::Provider;

use super::engine::Marketplace;

/// Descriptive entry for one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Wire name, e.g. `vast_ai`.
    pub name: Provider,
    /// Human-readable name.
    pub display_name: String,
    /// Provider website.
    pub website: String,
    /// Regions the provider advertises.
    pub regions: Vec<String>,
    /// Notable features.
    pub features: Vec<String>,
    /// True if an adapter is configured.
    pub is_configured: bool,
    /// Catalog model names; empty when not configured.
    pub gpu_models: Vec<String>,
}

const fn website(provider: Provider) -> &'static str {
    match provider {
        Provider::VastAi => "https://vast.ai",
        Provider::RunPod => "https://runpod.io",
    }
}

const fn regions(provider: Provider) -> &'static [&'static str] {
    match provider {
        Provider::VastAi => &["US-East", "US-West", "Europe", "Asia"],
        Provider::RunPod => &["Global", "US", "Europe", "Asia"],
    }
}

const fn features(provider: Provider) -> &'static [&'static str] {
    match provider {
        Provider::VastAi => &["SSH Access", "Docker Support", "Jupyter Notebooks", "Custom Images"],
        Provider::RunPod => &[
            "GraphQL API",
            "Jupyter Support",
            "SSH Access",
            "Community & Secure Cloud",
        ],
    }
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

impl Marketplace {
    /// Reference models known to the marketplace.
    #[must_use]
    pub fn gpu_models(&self) -> &GpuCatalog {
        self.catalog()
    }

    /// Describes every supported provider, configured or not.
    #[must_use]
    pub fn supported_providers(&self) -> Vec<ProviderInfo> {
        Provider::ALL
            .into_iter()
            .map(|provider| {
                let is_configured = self.is_configured(provider);
                ProviderInfo {
                    name: provider,
                    display_name: provider.display_name().to_string(),
                    website: website(provider).to_string(),
                    regions: owned(regions(provider)),
                    features: owned(features(provider)),
                    is_configured,
                    gpu_models: if is_configured {
                        self.catalog().names()
                    } else {
                        Vec::new()
                    },
                }
            })
            .collect()
    }
}
