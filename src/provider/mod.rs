//! Provider adapters.
//!
//! This module contains:
//! - The [`ProviderAdapter`] trait every provider implements
//! - Shared HTTP transport helpers
//! - The Vast.ai (REST) and `RunPod` (GraphQL) adapters

pub mod http;
pub mod runpod;
pub mod traits;
pub mod vastai;

pub use http::HttpSettings;
pub use runpod::RunPodAdapter;
pub use traits::ProviderAdapter;
pub use vastai::VastAdapter;

#[cfg(test)]
pub use traits::MockProviderAdapter;
