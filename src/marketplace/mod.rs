//! Aggregation over all configured providers.
//!
//! - [`Marketplace`]: fan-out search, lifecycle routing and statistics
//! - Post-filtering and ordering of aggregated offers
//! - Provider directory

mod directory;
mod engine;
pub mod filter;
pub mod stats;

pub use directory::ProviderInfo;
pub use engine::{Marketplace, MarketplaceBuilder};
pub use filter::{apply_filter, matches_filter, sort_instances};
pub use stats::{GpuModelStats, MarketplaceStats, PriceRange};
