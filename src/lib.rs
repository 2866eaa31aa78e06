// ============================================================================
// Linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![forbid(unsafe_code)]               // Unsafe code is forbidden
#![warn(missing_docs)]                // Public items should be documented
#![warn(dead_code)]                   // Unused code is flagged
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::panic, clippy::expect_used))]

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # GPU Cloud Manager
//!
//! One API over several GPU cloud marketplaces.
//!
//! ## Overview
//!
//! Each provider has its own API, naming and pricing units. This crate maps
//! them all onto one [`model::NormalizedInstance`] record so you can:
//!
//! - Search offers across every configured provider with one filter
//! - Compare prices and catalog performance scores side by side
//! - Create, start, stop and destroy instances through a single ID scheme
//! - Aggregate price and availability statistics
//!
//! ## Architecture
//!
//! 1. **Adapters**: one [`provider::ProviderAdapter`] per provider (Vast.ai REST,
//!    `RunPod` GraphQL)
//! 2. **Catalog**: reference GPU specs used to enrich every record
//! 3. **Marketplace**: fans out searches, post-filters and sorts, and routes
//!    lifecycle calls by the provider prefix of the composite ID
//!
//! ## Modules
//!
//! - [`model`]: Normalized records, composite IDs, filters and requests
//! - [`catalog`]: GPU model catalog
//! - [`provider`]: Provider adapters and HTTP transport
//! - [`marketplace`]: Aggregation engine, statistics and provider directory
//! - [`config`]: Settings from YAML, `.env` and the environment
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! # gpu-cloud.yaml
//! vast_ai:
//!   api_key: "..."
//! runpod:
//!   api_key: "..."
//! http:
//!   timeout_secs: 30
//!   max_retries: 3
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod marketplace;
pub mod model;
pub mod provider;

// ============================================================================
// Re-exports
// ============================================================================

pub use catalog::{GpuCatalog, GpuCategory, GpuModelSpec};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigLoader, Settings};
pub use error::{ConfigError, GpuCloudError, ProviderApiError, Result};
pub use marketplace::{Marketplace, MarketplaceBuilder, MarketplaceStats, ProviderInfo};
pub use model::{
    AdvancedSearchFilter, CreateInstanceRequest, InstanceStatus, NormalizedInstance, Provider,
    SearchFilter,
};
pub use provider::{ProviderAdapter, RunPodAdapter, VastAdapter};
