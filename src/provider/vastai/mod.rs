//! Vast.ai integration.
//!
//! This module contains:
//! - REST API client
//! - Native API types
//! - Conversions onto the normalized model

pub mod adapter;
pub mod client;
pub mod types;

pub use adapter::VastAdapter;
pub use client::VastClient;
pub use types::{VastInstance, VastOffer, VastSearchQuery};
