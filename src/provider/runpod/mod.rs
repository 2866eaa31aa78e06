//! `RunPod` API integration module.
//!
//! This module provides the GraphQL client, the native API types and the
//! conversions from GPU types and pods onto the normalized model.

pub mod adapter;
pub mod client;
pub mod types;

pub use adapter::RunPodAdapter;
pub use client::RunPodClient;
pub use types::{CreatePodRequest, GpuType, Pod, PodStatus};
