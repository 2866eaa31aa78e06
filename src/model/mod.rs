//! Provider-agnostic data model.
//!
//! This module contains:
//! - [`NormalizedInstance`] and its status and provider enums
//! - The composite ID codec ([`IdCodec`])
//! - Search filters and creation requests

pub mod filter;
pub mod id;
pub mod instance;
pub mod request;

pub use filter::{AdvancedSearchFilter, SearchFilter, SortKey, SortOrder};
pub use id::{IdCodec, encode};
pub use instance::{
    InstanceStatus, NetworkInfo, NormalizedInstance, Provider, ProviderData, ProviderValue,
};
pub use request::{CreateInstanceRequest, PortMapping, ResourceRequests};
