//! Provider adapter contract.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{AdvancedSearchFilter, CreateInstanceRequest, NormalizedInstance, Provider};

/// Maps one provider's API onto the normalized model.
///
/// Adapters translate criteria best-effort; the marketplace post-filters every
/// result, so an adapter may return a superset of what was asked for. Every
/// transport failure is reported as [`crate::GpuCloudError::ProviderApi`]
/// carrying this adapter's provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider this adapter talks to.
    fn provider(&self) -> Provider;

    /// Lists rentable offers matching the criteria as closely as the provider allows.
    async fn search_offers(&self, criteria: &AdvancedSearchFilter) -> Result<Vec<NormalizedInstance>>;

    /// Lists instances owned by the configured account.
    async fn list_instances(&self) -> Result<Vec<NormalizedInstance>>;

    /// Fetches one owned instance by native ID.
    async fn get_instance(&self, native_id: &str) -> Result<NormalizedInstance>;

    /// Rents an offer and returns the new instance.
    async fn create_instance(&self, request: &CreateInstanceRequest) -> Result<NormalizedInstance>;

    /// Starts a stopped instance.
    async fn start_instance(&self, native_id: &str) -> Result<()>;

    /// Stops a running instance.
    async fn stop_instance(&self, native_id: &str) -> Result<()>;

    /// Destroys an instance permanently.
    async fn destroy_instance(&self, native_id: &str) -> Result<()>;
}
