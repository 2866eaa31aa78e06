//! Aggregation engine and lifecycle router.
//!
//! The [`Marketplace`] fans searches out to every configured adapter, enriches
//! the results from the catalog, post-filters and sorts them. Lifecycle calls
//! are routed to one adapter by decoding the composite instance ID.

use futures::future::try_join_all;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::catalog::GpuCatalog;
use crate::config::Settings;
use crate::error::{ConfigError, GpuCloudError, Result};
use crate::model::{
    AdvancedSearchFilter, CreateInstanceRequest, IdCodec, NormalizedInstance, Provider,
    SearchFilter,
};
use crate::provider::runpod::RunPodClient;
use crate::provider::vastai::VastClient;
use crate::provider::{ProviderAdapter, RunPodAdapter, VastAdapter};

use super::filter::{apply_filter, sort_instances};
use super::stats::MarketplaceStats;

/// Aggregated view over all configured providers.
pub struct Marketplace {
    adapters: BTreeMap<Provider, Arc<dyn ProviderAdapter>>,
    catalog: Arc<GpuCatalog>,
    codec: IdCodec,
}

impl std::fmt::Debug for Marketplace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Marketplace")
            .field("providers", &self.adapters.keys().collect::<Vec<_>>())
            .field("catalog_models", &self.catalog.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Marketplace`].
#[derive(Default)]
pub struct MarketplaceBuilder {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    catalog: Option<Arc<GpuCatalog>>,
}

impl MarketplaceBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter.
    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Sets the catalog; the built-in one is used otherwise.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<GpuCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Builds the marketplace.
    ///
    /// # Errors
    ///
    /// Returns an error if two adapters serve the same provider.
    pub fn build(self) -> Result<Marketplace> {
        let mut adapters: BTreeMap<Provider, Arc<dyn ProviderAdapter>> = BTreeMap::new();

        for adapter in self.adapters {
            let provider = adapter.provider();
            if adapters.insert(provider, adapter).is_some() {
                return Err(ConfigError::validation(
                    format!("{provider} adapter registered twice"),
                    provider.as_str(),
                )
                .into());
            }
        }

        Ok(Marketplace {
            adapters,
            catalog: self
                .catalog
                .unwrap_or_else(|| Arc::new(GpuCatalog::builtin())),
            codec: IdCodec::default(),
        })
    }
}

impl Marketplace {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> MarketplaceBuilder {
        MarketplaceBuilder::new()
    }

    /// Creates a marketplace with an adapter for every provider that has an API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded or an HTTP client
    /// cannot be built.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut builder = Self::builder().with_catalog(Arc::new(settings.load_catalog()?));

        for provider in settings.configured_providers() {
            let credentials = settings.credentials(provider);
            let Some(api_key) = credentials.api_key() else {
                continue;
            };

            let adapter: Arc<dyn ProviderAdapter> = match provider {
                Provider::VastAi => {
                    let mut client = VastClient::new(api_key, settings.http.clone())
                        .map_err(|e| GpuCloudError::provider_api(provider, e))?;
                    if let Some(url) = credentials.base_url() {
                        client = client.with_base_url(url);
                    }
                    Arc::new(VastAdapter::new(client))
                }
                Provider::RunPod => {
                    let mut client = RunPodClient::new(api_key, settings.http.clone())
                        .map_err(|e| GpuCloudError::provider_api(provider, e))?;
                    if let Some(url) = credentials.base_url() {
                        client = client.with_endpoint(url);
                    }
                    Arc::new(RunPodAdapter::new(client))
                }
            };

            debug!("Configured {provider} adapter");
            builder = builder.with_adapter(adapter);
        }

        builder.build()
    }

    /// Providers with a configured adapter, in registration order.
    pub fn providers(&self) -> impl Iterator<Item = Provider> + '_ {
        self.adapters.keys().copied()
    }

    /// True if the provider has a configured adapter.
    #[must_use]
    pub fn is_configured(&self, provider: Provider) -> bool {
        self.adapters.contains_key(&provider)
    }

    /// The catalog used for enrichment.
    #[must_use]
    pub fn catalog(&self) -> &GpuCatalog {
        &self.catalog
    }

    fn adapter(&self, provider: Provider) -> Result<&Arc<dyn ProviderAdapter>> {
        self.adapters
            .get(&provider)
            .ok_or(GpuCloudError::ProviderNotConfigured { provider })
    }

    fn resolve(&self, id: &str) -> Result<(&Arc<dyn ProviderAdapter>, String)> {
        let (provider, native_id) = self.codec.decode(id)?;
        Ok((self.adapter(provider)?, native_id))
    }

    fn enrich_all(&self, instances: &mut [NormalizedInstance]) {
        for instance in instances {
            self.catalog.enrich(instance);
        }
    }

    /// Searches with the basic filter, sorted by ascending price.
    ///
    /// # Errors
    ///
    /// Returns the first adapter failure.
    pub async fn search_offers(&self, filter: &SearchFilter) -> Result<Vec<NormalizedInstance>> {
        self.search_offers_advanced(&filter.clone().into()).await
    }

    /// Searches all candidate providers and returns sound, sorted results.
    ///
    /// Naming a provider that is not configured yields no results.
    ///
    /// # Errors
    ///
    /// Returns the first adapter failure; partial results are discarded.
    pub async fn search_offers_advanced(
        &self,
        filter: &AdvancedSearchFilter,
    ) -> Result<Vec<NormalizedInstance>> {
        let candidates: Vec<&Arc<dyn ProviderAdapter>> = match filter.provider {
            Some(provider) => self.adapters.get(&provider).into_iter().collect(),
            None => self.adapters.values().collect(),
        };

        if candidates.is_empty() {
            debug!("No configured provider matches the search");
            return Ok(Vec::new());
        }

        info!("Searching offers across {} providers", candidates.len());
        let batches = try_join_all(candidates.iter().map(|adapter| {
            observe(adapter.provider(), "offer search", adapter.search_offers(filter))
        }))
        .await?;

        let mut offers: Vec<NormalizedInstance> = batches.into_iter().flatten().collect();
        let fetched = offers.len();
        self.enrich_all(&mut offers);

        let mut offers = apply_filter(offers, filter);
        sort_instances(&mut offers, filter.sort_by, filter.sort_order);

        debug!("{} of {fetched} offers matched", offers.len());
        Ok(offers)
    }

    /// Lists owned instances across all configured providers.
    ///
    /// # Errors
    ///
    /// Returns the first adapter failure.
    pub async fn list_instances(&self) -> Result<Vec<NormalizedInstance>> {
        info!("Listing instances across {} providers", self.adapters.len());

        let batches = try_join_all(
            self.adapters
                .values()
                .map(|adapter| observe(adapter.provider(), "instance listing", adapter.list_instances())),
        )
        .await?;

        let mut instances: Vec<NormalizedInstance> = batches.into_iter().flatten().collect();
        self.enrich_all(&mut instances);
        Ok(instances)
    }

    /// Fetches one instance by composite ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the ID cannot be routed or the provider call fails.
    pub async fn get_instance(&self, id: &str) -> Result<NormalizedInstance> {
        let (adapter, native_id) = self.resolve(id)?;
        debug!("Fetching {} instance {native_id}", adapter.provider());

        let mut instance = adapter.get_instance(&native_id).await?;
        self.catalog.enrich(&mut instance);
        Ok(instance)
    }

    /// Creates an instance on the requested provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is invalid, the provider is not
    /// configured, or the provider call fails.
    pub async fn create_instance(&self, request: &CreateInstanceRequest) -> Result<NormalizedInstance> {
        request.validate()?;
        let adapter = self.adapter(request.provider)?;

        info!("Creating {} instance from offer {}", request.provider, request.offer_id);
        let mut instance = adapter.create_instance(request).await.inspect_err(|e| {
            error!("Failed to create {} instance: {e}", request.provider);
        })?;

        self.catalog.enrich(&mut instance);
        info!("Created instance {}", instance.id);
        Ok(instance)
    }

    /// Starts an instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the ID cannot be routed or the provider call fails.
    pub async fn start_instance(&self, id: &str) -> Result<()> {
        let (adapter, native_id) = self.resolve(id)?;
        info!("Starting instance {id}");
        adapter.start_instance(&native_id).await
    }

    /// Stops an instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the ID cannot be routed or the provider call fails.
    pub async fn stop_instance(&self, id: &str) -> Result<()> {
        let (adapter, native_id) = self.resolve(id)?;
        info!("Stopping instance {id}");
        adapter.stop_instance(&native_id).await
    }

    /// Destroys an instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the ID cannot be routed or the provider call fails.
    pub async fn destroy_instance(&self, id: &str) -> Result<()> {
        let (adapter, native_id) = self.resolve(id)?;
        info!("Destroying instance {id}");
        adapter.destroy_instance(&native_id).await
    }

    /// Aggregates statistics over all available offers.
    ///
    /// # Errors
    ///
    /// Returns the first adapter failure.
    pub async fn marketplace_stats(&self) -> Result<MarketplaceStats> {
        let filter = AdvancedSearchFilter {
            available: Some(true),
            ..AdvancedSearchFilter::default()
        };
        let offers = self.search_offers_advanced(&filter).await?;
        Ok(MarketplaceStats::from_offers(&offers, &self.catalog))
    }
}

/// Awaits one adapter call, logging its duration or failure.
async fn observe<F>(provider: Provider, operation: &str, call: F) -> Result<Vec<NormalizedInstance>>
where
    F: Future<Output = Result<Vec<NormalizedInstance>>>,
{
    let started = Instant::now();
    match call.await {
        Ok(records) => {
            debug!(
                "{provider} {operation} returned {} records in {:?}",
                records.len(),
                started.elapsed()
            );
            Ok(records)
        }
        Err(e) => {
            error!("{provider} {operation} failed: {e}");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderApiError;
    use crate::model::{InstanceStatus, SortKey, SortOrder};
    use crate::provider::MockProviderAdapter;

    fn offer(provider: Provider, id: &str, model: &str, price: f64) -> NormalizedInstance {
        NormalizedInstance::new(provider, id)
            .with_gpu(model, 1)
            .with_price(price)
    }

    fn searching(provider: Provider, offers: Vec<NormalizedInstance>) -> MockProviderAdapter {
        let mut mock = MockProviderAdapter::new();
        mock.expect_provider().return_const(provider);
        mock.expect_search_offers()
            .returning(move |_| Ok(offers.clone()));
        mock
    }

    fn marketplace(adapters: Vec<MockProviderAdapter>) -> Marketplace {
        adapters
            .into_iter()
            .fold(Marketplace::builder(), |builder, mock| {
                builder.with_adapter(Arc::new(mock))
            })
            .build()
            .expect("marketplace")
    }

    fn two_provider_marketplace() -> Marketplace {
        marketplace(vec![
            searching(
                Provider::VastAi,
                vec![
                    offer(Provider::VastAi, "1", "RTX 4090", 1.2),
                    offer(Provider::VastAi, "2", "H100", 2.5),
                    offer(Provider::VastAi, "3", "RTX 3090", 0.3)
                        .with_status(InstanceStatus::Rented),
                ],
            ),
            searching(
                Provider::RunPod,
                vec![
                    offer(Provider::RunPod, "a", "RTX 4090", 0.9),
                    offer(Provider::RunPod, "b", "NVIDIA L4", 0.4),
                ],
            ),
        ])
    }

    fn ids(offers: &[NormalizedInstance]) -> Vec<&str> {
        offers.iter().map(|o| o.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_basic_search_sorts_by_price() {
        let market = two_provider_marketplace();
        let offers = market
            .search_offers(&SearchFilter::default())
            .await
            .expect("offers");

        assert_eq!(
            ids(&offers),
            vec!["vast_3", "runpod_b", "runpod_a", "vast_1", "vast_2"]
        );
    }

    #[tokio::test]
    async fn test_results_satisfy_filter() {
        let market = two_provider_marketplace();
        let filter = AdvancedSearchFilter {
            gpu_model: Some("rtx".to_string()),
            max_price: Some(1.0),
            available: Some(true),
            ..AdvancedSearchFilter::default()
        };

        let offers = market.search_offers_advanced(&filter).await.expect("offers");
        assert_eq!(ids(&offers), vec!["runpod_a"]);
    }

    #[tokio::test]
    async fn test_results_are_enriched() {
        let market = two_provider_marketplace();
        let offers = market
            .search_offers(&SearchFilter::default())
            .await
            .expect("offers");

        let h100 = offers.iter().find(|o| o.id == "vast_2").expect("h100");
        assert_eq!(h100.performance_score, Some(150));
        let l4 = offers.iter().find(|o| o.id == "runpod_b").expect("l4");
        assert!(l4.performance_score.is_none());
    }

    #[tokio::test]
    async fn test_performance_orders_are_reverses() {
        let market = marketplace(vec![searching(
            Provider::VastAi,
            vec![
                offer(Provider::VastAi, "1", "RTX 4090", 1.0),
                offer(Provider::VastAi, "2", "H100", 2.0),
                offer(Provider::VastAi, "3", "RTX 3070", 0.2),
            ],
        )]);

        let mut filter = AdvancedSearchFilter {
            sort_by: SortKey::Performance,
            sort_order: SortOrder::Desc,
            ..AdvancedSearchFilter::default()
        };
        let desc = market.search_offers_advanced(&filter).await.expect("desc");

        filter.sort_order = SortOrder::Asc;
        let asc = market.search_offers_advanced(&filter).await.expect("asc");

        let mut reversed = ids(&asc);
        reversed.reverse();
        assert_eq!(ids(&desc), reversed);
        assert_eq!(ids(&desc), vec!["vast_2", "vast_1", "vast_3"]);
    }

    #[tokio::test]
    async fn test_provider_filter_limits_fan_out() {
        let mut vast = MockProviderAdapter::new();
        vast.expect_provider().return_const(Provider::VastAi);
        vast.expect_search_offers().never();

        let market = marketplace(vec![
            vast,
            searching(Provider::RunPod, vec![offer(Provider::RunPod, "a", "A40", 0.5)]),
        ]);

        let filter = SearchFilter {
            provider: Some(Provider::RunPod),
            ..SearchFilter::default()
        };
        let offers = market.search_offers(&filter).await.expect("offers");
        assert_eq!(ids(&offers), vec!["runpod_a"]);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_filter_yields_nothing() {
        let market = marketplace(vec![searching(
            Provider::VastAi,
            vec![offer(Provider::VastAi, "1", "A100", 1.0)],
        )]);

        let filter = SearchFilter {
            provider: Some(Provider::RunPod),
            ..SearchFilter::default()
        };
        let offers = market.search_offers(&filter).await.expect("offers");
        assert!(offers.is_empty());
    }

    #[tokio::test]
    async fn test_adapter_failure_aborts_search() {
        let mut failing = MockProviderAdapter::new();
        failing.expect_provider().return_const(Provider::RunPod);
        failing.expect_search_offers().returning(|_| {
            Err(GpuCloudError::provider_api(
                Provider::RunPod,
                ProviderApiError::network("connection reset"),
            ))
        });

        let market = marketplace(vec![
            searching(Provider::VastAi, vec![offer(Provider::VastAi, "1", "A100", 1.0)]),
            failing,
        ]);

        let result = market.search_offers(&SearchFilter::default()).await;
        assert!(matches!(
            result,
            Err(GpuCloudError::ProviderApi { provider: Provider::RunPod, .. })
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_routes_by_prefix() {
        let mut vast = MockProviderAdapter::new();
        vast.expect_provider().return_const(Provider::VastAi);
        vast.expect_stop_instance()
            .times(1)
            .returning(|native_id: &str| {
                assert_eq!(native_id, "12345");
                Ok(())
            });
        vast.expect_get_instance().times(1).returning(|native_id: &str| {
            Ok(NormalizedInstance::new(Provider::VastAi, native_id).with_gpu("A100", 1))
        });

        let mut runpod = MockProviderAdapter::new();
        runpod.expect_provider().return_const(Provider::RunPod);
        runpod.expect_destroy_instance()
            .times(1)
            .returning(|native_id: &str| {
                assert_eq!(native_id, "pod_abc");
                Ok(())
            });

        let market = marketplace(vec![vast, runpod]);

        market.stop_instance("vast_12345").await.expect("stop");
        market.destroy_instance("runpod_pod_abc").await.expect("destroy");

        let instance = market.get_instance("vast_7").await.expect("get");
        assert_eq!(instance.id, "vast_7");
        assert_eq!(instance.performance_score, Some(120));
    }

    #[tokio::test]
    async fn test_lifecycle_routing_errors() {
        let market = marketplace(vec![searching(Provider::VastAi, Vec::new())]);

        assert!(matches!(
            market.start_instance("xx").await,
            Err(GpuCloudError::InvalidIdFormat { .. })
        ));
        assert!(matches!(
            market.start_instance("unknown_1").await,
            Err(GpuCloudError::UnknownProvider { .. })
        ));
        assert!(matches!(
            market.start_instance("runpod_abc").await,
            Err(GpuCloudError::ProviderNotConfigured { provider: Provider::RunPod })
        ));
    }

    #[tokio::test]
    async fn test_create_validates_and_dispatches() {
        let mut runpod = MockProviderAdapter::new();
        runpod.expect_provider().return_const(Provider::RunPod);
        runpod.expect_create_instance().times(1).returning(|request| {
            Ok(NormalizedInstance::new(Provider::RunPod, "newpod")
                .with_gpu(request.offer_id.clone(), 1)
                .with_status(InstanceStatus::Starting))
        });

        let market = marketplace(vec![runpod]);

        let invalid = CreateInstanceRequest::new(Provider::RunPod, "");
        assert!(matches!(
            market.create_instance(&invalid).await,
            Err(GpuCloudError::InvalidRequest { .. })
        ));

        let unconfigured = CreateInstanceRequest::new(Provider::VastAi, "55");
        assert!(matches!(
            market.create_instance(&unconfigured).await,
            Err(GpuCloudError::ProviderNotConfigured { .. })
        ));

        let request = CreateInstanceRequest::new(Provider::RunPod, "H100");
        let instance = market.create_instance(&request).await.expect("created");
        assert_eq!(instance.id, "runpod_newpod");
        assert_eq!(instance.performance_score, Some(150));
    }

    #[tokio::test]
    async fn test_list_instances_concatenates_in_provider_order() {
        let mut vast = MockProviderAdapter::new();
        vast.expect_provider().return_const(Provider::VastAi);
        vast.expect_list_instances()
            .returning(|| Ok(vec![NormalizedInstance::new(Provider::VastAi, "1")]));

        let mut runpod = MockProviderAdapter::new();
        runpod.expect_provider().return_const(Provider::RunPod);
        runpod.expect_list_instances()
            .returning(|| Ok(vec![NormalizedInstance::new(Provider::RunPod, "a")]));

        let market = marketplace(vec![runpod, vast]);
        let instances = market.list_instances().await.expect("instances");
        assert_eq!(ids(&instances), vec!["vast_1", "runpod_a"]);
    }

    #[tokio::test]
    async fn test_marketplace_stats_over_available_offers() {
        let market = two_provider_marketplace();
        let stats = market.marketplace_stats().await.expect("stats");

        // The rented RTX 3090 is excluded by the availability filter.
        assert_eq!(stats.total_instances, 4);
        assert!(!stats.model_stats.contains_key("RTX 3090"));

        let rtx = &stats.model_stats["RTX 4090"];
        assert_eq!(rtx.providers, vec![Provider::RunPod, Provider::VastAi]);
        assert!((rtx.avg_price - 1.05).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_adapters_rejected() {
        let result = Marketplace::builder()
            .with_adapter(Arc::new(searching(Provider::VastAi, Vec::new())))
            .with_adapter(Arc::new(searching(Provider::VastAi, Vec::new())))
            .build();
        assert!(matches!(result, Err(GpuCloudError::Config(_))));
    }

    #[test]
    fn test_from_settings_skips_unconfigured() {
        let mut settings = Settings::default();
        settings.runpod.api_key = Some("rp-key".to_string());
        settings.vast_ai.api_key = Some("  ".to_string());

        let market = Marketplace::from_settings(&settings).expect("marketplace");
        assert_eq!(market.providers().collect::<Vec<_>>(), vec![Provider::RunPod]);
        assert!(!market.is_configured(Provider::VastAi));
    }
}
