//! Vast.ai adapter: maps offers and instances onto the normalized model.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::{GpuCloudError, Result};
use crate::model::instance::whole_units;
use crate::model::request::DEFAULT_DISK_GB;
use crate::model::{
    AdvancedSearchFilter, CreateInstanceRequest, InstanceStatus, NetworkInfo, NormalizedInstance,
    Provider,
};
use crate::provider::ProviderAdapter;

use super::client::VastClient;
use super::types::{VastCreateBody, VastInstance, VastOffer, VastSearchQuery};

const PROVIDER: Provider = Provider::VastAi;

/// Adapter for the Vast.ai marketplace.
#[derive(Debug, Clone)]
pub struct VastAdapter {
    client: VastClient,
}

impl VastAdapter {
    /// Creates an adapter over a configured client.
    #[must_use]
    pub const fn new(client: VastClient) -> Self {
        Self { client }
    }

    /// Translates criteria into Vast.ai's native query.
    ///
    /// Model and region terms are substring matches, which Vast.ai cannot
    /// express; they are left to the post-filter.
    #[must_use]
    pub fn native_query(criteria: &AdvancedSearchFilter) -> VastSearchQuery {
        VastSearchQuery {
            min_gpu_count: criteria.min_gpu_count,
            max_price: criteria.max_price,
            min_ram: criteria.min_ram_gb,
            available_only: criteria.available == Some(true),
        }
    }

    /// Builds the native create body for a request.
    #[must_use]
    pub fn create_body(request: &CreateInstanceRequest) -> VastCreateBody {
        let resources = request.resources_or_default();
        let mut env: BTreeMap<String, String> = request.environment.clone();

        for port in &request.ports {
            env.insert(
                format!(
                    "-p {}:{}/{}",
                    port.effective_host_port(),
                    port.container_port,
                    port.protocol
                ),
                String::from("1"),
            );
        }

        if let Some(key) = request.ssh_key.as_deref().filter(|k| !k.is_empty()) {
            env.insert(String::from("SSH_PUBLIC_KEY"), key.to_string());
        }

        VastCreateBody {
            price: None,
            disk: resources
                .min_storage_gb
                .filter(|gb| *gb > 0)
                .unwrap_or(DEFAULT_DISK_GB),
            image: request.image_or_default().to_string(),
            label: request.label.clone(),
            onstart: request.onstart_script.clone(),
            env,
        }
    }
}

fn parse_native_id(native_id: &str) -> Result<u64> {
    native_id.parse().map_err(|_| {
        GpuCloudError::invalid_request(format!(
            "{PROVIDER} requires a numeric instance id: {native_id}"
        ))
    })
}

/// Converts a Vast.ai offer into a normalized record.
#[must_use]
pub fn offer_to_instance(offer: &VastOffer) -> NormalizedInstance {
    let status = if offer.rented {
        InstanceStatus::Rented
    } else if offer.rentable {
        InstanceStatus::Offline
    } else {
        InstanceStatus::Unavailable
    };

    let mut instance = NormalizedInstance::new(PROVIDER, offer.id.to_string())
        .with_name(format!(
            "Vast.ai Machine {}",
            offer.machine_id.unwrap_or_default()
        ))
        .with_status(status)
        .with_gpu(
            offer.gpu_name.clone().unwrap_or_default(),
            offer.num_gpus.unwrap_or_default(),
        )
        .with_resources(
            whole_units(offer.cpu_cores.unwrap_or_default()),
            whole_units(offer.ram.unwrap_or_default()),
            whole_units(offer.disk_space.unwrap_or_default()),
        )
        .with_price(offer.dph_total.unwrap_or_default())
        .with_region(offer.region());

    if let (Some(down), Some(up)) = (offer.inet_down, offer.inet_up) {
        instance.network = Some(NetworkInfo {
            download_mbps: down,
            upload_mbps: up,
        });
    }

    let data = &mut instance.provider_data;
    let mut put = |key: &str, value: Option<crate::model::ProviderValue>| {
        if let Some(value) = value {
            data.insert(key.to_string(), value);
        }
    };
    put("machine_id", offer.machine_id.map(Into::into));
    put("compute_cap", offer.compute_cap.map(Into::into));
    put("cpu_name", offer.cpu_name.clone().map(Into::into));
    put("gpu_memory_gb", offer.gpu_ram.map(Into::into));
    put("disk_name", offer.disk_name.clone().map(Into::into));
    put("internet_down", offer.inet_down.map(Into::into));
    put("internet_up", offer.inet_up.map(Into::into));
    put("public_ipv4", offer.public_ipaddr.clone().map(Into::into));
    put("reliability", offer.reliability2.map(Into::into));
    put("score", offer.score.map(Into::into));
    put("geolocation", offer.geolocation.clone().map(Into::into));
    put("host_run_time", offer.host_run_time.map(Into::into));
    put("direct_port_count", offer.direct_port_count.map(Into::into));

    instance
}

/// Maps Vast.ai's actual and intended status onto the normalized status.
#[must_use]
pub fn instance_status(actual: Option<&str>, intended: Option<&str>) -> InstanceStatus {
    let status = match actual.unwrap_or_default() {
        "running" => InstanceStatus::Running,
        "loading" => InstanceStatus::Loading,
        "created" | "scheduling" => InstanceStatus::Starting,
        _ => InstanceStatus::Offline,
    };

    if status == InstanceStatus::Running && intended == Some("stopped") {
        InstanceStatus::Stopping
    } else {
        status
    }
}

/// Converts a rented Vast.ai instance into a normalized record.
#[must_use]
pub fn instance_to_normalized(vast: &VastInstance) -> NormalizedInstance {
    let name = vast
        .label
        .clone()
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| format!("Vast.ai Instance {}", vast.id));

    let mut instance = NormalizedInstance::new(PROVIDER, vast.id.to_string())
        .with_name(name)
        .with_status(instance_status(
            vast.actual_status.as_deref(),
            vast.intended_status.as_deref(),
        ))
        .with_gpu(
            vast.gpu_name.clone().unwrap_or_default(),
            vast.num_gpus.unwrap_or_default(),
        )
        .with_resources(
            whole_units(vast.cpu_cores.unwrap_or_default()),
            whole_units(vast.cpu_ram.unwrap_or_default() / 1024.0),
            whole_units(vast.disk_space.unwrap_or_default()),
        )
        .with_price(vast.dph_total.unwrap_or_default())
        .with_region(vast.geolocation.clone().unwrap_or_default());

    let data = &mut instance.provider_data;
    let mut put = |key: &str, value: Option<crate::model::ProviderValue>| {
        if let Some(value) = value {
            data.insert(key.to_string(), value);
        }
    };
    put("machine_id", vast.machine_id.map(Into::into));
    put("ssh_host", vast.ssh_host.clone().map(Into::into));
    put("ssh_port", vast.ssh_port.map(Into::into));
    put("public_ipaddr", vast.public_ipaddr.clone().map(Into::into));
    put("image", vast.image.clone().map(Into::into));
    put("onstart_script", vast.onstart.clone().map(Into::into));
    put("start_date", vast.start_date.map(Into::into));
    put("duration", vast.duration.map(Into::into));
    put("status_msg", vast.status_msg.clone().map(Into::into));
    put("intended_status", vast.intended_status.clone().map(Into::into));

    instance
}

#[async_trait]
impl ProviderAdapter for VastAdapter {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    async fn search_offers(&self, criteria: &AdvancedSearchFilter) -> Result<Vec<NormalizedInstance>> {
        let query = Self::native_query(criteria);
        debug!("Vast.ai native query: {query:?}");

        let offers = self
            .client
            .search_offers(&query)
            .await
            .map_err(|e| GpuCloudError::provider_api(PROVIDER, e))?;

        Ok(offers.iter().map(offer_to_instance).collect())
    }

    async fn list_instances(&self) -> Result<Vec<NormalizedInstance>> {
        let instances = self
            .client
            .list_instances()
            .await
            .map_err(|e| GpuCloudError::provider_api(PROVIDER, e))?;

        Ok(instances.iter().map(instance_to_normalized).collect())
    }

    async fn get_instance(&self, native_id: &str) -> Result<NormalizedInstance> {
        let id = parse_native_id(native_id)?;
        let instance = self
            .client
            .get_instance(id)
            .await
            .map_err(|e| GpuCloudError::instance_api(PROVIDER, native_id, e))?;

        Ok(instance_to_normalized(&instance))
    }

    async fn create_instance(&self, request: &CreateInstanceRequest) -> Result<NormalizedInstance> {
        let offer_id = parse_native_id(&request.offer_id)?;
        let body = Self::create_body(request);

        info!("Renting Vast.ai offer {offer_id} with image {}", body.image);
        let contract = self
            .client
            .create_instance(offer_id, &body)
            .await
            .map_err(|e| GpuCloudError::instance_api(PROVIDER, &request.offer_id, e))?;

        let contract_id = contract.to_string();
        let instance = self
            .client
            .get_instance(contract)
            .await
            .map_err(|e| GpuCloudError::instance_api(PROVIDER, &contract_id, e))?;

        Ok(instance_to_normalized(&instance))
    }

    async fn start_instance(&self, native_id: &str) -> Result<()> {
        let id = parse_native_id(native_id)?;
        info!("Starting Vast.ai instance {id}");
        self.client
            .start_instance(id)
            .await
            .map_err(|e| GpuCloudError::instance_api(PROVIDER, native_id, e))
    }

    async fn stop_instance(&self, native_id: &str) -> Result<()> {
        let id = parse_native_id(native_id)?;
        info!("Stopping Vast.ai instance {id}");
        self.client
            .stop_instance(id)
            .await
            .map_err(|e| GpuCloudError::instance_api(PROVIDER, native_id, e))
    }

    async fn destroy_instance(&self, native_id: &str) -> Result<()> {
        let id = parse_native_id(native_id)?;
        info!("Destroying Vast.ai instance {id}");
        self.client
            .destroy_instance(id)
            .await
            .map_err(|e| GpuCloudError::instance_api(PROVIDER, native_id, e))
    }
}
