//! `RunPod` adapter: GPU types become offers, pods become instances.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::{GpuCloudError, Result};
use crate::model::instance::whole_units;
use crate::model::request::DEFAULT_DISK_GB;
use crate::model::{
    AdvancedSearchFilter, CreateInstanceRequest, InstanceStatus, NormalizedInstance, Provider,
    ProviderValue,
};
use crate::provider::ProviderAdapter;

use super::client::RunPodClient;
use super::types::{CreatePodRequest, GpuType, Pod, PodPort, PodStatus};

const PROVIDER: Provider = Provider::RunPod;

/// Region label for GPU type offers, which are not tied to one datacenter.
const GLOBAL_REGION: &str = "Global";

/// Adapter for the `RunPod` cloud.
#[derive(Debug, Clone)]
pub struct RunPodAdapter {
    client: RunPodClient,
}

impl RunPodAdapter {
    /// Creates an adapter over a configured client.
    #[must_use]
    pub const fn new(client: RunPodClient) -> Self {
        Self { client }
    }

    /// Builds the pod creation input for a request.
    #[must_use]
    pub fn create_pod_request(request: &CreateInstanceRequest) -> CreatePodRequest {
        let resources = request.resources_or_default();
        let name = request
            .label
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| format!("gpu-cloud-{}", request.offer_id));

        let mut pod = CreatePodRequest::new(&name, &request.offer_id, request.image_or_default())
            .with_gpu_count(resources.min_gpus.unwrap_or_default().max(1))
            .with_volume_gb(resources.min_storage_gb.unwrap_or_default());
        pod.container_disk_in_gb = DEFAULT_DISK_GB;
        pod.min_memory_in_gb = resources.min_ram_gb.filter(|gb| *gb > 0);

        if !request.ports.is_empty() {
            let ports = request
                .ports
                .iter()
                .map(|p| format!("{}/{}", p.container_port, p.protocol))
                .collect::<Vec<_>>()
                .join(",");
            pod = pod.with_ports(&ports);
        }

        for (key, value) in &request.environment {
            pod = pod.with_env(key, value);
        }

        if let Some(key) = request.ssh_key.as_deref().filter(|k| !k.is_empty()) {
            pod = pod.with_env("PUBLIC_KEY", key);
        }

        if let Some(script) = request.onstart_script.as_deref().filter(|s| !s.is_empty()) {
            pod.docker_args = Some(format!("bash -c '{}'", script.replace('\'', r"'\''")));
        }

        pod
    }
}

/// Converts a GPU type into a searchable offer.
#[must_use]
pub fn gpu_type_to_offer(gpu: &GpuType) -> NormalizedInstance {
    let status = if gpu.secure_cloud || gpu.community_cloud {
        InstanceStatus::Offline
    } else {
        InstanceStatus::Unavailable
    };
    let memory_gb = gpu.memory_in_gb.unwrap_or_default();

    let mut offer = NormalizedInstance::new(PROVIDER, gpu.id.clone())
        .with_name(format!("RunPod {}", gpu.display_name))
        .with_status(status)
        .with_gpu(gpu.display_name.clone(), 1)
        .with_resources(0, memory_gb, 0)
        .with_price(gpu.hourly_price())
        .with_region(GLOBAL_REGION)
        .with_data("secure_cloud", gpu.secure_cloud)
        .with_data("community_cloud", gpu.community_cloud)
        .with_data("gpu_memory_gb", memory_gb);

    let data = &mut offer.provider_data;
    let mut put = |key: &str, value: Option<f64>| {
        if let Some(value) = value {
            data.insert(key.to_string(), ProviderValue::Number(value));
        }
    };
    put("secure_price", gpu.secure_price);
    put("community_price", gpu.community_price);
    if let Some(lowest) = &gpu.lowest_price {
        put("minimum_bid_price", lowest.minimum_bid_price);
        put("uninterruptable_price", lowest.uninterruptable_price);
    }

    offer
}

/// Maps a pod's desired status onto the normalized status.
#[must_use]
pub const fn pod_status(status: PodStatus) -> InstanceStatus {
    match status {
        PodStatus::Running => InstanceStatus::Running,
        PodStatus::Created | PodStatus::Starting => InstanceStatus::Starting,
        PodStatus::Exited | PodStatus::Stopped | PodStatus::Terminated | PodStatus::Unknown => {
            InstanceStatus::Offline
        }
    }
}

fn port_value(port: &PodPort) -> ProviderValue {
    let mut map = BTreeMap::new();
    map.insert("private_port".to_string(), ProviderValue::from(port.private_port));
    if let Some(public) = port.public_port {
        map.insert("public_port".to_string(), ProviderValue::from(public));
    }
    if let Some(ip) = &port.ip {
        map.insert("ip".to_string(), ProviderValue::from(ip.as_str()));
    }
    if let Some(is_public) = port.is_ip_public {
        map.insert("is_ip_public".to_string(), ProviderValue::from(is_public));
    }
    if let Some(kind) = &port.port_type {
        map.insert("type".to_string(), ProviderValue::from(kind.as_str()));
    }
    ProviderValue::Map(map)
}

/// Converts a pod into a normalized record.
#[must_use]
pub fn pod_to_instance(pod: &Pod) -> NormalizedInstance {
    let machine = pod.machine.clone().unwrap_or_default();
    let gpu_model = machine
        .gpu_display_name
        .clone()
        .filter(|n| !n.is_empty())
        .or_else(|| machine.gpu_type_id.clone())
        .unwrap_or_default();
    let container_disk = pod.container_disk_in_gb.unwrap_or_default();
    let volume = pod.volume_in_gb.unwrap_or_default();

    let mut instance = NormalizedInstance::new(PROVIDER, pod.id.clone())
        .with_name(pod.name.clone().unwrap_or_default())
        .with_status(pod_status(pod.desired_status))
        .with_gpu(gpu_model, pod.gpu_count.unwrap_or_default())
        .with_resources(
            whole_units(pod.vcpu_count.unwrap_or_default()),
            whole_units(pod.memory_in_gb.unwrap_or_default()),
            whole_units(container_disk + volume),
        )
        .with_price(pod.cost_per_hr.unwrap_or_default())
        .with_region(machine.location.clone().unwrap_or_default())
        .with_data("container_disk", container_disk)
        .with_data("volume_gb", volume)
        .with_data("desired_status", pod.desired_status.to_string());

    let data = &mut instance.provider_data;
    if let Some(image) = &pod.image_name {
        data.insert("image_name".to_string(), image.as_str().into());
    }
    if let Some(change) = &pod.last_status_change {
        data.insert("last_status_change".to_string(), change.as_str().into());
    }
    if let Some(host) = machine.pod_host_id {
        data.insert("pod_host_id".to_string(), host.into());
    }
    if let Some(secure) = machine.secure_cloud {
        data.insert("secure_cloud".to_string(), secure.into());
    }
    if let Some(runtime) = &pod.runtime {
        if let Some(uptime) = runtime.uptime_in_seconds {
            data.insert("uptime_seconds".to_string(), uptime.into());
        }
        if let Some(ports) = runtime.ports.as_ref().filter(|p| !p.is_empty()) {
            data.insert(
                "ports".to_string(),
                ProviderValue::List(ports.iter().map(port_value).collect()),
            );
        }
    }

    instance
}

#[async_trait]
impl ProviderAdapter for RunPodAdapter {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    async fn search_offers(&self, _criteria: &AdvancedSearchFilter) -> Result<Vec<NormalizedInstance>> {
        // The GPU type listing takes no filters; the marketplace post-filters.
        let gpu_types = self
            .client
            .list_gpu_types()
            .await
            .map_err(|e| GpuCloudError::provider_api(PROVIDER, e))?;

        debug!("RunPod returned {} GPU types", gpu_types.len());
        Ok(gpu_types.iter().map(gpu_type_to_offer).collect())
    }

    async fn list_instances(&self) -> Result<Vec<NormalizedInstance>> {
        let pods = self
            .client
            .list_pods()
            .await
            .map_err(|e| GpuCloudError::provider_api(PROVIDER, e))?;

        Ok(pods.iter().map(pod_to_instance).collect())
    }

    async fn get_instance(&self, native_id: &str) -> Result<NormalizedInstance> {
        let pod = self
            .client
            .get_pod(native_id)
            .await
            .map_err(|e| GpuCloudError::instance_api(PROVIDER, native_id, e))?;

        Ok(pod_to_instance(&pod))
    }

    async fn create_instance(&self, request: &CreateInstanceRequest) -> Result<NormalizedInstance> {
        let pod_request = Self::create_pod_request(request);
        info!(
            "Creating pod: {} ({} x {})",
            pod_request.name, pod_request.gpu_count, pod_request.gpu_type_id
        );

        let pod = self
            .client
            .create_pod(&pod_request)
            .await
            .map_err(|e| GpuCloudError::instance_api(PROVIDER, &request.offer_id, e))?;

        info!("Created pod: {}", pod.id);
        Ok(pod_to_instance(&pod))
    }

    async fn start_instance(&self, native_id: &str) -> Result<()> {
        info!("Resuming pod: {native_id}");
        let pod = self
            .client
            .get_pod(native_id)
            .await
            .map_err(|e| GpuCloudError::instance_api(PROVIDER, native_id, e))?;

        self.client
            .resume_pod(native_id, pod.gpu_count.unwrap_or_default().max(1))
            .await
            .map_err(|e| GpuCloudError::instance_api(PROVIDER, native_id, e))
    }

    async fn stop_instance(&self, native_id: &str) -> Result<()> {
        info!("Stopping pod: {native_id}");
        self.client
            .stop_pod(native_id)
            .await
            .map_err(|e| GpuCloudError::instance_api(PROVIDER, native_id, e))
    }

    async fn destroy_instance(&self, native_id: &str) -> Result<()> {
        info!("Terminating pod: {native_id}");
        self.client
            .terminate_pod(native_id)
            .await
            .map_err(|e| GpuCloudError::instance_api(PROVIDER, native_id, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PortMapping, ResourceRequests};
    use crate::provider::HttpSettings;
    use crate::provider::runpod::types::{LowestPrice, PodMachine, PodRuntime};
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_adapter(server: &MockServer) -> RunPodAdapter {
        let settings = HttpSettings {
            timeout_secs: 5,
            max_retries: 0,
            retry_delay_ms: 0,
        };
        let client = RunPodClient::new("rp-key", settings)
            .expect("client")
            .with_endpoint(&server.uri());
        RunPodAdapter::new(client)
    }

    #[test]
    fn test_gpu_type_to_offer() {
        let gpu = GpuType {
            id: "NVIDIA A100 80GB PCIe".to_string(),
            display_name: "A100 80GB".to_string(),
            memory_in_gb: Some(80),
            secure_cloud: true,
            community_cloud: false,
            lowest_price: Some(LowestPrice {
                minimum_bid_price: Some(0.9),
                uninterruptable_price: Some(1.64),
            }),
            ..GpuType::default()
        };

        let offer = gpu_type_to_offer(&gpu);
        assert_eq!(offer.id, "runpod_NVIDIA A100 80GB PCIe");
        assert_eq!(offer.name, "RunPod A100 80GB");
        assert_eq!(offer.gpu_count, 1);
        assert_eq!(offer.ram_gb, 80);
        assert_eq!(offer.region, "Global");
        assert_eq!(offer.status, InstanceStatus::Offline);
        assert!((offer.price_per_hour - 1.64).abs() < f64::EPSILON);
        assert_eq!(
            offer.provider_data.get("secure_cloud").and_then(ProviderValue::as_bool),
            Some(true)
        );
    }

    #[test]
    fn test_gpu_type_without_cloud_is_unavailable() {
        let gpu = GpuType {
            id: "x".to_string(),
            display_name: "X".to_string(),
            ..GpuType::default()
        };
        assert_eq!(gpu_type_to_offer(&gpu).status, InstanceStatus::Unavailable);
    }

    #[test]
    fn test_pod_status_mapping() {
        assert_eq!(pod_status(PodStatus::Running), InstanceStatus::Running);
        assert_eq!(pod_status(PodStatus::Created), InstanceStatus::Starting);
        assert_eq!(pod_status(PodStatus::Starting), InstanceStatus::Starting);
        assert_eq!(pod_status(PodStatus::Exited), InstanceStatus::Offline);
        assert_eq!(pod_status(PodStatus::Terminated), InstanceStatus::Offline);
        assert_eq!(pod_status(PodStatus::Unknown), InstanceStatus::Offline);
    }

    #[test]
    fn test_pod_to_instance() {
        let pod = Pod {
            id: "abc123".to_string(),
            name: Some("trainer".to_string()),
            desired_status: PodStatus::Running,
            gpu_count: Some(2),
            container_disk_in_gb: Some(20.0),
            volume_in_gb: Some(50.0),
            cost_per_hr: Some(1.38),
            machine: Some(PodMachine {
                gpu_type_id: Some("NVIDIA RTX A6000".to_string()),
                location: Some("CA".to_string()),
                ..PodMachine::default()
            }),
            runtime: Some(PodRuntime {
                uptime_in_seconds: Some(120),
                ports: Some(vec![PodPort {
                    ip: Some("1.2.3.4".to_string()),
                    is_ip_public: Some(true),
                    private_port: 22,
                    public_port: Some(40022),
                    port_type: Some("tcp".to_string()),
                }]),
            }),
            ..Pod::default()
        };

        let instance = pod_to_instance(&pod);
        assert_eq!(instance.id, "runpod_abc123");
        assert_eq!(instance.status, InstanceStatus::Running);
        assert_eq!(instance.gpu_model, "NVIDIA RTX A6000");
        assert_eq!(instance.storage_gb, 70);
        assert_eq!(instance.region, "CA");
        assert!(matches!(
            instance.provider_data.get("ports"),
            Some(ProviderValue::List(ports)) if ports.len() == 1
        ));
    }

    #[test]
    fn test_create_pod_request_defaults() {
        let request = CreateInstanceRequest::new(Provider::RunPod, "NVIDIA GeForce RTX 4090");
        let pod = RunPodAdapter::create_pod_request(&request);

        assert_eq!(pod.cloud_type, "COMMUNITY");
        assert_eq!(pod.image_name, "pytorch/pytorch:latest");
        assert_eq!(pod.container_disk_in_gb, 10);
        assert_eq!(pod.volume_in_gb, 0);
        assert_eq!(pod.volume_mount_path, "/workspace");
        assert_eq!(pod.ports, "22/tcp,8888/tcp");
        assert_eq!(pod.gpu_count, 1);
        assert!(pod.min_memory_in_gb.is_none());
    }

    #[test]
    fn test_create_pod_request_overrides() {
        let mut request = CreateInstanceRequest::new(Provider::RunPod, "NVIDIA A100")
            .with_port(PortMapping::tcp(7860))
            .with_resources(ResourceRequests {
                min_ram_gb: Some(64),
                min_storage_gb: Some(100),
                min_gpus: Some(4),
            });
        request.ssh_key = Some("ssh-ed25519 AAAA".to_string());

        let pod = RunPodAdapter::create_pod_request(&request);
        assert_eq!(pod.ports, "7860/tcp");
        assert_eq!(pod.gpu_count, 4);
        assert_eq!(pod.volume_in_gb, 100);
        assert_eq!(pod.min_memory_in_gb, Some(64));
        assert!(pod.env.iter().any(|e| e.key == "PUBLIC_KEY"));
    }

    #[tokio::test]
    async fn test_search_offers_lists_gpu_types() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("gpuTypes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "gpuTypes": [
                    { "id": "NVIDIA H100", "displayName": "H100", "memoryInGb": 80,
                      "secureCloud": true, "communityCloud": false, "securePrice": 3.5 }
                ]}
            })))
            .mount(&server)
            .await;

        let offers = test_adapter(&server)
            .search_offers(&AdvancedSearchFilter::default())
            .await
            .expect("offers");
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].gpu_model, "H100");
        assert!((offers[0].price_per_hour - 3.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_get_missing_pod_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "data": { "pod": null } })),
            )
            .mount(&server)
            .await;

        let result = test_adapter(&server).get_instance("nope").await;
        assert!(matches!(
            result,
            Err(GpuCloudError::NotFound { provider: Provider::RunPod, ref native_id }) if native_id == "nope"
        ));
    }

    #[tokio::test]
    async fn test_stop_failure_carries_instance_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("podStop"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let result = test_adapter(&server).stop_instance("pod1").await;
        match result {
            Err(GpuCloudError::ProviderApi {
                provider, native_id, ..
            }) => {
                assert_eq!(provider, Provider::RunPod);
                assert_eq!(native_id.as_deref(), Some("pod1"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
