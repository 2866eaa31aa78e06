//! `RunPod` API types and data structures.
//!
//! This module defines the types used for communication with the `RunPod` GraphQL API.

use serde::{Deserialize, Serialize};

use crate::provider::http::null_as_default;

/// A `RunPod` pod.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    /// Unique pod identifier.
    pub id: String,
    /// Pod name.
    #[serde(default)]
    pub name: Option<String>,
    /// Requested status.
    #[serde(default, deserialize_with = "null_as_default")]
    pub desired_status: PodStatus,
    /// Image name.
    #[serde(default)]
    pub image_name: Option<String>,
    /// Host machine information.
    #[serde(default)]
    pub machine: Option<PodMachine>,
    /// Runtime information, present while running.
    #[serde(default)]
    pub runtime: Option<PodRuntime>,
    /// GPU count.
    #[serde(default)]
    pub gpu_count: Option<u32>,
    /// Volume in GB.
    #[serde(default)]
    pub volume_in_gb: Option<f64>,
    /// Container disk in GB.
    #[serde(default)]
    pub container_disk_in_gb: Option<f64>,
    /// Memory in GB.
    #[serde(default)]
    pub memory_in_gb: Option<f64>,
    /// vCPU count.
    #[serde(default)]
    pub vcpu_count: Option<f64>,
    /// Hourly cost.
    #[serde(default)]
    pub cost_per_hr: Option<f64>,
    /// Last status change description.
    #[serde(default)]
    pub last_status_change: Option<String>,
}

/// Pod machine information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodMachine {
    /// Host identifier.
    #[serde(default)]
    pub pod_host_id: Option<String>,
    /// GPU type identifier.
    #[serde(default)]
    pub gpu_type_id: Option<String>,
    /// GPU display name.
    #[serde(default)]
    pub gpu_display_name: Option<String>,
    /// Whether the host is in the secure cloud.
    #[serde(default)]
    pub secure_cloud: Option<bool>,
    /// Datacenter location.
    #[serde(default)]
    pub location: Option<String>,
}

/// Pod runtime information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodRuntime {
    /// Ports configuration.
    #[serde(default)]
    pub ports: Option<Vec<PodPort>>,
    /// Uptime in seconds.
    #[serde(default)]
    pub uptime_in_seconds: Option<u64>,
}

/// Pod port information.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodPort {
    /// IP address.
    #[serde(default)]
    pub ip: Option<String>,
    /// Whether the IP is public.
    #[serde(default)]
    pub is_ip_public: Option<bool>,
    /// Container port.
    pub private_port: u16,
    /// Public port.
    #[serde(default)]
    pub public_port: Option<u16>,
    /// Port type.
    #[serde(rename = "type", default)]
    pub port_type: Option<String>,
}

/// Pod environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodEnvVar {
    /// Variable key.
    pub key: String,
    /// Variable value.
    pub value: String,
}

/// Pod desired status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PodStatus {
    /// Pod is running.
    Running,
    /// Pod was created but not started.
    Created,
    /// Pod is starting.
    Starting,
    /// Pod exited.
    Exited,
    /// Pod is stopped.
    Stopped,
    /// Pod is terminated.
    Terminated,
    /// Unknown status.
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for PodStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            Self::Running => "RUNNING",
            Self::Created => "CREATED",
            Self::Starting => "STARTING",
            Self::Exited => "EXITED",
            Self::Stopped => "STOPPED",
            Self::Terminated => "TERMINATED",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{status}")
    }
}

/// Lowest available prices for a GPU type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowestPrice {
    /// Minimum spot bid.
    #[serde(default)]
    pub minimum_bid_price: Option<f64>,
    /// On-demand price.
    #[serde(default)]
    pub uninterruptable_price: Option<f64>,
}

/// GPU type information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuType {
    /// GPU type ID.
    pub id: String,
    /// Display name.
    pub display_name: String,
    /// Memory in GB.
    #[serde(default)]
    pub memory_in_gb: Option<u32>,
    /// Whether it's available in secure cloud.
    #[serde(default, deserialize_with = "null_as_default")]
    pub secure_cloud: bool,
    /// Whether it's available in community cloud.
    #[serde(default, deserialize_with = "null_as_default")]
    pub community_cloud: bool,
    /// Price per hour for secure cloud.
    #[serde(default)]
    pub secure_price: Option<f64>,
    /// Price per hour for community cloud.
    #[serde(default)]
    pub community_price: Option<f64>,
    /// Lowest current prices.
    #[serde(default)]
    pub lowest_price: Option<LowestPrice>,
}

impl GpuType {
    /// Returns the cheapest on-demand price, or 0.0 if none is known.
    ///
    /// The lowest uninterruptable price wins when positive; otherwise the
    /// cheaper of the positive community and secure prices.
    #[must_use]
    pub fn hourly_price(&self) -> f64 {
        if let Some(price) = self
            .lowest_price
            .as_ref()
            .and_then(|p| p.uninterruptable_price)
            .filter(|p| *p > 0.0)
        {
            return price;
        }

        [self.community_price, self.secure_price]
            .into_iter()
            .flatten()
            .filter(|p| *p > 0.0)
            .min_by(f64::total_cmp)
            .unwrap_or(0.0)
    }
}

/// Input of `podFindAndDeployOnDemand`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreatePodRequest {
    /// Cloud type (SECURE, COMMUNITY or ALL).
    pub cloud_type: String,
    /// GPU type ID.
    pub gpu_type_id: String,
    /// Number of GPUs.
    pub gpu_count: u32,
    /// Pod name.
    pub name: String,
    /// Container image.
    pub image_name: String,
    /// Volume in GB.
    pub volume_in_gb: u32,
    /// Container disk in GB.
    pub container_disk_in_gb: u32,
    /// Volume mount path.
    pub volume_mount_path: String,
    /// Ports to expose (e.g., "8888/http,22/tcp").
    pub ports: String,
    /// Environment variables.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<PodEnvVar>,
    /// Docker command arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_args: Option<String>,
    /// Minimum system memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_memory_in_gb: Option<u32>,
}

impl CreatePodRequest {
    /// Creates a pod request with the default community settings.
    #[must_use]
    pub fn new(name: &str, gpu_type_id: &str, image: &str) -> Self {
        Self {
            cloud_type: String::from("COMMUNITY"),
            gpu_type_id: gpu_type_id.to_string(),
            gpu_count: 1,
            name: name.to_string(),
            image_name: image.to_string(),
            volume_in_gb: 0,
            container_disk_in_gb: 10,
            volume_mount_path: String::from("/workspace"),
            ports: String::from("22/tcp,8888/tcp"),
            env: Vec::new(),
            docker_args: None,
            min_memory_in_gb: None,
        }
    }

    /// Sets the GPU count.
    #[must_use]
    pub const fn with_gpu_count(mut self, count: u32) -> Self {
        self.gpu_count = count;
        self
    }

    /// Sets the volume size.
    #[must_use]
    pub const fn with_volume_gb(mut self, size_gb: u32) -> Self {
        self.volume_in_gb = size_gb;
        self
    }

    /// Sets the ports to expose.
    #[must_use]
    pub fn with_ports(mut self, ports: &str) -> Self {
        self.ports = ports.to_string();
        self
    }

    /// Adds an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push(PodEnvVar {
            key: key.to_string(),
            value: value.to_string(),
        });
        self
    }
}
