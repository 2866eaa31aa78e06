//! Instance creation requests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{GpuCloudError, Result};

use super::Provider;

/// Default container image when a request names none.
pub const DEFAULT_IMAGE: &str = "pytorch/pytorch:latest";

/// Default disk size in GB when a request names none.
pub const DEFAULT_DISK_GB: u32 = 10;

/// A port exposed by the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    /// Port inside the container.
    pub container_port: u16,
    /// Port on the host, if it should be pinned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
    /// Protocol, `tcp` or `udp`.
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    "tcp".to_string()
}

impl PortMapping {
    /// Creates a TCP mapping for a container port.
    #[must_use]
    pub fn tcp(container_port: u16) -> Self {
        Self {
            container_port,
            host_port: None,
            protocol: default_protocol(),
        }
    }

    /// Returns the host port, defaulting to the container port.
    #[must_use]
    pub fn effective_host_port(&self) -> u16 {
        self.host_port.unwrap_or(self.container_port)
    }
}

impl FromStr for PortMapping {
    type Err = GpuCloudError;

    /// Parses `container[:host][/proto]`, e.g. `8888`, `8888:80`, `53/udp`.
    fn from_str(s: &str) -> Result<Self> {
        let (ports, protocol) = match s.split_once('/') {
            Some((ports, proto)) => (ports, proto.trim().to_ascii_lowercase()),
            None => (s, default_protocol()),
        };

        let parse = |value: &str| {
            value
                .trim()
                .parse::<u16>()
                .map_err(|_| GpuCloudError::invalid_request(format!("invalid port mapping: {s}")))
        };

        let (container_port, host_port) = match ports.split_once(':') {
            Some((container, host)) => (parse(container)?, Some(parse(host)?)),
            None => (parse(ports)?, None),
        };

        Ok(Self {
            container_port,
            host_port,
            protocol,
        })
    }
}

/// Minimum resources requested for a new instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceRequests {
    /// Minimum RAM in GB.
    pub min_ram_gb: Option<u32>,
    /// Minimum storage in GB.
    pub min_storage_gb: Option<u32>,
    /// Minimum number of GPUs.
    pub min_gpus: Option<u32>,
}

/// Request to rent an offer and start an instance on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateInstanceRequest {
    /// Provider to create on.
    pub provider: Provider,
    /// Provider-native offer ID (Vast.ai ask ID, `RunPod` GPU type ID).
    pub offer_id: String,
    /// Container image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Script run when the instance starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onstart_script: Option<String>,
    /// Public SSH key to install.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<String>,
    /// Instance label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Environment variables.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Exposed ports.
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    /// Resource floors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequests>,
}

impl CreateInstanceRequest {
    /// Creates a request with no optional settings.
    #[must_use]
    pub fn new(provider: Provider, offer_id: impl Into<String>) -> Self {
        Self {
            provider,
            offer_id: offer_id.into(),
            image: None,
            onstart_script: None,
            ssh_key: None,
            label: None,
            environment: BTreeMap::new(),
            ports: Vec::new(),
            resources: None,
        }
    }

    /// Sets the container image.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Sets the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Adds an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Adds a port mapping.
    #[must_use]
    pub fn with_port(mut self, port: PortMapping) -> Self {
        self.ports.push(port);
        self
    }

    /// Sets resource floors.
    #[must_use]
    pub const fn with_resources(mut self, resources: ResourceRequests) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Returns the image, or the default one.
    #[must_use]
    pub fn image_or_default(&self) -> &str {
        self.image
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_IMAGE)
    }

    /// Returns the requested resource floors, or empty ones.
    #[must_use]
    pub fn resources_or_default(&self) -> ResourceRequests {
        self.resources.clone().unwrap_or_default()
    }

    /// Checks the request is well-formed.
    ///
    /// # Errors
    ///
    /// Returns [`GpuCloudError::InvalidRequest`] for an empty offer ID or a
    /// zero container port.
    pub fn validate(&self) -> Result<()> {
        if self.offer_id.trim().is_empty() {
            return Err(GpuCloudError::invalid_request("offer_id must not be empty"));
        }

        if let Some(port) = self.ports.iter().find(|p| p.container_port == 0) {
            return Err(GpuCloudError::invalid_request(format!(
                "container port must be non-zero (protocol {})",
                port.protocol
            )));
        }

        Ok(())
    }
}
