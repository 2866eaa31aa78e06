//! Normalized instance model shared by every provider.
//!
//! Each provider adapter maps its native offers and instances onto
//! [`NormalizedInstance`]. Fields the normalized schema does not capture are
//! kept in a typed [`ProviderData`] bag.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::catalog::GpuModelSpec;
use crate::error::GpuCloudError;

use super::id;

/// A GPU cloud provider known to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Provider {
    /// Vast.ai marketplace.
    #[serde(rename = "vast_ai")]
    VastAi,
    /// `RunPod` cloud.
    #[serde(rename = "runpod")]
    RunPod,
}

impl Provider {
    /// All known providers, in registration order.
    pub const ALL: [Self; 2] = [Self::VastAi, Self::RunPod];

    /// Returns the wire value of this provider.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VastAi => "vast_ai",
            Self::RunPod => "runpod",
        }
    }

    /// Returns the composite-ID prefix of this provider.
    ///
    /// Prefixes are distinct from the wire values and must never be a
    /// prefix of one another.
    #[must_use]
    pub const fn id_prefix(self) -> &'static str {
        match self {
            Self::VastAi => "vast",
            Self::RunPod => "runpod",
        }
    }

    /// Returns the human-readable provider name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::VastAi => "Vast.ai",
            Self::RunPod => "RunPod",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = GpuCloudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| GpuCloudError::invalid_request(format!("unsupported provider: {s}")))
    }
}

/// Normalized instance status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    /// Not running, but can be rented or started.
    #[default]
    Offline,
    /// Running.
    Running,
    /// Pulling the image or otherwise loading.
    Loading,
    /// Rented by someone else.
    Rented,
    /// Not offered at the moment.
    Unavailable,
    /// Starting up.
    Starting,
    /// Shutting down.
    Stopping,
    /// Provider reports an error.
    Error,
}

impl InstanceStatus {
    /// Returns true if an offer in this state can be rented or used.
    #[must_use]
    pub const fn is_available(self) -> bool {
        !matches!(self, Self::Rented | Self::Unavailable | Self::Error)
    }

    /// Returns the lowercase wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Running => "running",
            Self::Loading => "loading",
            Self::Rented => "rented",
            Self::Unavailable => "unavailable",
            Self::Starting => "starting",
            Self::Stopping => "stopping",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value in the provider-specific extension bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderValue {
    /// Boolean flag.
    Bool(bool),
    /// Whole number.
    Integer(i64),
    /// Floating-point number.
    Number(f64),
    /// Text.
    String(String),
    /// Ordered list of values.
    List(Vec<ProviderValue>),
    /// Nested mapping.
    Map(BTreeMap<String, ProviderValue>),
}

/// Provider-specific fields not represented in the normalized schema.
pub type ProviderData = BTreeMap<String, ProviderValue>;

impl ProviderValue {
    /// Returns the string value, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the numeric value, widening integers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the boolean value, if this is a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the nested map, if this is a map.
    #[must_use]
    pub const fn as_map(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<bool> for ProviderValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ProviderValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u64> for ProviderValue {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or_else(|_| Self::String(value.to_string()), Self::Integer)
    }
}

impl From<u32> for ProviderValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u16> for ProviderValue {
    fn from(value: u16) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for ProviderValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<String> for ProviderValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for ProviderValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl<T: Into<Self>> From<Vec<T>> for ProviderValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Self>> for ProviderValue {
    fn from(value: BTreeMap<String, Self>) -> Self {
        Self::Map(value)
    }
}

/// Network capabilities advertised for an offer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkInfo {
    /// Download bandwidth in Mbps.
    pub download_mbps: f64,
    /// Upload bandwidth in Mbps.
    pub upload_mbps: f64,
}

/// A GPU offer or running instance in provider-agnostic form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedInstance {
    /// Composite identifier, `<prefix>_<native id>`.
    pub id: String,
    /// Provider offering this instance.
    pub provider: Provider,
    /// Provider's own identifier.
    #[serde(rename = "provider_id")]
    pub provider_native_id: String,
    /// Display name or label.
    pub name: String,
    /// Normalized status.
    pub status: InstanceStatus,
    /// GPU model name as reported by the provider.
    pub gpu_model: String,
    /// Number of GPUs.
    pub gpu_count: u32,
    /// Number of CPU cores.
    pub cpu_count: u32,
    /// System memory in GB.
    pub ram_gb: u32,
    /// Disk space in GB.
    pub storage_gb: u32,
    /// Hourly price in USD.
    pub price_per_hour: f64,
    /// Region or datacenter.
    pub region: String,
    /// Provider-specific passthrough fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provider_data: ProviderData,
    /// Catalog data for the GPU model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_info: Option<GpuModelSpec>,
    /// Catalog performance score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_score: Option<u32>,
    /// Host reliability in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reliability: Option<f64>,
    /// Network bandwidth.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "network_info")]
    pub network: Option<NetworkInfo>,
}

impl NormalizedInstance {
    /// Creates an empty instance for a provider-native ID.
    ///
    /// The composite `id` is always derived here and never set on its own.
    #[must_use]
    pub fn new(provider: Provider, native_id: impl Into<String>) -> Self {
        let native_id = native_id.into();
        Self {
            id: id::encode(provider, &native_id),
            provider,
            provider_native_id: native_id,
            name: String::new(),
            status: InstanceStatus::Offline,
            gpu_model: String::new(),
            gpu_count: 0,
            cpu_count: 0,
            ram_gb: 0,
            storage_gb: 0,
            price_per_hour: 0.0,
            region: String::new(),
            provider_data: ProviderData::new(),
            gpu_info: None,
            performance_score: None,
            reliability: None,
            network: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the status.
    #[must_use]
    pub const fn with_status(mut self, status: InstanceStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the GPU model and count.
    #[must_use]
    pub fn with_gpu(mut self, model: impl Into<String>, count: u32) -> Self {
        self.gpu_model = model.into();
        self.gpu_count = count;
        self
    }

    /// Sets CPU, RAM and storage.
    #[must_use]
    pub const fn with_resources(mut self, cpu_count: u32, ram_gb: u32, storage_gb: u32) -> Self {
        self.cpu_count = cpu_count;
        self.ram_gb = ram_gb;
        self.storage_gb = storage_gb;
        self
    }

    /// Sets the hourly price; negative or NaN prices become zero.
    #[must_use]
    pub fn with_price(mut self, price_per_hour: f64) -> Self {
        self.price_per_hour = non_negative(price_per_hour);
        self
    }

    /// Sets the region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Adds a provider-specific field.
    #[must_use]
    pub fn with_data(mut self, key: &str, value: impl Into<ProviderValue>) -> Self {
        self.provider_data.insert(key.to_string(), value.into());
        self
    }

    /// Returns true if this offer can currently be rented or used.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.status.is_available()
    }
}

/// Clamps a float to a finite, non-negative value.
#[must_use]
pub fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 { value } else { 0.0 }
}

/// Converts a fractional provider quantity (cores, GB) to a whole count.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn whole_units(value: f64) -> u32 {
    // `as` saturates, so anything out of range lands on 0 or u32::MAX.
    non_negative(value).floor() as u32
}
