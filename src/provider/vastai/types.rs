//! Vast.ai API types.
//!
//! Vast.ai returns `null` for many fields, so almost everything is optional.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::provider::http::null_as_default;

/// A rentable machine offer from `GET /bundles`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VastOffer {
    /// Ask ID, used to rent the offer.
    pub id: u64,
    /// Host machine ID.
    #[serde(default)]
    pub machine_id: Option<u64>,
    /// CUDA compute capability times 100.
    #[serde(default)]
    pub compute_cap: Option<i64>,
    /// Effective CPU cores.
    #[serde(default)]
    pub cpu_cores: Option<f64>,
    /// CPU model.
    #[serde(default)]
    pub cpu_name: Option<String>,
    /// GPU model.
    #[serde(default)]
    pub gpu_name: Option<String>,
    /// Memory per GPU.
    #[serde(default)]
    pub gpu_ram: Option<f64>,
    /// Number of GPUs.
    #[serde(default)]
    pub num_gpus: Option<u32>,
    /// System RAM in GB.
    #[serde(default, alias = "cpu_ram")]
    pub ram: Option<f64>,
    /// Disk space in GB.
    #[serde(default)]
    pub disk_space: Option<f64>,
    /// Disk model.
    #[serde(default)]
    pub disk_name: Option<String>,
    /// Download bandwidth in Mbps.
    #[serde(default)]
    pub inet_down: Option<f64>,
    /// Upload bandwidth in Mbps.
    #[serde(default)]
    pub inet_up: Option<f64>,
    /// Number of directly mapped ports.
    #[serde(default)]
    pub direct_port_count: Option<u32>,
    /// Total price per hour in USD.
    #[serde(default)]
    pub dph_total: Option<f64>,
    /// Host reliability score.
    #[serde(default, alias = "reliability")]
    pub reliability2: Option<f64>,
    /// Offer can be rented.
    #[serde(default, deserialize_with = "null_as_default")]
    pub rentable: bool,
    /// Offer is already rented.
    #[serde(default, deserialize_with = "null_as_default")]
    pub rented: bool,
    /// Public IPv4 address.
    #[serde(default)]
    pub public_ipaddr: Option<String>,
    /// Free-form location, e.g. `"Texas, US"`.
    #[serde(default)]
    pub geolocation: Option<String>,
    /// Datacenter name, if hosted in one.
    #[serde(default)]
    pub datacenter: Option<String>,
    /// Host uptime.
    #[serde(default)]
    pub host_run_time: Option<f64>,
    /// Vast.ai ranking score.
    #[serde(default)]
    pub score: Option<f64>,
}

impl VastOffer {
    /// Returns the region label: datacenter when known, else geolocation.
    #[must_use]
    pub fn region(&self) -> &str {
        self.datacenter
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.geolocation.as_deref())
            .unwrap_or_default()
    }
}

/// A rented instance from `GET /instances`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VastInstance {
    /// Instance (contract) ID.
    pub id: u64,
    /// Host machine ID.
    #[serde(default)]
    pub machine_id: Option<u64>,
    /// Last status message from the host.
    #[serde(default)]
    pub status_msg: Option<String>,
    /// Observed status.
    #[serde(default)]
    pub actual_status: Option<String>,
    /// Requested status.
    #[serde(default)]
    pub intended_status: Option<String>,
    /// Public IP address.
    #[serde(default)]
    pub public_ipaddr: Option<String>,
    /// SSH proxy host.
    #[serde(default)]
    pub ssh_host: Option<String>,
    /// SSH proxy port.
    #[serde(default)]
    pub ssh_port: Option<u16>,
    /// User label.
    #[serde(default)]
    pub label: Option<String>,
    /// Container image.
    #[serde(default)]
    pub image: Option<String>,
    /// On-start script.
    #[serde(default)]
    pub onstart: Option<String>,
    /// Total price per hour.
    #[serde(default)]
    pub dph_total: Option<f64>,
    /// Start time as a Unix timestamp.
    #[serde(default)]
    pub start_date: Option<f64>,
    /// Seconds since start.
    #[serde(default)]
    pub duration: Option<f64>,
    /// GPU model.
    #[serde(default)]
    pub gpu_name: Option<String>,
    /// Number of GPUs.
    #[serde(default)]
    pub num_gpus: Option<u32>,
    /// CPU cores.
    #[serde(default)]
    pub cpu_cores: Option<f64>,
    /// System RAM in MB.
    #[serde(default)]
    pub cpu_ram: Option<f64>,
    /// Disk space in GB.
    #[serde(default)]
    pub disk_space: Option<f64>,
    /// Free-form location.
    #[serde(default)]
    pub geolocation: Option<String>,
}

/// Native search parameters for `GET /bundles`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VastSearchQuery {
    /// Minimum number of GPUs.
    pub min_gpu_count: Option<u32>,
    /// Maximum price per hour.
    pub max_price: Option<f64>,
    /// Minimum RAM in GB.
    pub min_ram: Option<u32>,
    /// Only rentable offers.
    pub available_only: bool,
}

impl VastSearchQuery {
    /// Builds the query string pairs.
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();

        if let Some(count) = self.min_gpu_count.filter(|c| *c > 0) {
            pairs.push(("min_num_gpus", count.to_string()));
        }
        if let Some(price) = self.max_price.filter(|p| *p > 0.0) {
            pairs.push(("max_dph", format!("{:.2}", ceil_cents(price))));
        }
        if let Some(ram) = self.min_ram.filter(|r| *r > 0) {
            pairs.push(("min_ram", ram.to_string()));
        }
        if self.available_only {
            pairs.push(("rentable", String::from("true")));
        }
        pairs.push(("order", String::from("dph_total-")));

        pairs
    }
}

/// Rounds a price up to the cent, ignoring float noise below a micro-cent.
fn ceil_cents(price: f64) -> f64 {
    (price.mul_add(100.0, -1e-6)).ceil() / 100.0
}

/// Body of `PUT /asks/{id}/`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VastCreateBody {
    /// Bid price; `None` rents on demand.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Disk size in GB.
    pub disk: u32,
    /// Container image.
    pub image: String,
    /// Instance label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// On-start script.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onstart: Option<String>,
    /// Environment and port flags.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// Response of `PUT /asks/{id}/`.
#[derive(Debug, Clone, Deserialize)]
pub struct VastCreateResponse {
    /// Whether the ask was accepted.
    #[serde(default, deserialize_with = "null_as_default")]
    pub success: bool,
    /// ID of the new instance.
    #[serde(default)]
    pub new_contract: Option<u64>,
    /// Error message when not accepted.
    #[serde(default, alias = "msg")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_pairs() {
        let query = VastSearchQuery {
            min_gpu_count: Some(2),
            max_price: Some(1.5),
            min_ram: Some(0),
            available_only: true,
        };

        let pairs = query.to_query_pairs();
        assert!(pairs.contains(&("min_num_gpus", "2".to_string())));
        assert!(pairs.contains(&("max_dph", "1.50".to_string())));
        assert!(pairs.contains(&("rentable", "true".to_string())));
        assert!(pairs.iter().all(|(k, _)| *k != "min_ram"));
        assert_eq!(pairs.last(), Some(&("order", "dph_total-".to_string())));
    }

    #[test]
    fn test_max_price_rounds_up_to_cent() {
        let pair = |price: f64| {
            VastSearchQuery {
                max_price: Some(price),
                ..VastSearchQuery::default()
            }
            .to_query_pairs()
            .into_iter()
            .find(|(k, _)| *k == "max_dph")
            .map(|(_, v)| v)
        };
        assert_eq!(pair(0.995).as_deref(), Some("1.00"));
        assert_eq!(pair(0.991).as_deref(), Some("1.00"));
        assert_eq!(pair(0.07).as_deref(), Some("0.07"));
        assert_eq!(pair(1.1).as_deref(), Some("1.10"));
    }

    #[test]
    fn test_offer_tolerates_nulls() {
        let json = r#"{"id": 7, "gpu_name": null, "dph_total": null, "rentable": true, "reliability": 0.9}"#;
        let offer: VastOffer = serde_json::from_str(json).expect("should parse");
        assert_eq!(offer.id, 7);
        assert!(offer.gpu_name.is_none());
        assert_eq!(offer.reliability2, Some(0.9));
        assert_eq!(offer.region(), "");
    }

    #[test]
    fn test_offer_list_with_null_flags() {
        let json = r#"[{"id": 1, "rentable": null, "rented": null}, {"id": 2, "rentable": true, "rented": false}]"#;
        let offers: Vec<VastOffer> = serde_json::from_str(json).expect("should parse");
        assert_eq!(offers.len(), 2);
        assert!(!offers[0].rentable && !offers[0].rented);
        assert!(offers[1].rentable);
    }
}
