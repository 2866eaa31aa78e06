//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::catalog::GpuCategory;
use crate::model::{
    AdvancedSearchFilter, CreateInstanceRequest, PortMapping, Provider, ResourceRequests,
    SortKey, SortOrder,
};

/// GPU cloud manager - search and manage GPU instances across providers.
#[derive(Parser, Debug)]
#[command(name = "gpu-cloud")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "GPU_CLOUD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search offers across all configured providers.
    Search(SearchArgs),

    /// List your instances.
    Instances,

    /// Show one instance.
    Show {
        /// Instance ID, e.g. `vast_12345`.
        id: String,
    },

    /// Rent an offer and start an instance.
    Create(CreateArgs),

    /// Start a stopped instance.
    Start {
        /// Instance ID.
        id: String,
    },

    /// Stop a running instance.
    Stop {
        /// Instance ID.
        id: String,
    },

    /// Destroy an instance.
    Destroy {
        /// Instance ID.
        id: String,

        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Show price and availability statistics.
    Stats,

    /// List reference GPU models.
    Models,

    /// List supported providers.
    Providers,
}

/// Search filter flags.
#[derive(Args, Debug, Default)]
pub struct SearchArgs {
    /// Restrict to one provider (`vast_ai`, `runpod`).
    #[arg(long)]
    pub provider: Option<Provider>,

    /// GPU model substring; repeat for any-of.
    #[arg(short, long = "gpu")]
    pub gpu_models: Vec<String>,

    /// GPU category (consumer, professional, datacenter).
    #[arg(long)]
    pub category: Option<GpuCategory>,

    /// Minimum number of GPUs.
    #[arg(long)]
    pub min_gpus: Option<u32>,

    /// Maximum number of GPUs.
    #[arg(long)]
    pub max_gpus: Option<u32>,

    /// Minimum hourly price.
    #[arg(long)]
    pub min_price: Option<f64>,

    /// Maximum hourly price.
    #[arg(long)]
    pub max_price: Option<f64>,

    /// Minimum RAM in GB.
    #[arg(long)]
    pub min_ram: Option<u32>,

    /// Maximum RAM in GB.
    #[arg(long)]
    pub max_ram: Option<u32>,

    /// Minimum storage in GB.
    #[arg(long)]
    pub min_storage: Option<u32>,

    /// Region substring; repeat for any-of.
    #[arg(short, long = "region")]
    pub regions: Vec<String>,

    /// Include rented or unavailable offers.
    #[arg(long)]
    pub all: bool,

    /// Minimum reliability between 0 and 1.
    #[arg(long)]
    pub min_reliability: Option<f64>,

    /// Minimum catalog performance score.
    #[arg(long)]
    pub min_performance: Option<u32>,

    /// Sort field (price, performance, reliability, memory, gpu_count).
    #[arg(long, default_value = "price")]
    pub sort: String,

    /// Sort descending.
    #[arg(long)]
    pub desc: bool,

    /// Maximum number of rows to show.
    #[arg(short, long)]
    pub limit: Option<usize>,
}

impl SearchArgs {
    /// Converts the flags into a search filter.
    #[must_use]
    pub fn to_filter(&self) -> AdvancedSearchFilter {
        AdvancedSearchFilter {
            provider: self.provider,
            gpu_model: None,
            gpu_models: self.gpu_models.clone(),
            gpu_category: self.category,
            min_gpu_count: self.min_gpus,
            max_gpu_count: self.max_gpus,
            min_price: self.min_price,
            max_price: self.max_price,
            min_ram_gb: self.min_ram,
            max_ram_gb: self.max_ram,
            min_storage_gb: self.min_storage,
            region: None,
            regions: self.regions.clone(),
            available: (!self.all).then_some(true),
            min_reliability: self.min_reliability,
            min_performance: self.min_performance,
            sort_by: SortKey::parse_lenient(&self.sort),
            sort_order: if self.desc { SortOrder::Desc } else { SortOrder::Asc },
        }
    }
}

/// Flags for creating an instance.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Provider to create on.
    #[arg(short, long)]
    pub provider: Provider,

    /// Offer ID (Vast.ai ask ID or `RunPod` GPU type ID).
    pub offer_id: String,

    /// Container image.
    #[arg(short, long)]
    pub image: Option<String>,

    /// Instance label.
    #[arg(short, long)]
    pub label: Option<String>,

    /// Script run on start.
    #[arg(long)]
    pub onstart: Option<String>,

    /// Public SSH key to install.
    #[arg(long)]
    pub ssh_key: Option<String>,

    /// Environment variable as `KEY=VALUE`; repeatable.
    #[arg(short, long = "env", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Port as `container[:host][/proto]`; repeatable.
    #[arg(long = "port")]
    pub ports: Vec<PortMapping>,

    /// Minimum RAM in GB.
    #[arg(long)]
    pub min_ram: Option<u32>,

    /// Disk size in GB.
    #[arg(long)]
    pub disk: Option<u32>,

    /// Number of GPUs.
    #[arg(long)]
    pub gpus: Option<u32>,
}

impl CreateArgs {
    /// Converts the flags into a create request.
    #[must_use]
    pub fn to_request(&self) -> CreateInstanceRequest {
        let resources = (self.min_ram.is_some() || self.disk.is_some() || self.gpus.is_some())
            .then_some(ResourceRequests {
                min_ram_gb: self.min_ram,
                min_storage_gb: self.disk,
                min_gpus: self.gpus,
            });

        CreateInstanceRequest {
            provider: self.provider,
            offer_id: self.offer_id.clone(),
            image: self.image.clone(),
            onstart_script: self.onstart.clone(),
            ssh_key: self.ssh_key.clone(),
            label: self.label.clone(),
            environment: self.env.iter().cloned().collect(),
            ports: self.ports.clone(),
            resources,
        }
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}
