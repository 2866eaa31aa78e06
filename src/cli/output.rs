//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::catalog::GpuCatalog;
use crate::marketplace::{MarketplaceStats, ProviderInfo};
use crate::model::{InstanceStatus, NormalizedInstance};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Offer or instance row for table display.
#[derive(Tabled)]
struct InstanceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "GPU")]
    gpu: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "$/hr")]
    price: String,
    #[tabled(rename = "RAM")]
    ram: String,
    #[tabled(rename = "Disk")]
    storage: String,
    #[tabled(rename = "Perf")]
    performance: String,
    #[tabled(rename = "Region")]
    region: String,
}

/// Per-model statistics row.
#[derive(Tabled)]
struct ModelStatsRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Offers")]
    count: usize,
    #[tabled(rename = "Min $/hr")]
    min: String,
    #[tabled(rename = "Avg $/hr")]
    avg: String,
    #[tabled(rename = "Max $/hr")]
    max: String,
    #[tabled(rename = "Providers")]
    providers: String,
}

/// Catalog row.
#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Model")]
    name: String,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Architecture")]
    architecture: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Score")]
    score: u32,
}

impl From<&NormalizedInstance> for InstanceRow {
    fn from(instance: &NormalizedInstance) -> Self {
        Self {
            id: instance.id.clone(),
            gpu: format!("{}x {}", instance.gpu_count, OutputFormatter::or_dash(&instance.gpu_model)),
            status: OutputFormatter::format_status(instance.status),
            price: format!("{:.3}", instance.price_per_hour),
            ram: format!("{} GB", instance.ram_gb),
            storage: format!("{} GB", instance.storage_gb),
            performance: instance
                .performance_score
                .map_or_else(|| "-".to_string(), |s| s.to_string()),
            region: OutputFormatter::truncate(OutputFormatter::or_dash(&instance.region), 24),
        }
    }
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn json<T: Serialize + ?Sized>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_default()
    }

    /// Formats search results.
    #[must_use]
    pub fn format_offers(&self, offers: &[NormalizedInstance]) -> String {
        match self.format {
            OutputFormat::Json => Self::json(offers),
            OutputFormat::Text => {
                if offers.is_empty() {
                    return format!("{} No offers match the filter.\n", "!".yellow());
                }
                let mut output = Self::table(offers);
                let _ = writeln!(output, "\n{} offers", offers.len().to_string().bold());
                output
            }
        }
    }

    /// Formats owned instances.
    #[must_use]
    pub fn format_instances(&self, instances: &[NormalizedInstance]) -> String {
        match self.format {
            OutputFormat::Json => Self::json(instances),
            OutputFormat::Text if instances.is_empty() => "No instances.\n".to_string(),
            OutputFormat::Text => Self::table(instances),
        }
    }

    /// Formats one instance with all its details.
    #[must_use]
    pub fn format_instance(&self, instance: &NormalizedInstance) -> String {
        match self.format {
            OutputFormat::Json => Self::json(instance),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = writeln!(output, "\n{} ({})", instance.id.bold(), instance.provider.display_name());
                let _ = writeln!(output, "   Name:     {}", Self::or_dash(&instance.name));
                let _ = writeln!(output, "   Status:   {}", Self::format_status(instance.status));
                let _ = writeln!(output, "   GPU:      {}x {}", instance.gpu_count, Self::or_dash(&instance.gpu_model));
                let _ = writeln!(output, "   CPU:      {} cores", instance.cpu_count);
                let _ = writeln!(output, "   RAM:      {} GB", instance.ram_gb);
                let _ = writeln!(output, "   Disk:     {} GB", instance.storage_gb);
                let _ = writeln!(output, "   Price:    ${:.3}/hr", instance.price_per_hour);
                let _ = writeln!(output, "   Region:   {}", Self::or_dash(&instance.region));

                if let Some(gpu) = &instance.gpu_info {
                    let _ = writeln!(
                        output,
                        "   Catalog:  {} GB, {}, {} (score {})",
                        gpu.memory_gb, gpu.architecture, gpu.category, gpu.performance_score
                    );
                }
                if let Some(reliability) = instance.reliability {
                    let _ = writeln!(output, "   Reliability: {:.1}%", reliability * 100.0);
                }
                if let Some(network) = instance.network {
                    let _ = writeln!(
                        output,
                        "   Network:  {:.0} down / {:.0} up Mbps",
                        network.download_mbps, network.upload_mbps
                    );
                }
                output
            }
        }
    }

    /// Formats marketplace statistics.
    #[must_use]
    pub fn format_stats(&self, stats: &MarketplaceStats) -> String {
        match self.format {
            OutputFormat::Json => Self::json(stats),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = write!(
                    output,
                    "\nMarketplace: {} offers ({} available)\n",
                    stats.total_instances.to_string().bold(),
                    stats.available_instances.to_string().green()
                );
                let _ = writeln!(
                    output,
                    "   Price: ${:.3} - ${:.3}, average ${:.3}/hr",
                    stats.price_range.min, stats.price_range.max, stats.average_price
                );
                for (provider, count) in &stats.provider_stats {
                    let _ = writeln!(output, "   {}: {count} offers", provider.display_name());
                }

                let rows: Vec<ModelStatsRow> = stats
                    .model_stats
                    .iter()
                    .map(|(name, model)| ModelStatsRow {
                        model: name.clone(),
                        count: model.available_count,
                        min: format!("{:.3}", model.min_price),
                        avg: format!("{:.3}", model.avg_price),
                        max: format!("{:.3}", model.max_price),
                        providers: model
                            .providers
                            .iter()
                            .map(|p| p.display_name())
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
                    .collect();

                if !rows.is_empty() {
                    output.push('\n');
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }
                output
            }
        }
    }

    /// Formats the reference catalog.
    #[must_use]
    pub fn format_models(&self, catalog: &GpuCatalog) -> String {
        match self.format {
            OutputFormat::Json => Self::json(&catalog.models().collect::<Vec<_>>()),
            OutputFormat::Text => {
                let rows: Vec<ModelRow> = catalog
                    .models()
                    .map(|m| ModelRow {
                        name: m.name.clone(),
                        memory: format!("{} GB", m.memory_gb),
                        architecture: m.architecture.clone(),
                        category: m.category.to_string(),
                        score: m.performance_score,
                    })
                    .collect();
                let mut output = Table::new(rows).to_string();
                output.push('\n');
                output
            }
        }
    }

    /// Formats the provider directory.
    #[must_use]
    pub fn format_providers(&self, providers: &[ProviderInfo]) -> String {
        match self.format {
            OutputFormat::Json => Self::json(providers),
            OutputFormat::Text => {
                let mut output = String::new();
                for info in providers {
                    let configured = if info.is_configured {
                        "configured".green()
                    } else {
                        "not configured".dimmed()
                    };
                    let _ = writeln!(output, "\n{} ({}) - {configured}", info.display_name.bold(), info.name);
                    let _ = writeln!(output, "   Website:  {}", info.website);
                    let _ = writeln!(output, "   Regions:  {}", info.regions.join(", "));
                    let _ = writeln!(output, "   Features: {}", info.features.join(", "));
                    if !info.gpu_models.is_empty() {
                        let _ = writeln!(output, "   Models:   {}", info.gpu_models.len());
                    }
                }
                output
            }
        }
    }

    /// Formats the outcome of a lifecycle action.
    #[must_use]
    pub fn format_action(&self, action: &str, id: &str) -> String {
        match self.format {
            OutputFormat::Json => Self::json(&serde_json::json!({
                "status": "success",
                "action": action,
                "id": id,
            })),
            OutputFormat::Text => format!("{} {action} {id}\n", "✓".green()),
        }
    }

    fn table(instances: &[NormalizedInstance]) -> String {
        let rows: Vec<InstanceRow> = instances.iter().map(InstanceRow::from).collect();
        let mut output = Table::new(rows).to_string();
        output.push('\n');
        output
    }

    /// Formats an instance status with color.
    fn format_status(status: InstanceStatus) -> String {
        match status {
            InstanceStatus::Running => "running".green().to_string(),
            InstanceStatus::Starting | InstanceStatus::Loading | InstanceStatus::Stopping => {
                status.as_str().yellow().to_string()
            }
            InstanceStatus::Rented | InstanceStatus::Unavailable | InstanceStatus::Error => {
                status.as_str().red().to_string()
            }
            InstanceStatus::Offline => "offline".dimmed().to_string(),
        }
    }

    fn or_dash(value: &str) -> &str {
        if value.is_empty() { "-" } else { value }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Provider;

    fn sample() -> NormalizedInstance {
        let mut instance = NormalizedInstance::new(Provider::VastAi, "42")
            .with_gpu("RTX 4090", 2)
            .with_price(0.75)
            .with_region("Quebec, CA");
        GpuCatalog::builtin().enrich(&mut instance);
        instance
    }

    #[test]
    fn test_offers_json_is_array_of_records() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let output = formatter.format_offers(&[sample()]);
        let value: serde_json::Value = serde_json::from_str(&output).expect("json");
        assert_eq!(value[0]["id"], "vast_42");
        assert_eq!(value[0]["provider"], "vast_ai");
        assert_eq!(value[0]["performance_score"], 100);
    }

    #[test]
    fn test_offers_text_table() {
        colored::control::set_override(false);
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let output = formatter.format_offers(&[sample()]);
        assert!(output.contains("vast_42"));
        assert!(output.contains("2x RTX 4090"));
        assert!(output.contains("0.750"));
        assert!(output.contains("1 offers"));

        let empty = formatter.format_offers(&[]);
        assert!(empty.contains("No offers"));
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("Zürich-Ost-Rechenzentrum", 10), "Zürich-...");
    }

    #[test]
    fn test_models_json_lists_catalog() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let output = formatter.format_models(&GpuCatalog::builtin());
        let value: serde_json::Value = serde_json::from_str(&output).expect("json");
        assert_eq!(value.as_array().map(Vec::len), Some(15));
    }
}
