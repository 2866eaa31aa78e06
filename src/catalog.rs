//! GPU model catalog.
//!
//! The catalog maps exact GPU model names (as reported by providers) to
//! reference specs and a relative performance score on a 0-150 scale. It is
//! immutable once built and shared with the marketplace through an `Arc`.
//!
//! Lookups are exact and case-sensitive: a provider reporting
//! `"NVIDIA GeForce RTX 4090"` is not matched by the `"RTX 4090"` entry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::error::{ConfigError, GpuCloudError, Result};
use crate::model::NormalizedInstance;

/// Market segment of a GPU model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuCategory {
    /// Gaming and workstation cards.
    Consumer,
    /// Professional visualization cards.
    Professional,
    /// Datacenter accelerators.
    Datacenter,
}

impl GpuCategory {
    /// Returns the lowercase wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Consumer => "consumer",
            Self::Professional => "professional",
            Self::Datacenter => "datacenter",
        }
    }
}

impl std::fmt::Display for GpuCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GpuCategory {
    type Err = GpuCloudError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "consumer" => Ok(Self::Consumer),
            "professional" => Ok(Self::Professional),
            "datacenter" => Ok(Self::Datacenter),
            other => Err(GpuCloudError::invalid_request(format!(
                "unknown GPU category: {other}"
            ))),
        }
    }
}

/// Reference specification of a GPU model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuModelSpec {
    /// Model name, also the catalog key.
    pub name: String,
    /// On-board memory in GB.
    pub memory_gb: u32,
    /// CUDA compute capability; 0.0 for non-NVIDIA parts.
    pub compute_capability: f64,
    /// Architecture family.
    pub architecture: String,
    /// Market segment.
    pub category: GpuCategory,
    /// Relative performance score, 0-150.
    pub performance_score: u32,
}

impl GpuModelSpec {
    fn reference(
        name: &str,
        memory_gb: u32,
        compute_capability: f64,
        architecture: &str,
        category: GpuCategory,
        performance_score: u32,
    ) -> Self {
        Self {
            name: name.to_string(),
            memory_gb,
            compute_capability,
            architecture: architecture.to_string(),
            category,
            performance_score,
        }
    }
}

/// Immutable lookup table of GPU models.
#[derive(Debug, Clone, Default)]
pub struct GpuCatalog {
    models: BTreeMap<String, GpuModelSpec>,
}

impl GpuCatalog {
    /// Returns the built-in reference catalog.
    #[must_use]
    pub fn builtin() -> Self {
        use GpuCategory::{Consumer, Datacenter, Professional};

        Self::from_models([
            GpuModelSpec::reference("RTX 4090", 24, 8.9, "Ada Lovelace", Consumer, 100),
            GpuModelSpec::reference("RTX 4080", 16, 8.9, "Ada Lovelace", Consumer, 85),
            GpuModelSpec::reference("RTX 4070", 12, 8.9, "Ada Lovelace", Consumer, 70),
            GpuModelSpec::reference("RTX 3090", 24, 8.6, "Ampere", Consumer, 90),
            GpuModelSpec::reference("RTX 3080", 10, 8.6, "Ampere", Consumer, 80),
            GpuModelSpec::reference("RTX 3070", 8, 8.6, "Ampere", Consumer, 65),
            GpuModelSpec::reference("A100", 80, 8.0, "Ampere", Datacenter, 120),
            GpuModelSpec::reference("H100", 80, 9.0, "Hopper", Datacenter, 150),
            GpuModelSpec::reference("V100", 32, 7.0, "Volta", Datacenter, 95),
            GpuModelSpec::reference("A40", 48, 8.6, "Ampere", Professional, 85),
            GpuModelSpec::reference("A6000", 48, 8.6, "Ampere", Professional, 90),
            GpuModelSpec::reference("GTX 1080 Ti", 11, 6.1, "Pascal", Consumer, 45),
            GpuModelSpec::reference("RTX 2080 Ti", 11, 7.5, "Turing", Consumer, 60),
            GpuModelSpec::reference("RX 7900 XTX", 24, 0.0, "RDNA3", Consumer, 85),
            GpuModelSpec::reference("RX 6900 XT", 16, 0.0, "RDNA2", Consumer, 75),
        ])
    }

    /// Builds a catalog from the given models. Later entries replace earlier
    /// ones with the same name.
    #[must_use]
    pub fn from_models(models: impl IntoIterator<Item = GpuModelSpec>) -> Self {
        Self {
            models: models.into_iter().map(|m| (m.name.clone(), m)).collect(),
        }
    }

    /// Loads a catalog from a YAML list of models.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path)?;
        let models: Vec<GpuModelSpec> = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::parse(
                e.to_string(),
                e.location()
                    .map(|loc| format!("{}:{}:{}", path.display(), loc.line(), loc.column())),
            )
        })?;

        debug!("Loaded {} GPU models from {}", models.len(), path.display());
        Ok(Self::from_models(models))
    }

    /// Looks up a model by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&GpuModelSpec> {
        self.models.get(name)
    }

    /// Iterates over all models, sorted by name.
    pub fn models(&self) -> impl Iterator<Item = &GpuModelSpec> {
        self.models.values()
    }

    /// Returns all model names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    /// Number of models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// True if the catalog has no models.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Attaches catalog data to an instance.
    ///
    /// On an exact model match, `gpu_info` is set and `performance_score` is
    /// overwritten with the catalog score. Otherwise both are left as they are.
    /// `reliability` is filled from a numeric `provider_data["reliability"]`
    /// when not already set.
    pub fn enrich(&self, instance: &mut NormalizedInstance) {
        if let Some(spec) = self.get(&instance.gpu_model) {
            instance.performance_score = Some(spec.performance_score);
            instance.gpu_info = Some(spec.clone());
        }

        if instance.reliability.is_none() {
            instance.reliability = instance
                .provider_data
                .get("reliability")
                .and_then(crate::model::ProviderValue::as_f64)
                .filter(|r| r.is_finite())
                .map(|r| r.clamp(0.0, 1.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Provider;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builtin_catalog() {
        let catalog = GpuCatalog::builtin();
        assert_eq!(catalog.len(), 15);

        let h100 = catalog.get("H100").expect("H100 should exist");
        assert_eq!(h100.memory_gb, 80);
        assert_eq!(h100.performance_score, 150);
        assert_eq!(h100.category, GpuCategory::Datacenter);

        let names = catalog.names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_lookup_is_exact() {
        let catalog = GpuCatalog::builtin();
        assert!(catalog.get("rtx 4090").is_none());
        assert!(catalog.get("NVIDIA GeForce RTX 4090").is_none());
        assert!(catalog.get("RTX 4090").is_some());
    }

    #[test]
    fn test_enrich_known_model_overwrites_score() {
        let catalog = GpuCatalog::builtin();
        let mut instance = NormalizedInstance::new(Provider::VastAi, "1").with_gpu("RTX 4090", 1);
        instance.performance_score = Some(3);

        catalog.enrich(&mut instance);

        assert_eq!(instance.performance_score, Some(100));
        assert_eq!(
            instance.gpu_info.as_ref().map(|g| g.architecture.as_str()),
            Some("Ada Lovelace")
        );
    }

    #[test]
    fn test_enrich_unknown_model_leaves_score_unset() {
        let catalog = GpuCatalog::builtin();
        let mut instance =
            NormalizedInstance::new(Provider::RunPod, "x").with_gpu("NVIDIA GeForce RTX 4090", 1);

        catalog.enrich(&mut instance);

        assert!(instance.performance_score.is_none());
        assert!(instance.gpu_info.is_none());
    }

    #[test]
    fn test_enrich_derives_reliability() {
        let catalog = GpuCatalog::builtin();
        let mut instance = NormalizedInstance::new(Provider::VastAi, "1").with_data("reliability", 0.97);

        catalog.enrich(&mut instance);
        assert_eq!(instance.reliability, Some(0.97));

        let mut instance = NormalizedInstance::new(Provider::VastAi, "2").with_data("reliability", "high");
        catalog.enrich(&mut instance);
        assert!(instance.reliability.is_none());
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            r"
- name: L40S
  memory_gb: 48
  compute_capability: 8.9
  architecture: Ada Lovelace
  category: datacenter
  performance_score: 110
"
        )
        .expect("write");

        let catalog = GpuCatalog::from_yaml_file(file.path()).expect("should load");
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("L40S").map(|m| m.performance_score), Some(110));
    }

    #[test]
    fn test_from_yaml_file_errors() {
        let missing = GpuCatalog::from_yaml_file(Path::new("/nonexistent/catalog.yaml"));
        assert!(matches!(
            missing,
            Err(GpuCloudError::Config(ConfigError::FileNotFound { .. }))
        ));

        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "- name: [unclosed").expect("write");
        let invalid = GpuCatalog::from_yaml_file(file.path());
        assert!(matches!(
            invalid,
            Err(GpuCloudError::Config(ConfigError::ParseError { .. }))
        ));
    }
}
