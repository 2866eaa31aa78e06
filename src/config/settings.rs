//! Runtime settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::catalog::GpuCatalog;
use crate::error::{ConfigError, Result};
use crate::model::Provider;
use crate::provider::HttpSettings;

/// Credentials and endpoint override for one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderCredentials {
    /// API key; blank counts as absent.
    pub api_key: Option<String>,
    /// Base URL override, mainly for testing.
    pub base_url: Option<String>,
}

impl ProviderCredentials {
    /// Returns the API key if it is set and not blank.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Returns the base URL override if set and not blank.
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    /// True if an API key is present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }
}

/// All settings for the marketplace and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Vast.ai credentials.
    pub vast_ai: ProviderCredentials,
    /// `RunPod` credentials.
    pub runpod: ProviderCredentials,
    /// HTTP transport settings.
    pub http: HttpSettings,
    /// Optional YAML catalog replacing the built-in one.
    pub catalog_path: Option<PathBuf>,
    /// Default log filter.
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vast_ai: ProviderCredentials::default(),
            runpod: ProviderCredentials::default(),
            http: HttpSettings::default(),
            catalog_path: None,
            log_level: String::from("info"),
        }
    }
}

impl Settings {
    /// Returns the credentials for a provider.
    #[must_use]
    pub const fn credentials(&self, provider: Provider) -> &ProviderCredentials {
        match provider {
            Provider::VastAi => &self.vast_ai,
            Provider::RunPod => &self.runpod,
        }
    }

    /// Providers with an API key, in registration order.
    #[must_use]
    pub fn configured_providers(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|p| self.credentials(*p).is_configured())
            .collect()
    }

    /// Loads the catalog: the configured file, or the built-in one.
    ///
    /// # Errors
    ///
    /// Returns an error if a catalog file is configured but cannot be loaded.
    pub fn load_catalog(&self) -> Result<GpuCatalog> {
        self.catalog_path
            .as_deref()
            .map_or_else(|| Ok(GpuCatalog::builtin()), GpuCatalog::from_yaml_file)
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::validation("timeout must be greater than 0", "http.timeout_secs").into());
        }

        for provider in Provider::ALL {
            if let Some(url) = self.credentials(provider).base_url() {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(ConfigError::validation(
                        format!("base URL must start with http:// or https://: {url}"),
                        format!("{provider}.base_url"),
                    )
                    .into());
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GpuCloudError;

    #[test]
    fn test_blank_key_is_absent() {
        let creds = ProviderCredentials {
            api_key: Some("   ".to_string()),
            base_url: None,
        };
        assert!(!creds.is_configured());

        let settings = Settings {
            runpod: ProviderCredentials {
                api_key: Some("rp".to_string()),
                base_url: None,
            },
            ..Settings::default()
        };
        assert_eq!(settings.configured_providers(), vec![Provider::RunPod]);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut settings = Settings::default();
        settings.http.timeout_secs = 0;
        assert!(matches!(
            settings.validate(),
            Err(GpuCloudError::Config(ConfigError::ValidationError { .. }))
        ));
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let mut settings = Settings::default();
        settings.vast_ai.base_url = Some("console.vast.ai".to_string());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_default_catalog_is_builtin() {
        let catalog = Settings::default().load_catalog().expect("catalog");
        assert_eq!(catalog.len(), GpuCatalog::builtin().len());
    }
}
