//! Settings loader for YAML files, `.env` files and environment variables.
//!
//! Precedence, lowest first: built-in defaults, the YAML file, environment
//! variables.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConfigError, GpuCloudError, Result};

use super::settings::Settings;

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["gpu-cloud.yaml", "gpu-cloud.yml"];

/// Directory under the user config dir holding the fallback config file.
const USER_CONFIG_DIR: &str = "gpu-cloud-manager";

/// Environment variables read as overrides.
pub mod env {
    /// Vast.ai API key.
    pub const VAST_AI_API_KEY: &str = "VAST_AI_API_KEY";
    /// Vast.ai base URL.
    pub const VAST_AI_BASE_URL: &str = "VAST_AI_BASE_URL";
    /// `RunPod` API key.
    pub const RUNPOD_API_KEY: &str = "RUNPOD_API_KEY";
    /// `RunPod` GraphQL endpoint.
    pub const RUNPOD_BASE_URL: &str = "RUNPOD_BASE_URL";
    /// Request timeout in seconds.
    pub const TIMEOUT_SECS: &str = "GPU_CLOUD_TIMEOUT_SECS";
    /// Retries for read-only calls.
    pub const MAX_RETRIES: &str = "GPU_CLOUD_MAX_RETRIES";
    /// Catalog file path.
    pub const CATALOG: &str = "GPU_CLOUD_CATALOG";
    /// Log filter.
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
}

/// Loader for [`Settings`].
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Base path for resolving `.env`.
    base_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Creates a new loader.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving `.env`.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ConfigError::parse(
                    format!("Failed to load .env file: {e}"),
                    Some(env_path.display().to_string()),
                )
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Loads settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: &Path) -> Result<Settings> {
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::parse(
                format!("Failed to read file: {e}"),
                Some(path.display().to_string()),
            )
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses settings from a YAML string. An empty document yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<Settings> {
        debug!("Parsing YAML configuration");

        if content.trim().is_empty() {
            return Ok(Settings::default());
        }

        serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            ConfigError::parse(format!("YAML parse error: {e}"), location).into()
        })
    }

    /// Loads settings from the process environment.
    ///
    /// Uses `path` if given, otherwise the first config file found from the
    /// current directory upward, otherwise defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be loaded, an override is malformed,
    /// or validation fails.
    pub fn load(&self, path: Option<&Path>) -> Result<Settings> {
        self.load_with(path, |name| std::env::var(name).ok())
    }

    /// Like [`ConfigLoader::load`], reading overrides through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be loaded, an override is malformed,
    /// or validation fails.
    pub fn load_with<F>(&self, path: Option<&Path>, lookup: F) -> Result<Settings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = match path {
            Some(path) => self.load_file(path)?,
            None => {
                let start = self
                    .base_path
                    .clone()
                    .or_else(|| std::env::current_dir().ok())
                    .unwrap_or_default();
                match find_config_file(&start) {
                    Ok(found) => self.load_file(&found)?,
                    Err(_) => {
                        debug!("No configuration file found, using defaults");
                        Settings::default()
                    }
                }
            }
        };

        Self::apply_env_overrides(&mut settings, lookup)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Applies environment variable overrides to the settings.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a numeric override does not parse.
    pub fn apply_env_overrides<F>(settings: &mut Settings, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(env::VAST_AI_API_KEY) {
            debug!("Overriding vast_ai.api_key from environment");
            settings.vast_ai.api_key = Some(key);
        }

        if let Some(url) = lookup(env::VAST_AI_BASE_URL) {
            debug!("Overriding vast_ai.base_url from environment");
            settings.vast_ai.base_url = Some(url);
        }

        if let Some(key) = lookup(env::RUNPOD_API_KEY) {
            debug!("Overriding runpod.api_key from environment");
            settings.runpod.api_key = Some(key);
        }

        if let Some(url) = lookup(env::RUNPOD_BASE_URL) {
            debug!("Overriding runpod.base_url from environment");
            settings.runpod.base_url = Some(url);
        }

        if let Some(value) = lookup(env::TIMEOUT_SECS) {
            settings.http.timeout_secs = parse_number(env::TIMEOUT_SECS, &value)?;
        }

        if let Some(value) = lookup(env::MAX_RETRIES) {
            settings.http.max_retries = parse_number(env::MAX_RETRIES, &value)?;
        }

        if let Some(path) = lookup(env::CATALOG).filter(|p| !p.trim().is_empty()) {
            debug!("Overriding catalog_path from environment");
            settings.catalog_path = Some(PathBuf::from(path));
        }

        if let Some(level) = lookup(env::LOG_LEVEL).filter(|l| !l.trim().is_empty()) {
            settings.log_level = level;
        }

        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        GpuCloudError::from(ConfigError::validation(
            format!("{name} must be a non-negative integer, got '{value}'"),
            name,
        ))
    })
}

/// Finds the configuration file in the given directory or its parents, then
/// in the user config directory.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    if let Some(user_config) = dirs::config_dir().map(|d| d.join(USER_CONFIG_DIR).join("config.yaml")) {
        if user_config.exists() {
            info!("Found configuration file: {}", user_config.display());
            return Ok(user_config);
        }
    }

    Err(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r"
runpod:
  api_key: rp-123
";
        let loader = ConfigLoader::new();
        let settings = loader.parse_yaml(yaml, None).expect("should parse");

        assert_eq!(settings.runpod.api_key(), Some("rp-123"));
        assert!(!settings.vast_ai.is_configured());
        assert_eq!(settings.http.timeout_secs, 30);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r"
vast_ai:
  api_key: vast-key
  base_url: http://localhost:9000/api/v0
runpod:
  api_key: rp-key
http:
  timeout_secs: 10
  max_retries: 5
  retry_delay_ms: 250
catalog_path: /etc/gpu-cloud/catalog.yaml
log_level: debug
";
        let settings = ConfigLoader::new()
            .parse_yaml(yaml, None)
            .expect("should parse");

        assert_eq!(settings.vast_ai.base_url(), Some("http://localhost:9000/api/v0"));
        assert_eq!(settings.http.max_retries, 5);
        assert_eq!(settings.http.retry_delay_ms, 250);
        assert_eq!(
            settings.catalog_path.as_deref(),
            Some(Path::new("/etc/gpu-cloud/catalog.yaml"))
        );
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let result = ConfigLoader::new().parse_yaml("http: [", Some(Path::new("bad.yaml")));
        assert!(matches!(
            result,
            Err(GpuCloudError::Config(ConfigError::ParseError { location: Some(_), .. }))
        ));
    }

    #[test]
    fn test_env_overrides_take_precedence() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("gpu-cloud.yaml");
        std::fs::write(&path, "runpod:\n  api_key: from-file\n").expect("write");

        let settings = ConfigLoader::new()
            .load_with(
                Some(&path),
                lookup_from(&[
                    ("RUNPOD_API_KEY", "from-env"),
                    ("VAST_AI_API_KEY", "vast-env"),
                    ("GPU_CLOUD_TIMEOUT_SECS", "12"),
                ]),
            )
            .expect("should load");

        assert_eq!(settings.runpod.api_key(), Some("from-env"));
        assert_eq!(settings.vast_ai.api_key(), Some("vast-env"));
        assert_eq!(settings.http.timeout_secs, 12);
    }

    #[test]
    fn test_bad_numeric_override_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let result = ConfigLoader::new()
            .with_base_path(dir.path())
            .load_with(None, lookup_from(&[("GPU_CLOUD_MAX_RETRIES", "lots")]));

        assert!(matches!(
            result,
            Err(GpuCloudError::Config(ConfigError::ValidationError { .. }))
        ));
    }

    #[test]
    fn test_zero_timeout_override_fails_validation() {
        let dir = TempDir::new().expect("temp dir");
        let result = ConfigLoader::new()
            .with_base_path(dir.path())
            .load_with(None, lookup_from(&[("GPU_CLOUD_TIMEOUT_SECS", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_find_config_file_walks_up() {
        let dir = TempDir::new().expect("temp dir");
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(dir.path().join("gpu-cloud.yml"), "log_level: warn\n").expect("write");

        let found = find_config_file(&nested).expect("should find");
        assert_eq!(found, dir.path().join("gpu-cloud.yml"));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let result = ConfigLoader::new().load_with(Some(Path::new("/nonexistent/gpu-cloud.yaml")), |_| None);
        assert!(matches!(
            result,
            Err(GpuCloudError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_load_dotenv_missing_is_ok() {
        let dir = TempDir::new().expect("temp dir");
        let loader = ConfigLoader::new().with_base_path(dir.path());
        assert!(loader.load_dotenv().is_ok());
    }
}
