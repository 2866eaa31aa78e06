//! Configuration module.
//!
//! This module handles all configuration-related functionality:
//! - Parsing `gpu-cloud.yaml` into [`Settings`]
//! - `.env` loading and environment variable overrides
//! - Validation of configuration values

mod loader;
mod settings;

pub use loader::{ConfigLoader, DEFAULT_CONFIG_FILES, env, find_config_file};
pub use settings::{ProviderCredentials, Settings};
