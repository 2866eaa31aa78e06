//! Error types for the GPU cloud manager.
//!
//! The top-level [`GpuCloudError`] covers identifier routing, configuration and
//! request validation. Transport-level failures reported by a provider are carried
//! as a [`ProviderApiError`] inside [`GpuCloudError::ProviderApi`], together with
//! the provider (and native instance ID, when one applies) they came from.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::Provider;

/// The main error type for aggregation and lifecycle operations.
#[derive(Debug, Error)]
pub enum GpuCloudError {
    /// The composite instance ID is too short to carry any known prefix.
    #[error("Invalid instance ID format: '{id}'")]
    InvalidIdFormat {
        /// The rejected identifier.
        id: String,
    },

    /// No registered provider prefix matches the composite instance ID.
    #[error("Unknown provider in instance ID: '{id}'")]
    UnknownProvider {
        /// The rejected identifier.
        id: String,
    },

    /// The provider is known but no credentials were configured for it.
    #[error("Provider {provider} is not configured")]
    ProviderNotConfigured {
        /// The provider that was asked for.
        provider: Provider,
    },

    /// The provider reports no such instance.
    #[error("{provider} instance not found: {native_id}")]
    NotFound {
        /// Provider that was queried.
        provider: Provider,
        /// Provider-native instance ID.
        native_id: String,
    },

    /// A provider call failed at the transport or API level.
    #[error("{provider} API error{}: {source}", instance_suffix(.native_id.as_deref()))]
    ProviderApi {
        /// Provider whose API failed.
        provider: Provider,
        /// Native instance ID involved, if the call targeted one.
        native_id: Option<String>,
        /// Underlying transport error.
        #[source]
        source: ProviderApiError,
    },

    /// The request is malformed for the target provider.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of the problem.
        message: String,
    },

    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport-level failures reported by a provider API client.
#[derive(Debug, Error)]
pub enum ProviderApiError {
    /// Authentication failed.
    #[error("authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from API.
        message: String,
    },

    /// Rate limited.
    #[error("rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// The requested resource does not exist.
    #[error("resource not found: {message}")]
    NotFound {
        /// Body or description returned by the API.
        message: String,
    },

    /// Network error.
    #[error("network error: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("invalid response: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Two provider ID prefixes would make composite IDs ambiguous.
    #[error("Conflicting instance ID prefix '{prefix}': {reason}")]
    ConflictingIdPrefix {
        /// The offending prefix.
        prefix: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Formats the optional instance context of a provider error.
fn instance_suffix(native_id: Option<&str>) -> String {
    native_id.map(|id| format!(" (instance {id})")).unwrap_or_default()
}

/// Result type alias for GPU cloud operations.
pub type Result<T> = std::result::Result<T, GpuCloudError>;

/// Result type alias for raw provider client calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderApiError>;

impl GpuCloudError {
    /// Wraps a transport error with the provider it came from.
    #[must_use]
    pub const fn provider_api(provider: Provider, source: ProviderApiError) -> Self {
        Self::ProviderApi {
            provider,
            native_id: None,
            source,
        }
    }

    /// Wraps a transport error raised while operating on one instance.
    ///
    /// A transport-level 404 becomes [`GpuCloudError::NotFound`].
    #[must_use]
    pub fn instance_api(provider: Provider, native_id: &str, source: ProviderApiError) -> Self {
        if source.is_not_found() {
            return Self::NotFound {
                provider,
                native_id: native_id.to_string(),
            };
        }
        Self::ProviderApi {
            provider,
            native_id: Some(native_id.to_string()),
            source,
        }
    }

    /// Creates an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }
}

impl ProviderApiError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Returns true if the provider reported the resource as missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if this error is retryable by the transport.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::NetworkError { .. })
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a parse error with an optional location.
    #[must_use]
    pub fn parse(message: impl Into<String>, location: Option<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_api_maps_not_found() {
        let err = GpuCloudError::instance_api(
            Provider::VastAi,
            "42",
            ProviderApiError::NotFound {
                message: String::from("no such instance"),
            },
        );

        assert!(matches!(
            err,
            GpuCloudError::NotFound { provider: Provider::VastAi, ref native_id } if native_id == "42"
        ));
    }

    #[test]
    fn test_provider_api_display_includes_context() {
        let err = GpuCloudError::instance_api(
            Provider::RunPod,
            "abc",
            ProviderApiError::api_error(500, "boom"),
        );

        let message = err.to_string();
        assert!(message.contains("runpod"));
        assert!(message.contains("abc"));
        assert!(message.contains("boom"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderApiError::network("reset").is_retryable());
        assert!(ProviderApiError::RateLimited { retry_after_secs: 5 }.is_retryable());
        assert!(!ProviderApiError::api_error(400, "bad").is_retryable());
    }
}
