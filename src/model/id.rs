//! Composite instance identifiers.
//!
//! Every instance ID handed out by this crate has the form
//! `<provider prefix>_<provider-native id>`. The native part is opaque and may
//! itself contain underscores; only the leading prefix is interpreted.

use crate::error::{ConfigError, GpuCloudError, Result};

use super::Provider;

const SEPARATOR: char = '_';

/// Builds the composite ID for a provider-native identifier.
#[must_use]
pub fn encode(provider: Provider, native_id: &str) -> String {
    format!("{}{SEPARATOR}{native_id}", provider.id_prefix())
}

/// Registry of provider prefixes used to route composite IDs.
#[derive(Debug, Clone)]
pub struct IdCodec {
    entries: Vec<(&'static str, Provider)>,
}

impl IdCodec {
    /// Creates a codec over the given providers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ConflictingIdPrefix`] if a prefix is empty,
    /// contains the separator, overlaps another registered prefix, or if the
    /// same provider is registered twice.
    pub fn new(providers: impl IntoIterator<Item = Provider>) -> Result<Self> {
        let mut entries: Vec<(&'static str, Provider)> = Vec::new();

        for provider in providers {
            let prefix = provider.id_prefix();

            if prefix.is_empty() || prefix.contains(SEPARATOR) {
                return Err(conflict(prefix, "prefix must be non-empty and contain no '_'"));
            }

            for &(existing, other) in &entries {
                if other == provider {
                    return Err(conflict(prefix, format!("{provider} registered twice")));
                }
                if existing.starts_with(prefix) || prefix.starts_with(existing) {
                    return Err(conflict(
                        prefix,
                        format!("overlaps prefix '{existing}' of {other}"),
                    ));
                }
            }

            entries.push((prefix, provider));
        }

        Ok(Self { entries })
    }

    /// Splits a composite ID into its provider and native ID.
    ///
    /// # Errors
    ///
    /// Returns [`GpuCloudError::InvalidIdFormat`] if the ID is shorter than the
    /// shortest known prefix plus separator, and [`GpuCloudError::UnknownProvider`]
    /// if no registered prefix matches.
    pub fn decode(&self, id: &str) -> Result<(Provider, String)> {
        if id.len() < min_id_len() {
            return Err(GpuCloudError::InvalidIdFormat { id: id.to_string() });
        }

        self.entries
            .iter()
            .find_map(|&(prefix, provider)| {
                id.strip_prefix(prefix)
                    .and_then(|rest| rest.strip_prefix(SEPARATOR))
                    .map(|native| (provider, native.to_string()))
            })
            .ok_or_else(|| GpuCloudError::UnknownProvider { id: id.to_string() })
    }

    /// Returns the registered providers in registration order.
    pub fn providers(&self) -> impl Iterator<Item = Provider> + '_ {
        self.entries.iter().map(|&(_, p)| p)
    }
}

impl Default for IdCodec {
    fn default() -> Self {
        // Built-in prefixes are fixed and disjoint.
        Self {
            entries: Provider::ALL.iter().map(|&p| (p.id_prefix(), p)).collect(),
        }
    }
}

/// Length floor shared by every codec, independent of which providers it routes.
fn min_id_len() -> usize {
    Provider::ALL
        .iter()
        .map(|p| p.id_prefix().len())
        .min()
        .unwrap_or(0)
        + SEPARATOR.len_utf8()
}

fn conflict(prefix: &str, reason: impl Into<String>) -> GpuCloudError {
    ConfigError::ConflictingIdPrefix {
        prefix: prefix.to_string(),
        reason: reason.into(),
    }
    .into()
}
