//! Compile-time registry of routing service configurations.
//!
//! Each routing provider is defined in a TOML file under `services/`.
//! The registry embeds these at compile time and exposes them via
//! [`all_services`] and [`enabled_services`].

use std::time::Duration;

use serde::Deserialize;

use crate::retry::RetryPolicy;

/// A routing service configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingService {
    /// Unique identifier (e.g., `"openrouteservice"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Whether this service may be used.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Selection order, lower values first.
    pub priority: u32,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Provider-specific configuration.
    pub provider: ProviderConfig,
}

/// Provider-specific configuration, tagged by `type` in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// `OpenRouteService` isochrone API.
    OpenRouteService {
        /// API base URL (e.g., `"https://api.openrouteservice.org"`).
        base_url: String,
        /// Retries of transient failures.
        #[serde(default = "default_max_retries")]
        max_retries: u32,
        /// Delay before the first retry, in milliseconds.
        #[serde(default = "default_base_delay_ms")]
        base_delay_ms: u64,
        /// Per-request timeout, in seconds.
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

const fn default_true() -> bool {
    true
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_base_delay_ms() -> u64 {
    2000
}

const fn default_timeout_secs() -> u64 {
    60
}

impl RoutingService {
    /// Returns the provider's base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        match &self.provider {
            ProviderConfig::OpenRouteService { base_url, .. } => base_url,
        }
    }

    /// Retry policy of the provider.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        match &self.provider {
            ProviderConfig::OpenRouteService {
                max_retries,
                base_delay_ms,
                ..
            } => RetryPolicy {
                max_retries: *max_retries,
                base_delay: Duration::from_millis(*base_delay_ms),
            },
        }
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        match &self.provider {
            ProviderConfig::OpenRouteService { timeout_secs, .. } => {
                Duration::from_secs(*timeout_secs)
            }
        }
    }
}

// ── Compile-time embedded TOML files ────────────────────────────────

const SERVICE_TOMLS: &[(&str, &str)] = &[(
    "openrouteservice",
    include_str!("../services/openrouteservice.toml"),
)];

#[cfg(test)]
const EXPECTED_SERVICE_COUNT: usize = 1;

/// Returns all routing service configurations (enabled and disabled).
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_services() -> Vec<RoutingService> {
    SERVICE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse routing service '{name}': {e}"))
        })
        .collect()
}

/// Returns only enabled services, sorted by priority (ascending).
#[must_use]
pub fn enabled_services() -> Vec<RoutingService> {
    let mut services: Vec<RoutingService> =
        all_services().into_iter().filter(|s| s.enabled).collect();
    services.sort_by_key(|s| s.priority);
    services
}
