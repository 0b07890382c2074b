#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Read-through isochrone cache.
//!
//! [`IsochroneCache`] serves travel-time polygons from memory, fetching
//! misses from a [`RoutingProvider`] (`OpenRouteService` in production)
//! and persisting the whole cache as a JSON snapshot through
//! [`store::JsonFileStore`]. Provider failures are reported per key as
//! [`IsochroneUnavailable`]; the cache never fabricates geometry.

pub mod cache;
pub mod provider;
pub mod retry;
pub mod service_registry;
pub mod store;

use fusion_map_isochrone_models::{InvalidKey, IsochroneKey};
use fusion_map_spatial::GeometryError;
use thiserror::Error;

pub use cache::{CacheConfig, IsochroneCache, PersistSummary};
pub use provider::{OpenRouteServiceProvider, RoutingProvider, create_provider_from_env};
pub use store::{CacheLoadError, CachePersistError, DroppedEntry, JsonFileStore, LoadReport};

/// Why a routing provider could not produce an isochrone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Connection failure, timeout or unreadable body.
    #[error("Network error: {message}")]
    Network {
        /// Transport error message.
        message: String,
    },

    /// Rate limit still exceeded after all retries.
    #[error("Quota exceeded: {message}")]
    QuotaExceeded {
        /// Details.
        message: String,
    },

    /// The credential was refused (401/403).
    #[error("Unauthorized (HTTP {status})")]
    Unauthorized {
        /// HTTP status code.
        status: u16,
    },

    /// Any other non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// The body is not valid JSON.
    #[error("Malformed response: {message}")]
    MalformedResponse {
        /// Parse error.
        message: String,
    },

    /// The body parsed but holds no valid polygon.
    #[error("Invalid isochrone geometry: {0}")]
    InvalidGeometry(#[from] GeometryError),

    /// The fetch task was cancelled or panicked.
    #[error("Fetch task failed: {message}")]
    Task {
        /// Join error message.
        message: String,
    },
}

/// An isochrone could not be obtained for `key`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Isochrone {key} unavailable: {cause}")]
pub struct IsochroneUnavailable {
    /// The requested key.
    pub key: IsochroneKey,
    /// What went wrong.
    pub cause: ProviderError,
}

/// Errors raised while setting up or persisting the isochrone cache.
#[derive(Debug, Error)]
pub enum IsochroneError {
    /// The routing provider credential is not configured.
    #[error("Missing credential: environment variable {var} is not set")]
    MissingCredential {
        /// Name of the expected environment variable.
        var: String,
    },

    /// No enabled routing service is configured.
    #[error("Configuration error: {message}")]
    Config {
        /// Details.
        message: String,
    },

    /// A key could not be built or parsed.
    #[error(transparent)]
    InvalidKey(#[from] InvalidKey),

    /// The backing store could not be read.
    #[error(transparent)]
    CacheLoad(#[from] CacheLoadError),

    /// The backing store could not be written.
    #[error(transparent)]
    CachePersist(#[from] CachePersistError),
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use fusion_map_isochrone_models::IsochroneRequest;

    use super::{ProviderError, RoutingProvider};

    /// Provider returning a small square around the origin.
    #[derive(Default)]
    pub struct MockProvider {
        pub calls: AtomicUsize,
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
        /// Requests whose duration (seconds) is listed here fail.
        pub failing_seconds: BTreeSet<u32>,
        pub delay: Option<Duration>,
        /// Panics on the first call, succeeds afterwards.
        pub panic_once: AtomicBool,
        pub requests: Mutex<Vec<IsochroneRequest>>,
    }

    impl MockProvider {
        pub fn failing(seconds: &[u32]) -> Self {
            Self {
                failing_seconds: seconds.iter().copied().collect(),
                ..Self::default()
            }
        }

        pub fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        pub fn panicking_once() -> Self {
            Self {
                panic_once: AtomicBool::new(true),
                ..Self::default()
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    pub fn square_feature(lat: f64, lon: f64) -> serde_json::Value {
        let d = 0.01;
        serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [lon - d, lat - d],
                        [lon + d, lat - d],
                        [lon + d, lat + d],
                        [lon - d, lat + d],
                        [lon - d, lat - d]
                    ]]
                }
            }]
        })
    }

    #[async_trait::async_trait]
    impl RoutingProvider for MockProvider {
        fn id(&self) -> &str {
            "mock"
        }

        async fn isochrone(
            &self,
            request: &IsochroneRequest,
        ) -> Result<serde_json::Value, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.requests
                .lock()
                .unwrap()
                .push(*request);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            assert!(!self.panic_once.swap(false, Ordering::SeqCst), "provider bug");

            if self.failing_seconds.contains(&request.seconds) {
                return Err(ProviderError::Status {
                    status: 500,
                    body: "routing failed".to_string(),
                });
            }

            Ok(square_feature(request.lat, request.lon))
        }
    }

    /// A fresh path under the system temp directory.
    pub fn temp_path(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "fusion_map_isochrone_{}_{}",
            std::process::id(),
            name
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("isochrone_cache.json")
    }
}
