//! Routing provider abstraction and the `OpenRouteService` client.

use std::sync::Arc;

use fusion_map_isochrone_models::IsochroneRequest;
use serde::Serialize;

use crate::retry::{self, RetryPolicy};
use crate::service_registry::{self, ProviderConfig, RoutingService};
use crate::{IsochroneError, ProviderError};

/// Something that computes isochrones.
#[async_trait::async_trait]
pub trait RoutingProvider: Send + Sync {
    /// Provider id recorded in cache provenance.
    fn id(&self) -> &str;

    /// Computes one isochrone.
    ///
    /// Returns a `GeoJSON` `FeatureCollection`, `Feature` or geometry
    /// body.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the request fails.
    async fn isochrone(
        &self,
        request: &IsochroneRequest,
    ) -> Result<serde_json::Value, ProviderError>;
}

/// `OpenRouteService` isochrone API client.
pub struct OpenRouteServiceProvider {
    id: String,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
    client: reqwest::Client,
}

/// `OpenRouteService` isochrone request body.
#[derive(Debug, Serialize)]
struct OrsIsochroneRequest {
    locations: Vec<[f64; 2]>,
    range: Vec<u32>,
    range_type: &'static str,
}

impl OrsIsochroneRequest {
    fn new(request: &IsochroneRequest) -> Self {
        Self {
            locations: vec![[request.lon, request.lat]],
            range: vec![request.seconds],
            range_type: "time",
        }
    }
}

impl OpenRouteServiceProvider {
    /// Creates a client for a configured service.
    ///
    /// # Errors
    ///
    /// Returns [`IsochroneError::Config`] if the HTTP client cannot be
    /// built.
    pub fn new(service: &RoutingService, api_key: String) -> Result<Self, IsochroneError> {
        let client = reqwest::Client::builder()
            .timeout(service.timeout())
            .build()
            .map_err(|e| IsochroneError::Config {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            id: service.id.clone(),
            base_url: service.base_url().trim_end_matches('/').to_string(),
            api_key,
            retry: service.retry_policy(),
            client,
        })
    }

    fn endpoint(&self, request: &IsochroneRequest) -> String {
        format!("{}/v2/isochrones/{}", self.base_url, request.mode.profile())
    }
}

#[async_trait::async_trait]
impl RoutingProvider for OpenRouteServiceProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn isochrone(
        &self,
        request: &IsochroneRequest,
    ) -> Result<serde_json::Value, ProviderError> {
        let url = self.endpoint(request);
        let body = OrsIsochroneRequest::new(request);

        log::debug!(
            "Requesting {} isochrone at ({}, {}) for {}s",
            request.mode,
            request.lat,
            request.lon,
            request.seconds
        );

        retry::send_json(
            || {
                self.client
                    .post(&url)
                    .header(reqwest::header::AUTHORIZATION, &self.api_key)
                    .json(&body)
            },
            &self.retry,
        )
        .await
    }
}

/// Creates a provider for a service, reading its key with `lookup`.
///
/// # Errors
///
/// Returns [`IsochroneError::MissingCredential`] if `lookup` finds no key.
pub fn create_provider<F>(
    service: &RoutingService,
    lookup: F,
) -> Result<Arc<dyn RoutingProvider>, IsochroneError>
where
    F: Fn(&str) -> Option<String>,
{
    let api_key = lookup(&service.api_key_env)
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| IsochroneError::MissingCredential {
            var: service.api_key_env.clone(),
        })?;

    match &service.provider {
        ProviderConfig::OpenRouteService { .. } => {
            log::info!("Using routing provider {} ({})", service.name, service.base_url());
            Ok(Arc::new(OpenRouteServiceProvider::new(service, api_key)?))
        }
    }
}

/// Creates the highest-priority enabled provider, reading its API key
/// from the environment.
///
/// # Errors
///
/// Returns [`IsochroneError::Config`] if no service is enabled and
/// [`IsochroneError::MissingCredential`] if its key variable is unset.
pub fn create_provider_from_env() -> Result<Arc<dyn RoutingProvider>, IsochroneError> {
    let service = service_registry::enabled_services()
        .into_iter()
        .next()
        .ok_or_else(|| IsochroneError::Config {
            message: "no routing service is enabled".to_string(),
        })?;

    create_provider(&service, |var| std::env::var(var).ok())
}

#[cfg(test)]
mod tests {
    use fusion_map_isochrone_models::TravelMode;

    use super::*;

    fn ors() -> RoutingService {
        service_registry::all_services()
            .into_iter()
            .find(|s| s.id == "openrouteservice")
            .unwrap()
    }

    #[test]
    fn missing_key_is_reported() {
        let result = create_provider(&ors(), |_| None);
        assert!(matches!(
            result,
            Err(IsochroneError::MissingCredential { var }) if var == "ORS_API_KEY"
        ));
    }

    #[test]
    fn blank_key_is_missing() {
        let result = create_provider(&ors(), |_| Some("  ".to_string()));
        assert!(matches!(result, Err(IsochroneError::MissingCredential { .. })));
    }

    #[test]
    fn builds_with_key() {
        let provider = create_provider(&ors(), |_| Some("secret".to_string())).unwrap();
        assert_eq!(provider.id(), "openrouteservice");
    }

    #[test]
    fn endpoint_uses_profile() {
        let provider = OpenRouteServiceProvider::new(&ors(), "secret".to_string()).unwrap();
        let request = IsochroneRequest {
            lat: 48.85661,
            lon: 2.35222,
            mode: TravelMode::Walk,
            seconds: 600,
        };
        assert_eq!(
            provider.endpoint(&request),
            "https://api.openrouteservice.org/v2/isochrones/foot-walking"
        );
    }

    #[test]
    fn request_body_is_lon_lat() {
        let request = IsochroneRequest {
            lat: 48.85661,
            lon: 2.35222,
            mode: TravelMode::Car,
            seconds: 1800,
        };
        let body = serde_json::to_value(OrsIsochroneRequest::new(&request)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "locations": [[2.35222, 48.85661]],
                "range": [1800],
                "range_type": "time"
            })
        );
    }
}
