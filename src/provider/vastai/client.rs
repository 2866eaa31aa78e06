//! Vast.ai REST client.

use reqwest::{Client, Method, RequestBuilder, header};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::error::{ProviderApiError, ProviderResult};
use crate::provider::http::{self, HttpSettings};

use super::types::{VastCreateBody, VastCreateResponse, VastInstance, VastOffer, VastSearchQuery};

/// Vast.ai API base URL.
pub const VAST_API_URL: &str = "https://console.vast.ai/api/v0";

/// Vast.ai API client.
#[derive(Debug, Clone)]
pub struct VastClient {
    /// HTTP client.
    client: Client,
    /// API key.
    api_key: String,
    /// API base URL.
    base_url: String,
    /// Transport settings.
    settings: HttpSettings,
}

impl VastClient {
    /// Creates a new Vast.ai API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_key: &str, settings: HttpSettings) -> ProviderResult<Self> {
        Ok(Self {
            client: settings.build_client()?,
            api_key: api_key.to_string(),
            base_url: VAST_API_URL.to_string(),
            settings,
        })
    }

    /// Points the client at a different base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = http::join_url(&self.base_url, path);
        trace!("{method} {url}");
        self.client
            .request(method, url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
    }

    async fn send(&self, builder: RequestBuilder) -> ProviderResult<reqwest::Response> {
        let response = builder.send().await.map_err(|e| http::network_error(&e))?;
        http::check_status(response).await
    }

    /// Searches rentable offers.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn search_offers(&self, query: &VastSearchQuery) -> ProviderResult<Vec<VastOffer>> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Response {
            Bare(Vec<VastOffer>),
            Wrapped { offers: Vec<VastOffer> },
        }

        let pairs = query.to_query_pairs();
        let pairs = &pairs;
        let response: Response = self
            .settings
            .retry_reads("Vast.ai offer search", || async move {
                let response = self
                    .send(self.request(Method::GET, "/bundles").query(pairs))
                    .await?;
                http::decode_json(response).await
            })
            .await?;

        let offers = match response {
            Response::Bare(offers) | Response::Wrapped { offers } => offers,
        };
        debug!("Vast.ai returned {} offers", offers.len());
        Ok(offers)
    }

    /// Lists the account's instances.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn list_instances(&self) -> ProviderResult<Vec<VastInstance>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            instances: Vec<VastInstance>,
        }

        let response: Response = self
            .settings
            .retry_reads("Vast.ai instance listing", || async move {
                let response = self.send(self.request(Method::GET, "/instances")).await?;
                http::decode_json(response).await
            })
            .await?;

        Ok(response.instances)
    }

    /// Gets one instance.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderApiError::NotFound`] if the instance does not exist,
    /// or another error if the API call fails.
    pub async fn get_instance(&self, instance_id: u64) -> ProviderResult<VastInstance> {
        let path = format!("/instances/{instance_id}/");
        let path = path.as_str();

        let body: serde_json::Value = self
            .settings
            .retry_reads("Vast.ai instance lookup", || async move {
                let response = self.send(self.request(Method::GET, path)).await?;
                http::decode_json(response).await
            })
            .await?;

        // Either the instance itself or `{"instances": <instance or null>}`.
        let body = match body {
            serde_json::Value::Object(mut map) if map.contains_key("instances") => {
                map.remove("instances").unwrap_or_default()
            }
            other => other,
        };

        if body.is_null() {
            return Err(ProviderApiError::NotFound {
                message: format!("instance {instance_id} not found"),
            });
        }

        serde_json::from_value(body).map_err(|e| {
            ProviderApiError::invalid_response(format!("Failed to parse instance: {e}"))
        })
    }

    /// Rents an offer; returns the new instance ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails or the ask is rejected.
    pub async fn create_instance(&self, offer_id: u64, body: &VastCreateBody) -> ProviderResult<u64> {
        let path = format!("/asks/{offer_id}/");
        let response = self.send(self.request(Method::PUT, &path).json(body)).await?;
        let created: VastCreateResponse = http::decode_json(response).await?;

        match created.new_contract {
            Some(contract) if created.success => Ok(contract),
            _ => Err(ProviderApiError::invalid_response(format!(
                "ask {offer_id} was not accepted: {}",
                created.error.unwrap_or_else(|| String::from("no contract returned"))
            ))),
        }
    }

    async fn set_state(&self, instance_id: u64, state: &str) -> ProviderResult<()> {
        let path = format!("/instances/{instance_id}/");
        self.send(
            self.request(Method::PUT, &path)
                .json(&serde_json::json!({ "state": state })),
        )
        .await?;
        Ok(())
    }

    /// Starts a stopped instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn start_instance(&self, instance_id: u64) -> ProviderResult<()> {
        self.set_state(instance_id, "running").await
    }

    /// Stops a running instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn stop_instance(&self, instance_id: u64) -> ProviderResult<()> {
        self.set_state(instance_id, "stopped").await
    }

    /// Destroys an instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn destroy_instance(&self, instance_id: u64) -> ProviderResult<()> {
        let path = format!("/instances/{instance_id}/");
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }
}
