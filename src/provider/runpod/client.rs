//! `RunPod` API client implementation.
//!
//! This module provides the HTTP client for interacting with the `RunPod` GraphQL API.
//! Queries are retried on transient failures; mutations are sent once.

use reqwest::{Client, header};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{ProviderApiError, ProviderResult};
use crate::provider::http::{self, HttpSettings};

use super::types::{CreatePodRequest, GpuType, Pod};

/// `RunPod` API base URL.
pub const RUNPOD_API_URL: &str = "https://api.runpod.io/graphql";

/// Fields selected for every pod query.
const POD_FIELDS: &str = r"
    id
    name
    desiredStatus
    imageName
    gpuCount
    volumeInGb
    containerDiskInGb
    memoryInGb
    vcpuCount
    costPerHr
    lastStatusChange
    machine {
        podHostId
        gpuTypeId
        gpuDisplayName
        secureCloud
        location
    }
    runtime {
        uptimeInSeconds
        ports {
            ip
            isIpPublic
            privatePort
            publicPort
            type
        }
    }
";

/// `RunPod` API client.
#[derive(Debug, Clone)]
pub struct RunPodClient {
    /// HTTP client.
    client: Client,
    /// API key.
    api_key: String,
    /// GraphQL endpoint.
    endpoint: String,
    /// Transport settings.
    settings: HttpSettings,
}

/// GraphQL request structure.
#[derive(Debug, Serialize)]
struct GraphQLRequest {
    query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<serde_json::Value>,
}

/// GraphQL response structure.
#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLError>>,
}

/// GraphQL error structure.
#[derive(Debug, Deserialize)]
struct GraphQLError {
    message: String,
}

impl RunPodClient {
    /// Creates a new `RunPod` API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_key: &str, settings: HttpSettings) -> ProviderResult<Self> {
        Ok(Self {
            client: settings.build_client()?,
            api_key: api_key.to_string(),
            endpoint: RUNPOD_API_URL.to_string(),
            settings,
        })
    }

    /// Points the client at a different GraphQL endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    /// Executes a read-only GraphQL query, retrying transient failures.
    async fn query<T: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Option<serde_json::Value>,
    ) -> ProviderResult<T> {
        let request = GraphQLRequest {
            query: query.to_string(),
            variables,
        };
        let request = &request;

        self.settings
            .retry_reads(operation, || async move { self.execute_once(request).await })
            .await
    }

    /// Executes a GraphQL mutation exactly once.
    async fn mutate<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> ProviderResult<T> {
        let request = GraphQLRequest {
            query: query.to_string(),
            variables: Some(variables),
        };
        self.execute_once(&request).await
    }

    /// Executes a single GraphQL request.
    async fn execute_once<T: DeserializeOwned>(&self, request: &GraphQLRequest) -> ProviderResult<T> {
        trace!("Executing GraphQL query: {}", request.query);

        let response = self
            .client
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| http::network_error(&e))?;

        let response = http::check_status(response).await?;
        let gql_response: GraphQLResponse<T> = http::decode_json(response).await?;

        if let Some(errors) = gql_response.errors.filter(|e| !e.is_empty()) {
            let message = errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ProviderApiError::api_error(400, message));
        }

        gql_response
            .data
            .ok_or_else(|| ProviderApiError::invalid_response("No data in response"))
    }

    /// Lists all pods.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn list_pods(&self) -> ProviderResult<Vec<Pod>> {
        #[derive(Deserialize)]
        struct Response {
            myself: MyselfResponse,
        }
        #[derive(Deserialize)]
        struct MyselfResponse {
            #[serde(default)]
            pods: Vec<Pod>,
        }

        let query = format!("query {{ myself {{ pods {{ {POD_FIELDS} }} }} }}");
        let response: Response = self.query("RunPod pod listing", &query, None).await?;
        Ok(response.myself.pods)
    }

    /// Gets a pod by ID.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderApiError::NotFound`] if the pod does not exist, or
    /// another error if the API call fails.
    pub async fn get_pod(&self, pod_id: &str) -> ProviderResult<Pod> {
        #[derive(Deserialize)]
        struct Response {
            pod: Option<Pod>,
        }

        let query = format!(
            "query Pod($podId: String!) {{ pod(input: {{ podId: $podId }}) {{ {POD_FIELDS} }} }}"
        );
        let variables = serde_json::json!({ "podId": pod_id });
        let response: Response = self
            .query("RunPod pod lookup", &query, Some(variables))
            .await?;

        response.pod.ok_or_else(|| ProviderApiError::NotFound {
            message: format!("pod {pod_id} not found"),
        })
    }

    /// Creates a new pod.
    ///
    /// # Errors
    ///
    /// Returns an error if the pod cannot be created.
    pub async fn create_pod(&self, request: &CreatePodRequest) -> ProviderResult<Pod> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "podFindAndDeployOnDemand")]
            pod: Option<Pod>,
        }

        let query = format!(
            "mutation CreatePod($input: PodFindAndDeployOnDemandInput!) {{ \
             podFindAndDeployOnDemand(input: $input) {{ {POD_FIELDS} }} }}"
        );
        let variables = serde_json::json!({ "input": request });
        let response: Response = self.mutate(&query, variables).await?;

        response.pod.ok_or_else(|| {
            ProviderApiError::invalid_response(format!(
                "no pod returned for GPU type {}",
                request.gpu_type_id
            ))
        })
    }

    /// Stops a pod.
    ///
    /// # Errors
    ///
    /// Returns an error if the pod cannot be stopped.
    pub async fn stop_pod(&self, pod_id: &str) -> ProviderResult<()> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "podStop")]
            _pod: Option<serde_json::Value>,
        }

        let query = r"
            mutation StopPod($podId: String!) {
                podStop(input: { podId: $podId }) {
                    id
                    desiredStatus
                }
            }
        ";

        let variables = serde_json::json!({ "podId": pod_id });
        let _: Response = self.mutate(query, variables).await?;

        Ok(())
    }

    /// Resumes a stopped pod.
    ///
    /// # Errors
    ///
    /// Returns an error if the pod cannot be resumed.
    pub async fn resume_pod(&self, pod_id: &str, gpu_count: u32) -> ProviderResult<()> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "podResume")]
            _pod: Option<serde_json::Value>,
        }

        let query = r"
            mutation ResumePod($podId: String!, $gpuCount: Int!) {
                podResume(input: { podId: $podId, gpuCount: $gpuCount }) {
                    id
                    desiredStatus
                }
            }
        ";

        let variables = serde_json::json!({ "podId": pod_id, "gpuCount": gpu_count });
        let _: Response = self.mutate(query, variables).await?;

        Ok(())
    }

    /// Terminates (deletes) a pod.
    ///
    /// # Errors
    ///
    /// Returns an error if the pod cannot be terminated.
    pub async fn terminate_pod(&self, pod_id: &str) -> ProviderResult<()> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "podTerminate")]
            _result: Option<serde_json::Value>,
        }

        let query = r"
            mutation TerminatePod($podId: String!) {
                podTerminate(input: { podId: $podId })
            }
        ";

        let variables = serde_json::json!({ "podId": pod_id });
        let _: Response = self.mutate(query, variables).await?;

        Ok(())
    }

    /// Gets available GPU types.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn list_gpu_types(&self) -> ProviderResult<Vec<GpuType>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "gpuTypes", default)]
            gpu_types: Vec<GpuType>,
        }

        let query = r"
            query {
                gpuTypes {
                    id
                    displayName
                    memoryInGb
                    secureCloud
                    communityCloud
                    securePrice
                    communityPrice
                    lowestPrice(input: { gpuCount: 1 }) {
                        minimumBidPrice
                        uninterruptablePrice
                    }
                }
            }
        ";

        let response: Response = self.query("RunPod GPU type listing", query, None).await?;
        Ok(response.gpu_types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> RunPodClient {
        let settings = HttpSettings {
            timeout_secs: 5,
            max_retries: 2,
            retry_delay_ms: 0,
        };
        RunPodClient::new("rp-key", settings)
            .expect("client")
            .with_endpoint(&server.uri())
    }

    #[tokio::test]
    async fn test_list_gpu_types() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer rp-key"))
            .and(body_string_contains("gpuTypes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "gpuTypes": [{
                        "id": "NVIDIA GeForce RTX 4090",
                        "displayName": "RTX 4090",
                        "memoryInGb": 24,
                        "secureCloud": true,
                        "communityCloud": true,
                        "lowestPrice": { "minimumBidPrice": 0.3, "uninterruptablePrice": 0.69 }
                    }]
                }
            })))
            .mount(&server)
            .await;

        let gpu_types = test_client(&server).list_gpu_types().await.expect("gpu types");
        assert_eq!(gpu_types.len(), 1);
        assert_eq!(gpu_types[0].display_name, "RTX 4090");
        assert!((gpu_types[0].hourly_price() - 0.69).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_graphql_errors_become_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "errors": [{ "message": "bad field" }, { "message": "another" }]
            })))
            .mount(&server)
            .await;

        let result = test_client(&server).list_pods().await;
        match result {
            Err(ProviderApiError::ApiRequestFailed { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad field; another");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_data_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let result = test_client(&server).list_gpu_types().await;
        assert!(matches!(
            result,
            Err(ProviderApiError::InvalidResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_null_pod_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "data": { "pod": null } })),
            )
            .mount(&server)
            .await;

        let result = test_client(&server).get_pod("abc").await;
        assert!(matches!(result, Err(ProviderApiError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_queries_retry_rate_limits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
            .expect(3)
            .mount(&server)
            .await;

        let result = test_client(&server).list_pods().await;
        assert!(matches!(result, Err(ProviderApiError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn test_mutations_are_sent_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("podTerminate"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let result = test_client(&server).terminate_pod("abc").await;
        assert!(matches!(
            result,
            Err(ProviderApiError::RateLimited { retry_after_secs: 60 })
        ));
    }
}
