//! Cloud database API client
//!
//! Thin REST client over the task-tracking API. Every mutating endpoint
//! answers with a task identifier; `/tasks/{id}` reports its progress.

use crate::error::{CloudError, Result};
use converge_core::{Operation, TaskId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct CloudConfig {
    pub endpoint: String,
    pub api_token: String,
    pub region: Option<String>,

    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl CloudConfig {
    pub fn new(endpoint: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_token: api_token.into(),
            region: None,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Create CloudConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var("CONVERGE_ENDPOINT")
            .map_err(|_| CloudError::MissingEnvVar("CONVERGE_ENDPOINT".to_string()))?;
        let api_token = std::env::var("CONVERGE_API_TOKEN")
            .map_err(|_| CloudError::MissingEnvVar("CONVERGE_API_TOKEN".to_string()))?;

        let mut config = Self::new(endpoint, api_token);
        if let Ok(region) = std::env::var("CONVERGE_REGION") {
            config.region = Some(region);
        }
        Ok(config)
    }
}

/// REST client; pass it explicitly to whatever needs it
pub struct CloudClient {
    http: reqwest::Client,
    config: CloudConfig,
}

impl CloudClient {
    pub fn new(config: CloudConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(CloudError::InvalidRequest("endpoint is empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { http, config })
    }

    pub fn endpoint(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    pub fn region(&self) -> Option<&str> {
        self.config.region.as_deref()
    }

    /// Submit a mutation and return the task tracking it
    pub async fn submit_action(&self, operation: &Operation) -> Result<TaskId> {
        let url = format!(
            "{}/instances/{}/actions/{}",
            self.endpoint(),
            operation.target,
            operation.action
        );

        let body = if operation.params.is_null() {
            serde_json::json!({})
        } else {
            operation.params.clone()
        };

        let key = request_key(operation);
        tracing::debug!("POST {} ({})", url, key);

        let request = self
            .http
            .post(&url)
            .header("Idempotency-Key", key)
            .json(&body);

        let submitted: SubmittedTask = self.send(request, &url).await?;
        Ok(submitted.task_id.into_task_id())
    }

    /// Fetch a task's raw status
    pub async fn task_status(&self, task_id: &TaskId) -> Result<TaskReport> {
        let url = format!("{}/tasks/{}", self.endpoint(), task_id);
        tracing::debug!("GET {}", url);

        let report: TaskReport = self.send(self.http.get(&url), &url).await?;
        Ok(report)
    }

    /// Fetch an instance's current state
    pub async fn instance_status(&self, instance_id: &str) -> Result<InstanceInfo> {
        let url = format!("{}/instances/{}", self.endpoint(), instance_id);
        tracing::debug!("GET {}", url);

        let info: InstanceInfo = self.send(self.http.get(&url), &url).await?;
        Ok(info)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<T> {
        let mut request = request.bearer_auth(&self.config.api_token);
        if let Some(region) = &self.config.region {
            request = request.header("X-Region", region);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        let api_response: ApiResponse<T> = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(CloudError::Api {
                    status: status.as_u16(),
                    code: "HttpError".to_string(),
                    message: truncate(&body, 200),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if !status.is_success() || !api_response.success {
            let (code, message) = api_response
                .errors
                .into_iter()
                .next()
                .map(|e| (e.code, e.message))
                .unwrap_or_else(|| ("Unknown".to_string(), "Unknown error".to_string()));
            return Err(CloudError::Api {
                status: status.as_u16(),
                code,
                message,
            });
        }

        api_response
            .result
            .ok_or_else(|| CloudError::MissingResult(url.to_string()))
    }
}

/// Idempotency key sent with a submit: the operation's own key plus a digest
/// of action, target and params, so different mutations on one instance
/// never share a key while retries of the same one always do
pub fn request_key(operation: &Operation) -> String {
    let mut hasher = Sha256::new();
    hasher.update(operation.action.as_bytes());
    hasher.update([0]);
    hasher.update(operation.target.as_bytes());
    hasher.update([0]);
    hasher.update(operation.params.to_string().as_bytes());
    let digest = hex::encode(hasher.finalize());

    format!("{}-{}", operation.idempotency_key, &digest[..16])
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Task progress as reported by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub status: Scalar,
    #[serde(default)]
    pub message: Option<String>,
}

/// Instance summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// String-or-integer value; the API is not consistent about which it sends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(i64),
}

impl Scalar {
    fn into_task_id(self) -> TaskId {
        match self {
            Scalar::Text(s) => TaskId::new(s),
            Scalar::Number(n) => TaskId::from(n),
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Text(s) => f.write_str(s),
            Scalar::Number(n) => write!(f, "{}", n),
        }
    }
}

// API response types

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiError>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct SubmittedTask {
    task_id: Scalar,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_task_id() {
        let text: SubmittedTask = serde_json::from_str(r#"{"task_id":"job-9"}"#).unwrap();
        assert_eq!(text.task_id.into_task_id().as_str(), "job-9");

        let number: SubmittedTask = serde_json::from_str(r#"{"task_id":1234}"#).unwrap();
        assert_eq!(number.task_id.into_task_id().as_str(), "1234");
    }

    #[test]
    fn test_envelope_without_result() {
        let parsed: ApiResponse<TaskReport> = serde_json::from_str(
            r#"{"success":false,"errors":[{"code":"InvalidParameter","message":"bad"}]}"#,
        )
        .unwrap();
        assert!(!parsed.success);
        assert!(parsed.result.is_none());
        assert_eq!(parsed.errors[0].code, "InvalidParameter");
    }

    #[test]
    fn test_endpoint_trailing_slash() {
        let client = CloudClient::new(CloudConfig::new("http://localhost:8080/v1/", "t")).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080/v1");
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let result = CloudClient::new(CloudConfig::new("  ", "t"));
        assert!(matches!(result, Err(CloudError::InvalidRequest(_))));
    }

    #[test]
    fn test_config_from_env() {
        temp_env::with_vars(
            [
                ("CONVERGE_ENDPOINT", Some("http://api.test")),
                ("CONVERGE_API_TOKEN", Some("secret")),
                ("CONVERGE_REGION", Some("tk1")),
            ],
            || {
                let config = CloudConfig::from_env().unwrap();
                assert_eq!(config.endpoint, "http://api.test");
                assert_eq!(config.region.as_deref(), Some("tk1"));
            },
        );

        temp_env::with_var_unset("CONVERGE_API_TOKEN", || {
            let err = CloudConfig::from_env().unwrap_err();
            assert!(matches!(err, CloudError::MissingEnvVar(_)));
        });
    }

    #[test]
    fn test_request_key_differs_per_mutation() {
        let ssl_on =
            Operation::new("ssl", "cdb-1").with_params(serde_json::json!({"enabled": true}));
        let ssl_off =
            Operation::new("ssl", "cdb-1").with_params(serde_json::json!({"enabled": false}));
        let start = Operation::new("start-replication", "cdb-1");
        let stop = Operation::new("stop-replication", "cdb-1");

        assert_ne!(request_key(&ssl_on), request_key(&ssl_off));
        assert_ne!(request_key(&start), request_key(&stop));
        assert_eq!(request_key(&start), request_key(&start.clone()));
        assert!(request_key(&start).starts_with("cdb-1-"));

        let keyed = start.clone().with_idempotency_key("deploy-42");
        assert!(request_key(&keyed).starts_with("deploy-42-"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abc", 10), "abc");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
