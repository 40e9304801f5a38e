//! Cloud API error types

use converge_core::{Retryable, StatusError};
use thiserror::Error;

/// Error codes the API uses for throttling and temporary unavailability,
/// whatever HTTP status accompanies them
const TRANSIENT_CODES: &[&str] = &[
    "Throttling",
    "RequestLimitExceeded",
    "ServiceUnavailable",
    "InternalError",
];

#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status} {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("API response missing result: {0}")]
    MissingResult(String),

    #[error(transparent)]
    UnknownStatus(#[from] StatusError),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl Retryable for CloudError {
    fn is_retryable(&self) -> bool {
        match self {
            // Response JSON goes through serde_json, so a reqwest decode
            // error only comes from a body stream that broke mid-read
            CloudError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() || e.is_decode()
            }
            CloudError::Api { status, code, .. } => {
                *status == 429
                    || (500..=599).contains(status)
                    || TRANSIENT_CODES.contains(&code.as_str())
            }
            CloudError::MissingEnvVar(_)
            | CloudError::InvalidRequest(_)
            | CloudError::MissingResult(_)
            | CloudError::UnknownStatus(_)
            | CloudError::JsonError(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use super::*;
    use converge_core::ErrorClass;

    fn api(status: u16, code: &str) -> CloudError {
        CloudError::Api {
            status,
            code: code.to_string(),
            message: "test".to_string(),
        }
    }

    #[test]
    fn test_throttling_and_server_errors_are_transient() {
        assert!(api(429, "TooManyRequests").is_retryable());
        assert!(api(503, "Unavailable").is_retryable());
        assert!(api(400, "RequestLimitExceeded").is_retryable());
    }

    #[test]
    fn test_client_errors_are_permanent() {
        assert_eq!(api(400, "InvalidParameter").class(), ErrorClass::Permanent);
        assert_eq!(api(404, "ResourceNotFound").class(), ErrorClass::Permanent);
        assert_eq!(
            api(409, "OperationDenied.InstanceStatus").class(),
            ErrorClass::Permanent
        );
        assert!(!CloudError::InvalidRequest("empty id".to_string()).is_retryable());
    }

    #[test]
    fn test_unknown_status_is_permanent() {
        let err = CloudError::from(StatusError::UnknownStatus {
            backend: "cloud-db".to_string(),
            raw: "WEIRD".to_string(),
        });
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("WEIRD"));
    }
}
