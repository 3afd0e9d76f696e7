//! Error types for the stack API client.
//!
//! # Design
//! Non-2xx responses split in two: `Api` when the body decodes as the
//! server's structured [`ApiError`], `Status` with the raw body otherwise.
//! Local failures (serialization, request construction) and network failures
//! get their own variants so callers can tell "never sent" from "sent and
//! lost" from "answered with an error".

use thiserror::Error;

use crate::http::HttpMethod;
use crate::types::ApiError;

/// Errors returned by every `Client` operation.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request payload could not be serialized to JSON.
    #[error("failed to serialize {target} request body: {source}")]
    Serialization {
        target: &'static str,
        source: serde_json::Error,
    },

    /// The method/URL/header combination could not form a valid request.
    #[error("invalid request {method} {url}: {message}")]
    RequestConstruction {
        method: HttpMethod,
        url: String,
        message: String,
    },

    /// The request never produced a response (DNS, connect, TLS, timeout).
    #[error("{method} {url} failed: {source}")]
    Transport {
        method: HttpMethod,
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The server returned a non-2xx status with a structured error body.
    #[error("{method} {url}: HTTP {status}: {error}")]
    Api {
        method: HttpMethod,
        url: String,
        status: u16,
        error: ApiError,
    },

    /// The server returned a non-2xx status and the body was not an `ApiError`.
    /// Bytes that are not UTF-8 are replaced with U+FFFD.
    #[error("{method} {url} failed with status {status}: {body}")]
    Status {
        method: HttpMethod,
        url: String,
        status: u16,
        body: String,
    },

    /// A 2xx response body did not match the expected schema.
    #[error("failed to decode {target} from {method} {url}: {source}")]
    Decoding {
        method: HttpMethod,
        url: String,
        target: &'static str,
        source: serde_json::Error,
    },
}

impl ClientError {
    /// HTTP status of the response, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } | ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// `true` when the server reported the addressed resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_exposed_for_server_errors_only() {
        let err = ClientError::Status {
            method: HttpMethod::Put,
            url: "http://host/api/v1/stacks/s1".to_string(),
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(err.status(), Some(502));
        assert!(!err.is_not_found());

        let err = ClientError::RequestConstruction {
            method: HttpMethod::Get,
            url: "nope".to_string(),
            message: "invalid uri".to_string(),
        };
        assert_eq!(err.status(), None);
    }

    #[test]
    fn api_404_is_not_found() {
        let err = ClientError::Api {
            method: HttpMethod::Delete,
            url: "http://host/api/v1/stacks/s1".to_string(),
            status: 404,
            error: ApiError {
                code: 404,
                message: "stack 's1' not found".to_string(),
            },
        };
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "DELETE http://host/api/v1/stacks/s1: HTTP 404: API error 404: stack 's1' not found"
        );
    }
}
