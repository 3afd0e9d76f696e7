//! Wire DTOs for the stack API.
//!
//! # Design
//! These types mirror the mock-server's schema but are defined independently;
//! integration tests catch any drift between the two crates. Response types
//! only require `id` and `name`; every other field defaults when the server
//! leaves it out. Update payloads skip `None` fields so a PUT only touches
//! what the caller set.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Query shape for list operations.
///
/// Filter entries are appended to the query string verbatim, so values with
/// reserved characters (`&`, `=`, spaces) must be percent-encoded by the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub page: u32,
    pub page_size: u32,
    pub filter: HashMap<String, String>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 100,
            filter: HashMap::new(),
        }
    }
}

impl ListParams {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size,
            filter: HashMap::new(),
        }
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter.insert(key.into(), value.into());
        self
    }
}

/// A page of list results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub max_size: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total: u64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    /// Whether the server reports pages after this one.
    pub fn has_next(&self) -> bool {
        self.index < self.total_pages
    }
}

/// Structured error body returned by the server on non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("API error {code}: {message}")]
pub struct ApiError {
    #[serde(default)]
    pub code: i64,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Stacks
// ---------------------------------------------------------------------------

/// Request payload for creating a stack.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackBody {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Component ids keyed by component type (`orchestrator`, `artifact_store`, ...).
    #[serde(default)]
    pub components: HashMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<HashMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackResponse {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub components: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub labels: Option<HashMap<String, String>>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentBody {
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: String,
    pub flavor: String,
    #[serde(default)]
    pub configuration: HashMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
    /// Id of the service connector this component authenticates through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentResponse {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub component_type: String,
    #[serde(default)]
    pub flavor: String,
    #[serde(default)]
    pub configuration: HashMap<String, Value>,
    #[serde(default)]
    pub labels: Option<HashMap<String, String>>,
    #[serde(default)]
    pub connector: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

// ---------------------------------------------------------------------------
// Service connectors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConnectorBody {
    pub name: String,
    pub connector_type: String,
    pub auth_method: String,
    #[serde(default)]
    pub resource_types: Vec<String>,
    #[serde(default)]
    pub configuration: HashMap<String, Value>,
    /// Write-only credentials. The server never echoes them back.
    #[serde(default)]
    pub secrets: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConnectorUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConnectorResponse {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub connector_type: String,
    #[serde(default)]
    pub auth_method: String,
    #[serde(default)]
    pub resource_types: Vec<String>,
    #[serde(default)]
    pub configuration: HashMap<String, Value>,
    #[serde(default)]
    pub labels: Option<HashMap<String, String>>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}
