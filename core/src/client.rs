//! Typed client for the stack API.
//!
//! # Design
//! `Client` holds only immutable configuration and a shared transport, so one
//! instance can serve any number of threads. Every operation runs the same
//! three steps: `build_request` produces an `HttpRequest`, the transport
//! executes it, and `check_status` / `decode` interpret the `HttpResponse`.
//! The first and last steps are public so callers with their own I/O can use
//! the client without its transport.

use std::any::type_name;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
use crate::types::{
    ApiError, ComponentBody, ComponentResponse, ComponentUpdate, ListParams, Page,
    ServiceConnectorBody, ServiceConnectorResponse, ServiceConnectorUpdate, StackBody,
    StackResponse, StackUpdate,
};

pub const STACKS_PATH: &str = "/api/v1/stacks";
pub const COMPONENTS_PATH: &str = "/api/v1/components";
pub const SERVICE_CONNECTORS_PATH: &str = "/api/v1/service_connectors";

/// Blocking client for the stack API.
pub struct Client {
    server_url: String,
    api_key: SecretString,
    user_agent: String,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("server_url", &self.server_url)
            .field("api_key", &self.api_key)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Client with the default transport. Does not touch the network.
    pub fn new(server_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_config(ClientConfig::new(server_url, api_key))
    }

    pub fn with_config(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(config.timeout);
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            server_url: config.server_url,
            api_key: config.api_key,
            user_agent: config.user_agent,
            transport,
        }
    }

    // -----------------------------------------------------------------------
    // Request / response plumbing
    // -----------------------------------------------------------------------

    /// Build the request for `method` on `path` (path plus optional query
    /// string), serializing `body` when present.
    pub fn build_request<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
    ) -> Result<HttpRequest, ClientError> {
        let body = body
            .map(|b| {
                serde_json::to_string(b).map_err(|source| ClientError::Serialization {
                    target: type_name::<B>(),
                    source,
                })
            })
            .transpose()?;

        let mut headers = vec![
            (
                "Authorization".to_string(),
                format!("Bearer {}", self.api_key.expose_secret()),
            ),
            ("User-Agent".to_string(), self.user_agent.clone()),
        ];
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }

        Ok(HttpRequest {
            method,
            url: format!("{}{}", self.server_url, path),
            headers,
            body,
        })
    }

    /// Send `request` through the transport and reject non-2xx responses.
    pub fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError> {
        debug!(method = %request.method, url = %request.url, "sending request");
        let response = self.transport.execute(request)?;
        debug!(
            method = %request.method,
            url = %request.url,
            status = response.status,
            "received response"
        );
        check_status(request, response)
    }

    fn send<B, T>(&self, method: HttpMethod, path: &str, body: Option<&B>) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.build_request(method, path, body)?;
        let response = self.execute(&request)?;
        decode(&request, &response)
    }

    fn send_discarding<B>(&self, method: HttpMethod, path: &str, body: Option<&B>) -> Result<(), ClientError>
    where
        B: Serialize + ?Sized,
    {
        let request = self.build_request(method, path, body)?;
        self.execute(&request).map(drop)
    }

    // -----------------------------------------------------------------------
    // Stacks
    // -----------------------------------------------------------------------

    pub fn create_stack(&self, stack: &StackBody) -> Result<StackResponse, ClientError> {
        self.send(HttpMethod::Post, STACKS_PATH, Some(stack))
    }

    pub fn get_stack(&self, id: &str) -> Result<StackResponse, ClientError> {
        self.send::<(), _>(HttpMethod::Get, &item_path(STACKS_PATH, id), None)
    }

    pub fn update_stack(&self, id: &str, stack: &StackUpdate) -> Result<StackResponse, ClientError> {
        self.send(HttpMethod::Put, &item_path(STACKS_PATH, id), Some(stack))
    }

    pub fn delete_stack(&self, id: &str) -> Result<(), ClientError> {
        self.send_discarding::<()>(HttpMethod::Delete, &item_path(STACKS_PATH, id), None)
    }

    /// List stacks. `None` requests the first page of 100.
    pub fn list_stacks(&self, params: Option<&ListParams>) -> Result<Page<StackResponse>, ClientError> {
        let defaults = ListParams::default();
        let path = list_path(STACKS_PATH, Some(params.unwrap_or(&defaults)));
        self.send::<(), _>(HttpMethod::Get, &path, None)
    }

    // -----------------------------------------------------------------------
    // Components
    // -----------------------------------------------------------------------

    pub fn create_component(&self, component: &ComponentBody) -> Result<ComponentResponse, ClientError> {
        self.send(HttpMethod::Post, COMPONENTS_PATH, Some(component))
    }

    pub fn get_component(&self, id: &str) -> Result<ComponentResponse, ClientError> {
        self.send::<(), _>(HttpMethod::Get, &item_path(COMPONENTS_PATH, id), None)
    }

    pub fn update_component(
        &self,
        id: &str,
        component: &ComponentUpdate,
    ) -> Result<ComponentResponse, ClientError> {
        self.send(HttpMethod::Put, &item_path(COMPONENTS_PATH, id), Some(component))
    }

    pub fn delete_component(&self, id: &str) -> Result<(), ClientError> {
        self.send_discarding::<()>(HttpMethod::Delete, &item_path(COMPONENTS_PATH, id), None)
    }

    /// List components. `None` requests the bare collection, leaving paging
    /// to the server.
    pub fn list_stack_components(
        &self,
        params: Option<&ListParams>,
    ) -> Result<Page<ComponentResponse>, ClientError> {
        self.send::<(), _>(HttpMethod::Get, &list_path(COMPONENTS_PATH, params), None)
    }

    // -----------------------------------------------------------------------
    // Service connectors
    // -----------------------------------------------------------------------

    pub fn create_service_connector(
        &self,
        connector: &ServiceConnectorBody,
    ) -> Result<ServiceConnectorResponse, ClientError> {
        self.send(HttpMethod::Post, SERVICE_CONNECTORS_PATH, Some(connector))
    }

    pub fn get_service_connector(&self, id: &str) -> Result<ServiceConnectorResponse, ClientError> {
        self.send::<(), _>(HttpMethod::Get, &item_path(SERVICE_CONNECTORS_PATH, id), None)
    }

    pub fn update_service_connector(
        &self,
        id: &str,
        connector: &ServiceConnectorUpdate,
    ) -> Result<ServiceConnectorResponse, ClientError> {
        self.send(HttpMethod::Put, &item_path(SERVICE_CONNECTORS_PATH, id), Some(connector))
    }

    pub fn delete_service_connector(&self, id: &str) -> Result<(), ClientError> {
        self.send_discarding::<()>(HttpMethod::Delete, &item_path(SERVICE_CONNECTORS_PATH, id), None)
    }

    /// List service connectors. `None` requests the bare collection.
    pub fn list_service_connectors(
        &self,
        params: Option<&ListParams>,
    ) -> Result<Page<ServiceConnectorResponse>, ClientError> {
        self.send::<(), _>(HttpMethod::Get, &list_path(SERVICE_CONNECTORS_PATH, params), None)
    }
}

/// Pass 2xx responses to `request` through; turn anything else into `Api`
/// or `Status`.
pub fn check_status(request: &HttpRequest, response: HttpResponse) -> Result<HttpResponse, ClientError> {
    if response.is_success() {
        return Ok(response);
    }
    match serde_json::from_slice::<ApiError>(&response.body) {
        Ok(error) => Err(ClientError::Api {
            method: request.method,
            url: request.url.clone(),
            status: response.status,
            error,
        }),
        Err(_) => Err(ClientError::Status {
            method: request.method,
            url: request.url.clone(),
            status: response.status,
            body: String::from_utf8_lossy(&response.body).into_owned(),
        }),
    }
}

/// Decode the successful response to `request` into `T`.
pub fn decode<T: DeserializeOwned>(request: &HttpRequest, response: &HttpResponse) -> Result<T, ClientError> {
    serde_json::from_slice(&response.body).map_err(|source| ClientError::Decoding {
        method: request.method,
        url: request.url.clone(),
        target: type_name::<T>(),
        source,
    })
}

fn item_path(collection: &str, id: &str) -> String {
    format!("{collection}/{id}")
}

/// Collection path with `page`, `size` and one literal segment per filter
/// entry. Filter values are not escaped.
fn list_path(collection: &str, params: Option<&ListParams>) -> String {
    let Some(params) = params else {
        return collection.to_string();
    };
    let mut path = format!("{collection}?page={}&size={}", params.page, params.page_size);
    for (key, value) in &params.filter {
        path.push('&');
        path.push_str(key);
        path.push('=');
        path.push_str(value);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client::new("http://localhost:8080", "key123")
    }

    fn request() -> HttpRequest {
        client()
            .build_request::<()>(HttpMethod::Get, "/api/v1/stacks/s1", None)
            .unwrap()
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn build_request_sets_bearer_without_content_type_for_empty_body() {
        let req = client()
            .build_request::<()>(HttpMethod::Get, "/api/v1/stacks/s1", None)
            .unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:8080/api/v1/stacks/s1");
        assert_eq!(req.header("authorization"), Some("Bearer key123"));
        assert_eq!(req.header("content-type"), None);
        assert!(req.body.is_none());
    }

    #[test]
    fn build_request_serializes_body_as_json() {
        let stack = StackBody {
            name: "prod".to_string(),
            ..Default::default()
        };
        let req = client()
            .build_request(HttpMethod::Post, STACKS_PATH, Some(&stack))
            .unwrap();
        assert_eq!(req.header("content-type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["name"], "prod");
        assert!(body.get("description").is_none());
    }

    #[test]
    fn build_request_concatenates_url_verbatim() {
        let client = Client::new("http://localhost:8080/", "key123");
        let req = client
            .build_request::<()>(HttpMethod::Delete, "/api/v1/components/c1", None)
            .unwrap();
        assert_eq!(req.url, "http://localhost:8080//api/v1/components/c1");
    }

    #[test]
    fn build_request_reports_serialization_failure() {
        // JSON object keys must be strings.
        let mut body = std::collections::HashMap::new();
        body.insert((1, 2), "tuple key");
        let err = client()
            .build_request(HttpMethod::Post, STACKS_PATH, Some(&body))
            .unwrap_err();
        assert!(matches!(err, ClientError::Serialization { .. }));
    }

    #[test]
    fn list_path_without_params_is_bare_collection() {
        assert_eq!(list_path(COMPONENTS_PATH, None), "/api/v1/components");
    }

    #[test]
    fn list_path_appends_page_size_and_filters() {
        let params = ListParams::new(2, 25).with_filter("name", "prod");
        assert_eq!(
            list_path(STACKS_PATH, Some(&params)),
            "/api/v1/stacks?page=2&size=25&name=prod"
        );
    }

    #[test]
    fn list_path_adds_one_segment_per_filter() {
        let params = ListParams::default()
            .with_filter("name", "prod")
            .with_filter("flavor", "s3")
            .with_filter("type", "artifact_store");
        let path = list_path(COMPONENTS_PATH, Some(&params));
        let (_, query) = path.split_once('?').unwrap();
        let mut segments: Vec<&str> = query.split('&').collect();
        segments.sort_unstable();
        assert_eq!(
            segments,
            vec!["flavor=s3", "name=prod", "page=1", "size=100", "type=artifact_store"]
        );
    }

    #[test]
    fn list_path_does_not_escape_filter_values() {
        let params = ListParams::new(1, 10).with_filter("name", "a b");
        assert!(list_path(STACKS_PATH, Some(&params)).ends_with("&name=a b"));
    }

    #[test]
    fn check_status_passes_2xx_through() {
        let resp = check_status(&request(), response(201, r#"{"id":"s1"}"#)).unwrap();
        assert_eq!(resp.body, br#"{"id":"s1"}"#);
    }

    #[test]
    fn check_status_decodes_structured_error() {
        let err = check_status(&request(), response(409, r#"{"code":409,"message":"name taken"}"#)).unwrap_err();
        match err {
            ClientError::Api {
                method,
                url,
                status,
                error,
            } => {
                assert_eq!(method, HttpMethod::Get);
                assert_eq!(url, "http://localhost:8080/api/v1/stacks/s1");
                assert_eq!(status, 409);
                assert_eq!(error.code, 409);
                assert_eq!(error.message, "name taken");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn check_status_keeps_raw_body_when_not_structured() {
        let err = check_status(&request(), response(502, "<html>bad gateway</html>")).unwrap_err();
        match err {
            ClientError::Status { status, body, .. } => {
                assert_eq!(status, 502);
                assert_eq!(body, "<html>bad gateway</html>");
            }
            other => panic!("expected Status error, got {other:?}"),
        }
    }

    #[test]
    fn check_status_404_is_not_found() {
        let err = check_status(&request(), response(404, r#"{"code":404,"message":"no such stack"}"#)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn check_status_replaces_invalid_utf8_in_raw_body() {
        let resp = HttpResponse {
            status: 500,
            body: b"caf\xe9 error".to_vec(),
        };
        match check_status(&request(), resp).unwrap_err() {
            ClientError::Status { status, body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body, "caf\u{FFFD} error");
            }
            other => panic!("expected Status error, got {other:?}"),
        }
    }

    #[test]
    fn decode_reports_target_type() {
        let err = decode::<StackResponse>(&request(), &response(200, "not json")).unwrap_err();
        match err {
            ClientError::Decoding { target, url, .. } => {
                assert!(target.ends_with("StackResponse"));
                assert!(url.ends_with("/api/v1/stacks/s1"));
            }
            other => panic!("expected Decoding error, got {other:?}"),
        }
    }

    #[test]
    fn decode_page_of_components() {
        let page: Page<ComponentResponse> = decode(&request(), &response(
            200,
            r#"{"index":1,"max_size":100,"total_pages":1,"total":1,
                "items":[{"id":"c1","name":"store","type":"artifact_store","flavor":"s3"}]}"#,
        ))
        .unwrap();
        assert_eq!(page.items[0].component_type, "artifact_store");
        assert_eq!(page.total, 1);
    }

    #[test]
    fn client_debug_hides_api_key() {
        let printed = format!("{:?}", client());
        assert!(!printed.contains("key123"));
    }
}
