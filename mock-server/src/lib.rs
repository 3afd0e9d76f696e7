use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

pub const STACKS_PATH: &str = "/api/v1/stacks";
pub const COMPONENTS_PATH: &str = "/api/v1/components";
pub const SERVICE_CONNECTORS_PATH: &str = "/api/v1/service_connectors";

/// Error body sent with every non-2xx response this server produces itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub code: u16,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Page {
    pub index: u32,
    pub max_size: u32,
    pub total_pages: u32,
    pub total: u64,
    pub items: Vec<Value>,
}

type Record = Map<String, Value>;

/// One resource kind's records, kept in creation order.
pub struct Collection {
    kind: &'static str,
    /// Fields accepted on write but never returned.
    write_only: &'static [&'static str],
    records: RwLock<Vec<Record>>,
}

pub type Db = Arc<Collection>;

impl Collection {
    fn new(kind: &'static str, write_only: &'static [&'static str]) -> Self {
        Self {
            kind,
            write_only,
            records: RwLock::new(Vec::new()),
        }
    }

    fn public_view(&self, record: &Record) -> Value {
        let mut view = record.clone();
        for field in self.write_only {
            view.remove(*field);
        }
        Value::Object(view)
    }

    fn not_found(&self, id: &str) -> Response {
        error(StatusCode::NOT_FOUND, format!("{} '{id}' not found", self.kind))
    }
}

pub fn app(api_key: &str) -> Router {
    Router::new()
        .merge(collection(STACKS_PATH, "stack", &[]))
        .merge(collection(COMPONENTS_PATH, "component", &[]))
        .merge(collection(SERVICE_CONNECTORS_PATH, "service connector", &["secrets"]))
        .layer(middleware::from_fn_with_state(Arc::<str>::from(api_key), require_bearer))
}

pub async fn run(listener: TcpListener, api_key: &str) -> Result<(), std::io::Error> {
    axum::serve(listener, app(api_key)).await
}

fn collection(path: &str, kind: &'static str, write_only: &'static [&'static str]) -> Router {
    let db: Db = Arc::new(Collection::new(kind, write_only));
    Router::new()
        .route(path, get(list_records).post(create_record))
        .route(
            &format!("{path}/{{id}}"),
            get(get_record).put(update_record).delete(delete_record),
        )
        .with_state(db)
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ApiError {
        code: status.as_u16(),
        message: message.into(),
    };
    (status, Json(body)).into_response()
}

async fn require_bearer(State(api_key): State<Arc<str>>, request: Request, next: Next) -> Response {
    let expected = format!("Bearer {api_key}");
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    if presented != Some(expected.as_str()) {
        return error(StatusCode::UNAUTHORIZED, "missing or invalid bearer token");
    }
    next.run(request).await
}

async fn list_records(State(db): State<Db>, Query(mut query): Query<HashMap<String, String>>) -> Response {
    let page = query.remove("page").map(|v| v.parse::<u32>());
    let size = query.remove("size").map(|v| v.parse::<u32>());

    let records = db.records.read().await;
    let matching: Vec<&Record> = records
        .iter()
        .filter(|record| query.iter().all(|(key, value)| field_matches(record, key, value)))
        .collect();
    let total = matching.len();

    let (index, max_size, items) = match (page, size) {
        (None, None) => (1, total as u32, matching),
        (Some(Ok(page)), Some(Ok(size))) if page >= 1 && size >= 1 => {
            let start = (page as usize - 1) * size as usize;
            let items = matching.into_iter().skip(start).take(size as usize).collect();
            (page, size, items)
        }
        _ => return error(StatusCode::BAD_REQUEST, "page and size must be positive integers"),
    };
    let total_pages = if max_size == 0 {
        1
    } else {
        total.div_ceil(max_size as usize) as u32
    };

    Json(Page {
        index,
        max_size,
        total_pages,
        total: total as u64,
        items: items.into_iter().map(|record| db.public_view(record)).collect(),
    })
    .into_response()
}

fn field_matches(record: &Record, key: &str, value: &str) -> bool {
    match record.get(key) {
        Some(Value::String(s)) => s == value,
        Some(other) => other.to_string() == value,
        None => false,
    }
}

async fn create_record(State(db): State<Db>, Json(input): Json<Value>) -> Response {
    let Value::Object(mut record) = input else {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "request body must be a JSON object");
    };
    if !matches!(record.get("name"), Some(Value::String(name)) if !name.is_empty()) {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "field 'name' is required");
    }
    let id = Uuid::new_v4().to_string();
    record.insert("id".to_string(), Value::String(id.clone()));
    debug!(kind = db.kind, %id, "created");

    let view = db.public_view(&record);
    db.records.write().await.push(record);
    (StatusCode::CREATED, Json(view)).into_response()
}

async fn get_record(State(db): State<Db>, Path(id): Path<String>) -> Response {
    let records = db.records.read().await;
    match records.iter().find(|record| has_id(record, &id)) {
        Some(record) => Json(db.public_view(record)).into_response(),
        None => db.not_found(&id),
    }
}

async fn update_record(State(db): State<Db>, Path(id): Path<String>, Json(input): Json<Value>) -> Response {
    let Value::Object(changes) = input else {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "request body must be a JSON object");
    };
    let mut records = db.records.write().await;
    let Some(record) = records.iter_mut().find(|record| has_id(record, &id)) else {
        return db.not_found(&id);
    };
    for (key, value) in changes {
        if key != "id" && !value.is_null() {
            record.insert(key, value);
        }
    }
    debug!(kind = db.kind, %id, "updated");
    Json(db.public_view(record)).into_response()
}

async fn delete_record(State(db): State<Db>, Path(id): Path<String>) -> Response {
    let mut records = db.records.write().await;
    let Some(position) = records.iter().position(|record| has_id(record, &id)) else {
        return db.not_found(&id);
    };
    records.remove(position);
    debug!(kind = db.kind, %id, "deleted");
    StatusCode::NO_CONTENT.into_response()
}

fn has_id(record: &Record, id: &str) -> bool {
    record.get("id").and_then(Value::as_str) == Some(id)
}
