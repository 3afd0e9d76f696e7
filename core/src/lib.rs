//! Blocking API client for stacks, stack components and service connectors.
//!
//! # Overview
//! Typed CRUD and list operations over the `/api/v1` HTTP+JSON API. Every
//! request carries `Authorization: Bearer <api key>`; non-2xx responses come
//! back as [`ClientError::Api`] when the server sent a structured error body
//! and [`ClientError::Status`] otherwise.
//!
//! # Design
//! - `Client` holds only configuration and a shared [`Transport`], so it is
//!   `Send + Sync` and needs no locking.
//! - Request building and response parsing are separate, public steps; the
//!   default transport (ureq) sits between them and can be swapped.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod types;

pub use client::{check_status, decode, Client};
pub use config::ClientConfig;
pub use error::ClientError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use types::{
    ApiError, ComponentBody, ComponentResponse, ComponentUpdate, ListParams, Page,
    ServiceConnectorBody, ServiceConnectorResponse, ServiceConnectorUpdate, StackBody,
    StackResponse, StackUpdate,
};
