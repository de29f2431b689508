//! HTTP API request/response types.
//!
//! # Purpose
//! Defines the payload shapes of the merchant REST API that are not domain
//! models themselves, and registers them for OpenAPI schema generation.
use crate::model::Merchant;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SystemInfo {
    pub service: String,
    pub api_version: String,
    pub storage_backend: String,
    pub durable_storage: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HealthStatus {
    pub status: String,
}

/// Discovery document served at the API root.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ApiRoot {
    pub merchants: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}

/// Per-field validation messages, e.g. `{"email": ["Enter a valid email address."]}`.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(pub BTreeMap<String, Vec<String>>);

/// Page of merchants returned by the list endpoint.
///
/// `next` and `previous` are relative links that carry the caller's filters.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MerchantPage {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<Merchant>,
}

/// Pagination parameters for the list endpoint.
///
/// Kept as text so a malformed `page` can be answered with "Invalid page."
/// instead of a query rejection.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// 1-based page number.
    pub page: Option<String>,
    /// Records per page, capped by the configured maximum.
    pub page_size: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct DeleteResponse {
    pub message: String,
}
