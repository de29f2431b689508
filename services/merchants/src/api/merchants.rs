//! Merchant API handlers.
//!
//! # Purpose
//! Implements merchant CRUD, statistics, CSV export and JSON report endpoints.
//! Writes go through the validator before reaching the store; reads go through
//! the query filter and, for the list endpoint, page-number pagination.
//!
//! # Key invariants
//! - Every invalid field of a write is reported in one 400 response.
//! - A non-numeric or unknown id is a 404, never a 400.
//! - Export and report operate on the same filtered view as the list endpoint;
//!   statistics always cover the whole table.
use crate::api::error::{
    ApiError, api_internal, api_internal_message, api_not_found, api_store_write_error,
    api_validate_error, api_validation_error,
};
use crate::api::types::{DeleteResponse, MerchantPage, PageParams};
use crate::app::AppState;
use crate::model::{Merchant, MerchantId, MerchantPayload};
use crate::query::{FilterParams, MerchantQuery};
use crate::report::{self, MerchantReport, ReportFilters, StatusCounts};
use crate::store::StoreError;
use crate::validation;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use chrono::Utc;

pub const MERCHANTS_PATH: &str = "/api/merchants/";

const INVALID_PAGE: &str = "Invalid page.";
const NOT_FOUND: &str = "Not found.";

fn parse_id(raw: &str) -> Result<MerchantId, ApiError> {
    raw.parse::<MerchantId>().map_err(|_| api_not_found(NOT_FOUND))
}

fn read_payload(
    payload: Result<Json<MerchantPayload>, JsonRejection>,
) -> Result<MerchantPayload, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| api_validation_error(&rejection.body_text()))
}

async fn load_filtered(state: &AppState, query: &MerchantQuery) -> Result<Vec<Merchant>, ApiError> {
    state
        .store
        .list_merchants(query)
        .await
        .map_err(|err| api_internal("failed to list merchants", &err))
}

async fn ensure_exists(state: &AppState, id: MerchantId) -> Result<(), ApiError> {
    match state.store.get_merchant(id).await {
        Ok(_) => Ok(()),
        Err(StoreError::NotFound(_)) => Err(api_not_found(NOT_FOUND)),
        Err(err) => Err(api_internal("failed to load merchant", &err)),
    }
}

/// Effective page size: the requested size when it is a positive number,
/// otherwise the default, never above `max`.
fn resolve_page_size(raw: Option<&str>, default: usize, max: usize) -> usize {
    raw.and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|size| *size > 0)
        .unwrap_or(default)
        .min(max)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageRequest {
    Number(usize),
    Last,
}

fn parse_page(raw: Option<&str>) -> Option<PageRequest> {
    match raw.map(str::trim) {
        None | Some("") => Some(PageRequest::Number(1)),
        Some("last") => Some(PageRequest::Last),
        Some(value) => value
            .parse::<usize>()
            .ok()
            .filter(|page| *page > 0)
            .map(PageRequest::Number),
    }
}

/// Relative link to `page` that keeps the caller's filters and page size.
fn page_link(filters: &FilterParams, page_size: Option<&str>, page: usize) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    if let Some(status) = filters.status.as_deref() {
        query.append_pair("status", status);
    }
    if let Some(search) = filters.search.as_deref() {
        query.append_pair("search", search);
    }
    if let Some(size) = page_size {
        query.append_pair("page_size", size);
    }
    if page > 1 {
        query.append_pair("page", &page.to_string());
    }
    let query = query.finish();
    if query.is_empty() {
        MERCHANTS_PATH.to_string()
    } else {
        format!("{MERCHANTS_PATH}?{query}")
    }
}

fn paginate(
    merchants: Vec<Merchant>,
    filters: &FilterParams,
    paging: &PageParams,
    default_size: usize,
    max_size: usize,
) -> Result<MerchantPage, ApiError> {
    let size = resolve_page_size(paging.page_size.as_deref(), default_size, max_size);
    let count = merchants.len();
    let pages = count.div_ceil(size).max(1);
    let page = match parse_page(paging.page.as_deref()) {
        Some(PageRequest::Number(page)) if page <= pages => page,
        Some(PageRequest::Last) => pages,
        _ => return Err(api_not_found(INVALID_PAGE)),
    };
    let page_size = paging.page_size.as_deref();
    let results = merchants
        .into_iter()
        .skip((page - 1) * size)
        .take(size)
        .collect();
    Ok(MerchantPage {
        count: count as u64,
        next: (page < pages).then(|| page_link(filters, page_size, page + 1)),
        previous: (page > 1).then(|| page_link(filters, page_size, page - 1)),
        results,
    })
}

#[utoipa::path(
    get,
    path = "/api/merchants/",
    tag = "merchants",
    params(FilterParams, PageParams),
    responses(
        (status = 200, description = "Page of merchants, newest first", body = MerchantPage),
        (status = 404, description = "Invalid page", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn list_merchants(
    State(state): State<AppState>,
    Query(filters): Query<FilterParams>,
    Query(paging): Query<PageParams>,
) -> Result<Json<MerchantPage>, ApiError> {
    let query = MerchantQuery::from_params(&filters);
    let merchants = load_filtered(&state, &query).await?;
    let page = paginate(
        merchants,
        &filters,
        &paging,
        state.page_size,
        state.max_page_size,
    )?;
    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/api/merchants/",
    tag = "merchants",
    request_body = MerchantPayload,
    responses(
        (status = 201, description = "Merchant created", body = Merchant),
        (status = 400, description = "Invalid fields", body = crate::api::types::FieldErrors)
    )
)]
pub(crate) async fn create_merchant(
    State(state): State<AppState>,
    payload: Result<Json<MerchantPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = read_payload(payload)?;
    let merchant = validation::validate_new(state.store.as_ref(), payload)
        .await
        .map_err(|err| api_validate_error("failed to validate merchant", err))?;
    let created = state
        .store
        .create_merchant(merchant)
        .await
        .map_err(|err| api_store_write_error("failed to create merchant", err))?;
    tracing::info!(merchant_id = created.id, "merchant created");
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/merchants/{id}/",
    tag = "merchants",
    params(("id" = i64, Path, description = "Merchant id")),
    responses(
        (status = 200, description = "Merchant", body = Merchant),
        (status = 404, description = "Merchant not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_merchant(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Merchant>, ApiError> {
    let id = parse_id(&id)?;
    match state.store.get_merchant(id).await {
        Ok(merchant) => Ok(Json(merchant)),
        Err(StoreError::NotFound(_)) => Err(api_not_found(NOT_FOUND)),
        Err(err) => Err(api_internal("failed to load merchant", &err)),
    }
}

#[utoipa::path(
    put,
    path = "/api/merchants/{id}/",
    tag = "merchants",
    params(("id" = i64, Path, description = "Merchant id")),
    request_body = MerchantPayload,
    responses(
        (status = 200, description = "Merchant replaced", body = Merchant),
        (status = 400, description = "Invalid fields", body = crate::api::types::FieldErrors),
        (status = 404, description = "Merchant not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn update_merchant(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<MerchantPayload>, JsonRejection>,
) -> Result<Json<Merchant>, ApiError> {
    let id = parse_id(&id)?;
    ensure_exists(&state, id).await?;
    let payload = read_payload(payload)?;
    let changes = validation::validate_replace(state.store.as_ref(), id, payload)
        .await
        .map_err(|err| api_validate_error("failed to validate merchant", err))?;
    let updated = state
        .store
        .update_merchant(id, changes)
        .await
        .map_err(|err| api_store_write_error("failed to update merchant", err))?;
    tracing::info!(merchant_id = id, "merchant replaced");
    Ok(Json(updated))
}

#[utoipa::path(
    patch,
    path = "/api/merchants/{id}/",
    tag = "merchants",
    params(("id" = i64, Path, description = "Merchant id")),
    request_body = MerchantPayload,
    responses(
        (status = 200, description = "Merchant updated", body = Merchant),
        (status = 400, description = "Invalid fields", body = crate::api::types::FieldErrors),
        (status = 404, description = "Merchant not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn patch_merchant(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<MerchantPayload>, JsonRejection>,
) -> Result<Json<Merchant>, ApiError> {
    let id = parse_id(&id)?;
    ensure_exists(&state, id).await?;
    let payload = read_payload(payload)?;
    let changes = validation::validate_patch(state.store.as_ref(), id, payload)
        .await
        .map_err(|err| api_validate_error("failed to validate merchant", err))?;
    let updated = state
        .store
        .update_merchant(id, changes)
        .await
        .map_err(|err| api_store_write_error("failed to update merchant", err))?;
    tracing::info!(merchant_id = id, "merchant updated");
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/api/merchants/{id}/",
    tag = "merchants",
    params(("id" = i64, Path, description = "Merchant id")),
    responses(
        (status = 204, description = "Merchant deleted", body = DeleteResponse),
        (status = 404, description = "Merchant not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn delete_merchant(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    match state.store.delete_merchant(id).await {
        Ok(()) => {
            tracing::info!(merchant_id = id, "merchant deleted");
            Ok((
                StatusCode::NO_CONTENT,
                Json(DeleteResponse {
                    message: "Merchant deleted successfully".to_string(),
                }),
            ))
        }
        Err(StoreError::NotFound(_)) => Err(api_not_found(NOT_FOUND)),
        Err(err) => Err(api_internal("failed to delete merchant", &err)),
    }
}

#[utoipa::path(
    get,
    path = "/api/merchants/statistics/",
    tag = "merchants",
    responses(
        (status = 200, description = "Counts per status over all merchants", body = StatusCounts)
    )
)]
pub(crate) async fn merchant_statistics(
    State(state): State<AppState>,
) -> Result<Json<StatusCounts>, ApiError> {
    let counts = state
        .store
        .status_counts()
        .await
        .map_err(|err| api_internal("failed to count merchants", &err))?;
    Ok(Json(counts))
}

#[utoipa::path(
    get,
    path = "/api/merchants/export_csv/",
    tag = "merchants",
    params(FilterParams),
    responses(
        (status = 200, description = "CSV attachment of the filtered merchants", content_type = "text/csv", body = String)
    )
)]
pub(crate) async fn export_csv(
    State(state): State<AppState>,
    Query(filters): Query<FilterParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query = MerchantQuery::from_params(&filters);
    let merchants = load_filtered(&state, &query).await?;
    let body = report::render_csv(&merchants).map_err(|err| {
        tracing::error!(error = ?err, "failed to render merchant csv");
        api_internal_message("failed to export merchants")
    })?;
    let filename = report::export_filename(Utc::now());
    metrics::counter!("merchants_exports_total", "format" => "csv").increment(1);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    ))
}

#[utoipa::path(
    get,
    path = "/api/merchants/generate_report/",
    tag = "merchants",
    params(FilterParams),
    responses(
        (status = 200, description = "JSON report attachment of the filtered merchants", body = MerchantReport)
    )
)]
pub(crate) async fn generate_report(
    State(state): State<AppState>,
    Query(filters): Query<FilterParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query = MerchantQuery::from_params(&filters);
    let merchants = load_filtered(&state, &query).await?;
    let now = Utc::now();
    let report = MerchantReport::build(
        merchants,
        ReportFilters::from_query(&query, filters.status.as_deref()),
        now,
    );
    let body = report.to_json_bytes().map_err(|err| {
        tracing::error!(error = ?err, "failed to render merchant report");
        api_internal_message("failed to generate report")
    })?;
    metrics::counter!("merchants_exports_total", "format" => "json").increment(1);
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", report::report_filename(now)),
            ),
        ],
        body,
    ))
}
