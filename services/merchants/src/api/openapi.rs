//! OpenAPI schema aggregation for the merchant API.
//!
//! # Purpose
//! Collects all routes and schema types into a single OpenAPI document for docs
//! and client generation.
use crate::api::{
    merchants, system,
    types::{
        ApiRoot, DeleteResponse, ErrorResponse, FieldErrors, HealthStatus, MerchantPage,
        SystemInfo,
    },
};
use crate::model::{Merchant, MerchantPayload, MerchantStatus};
use crate::report::{MerchantReport, ReportFilters, ReportSummary, StatusCounts, StatusPercentages};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "merchants",
        version = "v1",
        description = "Merchant record management HTTP API"
    ),
    paths(
        system::api_root,
        system::system_info,
        system::system_health,
        merchants::list_merchants,
        merchants::create_merchant,
        merchants::get_merchant,
        merchants::update_merchant,
        merchants::patch_merchant,
        merchants::delete_merchant,
        merchants::merchant_statistics,
        merchants::export_csv,
        merchants::generate_report
    ),
    components(schemas(
        ApiRoot,
        SystemInfo,
        HealthStatus,
        ErrorResponse,
        FieldErrors,
        Merchant,
        MerchantStatus,
        MerchantPayload,
        MerchantPage,
        DeleteResponse,
        StatusCounts,
        StatusPercentages,
        ReportSummary,
        ReportFilters,
        MerchantReport
    )),
    tags(
        (name = "system", description = "System and discovery endpoints"),
        (name = "merchants", description = "Merchant records, statistics and exports")
    )
)]
pub struct ApiDoc;
