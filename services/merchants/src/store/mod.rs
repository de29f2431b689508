//! Merchant record store abstraction.
//!
//! # Purpose
//! Defines the storage contract the API and validator depend on, plus the
//! shared error type. Backends live in `memory` and `postgres`.
//!
//! # Key invariants
//! - `email` and `business_registration_number` are unique across all rows;
//!   backends enforce this at write time and report `StoreError::Conflict`
//!   naming the violated field.
//! - `list_merchants` returns newest `created_at` first, ties by descending id.
use crate::model::{Merchant, MerchantChanges, MerchantId, NewMerchant};
use crate::query::MerchantQuery;
use crate::report::StatusCounts;
use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod postgres;

/// Field name carried by `StoreError::Conflict` for the email constraint.
pub const EMAIL_FIELD: &str = "email";
/// Field name carried by `StoreError::Conflict` for the registration number constraint.
pub const REGISTRATION_NUMBER_FIELD: &str = "business_registration_number";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    /// Unique constraint rejected the write; holds the conflicting field name.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unexpected(err.into())
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Unexpected(err.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait MerchantStore: Send + Sync {
    async fn list_merchants(&self, query: &MerchantQuery) -> StoreResult<Vec<Merchant>>;
    async fn get_merchant(&self, id: MerchantId) -> StoreResult<Merchant>;
    async fn create_merchant(&self, merchant: NewMerchant) -> StoreResult<Merchant>;
    async fn update_merchant(
        &self,
        id: MerchantId,
        changes: MerchantChanges,
    ) -> StoreResult<Merchant>;
    async fn delete_merchant(&self, id: MerchantId) -> StoreResult<()>;

    /// True when another record (not `exclude`) already uses `email`.
    async fn email_taken(&self, email: &str, exclude: Option<MerchantId>) -> StoreResult<bool>;
    /// True when another record (not `exclude`) already uses `number`.
    async fn registration_number_taken(
        &self,
        number: &str,
        exclude: Option<MerchantId>,
    ) -> StoreResult<bool>;

    /// Per-status counts over every stored record, ignoring any filter.
    async fn status_counts(&self) -> StoreResult<StatusCounts>;

    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}
