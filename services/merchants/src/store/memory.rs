//! In-memory implementation of the merchant store.
//!
//! # Purpose
//! Implements `MerchantStore` with a `HashMap` guarded by `tokio::sync::RwLock`.
//! It exists for:
//! - local development and tests (no external dependencies)
//! - deployments where durability is not required
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - **Single-process consistency**: uniqueness is re-checked under the write
//!   lock, so two concurrent creates with the same email cannot both land.
//!   The loser gets `StoreError::Conflict`, mirroring a database unique index.
//!
//! # Performance characteristics
//! Listing and duplicate checks scan every record. That is fine for dev-sized
//! data sets and would not be for large ones.
//!
//! # Metrics
//! Updates the same gauges/counters as the Postgres backend.
use super::{
    EMAIL_FIELD, MerchantStore, REGISTRATION_NUMBER_FIELD, StoreError, StoreResult,
};
use crate::model::{Merchant, MerchantChanges, MerchantId, NewMerchant};
use crate::query::{MerchantQuery, sort_newest_first};
use crate::report::StatusCounts;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MerchantTable {
    next_id: MerchantId,
    rows: HashMap<MerchantId, Merchant>,
}

impl MerchantTable {
    /// Name of the unique field `candidate` would collide on, if any.
    fn conflicting_field(
        &self,
        email: Option<&str>,
        number: Option<&str>,
        exclude: Option<MerchantId>,
    ) -> Option<&'static str> {
        let others = move || {
            self.rows
                .values()
                .filter(move |row| Some(row.id) != exclude)
        };
        if let Some(number) = number {
            if others().any(|row| row.business_registration_number == number) {
                return Some(REGISTRATION_NUMBER_FIELD);
            }
        }
        if let Some(email) = email {
            if others().any(|row| row.email == email) {
                return Some(EMAIL_FIELD);
            }
        }
        None
    }
}

/// In-memory merchant store.
///
/// Cloning shares the same underlying table.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    table: Arc<RwLock<MerchantTable>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MerchantStore for InMemoryStore {
    async fn list_merchants(&self, query: &MerchantQuery) -> StoreResult<Vec<Merchant>> {
        if query.is_unsatisfiable() {
            return Ok(Vec::new());
        }
        let mut items: Vec<Merchant> = self
            .table
            .read()
            .await
            .rows
            .values()
            .filter(|merchant| query.matches(merchant))
            .cloned()
            .collect();
        sort_newest_first(&mut items);
        Ok(items)
    }

    async fn get_merchant(&self, id: MerchantId) -> StoreResult<Merchant> {
        self.table
            .read()
            .await
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("merchant".into()))
    }

    async fn create_merchant(&self, merchant: NewMerchant) -> StoreResult<Merchant> {
        let mut table = self.table.write().await;
        if let Some(field) = table.conflicting_field(
            Some(merchant.email.as_str()),
            Some(merchant.business_registration_number.as_str()),
            None,
        ) {
            return Err(StoreError::Conflict(field.into()));
        }
        table.next_id += 1;
        let now = Utc::now();
        let created = Merchant {
            id: table.next_id,
            name: merchant.name,
            business_registration_number: merchant.business_registration_number,
            email: merchant.email,
            phone: merchant.phone,
            status: merchant.status,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(created.id, created.clone());
        metrics::counter!("merchants_changes_total", "op" => "created").increment(1);
        metrics::gauge!("merchants_total").set(table.rows.len() as f64);
        Ok(created)
    }

    async fn update_merchant(
        &self,
        id: MerchantId,
        changes: MerchantChanges,
    ) -> StoreResult<Merchant> {
        let mut table = self.table.write().await;
        if !table.rows.contains_key(&id) {
            return Err(StoreError::NotFound("merchant".into()));
        }
        if let Some(field) = table.conflicting_field(
            changes.email.as_deref(),
            changes.business_registration_number.as_deref(),
            Some(id),
        ) {
            return Err(StoreError::Conflict(field.into()));
        }
        let merchant = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("merchant".into()))?;
        changes.apply_to(merchant, Utc::now());
        let updated = merchant.clone();
        metrics::counter!("merchants_changes_total", "op" => "updated").increment(1);
        Ok(updated)
    }

    async fn delete_merchant(&self, id: MerchantId) -> StoreResult<()> {
        let mut table = self.table.write().await;
        if table.rows.remove(&id).is_none() {
            return Err(StoreError::NotFound("merchant".into()));
        }
        metrics::counter!("merchants_changes_total", "op" => "deleted").increment(1);
        metrics::gauge!("merchants_total").set(table.rows.len() as f64);
        Ok(())
    }

    async fn email_taken(&self, email: &str, exclude: Option<MerchantId>) -> StoreResult<bool> {
        let table = self.table.read().await;
        Ok(table.conflicting_field(Some(email), None, exclude).is_some())
    }

    async fn registration_number_taken(
        &self,
        number: &str,
        exclude: Option<MerchantId>,
    ) -> StoreResult<bool> {
        let table = self.table.read().await;
        Ok(table.conflicting_field(None, Some(number), exclude).is_some())
    }

    async fn status_counts(&self) -> StoreResult<StatusCounts> {
        let table = self.table.read().await;
        let mut counts = StatusCounts::default();
        for merchant in table.rows.values() {
            counts.record(merchant.status);
        }
        Ok(counts)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
