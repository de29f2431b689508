//! Postgres-backed implementation of the merchant store.
//!
//! # What this module is
//! This module implements the `MerchantStore` trait using Postgres (via `sqlx`) as the durable,
//! shared record store for merchants.
//!
//! # Key invariants
//! - Uniqueness of `email` and `business_registration_number` is declared as table constraints
//!   (`merchants_email_key`, `merchants_registration_number_key`), not checked by scanning.
//! - `status` is restricted by a CHECK constraint to the three known values.
//! - `created_at` is set by the database on insert; `updated_at` is refreshed on every update and
//!   never falls behind `created_at`.
//! - Default ordering (`created_at DESC, id DESC`) is backed by an index.
//!
//! # Concurrency model
//! - The store is shared across async handlers; `sqlx::PgPool` manages concurrency.
//! - Every mutation is a single statement, so it commits or fails atomically.
//! - The validator's duplicate checks can race with a concurrent write. The loser of that race is
//!   rejected by the unique constraint (SQLSTATE 23505), which this module reports as
//!   `StoreError::Conflict` naming the field.
//!
//! # Operational notes
//! - Migrations are executed at startup via `sqlx::migrate!("./migrations")` so handlers can assume
//!   the schema exists.
//! - Connection pooling/timeouts are explicitly configured; hanging forever on DB failures is not
//!   acceptable for a request-serving process.
//!
//! # Security notes
//! - Database URLs may contain credentials; never log them.
//! - All queries are static SQL with bound parameters; search terms are bound as `ILIKE` patterns
//!   with LIKE metacharacters escaped.
use super::{
    EMAIL_FIELD, MerchantStore, REGISTRATION_NUMBER_FIELD, StoreError, StoreResult,
};
use crate::config::PostgresConfig;
use crate::model::{Merchant, MerchantChanges, MerchantId, MerchantStatus, NewMerchant};
use crate::query::{MerchantQuery, StatusFilter};
use crate::report::StatusCounts;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use std::time::Duration;

const MERCHANT_COLUMNS: &str =
    "id, name, business_registration_number, email, phone, status, created_at, updated_at";

/// Durable merchant store backed by Postgres.
///
/// # Errors
/// - Connection and query failures are surfaced as [`StoreError::Unexpected`].
/// - Unique constraint violations are surfaced as [`StoreError::Conflict`].
///
/// # Example
/// ```rust,no_run
/// use merchants::config::PostgresConfig;
/// use merchants::store::postgres::PostgresStore;
///
/// async fn open(pg: PostgresConfig) {
///     let _ = PostgresStore::connect(&pg).await;
/// }
/// ```
pub struct PostgresStore {
    pool: PgPool,
}

/// Row shape for the `merchants` table.
///
/// Kept separate from [`Merchant`] so the text `status` column is parsed in
/// exactly one place.
#[derive(Debug, Clone, FromRow)]
struct DbMerchant {
    id: i64,
    name: String,
    business_registration_number: String,
    email: String,
    phone: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct DbStatusCounts {
    total: i64,
    active: i64,
    pending: i64,
    suspended: i64,
}

impl PostgresStore {
    /// Connect to Postgres and apply migrations before serving.
    ///
    /// # Errors
    /// - Invalid connection URL, pool setup, or migration failures.
    pub async fn connect(pg: &PostgresConfig) -> StoreResult<Self> {
        Self::connect_internal(pg, true).await
    }

    /// Connect without running migrations, for tests that manage the schema
    /// themselves.
    #[cfg(any(test, feature = "pg-tests"))]
    pub async fn connect_without_migrations(pg: &PostgresConfig) -> StoreResult<Self> {
        Self::connect_internal(pg, false).await
    }

    async fn connect_internal(pg: &PostgresConfig, run_migrations: bool) -> StoreResult<Self> {
        // Fail fast on pool exhaustion and unreachable hosts instead of hanging requests.
        let connect_options = PgConnectOptions::from_str(&pg.url)?;
        let pool = tokio::time::timeout(
            Duration::from_millis(pg.connect_timeout_ms),
            PgPoolOptions::new()
                .max_connections(pg.max_connections)
                .acquire_timeout(Duration::from_millis(pg.acquire_timeout_ms))
                .connect_with(connect_options),
        )
        .await
        .map_err(|_| StoreError::Unexpected(anyhow!("postgres connect timed out")))??;

        if run_migrations {
            sqlx::migrate!("./migrations").run(&pool).await?;
        }

        let store = Self { pool };
        store.refresh_counts().await?;
        Ok(store)
    }

    async fn refresh_counts(&self) -> StoreResult<()> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM merchants")
            .fetch_one(&self.pool)
            .await?;
        metrics::gauge!("merchants_total").set(total as f64);
        Ok(())
    }

    async fn value_taken(
        &self,
        sql: &'static str,
        value: &str,
        exclude: Option<MerchantId>,
    ) -> StoreResult<bool> {
        let taken: bool = sqlx::query_scalar(sql)
            .bind(value)
            .bind(exclude)
            .fetch_one(&self.pool)
            .await?;
        Ok(taken)
    }
}

#[async_trait]
impl MerchantStore for PostgresStore {
    async fn list_merchants(&self, query: &MerchantQuery) -> StoreResult<Vec<Merchant>> {
        let status = match query.status {
            StatusFilter::Any => None,
            StatusFilter::Only(status) => Some(status.as_str()),
            StatusFilter::Unknown => return Ok(Vec::new()),
        };
        let sql = format!(
            "SELECT {MERCHANT_COLUMNS} FROM merchants \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::text IS NULL \
                    OR name ILIKE $2 \
                    OR email ILIKE $2 \
                    OR business_registration_number ILIKE $2) \
             ORDER BY created_at DESC, id DESC"
        );
        let rows: Vec<DbMerchant> = sqlx::query_as(&sql)
            .bind(status)
            .bind(query.search_pattern())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(merchant_from_db).collect()
    }

    async fn get_merchant(&self, id: MerchantId) -> StoreResult<Merchant> {
        let sql = format!("SELECT {MERCHANT_COLUMNS} FROM merchants WHERE id = $1");
        let row: Option<DbMerchant> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => merchant_from_db(row),
            None => Err(StoreError::NotFound("merchant".into())),
        }
    }

    async fn create_merchant(&self, merchant: NewMerchant) -> StoreResult<Merchant> {
        let sql = format!(
            "INSERT INTO merchants (name, business_registration_number, email, phone, status) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {MERCHANT_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, DbMerchant>(&sql)
            .bind(&merchant.name)
            .bind(&merchant.business_registration_number)
            .bind(&merchant.email)
            .bind(&merchant.phone)
            .bind(merchant.status.as_str())
            .fetch_one(&self.pool)
            .await;
        let row = match inserted {
            Ok(row) => row,
            Err(err) => return Err(map_write_error(err)),
        };
        metrics::counter!("merchants_changes_total", "op" => "created").increment(1);
        self.refresh_counts().await?;
        merchant_from_db(row)
    }

    async fn update_merchant(
        &self,
        id: MerchantId,
        changes: MerchantChanges,
    ) -> StoreResult<Merchant> {
        let sql = format!(
            "UPDATE merchants SET \
                name = COALESCE($1::text, name), \
                business_registration_number = COALESCE($2::text, business_registration_number), \
                email = COALESCE($3::text, email), \
                phone = COALESCE($4::text, phone), \
                status = COALESCE($5::text, status), \
                updated_at = GREATEST(now(), created_at) \
             WHERE id = $6 \
             RETURNING {MERCHANT_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, DbMerchant>(&sql)
            .bind(changes.name.as_deref())
            .bind(changes.business_registration_number.as_deref())
            .bind(changes.email.as_deref())
            .bind(changes.phone.as_deref())
            .bind(changes.status.map(|status| status.as_str()))
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        let row = match updated {
            Ok(Some(row)) => row,
            Ok(None) => return Err(StoreError::NotFound("merchant".into())),
            Err(err) => return Err(map_write_error(err)),
        };
        metrics::counter!("merchants_changes_total", "op" => "updated").increment(1);
        merchant_from_db(row)
    }

    async fn delete_merchant(&self, id: MerchantId) -> StoreResult<()> {
        let removed = sqlx::query("DELETE FROM merchants WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if removed.rows_affected() == 0 {
            return Err(StoreError::NotFound("merchant".into()));
        }
        metrics::counter!("merchants_changes_total", "op" => "deleted").increment(1);
        self.refresh_counts().await?;
        Ok(())
    }

    async fn email_taken(&self, email: &str, exclude: Option<MerchantId>) -> StoreResult<bool> {
        self.value_taken(
            "SELECT EXISTS(SELECT 1 FROM merchants WHERE email = $1 AND ($2::bigint IS NULL OR id <> $2))",
            email,
            exclude,
        )
        .await
    }

    async fn registration_number_taken(
        &self,
        number: &str,
        exclude: Option<MerchantId>,
    ) -> StoreResult<bool> {
        self.value_taken(
            "SELECT EXISTS(SELECT 1 FROM merchants WHERE business_registration_number = $1 AND ($2::bigint IS NULL OR id <> $2))",
            number,
            exclude,
        )
        .await
    }

    async fn status_counts(&self) -> StoreResult<StatusCounts> {
        let row: DbStatusCounts = sqlx::query_as(
            "SELECT COUNT(*) AS total, \
                    COUNT(*) FILTER (WHERE status = 'Active') AS active, \
                    COUNT(*) FILTER (WHERE status = 'Pending') AS pending, \
                    COUNT(*) FILTER (WHERE status = 'Suspended') AS suspended \
             FROM merchants",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(StatusCounts {
            total: count_from_db(row.total)?,
            active: count_from_db(row.active)?,
            pending: count_from_db(row.pending)?,
            suspended: count_from_db(row.suspended)?,
        })
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().map(|code| code == "23505").unwrap_or(false);
    }
    false
}

/// Map a violated constraint name to the field it guards.
fn field_for_constraint(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("merchants_email_key") => EMAIL_FIELD,
        _ => REGISTRATION_NUMBER_FIELD,
    }
}

fn map_write_error(err: sqlx::Error) -> StoreError {
    if is_unique_violation(&err) {
        let constraint = match &err {
            sqlx::Error::Database(db_err) => db_err.constraint(),
            _ => None,
        };
        return StoreError::Conflict(field_for_constraint(constraint).into());
    }
    StoreError::Unexpected(err.into())
}

fn merchant_from_db(row: DbMerchant) -> StoreResult<Merchant> {
    let status = MerchantStatus::from_str(&row.status)
        .map_err(|err| StoreError::Unexpected(anyhow!("merchant {}: {err}", row.id)))?;
    Ok(Merchant {
        id: row.id,
        name: row.name,
        business_registration_number: row.business_registration_number,
        email: row.email,
        phone: row.phone,
        status,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn count_from_db(value: i64) -> StoreResult<u64> {
    u64::try_from(value).map_err(|_| StoreError::Unexpected(anyhow!("negative count {value}")))
}
