//! Merchant statistics, CSV export and JSON report rendering.
//!
//! # Purpose
//! Aggregates status counts and turns a filtered merchant list into the two
//! downloadable artifacts: a flat CSV table and a structured JSON report.
//!
//! # Key invariants
//! - `total == active + pending + suspended` for every `StatusCounts`.
//! - Percentages are rounded to two decimals and are `0.0` when the total is
//!   zero.
//! - Timestamps in CSV rows use `YYYY-MM-DD HH:MM:SS` (UTC).
use crate::model::{Merchant, MerchantStatus};
use crate::query::MerchantQuery;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub const CSV_HEADER: [&str; 8] = [
    "ID",
    "Name",
    "Email",
    "Phone",
    "Business Registration Number",
    "Status",
    "Created At",
    "Updated At",
];

const CSV_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const FILENAME_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("write csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("flush csv buffer: {0}")]
    Flush(String),
    #[error("encode report: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: u64,
    pub active: u64,
    pub pending: u64,
    pub suspended: u64,
}

impl StatusCounts {
    pub fn from_merchants(merchants: &[Merchant]) -> Self {
        merchants
            .iter()
            .fold(StatusCounts::default(), |mut counts, merchant| {
                counts.record(merchant.status);
                counts
            })
    }

    pub fn record(&mut self, status: MerchantStatus) {
        self.total += 1;
        match status {
            MerchantStatus::Active => self.active += 1,
            MerchantStatus::Pending => self.pending += 1,
            MerchantStatus::Suspended => self.suspended += 1,
        }
    }

    pub fn count(&self, status: MerchantStatus) -> u64 {
        match status {
            MerchantStatus::Active => self.active,
            MerchantStatus::Pending => self.pending,
            MerchantStatus::Suspended => self.suspended,
        }
    }

    pub fn percentages(&self) -> StatusPercentages {
        StatusPercentages {
            active: percentage(self.active, self.total),
            pending: percentage(self.pending, self.total),
            suspended: percentage(self.suspended, self.total),
        }
    }
}

/// Share of `count` in `total`, in percent, rounded to two decimals.
pub fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = count as f64 * 100.0 / total as f64;
    (raw * 100.0).round() / 100.0
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq)]
pub struct StatusPercentages {
    pub active: f64,
    pub pending: f64,
    pub suspended: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct ReportSummary {
    pub total: u64,
    pub active: u64,
    pub pending: u64,
    pub suspended: u64,
    pub percentages: StatusPercentages,
}

impl From<StatusCounts> for ReportSummary {
    fn from(counts: StatusCounts) -> Self {
        Self {
            total: counts.total,
            active: counts.active,
            pending: counts.pending,
            suspended: counts.suspended,
            percentages: counts.percentages(),
        }
    }
}

/// Filters echoed back in the report so a downloaded file is self-describing.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Default)]
pub struct ReportFilters {
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct MerchantReport {
    pub generated_at: String,
    pub filters: ReportFilters,
    pub summary: ReportSummary,
    pub merchants: Vec<Merchant>,
}

impl MerchantReport {
    pub fn build(merchants: Vec<Merchant>, filters: ReportFilters, now: DateTime<Utc>) -> Self {
        let summary = StatusCounts::from_merchants(&merchants).into();
        Self {
            generated_at: now.to_rfc3339_opts(SecondsFormat::Micros, false),
            filters,
            summary,
            merchants,
        }
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, ReportError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

impl ReportFilters {
    pub fn from_query(query: &MerchantQuery, raw_status: Option<&str>) -> Self {
        Self {
            status: raw_status.filter(|value| !value.is_empty()).map(str::to_string),
            search: query.search().map(str::to_string),
        }
    }
}

pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.format(CSV_TIMESTAMP_FORMAT).to_string()
}

/// Render merchants as a CSV table with a fixed header row.
pub fn render_csv(merchants: &[Merchant]) -> Result<Vec<u8>, ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for merchant in merchants {
        writer.write_record([
            merchant.id.to_string(),
            merchant.name.clone(),
            merchant.email.clone(),
            merchant.phone.clone(),
            merchant.business_registration_number.clone(),
            merchant.status.as_str().to_string(),
            format_timestamp(&merchant.created_at),
            format_timestamp(&merchant.updated_at),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|err| ReportError::Flush(err.error().to_string()))
}

pub fn export_filename(now: DateTime<Utc>) -> String {
    format!(
        "merchants_export_{}.csv",
        now.format(FILENAME_TIMESTAMP_FORMAT)
    )
}

pub fn report_filename(now: DateTime<Utc>) -> String {
    format!(
        "merchant_report_{}.json",
        now.format(FILENAME_TIMESTAMP_FORMAT)
    )
}
