//! Merchant record definitions and write payloads.
//!
//! # Purpose
//! Defines the stored merchant shape, the closed status enumeration, and the
//! raw/normalized payloads used when creating or mutating records.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

/// System-assigned merchant identifier.
pub type MerchantId = i64;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
pub struct Merchant {
    pub id: MerchantId,
    pub name: String,
    pub business_registration_number: String,
    pub email: String,
    pub phone: String,
    pub status: MerchantStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Display for Merchant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.business_registration_number)
    }
}

/// Lifecycle status of a merchant.
///
/// Any status may move to any other status on update; no transition is
/// restricted.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MerchantStatus {
    Active,
    #[default]
    Pending,
    Suspended,
}

impl MerchantStatus {
    pub const ALL: [MerchantStatus; 3] = [
        MerchantStatus::Active,
        MerchantStatus::Pending,
        MerchantStatus::Suspended,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MerchantStatus::Active => "Active",
            MerchantStatus::Pending => "Pending",
            MerchantStatus::Suspended => "Suspended",
        }
    }
}

impl fmt::Display for MerchantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown merchant status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for MerchantStatus {
    type Err = UnknownStatus;

    // Exact, case-sensitive match against the stored spelling.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        MerchantStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| UnknownStatus(value.to_string()))
    }
}

/// One client-supplied field before type checking.
///
/// Text and numbers are accepted (numbers by their decimal rendering); any
/// other JSON type is left for the validator to report against the field.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(transparent)]
pub struct FieldInput(serde_json::Value);

impl FieldInput {
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match &self.0 {
            serde_json::Value::String(text) => Some(Cow::Borrowed(text)),
            serde_json::Value::Number(number) => Some(Cow::Owned(number.to_string())),
            _ => None,
        }
    }
}

impl From<&str> for FieldInput {
    fn from(value: &str) -> Self {
        Self(serde_json::Value::String(value.to_string()))
    }
}

impl From<serde_json::Value> for FieldInput {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Raw write payload as received from clients.
///
/// Every field is optional so one shape serves create, full update, and
/// partial update; the validator decides which fields are required. Fields
/// stay untyped so a wrong JSON type or an unknown status is reported as a
/// field error instead of a body rejection. `null` reads as absent.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default)]
pub struct MerchantPayload {
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub name: Option<FieldInput>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub business_registration_number: Option<FieldInput>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub email: Option<FieldInput>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub phone: Option<FieldInput>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub status: Option<FieldInput>,
}

/// Normalized field set for a new record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMerchant {
    pub name: String,
    pub business_registration_number: String,
    pub email: String,
    pub phone: String,
    pub status: MerchantStatus,
}

/// Normalized field changes for an existing record; `None` leaves the stored
/// value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MerchantChanges {
    pub name: Option<String>,
    pub business_registration_number: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<MerchantStatus>,
}

impl MerchantChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.business_registration_number.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.status.is_none()
    }

    /// Apply the supplied fields to `merchant` and stamp `updated_at`.
    pub fn apply_to(self, merchant: &mut Merchant, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            merchant.name = name;
        }
        if let Some(number) = self.business_registration_number {
            merchant.business_registration_number = number;
        }
        if let Some(email) = self.email {
            merchant.email = email;
        }
        if let Some(phone) = self.phone {
            merchant.phone = phone;
        }
        if let Some(status) = self.status {
            merchant.status = status;
        }
        // Clock skew must never push updated_at behind created_at.
        merchant.updated_at = now.max(merchant.created_at);
    }
}
