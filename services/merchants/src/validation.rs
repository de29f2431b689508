//! Merchant payload normalization and validation.
//!
//! # Purpose
//! Normalizes incoming merchant fields and checks them before any write
//! reaches the store. Every supplied field is checked and all failures are
//! collected, so one response can report every invalid field.
//!
//! # Key invariants
//! - Registration numbers are trimmed and upper-cased; emails trimmed and
//!   lower-cased; phones lose spaces and dashes. Uniqueness checks run on the
//!   normalized value.
//! - Duplicate checks exclude the record being updated.
//! - A field reports at most one failure (the first check it fails).
//! - Store lookups are read-only; the store still enforces uniqueness at write
//!   time.
use crate::model::{
    FieldInput, MerchantChanges, MerchantId, MerchantPayload, MerchantStatus, NewMerchant,
};
use crate::store::{EMAIL_FIELD, MerchantStore, REGISTRATION_NUMBER_FIELD, StoreError};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use validator::ValidateEmail;

pub const NAME_FIELD: &str = "name";
pub const PHONE_FIELD: &str = "phone";
pub const STATUS_FIELD: &str = "status";

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 255;
const REGISTRATION_NUMBER_MIN_CHARS: usize = 3;
const REGISTRATION_NUMBER_MAX_CHARS: usize = 100;
const EMAIL_MAX_CHARS: usize = 254;
const PHONE_MAX_CHARS: usize = 17;

static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?1?\d{9,15}$").expect("phone pattern compiles"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValidationErrorKind {
    Required,
    TooShort,
    TooLong,
    InvalidFormat,
    InvalidEnum,
    DuplicateKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub kind: ValidationErrorKind,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            field,
            kind,
            message: message.into(),
        }
    }

    fn required(field: &'static str) -> Self {
        Self::new(field, ValidationErrorKind::Required, "This field is required.")
    }

    fn not_text(field: &'static str) -> Self {
        Self::new(field, ValidationErrorKind::InvalidFormat, "Not a valid string.")
    }

    fn too_long(field: &'static str, max: usize) -> Self {
        Self::new(
            field,
            ValidationErrorKind::TooLong,
            format!("Ensure this field has no more than {max} characters."),
        )
    }

    /// Duplicate-key error for a unique field, also used when the store
    /// rejects a write late.
    pub fn duplicate(field: &str) -> Self {
        if field == EMAIL_FIELD {
            Self::new(
                EMAIL_FIELD,
                ValidationErrorKind::DuplicateKey,
                "A merchant with this email already exists.",
            )
        } else {
            Self::new(
                REGISTRATION_NUMBER_FIELD,
                ValidationErrorKind::DuplicateKey,
                "A merchant with this business registration number already exists.",
            )
        }
    }
}

/// Aggregated field failures for one write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    pub fn kind_of(&self, field: &str) -> Option<ValidationErrorKind> {
        self.errors
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.kind)
    }

    /// `{field: [messages]}` view used for HTTP 400 bodies.
    pub fn to_field_map(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for error in &self.errors {
            map.entry(error.field.to_string())
                .or_default()
                .push(error.message.clone());
        }
        map
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join("; "))
    }
}

#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("invalid merchant payload: {0}")]
    Invalid(ValidationErrors),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn normalize_name(raw: &str) -> Result<String, ValidationError> {
    let value = raw.trim();
    let chars = value.chars().count();
    if chars < NAME_MIN_CHARS {
        return Err(ValidationError::new(
            NAME_FIELD,
            ValidationErrorKind::TooShort,
            "Name must be at least 2 characters long.",
        ));
    }
    if chars > NAME_MAX_CHARS {
        return Err(ValidationError::too_long(NAME_FIELD, NAME_MAX_CHARS));
    }
    Ok(value.to_string())
}

pub fn normalize_registration_number(raw: &str) -> Result<String, ValidationError> {
    let value = raw.trim().to_uppercase();
    let chars = value.chars().count();
    if chars < REGISTRATION_NUMBER_MIN_CHARS {
        return Err(ValidationError::new(
            REGISTRATION_NUMBER_FIELD,
            ValidationErrorKind::TooShort,
            "Business registration number must be at least 3 characters long.",
        ));
    }
    if chars > REGISTRATION_NUMBER_MAX_CHARS {
        return Err(ValidationError::too_long(
            REGISTRATION_NUMBER_FIELD,
            REGISTRATION_NUMBER_MAX_CHARS,
        ));
    }
    Ok(value)
}

pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let value = raw.trim().to_lowercase();
    if value.chars().count() > EMAIL_MAX_CHARS {
        return Err(ValidationError::too_long(EMAIL_FIELD, EMAIL_MAX_CHARS));
    }
    if !value.validate_email() || !has_qualified_domain(&value) {
        return Err(ValidationError::new(
            EMAIL_FIELD,
            ValidationErrorKind::InvalidFormat,
            "Enter a valid email address.",
        ));
    }
    Ok(value)
}

// Bare hosts other than localhost are rejected; the address needs a dotted domain.
fn has_qualified_domain(email: &str) -> bool {
    match email.rsplit_once('@') {
        Some((_, domain)) => domain == "localhost" || domain.contains('.'),
        None => false,
    }
}

pub fn normalize_phone(raw: &str) -> Result<String, ValidationError> {
    let value: String = raw.chars().filter(|ch| *ch != ' ' && *ch != '-').collect();
    if value.chars().count() > PHONE_MAX_CHARS {
        return Err(ValidationError::too_long(PHONE_FIELD, PHONE_MAX_CHARS));
    }
    if !PHONE_PATTERN.is_match(&value) {
        return Err(ValidationError::new(
            PHONE_FIELD,
            ValidationErrorKind::InvalidFormat,
            "Phone number must be entered in the format: '+999999999'. Up to 15 digits allowed.",
        ));
    }
    Ok(value)
}

pub fn parse_status(raw: &str) -> Result<MerchantStatus, ValidationError> {
    raw.parse::<MerchantStatus>().map_err(|_| {
        let allowed: Vec<&str> = MerchantStatus::ALL.iter().map(|s| s.as_str()).collect();
        ValidationError::new(
            STATUS_FIELD,
            ValidationErrorKind::InvalidEnum,
            format!("Status must be one of: {}", allowed.join(", ")),
        )
    })
}

/// Which fields a write must supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    /// Create: every field except `status`.
    Create,
    /// Full update: every field.
    Replace,
    /// Partial update: nothing.
    Partial,
}

impl Presence {
    fn requires(self, field: &str) -> bool {
        match self {
            Presence::Create => field != STATUS_FIELD,
            Presence::Replace => true,
            Presence::Partial => false,
        }
    }
}

/// Validate a create payload; `status` defaults to `Pending`.
pub async fn validate_new(
    store: &dyn MerchantStore,
    payload: MerchantPayload,
) -> Result<NewMerchant, ValidateError> {
    let (changes, errors) = check_fields(store, payload, Presence::Create, None).await?;
    match changes {
        MerchantChanges {
            name: Some(name),
            business_registration_number: Some(business_registration_number),
            email: Some(email),
            phone: Some(phone),
            status,
        } if errors.is_empty() => Ok(NewMerchant {
            name,
            business_registration_number,
            email,
            phone,
            status: status.unwrap_or_default(),
        }),
        _ => Err(ValidateError::Invalid(errors)),
    }
}

/// Validate a full-update payload for merchant `id`; every field is required.
pub async fn validate_replace(
    store: &dyn MerchantStore,
    id: MerchantId,
    payload: MerchantPayload,
) -> Result<MerchantChanges, ValidateError> {
    let (changes, errors) = check_fields(store, payload, Presence::Replace, Some(id)).await?;
    finish(changes, errors)
}

/// Validate a partial-update payload for merchant `id`; only supplied fields
/// are checked.
pub async fn validate_patch(
    store: &dyn MerchantStore,
    id: MerchantId,
    payload: MerchantPayload,
) -> Result<MerchantChanges, ValidateError> {
    let (changes, errors) = check_fields(store, payload, Presence::Partial, Some(id)).await?;
    finish(changes, errors)
}

fn finish(
    changes: MerchantChanges,
    errors: ValidationErrors,
) -> Result<MerchantChanges, ValidateError> {
    if errors.is_empty() {
        Ok(changes)
    } else {
        Err(ValidateError::Invalid(errors))
    }
}

async fn check_fields(
    store: &dyn MerchantStore,
    payload: MerchantPayload,
    presence: Presence,
    exclude: Option<MerchantId>,
) -> Result<(MerchantChanges, ValidationErrors), StoreError> {
    let mut errors = ValidationErrors::new();
    let mut changes = MerchantChanges::default();

    changes.name = check_one(
        payload.name.as_ref(),
        NAME_FIELD,
        presence,
        normalize_name,
        &mut errors,
    );

    changes.business_registration_number = check_one(
        payload.business_registration_number.as_ref(),
        REGISTRATION_NUMBER_FIELD,
        presence,
        normalize_registration_number,
        &mut errors,
    );
    if let Some(number) = changes.business_registration_number.as_deref() {
        if store.registration_number_taken(number, exclude).await? {
            errors.push(ValidationError::duplicate(REGISTRATION_NUMBER_FIELD));
            changes.business_registration_number = None;
        }
    }

    changes.email = check_one(
        payload.email.as_ref(),
        EMAIL_FIELD,
        presence,
        normalize_email,
        &mut errors,
    );
    if let Some(email) = changes.email.as_deref() {
        if store.email_taken(email, exclude).await? {
            errors.push(ValidationError::duplicate(EMAIL_FIELD));
            changes.email = None;
        }
    }

    changes.phone = check_one(
        payload.phone.as_ref(),
        PHONE_FIELD,
        presence,
        normalize_phone,
        &mut errors,
    );

    changes.status = check_one(
        payload.status.as_ref(),
        STATUS_FIELD,
        presence,
        parse_status,
        &mut errors,
    );

    Ok((changes, errors))
}

fn check_one<T>(
    raw: Option<&FieldInput>,
    field: &'static str,
    presence: Presence,
    normalize: fn(&str) -> Result<T, ValidationError>,
    errors: &mut ValidationErrors,
) -> Option<T> {
    let Some(raw) = raw else {
        if presence.requires(field) {
            errors.push(ValidationError::required(field));
        }
        return None;
    };
    let Some(text) = raw.as_text() else {
        errors.push(ValidationError::not_text(field));
        return None;
    };
    match normalize(&text) {
        Ok(value) => Some(value),
        Err(err) => {
            errors.push(err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;

    fn payload(name: &str, brn: &str, email: &str, phone: &str) -> MerchantPayload {
        MerchantPayload {
            name: Some(name.into()),
            business_registration_number: Some(brn.into()),
            email: Some(email.into()),
            phone: Some(phone.into()),
            status: None,
        }
    }

    #[test]
    fn name_boundary_is_two_characters() {
        assert_eq!(
            normalize_name(" a ").unwrap_err().kind,
            ValidationErrorKind::TooShort
        );
        assert_eq!(
            normalize_name("   ").unwrap_err().kind,
            ValidationErrorKind::TooShort
        );
        assert_eq!(normalize_name("  ab  ").unwrap(), "ab");
    }

    #[test]
    fn name_longer_than_column_is_rejected() {
        let long = "x".repeat(256);
        assert_eq!(
            normalize_name(&long).unwrap_err().kind,
            ValidationErrorKind::TooLong
        );
        assert!(normalize_name(&"x".repeat(255)).is_ok());
    }

    #[test]
    fn registration_number_is_trimmed_and_uppercased() {
        assert_eq!(normalize_registration_number("  brn1 ").unwrap(), "BRN1");
        assert_eq!(
            normalize_registration_number(" ab ").unwrap_err().kind,
            ValidationErrorKind::TooShort
        );
        assert_eq!(normalize_registration_number("abc").unwrap(), "ABC");
    }

    #[test]
    fn email_is_lowercased_and_checked() {
        assert_eq!(normalize_email("  A@B.com ").unwrap(), "a@b.com");
        let err = normalize_email("invalid-email").unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::InvalidFormat);
        assert_eq!(err.message, "Enter a valid email address.");
        assert_eq!(
            normalize_email("").unwrap_err().kind,
            ValidationErrorKind::InvalidFormat
        );
    }

    #[test]
    fn email_domain_needs_a_dot_unless_localhost() {
        assert_eq!(
            normalize_email("a@b").unwrap_err().kind,
            ValidationErrorKind::InvalidFormat
        );
        assert_eq!(normalize_email("user@localhost").unwrap(), "user@localhost");
        assert_eq!(normalize_email("ops@mail.example.io").unwrap(), "ops@mail.example.io");
    }

    #[test]
    fn phone_accepts_documented_shapes() {
        assert_eq!(normalize_phone("+1234567890").unwrap(), "+1234567890");
        assert_eq!(normalize_phone("1234567890").unwrap(), "1234567890");
        assert_eq!(normalize_phone("123-456-7890").unwrap(), "1234567890");
        assert_eq!(normalize_phone("+1 987 654 3210").unwrap(), "+19876543210");
    }

    #[test]
    fn phone_rejects_short_and_non_numeric() {
        assert_eq!(
            normalize_phone("123").unwrap_err().kind,
            ValidationErrorKind::InvalidFormat
        );
        assert_eq!(
            normalize_phone("abc1234567").unwrap_err().kind,
            ValidationErrorKind::InvalidFormat
        );
        assert!(normalize_phone("1234567890123456").is_ok());
        assert!(normalize_phone("12345678901234567").is_err());
        assert_eq!(
            normalize_phone("+1 234 567 890 123 456 789").unwrap_err().kind,
            ValidationErrorKind::TooLong
        );
    }

    #[test]
    fn status_must_be_known() {
        assert_eq!(parse_status("Active").unwrap(), MerchantStatus::Active);
        let err = parse_status("Closed").unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::InvalidEnum);
        assert_eq!(err.message, "Status must be one of: Active, Pending, Suspended");
    }

    #[tokio::test]
    async fn validate_new_normalizes_all_fields() {
        let store = InMemoryStore::new();
        let mut input = payload("Acme", "brn1", "A@B.com", "123-456-7890");
        input.status = Some("Active".into());
        let merchant = validate_new(&store, input).await.unwrap();
        assert_eq!(
            merchant,
            NewMerchant {
                name: "Acme".to_string(),
                business_registration_number: "BRN1".to_string(),
                email: "a@b.com".to_string(),
                phone: "1234567890".to_string(),
                status: MerchantStatus::Active,
            }
        );
    }

    #[tokio::test]
    async fn validate_new_defaults_status_to_pending() {
        let store = InMemoryStore::new();
        let merchant = validate_new(&store, payload("Acme", "BRN1", "a@b.com", "1234567890"))
            .await
            .unwrap();
        assert_eq!(merchant.status, MerchantStatus::Pending);
    }

    #[tokio::test]
    async fn validate_new_reports_every_failing_field() {
        let store = InMemoryStore::new();
        let mut input = payload("A", "x", "nope", "123");
        input.status = Some("Open".into());
        let Err(ValidateError::Invalid(errors)) = validate_new(&store, input).await else {
            panic!("expected validation failure");
        };
        assert_eq!(errors.len(), 5);
        assert_eq!(errors.kind_of(NAME_FIELD), Some(ValidationErrorKind::TooShort));
        assert_eq!(
            errors.kind_of(REGISTRATION_NUMBER_FIELD),
            Some(ValidationErrorKind::TooShort)
        );
        assert_eq!(
            errors.kind_of(EMAIL_FIELD),
            Some(ValidationErrorKind::InvalidFormat)
        );
        assert_eq!(
            errors.kind_of(PHONE_FIELD),
            Some(ValidationErrorKind::InvalidFormat)
        );
        assert_eq!(
            errors.kind_of(STATUS_FIELD),
            Some(ValidationErrorKind::InvalidEnum)
        );
        let map = errors.to_field_map();
        assert_eq!(map["name"], vec!["Name must be at least 2 characters long."]);
    }

    #[tokio::test]
    async fn wrong_json_types_are_field_errors() {
        let store = InMemoryStore::new();
        let input = MerchantPayload {
            name: Some(serde_json::json!(5).into()),
            business_registration_number: Some(serde_json::json!(12345).into()),
            email: Some(serde_json::json!(false).into()),
            phone: Some(serde_json::json!(1234567890).into()),
            status: Some(serde_json::json!(["Active"]).into()),
        };
        let Err(ValidateError::Invalid(errors)) = validate_new(&store, input).await else {
            panic!("expected validation failure");
        };
        let map = errors.to_field_map();
        assert_eq!(map["name"], vec!["Name must be at least 2 characters long."]);
        assert_eq!(map["email"], vec!["Not a valid string."]);
        assert_eq!(map["status"], vec!["Not a valid string."]);
        assert!(!map.contains_key("business_registration_number"));
        assert!(!map.contains_key("phone"));
    }

    #[tokio::test]
    async fn validate_new_requires_core_fields() {
        let store = InMemoryStore::new();
        let Err(ValidateError::Invalid(errors)) =
            validate_new(&store, MerchantPayload::default()).await
        else {
            panic!("expected validation failure");
        };
        assert_eq!(errors.len(), 4);
        assert_eq!(errors.kind_of(STATUS_FIELD), None);
        assert_eq!(errors.kind_of(EMAIL_FIELD), Some(ValidationErrorKind::Required));
    }

    #[tokio::test]
    async fn duplicates_are_detected_case_insensitively() {
        let store = InMemoryStore::new();
        let first = validate_new(&store, payload("Acme", "brn1", "a@b.com", "1234567890"))
            .await
            .unwrap();
        store.create_merchant(first).await.unwrap();

        let Err(ValidateError::Invalid(errors)) =
            validate_new(&store, payload("Other", "BRN1", "A@B.COM", "1234567899")).await
        else {
            panic!("expected duplicate failure");
        };
        assert_eq!(
            errors.kind_of(EMAIL_FIELD),
            Some(ValidationErrorKind::DuplicateKey)
        );
        assert_eq!(
            errors.kind_of(REGISTRATION_NUMBER_FIELD),
            Some(ValidationErrorKind::DuplicateKey)
        );
    }

    #[tokio::test]
    async fn update_may_keep_its_own_unique_values() {
        let store = InMemoryStore::new();
        let first = validate_new(&store, payload("Acme", "BRN1", "a@b.com", "1234567890"))
            .await
            .unwrap();
        let created = store.create_merchant(first).await.unwrap();

        let mut replace = payload("Acme Updated", "BRN1", "a@b.com", "1234567890");
        replace.status = Some("Suspended".into());
        let changes = validate_replace(&store, created.id, replace).await.unwrap();
        assert_eq!(changes.name.as_deref(), Some("Acme Updated"));
        assert_eq!(changes.status, Some(MerchantStatus::Suspended));
    }

    #[tokio::test]
    async fn replace_requires_status() {
        let store = InMemoryStore::new();
        let Err(ValidateError::Invalid(errors)) = validate_replace(
            &store,
            1,
            payload("Acme", "BRN1", "a@b.com", "1234567890"),
        )
        .await
        else {
            panic!("expected validation failure");
        };
        assert_eq!(errors.kind_of(STATUS_FIELD), Some(ValidationErrorKind::Required));
    }

    #[tokio::test]
    async fn patch_checks_only_supplied_fields() {
        let store = InMemoryStore::new();
        let changes = validate_patch(
            &store,
            1,
            MerchantPayload {
                status: Some("Suspended".into()),
                ..MerchantPayload::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(
            changes,
            MerchantChanges {
                status: Some(MerchantStatus::Suspended),
                ..MerchantChanges::default()
            }
        );

        let empty = validate_patch(&store, 1, MerchantPayload::default())
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn duplicate_messages_follow_field() {
        assert_eq!(
            ValidationError::duplicate("email").message,
            "A merchant with this email already exists."
        );
        assert_eq!(
            ValidationError::duplicate("business_registration_number").field,
            "business_registration_number"
        );
    }
}
