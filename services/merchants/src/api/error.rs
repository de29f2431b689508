//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Centralizes HTTP error response construction so every merchant endpoint
//! reports failures in one of two shapes:
//! - `{code, message, request_id}` for not-found, malformed and internal errors;
//! - `{field: [messages]}` for payload validation failures.
//!
//! # Key invariants and assumptions
//! - Client mistakes map to 4xx; storage and infrastructure failures map to 500.
//! - A unique-constraint violation caught by the store is reported as a field
//!   error against the conflicting field, never as a 500.
//!
//! # Security considerations
//! - Internal errors log details server-side but return generic messages.
use crate::api::types::{ErrorResponse, FieldErrors};
use crate::store::StoreError;
use crate::validation::{ValidateError, ValidationError, ValidationErrors};
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

/// JSON body carried by an [`ApiError`].
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ErrorBody {
    Error(ErrorResponse),
    Fields(FieldErrors),
}

impl ErrorBody {
    /// Error code, or `None` for field errors.
    pub fn code(&self) -> Option<&str> {
        match self {
            ErrorBody::Error(body) => Some(&body.code),
            ErrorBody::Fields(_) => None,
        }
    }
}

/// Structured API error returned by handlers.
///
/// # Invariants
/// - `status` must match the semantics of `body`.
///
/// # Example
/// ```rust
/// use axum::http::StatusCode;
/// use merchants::api::error::api_not_found;
///
/// let err = api_not_found("Not found.");
/// assert_eq!(err.status, StatusCode::NOT_FOUND);
/// ```
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn coded(status: StatusCode, code: &str, message: &str) -> ApiError {
    ApiError {
        status,
        body: ErrorBody::Error(ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            request_id: None,
        }),
    }
}

/// Build a 404 Not Found error.
pub fn api_not_found(message: &str) -> ApiError {
    coded(StatusCode::NOT_FOUND, "not_found", message)
}

/// Build a 500 Internal Server Error from a store error.
///
/// # What it does
/// Logs the store error and returns a generic internal error response.
pub fn api_internal(message: &str, err: &StoreError) -> ApiError {
    tracing::error!(error = ?err, "merchant storage error");
    coded(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

/// Build a 500 Internal Server Error without a store error.
pub fn api_internal_message(message: &str) -> ApiError {
    coded(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

/// Build a 400 Bad Request for input that could not be read at all
/// (malformed JSON, wrong content type).
pub fn api_validation_error(message: &str) -> ApiError {
    coded(StatusCode::BAD_REQUEST, "validation_error", message)
}

/// Build a 400 Bad Request listing every invalid field.
pub fn api_field_errors(errors: &ValidationErrors) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        body: ErrorBody::Fields(FieldErrors(errors.to_field_map())),
    }
}

/// Translate a validator failure.
///
/// # Errors
/// - Field failures become 400; a store failure during a duplicate check
///   becomes 500.
pub fn api_validate_error(message: &str, err: ValidateError) -> ApiError {
    match err {
        ValidateError::Invalid(errors) => api_field_errors(&errors),
        ValidateError::Store(err) => api_internal(message, &err),
    }
}

/// Translate a store failure on a write path.
pub fn api_store_write_error(message: &str, err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound(_) => api_not_found("Not found."),
        StoreError::Conflict(field) => {
            tracing::debug!(%field, "uniqueness enforced by store");
            api_field_errors(&ValidationError::duplicate(&field).into())
        }
        err @ StoreError::Unexpected(_) => api_internal(message, &err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationErrorKind;

    fn fields(err: &ApiError) -> &FieldErrors {
        match &err.body {
            ErrorBody::Fields(fields) => fields,
            other => panic!("expected field errors, got {other:?}"),
        }
    }

    #[test]
    fn api_error_helpers_build_expected_codes() {
        let not_found = api_not_found("missing");
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);
        assert_eq!(not_found.body.code(), Some("not_found"));

        let internal = api_internal_message("oops");
        assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.body.code(), Some("internal"));

        let validation = api_validation_error("bad");
        assert_eq!(validation.status, StatusCode::BAD_REQUEST);
        assert_eq!(validation.body.code(), Some("validation_error"));
    }

    #[test]
    fn api_internal_logs_and_wraps_store_error() {
        let err = StoreError::Unexpected(anyhow::anyhow!("boom"));
        let api = api_internal("storage failed", &err);
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        match api.body {
            ErrorBody::Error(body) => assert_eq!(body.message, "storage failed"),
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn store_conflict_becomes_field_error() {
        let api = api_store_write_error("x", StoreError::Conflict("email".into()));
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            fields(&api).0.get("email"),
            Some(&vec!["A merchant with this email already exists.".to_string()])
        );
    }

    #[test]
    fn store_write_errors_keep_their_category() {
        let missing = api_store_write_error("x", StoreError::NotFound("merchant".into()));
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
        let broken = api_store_write_error("x", StoreError::Unexpected(anyhow::anyhow!("down")));
        assert_eq!(broken.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validator_errors_serialize_as_field_map() {
        let mut errors = ValidationErrors::new();
        errors.push(ValidationError::duplicate("business_registration_number"));
        assert_eq!(
            errors.kind_of("business_registration_number"),
            Some(ValidationErrorKind::DuplicateKey)
        );
        let api = api_validate_error("x", ValidateError::Invalid(errors));
        let json = serde_json::to_value(&api.body).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "business_registration_number": [
                    "A merchant with this business registration number already exists."
                ]
            })
        );
    }
}
