//! Read-path filtering for merchant listings.
//!
//! # Purpose
//! Turns the `status` and `search` request parameters into a `MerchantQuery`
//! that every store backend evaluates the same way. The in-memory backend
//! calls [`MerchantQuery::matches`]; the Postgres backend renders the same
//! predicate in SQL.
//!
//! # Key invariants
//! - Status matching is exact and case-sensitive.
//! - An unknown status filters everything out rather than erroring.
//! - Search is a case-insensitive substring match over name, email and
//!   registration number.
//! - Both filters compose with AND.
use crate::model::{Merchant, MerchantStatus};
use serde::Deserialize;
use std::collections::HashMap;
use utoipa::IntoParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    Any,
    Only(MerchantStatus),
    /// The caller asked for a status that cannot exist.
    Unknown,
}

impl StatusFilter {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None | Some("") => StatusFilter::Any,
            Some(value) => value
                .parse::<MerchantStatus>()
                .map(StatusFilter::Only)
                .unwrap_or(StatusFilter::Unknown),
        }
    }

    pub fn matches(&self, status: MerchantStatus) -> bool {
        match self {
            StatusFilter::Any => true,
            StatusFilter::Only(wanted) => *wanted == status,
            StatusFilter::Unknown => false,
        }
    }
}

/// Query-string parameters accepted by listing, export and report endpoints.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FilterParams {
    /// Exact status to keep (`Active`, `Pending` or `Suspended`).
    pub status: Option<String>,
    /// Case-insensitive substring matched against name, email and registration number.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MerchantQuery {
    pub status: StatusFilter,
    search: Option<String>,
}

impl MerchantQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(status: Option<&str>, search: Option<&str>) -> Self {
        Self {
            status: StatusFilter::parse(status),
            search: search.filter(|term| !term.is_empty()).map(str::to_string),
        }
    }

    pub fn from_params(params: &FilterParams) -> Self {
        Self::new(params.status.as_deref(), params.search.as_deref())
    }

    pub fn from_query_map(params: &HashMap<String, String>) -> Self {
        Self::new(
            params.get("status").map(String::as_str),
            params.get("search").map(String::as_str),
        )
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// True when no record can possibly match.
    pub fn is_unsatisfiable(&self) -> bool {
        self.status == StatusFilter::Unknown
    }

    pub fn matches(&self, merchant: &Merchant) -> bool {
        if !self.status.matches(merchant.status) {
            return false;
        }
        let Some(term) = self.search.as_deref() else {
            return true;
        };
        let needle = term.to_lowercase();
        [
            merchant.name.as_str(),
            merchant.email.as_str(),
            merchant.business_registration_number.as_str(),
        ]
        .iter()
        .any(|haystack| haystack.to_lowercase().contains(&needle))
    }

    /// `ILIKE` pattern for the search term with LIKE metacharacters escaped.
    pub fn search_pattern(&self) -> Option<String> {
        self.search.as_deref().map(|term| {
            let mut escaped = String::with_capacity(term.len() + 2);
            escaped.push('%');
            for ch in term.chars() {
                if matches!(ch, '%' | '_' | '\\') {
                    escaped.push('\\');
                }
                escaped.push(ch);
            }
            escaped.push('%');
            escaped
        })
    }
}

/// Sort newest first; ties broken by descending id.
pub fn sort_newest_first(merchants: &mut [Merchant]) {
    merchants.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
