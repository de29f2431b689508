//! Merchant record management service library crate.
//!
//! # Purpose
//! Exposes the merchant model, validator, query filter, reporting, storage
//! backends, HTTP API and configuration for use by the binary and tests.
pub mod api;
pub mod app;
pub mod config;
pub mod model;
pub mod observability;
pub mod query;
pub mod report;
pub mod store;
pub mod validation;
