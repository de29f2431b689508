//! Merchant HTTP API module.
//!
//! # Purpose
//! Exposes route handler modules, the shared error helpers and the OpenAPI
//! document.
pub mod error;
pub mod merchants;
pub mod openapi;
pub mod system;
pub mod types;
