//! Merchant data model module.
//!
//! # Purpose
//! Re-exports the merchant record, its status enumeration, and the payload
//! shapes that flow between the API, validation, and store layers.
mod merchant;

pub use merchant::{
    FieldInput, Merchant, MerchantChanges, MerchantId, MerchantPayload, MerchantStatus,
    NewMerchant, UnknownStatus,
};
