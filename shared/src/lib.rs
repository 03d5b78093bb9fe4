//! Shared types and models for the Trading House back office
//!
//! This crate holds the invoice/inventory reconciliation rules as pure
//! functions so the backend, the browser (via WASM) and the tests all run
//! the same code.

pub mod models;
pub mod reconciliation;
pub mod types;
pub mod validation;

pub use models::*;
pub use reconciliation::*;
pub use types::*;
pub use validation::*;
