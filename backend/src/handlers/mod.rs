//! HTTP request handlers

pub mod commissioner_invoice;
pub mod health;
pub mod inventory;
pub mod invoice;
pub mod maintenance;
pub mod party;

pub use commissioner_invoice::*;
pub use health::*;
pub use inventory::*;
pub use invoice::*;
pub use maintenance::*;
pub use party::*;
