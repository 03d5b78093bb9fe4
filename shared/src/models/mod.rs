//! Domain models for the Trading House back office

mod commissioner_invoice;
mod invoice;
mod item;
mod line_item;
mod party;
mod payment;

pub use commissioner_invoice::*;
pub use invoice::*;
pub use item::*;
pub use line_item::*;
pub use party::*;
pub use payment::*;
