//! Business logic services for the Trading House back office

pub mod aggregate;
pub mod commissioner_invoice;
pub mod inventory;
pub mod invoice;
pub mod sweeper;

pub use aggregate::AggregateService;
pub use commissioner_invoice::CommissionerInvoiceService;
pub use inventory::InventoryService;
pub use invoice::TradeInvoiceService;
pub use sweeper::DueDateSweeper;

/// Current business date (UTC)
pub fn today() -> chrono::NaiveDate {
    chrono::Utc::now().date_naive()
}

/// Input for changing a due date
#[derive(Debug, serde::Deserialize)]
pub struct SetDueDateInput {
    pub due_date: Option<chrono::NaiveDate>,
}

/// Copy the registered item name onto every linked line
pub(crate) fn sync_item_names(lines: &mut [shared::LineItem], ledger: &shared::StockLedger) {
    for line in lines.iter_mut() {
        if let Some(stock) = line.item_id.and_then(|id| ledger.get(&id)) {
            line.item_name.clone_from(&stock.name);
        }
    }
}
