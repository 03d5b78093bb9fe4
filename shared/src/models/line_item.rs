//! Invoice line items

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Bucket, StockLevels};
use crate::types::round_money;

/// One row of an invoice
///
/// `unit_price` is the purchase price on vendor invoices, the selling price
/// on customer invoices and the sale price on commissioner invoices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Linked inventory item; `None` for free-text lines that never touch stock
    #[serde(default)]
    pub item_id: Option<Uuid>,
    pub item_name: String,
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub net_weight: Decimal,
    #[serde(default)]
    pub gross_weight: Decimal,
    #[serde(default)]
    pub packaging_cost: Decimal,
    #[serde(alias = "purchase_price", alias = "selling_price", alias = "sale_price")]
    pub unit_price: Decimal,
    #[serde(default)]
    pub storage_type: Bucket,
    #[serde(default)]
    pub total_price: Decimal,
}

impl LineItem {
    /// `unit_price × net_weight + packaging_cost × quantity`
    pub fn raw_total(&self) -> Decimal {
        self.unit_price * self.net_weight + self.packaging_cost * self.quantity
    }

    /// Recompute `total_price`, optionally rounding to whole currency units
    pub fn price(&mut self, round_per_line: bool) -> Decimal {
        let raw = self.raw_total();
        self.total_price = if round_per_line { round_money(raw) } else { raw };
        self.total_price
    }

    pub fn stock_levels(&self) -> StockLevels {
        StockLevels::new(self.quantity, self.net_weight, self.gross_weight)
    }

    pub fn is_tracked(&self) -> bool {
        self.item_id.is_some()
    }
}
