//! Stock planning for invoice create, update and delete
//!
//! A [`StockLedger`] is an in-memory snapshot of the items an operation
//! touches. The backend locks those rows, loads them into a ledger, lets the
//! ledger validate and apply the whole invoice effect, and only then writes
//! the resulting levels back. Nothing is written when any line fails.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{Bucket, InvoiceKind, ItemStock, LineItem, StockError, StockLevels};

/// Net signed stock effect of an invoice, grouped by item and bucket
pub fn invoice_effect(kind: InvoiceKind, lines: &[LineItem]) -> BTreeMap<(Uuid, Bucket), StockLevels> {
    let sign = kind.stock_sign();
    let mut effect: BTreeMap<(Uuid, Bucket), StockLevels> = BTreeMap::new();
    for line in lines {
        if let Some(item_id) = line.item_id {
            *effect.entry((item_id, line.storage_type)).or_default() +=
                line.stock_levels().scaled(sign);
        }
    }
    effect
}

/// Every inventory item referenced by any of the given line sets
pub fn referenced_items<'a>(line_sets: impl IntoIterator<Item = &'a [LineItem]>) -> BTreeSet<Uuid> {
    line_sets
        .into_iter()
        .flat_map(|lines| lines.iter().filter_map(|line| line.item_id))
        .collect()
}

/// Snapshot of item stock that invoice effects are planned against
#[derive(Debug, Clone, Default)]
pub struct StockLedger {
    items: HashMap<Uuid, ItemStock>,
}

impl StockLedger {
    pub fn new(items: impl IntoIterator<Item = ItemStock>) -> Self {
        Self {
            items: items.into_iter().map(|item| (item.id, item)).collect(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<&ItemStock> {
        self.items.get(id)
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemStock> {
        self.items.values()
    }

    pub fn into_items(self) -> Vec<ItemStock> {
        self.items.into_values().collect()
    }

    fn item(&self, id: &Uuid) -> Result<&ItemStock, StockError> {
        self.items.get(id).ok_or(StockError::UnknownItem(*id))
    }

    /// Validate every group first, then apply the invoice's stock effect
    pub fn apply_invoice(&mut self, kind: InvoiceKind, lines: &[LineItem]) -> Result<(), StockError> {
        let effect = invoice_effect(kind, lines);
        for ((item_id, bucket), delta) in &effect {
            self.item(item_id)?.validate(*bucket, &delta.removals())?;
        }
        self.adjust_all(&effect);
        Ok(())
    }

    /// Check that undoing an invoice leaves every counter non-negative
    pub fn check_reversal(&self, kind: InvoiceKind, lines: &[LineItem]) -> Result<(), StockError> {
        for ((item_id, bucket), delta) in reversal(kind, lines) {
            let item = self.item(&item_id)?;
            let current = item.levels(bucket);
            for ((field, have), (_, change)) in current.fields().into_iter().zip(delta.fields()) {
                if have + change < Decimal::ZERO {
                    return Err(StockError::CannotDelete {
                        reason: "reversing this invoice would make stock negative".to_string(),
                        item_name: item.name.clone(),
                        bucket,
                        field,
                        current: have,
                        required: -change,
                    });
                }
            }
        }
        Ok(())
    }

    /// Strictly undo an invoice: nothing changes unless every item can absorb the reversal
    pub fn delete_invoice(&mut self, kind: InvoiceKind, lines: &[LineItem]) -> Result<(), StockError> {
        self.check_reversal(kind, lines)?;
        self.adjust_all(&reversal(kind, lines));
        Ok(())
    }

    /// Replace an invoice's line set
    ///
    /// The new lines are evaluated as if the old invoice never existed: the
    /// old effect is reversed and the new one applied as a single net change
    /// per item and bucket. Every counter must stay non-negative after that
    /// change, otherwise nothing is touched. A sale that needs more than is on
    /// hand fails with `Insufficient`; a purchase cut below what has already
    /// been sold fails with `CannotDelete`.
    pub fn replace_invoice(
        &mut self,
        kind: InvoiceKind,
        old_lines: &[LineItem],
        new_lines: &[LineItem],
    ) -> Result<(), StockError> {
        let mut net = invoice_effect(kind, new_lines);
        for (key, delta) in reversal(kind, old_lines) {
            *net.entry(key).or_default() += delta;
        }

        for ((item_id, bucket), delta) in &net {
            let item = self.item(item_id)?;
            let current = item.levels(*bucket);
            for ((field, have), (_, change)) in current.fields().into_iter().zip(delta.fields()) {
                if have + change >= Decimal::ZERO {
                    continue;
                }
                return Err(if kind.stock_sign() > Decimal::ZERO {
                    StockError::CannotDelete {
                        reason: "the updated purchase no longer covers stock already sold".to_string(),
                        item_name: item.name.clone(),
                        bucket: *bucket,
                        field,
                        current: have,
                        required: -change,
                    }
                } else {
                    StockError::Insufficient {
                        item_id: *item_id,
                        item_name: item.name.clone(),
                        bucket: *bucket,
                        field,
                        available: have,
                        required: -change,
                    }
                });
            }
        }

        self.adjust_all(&net);
        Ok(())
    }

    /// Move stock between buckets of one item
    pub fn transfer(
        &mut self,
        item_id: Uuid,
        from: Bucket,
        to: Bucket,
        amount: &StockLevels,
    ) -> Result<(), StockError> {
        self.item(&item_id)?.validate(from, amount)?;
        if let Some(item) = self.items.get_mut(&item_id) {
            item.adjust(from, &amount.negated());
            item.adjust(to, amount);
        }
        Ok(())
    }

    fn adjust_all(&mut self, effect: &BTreeMap<(Uuid, Bucket), StockLevels>) {
        for ((item_id, bucket), delta) in effect {
            if let Some(item) = self.items.get_mut(item_id) {
                item.adjust(*bucket, delta);
            }
        }
    }
}

fn reversal(kind: InvoiceKind, lines: &[LineItem]) -> BTreeMap<(Uuid, Bucket), StockLevels> {
    invoice_effect(kind, lines)
        .into_iter()
        .map(|(key, delta)| (key, delta.negated()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StockField;

    fn item(id: Uuid, shop_qty: i64) -> ItemStock {
        ItemStock {
            id,
            item_number: 10_042,
            name: "Turmeric".to_string(),
            shop: StockLevels::new(
                Decimal::from(shop_qty),
                Decimal::from(shop_qty * 10),
                Decimal::from(shop_qty * 11),
            ),
            cold: StockLevels::default(),
        }
    }

    fn line(item_id: Uuid, qty: i64, bucket: Bucket) -> LineItem {
        LineItem {
            item_id: Some(item_id),
            item_name: "Turmeric".to_string(),
            quantity: Decimal::from(qty),
            net_weight: Decimal::from(qty * 10),
            gross_weight: Decimal::from(qty * 11),
            packaging_cost: Decimal::ZERO,
            unit_price: Decimal::from(3),
            storage_type: bucket,
            total_price: Decimal::ZERO,
        }
    }

    #[test]
    fn test_vendor_invoice_adds_stock() {
        let id = Uuid::new_v4();
        let mut ledger = StockLedger::new([item(id, 0)]);
        ledger
            .apply_invoice(InvoiceKind::Vendor, &[line(id, 50, Bucket::Shop)])
            .unwrap();
        let stock = ledger.get(&id).unwrap();
        assert_eq!(stock.shop.quantity, Decimal::from(50));
        assert_eq!(stock.shop.net_weight, Decimal::from(500));
        assert_eq!(stock.shop.gross_weight, Decimal::from(550));
    }

    #[test]
    fn test_lines_of_one_item_are_validated_together() {
        let id = Uuid::new_v4();
        let mut ledger = StockLedger::new([item(id, 30)]);
        let lines = [line(id, 20, Bucket::Shop), line(id, 20, Bucket::Shop)];
        let err = ledger.apply_invoice(InvoiceKind::Customer, &lines).unwrap_err();
        assert!(matches!(
            err,
            StockError::Insufficient { field: StockField::Quantity, .. }
        ));
        assert_eq!(ledger.get(&id).unwrap().shop.quantity, Decimal::from(30));
    }

    #[test]
    fn test_failed_line_leaves_earlier_lines_unapplied() {
        let ok = Uuid::new_v4();
        let short = Uuid::new_v4();
        let mut ledger = StockLedger::new([item(ok, 100), item(short, 1)]);
        let lines = [line(ok, 10, Bucket::Shop), line(short, 5, Bucket::Shop)];
        assert!(ledger.apply_invoice(InvoiceKind::Customer, &lines).is_err());
        assert_eq!(ledger.get(&ok).unwrap().shop.quantity, Decimal::from(100));
        assert_eq!(ledger.get(&short).unwrap().shop.quantity, Decimal::ONE);
    }

    #[test]
    fn test_unknown_item_is_reported() {
        let mut ledger = StockLedger::default();
        let missing = Uuid::new_v4();
        assert_eq!(
            ledger.apply_invoice(InvoiceKind::Vendor, &[line(missing, 1, Bucket::Shop)]),
            Err(StockError::UnknownItem(missing))
        );
    }

    #[test]
    fn test_free_text_lines_never_touch_stock() {
        let mut custom = line(Uuid::new_v4(), 5, Bucket::Shop);
        custom.item_id = None;
        assert!(invoice_effect(InvoiceKind::Customer, &[custom.clone()]).is_empty());
        let mut ledger = StockLedger::default();
        assert!(ledger.apply_invoice(InvoiceKind::Customer, &[custom]).is_ok());
    }

    #[test]
    fn test_update_evaluates_new_lines_as_if_old_never_existed() {
        let id = Uuid::new_v4();
        let mut ledger = StockLedger::new([item(id, 10)]);
        // The old invoice sold 20 of the original 30; the new one sells 30.
        ledger
            .replace_invoice(
                InvoiceKind::Customer,
                &[line(id, 20, Bucket::Shop)],
                &[line(id, 30, Bucket::Shop)],
            )
            .unwrap();
        assert_eq!(ledger.get(&id).unwrap().shop.quantity, Decimal::ZERO);
    }

    #[test]
    fn test_update_can_move_stock_between_buckets() {
        let id = Uuid::new_v4();
        let mut ledger = StockLedger::new([item(id, 0)]);
        ledger
            .apply_invoice(InvoiceKind::Vendor, &[line(id, 8, Bucket::Shop)])
            .unwrap();
        ledger
            .replace_invoice(
                InvoiceKind::Vendor,
                &[line(id, 8, Bucket::Shop)],
                &[line(id, 8, Bucket::Cold)],
            )
            .unwrap();
        let stock = ledger.get(&id).unwrap();
        assert!(stock.shop.is_zero());
        assert_eq!(stock.cold.quantity, Decimal::from(8));
    }

    #[test]
    fn test_purchase_update_keeps_sold_stock_sold() {
        let id = Uuid::new_v4();
        let mut ledger = StockLedger::new([item(id, 0)]);
        let purchase = [line(id, 50, Bucket::Shop)];
        ledger.apply_invoice(InvoiceKind::Vendor, &purchase).unwrap();
        ledger
            .apply_invoice(InvoiceKind::Customer, &[line(id, 30, Bucket::Shop)])
            .unwrap();

        ledger
            .replace_invoice(InvoiceKind::Vendor, &purchase, &purchase)
            .unwrap();
        assert_eq!(ledger.get(&id).unwrap().shop.quantity, Decimal::from(20));

        let err = ledger
            .replace_invoice(InvoiceKind::Vendor, &purchase, &[line(id, 10, Bucket::Shop)])
            .unwrap_err();
        assert!(matches!(
            err,
            StockError::CannotDelete { field: StockField::Quantity, .. }
        ));
        assert_eq!(ledger.get(&id).unwrap().shop.quantity, Decimal::from(20));
    }

    #[test]
    fn test_delete_rejected_when_vendor_stock_already_sold() {
        let id = Uuid::new_v4();
        let mut ledger = StockLedger::new([item(id, 0)]);
        let purchase = [line(id, 50, Bucket::Shop)];
        ledger.apply_invoice(InvoiceKind::Vendor, &purchase).unwrap();
        ledger
            .apply_invoice(InvoiceKind::Customer, &[line(id, 20, Bucket::Shop)])
            .unwrap();

        let err = ledger.delete_invoice(InvoiceKind::Vendor, &purchase).unwrap_err();
        match err {
            StockError::CannotDelete { item_name, current, required, .. } => {
                assert_eq!(item_name, "Turmeric");
                assert_eq!(current, Decimal::from(30));
                assert_eq!(required, Decimal::from(50));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(ledger.get(&id).unwrap().shop.quantity, Decimal::from(30));
    }

    #[test]
    fn test_sale_delete_restores_stock() {
        let id = Uuid::new_v4();
        let mut ledger = StockLedger::new([item(id, 50)]);
        let sale = [line(id, 20, Bucket::Shop)];
        ledger.apply_invoice(InvoiceKind::Customer, &sale).unwrap();
        assert_eq!(ledger.get(&id).unwrap().shop.quantity, Decimal::from(30));
        ledger.delete_invoice(InvoiceKind::Customer, &sale).unwrap();
        assert_eq!(ledger.get(&id).unwrap().shop.quantity, Decimal::from(50));
    }

    #[test]
    fn test_transfer_between_buckets() {
        let id = Uuid::new_v4();
        let mut ledger = StockLedger::new([item(id, 10)]);
        let amount = StockLevels::new(Decimal::from(4), Decimal::from(40), Decimal::from(44));
        ledger.transfer(id, Bucket::Shop, Bucket::Cold, &amount).unwrap();
        let stock = ledger.get(&id).unwrap();
        assert_eq!(stock.shop.quantity, Decimal::from(6));
        assert_eq!(stock.cold.gross_weight, Decimal::from(44));

        let too_much = StockLevels::new(Decimal::from(5), Decimal::ZERO, Decimal::ZERO);
        assert!(ledger.transfer(id, Bucket::Cold, Bucket::Shop, &too_much).is_err());
    }

    #[test]
    fn test_referenced_items_spans_old_and_new_lines() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let old = vec![line(a, 1, Bucket::Shop)];
        let new = vec![line(b, 1, Bucket::Cold), line(a, 2, Bucket::Cold)];
        let ids = referenced_items([old.as_slice(), new.as_slice()]);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a) && ids.contains(&b));
    }
}
