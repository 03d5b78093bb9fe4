//! Commissioner invoices
//!
//! Goods sold through a commissioner. Only the commissioner's cut is
//! tracked as owed, so the paid amount is capped at that cut and the
//! invoice never becomes overdue.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    check_payment_fits, derive_status, price_lines, sum_payments, InvoiceKind, InvoiceStatus,
    LineItem, Payment, PaymentError,
};
use crate::types::{clamp_non_negative, commission_on, round_money};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionerInvoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub commissioner_id: Uuid,
    pub commissioner_name: String,
    pub invoice_date: NaiveDate,
    pub items: Vec<LineItem>,
    pub labour_transport_cost: Decimal,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub commissioner_percentage: Decimal,
    pub commissioner_amount: Decimal,
    pub payments: Vec<Payment>,
    pub paid_amount: Decimal,
    pub remaining_amount: Decimal,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommissionerInvoice {
    pub const KIND: InvoiceKind = InvoiceKind::Commissioner;

    pub fn recompute(&mut self) {
        self.subtotal = price_lines(Self::KIND, &mut self.items);
        self.labour_transport_cost = round_money(self.labour_transport_cost);
        self.total = self.subtotal + self.labour_transport_cost;
        self.commissioner_amount = commission_on(self.total, Some(self.commissioner_percentage));
        self.refresh_balance();
    }

    pub fn refresh_balance(&mut self) {
        self.paid_amount = sum_payments(&self.payments).min(self.commissioner_amount);
        self.remaining_amount = clamp_non_negative(self.commissioner_amount - self.paid_amount);
        // No due date, so `today` never matters here.
        self.status = derive_status(
            self.remaining_amount,
            self.paid_amount,
            None,
            NaiveDate::MIN,
            false,
        );
    }

    pub fn add_payment(&mut self, payment: Payment) -> Result<(), PaymentError> {
        check_payment_fits(&payment, self.remaining_amount)?;
        self.payments.push(payment);
        self.refresh_balance();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bucket, PaymentMethod};

    fn commissioner_invoice(net_weight: i64, percentage: i64) -> CommissionerInvoice {
        CommissionerInvoice {
            id: Uuid::new_v4(),
            invoice_number: "CM-0001".to_string(),
            commissioner_id: Uuid::new_v4(),
            commissioner_name: "Rahim & Sons".to_string(),
            invoice_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            items: vec![LineItem {
                item_id: Some(Uuid::new_v4()),
                item_name: "Cumin".to_string(),
                quantity: Decimal::from(4),
                net_weight: Decimal::from(net_weight),
                gross_weight: Decimal::from(net_weight),
                packaging_cost: Decimal::ZERO,
                unit_price: Decimal::from(10),
                storage_type: Bucket::Shop,
                total_price: Decimal::ZERO,
            }],
            labour_transport_cost: Decimal::ZERO,
            subtotal: Decimal::ZERO,
            total: Decimal::ZERO,
            commissioner_percentage: Decimal::from(percentage),
            commissioner_amount: Decimal::ZERO,
            payments: vec![],
            paid_amount: Decimal::ZERO,
            remaining_amount: Decimal::ZERO,
            status: InvoiceStatus::Unpaid,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn payment(amount: i64) -> Payment {
        Payment {
            amount: Decimal::from(amount),
            method: PaymentMethod::Cheque,
            payment_date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
        }
    }

    #[test]
    fn test_commissioner_amount_from_total() {
        let mut inv = commissioner_invoice(100, 5);
        inv.recompute();
        assert_eq!(inv.total, Decimal::from(1000));
        assert_eq!(inv.commissioner_amount, Decimal::from(50));
        assert_eq!(inv.remaining_amount, Decimal::from(50));
        assert_eq!(inv.status, InvoiceStatus::Unpaid);
    }

    #[test]
    fn test_paid_amount_capped_at_commission() {
        let mut inv = commissioner_invoice(100, 5);
        inv.payments.push(payment(80));
        inv.recompute();
        assert_eq!(inv.paid_amount, Decimal::from(50));
        assert_eq!(inv.remaining_amount, Decimal::ZERO);
        assert_eq!(inv.status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_partial_payment_and_overpayment_guard() {
        let mut inv = commissioner_invoice(100, 5);
        inv.recompute();
        inv.add_payment(payment(20)).unwrap();
        assert_eq!(inv.status, InvoiceStatus::Partial);
        assert_eq!(inv.remaining_amount, Decimal::from(30));

        let err = inv.add_payment(payment(31)).unwrap_err();
        assert!(matches!(err, PaymentError::Overpayment { excess, .. } if excess == Decimal::ONE));
    }

    #[test]
    fn test_shrinking_total_never_leaves_negative_remaining() {
        let mut inv = commissioner_invoice(100, 5);
        inv.recompute();
        inv.add_payment(payment(50)).unwrap();
        inv.items[0].net_weight = Decimal::from(10);
        inv.recompute();
        assert_eq!(inv.commissioner_amount, Decimal::from(5));
        assert_eq!(inv.paid_amount, Decimal::from(5));
        assert_eq!(inv.remaining_amount, Decimal::ZERO);
    }
}
