//! Broker and commissioner ledgers
//!
//! `total_commission` is a materialized view: only the aggregate
//! recalculator writes it, always from a full rescan of the invoices that
//! reference the party. `total_paid`, `total_remaining` and `status` are
//! derived from it and from the party's own payments on every save.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{derive_status, sum_payments, InvoiceStatus, Payment, PaymentError};
use crate::types::{clamp_non_negative, round_money};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    Broker,
    Commissioner,
}

impl PartyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyKind::Broker => "broker",
            PartyKind::Commissioner => "commissioner",
        }
    }
}

impl std::fmt::Display for PartyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub id: Uuid,
    pub kind: PartyKind,
    pub name: String,
    pub payments: Vec<Payment>,
    pub total_commission: Decimal,
    pub total_paid: Decimal,
    pub total_remaining: Decimal,
    pub status: InvoiceStatus,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Party {
    /// Derive paid, remaining and status; run before every save
    pub fn recompute(&mut self, today: NaiveDate) {
        self.total_paid = clamp_non_negative(sum_payments(&self.payments));
        self.total_remaining = clamp_non_negative(self.total_commission - self.total_paid);
        self.status = derive_status(
            self.total_remaining,
            self.total_paid,
            self.due_date,
            today,
            true,
        );
    }

    /// Replace the commission total with a freshly rescanned value
    pub fn apply_commission_total(&mut self, total_commission: Decimal, today: NaiveDate) {
        self.total_commission = round_money(total_commission);
        self.recompute(today);
    }

    /// Append a payment; parties may be over-paid
    pub fn add_payment(&mut self, payment: Payment, today: NaiveDate) -> Result<(), PaymentError> {
        payment.validate()?;
        self.payments.push(payment);
        self.recompute(today);
        Ok(())
    }

    pub fn set_due_date(&mut self, due_date: Option<NaiveDate>, today: NaiveDate) {
        self.due_date = due_date;
        self.recompute(today);
    }

    /// Remaining balance after dropping `commission` from the total
    ///
    /// Fails when the party has already been paid more than what would be left.
    pub fn project_without_commission(&self, commission: Decimal) -> Result<Decimal, ProjectionError> {
        let projected = (self.total_commission - commission) - self.total_paid;
        if projected < Decimal::ZERO {
            return Err(ProjectionError::NegativeBalance {
                party_name: self.name.clone(),
                projected_remaining: projected,
                overpayment: -projected,
            });
        }
        Ok(projected)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error("Removing this commission would leave {party_name} over-paid by {overpayment}")]
    NegativeBalance {
        party_name: String,
        projected_remaining: Decimal,
        overpayment: Decimal,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentMethod;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 10).unwrap()
    }

    fn payment(amount: &str) -> Payment {
        Payment {
            amount: amount.parse().unwrap(),
            method: PaymentMethod::Cash,
            payment_date: today(),
        }
    }

    fn broker(payments: Vec<Payment>) -> Party {
        Party {
            id: Uuid::new_v4(),
            kind: PartyKind::Broker,
            name: "Karim Brokerage".to_string(),
            payments,
            total_commission: Decimal::ZERO,
            total_paid: Decimal::ZERO,
            total_remaining: Decimal::ZERO,
            status: InvoiceStatus::Unpaid,
            due_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_broker_totals_from_rescan() {
        let mut party = broker(vec![payment("100"), payment("50")]);
        let rescanned: Decimal = [100, 200, 300].into_iter().map(Decimal::from).sum();
        party.apply_commission_total(rescanned, today());
        assert_eq!(party.total_commission, Decimal::from(600));
        assert_eq!(party.total_paid, Decimal::from(150));
        assert_eq!(party.total_remaining, Decimal::from(450));
        assert_eq!(party.status, InvoiceStatus::Partial);
    }

    #[test]
    fn test_overpaid_party_has_zero_remaining() {
        let mut party = broker(vec![payment("700")]);
        party.apply_commission_total(Decimal::from(600), today());
        assert_eq!(party.total_remaining, Decimal::ZERO);
        assert_eq!(party.status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_total_paid_is_rounded() {
        let mut party = broker(vec![payment("10.4"), payment("10.4")]);
        party.recompute(today());
        assert_eq!(party.total_paid, Decimal::from(21));
    }

    #[test]
    fn test_party_overdue_when_past_due() {
        let mut party = broker(vec![]);
        party.due_date = today().pred_opt();
        party.apply_commission_total(Decimal::from(100), today());
        assert_eq!(party.status, InvoiceStatus::Overdue);
    }

    #[test]
    fn test_add_payment_rejects_zero() {
        let mut party = broker(vec![]);
        assert!(party.add_payment(payment("0"), today()).is_err());
        assert!(party.payments.is_empty());
        party.add_payment(payment("25"), today()).unwrap();
        assert_eq!(party.total_paid, Decimal::from(25));
    }

    #[test]
    fn test_projection_rejects_negative_balance() {
        let mut party = broker(vec![payment("400")]);
        party.kind = PartyKind::Commissioner;
        party.apply_commission_total(Decimal::from(500), today());

        assert_eq!(party.project_without_commission(Decimal::from(100)), Ok(Decimal::ZERO));
        let err = party.project_without_commission(Decimal::from(300)).unwrap_err();
        assert_eq!(
            err,
            ProjectionError::NegativeBalance {
                party_name: "Karim Brokerage".to_string(),
                projected_remaining: Decimal::from(-200),
                overpayment: Decimal::from(200),
            }
        );
    }
}
