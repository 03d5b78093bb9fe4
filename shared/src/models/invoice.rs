//! Customer and vendor invoices
//!
//! Every derived field is a pure function of the line items, the labour and
//! transport cost, the payments, the due date and today's date. The fields
//! are recomputed in a fixed order on every save:
//!
//! 1. subtotal from the line totals
//! 2. total = subtotal + labour/transport cost
//! 3. broker commission on the total
//! 4. total paid from the payments
//! 5. remaining = total - paid
//! 6. status

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{check_payment_fits, sum_payments, LineItem, Payment, PaymentError};
use crate::types::{commission_on, round_money};

/// Invoice variant, which decides the stock direction and rounding policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceKind {
    Customer,
    Vendor,
    Commissioner,
}

impl InvoiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceKind::Customer => "customer",
            InvoiceKind::Vendor => "vendor",
            InvoiceKind::Commissioner => "commissioner",
        }
    }

    /// +1 when the invoice brings stock in, -1 when it takes stock out
    pub fn stock_sign(&self) -> Decimal {
        match self {
            InvoiceKind::Vendor => Decimal::ONE,
            InvoiceKind::Customer | InvoiceKind::Commissioner => Decimal::NEGATIVE_ONE,
        }
    }

    /// Vendor line totals are summed raw and rounded once; the others round each line
    pub fn rounds_per_line(&self) -> bool {
        !matches!(self, InvoiceKind::Vendor)
    }

    /// Commissioner invoices have no due date and never become overdue
    pub fn can_be_overdue(&self) -> bool {
        !matches!(self, InvoiceKind::Commissioner)
    }
}

impl std::fmt::Display for InvoiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status of an invoice or party
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Unpaid,
    Partial,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(InvoiceStatus::Unpaid),
            "partial" => Ok(InvoiceStatus::Partial),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            other => Err(format!("unknown invoice status '{}'", other)),
        }
    }
}

/// Status from the remaining balance; the first matching rule wins
///
/// paid, then overdue, then partial, then unpaid. The order matters: a fully
/// paid invoice past its due date is `Paid`.
pub fn derive_status(
    remaining: Decimal,
    total_paid: Decimal,
    due_date: Option<NaiveDate>,
    today: NaiveDate,
    overdue_applies: bool,
) -> InvoiceStatus {
    if remaining <= Decimal::ZERO {
        return InvoiceStatus::Paid;
    }
    if overdue_applies && due_date.is_some_and(|due| today > due) {
        return InvoiceStatus::Overdue;
    }
    if total_paid > Decimal::ZERO {
        return InvoiceStatus::Partial;
    }
    InvoiceStatus::Unpaid
}

/// Price every line and return `round(Σ line totals)`
pub fn price_lines(kind: InvoiceKind, lines: &mut [LineItem]) -> Decimal {
    let per_line = kind.rounds_per_line();
    let sum: Decimal = lines.iter_mut().map(|line| line.price(per_line)).sum();
    round_money(sum)
}

/// A customer (sale) or vendor (purchase) invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeInvoice {
    pub id: Uuid,
    pub kind: InvoiceKind,
    pub invoice_number: String,
    /// Customer or vendor reference
    pub party_id: Uuid,
    pub party_name: String,
    pub broker_id: Option<Uuid>,
    pub broker_name: Option<String>,
    pub broker_commission_percentage: Option<Decimal>,
    pub broker_commission_amount: Decimal,
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub items: Vec<LineItem>,
    pub labour_transport_cost: Decimal,
    pub payments: Vec<Payment>,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub total_paid_amount: Decimal,
    pub remaining_amount: Decimal,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TradeInvoice {
    /// Recompute every derived field
    pub fn recompute(&mut self, today: NaiveDate) {
        self.subtotal = price_lines(self.kind, &mut self.items);
        self.labour_transport_cost = round_money(self.labour_transport_cost);
        self.total = self.subtotal + self.labour_transport_cost;
        self.broker_commission_amount = if self.broker_id.is_some() {
            commission_on(self.total, self.broker_commission_percentage)
        } else {
            Decimal::ZERO
        };
        self.refresh_balance(today);
    }

    /// Recompute paid, remaining and status, leaving the line totals alone
    pub fn refresh_balance(&mut self, today: NaiveDate) {
        self.total_paid_amount = sum_payments(&self.payments);
        self.remaining_amount = self.total - self.total_paid_amount;
        self.status = derive_status(
            self.remaining_amount,
            self.total_paid_amount,
            self.due_date,
            today,
            self.kind.can_be_overdue(),
        );
    }

    /// Append a payment that fits in the remaining balance
    pub fn add_payment(&mut self, payment: Payment, today: NaiveDate) -> Result<(), PaymentError> {
        check_payment_fits(&payment, self.remaining_amount)?;
        self.payments.push(payment);
        self.refresh_balance(today);
        Ok(())
    }

    pub fn set_due_date(&mut self, due_date: Option<NaiveDate>, today: NaiveDate) {
        self.due_date = due_date;
        self.refresh_balance(today);
    }
}
