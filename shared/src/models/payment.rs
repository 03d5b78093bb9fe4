//! Payments embedded in invoices and party ledgers

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::round_money;

/// How a payment was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Online,
    Cheque,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Online => "online",
            PaymentMethod::Cheque => "cheque",
        }
    }
}

/// A single payment; payment lists are append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub payment_date: NaiveDate,
}

impl Payment {
    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.amount <= Decimal::ZERO {
            return Err(PaymentError::NonPositiveAmount(self.amount));
        }
        Ok(())
    }
}

/// Errors raised when recording a payment
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PaymentError {
    #[error("Payment amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("Payment of {attempted} exceeds the remaining {remaining} by {excess}")]
    Overpayment {
        remaining: Decimal,
        attempted: Decimal,
        excess: Decimal,
    },
}

/// `round(Σ payment.amount)` in whole currency units
pub fn sum_payments(payments: &[Payment]) -> Decimal {
    round_money(payments.iter().map(|p| p.amount).sum())
}

/// Reject a payment that is not positive or would push the remaining amount below zero
pub fn check_payment_fits(payment: &Payment, remaining: Decimal) -> Result<(), PaymentError> {
    payment.validate()?;
    if payment.amount > remaining {
        return Err(PaymentError::Overpayment {
            remaining,
            attempted: payment.amount,
            excess: payment.amount - remaining,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(amount: i64) -> Payment {
        Payment {
            amount: Decimal::from(amount),
            method: PaymentMethod::Cash,
            payment_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        }
    }

    #[test]
    fn test_non_positive_payment_rejected() {
        assert_eq!(payment(0).validate(), Err(PaymentError::NonPositiveAmount(Decimal::ZERO)));
        assert!(payment(-5).validate().is_err());
        assert!(payment(1).validate().is_ok());
    }

    #[test]
    fn test_overpayment_reports_excess() {
        let err = check_payment_fits(&payment(700), Decimal::from(600)).unwrap_err();
        assert_eq!(
            err,
            PaymentError::Overpayment {
                remaining: Decimal::from(600),
                attempted: Decimal::from(700),
                excess: Decimal::from(100),
            }
        );
        assert!(check_payment_fits(&payment(600), Decimal::from(600)).is_ok());
    }

    #[test]
    fn test_sum_payments() {
        assert_eq!(sum_payments(&[]), Decimal::ZERO);
        assert_eq!(sum_payments(&[payment(400), payment(600)]), Decimal::from(1000));
    }

    #[test]
    fn test_sum_payments_rounds_to_whole_units() {
        let mut first = payment(0);
        first.amount = Decimal::new(40037, 2);
        assert_eq!(sum_payments(&[first.clone()]), Decimal::from(400));

        let mut second = payment(0);
        second.amount = Decimal::new(25, 2);
        // 400.37 + 0.25 = 400.62
        assert_eq!(sum_payments(&[first, second]), Decimal::from(401));
    }

    #[test]
    fn test_method_wire_names() {
        let json = serde_json::to_string(&PaymentMethod::Cheque).unwrap();
        assert_eq!(json, "\"cheque\"");
        assert_eq!(PaymentMethod::Online.as_str(), "online");
    }
}
