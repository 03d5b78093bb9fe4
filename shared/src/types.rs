//! Common types used across the back office

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Round a money amount to whole currency units (half away from zero)
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// `max(0, value)`
pub fn clamp_non_negative(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO)
}

/// `round(amount × percentage / 100)`, or zero when no positive percentage is set
pub fn commission_on(amount: Decimal, percentage: Option<Decimal>) -> Decimal {
    match percentage {
        Some(pct) if pct > Decimal::ZERO => round_money(amount * pct / Decimal::ONE_HUNDRED),
        _ => Decimal::ZERO,
    }
}

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 50,
        }
    }
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page.clamp(1, 500))
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * self.limit()
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl PaginationMeta {
    pub fn new(pagination: &Pagination, total_items: u64) -> Self {
        let per_page = pagination.limit() as u32;
        Self {
            page: pagination.page.max(1),
            per_page,
            total_items,
            total_pages: total_items.div_ceil(u64::from(per_page)) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(dec("10.5")), dec("11"));
        assert_eq!(round_money(dec("10.49")), dec("10"));
        assert_eq!(round_money(dec("-10.5")), dec("-11"));
    }

    #[test]
    fn test_commission_requires_positive_percentage() {
        assert_eq!(commission_on(dec("1000"), None), Decimal::ZERO);
        assert_eq!(commission_on(dec("1000"), Some(Decimal::ZERO)), Decimal::ZERO);
        assert_eq!(commission_on(dec("1000"), Some(dec("-5"))), Decimal::ZERO);
        assert_eq!(commission_on(dec("1000"), Some(dec("2.5"))), dec("25"));
        assert_eq!(commission_on(dec("999"), Some(dec("1.5"))), dec("15"));
    }

    #[test]
    fn test_pagination_bounds() {
        let p = Pagination { page: 0, per_page: 10_000 };
        assert_eq!(p.limit(), 500);
        assert_eq!(p.offset(), 0);

        let p = Pagination { page: 3, per_page: 20 };
        assert_eq!(p.offset(), 40);
        assert_eq!(PaginationMeta::new(&p, 41).total_pages, 3);
    }
}
