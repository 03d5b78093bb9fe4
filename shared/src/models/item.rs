//! Item stock models
//!
//! An item's stock lives in two buckets (shop, cold), each holding a
//! quantity, a net weight and a gross weight. No counter ever goes negative.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::clamp_non_negative;

/// First value tried when allocating a 5-digit item number
pub const ITEM_NUMBER_START: i32 = 10_000;
/// Last valid 5-digit item number
pub const ITEM_NUMBER_END: i32 = 99_999;
/// Upper bound on probes before allocation gives up
pub const ITEM_NUMBER_MAX_ATTEMPTS: usize = 90_000;

/// Physical storage location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    #[default]
    Shop,
    Cold,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Shop => "shop",
            Bucket::Cold => "cold",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the three counters held per bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockField {
    Quantity,
    NetWeight,
    GrossWeight,
}

impl std::fmt::Display for StockField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockField::Quantity => write!(f, "quantity"),
            StockField::NetWeight => write!(f, "net weight"),
            StockField::GrossWeight => write!(f, "gross weight"),
        }
    }
}

/// Counters of a single bucket, also used as a signed delta
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StockLevels {
    pub quantity: Decimal,
    pub net_weight: Decimal,
    pub gross_weight: Decimal,
}

impl StockLevels {
    pub fn new(quantity: Decimal, net_weight: Decimal, gross_weight: Decimal) -> Self {
        Self {
            quantity,
            net_weight,
            gross_weight,
        }
    }

    pub fn negated(&self) -> Self {
        Self::new(-self.quantity, -self.net_weight, -self.gross_weight)
    }

    pub fn scaled(&self, factor: Decimal) -> Self {
        Self::new(
            self.quantity * factor,
            self.net_weight * factor,
            self.gross_weight * factor,
        )
    }

    pub fn is_zero(&self) -> bool {
        self.quantity.is_zero() && self.net_weight.is_zero() && self.gross_weight.is_zero()
    }

    pub fn is_non_negative(&self) -> bool {
        self.fields().iter().all(|(_, v)| *v >= Decimal::ZERO)
    }

    pub fn fields(&self) -> [(StockField, Decimal); 3] {
        [
            (StockField::Quantity, self.quantity),
            (StockField::NetWeight, self.net_weight),
            (StockField::GrossWeight, self.gross_weight),
        ]
    }

    /// The amounts a signed delta takes away (positive components become zero)
    pub fn removals(&self) -> Self {
        Self::new(
            clamp_non_negative(-self.quantity),
            clamp_non_negative(-self.net_weight),
            clamp_non_negative(-self.gross_weight),
        )
    }
}

impl std::ops::Add for StockLevels {
    type Output = StockLevels;

    fn add(self, rhs: StockLevels) -> StockLevels {
        StockLevels::new(
            self.quantity + rhs.quantity,
            self.net_weight + rhs.net_weight,
            self.gross_weight + rhs.gross_weight,
        )
    }
}

impl std::ops::AddAssign for StockLevels {
    fn add_assign(&mut self, rhs: StockLevels) {
        *self = *self + rhs;
    }
}

/// An item together with its stock in both buckets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStock {
    pub id: Uuid,
    /// Unique 5-digit item number
    pub item_number: i32,
    pub name: String,
    pub shop: StockLevels,
    pub cold: StockLevels,
}

impl ItemStock {
    pub fn levels(&self, bucket: Bucket) -> &StockLevels {
        match bucket {
            Bucket::Shop => &self.shop,
            Bucket::Cold => &self.cold,
        }
    }

    fn levels_mut(&mut self, bucket: Bucket) -> &mut StockLevels {
        match bucket {
            Bucket::Shop => &mut self.shop,
            Bucket::Cold => &mut self.cold,
        }
    }

    /// Apply a signed delta to a bucket, clamping every counter at zero
    pub fn adjust(&mut self, bucket: Bucket, delta: &StockLevels) {
        let levels = self.levels_mut(bucket);
        levels.quantity = clamp_non_negative(levels.quantity + delta.quantity);
        levels.net_weight = clamp_non_negative(levels.net_weight + delta.net_weight);
        levels.gross_weight = clamp_non_negative(levels.gross_weight + delta.gross_weight);
    }

    /// Check that the bucket holds at least `required` of every counter
    pub fn validate(&self, bucket: Bucket, required: &StockLevels) -> Result<(), StockError> {
        let available = self.levels(bucket);
        for ((field, have), (_, need)) in available.fields().into_iter().zip(required.fields()) {
            if need > have {
                return Err(StockError::Insufficient {
                    item_id: self.id,
                    item_name: self.name.clone(),
                    bucket,
                    field,
                    available: have,
                    required: need,
                });
            }
        }
        Ok(())
    }
}

/// Item as stored, with bookkeeping timestamps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    #[serde(flatten)]
    pub stock: ItemStock,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Errors raised while checking or changing stock
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StockError {
    #[error("Insufficient {field} of {item_name} in {bucket}: available {available}, required {required}")]
    Insufficient {
        item_id: Uuid,
        item_name: String,
        bucket: Bucket,
        field: StockField,
        available: Decimal,
        required: Decimal,
    },

    #[error("Cannot delete: {reason} ({item_name} {field} in {bucket}: current {current}, required {required})")]
    CannotDelete {
        reason: String,
        item_name: String,
        bucket: Bucket,
        field: StockField,
        current: Decimal,
        required: Decimal,
    },

    #[error("Item {0} not found")]
    UnknownItem(Uuid),
}

/// Lowest free 5-digit item number, probing upward from 10000
pub fn next_item_number(taken: &HashSet<i32>) -> Option<i32> {
    (ITEM_NUMBER_START..=ITEM_NUMBER_END)
        .take(ITEM_NUMBER_MAX_ATTEMPTS)
        .find(|n| !taken.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(shop_qty: i64) -> ItemStock {
        ItemStock {
            id: Uuid::new_v4(),
            item_number: 10_000,
            name: "Basmati".to_string(),
            shop: StockLevels::new(
                Decimal::from(shop_qty),
                Decimal::from(shop_qty * 10),
                Decimal::from(shop_qty * 11),
            ),
            cold: StockLevels::default(),
        }
    }

    #[test]
    fn test_adjust_clamps_at_zero() {
        let mut stock = item(5);
        stock.adjust(Bucket::Shop, &StockLevels::new(Decimal::from(-8), Decimal::from(-10), Decimal::ZERO));
        assert_eq!(stock.shop.quantity, Decimal::ZERO);
        assert_eq!(stock.shop.net_weight, Decimal::from(40));
        assert_eq!(stock.shop.gross_weight, Decimal::from(55));
        assert!(stock.cold.is_zero());
    }

    #[test]
    fn test_validate_reports_first_short_counter() {
        let stock = item(30);
        let err = stock
            .validate(Bucket::Shop, &StockLevels::new(Decimal::from(40), Decimal::ZERO, Decimal::ZERO))
            .unwrap_err();
        match err {
            StockError::Insufficient { field, available, required, .. } => {
                assert_eq!(field, StockField::Quantity);
                assert_eq!(available, Decimal::from(30));
                assert_eq!(required, Decimal::from(40));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(stock
            .validate(Bucket::Shop, &StockLevels::new(Decimal::from(30), Decimal::from(300), Decimal::from(330)))
            .is_ok());
        assert!(stock
            .validate(Bucket::Cold, &StockLevels::new(Decimal::ONE, Decimal::ZERO, Decimal::ZERO))
            .is_err());
    }

    #[test]
    fn test_removals_keep_only_negative_components() {
        let delta = StockLevels::new(Decimal::from(-3), Decimal::from(5), Decimal::from(-1));
        assert_eq!(delta.removals(), StockLevels::new(Decimal::from(3), Decimal::ZERO, Decimal::ONE));
    }

    #[test]
    fn test_next_item_number_probes_upward() {
        assert_eq!(next_item_number(&HashSet::new()), Some(10_000));
        let taken: HashSet<i32> = [10_000, 10_001, 10_003].into_iter().collect();
        assert_eq!(next_item_number(&taken), Some(10_002));
    }

    #[test]
    fn test_next_item_number_exhausted() {
        let taken: HashSet<i32> = (ITEM_NUMBER_START..=ITEM_NUMBER_END).collect();
        assert_eq!(next_item_number(&taken), None);
    }
}
