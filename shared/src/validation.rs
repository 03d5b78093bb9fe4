//! Validation utilities for invoice and item input

use rust_decimal::Decimal;

use crate::models::{LineItem, StockLevels};

/// Maximum length of an invoice number
pub const MAX_INVOICE_NUMBER_LEN: usize = 64;

// ============================================================================
// Invoice Validations
// ============================================================================

/// Validate invoice number format (non-blank, bounded, no whitespace inside)
pub fn validate_invoice_number(number: &str) -> Result<(), &'static str> {
    let trimmed = number.trim();
    if trimmed.is_empty() {
        return Err("Invoice number is required");
    }
    if trimmed.len() > MAX_INVOICE_NUMBER_LEN {
        return Err("Invoice number must be at most 64 characters");
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err("Invoice number cannot contain spaces");
    }
    Ok(())
}

/// Validate a commission percentage is between 0 and 100
pub fn validate_percentage(percentage: Decimal) -> Result<(), &'static str> {
    if percentage < Decimal::ZERO || percentage > Decimal::ONE_HUNDRED {
        return Err("Percentage must be between 0 and 100");
    }
    Ok(())
}

/// Validate a money amount is not negative
pub fn validate_non_negative_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    Ok(())
}

/// Validate a single line item
pub fn validate_line_item(line: &LineItem) -> Result<(), &'static str> {
    if line.item_name.trim().is_empty() {
        return Err("Line item name is required");
    }
    if !line.stock_levels().is_non_negative() {
        return Err("Line item quantity and weights cannot be negative");
    }
    if line.unit_price < Decimal::ZERO || line.packaging_cost < Decimal::ZERO {
        return Err("Line item prices cannot be negative");
    }
    if line.stock_levels().is_zero() {
        return Err("Line item must have a quantity or weight");
    }
    Ok(())
}

/// Validate every line of an invoice, returning the index of the first bad line
pub fn validate_line_items(lines: &[LineItem]) -> Result<(), (usize, &'static str)> {
    if lines.is_empty() {
        return Err((0, "Invoice must have at least one line item"));
    }
    for (index, line) in lines.iter().enumerate() {
        validate_line_item(line).map_err(|msg| (index, msg))?;
    }
    Ok(())
}

// ============================================================================
// Stock Validations
// ============================================================================

/// Validate opening or transferred stock counters
pub fn validate_stock_levels(levels: &StockLevels) -> Result<(), &'static str> {
    if !levels.is_non_negative() {
        return Err("Stock quantity and weights cannot be negative");
    }
    Ok(())
}

/// Check that gross weight is at least net weight (advisory, never enforced on stock)
pub fn is_plausible_weight(levels: &StockLevels) -> bool {
    levels.gross_weight >= levels.net_weight
}
