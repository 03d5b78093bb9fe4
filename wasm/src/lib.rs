//! WebAssembly module for the Trading House back office
//!
//! Lets the invoice form preview totals, commission and status offline,
//! using exactly the same derived-field rules as the server.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::log_1(&JsValue::from_str("trading-house-wasm ready"));
}

/// Form state of a customer or vendor invoice
#[derive(Debug, Deserialize)]
struct TradePreviewInput {
    items: Vec<LineItem>,
    #[serde(default)]
    labour_transport_cost: Decimal,
    #[serde(default)]
    payments: Vec<Payment>,
    due_date: Option<NaiveDate>,
    broker_id: Option<Uuid>,
    broker_commission_percentage: Option<Decimal>,
}

/// Form state of a commissioner invoice
#[derive(Debug, Deserialize)]
struct CommissionerPreviewInput {
    items: Vec<LineItem>,
    #[serde(default)]
    labour_transport_cost: Decimal,
    commissioner_percentage: Decimal,
    #[serde(default)]
    payments: Vec<Payment>,
}

fn parse_kind(kind: &str) -> Result<InvoiceKind, String> {
    match kind {
        "customer" => Ok(InvoiceKind::Customer),
        "vendor" => Ok(InvoiceKind::Vendor),
        other => Err(format!("Unknown invoice kind '{}'", other)),
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    value
        .parse::<NaiveDate>()
        .map_err(|e| format!("Invalid date '{}': {}", value, e))
}

fn decimal(value: f64) -> Result<Decimal, String> {
    Decimal::try_from(value).map_err(|e| format!("Invalid amount {}: {}", value, e))
}

/// Today's date from the browser clock
fn browser_today() -> String {
    let iso: String = js_sys::Date::new_0().to_iso_string().into();
    iso.chars().take(10).collect()
}

fn trade_preview(input_json: &str, kind: &str, today: &str) -> Result<String, String> {
    let kind = parse_kind(kind)?;
    let today = parse_date(today)?;
    let input: TradePreviewInput =
        serde_json::from_str(input_json).map_err(|e| format!("Invalid invoice JSON: {}", e))?;

    let mut invoice = TradeInvoice {
        id: Uuid::nil(),
        kind,
        invoice_number: String::new(),
        party_id: Uuid::nil(),
        party_name: String::new(),
        broker_id: input.broker_id,
        broker_name: None,
        broker_commission_percentage: input.broker_commission_percentage,
        broker_commission_amount: Decimal::ZERO,
        invoice_date: today,
        due_date: input.due_date,
        items: input.items,
        labour_transport_cost: input.labour_transport_cost,
        payments: input.payments,
        subtotal: Decimal::ZERO,
        total: Decimal::ZERO,
        total_paid_amount: Decimal::ZERO,
        remaining_amount: Decimal::ZERO,
        status: InvoiceStatus::Unpaid,
        created_at: DateTime::<Utc>::default(),
        updated_at: DateTime::<Utc>::default(),
    };
    invoice.recompute(today);
    serde_json::to_string(&invoice).map_err(|e| e.to_string())
}

fn commissioner_preview(input_json: &str) -> Result<String, String> {
    let input: CommissionerPreviewInput =
        serde_json::from_str(input_json).map_err(|e| format!("Invalid invoice JSON: {}", e))?;

    let mut invoice = CommissionerInvoice {
        id: Uuid::nil(),
        invoice_number: String::new(),
        commissioner_id: Uuid::nil(),
        commissioner_name: String::new(),
        invoice_date: NaiveDate::default(),
        items: input.items,
        labour_transport_cost: input.labour_transport_cost,
        subtotal: Decimal::ZERO,
        total: Decimal::ZERO,
        commissioner_percentage: input.commissioner_percentage,
        commissioner_amount: Decimal::ZERO,
        payments: input.payments,
        paid_amount: Decimal::ZERO,
        remaining_amount: Decimal::ZERO,
        status: InvoiceStatus::Unpaid,
        created_at: DateTime::<Utc>::default(),
        updated_at: DateTime::<Utc>::default(),
    };
    invoice.recompute();
    serde_json::to_string(&invoice).map_err(|e| e.to_string())
}

fn status_of(remaining: f64, paid: f64, due: Option<&str>, today: &str) -> Result<String, String> {
    let due = due.map(parse_date).transpose()?;
    let status = derive_status(decimal(remaining)?, decimal(paid)?, due, parse_date(today)?, true);
    Ok(status.to_string())
}

/// Recompute a customer or vendor invoice; `today` defaults to the browser date
#[wasm_bindgen]
pub fn preview_trade_invoice(
    input_json: &str,
    kind: &str,
    today: Option<String>,
) -> Result<String, JsValue> {
    let today = today.unwrap_or_else(browser_today);
    trade_preview(input_json, kind, &today).map_err(|e| JsValue::from_str(&e))
}

/// Recompute a commissioner invoice
#[wasm_bindgen]
pub fn preview_commissioner_invoice(input_json: &str) -> Result<String, JsValue> {
    commissioner_preview(input_json).map_err(|e| JsValue::from_str(&e))
}

/// Status for a remaining balance, amount paid and optional due date
#[wasm_bindgen]
pub fn invoice_status(
    remaining: f64,
    paid: f64,
    due_date: Option<String>,
    today: Option<String>,
) -> Result<String, JsValue> {
    let today = today.unwrap_or_else(browser_today);
    status_of(remaining, paid, due_date.as_deref(), &today).map_err(|e| JsValue::from_str(&e))
}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn preview_uses_the_javascript_clock() {
        let input = r#"{"items": [{"item_name": "Mace", "net_weight": "3", "unit_price": "7"}]}"#;
        let preview = preview_trade_invoice(input, "vendor", None).unwrap();
        let preview: serde_json::Value = serde_json::from_str(&preview).unwrap();
        assert_eq!(preview["total"], "21");
        assert_eq!(preview["invoice_date"], browser_today());
    }

    #[wasm_bindgen_test]
    fn bad_input_is_a_javascript_error() {
        assert!(invoice_status(10.0, 0.0, Some("not a date".to_string()), None).is_err());
        assert!(preview_commissioner_invoice("{").is_err());
    }
}
