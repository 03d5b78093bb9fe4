//! HTTP handlers for customer and vendor invoices
//!
//! The same handlers serve both books; the router picks the book with an
//! `Extension<TradeBook>` layer.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use shared::{PaginatedResponse, Payment, TradeInvoice};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::invoice::{
    CreateTradeInvoiceInput, ListInvoicesQuery, TradeBook, TradeInvoiceService,
    UpdateTradeInvoiceInput,
};
use crate::services::SetDueDateInput;
use crate::AppState;

/// Create an invoice and apply its stock effect
pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(book): Extension<TradeBook>,
    Json(input): Json<CreateTradeInvoiceInput>,
) -> AppResult<(StatusCode, Json<TradeInvoice>)> {
    let service = TradeInvoiceService::new(state.db, book);
    let invoice = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// List invoices with optional party, broker and status filters
pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(book): Extension<TradeBook>,
    Query(query): Query<ListInvoicesQuery>,
) -> AppResult<Json<PaginatedResponse<TradeInvoice>>> {
    let service = TradeInvoiceService::new(state.db, book);
    let invoices = service.list(query).await?;
    Ok(Json(invoices))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(book): Extension<TradeBook>,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<TradeInvoice>> {
    let service = TradeInvoiceService::new(state.db, book);
    let invoice = service.get(invoice_id).await?;
    Ok(Json(invoice))
}

/// Replace an invoice's lines and header
pub async fn update_invoice(
    State(state): State<AppState>,
    Extension(book): Extension<TradeBook>,
    Path(invoice_id): Path<Uuid>,
    Json(input): Json<UpdateTradeInvoiceInput>,
) -> AppResult<Json<TradeInvoice>> {
    let service = TradeInvoiceService::new(state.db, book);
    let invoice = service.update(invoice_id, input).await?;
    Ok(Json(invoice))
}

/// Delete an invoice, reversing its stock effect
pub async fn delete_invoice(
    State(state): State<AppState>,
    Extension(book): Extension<TradeBook>,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = TradeInvoiceService::new(state.db, book);
    service.delete(invoice_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_invoice_payment(
    State(state): State<AppState>,
    Extension(book): Extension<TradeBook>,
    Path(invoice_id): Path<Uuid>,
    Json(payment): Json<Payment>,
) -> AppResult<Json<TradeInvoice>> {
    let service = TradeInvoiceService::new(state.db, book);
    let invoice = service.add_payment(invoice_id, payment).await?;
    Ok(Json(invoice))
}

pub async fn set_invoice_due_date(
    State(state): State<AppState>,
    Extension(book): Extension<TradeBook>,
    Path(invoice_id): Path<Uuid>,
    Json(input): Json<SetDueDateInput>,
) -> AppResult<Json<TradeInvoice>> {
    let service = TradeInvoiceService::new(state.db, book);
    let invoice = service.set_due_date(invoice_id, input).await?;
    Ok(Json(invoice))
}
