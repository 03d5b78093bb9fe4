//! HTTP handlers for commissioner invoices

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{CommissionerInvoice, PaginatedResponse, Payment};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::commissioner_invoice::{
    CommissionerInvoiceService, CreateCommissionerInvoiceInput, UpdateCommissionerInvoiceInput,
};
use crate::services::invoice::ListInvoicesQuery;
use crate::AppState;

pub async fn create_commissioner_invoice(
    State(state): State<AppState>,
    Json(input): Json<CreateCommissionerInvoiceInput>,
) -> AppResult<(StatusCode, Json<CommissionerInvoice>)> {
    let service = CommissionerInvoiceService::new(state.db);
    let invoice = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// List commissioner invoices; `party_id` selects one commissioner
pub async fn list_commissioner_invoices(
    State(state): State<AppState>,
    Query(query): Query<ListInvoicesQuery>,
) -> AppResult<Json<PaginatedResponse<CommissionerInvoice>>> {
    let service = CommissionerInvoiceService::new(state.db);
    let invoices = service.list(query).await?;
    Ok(Json(invoices))
}

pub async fn get_commissioner_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<CommissionerInvoice>> {
    let service = CommissionerInvoiceService::new(state.db);
    let invoice = service.get(invoice_id).await?;
    Ok(Json(invoice))
}

pub async fn update_commissioner_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(input): Json<UpdateCommissionerInvoiceInput>,
) -> AppResult<Json<CommissionerInvoice>> {
    let service = CommissionerInvoiceService::new(state.db);
    let invoice = service.update(invoice_id, input).await?;
    Ok(Json(invoice))
}

/// Delete a commissioner invoice; rejected if the commissioner would be over-paid
pub async fn delete_commissioner_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = CommissionerInvoiceService::new(state.db);
    service.delete(invoice_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_commissioner_invoice_payment(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(payment): Json<Payment>,
) -> AppResult<Json<CommissionerInvoice>> {
    let service = CommissionerInvoiceService::new(state.db);
    let invoice = service.add_payment(invoice_id, payment).await?;
    Ok(Json(invoice))
}
