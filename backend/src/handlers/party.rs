//! HTTP handlers for broker and commissioner ledgers

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use shared::{Party, PartyKind, Payment};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::{AggregateService, SetDueDateInput};
use crate::AppState;

pub async fn get_party(
    State(state): State<AppState>,
    Extension(kind): Extension<PartyKind>,
    Path(party_id): Path<Uuid>,
) -> AppResult<Json<Party>> {
    let service = AggregateService::new(state.db);
    let party = service.get_party(kind, party_id).await?;
    Ok(Json(party))
}

/// Append a payment to the party's ledger
pub async fn add_party_payment(
    State(state): State<AppState>,
    Extension(kind): Extension<PartyKind>,
    Path(party_id): Path<Uuid>,
    Json(payment): Json<Payment>,
) -> AppResult<Json<Party>> {
    let service = AggregateService::new(state.db);
    let party = service.add_payment(kind, party_id, payment).await?;
    Ok(Json(party))
}

pub async fn set_party_due_date(
    State(state): State<AppState>,
    Extension(kind): Extension<PartyKind>,
    Path(party_id): Path<Uuid>,
    Json(input): Json<SetDueDateInput>,
) -> AppResult<Json<Party>> {
    let service = AggregateService::new(state.db);
    let party = service.set_due_date(kind, party_id, input).await?;
    Ok(Json(party))
}

/// Rebuild the party's totals from its invoices
pub async fn recalculate_party(
    State(state): State<AppState>,
    Extension(kind): Extension<PartyKind>,
    Path(party_id): Path<Uuid>,
) -> AppResult<Json<Party>> {
    let service = AggregateService::new(state.db);
    let party = service.recalculate(kind, party_id).await?;
    Ok(Json(party))
}
