//! Operational endpoints

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::services::{sweeper::SweepReport, today};
use crate::AppState;

/// Flag overdue invoices now instead of waiting for the daily run
pub async fn run_overdue_sweep(State(state): State<AppState>) -> AppResult<Json<SweepReport>> {
    let report = state.sweeper.run_now(today()).await?;
    Ok(Json(report))
}
