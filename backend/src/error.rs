//! Error handling for the Trading House back office
//!
//! Every rejection carries enough detail (item, bucket, available vs.
//! required, overpayment) for an operator to fix the request.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use shared::{Bucket, PaymentError, ProjectionError, StockError, StockField};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Reconciliation errors
    #[error("Insufficient inventory: {item_name} {field} in {bucket}: available {available}, required {required}")]
    InsufficientInventory {
        item_name: String,
        bucket: Bucket,
        field: StockField,
        available: Decimal,
        required: Decimal,
    },

    #[error("Cannot delete: {reason}")]
    CannotDelete {
        reason: String,
        item_name: String,
        bucket: Bucket,
        field: StockField,
        current: Decimal,
        required: Decimal,
    },

    #[error("Negative balance projection for {party_name}: over-paid by {overpayment}")]
    NegativeBalanceProjection {
        party_name: String,
        projected_remaining: Decimal,
        overpayment: Decimal,
    },

    #[error("Overpayment: {attempted} exceeds remaining {remaining}")]
    Overpayment {
        remaining: Decimal,
        attempted: Decimal,
        excess: Decimal,
    },

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Turn a unique-constraint violation into `DuplicateEntry`, passing other errors through
    pub fn from_unique_violation(err: sqlx::Error, field: &str) -> Self {
        let unique = err
            .as_database_error()
            .is_some_and(|db_err| db_err.is_unique_violation());
        if unique {
            AppError::DuplicateEntry(field.to_string())
        } else {
            AppError::DatabaseError(err)
        }
    }

    pub fn validation(field: &str, message: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<StockError> for AppError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::Insufficient {
                item_name,
                bucket,
                field,
                available,
                required,
                ..
            } => AppError::InsufficientInventory {
                item_name,
                bucket,
                field,
                available,
                required,
            },
            StockError::CannotDelete {
                reason,
                item_name,
                bucket,
                field,
                current,
                required,
            } => AppError::CannotDelete {
                reason,
                item_name,
                bucket,
                field,
                current,
                required,
            },
            StockError::UnknownItem(id) => AppError::NotFound(format!("Item {}", id)),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::NonPositiveAmount(_) => {
                AppError::validation("amount", "Payment amount must be positive")
            }
            PaymentError::Overpayment {
                remaining,
                attempted,
                excess,
            } => AppError::Overpayment {
                remaining,
                attempted,
                excess,
            },
        }
    }
}

impl From<ProjectionError> for AppError {
    fn from(err: ProjectionError) -> Self {
        match err {
            ProjectionError::NegativeBalance {
                party_name,
                projected_remaining,
                overpayment,
            } => AppError::NegativeBalanceProjection {
                party_name,
                projected_remaining,
                overpayment,
            },
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|name| name.to_string())
            .unwrap_or_default();
        AppError::Validation {
            field,
            message: errors.to_string(),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorDetail {
    fn new(code: &str, message: String) -> Self {
        Self {
            code: code.to_string(),
            message,
            field: None,
            details: None,
        }
    }

    fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl AppError {
    fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", message.clone()).with_field(field),
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", msg.clone()),
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                ErrorDetail::new(
                    "DUPLICATE_ENTRY",
                    format!("A record with this {} already exists", field),
                )
                .with_field(field),
            ),
            AppError::Conflict { resource, message } => (
                StatusCode::CONFLICT,
                ErrorDetail::new("CONFLICT", message.clone()).with_field(resource),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::InsufficientInventory {
                item_name,
                bucket,
                field,
                available,
                required,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("INSUFFICIENT_INVENTORY", self.to_string()).with_details(json!({
                    "item_name": item_name,
                    "bucket": bucket,
                    "field": field,
                    "available": available,
                    "required": required,
                })),
            ),
            AppError::CannotDelete {
                reason,
                item_name,
                bucket,
                field,
                current,
                required,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new(
                    "CANNOT_DELETE",
                    format!(
                        "Cannot delete: {} ({} {} in {}: current {}, required {})",
                        reason, item_name, field, bucket, current, required
                    ),
                )
                .with_details(json!({
                    "reason": reason,
                    "item_name": item_name,
                    "bucket": bucket,
                    "field": field,
                    "current": current,
                    "required": required,
                })),
            ),
            AppError::NegativeBalanceProjection {
                party_name,
                projected_remaining,
                overpayment,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("NEGATIVE_BALANCE_PROJECTION", self.to_string()).with_details(
                    json!({
                        "party_name": party_name,
                        "projected_remaining": projected_remaining,
                        "overpayment": overpayment,
                    }),
                ),
            ),
            AppError::Overpayment {
                remaining,
                attempted,
                excess,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("OVERPAYMENT", self.to_string())
                    .with_field("amount")
                    .with_details(json!({
                        "remaining": remaining,
                        "attempted": attempted,
                        "overpayment": excess,
                    })),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred".to_string()),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg.clone()),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                ),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.status_and_detail();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!(code = %error_detail.code, "Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_insufficient_inventory_maps_to_422_with_details() {
        let err: AppError = StockError::Insufficient {
            item_id: Uuid::new_v4(),
            item_name: "Sumac".to_string(),
            bucket: Bucket::Shop,
            field: StockField::Quantity,
            available: Decimal::from(30),
            required: Decimal::from(40),
        }
        .into();
        let (status, detail) = err.status_and_detail();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(detail.code, "INSUFFICIENT_INVENTORY");
        let details = detail.details.unwrap();
        assert_eq!(details["item_name"], "Sumac");
        assert_eq!(details["bucket"], "shop");
        assert_eq!(details["field"], "quantity");
    }

    #[test]
    fn test_unknown_item_maps_to_not_found() {
        let err: AppError = StockError::UnknownItem(Uuid::nil()).into();
        assert_eq!(err.status_and_detail().0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_overpayment_reports_excess() {
        let err: AppError = PaymentError::Overpayment {
            remaining: Decimal::from(600),
            attempted: Decimal::from(650),
            excess: Decimal::from(50),
        }
        .into();
        let (status, detail) = err.status_and_detail();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(detail.field.as_deref(), Some("amount"));
        assert_eq!(detail.details.unwrap()["overpayment"], "50");
    }

    #[test]
    fn test_non_positive_payment_is_validation_error() {
        let err: AppError = PaymentError::NonPositiveAmount(Decimal::ZERO).into();
        assert_eq!(err.status_and_detail().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_negative_projection_maps_to_422() {
        let err: AppError = ProjectionError::NegativeBalance {
            party_name: "Rahim & Sons".to_string(),
            projected_remaining: Decimal::from(-20),
            overpayment: Decimal::from(20),
        }
        .into();
        let (status, detail) = err.status_and_detail();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(detail.code, "NEGATIVE_BALANCE_PROJECTION");
    }
}
