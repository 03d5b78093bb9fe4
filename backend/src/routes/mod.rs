//! Route definitions for the Trading House back office

use axum::{
    routing::{get, post, put},
    Extension, Router,
};
use shared::PartyKind;

use crate::{handlers, services::invoice::TradeBook, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/items", item_routes())
        .nest("/customer-invoices", trade_invoice_routes(TradeBook::Customer))
        .nest("/vendor-invoices", trade_invoice_routes(TradeBook::Vendor))
        .nest("/commissioner-invoices", commissioner_invoice_routes())
        .nest("/brokers", party_routes(PartyKind::Broker))
        .nest("/commissioners", party_routes(PartyKind::Commissioner))
        .route(
            "/maintenance/overdue-sweep",
            post(handlers::run_overdue_sweep),
        )
}

/// Item registry routes
fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_items).post(handlers::create_item))
        .route("/:item_id", get(handlers::get_item))
        .route("/:item_id/transfer", post(handlers::transfer_stock))
}

/// Customer or vendor invoice routes; `book` selects the table
fn trade_invoice_routes(book: TradeBook) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_invoices).post(handlers::create_invoice),
        )
        .route(
            "/:invoice_id",
            get(handlers::get_invoice)
                .put(handlers::update_invoice)
                .delete(handlers::delete_invoice),
        )
        .route("/:invoice_id/payments", post(handlers::add_invoice_payment))
        .route("/:invoice_id/due-date", put(handlers::set_invoice_due_date))
        .layer(Extension(book))
}

/// Commissioner invoice routes
fn commissioner_invoice_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_commissioner_invoices).post(handlers::create_commissioner_invoice),
        )
        .route(
            "/:invoice_id",
            get(handlers::get_commissioner_invoice)
                .put(handlers::update_commissioner_invoice)
                .delete(handlers::delete_commissioner_invoice),
        )
        .route(
            "/:invoice_id/payments",
            post(handlers::add_commissioner_invoice_payment),
        )
}

/// Broker or commissioner ledger routes
fn party_routes(kind: PartyKind) -> Router<AppState> {
    Router::new()
        .route("/:party_id", get(handlers::get_party))
        .route("/:party_id/payments", post(handlers::add_party_payment))
        .route("/:party_id/due-date", put(handlers::set_party_due_date))
        .route("/:party_id/recalculate", post(handlers::recalculate_party))
        .layer(Extension(kind))
}
