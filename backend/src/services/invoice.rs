//! Customer and vendor invoice service
//!
//! Create, update and delete run in a single transaction: the invoice row
//! and every touched item row are locked, the stock effect is planned in a
//! [`StockLedger`], and the new levels are written together with the
//! invoice. Broker totals are refreshed after commit.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    referenced_items, validate_invoice_number, validate_line_items, validate_non_negative_amount,
    validate_percentage, InvoiceKind, InvoiceStatus, LineItem, PaginatedResponse, Pagination,
    PaginationMeta, PartyKind, Payment, TradeInvoice,
};
use sqlx::{types::Json, FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use super::inventory::{lock_items, write_stock};
use super::{sync_item_names, today, AggregateService, SetDueDateInput};
use crate::error::{AppError, AppResult};

const TRADE_INVOICE_COLUMNS: &str = "id, invoice_number, party_id, party_name, \
     broker_id, broker_name, broker_commission_percentage, broker_commission_amount, \
     invoice_date, due_date, items, labour_transport_cost, payments, \
     subtotal, total, total_paid_amount, remaining_amount, status, created_at, updated_at";

/// Which of the two trade invoice books a service works on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeBook {
    Customer,
    Vendor,
}

impl TradeBook {
    pub fn kind(self) -> InvoiceKind {
        match self {
            TradeBook::Customer => InvoiceKind::Customer,
            TradeBook::Vendor => InvoiceKind::Vendor,
        }
    }

    fn table(self) -> &'static str {
        match self {
            TradeBook::Customer => "customer_invoices",
            TradeBook::Vendor => "vendor_invoices",
        }
    }

    fn label(self) -> &'static str {
        match self {
            TradeBook::Customer => "Customer invoice",
            TradeBook::Vendor => "Vendor invoice",
        }
    }
}

/// Customer/vendor invoice service
#[derive(Clone)]
pub struct TradeInvoiceService {
    db: PgPool,
    book: TradeBook,
    aggregates: AggregateService,
}

/// Row for trade invoice queries
#[derive(Debug, FromRow)]
struct TradeInvoiceRow {
    id: Uuid,
    invoice_number: String,
    party_id: Uuid,
    party_name: String,
    broker_id: Option<Uuid>,
    broker_name: Option<String>,
    broker_commission_percentage: Option<Decimal>,
    broker_commission_amount: Decimal,
    invoice_date: NaiveDate,
    due_date: Option<NaiveDate>,
    items: Json<Vec<LineItem>>,
    labour_transport_cost: Decimal,
    payments: Json<Vec<Payment>>,
    subtotal: Decimal,
    total: Decimal,
    total_paid_amount: Decimal,
    remaining_amount: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TradeInvoiceRow {
    fn into_invoice(self, kind: InvoiceKind) -> AppResult<TradeInvoice> {
        let status = self
            .status
            .parse::<InvoiceStatus>()
            .map_err(AppError::Internal)?;
        Ok(TradeInvoice {
            id: self.id,
            kind,
            invoice_number: self.invoice_number,
            party_id: self.party_id,
            party_name: self.party_name,
            broker_id: self.broker_id,
            broker_name: self.broker_name,
            broker_commission_percentage: self.broker_commission_percentage,
            broker_commission_amount: self.broker_commission_amount,
            invoice_date: self.invoice_date,
            due_date: self.due_date,
            items: self.items.0,
            labour_transport_cost: self.labour_transport_cost,
            payments: self.payments.0,
            subtotal: self.subtotal,
            total: self.total,
            total_paid_amount: self.total_paid_amount,
            remaining_amount: self.remaining_amount,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Input for creating a customer or vendor invoice
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTradeInvoiceInput {
    pub invoice_number: String,
    pub party_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub party_name: String,
    pub broker_id: Option<Uuid>,
    pub broker_commission_percentage: Option<Decimal>,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub labour_transport_cost: Decimal,
    /// Optional payment recorded together with the invoice
    pub initial_payment: Option<Payment>,
}

/// Full replacement of an invoice's editable fields; payments are kept
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTradeInvoiceInput {
    pub party_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub party_name: String,
    pub broker_id: Option<Uuid>,
    pub broker_commission_percentage: Option<Decimal>,
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub labour_transport_cost: Decimal,
}

/// Query filters for listing invoices
#[derive(Debug, Default, Deserialize)]
pub struct ListInvoicesQuery {
    pub party_id: Option<Uuid>,
    pub broker_id: Option<Uuid>,
    pub status: Option<InvoiceStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ListInvoicesQuery {
    pub fn pagination(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
    }
}

/// Field-level checks shared by every invoice variant
pub(crate) fn validate_invoice_fields(
    invoice_number: Option<&str>,
    items: &[LineItem],
    percentage_field: &str,
    percentage: Option<Decimal>,
    labour_transport_cost: Decimal,
) -> AppResult<()> {
    if let Some(number) = invoice_number {
        validate_invoice_number(number).map_err(|msg| AppError::validation("invoice_number", msg))?;
    }
    validate_line_items(items)
        .map_err(|(index, msg)| AppError::validation(&format!("items[{}]", index), msg))?;
    if let Some(pct) = percentage {
        validate_percentage(pct).map_err(|msg| AppError::validation(percentage_field, msg))?;
    }
    validate_non_negative_amount(labour_transport_cost)
        .map_err(|msg| AppError::validation("labour_transport_cost", msg))?;
    Ok(())
}

impl TradeInvoiceService {
    /// Create a new TradeInvoiceService instance
    pub fn new(db: PgPool, book: TradeBook) -> Self {
        let aggregates = AggregateService::new(db.clone());
        Self {
            db,
            book,
            aggregates,
        }
    }

    async fn broker_name(&self, broker_id: Option<Uuid>) -> AppResult<Option<String>> {
        match broker_id {
            Some(id) => Ok(Some(self.aggregates.party_name(PartyKind::Broker, id).await?)),
            None => Ok(None),
        }
    }

    /// Create an invoice and apply its stock effect atomically
    pub async fn create(&self, input: CreateTradeInvoiceInput) -> AppResult<TradeInvoice> {
        input.validate()?;
        validate_invoice_fields(
            Some(input.invoice_number.trim()),
            &input.items,
            "broker_commission_percentage",
            input.broker_commission_percentage,
            input.labour_transport_cost,
        )?;

        let broker_name = self.broker_name(input.broker_id).await?;
        let today = today();
        let now = Utc::now();

        let mut invoice = TradeInvoice {
            id: Uuid::new_v4(),
            kind: self.book.kind(),
            invoice_number: input.invoice_number.trim().to_string(),
            party_id: input.party_id,
            party_name: input.party_name,
            broker_id: input.broker_id,
            broker_name,
            broker_commission_percentage: input.broker_commission_percentage,
            broker_commission_amount: Decimal::ZERO,
            invoice_date: input.invoice_date.unwrap_or(today),
            due_date: input.due_date,
            items: input.items,
            labour_transport_cost: input.labour_transport_cost,
            payments: Vec::new(),
            subtotal: Decimal::ZERO,
            total: Decimal::ZERO,
            total_paid_amount: Decimal::ZERO,
            remaining_amount: Decimal::ZERO,
            status: InvoiceStatus::Unpaid,
            created_at: now,
            updated_at: now,
        };
        invoice.recompute(today);
        if let Some(payment) = input.initial_payment {
            invoice.add_payment(payment, today)?;
        }

        let mut tx = self.db.begin().await?;
        let mut ledger = lock_items(&mut tx, &referenced_items([invoice.items.as_slice()])).await?;
        ledger.apply_invoice(invoice.kind, &invoice.items)?;
        sync_item_names(&mut invoice.items, &ledger);
        write_stock(&mut tx, &ledger).await?;
        insert_invoice(&mut tx, self.book, &invoice).await?;
        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id,
            kind = %invoice.kind,
            invoice_number = %invoice.invoice_number,
            total = %invoice.total,
            status = %invoice.status,
            "Invoice created"
        );

        self.aggregates.refresh(PartyKind::Broker, invoice.broker_id).await;
        Ok(invoice)
    }

    /// Get an invoice by id
    pub async fn get(&self, invoice_id: Uuid) -> AppResult<TradeInvoice> {
        let row = sqlx::query_as::<_, TradeInvoiceRow>(&format!(
            "SELECT {TRADE_INVOICE_COLUMNS} FROM {} WHERE id = $1",
            self.book.table()
        ))
        .bind(invoice_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(self.book.label().to_string()))?;

        row.into_invoice(self.book.kind())
    }

    /// List invoices, newest first
    pub async fn list(&self, query: ListInvoicesQuery) -> AppResult<PaginatedResponse<TradeInvoice>> {
        let pagination = query.pagination();
        let status = query.status.map(|s| s.as_str());
        let filter = "($1::uuid IS NULL OR party_id = $1) \
             AND ($2::uuid IS NULL OR broker_id = $2) \
             AND ($3::text IS NULL OR status = $3)";

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM {} WHERE {filter}",
            self.book.table()
        ))
        .bind(query.party_id)
        .bind(query.broker_id)
        .bind(status)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, TradeInvoiceRow>(&format!(
            r#"
            SELECT {TRADE_INVOICE_COLUMNS} FROM {}
            WHERE {filter}
            ORDER BY invoice_date DESC, created_at DESC
            LIMIT $4 OFFSET $5
            "#,
            self.book.table()
        ))
        .bind(query.party_id)
        .bind(query.broker_id)
        .bind(status)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let data = rows
            .into_iter()
            .map(|row| row.into_invoice(self.book.kind()))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(&pagination, total.max(0) as u64),
        })
    }

    /// Replace an invoice's lines and header, swapping its stock effect
    pub async fn update(
        &self,
        invoice_id: Uuid,
        input: UpdateTradeInvoiceInput,
    ) -> AppResult<TradeInvoice> {
        input.validate()?;
        validate_invoice_fields(
            None,
            &input.items,
            "broker_commission_percentage",
            input.broker_commission_percentage,
            input.labour_transport_cost,
        )?;
        let broker_name = self.broker_name(input.broker_id).await?;
        let today = today();

        let mut tx = self.db.begin().await?;
        let mut invoice = lock_invoice(&mut tx, self.book, invoice_id).await?;
        let previous_broker = invoice.broker_id;
        let old_items = std::mem::replace(&mut invoice.items, input.items);

        invoice.party_id = input.party_id;
        invoice.party_name = input.party_name;
        invoice.broker_id = input.broker_id;
        invoice.broker_name = broker_name;
        invoice.broker_commission_percentage = input.broker_commission_percentage;
        invoice.invoice_date = input.invoice_date;
        invoice.due_date = input.due_date;
        invoice.labour_transport_cost = input.labour_transport_cost;
        invoice.recompute(today);

        if invoice.remaining_amount < Decimal::ZERO {
            return Err(AppError::Overpayment {
                remaining: invoice.total,
                attempted: invoice.total_paid_amount,
                excess: -invoice.remaining_amount,
            });
        }

        let ids = referenced_items([old_items.as_slice(), invoice.items.as_slice()]);
        let mut ledger = lock_items(&mut tx, &ids).await?;
        ledger.replace_invoice(invoice.kind, &old_items, &invoice.items)?;
        sync_item_names(&mut invoice.items, &ledger);
        write_stock(&mut tx, &ledger).await?;
        invoice.updated_at = save_invoice(&mut tx, self.book, &invoice).await?;
        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id,
            kind = %invoice.kind,
            total = %invoice.total,
            status = %invoice.status,
            "Invoice updated"
        );

        self.aggregates
            .refresh_both(PartyKind::Broker, previous_broker, invoice.broker_id)
            .await;
        Ok(invoice)
    }

    /// Delete an invoice and undo its stock effect
    pub async fn delete(&self, invoice_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let invoice = lock_invoice(&mut tx, self.book, invoice_id).await?;
        let mut ledger = lock_items(&mut tx, &referenced_items([invoice.items.as_slice()])).await?;
        ledger.delete_invoice(invoice.kind, &invoice.items)?;
        write_stock(&mut tx, &ledger).await?;

        sqlx::query(&format!("DELETE FROM {} WHERE id = $1", self.book.table()))
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice_id,
            kind = %invoice.kind,
            invoice_number = %invoice.invoice_number,
            "Invoice deleted"
        );

        self.aggregates.refresh(PartyKind::Broker, invoice.broker_id).await;
        Ok(())
    }

    /// Record a payment against the remaining balance
    pub async fn add_payment(&self, invoice_id: Uuid, payment: Payment) -> AppResult<TradeInvoice> {
        let today = today();
        let mut tx = self.db.begin().await?;
        let mut invoice = lock_invoice(&mut tx, self.book, invoice_id).await?;
        invoice.refresh_balance(today);
        invoice.add_payment(payment, today)?;
        invoice.updated_at = save_invoice(&mut tx, self.book, &invoice).await?;
        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id,
            kind = %invoice.kind,
            total_paid = %invoice.total_paid_amount,
            remaining = %invoice.remaining_amount,
            status = %invoice.status,
            "Invoice payment recorded"
        );

        self.aggregates.refresh(PartyKind::Broker, invoice.broker_id).await;
        Ok(invoice)
    }

    /// Change the due date and re-derive the status
    pub async fn set_due_date(
        &self,
        invoice_id: Uuid,
        input: SetDueDateInput,
    ) -> AppResult<TradeInvoice> {
        let mut tx = self.db.begin().await?;
        let mut invoice = lock_invoice(&mut tx, self.book, invoice_id).await?;
        invoice.set_due_date(input.due_date, today());
        invoice.updated_at = save_invoice(&mut tx, self.book, &invoice).await?;
        tx.commit().await?;

        self.aggregates.refresh(PartyKind::Broker, invoice.broker_id).await;
        Ok(invoice)
    }
}

async fn lock_invoice(
    tx: &mut Transaction<'_, Postgres>,
    book: TradeBook,
    invoice_id: Uuid,
) -> AppResult<TradeInvoice> {
    let row = sqlx::query_as::<_, TradeInvoiceRow>(&format!(
        "SELECT {TRADE_INVOICE_COLUMNS} FROM {} WHERE id = $1 FOR UPDATE",
        book.table()
    ))
    .bind(invoice_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound(book.label().to_string()))?;

    row.into_invoice(book.kind())
}

async fn insert_invoice(
    tx: &mut Transaction<'_, Postgres>,
    book: TradeBook,
    invoice: &TradeInvoice,
) -> AppResult<()> {
    sqlx::query(&format!(
        r#"
        INSERT INTO {} (
            id, invoice_number, party_id, party_name,
            broker_id, broker_name, broker_commission_percentage, broker_commission_amount,
            invoice_date, due_date, items, labour_transport_cost, payments,
            subtotal, total, total_paid_amount, remaining_amount, status, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $19)
        "#,
        book.table()
    ))
    .bind(invoice.id)
    .bind(&invoice.invoice_number)
    .bind(invoice.party_id)
    .bind(&invoice.party_name)
    .bind(invoice.broker_id)
    .bind(&invoice.broker_name)
    .bind(invoice.broker_commission_percentage)
    .bind(invoice.broker_commission_amount)
    .bind(invoice.invoice_date)
    .bind(invoice.due_date)
    .bind(Json(&invoice.items))
    .bind(invoice.labour_transport_cost)
    .bind(Json(&invoice.payments))
    .bind(invoice.subtotal)
    .bind(invoice.total)
    .bind(invoice.total_paid_amount)
    .bind(invoice.remaining_amount)
    .bind(invoice.status.as_str())
    .bind(invoice.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::from_unique_violation(e, "invoice_number"))?;
    Ok(())
}

/// Rewrite every stored field of an invoice, returning the new `updated_at`
async fn save_invoice(
    tx: &mut Transaction<'_, Postgres>,
    book: TradeBook,
    invoice: &TradeInvoice,
) -> AppResult<DateTime<Utc>> {
    let updated_at = sqlx::query_scalar::<_, DateTime<Utc>>(&format!(
        r#"
        UPDATE {}
        SET party_id = $2, party_name = $3,
            broker_id = $4, broker_name = $5,
            broker_commission_percentage = $6, broker_commission_amount = $7,
            invoice_date = $8, due_date = $9, items = $10, labour_transport_cost = $11,
            payments = $12, subtotal = $13, total = $14, total_paid_amount = $15,
            remaining_amount = $16, status = $17, updated_at = NOW()
        WHERE id = $1
        RETURNING updated_at
        "#,
        book.table()
    ))
    .bind(invoice.id)
    .bind(invoice.party_id)
    .bind(&invoice.party_name)
    .bind(invoice.broker_id)
    .bind(&invoice.broker_name)
    .bind(invoice.broker_commission_percentage)
    .bind(invoice.broker_commission_amount)
    .bind(invoice.invoice_date)
    .bind(invoice.due_date)
    .bind(Json(&invoice.items))
    .bind(invoice.labour_transport_cost)
    .bind(Json(&invoice.payments))
    .bind(invoice.subtotal)
    .bind(invoice.total)
    .bind(invoice.total_paid_amount)
    .bind(invoice.remaining_amount)
    .bind(invoice.status.as_str())
    .fetch_one(&mut **tx)
    .await?;
    Ok(updated_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Bucket;

    fn line(name: &str) -> LineItem {
        LineItem {
            item_id: None,
            item_name: name.to_string(),
            quantity: Decimal::ONE,
            net_weight: Decimal::from(10),
            gross_weight: Decimal::from(11),
            packaging_cost: Decimal::ZERO,
            unit_price: Decimal::from(5),
            storage_type: Bucket::Shop,
            total_price: Decimal::ZERO,
        }
    }

    #[test]
    fn test_trade_book_maps_to_kind_and_table() {
        assert_eq!(TradeBook::Customer.kind(), InvoiceKind::Customer);
        assert_eq!(TradeBook::Vendor.kind(), InvoiceKind::Vendor);
        assert_eq!(TradeBook::Customer.table(), "customer_invoices");
        assert_eq!(TradeBook::Vendor.table(), "vendor_invoices");
    }

    #[test]
    fn test_validate_invoice_fields_names_the_bad_line() {
        let mut bad = line("");
        bad.item_name.clear();
        let err = validate_invoice_fields(
            Some("INV-1"),
            &[line("Cumin"), bad],
            "broker_commission_percentage",
            None,
            Decimal::ZERO,
        )
        .unwrap_err();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "items[1]"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_invoice_fields_rejects_bad_percentage() {
        let err = validate_invoice_fields(
            None,
            &[line("Cumin")],
            "broker_commission_percentage",
            Some(Decimal::from(120)),
            Decimal::ZERO,
        )
        .unwrap_err();
        match err {
            AppError::Validation { field, .. } => {
                assert_eq!(field, "broker_commission_percentage")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_invoice_fields_rejects_empty_lines() {
        assert!(validate_invoice_fields(None, &[], "p", None, Decimal::ZERO).is_err());
    }

    #[test]
    fn test_list_query_defaults() {
        let p = ListInvoicesQuery::default().pagination();
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, 50);
    }
}
