//! Commissioner invoice service
//!
//! Same transactional shape as the trade invoices. Deleting also checks that
//! the commissioner would not end up over-paid once this invoice's cut is
//! dropped from their total.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    referenced_items, sum_payments, CommissionerInvoice, InvoiceStatus, LineItem,
    PaginatedResponse, PaginationMeta, PartyKind, Payment,
};
use sqlx::{types::Json, FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use super::aggregate::{commission_total, lock_party};
use super::inventory::{lock_items, write_stock};
use super::invoice::{validate_invoice_fields, ListInvoicesQuery};
use super::{sync_item_names, today, AggregateService};
use crate::error::{AppError, AppResult};

const COMMISSIONER_INVOICE_COLUMNS: &str = "id, invoice_number, commissioner_id, \
     commissioner_name, invoice_date, items, labour_transport_cost, subtotal, total, \
     commissioner_percentage, commissioner_amount, payments, paid_amount, \
     remaining_amount, status, created_at, updated_at";

/// Commissioner invoice service
#[derive(Clone)]
pub struct CommissionerInvoiceService {
    db: PgPool,
    aggregates: AggregateService,
}

#[derive(Debug, FromRow)]
struct CommissionerInvoiceRow {
    id: Uuid,
    invoice_number: String,
    commissioner_id: Uuid,
    commissioner_name: String,
    invoice_date: NaiveDate,
    items: Json<Vec<LineItem>>,
    labour_transport_cost: Decimal,
    subtotal: Decimal,
    total: Decimal,
    commissioner_percentage: Decimal,
    commissioner_amount: Decimal,
    payments: Json<Vec<Payment>>,
    paid_amount: Decimal,
    remaining_amount: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CommissionerInvoiceRow> for CommissionerInvoice {
    type Error = AppError;

    fn try_from(row: CommissionerInvoiceRow) -> AppResult<Self> {
        let status = row
            .status
            .parse::<InvoiceStatus>()
            .map_err(AppError::Internal)?;
        Ok(CommissionerInvoice {
            id: row.id,
            invoice_number: row.invoice_number,
            commissioner_id: row.commissioner_id,
            commissioner_name: row.commissioner_name,
            invoice_date: row.invoice_date,
            items: row.items.0,
            labour_transport_cost: row.labour_transport_cost,
            subtotal: row.subtotal,
            total: row.total,
            commissioner_percentage: row.commissioner_percentage,
            commissioner_amount: row.commissioner_amount,
            payments: row.payments.0,
            paid_amount: row.paid_amount,
            remaining_amount: row.remaining_amount,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Input for creating a commissioner invoice
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommissionerInvoiceInput {
    pub invoice_number: String,
    pub commissioner_id: Uuid,
    pub invoice_date: Option<NaiveDate>,
    #[validate(length(min = 1))]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub labour_transport_cost: Decimal,
    pub commissioner_percentage: Decimal,
    pub initial_payment: Option<Payment>,
}

/// Full replacement of a commissioner invoice; payments are kept
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCommissionerInvoiceInput {
    pub commissioner_id: Uuid,
    pub invoice_date: NaiveDate,
    #[validate(length(min = 1))]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub labour_transport_cost: Decimal,
    pub commissioner_percentage: Decimal,
}

impl CommissionerInvoiceService {
    /// Create a new CommissionerInvoiceService instance
    pub fn new(db: PgPool) -> Self {
        let aggregates = AggregateService::new(db.clone());
        Self { db, aggregates }
    }

    /// Create a commissioner invoice and take its goods out of stock
    pub async fn create(
        &self,
        input: CreateCommissionerInvoiceInput,
    ) -> AppResult<CommissionerInvoice> {
        input.validate()?;
        validate_invoice_fields(
            Some(input.invoice_number.trim()),
            &input.items,
            "commissioner_percentage",
            Some(input.commissioner_percentage),
            input.labour_transport_cost,
        )?;

        let commissioner_name = self
            .aggregates
            .party_name(PartyKind::Commissioner, input.commissioner_id)
            .await?;
        let now = Utc::now();

        let mut invoice = CommissionerInvoice {
            id: Uuid::new_v4(),
            invoice_number: input.invoice_number.trim().to_string(),
            commissioner_id: input.commissioner_id,
            commissioner_name,
            invoice_date: input.invoice_date.unwrap_or_else(today),
            items: input.items,
            labour_transport_cost: input.labour_transport_cost,
            subtotal: Decimal::ZERO,
            total: Decimal::ZERO,
            commissioner_percentage: input.commissioner_percentage,
            commissioner_amount: Decimal::ZERO,
            payments: Vec::new(),
            paid_amount: Decimal::ZERO,
            remaining_amount: Decimal::ZERO,
            status: InvoiceStatus::Unpaid,
            created_at: now,
            updated_at: now,
        };
        invoice.recompute();
        if let Some(payment) = input.initial_payment {
            invoice.add_payment(payment)?;
        }

        let mut tx = self.db.begin().await?;
        let mut ledger = lock_items(&mut tx, &referenced_items([invoice.items.as_slice()])).await?;
        ledger.apply_invoice(CommissionerInvoice::KIND, &invoice.items)?;
        sync_item_names(&mut invoice.items, &ledger);
        write_stock(&mut tx, &ledger).await?;
        insert_invoice(&mut tx, &invoice).await?;
        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            commissioner_id = %invoice.commissioner_id,
            commissioner_amount = %invoice.commissioner_amount,
            "Commissioner invoice created"
        );

        self.aggregates
            .refresh(PartyKind::Commissioner, Some(invoice.commissioner_id))
            .await;
        Ok(invoice)
    }

    pub async fn get(&self, invoice_id: Uuid) -> AppResult<CommissionerInvoice> {
        sqlx::query_as::<_, CommissionerInvoiceRow>(&format!(
            "SELECT {COMMISSIONER_INVOICE_COLUMNS} FROM commissioner_invoices WHERE id = $1"
        ))
        .bind(invoice_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Commissioner invoice".to_string()))?
        .try_into()
    }

    /// List commissioner invoices, newest first; `party_id` filters by commissioner
    pub async fn list(
        &self,
        query: ListInvoicesQuery,
    ) -> AppResult<PaginatedResponse<CommissionerInvoice>> {
        let pagination = query.pagination();
        let status = query.status.map(|s| s.as_str());
        let filter = "($1::uuid IS NULL OR commissioner_id = $1) \
             AND ($2::text IS NULL OR status = $2)";

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM commissioner_invoices WHERE {filter}"
        ))
        .bind(query.party_id)
        .bind(status)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, CommissionerInvoiceRow>(&format!(
            r#"
            SELECT {COMMISSIONER_INVOICE_COLUMNS} FROM commissioner_invoices
            WHERE {filter}
            ORDER BY invoice_date DESC, created_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(query.party_id)
        .bind(status)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let data = rows
            .into_iter()
            .map(CommissionerInvoice::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(&pagination, total.max(0) as u64),
        })
    }

    /// Replace lines and header, swapping the stock effect
    pub async fn update(
        &self,
        invoice_id: Uuid,
        input: UpdateCommissionerInvoiceInput,
    ) -> AppResult<CommissionerInvoice> {
        input.validate()?;
        validate_invoice_fields(
            None,
            &input.items,
            "commissioner_percentage",
            Some(input.commissioner_percentage),
            input.labour_transport_cost,
        )?;
        let commissioner_name = self
            .aggregates
            .party_name(PartyKind::Commissioner, input.commissioner_id)
            .await?;

        let mut tx = self.db.begin().await?;
        let mut invoice = lock_invoice(&mut tx, invoice_id).await?;
        let previous_commissioner = invoice.commissioner_id;
        let old_items = std::mem::replace(&mut invoice.items, input.items);

        invoice.commissioner_id = input.commissioner_id;
        invoice.commissioner_name = commissioner_name;
        invoice.invoice_date = input.invoice_date;
        invoice.labour_transport_cost = input.labour_transport_cost;
        invoice.commissioner_percentage = input.commissioner_percentage;
        invoice.recompute();

        let paid = sum_payments(&invoice.payments);
        if paid > invoice.commissioner_amount {
            return Err(AppError::Overpayment {
                remaining: invoice.commissioner_amount,
                attempted: paid,
                excess: paid - invoice.commissioner_amount,
            });
        }

        let ids = referenced_items([old_items.as_slice(), invoice.items.as_slice()]);
        let mut ledger = lock_items(&mut tx, &ids).await?;
        ledger.replace_invoice(CommissionerInvoice::KIND, &old_items, &invoice.items)?;
        sync_item_names(&mut invoice.items, &ledger);
        write_stock(&mut tx, &ledger).await?;
        invoice.updated_at = save_invoice(&mut tx, &invoice).await?;
        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id,
            commissioner_amount = %invoice.commissioner_amount,
            status = %invoice.status,
            "Commissioner invoice updated"
        );

        self.aggregates
            .refresh_both(
                PartyKind::Commissioner,
                Some(previous_commissioner),
                Some(invoice.commissioner_id),
            )
            .await;
        Ok(invoice)
    }

    /// Delete a commissioner invoice, restoring its goods to stock
    pub async fn delete(&self, invoice_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let invoice = lock_invoice(&mut tx, invoice_id).await?;
        let mut ledger = lock_items(&mut tx, &referenced_items([invoice.items.as_slice()])).await?;
        ledger.delete_invoice(CommissionerInvoice::KIND, &invoice.items)?;

        let mut commissioner =
            lock_party(&mut tx, PartyKind::Commissioner, invoice.commissioner_id).await?;
        let total = commission_total(&mut tx, PartyKind::Commissioner, invoice.commissioner_id).await?;
        commissioner.apply_commission_total(total, today());
        let projected = commissioner.project_without_commission(invoice.commissioner_amount)?;

        write_stock(&mut tx, &ledger).await?;
        sqlx::query("DELETE FROM commissioner_invoices WHERE id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice_id,
            invoice_number = %invoice.invoice_number,
            commissioner_id = %invoice.commissioner_id,
            projected_remaining = %projected,
            "Commissioner invoice deleted"
        );

        self.aggregates
            .refresh(PartyKind::Commissioner, Some(invoice.commissioner_id))
            .await;
        Ok(())
    }

    /// Record a payment against the commissioner's cut
    pub async fn add_payment(
        &self,
        invoice_id: Uuid,
        payment: Payment,
    ) -> AppResult<CommissionerInvoice> {
        let mut tx = self.db.begin().await?;
        let mut invoice = lock_invoice(&mut tx, invoice_id).await?;
        invoice.refresh_balance();
        invoice.add_payment(payment)?;
        invoice.updated_at = save_invoice(&mut tx, &invoice).await?;
        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id,
            paid = %invoice.paid_amount,
            remaining = %invoice.remaining_amount,
            status = %invoice.status,
            "Commissioner invoice payment recorded"
        );

        self.aggregates
            .refresh(PartyKind::Commissioner, Some(invoice.commissioner_id))
            .await;
        Ok(invoice)
    }
}

async fn lock_invoice(
    tx: &mut Transaction<'_, Postgres>,
    invoice_id: Uuid,
) -> AppResult<CommissionerInvoice> {
    sqlx::query_as::<_, CommissionerInvoiceRow>(&format!(
        "SELECT {COMMISSIONER_INVOICE_COLUMNS} FROM commissioner_invoices WHERE id = $1 FOR UPDATE"
    ))
    .bind(invoice_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Commissioner invoice".to_string()))?
    .try_into()
}

async fn insert_invoice(
    tx: &mut Transaction<'_, Postgres>,
    invoice: &CommissionerInvoice,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO commissioner_invoices (
            id, invoice_number, commissioner_id, commissioner_name, invoice_date,
            items, labour_transport_cost, subtotal, total,
            commissioner_percentage, commissioner_amount, payments,
            paid_amount, remaining_amount, status, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $16)
        "#,
    )
    .bind(invoice.id)
    .bind(&invoice.invoice_number)
    .bind(invoice.commissioner_id)
    .bind(&invoice.commissioner_name)
    .bind(invoice.invoice_date)
    .bind(Json(&invoice.items))
    .bind(invoice.labour_transport_cost)
    .bind(invoice.subtotal)
    .bind(invoice.total)
    .bind(invoice.commissioner_percentage)
    .bind(invoice.commissioner_amount)
    .bind(Json(&invoice.payments))
    .bind(invoice.paid_amount)
    .bind(invoice.remaining_amount)
    .bind(invoice.status.as_str())
    .bind(invoice.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::from_unique_violation(e, "invoice_number"))?;
    Ok(())
}

async fn save_invoice(
    tx: &mut Transaction<'_, Postgres>,
    invoice: &CommissionerInvoice,
) -> AppResult<DateTime<Utc>> {
    let updated_at = sqlx::query_scalar::<_, DateTime<Utc>>(
        r#"
        UPDATE commissioner_invoices
        SET commissioner_id = $2, commissioner_name = $3, invoice_date = $4,
            items = $5, labour_transport_cost = $6, subtotal = $7, total = $8,
            commissioner_percentage = $9, commissioner_amount = $10, payments = $11,
            paid_amount = $12, remaining_amount = $13, status = $14, updated_at = NOW()
        WHERE id = $1
        RETURNING updated_at
        "#,
    )
    .bind(invoice.id)
    .bind(invoice.commissioner_id)
    .bind(&invoice.commissioner_name)
    .bind(invoice.invoice_date)
    .bind(Json(&invoice.items))
    .bind(invoice.labour_transport_cost)
    .bind(invoice.subtotal)
    .bind(invoice.total)
    .bind(invoice.commissioner_percentage)
    .bind(invoice.commissioner_amount)
    .bind(Json(&invoice.payments))
    .bind(invoice.paid_amount)
    .bind(invoice.remaining_amount)
    .bind(invoice.status.as_str())
    .fetch_one(&mut **tx)
    .await?;
    Ok(updated_at)
}
