//! Aggregate recalculator for broker and commissioner ledgers
//!
//! `total_commission` is rebuilt from a full rescan of every invoice that
//! references the party. Triggers: invoice create, update (old and new
//! party), payment, due-date change and delete; party payment append;
//! explicit recalculation.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{InvoiceStatus, Party, PartyKind, Payment};
use sqlx::{types::Json, FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{today, SetDueDateInput};
use crate::error::{AppError, AppResult};

const PARTY_COLUMNS: &str = "id, name, payments, total_commission, total_paid, \
     total_remaining, status, due_date, created_at, updated_at";

fn party_table(kind: PartyKind) -> &'static str {
    match kind {
        PartyKind::Broker => "brokers",
        PartyKind::Commissioner => "commissioners",
    }
}

fn party_label(kind: PartyKind) -> &'static str {
    match kind {
        PartyKind::Broker => "Broker",
        PartyKind::Commissioner => "Commissioner",
    }
}

/// Service that owns the derived totals of broker and commissioner ledgers
#[derive(Clone)]
pub struct AggregateService {
    db: PgPool,
}

/// Row for party queries
#[derive(Debug, FromRow)]
struct PartyRow {
    id: Uuid,
    name: String,
    payments: Json<Vec<Payment>>,
    total_commission: Decimal,
    total_paid: Decimal,
    total_remaining: Decimal,
    status: String,
    due_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PartyRow {
    fn into_party(self, kind: PartyKind) -> AppResult<Party> {
        let status = self
            .status
            .parse::<InvoiceStatus>()
            .map_err(AppError::Internal)?;
        Ok(Party {
            id: self.id,
            kind,
            name: self.name,
            payments: self.payments.0,
            total_commission: self.total_commission,
            total_paid: self.total_paid,
            total_remaining: self.total_remaining,
            status,
            due_date: self.due_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl AggregateService {
    /// Create a new AggregateService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get a broker or commissioner
    pub async fn get_party(&self, kind: PartyKind, party_id: Uuid) -> AppResult<Party> {
        let row = sqlx::query_as::<_, PartyRow>(&format!(
            "SELECT {PARTY_COLUMNS} FROM {} WHERE id = $1",
            party_table(kind)
        ))
        .bind(party_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(party_label(kind).to_string()))?;

        row.into_party(kind)
    }

    /// Rebuild a party's totals from every invoice that references it
    pub async fn recalculate(&self, kind: PartyKind, party_id: Uuid) -> AppResult<Party> {
        let mut tx = self.db.begin().await?;
        let mut party = lock_party(&mut tx, kind, party_id).await?;
        let total = commission_total(&mut tx, kind, party_id).await?;
        party.apply_commission_total(total, today());
        save_party(&mut tx, &party).await?;
        tx.commit().await?;

        tracing::info!(
            party = %kind,
            party_id = %party_id,
            total_commission = %party.total_commission,
            total_paid = %party.total_paid,
            total_remaining = %party.total_remaining,
            "Party totals recalculated"
        );
        Ok(party)
    }

    /// Recalculate without failing the caller; the totals are a cache and a
    /// later recalculation repairs them
    pub async fn refresh(&self, kind: PartyKind, party_id: Option<Uuid>) {
        let Some(party_id) = party_id else {
            return;
        };
        if let Err(e) = self.recalculate(kind, party_id).await {
            tracing::error!(
                party = %kind,
                party_id = %party_id,
                "Failed to refresh party totals: {}",
                e
            );
        }
    }

    /// Refresh the party referenced before and, if different, after an edit
    pub async fn refresh_both(&self, kind: PartyKind, before: Option<Uuid>, after: Option<Uuid>) {
        self.refresh(kind, before).await;
        if after != before {
            self.refresh(kind, after).await;
        }
    }

    /// Append a payment to a party's ledger
    pub async fn add_payment(
        &self,
        kind: PartyKind,
        party_id: Uuid,
        payment: Payment,
    ) -> AppResult<Party> {
        let mut tx = self.db.begin().await?;
        let mut party = lock_party(&mut tx, kind, party_id).await?;
        let total = commission_total(&mut tx, kind, party_id).await?;
        party.apply_commission_total(total, today());
        party.add_payment(payment, today())?;
        save_party(&mut tx, &party).await?;
        tx.commit().await?;

        tracing::info!(
            party = %kind,
            party_id = %party_id,
            total_paid = %party.total_paid,
            "Party payment recorded"
        );
        Ok(party)
    }

    /// Change a party's due date
    pub async fn set_due_date(
        &self,
        kind: PartyKind,
        party_id: Uuid,
        input: SetDueDateInput,
    ) -> AppResult<Party> {
        let mut tx = self.db.begin().await?;
        let mut party = lock_party(&mut tx, kind, party_id).await?;
        party.set_due_date(input.due_date, today());
        save_party(&mut tx, &party).await?;
        tx.commit().await?;
        Ok(party)
    }

    /// Look up a party's name for denormalizing onto an invoice
    pub async fn party_name(&self, kind: PartyKind, party_id: Uuid) -> AppResult<String> {
        sqlx::query_scalar::<_, String>(&format!(
            "SELECT name FROM {} WHERE id = $1",
            party_table(kind)
        ))
        .bind(party_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(party_label(kind).to_string()))
    }
}

/// Lock a party row for the rest of the transaction
pub async fn lock_party(
    tx: &mut Transaction<'_, Postgres>,
    kind: PartyKind,
    party_id: Uuid,
) -> AppResult<Party> {
    let row = sqlx::query_as::<_, PartyRow>(&format!(
        "SELECT {PARTY_COLUMNS} FROM {} WHERE id = $1 FOR UPDATE",
        party_table(kind)
    ))
    .bind(party_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound(party_label(kind).to_string()))?;

    row.into_party(kind)
}

/// Σ commission over every invoice that references the party
pub async fn commission_total(
    tx: &mut Transaction<'_, Postgres>,
    kind: PartyKind,
    party_id: Uuid,
) -> AppResult<Decimal> {
    let query = match kind {
        PartyKind::Broker => {
            r#"
            SELECT COALESCE(SUM(amount), 0) FROM (
                SELECT broker_commission_amount AS amount FROM customer_invoices WHERE broker_id = $1
                UNION ALL
                SELECT broker_commission_amount AS amount FROM vendor_invoices WHERE broker_id = $1
            ) AS commissions
            "#
        }
        PartyKind::Commissioner => {
            "SELECT COALESCE(SUM(commissioner_amount), 0) FROM commissioner_invoices WHERE commissioner_id = $1"
        }
    };

    let total = sqlx::query_scalar::<_, Decimal>(query)
        .bind(party_id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(total)
}

/// Persist a party's payments and derived totals
pub async fn save_party(tx: &mut Transaction<'_, Postgres>, party: &Party) -> AppResult<()> {
    sqlx::query(&format!(
        r#"
        UPDATE {}
        SET payments = $2, total_commission = $3, total_paid = $4, total_remaining = $5,
            status = $6, due_date = $7, updated_at = NOW()
        WHERE id = $1
        "#,
        party_table(party.kind)
    ))
    .bind(party.id)
    .bind(Json(&party.payments))
    .bind(party.total_commission)
    .bind(party.total_paid)
    .bind(party.total_remaining)
    .bind(party.status.as_str())
    .bind(party.due_date)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
