//! Inventory store: item registry and transactional stock access
//!
//! Stock is only ever changed inside a transaction that first locks the
//! touched item rows (`FOR UPDATE`, ordered by id), plans the change in a
//! [`StockLedger`] and writes the resulting levels back.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    is_plausible_weight, next_item_number, validate_stock_levels, Bucket, Item, ItemStock,
    StockLedger, StockLevels,
};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

const ITEM_COLUMNS: &str = "id, item_number, name, \
     shop_quantity, shop_net_weight, shop_gross_weight, \
     cold_quantity, cold_net_weight, cold_gross_weight, \
     created_at, updated_at";

/// Inventory service for items and their shop/cold stock
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
}

/// Row for item queries
#[derive(Debug, FromRow)]
struct ItemRow {
    id: Uuid,
    item_number: i32,
    name: String,
    shop_quantity: Decimal,
    shop_net_weight: Decimal,
    shop_gross_weight: Decimal,
    cold_quantity: Decimal,
    cold_net_weight: Decimal,
    cold_gross_weight: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            stock: ItemStock {
                id: row.id,
                item_number: row.item_number,
                name: row.name,
                shop: StockLevels::new(row.shop_quantity, row.shop_net_weight, row.shop_gross_weight),
                cold: StockLevels::new(row.cold_quantity, row.cold_net_weight, row.cold_gross_weight),
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Input for creating an item
#[derive(Debug, Deserialize, Validate)]
pub struct CreateItemInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub shop: Option<StockLevels>,
    pub cold: Option<StockLevels>,
}

/// Input for moving stock between buckets
#[derive(Debug, Deserialize)]
pub struct TransferInput {
    pub from: Bucket,
    pub to: Bucket,
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub net_weight: Decimal,
    #[serde(default)]
    pub gross_weight: Decimal,
}

impl TransferInput {
    fn amount(&self) -> StockLevels {
        StockLevels::new(self.quantity, self.net_weight, self.gross_weight)
    }
}

impl InventoryService {
    /// Create a new InventoryService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create an item, allocating the lowest free 5-digit item number
    pub async fn create_item(&self, input: CreateItemInput) -> AppResult<Item> {
        input.validate()?;
        let name = input.name.trim().to_string();
        let shop = input.shop.unwrap_or_default();
        let cold = input.cold.unwrap_or_default();

        for (field, levels) in [("shop", &shop), ("cold", &cold)] {
            validate_stock_levels(levels).map_err(|msg| AppError::validation(field, msg))?;
            if !is_plausible_weight(levels) {
                tracing::warn!(item = %name, bucket = field, "Gross weight is below net weight");
            }
        }

        let mut tx = self.db.begin().await?;

        // Concurrent creates must not probe the same free number
        sqlx::query("LOCK TABLE items IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let taken: HashSet<i32> = sqlx::query_scalar::<_, i32>("SELECT item_number FROM items")
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .collect();

        let item_number = next_item_number(&taken).ok_or_else(|| AppError::Conflict {
            resource: "item_number".to_string(),
            message: "No free 5-digit item number is left".to_string(),
        })?;

        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            INSERT INTO items (
                item_number, name,
                shop_quantity, shop_net_weight, shop_gross_weight,
                cold_quantity, cold_net_weight, cold_gross_weight
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(item_number)
        .bind(&name)
        .bind(shop.quantity)
        .bind(shop.net_weight)
        .bind(shop.gross_weight)
        .bind(cold.quantity)
        .bind(cold.net_weight)
        .bind(cold.gross_weight)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "name"))?;

        tx.commit().await?;

        tracing::info!(item_id = %row.id, item_number, name = %name, "Item created");
        Ok(row.into())
    }

    /// Get an item by id
    pub async fn get_item(&self, item_id: Uuid) -> AppResult<Item> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"
        ))
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Item".to_string()))?;

        Ok(row.into())
    }

    /// List all items ordered by item number
    pub async fn list_items(&self) -> AppResult<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items ORDER BY item_number"
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Item::from).collect())
    }

    /// Move stock from one bucket of an item to the other
    pub async fn transfer(&self, item_id: Uuid, input: TransferInput) -> AppResult<Item> {
        if input.from == input.to {
            return Err(AppError::ValidationError(
                "Transfer source and destination must differ".to_string(),
            ));
        }
        let amount = input.amount();
        validate_stock_levels(&amount).map_err(|msg| AppError::validation("quantity", msg))?;
        if amount.is_zero() {
            return Err(AppError::validation(
                "quantity",
                "Transfer must move a quantity or weight",
            ));
        }

        let mut tx = self.db.begin().await?;
        let mut ledger = lock_items(&mut tx, &BTreeSet::from([item_id])).await?;
        ledger.transfer(item_id, input.from, input.to, &amount)?;
        write_stock(&mut tx, &ledger).await?;
        tx.commit().await?;

        tracing::info!(
            item_id = %item_id,
            from = %input.from,
            to = %input.to,
            quantity = %amount.quantity,
            "Stock transferred"
        );

        self.get_item(item_id).await
    }
}

/// Lock the given items for the rest of the transaction and load their stock
pub async fn lock_items(
    tx: &mut Transaction<'_, Postgres>,
    ids: &BTreeSet<Uuid>,
) -> AppResult<StockLedger> {
    if ids.is_empty() {
        return Ok(StockLedger::default());
    }

    let wanted: Vec<Uuid> = ids.iter().copied().collect();
    let rows = sqlx::query_as::<_, ItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM items WHERE id = ANY($1) ORDER BY id FOR UPDATE"
    ))
    .bind(&wanted)
    .fetch_all(&mut **tx)
    .await?;

    if rows.len() != wanted.len() {
        let found: HashSet<Uuid> = rows.iter().map(|r| r.id).collect();
        if let Some(missing) = wanted.iter().find(|id| !found.contains(id)) {
            return Err(AppError::NotFound(format!("Item {}", missing)));
        }
    }

    Ok(StockLedger::new(rows.into_iter().map(|row| Item::from(row).stock)))
}

/// Write every item held by the ledger back to the database
pub async fn write_stock(tx: &mut Transaction<'_, Postgres>, ledger: &StockLedger) -> AppResult<()> {
    for item in ledger.items() {
        sqlx::query(
            r#"
            UPDATE items
            SET shop_quantity = $2, shop_net_weight = $3, shop_gross_weight = $4,
                cold_quantity = $5, cold_net_weight = $6, cold_gross_weight = $7,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(item.id)
        .bind(item.shop.quantity)
        .bind(item.shop.net_weight)
        .bind(item.shop.gross_weight)
        .bind(item.cold.quantity)
        .bind(item.cold.net_weight)
        .bind(item.cold.gross_weight)
        .execute(&mut **tx)
        .await?;

        tracing::debug!(
            item_id = %item.id,
            item_number = item.item_number,
            shop_quantity = %item.shop.quantity,
            cold_quantity = %item.cold.quantity,
            "Stock written"
        );
    }
    Ok(())
}
