//! Postgres-backed stock store.
//!
//! Each [`StoreTransaction`] wraps one `sqlx` transaction, so atomicity and
//! isolation (read committed) come from the database. Dropping the
//! transaction without committing rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use stockledger_core::{
    CountId, CountLineId, MovementId, ProductId, Quantity, StockId, TransactionId, WarehouseId,
};
use stockledger_stock::{
    Count, CountLine, Movement, MovementSource, Product, Stock, StockTransaction, Warehouse,
};

use super::r#trait::{StockStore, StoreError, StoreTransaction};

/// Tables used by [`PostgresStockStore`].
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id          UUID PRIMARY KEY,
    reference   TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS warehouses (
    id   UUID PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS stocks (
    id           UUID PRIMARY KEY,
    product_id   UUID NOT NULL REFERENCES products (id),
    warehouse_id UUID NOT NULL REFERENCES warehouses (id),
    reference    TEXT NOT NULL,
    quantity     DOUBLE PRECISION NOT NULL,
    UNIQUE (product_id, warehouse_id, reference)
);

CREATE TABLE IF NOT EXISTS stock_counts (
    id           UUID PRIMARY KEY,
    warehouse_id UUID NOT NULL REFERENCES warehouses (id),
    observations TEXT NOT NULL,
    created_at   TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS stock_count_lines (
    id         UUID PRIMARY KEY,
    count_id   UUID NOT NULL REFERENCES stock_counts (id),
    product_id UUID NOT NULL REFERENCES products (id),
    reference  TEXT NOT NULL,
    quantity   DOUBLE PRECISION NOT NULL
);

CREATE TABLE IF NOT EXISTS stock_transactions (
    id           UUID PRIMARY KEY,
    product_id   UUID NOT NULL REFERENCES products (id),
    warehouse_id UUID NOT NULL REFERENCES warehouses (id),
    reference    TEXT NOT NULL,
    document     TEXT NOT NULL,
    occurred_at  TIMESTAMPTZ NOT NULL,
    quantity     DOUBLE PRECISION NOT NULL
);

CREATE TABLE IF NOT EXISTS stock_movements (
    id             UUID PRIMARY KEY,
    product_id     UUID NOT NULL REFERENCES products (id),
    warehouse_id   UUID NOT NULL REFERENCES warehouses (id),
    reference      TEXT NOT NULL,
    occurred_at    TIMESTAMPTZ NOT NULL,
    document       TEXT NOT NULL,
    source_kind    TEXT NOT NULL,
    source_id      UUID NOT NULL,
    source_line_id UUID,
    quantity       DOUBLE PRECISION NOT NULL
);

CREATE INDEX IF NOT EXISTS stock_movements_product_idx ON stock_movements (product_id);
"#;

/// Postgres-backed [`StockStore`].
#[derive(Debug, Clone)]
pub struct PostgresStockStore {
    pool: PgPool,
}

impl PostgresStockStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create missing tables.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }
}

#[async_trait]
impl StockStore for PostgresStockStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self.pool.begin().await.map_err(map_err)?;
        Ok(Box::new(PostgresTransaction { tx }))
    }
}

struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

fn map_err(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate(db.message().to_string()),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(e.to_string())
        }
        _ => StoreError::Backend(e.to_string()),
    }
}

fn quantity(row: &PgRow, column: &str) -> Result<Quantity, StoreError> {
    let raw: f64 = row.try_get(column).map_err(map_err)?;
    Quantity::new(raw).map_err(|e| StoreError::Backend(format!("{column}: {e}")))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get("id").map_err(map_err)?),
        reference: row.try_get("reference").map_err(map_err)?,
        description: row.try_get("description").map_err(map_err)?,
    })
}

fn stock_from_row(row: &PgRow) -> Result<Stock, StoreError> {
    Ok(Stock {
        id: StockId::from_uuid(row.try_get("id").map_err(map_err)?),
        product_id: ProductId::from_uuid(row.try_get("product_id").map_err(map_err)?),
        warehouse_id: WarehouseId::from_uuid(row.try_get("warehouse_id").map_err(map_err)?),
        reference: row.try_get("reference").map_err(map_err)?,
        quantity: quantity(row, "quantity")?,
    })
}

fn movement_from_row(row: &PgRow) -> Result<Movement, StoreError> {
    let kind: String = row.try_get("source_kind").map_err(map_err)?;
    let source_id: Uuid = row.try_get("source_id").map_err(map_err)?;
    let source_line_id: Option<Uuid> = row.try_get("source_line_id").map_err(map_err)?;
    let source = match (kind.as_str(), source_line_id) {
        ("count", Some(line_id)) => MovementSource::Count {
            count_id: CountId::from_uuid(source_id),
            line_id: CountLineId::from_uuid(line_id),
        },
        ("transaction", _) => MovementSource::Transaction {
            transaction_id: TransactionId::from_uuid(source_id),
        },
        _ => return Err(StoreError::Backend(format!("unknown movement source '{kind}'"))),
    };

    Ok(Movement {
        id: MovementId::from_uuid(row.try_get("id").map_err(map_err)?),
        product_id: ProductId::from_uuid(row.try_get("product_id").map_err(map_err)?),
        warehouse_id: WarehouseId::from_uuid(row.try_get("warehouse_id").map_err(map_err)?),
        reference: row.try_get("reference").map_err(map_err)?,
        occurred_at: row.try_get::<DateTime<Utc>, _>("occurred_at").map_err(map_err)?,
        document: row.try_get("document").map_err(map_err)?,
        source,
        quantity: quantity(row, "quantity")?,
    })
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query("SELECT id, reference, description FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_err)?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn product_by_reference(&mut self, reference: &str) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query("SELECT id, reference, description FROM products WHERE reference = $1")
            .bind(reference)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_err)?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn warehouses(&mut self) -> Result<Vec<Warehouse>, StoreError> {
        let rows = sqlx::query("SELECT id, name FROM warehouses ORDER BY name")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_err)?;
        rows.iter()
            .map(|row| {
                Ok(Warehouse {
                    id: WarehouseId::from_uuid(row.try_get("id").map_err(map_err)?),
                    name: row.try_get("name").map_err(map_err)?,
                })
            })
            .collect()
    }

    async fn stock(&mut self, id: StockId) -> Result<Option<Stock>, StoreError> {
        let row = sqlx::query(
            "SELECT id, product_id, warehouse_id, reference, quantity FROM stocks WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_err)?;
        row.as_ref().map(stock_from_row).transpose()
    }

    async fn stocks_for_product(&mut self, product_id: ProductId) -> Result<Vec<Stock>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, product_id, warehouse_id, reference, quantity FROM stocks WHERE product_id = $1",
        )
        .bind(product_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_err)?;
        rows.iter().map(stock_from_row).collect()
    }

    async fn movements_for_product(&mut self, product_id: ProductId) -> Result<Vec<Movement>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, warehouse_id, reference, occurred_at, document,
                   source_kind, source_id, source_line_id, quantity
            FROM stock_movements
            WHERE product_id = $1
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_err)?;
        rows.iter().map(movement_from_row).collect()
    }

    async fn transactions_for_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, warehouse_id, reference, document, occurred_at, quantity
            FROM stock_transactions
            WHERE product_id = $1
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_err)?;
        rows.iter()
            .map(|row| {
                Ok(StockTransaction {
                    id: TransactionId::from_uuid(row.try_get("id").map_err(map_err)?),
                    product_id: ProductId::from_uuid(row.try_get("product_id").map_err(map_err)?),
                    warehouse_id: WarehouseId::from_uuid(row.try_get("warehouse_id").map_err(map_err)?),
                    reference: row.try_get("reference").map_err(map_err)?,
                    document: row.try_get("document").map_err(map_err)?,
                    occurred_at: row.try_get("occurred_at").map_err(map_err)?,
                    quantity: quantity(row, "quantity")?,
                })
            })
            .collect()
    }

    async fn count_lines_for_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<(Vec<Count>, Vec<CountLine>), StoreError> {
        let line_rows = sqlx::query(
            "SELECT id, count_id, product_id, reference, quantity FROM stock_count_lines WHERE product_id = $1",
        )
        .bind(product_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_err)?;
        let lines = line_rows
            .iter()
            .map(|row| {
                Ok(CountLine {
                    id: CountLineId::from_uuid(row.try_get("id").map_err(map_err)?),
                    count_id: CountId::from_uuid(row.try_get("count_id").map_err(map_err)?),
                    product_id: ProductId::from_uuid(row.try_get("product_id").map_err(map_err)?),
                    reference: row.try_get("reference").map_err(map_err)?,
                    quantity: quantity(row, "quantity")?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let count_rows = sqlx::query(
            r#"
            SELECT DISTINCT c.id, c.warehouse_id, c.observations, c.created_at
            FROM stock_counts c
            JOIN stock_count_lines l ON l.count_id = c.id
            WHERE l.product_id = $1
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_err)?;
        let counts = count_rows
            .iter()
            .map(|row| {
                Ok(Count {
                    id: CountId::from_uuid(row.try_get("id").map_err(map_err)?),
                    warehouse_id: WarehouseId::from_uuid(row.try_get("warehouse_id").map_err(map_err)?),
                    observations: row.try_get("observations").map_err(map_err)?,
                    created_at: row.try_get("created_at").map_err(map_err)?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok((counts, lines))
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO products (id, reference, description) VALUES ($1, $2, $3)")
            .bind(product.id.as_uuid())
            .bind(&product.reference)
            .bind(&product.description)
            .execute(&mut *self.tx)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn insert_warehouse(&mut self, warehouse: &Warehouse) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO warehouses (id, name) VALUES ($1, $2)")
            .bind(warehouse.id.as_uuid())
            .bind(&warehouse.name)
            .execute(&mut *self.tx)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn record_transaction(&mut self, transaction: &StockTransaction) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stock_transactions
                (id, product_id, warehouse_id, reference, document, occurred_at, quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(transaction.id.as_uuid())
        .bind(transaction.product_id.as_uuid())
        .bind(transaction.warehouse_id.as_uuid())
        .bind(&transaction.reference)
        .bind(&transaction.document)
        .bind(transaction.occurred_at)
        .bind(transaction.quantity.value())
        .execute(&mut *self.tx)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn insert_count(&mut self, count: &Count) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO stock_counts (id, warehouse_id, observations, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(count.id.as_uuid())
        .bind(count.warehouse_id.as_uuid())
        .bind(&count.observations)
        .bind(count.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn insert_count_line(&mut self, line: &CountLine) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stock_count_lines (id, count_id, product_id, reference, quantity)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(line.id.as_uuid())
        .bind(line.count_id.as_uuid())
        .bind(line.product_id.as_uuid())
        .bind(&line.reference)
        .bind(line.quantity.value())
        .execute(&mut *self.tx)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn append_movement(&mut self, movement: &Movement) -> Result<(), StoreError> {
        let (kind, source_id, source_line_id) = match movement.source {
            MovementSource::Count { count_id, line_id } => {
                ("count", *count_id.as_uuid(), Some(*line_id.as_uuid()))
            }
            MovementSource::Transaction { transaction_id } => {
                ("transaction", *transaction_id.as_uuid(), None)
            }
        };

        sqlx::query(
            r#"
            INSERT INTO stock_movements
                (id, product_id, warehouse_id, reference, occurred_at, document,
                 source_kind, source_id, source_line_id, quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(movement.product_id.as_uuid())
        .bind(movement.warehouse_id.as_uuid())
        .bind(&movement.reference)
        .bind(movement.occurred_at)
        .bind(&movement.document)
        .bind(kind)
        .bind(source_id)
        .bind(source_line_id)
        .bind(movement.quantity.value())
        .execute(&mut *self.tx)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn delete_movements_for_product(&mut self, product_id: ProductId) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM stock_movements WHERE product_id = $1")
            .bind(product_id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(map_err)?;
        Ok(result.rows_affected())
    }

    async fn save_stock(&mut self, stock: &Stock) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stocks (id, product_id, warehouse_id, reference, quantity)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id)
            DO UPDATE SET
                product_id = EXCLUDED.product_id,
                warehouse_id = EXCLUDED.warehouse_id,
                reference = EXCLUDED.reference,
                quantity = EXCLUDED.quantity
            "#,
        )
        .bind(stock.id.as_uuid())
        .bind(stock.product_id.as_uuid())
        .bind(stock.warehouse_id.as_uuid())
        .bind(&stock.reference)
        .bind(stock.quantity.value())
        .execute(&mut *self.tx)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        this.tx.commit().await.map_err(map_err)
    }
}
