use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{
    CountId, CountLineId, Entity, MovementId, ProductId, Quantity, TransactionId, WarehouseId,
};

use crate::count::{Count, CountLine};
use crate::stock::StockKey;

/// Record a movement was derived from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MovementSource {
    /// A line of a stocktaking event.
    Count { count_id: CountId, line_id: CountLineId },
    /// A document line from the external transaction log.
    Transaction { transaction_id: TransactionId },
}

/// Append-only ledger entry: a signed quantity delta for one stock key.
///
/// Movement ids are derived from the source record id, so regenerating the
/// ledger from the same history yields the same rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub reference: String,
    pub occurred_at: DateTime<Utc>,
    /// Human-readable document label (e.g. `count 0190...` or `DN-2024-0001`).
    pub document: String,
    pub source: MovementSource,
    pub quantity: Quantity,
}

impl Movement {
    /// Movement produced by a count line that moved the balance by `delta`.
    pub fn from_count(count: &Count, line: &CountLine, delta: Quantity) -> Self {
        Self {
            id: MovementId::from_uuid(*line.id.as_uuid()),
            product_id: line.product_id,
            warehouse_id: count.warehouse_id,
            reference: line.reference.clone(),
            occurred_at: count.created_at,
            document: format!("count {}", count.id),
            source: MovementSource::Count {
                count_id: count.id,
                line_id: line.id,
            },
            quantity: delta,
        }
    }

    /// Movement mirroring an external transaction one-to-one.
    pub fn from_transaction(tx: &StockTransaction) -> Self {
        Self {
            id: MovementId::from_uuid(*tx.id.as_uuid()),
            product_id: tx.product_id,
            warehouse_id: tx.warehouse_id,
            reference: tx.reference.clone(),
            occurred_at: tx.occurred_at,
            document: tx.document.clone(),
            source: MovementSource::Transaction {
                transaction_id: tx.id,
            },
            quantity: tx.quantity,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.warehouse_id, self.reference.clone())
    }

    pub fn date(&self) -> NaiveDate {
        self.occurred_at.date_naive()
    }

    pub fn time(&self) -> NaiveTime {
        self.occurred_at.time()
    }
}

impl Entity for Movement {
    type Id = MovementId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// A stock-affecting document line (delivery note, invoice, transfer...).
///
/// These are written by other modules; this crate only reads them when
/// regenerating movements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockTransaction {
    pub id: TransactionId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub reference: String,
    pub document: String,
    pub occurred_at: DateTime<Utc>,
    /// Signed delta (positive for receipts, negative for issues).
    pub quantity: Quantity,
}

impl StockTransaction {
    pub fn new(
        key: StockKey,
        document: impl Into<String>,
        occurred_at: DateTime<Utc>,
        quantity: Quantity,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            product_id: key.product_id,
            warehouse_id: key.warehouse_id,
            reference: key.reference,
            document: document.into(),
            occurred_at,
            quantity,
        }
    }
}

impl Entity for StockTransaction {
    type Id = TransactionId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
