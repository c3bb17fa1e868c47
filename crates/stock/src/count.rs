use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{CountId, CountLineId, Entity, ProductId, Quantity, WarehouseId};

use crate::stock::{Stock, StockKey};

/// A stocktaking event: someone observed (or decided) the real quantity of
/// one or more products in a warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Count {
    pub id: CountId,
    pub warehouse_id: WarehouseId,
    pub observations: String,
    pub created_at: DateTime<Utc>,
}

impl Count {
    pub fn new(warehouse_id: WarehouseId, observations: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: CountId::new(),
            warehouse_id,
            observations: observations.into(),
            created_at,
        }
    }
}

impl Entity for Count {
    type Id = CountId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Counted quantity of one product reference within a [`Count`].
///
/// Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountLine {
    pub id: CountLineId,
    pub count_id: CountId,
    pub product_id: ProductId,
    pub reference: String,
    pub quantity: Quantity,
}

impl CountLine {
    /// Line recording `quantity` for the product/reference of `stock`.
    pub fn for_stock(count: &Count, stock: &Stock, quantity: Quantity) -> Self {
        Self {
            id: CountLineId::new(),
            count_id: count.id,
            product_id: stock.product_id,
            reference: stock.reference.clone(),
            quantity,
        }
    }

    /// Stock key this line counts, given the count it belongs to.
    pub fn key(&self, count: &Count) -> StockKey {
        StockKey::new(self.product_id, count.warehouse_id, self.reference.clone())
    }
}

impl Entity for CountLine {
    type Id = CountLineId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
