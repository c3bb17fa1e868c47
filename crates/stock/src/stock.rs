use serde::{Deserialize, Serialize};

use stockledger_core::{Entity, ProductId, Quantity, StockId, WarehouseId};

/// Natural key of a stock row: one row per product, warehouse and reference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub reference: String,
}

impl StockKey {
    pub fn new(product_id: ProductId, warehouse_id: WarehouseId, reference: impl Into<String>) -> Self {
        Self {
            product_id,
            warehouse_id,
            reference: reference.into(),
        }
    }
}

/// Current on-hand quantity for a product in a warehouse.
///
/// Outside of an open transaction `quantity` equals the net sum of the
/// movements recorded for the same [`StockKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    pub id: StockId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub reference: String,
    pub quantity: Quantity,
}

impl Stock {
    /// A new, empty stock row for `key`.
    pub fn empty(key: StockKey) -> Self {
        Self {
            id: StockId::new(),
            product_id: key.product_id,
            warehouse_id: key.warehouse_id,
            reference: key.reference,
            quantity: Quantity::ZERO,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.warehouse_id, self.reference.clone())
    }
}

impl Entity for Stock {
    type Id = StockId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
