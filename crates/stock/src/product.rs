use serde::{Deserialize, Serialize};

use stockledger_core::{Entity, ProductId, WarehouseId};

/// A product whose stock is tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Reference code (SKU-like, e.g. `P001`).
    pub reference: String,
    pub description: String,
}

impl Product {
    pub fn new(reference: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: ProductId::new(),
            reference: reference.into(),
            description: description.into(),
        }
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// A warehouse holding stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
}

impl Warehouse {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: WarehouseId::new(),
            name: name.into(),
        }
    }
}

impl Entity for Warehouse {
    type Id = WarehouseId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
