use async_trait::async_trait;
use thiserror::Error;

use stockledger_core::{ProductId, StockId};
use stockledger_stock::{Count, CountLine, Movement, Product, Stock, StockTransaction, Warehouse};

/// Storage operation error.
///
/// These are infrastructure failures (backend down, constraint violations),
/// as opposed to domain errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached or is in a broken state.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A unique constraint would be violated (duplicate id or stock key).
    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// Any other backend failure (query error, decode error, ...).
    #[error("backend error: {0}")]
    Backend(String),
}

/// Transactional store for products, stock and the stock ledger.
///
/// Every read and write goes through a [`StoreTransaction`]. Writes become
/// visible to other transactions only after [`StoreTransaction::commit`];
/// dropping a transaction without committing rolls it back.
#[async_trait]
pub trait StockStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}

/// One open unit of work against a [`StockStore`].
///
/// Implementations must:
/// - make writes atomic (all committed or none)
/// - hide uncommitted writes from other transactions
/// - reject duplicate ids on insert/append and duplicate stock keys on save
#[async_trait]
pub trait StoreTransaction: Send {
    // Lookups.

    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn product_by_reference(&mut self, reference: &str) -> Result<Option<Product>, StoreError>;

    async fn warehouses(&mut self) -> Result<Vec<Warehouse>, StoreError>;

    async fn stock(&mut self, id: StockId) -> Result<Option<Stock>, StoreError>;

    async fn stocks_for_product(&mut self, product_id: ProductId) -> Result<Vec<Stock>, StoreError>;

    async fn movements_for_product(&mut self, product_id: ProductId) -> Result<Vec<Movement>, StoreError>;

    async fn transactions_for_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<Vec<StockTransaction>, StoreError>;

    /// Count lines of a product together with the counts that own them.
    async fn count_lines_for_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<(Vec<Count>, Vec<CountLine>), StoreError>;

    // Catalogue and external history (written by other modules).

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError>;

    async fn insert_warehouse(&mut self, warehouse: &Warehouse) -> Result<(), StoreError>;

    async fn record_transaction(&mut self, transaction: &StockTransaction) -> Result<(), StoreError>;

    // Ledger and stock.

    async fn insert_count(&mut self, count: &Count) -> Result<(), StoreError>;

    async fn insert_count_line(&mut self, line: &CountLine) -> Result<(), StoreError>;

    async fn append_movement(&mut self, movement: &Movement) -> Result<(), StoreError>;

    /// Remove every movement of a product (full ledger rebuild only).
    async fn delete_movements_for_product(&mut self, product_id: ProductId) -> Result<u64, StoreError>;

    /// Insert or overwrite a stock row by id.
    async fn save_stock(&mut self, stock: &Stock) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> StockStore for std::sync::Arc<S>
where
    S: StockStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        (**self).begin().await
    }
}
