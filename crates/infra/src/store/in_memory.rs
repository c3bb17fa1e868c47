use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use stockledger_core::{Entity, ProductId, StockId};
use stockledger_stock::{Count, CountLine, Movement, Product, Stock, StockTransaction, Warehouse};

use super::r#trait::{StockStore, StoreError, StoreTransaction};

/// Rows of one entity type keyed by id.
#[derive(Debug, Clone)]
struct Table<E: Entity> {
    rows: BTreeMap<E::Id, E>,
}

impl<E: Entity> Default for Table<E> {
    fn default() -> Self {
        Self { rows: BTreeMap::new() }
    }
}

impl<E> Table<E>
where
    E: Entity + Clone,
{
    fn get(&self, id: E::Id) -> Option<E> {
        self.rows.get(&id).cloned()
    }

    fn filter(&self, mut pred: impl FnMut(&E) -> bool) -> Vec<E> {
        self.rows.values().filter(|row| pred(row)).cloned().collect()
    }

    fn insert_new(&mut self, row: &E, what: &str) -> Result<(), StoreError> {
        let id = row.id();
        if self.rows.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("{what} {id:?}")));
        }
        self.rows.insert(id, row.clone());
        Ok(())
    }

    fn upsert(&mut self, row: &E) {
        self.rows.insert(row.id(), row.clone());
    }

    fn remove_where(&mut self, mut pred: impl FnMut(&E) -> bool) -> u64 {
        let before = self.rows.len();
        self.rows.retain(|_, row| !pred(row));
        (before - self.rows.len()) as u64
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    products: Table<Product>,
    warehouses: Table<Warehouse>,
    stocks: Table<Stock>,
    counts: Table<Count>,
    count_lines: Table<CountLine>,
    movements: Table<Movement>,
    transactions: Table<StockTransaction>,
}

/// In-memory transactional stock store.
///
/// Intended for tests/dev. Transactions are serialized: `begin` waits until
/// the previous transaction commits or is dropped.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStockStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        Ok(Box::new(InMemoryTransaction {
            committed: guard,
            working: None,
        }))
    }
}

/// Copy-on-write view over the committed tables.
///
/// The first write clones the committed tables; `commit` swaps the copy in,
/// dropping discards it.
struct InMemoryTransaction {
    committed: OwnedMutexGuard<Tables>,
    working: Option<Tables>,
}

impl InMemoryTransaction {
    fn read(&self) -> &Tables {
        self.working.as_ref().unwrap_or(&*self.committed)
    }

    fn write(&mut self) -> &mut Tables {
        let committed = &self.committed;
        self.working.get_or_insert_with(|| Tables::clone(committed))
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.read().products.get(id))
    }

    async fn product_by_reference(&mut self, reference: &str) -> Result<Option<Product>, StoreError> {
        Ok(self
            .read()
            .products
            .filter(|p| p.reference == reference)
            .into_iter()
            .next())
    }

    async fn warehouses(&mut self) -> Result<Vec<Warehouse>, StoreError> {
        let mut out = self.read().warehouses.filter(|_| true);
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn stock(&mut self, id: StockId) -> Result<Option<Stock>, StoreError> {
        Ok(self.read().stocks.get(id))
    }

    async fn stocks_for_product(&mut self, product_id: ProductId) -> Result<Vec<Stock>, StoreError> {
        Ok(self.read().stocks.filter(|s| s.product_id == product_id))
    }

    async fn movements_for_product(&mut self, product_id: ProductId) -> Result<Vec<Movement>, StoreError> {
        Ok(self.read().movements.filter(|m| m.product_id == product_id))
    }

    async fn transactions_for_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        Ok(self.read().transactions.filter(|t| t.product_id == product_id))
    }

    async fn count_lines_for_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<(Vec<Count>, Vec<CountLine>), StoreError> {
        let tables = self.read();
        let lines = tables.count_lines.filter(|l| l.product_id == product_id);
        let counts = tables
            .counts
            .filter(|c| lines.iter().any(|l| l.count_id == c.id));
        Ok((counts, lines))
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        let tables = self.write();
        if tables
            .products
            .rows
            .values()
            .any(|p| p.reference == product.reference && p.id != product.id)
        {
            return Err(StoreError::Duplicate(format!("product reference {}", product.reference)));
        }
        tables.products.insert_new(product, "product")
    }

    async fn insert_warehouse(&mut self, warehouse: &Warehouse) -> Result<(), StoreError> {
        self.write().warehouses.insert_new(warehouse, "warehouse")
    }

    async fn record_transaction(&mut self, transaction: &StockTransaction) -> Result<(), StoreError> {
        self.write().transactions.insert_new(transaction, "transaction")
    }

    async fn insert_count(&mut self, count: &Count) -> Result<(), StoreError> {
        self.write().counts.insert_new(count, "count")
    }

    async fn insert_count_line(&mut self, line: &CountLine) -> Result<(), StoreError> {
        let tables = self.write();
        if tables.counts.get(line.count_id).is_none() {
            return Err(StoreError::Backend(format!(
                "count line {} references missing count {}",
                line.id, line.count_id
            )));
        }
        tables.count_lines.insert_new(line, "count line")
    }

    async fn append_movement(&mut self, movement: &Movement) -> Result<(), StoreError> {
        self.write().movements.insert_new(movement, "movement")
    }

    async fn delete_movements_for_product(&mut self, product_id: ProductId) -> Result<u64, StoreError> {
        Ok(self.write().movements.remove_where(|m| m.product_id == product_id))
    }

    async fn save_stock(&mut self, stock: &Stock) -> Result<(), StoreError> {
        let tables = self.write();
        let key = stock.key();
        if tables
            .stocks
            .rows
            .values()
            .any(|s| s.id != stock.id && s.key() == key)
        {
            return Err(StoreError::Duplicate(format!(
                "stock for product {} in warehouse {} ({})",
                key.product_id, key.warehouse_id, key.reference
            )));
        }
        tables.stocks.upsert(stock);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTransaction { mut committed, working } = *self;
        if let Some(working) = working {
            *committed = working;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_core::Quantity;
    use stockledger_stock::StockKey;

    fn stock_for(product: &Product, warehouse: &Warehouse) -> Stock {
        Stock::empty(StockKey::new(product.id, warehouse.id, product.reference.clone()))
    }

    #[tokio::test]
    async fn uncommitted_writes_are_discarded_on_drop() {
        let store = InMemoryStockStore::new();
        let product = Product::new("P001", "Widget");

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_product(&product).await.unwrap();
            assert!(tx.product(product.id).await.unwrap().is_some());
        }

        let mut tx = store.begin().await.unwrap();
        assert!(tx.product(product.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn committed_writes_are_visible_to_later_transactions() {
        let store = InMemoryStockStore::new();
        let product = Product::new("P001", "Widget");

        let mut tx = store.begin().await.unwrap();
        tx.insert_product(&product).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.product_by_reference("P001").await.unwrap(), Some(product));
    }

    #[tokio::test]
    async fn rejects_duplicate_ids_and_stock_keys() {
        let store = InMemoryStockStore::new();
        let product = Product::new("P001", "Widget");
        let warehouse = Warehouse::new("Main");
        let mut tx = store.begin().await.unwrap();

        tx.insert_product(&product).await.unwrap();
        assert!(matches!(
            tx.insert_product(&Product::new("P001", "Clone")).await,
            Err(StoreError::Duplicate(_))
        ));

        let first = stock_for(&product, &warehouse);
        tx.save_stock(&first).await.unwrap();
        let mut again = first.clone();
        again.quantity = Quantity::new(3.0).unwrap();
        tx.save_stock(&again).await.unwrap();

        let clash = stock_for(&product, &warehouse);
        assert!(matches!(tx.save_stock(&clash).await, Err(StoreError::Duplicate(_))));
        assert_eq!(tx.stocks_for_product(product.id).await.unwrap(), vec![again]);
    }

    #[tokio::test]
    async fn count_lines_require_their_count() {
        let store = InMemoryStockStore::new();
        let product = Product::new("P001", "Widget");
        let warehouse = Warehouse::new("Main");
        let stock = stock_for(&product, &warehouse);
        let count = Count::new(warehouse.id, "orphan", chrono::Utc::now());
        let line = CountLine::for_stock(&count, &stock, Quantity::ZERO);

        let mut tx = store.begin().await.unwrap();
        assert!(matches!(tx.insert_count_line(&line).await, Err(StoreError::Backend(_))));

        tx.insert_count(&count).await.unwrap();
        tx.insert_count_line(&line).await.unwrap();
        let (counts, lines) = tx.count_lines_for_product(product.id).await.unwrap();
        assert_eq!(counts, vec![count]);
        assert_eq!(lines, vec![line]);
    }
}
