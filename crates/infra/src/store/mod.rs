//! Transactional storage for products, stock rows and the stock ledger.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStockStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStockStore;
pub use r#trait::{StockStore, StoreError, StoreTransaction};
