//! Stock domain module.
//!
//! Business records for on-hand stock and its ledger (counts, document
//! transactions, movements), plus the pure ledger math used to rebuild them.
//! No IO, no HTTP, no storage.

pub mod count;
pub mod ledger;
pub mod movement;
pub mod product;
pub mod stock;

pub use count::{Count, CountLine};
pub use ledger::{balances, replay_movements};
pub use movement::{Movement, MovementSource, StockTransaction};
pub use product::{Product, Warehouse};
pub use stock::{Stock, StockKey};
