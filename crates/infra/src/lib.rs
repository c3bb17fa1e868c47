//! Infrastructure layer: transactional storage and the stock services built
//! on it (manual changes, ledger rebuilds, notices).

pub mod error;
pub mod mutator;
pub mod notices;
pub mod rebuild;
pub mod store;


pub use error::StockError;
pub use mutator::{MutatorPolicy, StockChange, StockMutator};
pub use notices::{DiscardNotices, Notice, NoticeLevel, NoticeLog, NoticeSink};
pub use rebuild::{MovementListing, ProductRef, RebuildReport, Rebuilder};
pub use store::{InMemoryStockStore, StockStore, StoreError, StoreTransaction};
