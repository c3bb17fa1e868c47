//! Manual stock adjustments.
//!
//! A manual change is recorded the way a stocktake would be: one `Count`
//! with a single `CountLine` carrying the target quantity. The movement the
//! count implies is appended to the ledger and the stock row is overwritten,
//! all inside one store transaction.
//!
//! ```text
//! set_quantity(stock, qty)
//!   ↓
//! 1. Validate qty (finite, sign policy)
//!   ↓
//! 2. Resolve stock row            -> NotFound, nothing written
//!   ↓
//! 3. Insert Count + CountLine
//!   ↓
//! 4. Append Movement (qty - ledger balance; skipped when they match)
//!   ↓
//! 5. Overwrite Stock.quantity
//!   ↓
//! 6. Commit                       -> any failure rolls back 3..5
//! ```

use chrono::{DateTime, Utc};

use stockledger_core::{Quantity, StockId};
use stockledger_stock::{balances, Count, CountLine, Movement, Stock};

use crate::error::StockError;
use crate::notices::{self, Notice, NoticeSink};
use crate::store::{StockStore, StoreTransaction};

/// Tunables for [`StockMutator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutatorPolicy {
    /// Accept negative target quantities.
    pub allow_negative: bool,
}

/// Outcome of a committed manual change.
#[derive(Debug, Clone, PartialEq)]
pub struct StockChange {
    /// Stock row as committed.
    pub stock: Stock,
    pub previous: Quantity,
    pub count: Count,
    pub line: CountLine,
    /// `None` when the stock already matched the requested quantity.
    pub movement: Option<Movement>,
}

/// Applies manual stock changes.
#[derive(Debug, Clone)]
pub struct StockMutator<S> {
    store: S,
    policy: MutatorPolicy,
}

impl<S> StockMutator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            policy: MutatorPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MutatorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> MutatorPolicy {
        self.policy
    }
}

impl<S> StockMutator<S>
where
    S: StockStore,
{
    /// Set the quantity of one stock row, recording the change in the ledger.
    ///
    /// Emits `record-updated-correctly` on success, or the failure's notice
    /// code as a warning.
    #[tracing::instrument(skip(self, observation, notices), fields(stock = %stock_id))]
    pub async fn set_quantity(
        &self,
        stock_id: StockId,
        new_quantity: f64,
        observation: &str,
        notices: &dyn NoticeSink,
    ) -> Result<StockChange, StockError> {
        let result = self.apply(stock_id, new_quantity, observation, Utc::now()).await;
        match &result {
            Ok(change) => {
                tracing::info!(
                    product = %change.stock.product_id,
                    warehouse = %change.stock.warehouse_id,
                    previous = %change.previous,
                    quantity = %change.stock.quantity,
                    "stock quantity updated"
                );
                notices.emit(Notice::notice(notices::RECORD_UPDATED));
            }
            Err(err) => {
                tracing::warn!(error = %err, "stock change not applied");
                notices.emit(Notice::warning(err.notice_code()));
            }
        }
        result
    }

    async fn apply(
        &self,
        stock_id: StockId,
        new_quantity: f64,
        observation: &str,
        now: DateTime<Utc>,
    ) -> Result<StockChange, StockError> {
        let quantity = Quantity::new(new_quantity)?;
        if quantity.is_negative() && !self.policy.allow_negative {
            return Err(StockError::Validation(format!(
                "negative quantity {quantity} is not allowed"
            )));
        }

        let mut tx = self.store.begin().await?;
        let Some(mut stock) = tx.stock(stock_id).await? else {
            return Err(StockError::NotFound(format!("stock {stock_id}")));
        };

        let key = stock.key();
        let ledger = tx.movements_for_product(stock.product_id).await?;
        let balance = balances(ledger.iter().filter(|m| m.key() == key))?
            .remove(&key)
            .unwrap_or_default();

        let count = Count::new(stock.warehouse_id, observation, now);
        let line = CountLine::for_stock(&count, &stock, quantity);
        tx.insert_count(&count).await?;
        tx.insert_count_line(&line).await?;

        let movement = if balance.approx_eq(quantity) {
            None
        } else {
            let movement = Movement::from_count(&count, &line, balance.delta_to(quantity)?);
            tx.append_movement(&movement).await?;
            Some(movement)
        };

        let previous = stock.quantity;
        stock.quantity = quantity;
        tx.save_stock(&stock).await?;
        tx.commit().await?;

        Ok(StockChange {
            stock,
            previous,
            count,
            line,
            movement,
        })
    }
}
