//! Ledger maintenance: regenerate a product's movements from its history and
//! recompute its stock rows from the movements.
//!
//! Both rebuilds are restricted to principals holding `stock.rebuild`, run in
//! a single store transaction and are idempotent. A product that cannot be
//! resolved is skipped without error.

use core::str::FromStr;
use stockledger_auth::{authorize, Permission, Principal};
use stockledger_core::{DomainError, ProductId, Quantity};
use stockledger_stock::{balances, replay_movements, Movement, Product, Stock};

use crate::error::StockError;
use crate::notices::{self, Notice, NoticeSink};
use crate::store::{StockStore, StoreError, StoreTransaction};

/// How a product is addressed by a caller: internal id or reference code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductRef {
    Id(ProductId),
    Reference(String),
}

impl FromStr for ProductRef {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DomainError::validation("product code is empty"));
        }
        Ok(match s.parse::<ProductId>() {
            Ok(id) => ProductRef::Id(id),
            Err(_) => ProductRef::Reference(s.to_string()),
        })
    }
}

impl From<ProductId> for ProductRef {
    fn from(value: ProductId) -> Self {
        ProductRef::Id(value)
    }
}

/// What a rebuild changed. Empty when the product did not resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub product_id: Option<ProductId>,
    pub movements_deleted: u64,
    pub movements_written: usize,
    pub stocks_updated: usize,
    pub stocks_created: usize,
}

/// Read side of the ledger for one product.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovementListing {
    /// Most recent first.
    pub movements: Vec<Movement>,
    pub has_movements: bool,
}

/// Rebuilds derived ledger state.
#[derive(Debug, Clone)]
pub struct Rebuilder<S> {
    store: S,
}

impl<S> Rebuilder<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> Rebuilder<S>
where
    S: StockStore,
{
    /// Replace every movement of the product with the ones its transactions
    /// and counts imply.
    #[tracing::instrument(skip(self, actor, notices), fields(actor = %actor.user_id))]
    pub async fn rebuild_movements(
        &self,
        actor: &Principal,
        product: &ProductRef,
        notices: &dyn NoticeSink,
    ) -> Result<RebuildReport, StockError> {
        let result = self.movements(actor, product).await;
        report("movements", result, notices)
    }

    /// Overwrite the product's stock rows with the net sum of its movements.
    #[tracing::instrument(skip(self, actor, notices), fields(actor = %actor.user_id))]
    pub async fn rebuild_stock(
        &self,
        actor: &Principal,
        product: &ProductRef,
        notices: &dyn NoticeSink,
    ) -> Result<RebuildReport, StockError> {
        let result = self.stock(actor, product).await;
        report("stock", result, notices)
    }

    /// Movements of a product, newest first. Unknown products list nothing.
    pub async fn list_movements(&self, product: &ProductRef) -> Result<MovementListing, StockError> {
        let mut tx = self.store.begin().await?;
        let Some(product) = resolve(&mut *tx, product).await? else {
            return Ok(MovementListing::default());
        };

        let mut movements = tx.movements_for_product(product.id).await?;
        movements.sort_by(|a, b| {
            (b.date(), b.time(), b.id).cmp(&(a.date(), a.time(), a.id))
        });
        Ok(MovementListing {
            has_movements: !movements.is_empty(),
            movements,
        })
    }

    async fn movements(&self, actor: &Principal, product: &ProductRef) -> Result<RebuildReport, StockError> {
        authorize(actor, &Permission::STOCK_REBUILD)?;

        let mut tx = self.store.begin().await?;
        let Some(product) = resolve(&mut *tx, product).await? else {
            return Ok(RebuildReport::default());
        };

        let transactions = tx.transactions_for_product(product.id).await?;
        let (counts, lines) = tx.count_lines_for_product(product.id).await?;
        let movements = replay_movements(&transactions, &counts, &lines)?;

        let deleted = tx.delete_movements_for_product(product.id).await?;
        for movement in &movements {
            tx.append_movement(movement).await?;
        }
        tx.commit().await?;

        Ok(RebuildReport {
            product_id: Some(product.id),
            movements_deleted: deleted,
            movements_written: movements.len(),
            ..RebuildReport::default()
        })
    }

    async fn stock(&self, actor: &Principal, product: &ProductRef) -> Result<RebuildReport, StockError> {
        authorize(actor, &Permission::STOCK_REBUILD)?;

        let mut tx = self.store.begin().await?;
        let Some(product) = resolve(&mut *tx, product).await? else {
            return Ok(RebuildReport::default());
        };

        let mut totals = balances(&tx.movements_for_product(product.id).await?)?;
        let rows = tx.stocks_for_product(product.id).await?;
        let mut report = RebuildReport {
            product_id: Some(product.id),
            ..RebuildReport::default()
        };

        for mut row in rows {
            let target = totals.remove(&row.key()).unwrap_or(Quantity::ZERO);
            // Rows already within float noise of the ledger keep their value.
            if !row.quantity.approx_eq(target) {
                row.quantity = target;
                tx.save_stock(&row).await?;
                report.stocks_updated += 1;
            }
        }

        // Ledger keys without a stock row.
        for (key, quantity) in totals {
            let mut row = Stock::empty(key);
            row.quantity = quantity;
            tx.save_stock(&row).await?;
            report.stocks_created += 1;
        }

        tx.commit().await?;
        Ok(report)
    }
}

async fn resolve(
    tx: &mut dyn StoreTransaction,
    product: &ProductRef,
) -> Result<Option<Product>, StoreError> {
    match product {
        ProductRef::Id(id) => tx.product(*id).await,
        ProductRef::Reference(reference) => tx.product_by_reference(reference).await,
    }
}

fn report(
    what: &str,
    result: Result<RebuildReport, StockError>,
    notices: &dyn NoticeSink,
) -> Result<RebuildReport, StockError> {
    match &result {
        Ok(report) if report.product_id.is_none() => {
            tracing::info!(rebuild = what, "product not found, nothing rebuilt");
        }
        Ok(report) => {
            tracing::info!(
                rebuild = what,
                movements_deleted = report.movements_deleted,
                movements_written = report.movements_written,
                stocks_updated = report.stocks_updated,
                stocks_created = report.stocks_created,
                "rebuild committed"
            );
            notices.emit(Notice::notice(notices::RECORD_UPDATED));
        }
        Err(err) => {
            tracing::warn!(rebuild = what, error = %err, "rebuild not applied");
            notices.emit(Notice::warning(err.notice_code()));
        }
    }
    result
}
