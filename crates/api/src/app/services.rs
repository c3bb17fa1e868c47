//! Service wiring: one store shared by the mutator, the rebuilder and the
//! read endpoints.

use std::sync::Arc;

use thiserror::Error;

use stockledger_auth::FormTokens;
use stockledger_infra::{
    InMemoryStockStore, MutatorPolicy, Rebuilder, StockError, StockMutator, StockStore, StoreError,
    StoreTransaction,
};
use stockledger_stock::Warehouse;

#[cfg(feature = "postgres")]
use sqlx::postgres::PgPoolOptions;
#[cfg(feature = "postgres")]
use stockledger_infra::store::PostgresStockStore;

use crate::config::AppConfig;

pub type SharedStore = Arc<dyn StockStore>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[cfg(feature = "postgres")]
    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),
}

pub struct AppServices {
    store: SharedStore,
    pub mutator: StockMutator<SharedStore>,
    pub rebuilder: Rebuilder<SharedStore>,
    pub form_tokens: FormTokens,
}

impl AppServices {
    pub fn new(store: SharedStore, config: &AppConfig) -> Self {
        let policy = MutatorPolicy {
            allow_negative: config.allow_negative_stock,
        };
        Self {
            mutator: StockMutator::new(store.clone()).with_policy(policy),
            rebuilder: Rebuilder::new(store.clone()),
            form_tokens: FormTokens::new(config.form_token_secret.as_bytes(), config.form_token_ttl),
            store,
        }
    }

    pub fn in_memory(config: &AppConfig) -> Self {
        Self::new(Arc::new(InMemoryStockStore::new()), config)
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub async fn warehouses(&self) -> Result<Vec<Warehouse>, StockError> {
        let mut tx = self.store.begin().await?;
        Ok(tx.warehouses().await?)
    }
}

/// Build services for the configured backend.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, ServiceError> {
    match config.database_url.as_deref() {
        #[cfg(feature = "postgres")]
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            let store = PostgresStockStore::new(pool);
            store.migrate().await?;
            tracing::info!("using postgres stock store");
            Ok(AppServices::new(Arc::new(store), config))
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => {
            tracing::warn!("DATABASE_URL set but built without the postgres feature; using in-memory store");
            Ok(AppServices::in_memory(config))
        }
        None => {
            tracing::info!("using in-memory stock store");
            Ok(AppServices::in_memory(config))
        }
    }
}
