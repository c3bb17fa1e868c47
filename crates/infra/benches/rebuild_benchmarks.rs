use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::{Duration, TimeZone, Utc};
use tokio::runtime::Runtime;

use stockledger_auth::{Principal, Role};
use stockledger_core::{Quantity, UserId};
use stockledger_infra::{
    DiscardNotices, InMemoryStockStore, ProductRef, Rebuilder, StockMutator, StockStore, StoreTransaction,
};
use stockledger_stock::{replay_movements, Product, Stock, StockKey, StockTransaction, Warehouse};

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("tokio runtime")
}

fn history(key: &StockKey, len: usize) -> Vec<StockTransaction> {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..len)
        .map(|i| {
            let delta = if i % 3 == 0 { -2.0 } else { 5.0 };
            StockTransaction::new(
                key.clone(),
                format!("DOC-{i}"),
                t0 + Duration::minutes(i as i64),
                Quantity::new(delta).unwrap(),
            )
        })
        .collect()
}

async fn seeded(len: usize) -> (InMemoryStockStore, Product, Stock) {
    let store = InMemoryStockStore::new();
    let product = Product::new("P001", "Widget");
    let warehouse = Warehouse::new("Main");
    let key = StockKey::new(product.id, warehouse.id, "P001");
    let stock = Stock::empty(key.clone());

    let mut tx = store.begin().await.unwrap();
    tx.insert_product(&product).await.unwrap();
    tx.insert_warehouse(&warehouse).await.unwrap();
    for t in history(&key, len) {
        tx.record_transaction(&t).await.unwrap();
    }
    tx.save_stock(&stock).await.unwrap();
    tx.commit().await.unwrap();
    (store, product, stock)
}

/// Pure replay of transaction history into movements.
fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay_movements");
    let key = StockKey::new(Product::new("P001", "Widget").id, Warehouse::new("Main").id, "P001");

    for len in [10usize, 100, 1000, 10_000].iter() {
        let txs = history(&key, *len);
        group.throughput(Throughput::Elements(*len as u64));
        group.bench_with_input(BenchmarkId::new("transactions", len), &txs, |b, txs| {
            b.iter(|| black_box(replay_movements(txs, &[], &[]).unwrap()));
        });
    }

    group.finish();
}

/// Full rebuild (movements then stock) against the in-memory store.
fn bench_rebuild(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("rebuild");
    let admin = Principal::from_roles(UserId::new(), vec![Role::ADMIN]);

    for len in [10usize, 100, 1000].iter() {
        let (store, product, _) = rt.block_on(seeded(*len));
        let rebuilder = Rebuilder::new(store);
        let code = ProductRef::Id(product.id);

        group.throughput(Throughput::Elements(*len as u64));
        group.bench_with_input(BenchmarkId::new("movements_and_stock", len), len, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    rebuilder.rebuild_movements(&admin, &code, &DiscardNotices).await.unwrap();
                    black_box(rebuilder.rebuild_stock(&admin, &code, &DiscardNotices).await.unwrap())
                })
            });
        });
    }

    group.finish();
}

/// Manual stock change latency with a growing ledger.
fn bench_set_quantity(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("set_quantity");

    for len in [0usize, 1000].iter() {
        let (store, _, stock) = rt.block_on(seeded(*len));
        let mutator = StockMutator::new(store);
        let mut target = 0.0;

        group.bench_with_input(BenchmarkId::new("ledger_len", len), len, |b, _| {
            b.iter(|| {
                target += 1.0;
                rt.block_on(mutator.set_quantity(stock.id, target, "bench", &DiscardNotices))
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_replay, bench_rebuild, bench_set_quantity);
criterion_main!(benches);
