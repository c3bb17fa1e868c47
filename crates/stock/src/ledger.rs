//! Pure ledger math: regenerate movements from history and fold them into
//! balances.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use stockledger_core::{CountId, DomainError, DomainResult, Quantity};

use crate::count::{Count, CountLine};
use crate::movement::{Movement, StockTransaction};
use crate::stock::StockKey;

/// Tie-breaker for records sharing a timestamp: ids are time-ordered, so
/// comparing their bytes follows insertion order.
type RecordOrder = [u8; 16];

enum HistoryEntry<'a> {
    Transaction(&'a StockTransaction),
    CountLine(&'a Count, &'a CountLine),
}

impl HistoryEntry<'_> {
    fn sort_key(&self) -> (DateTime<Utc>, RecordOrder) {
        match self {
            HistoryEntry::Transaction(tx) => (tx.occurred_at, *tx.id.as_uuid().as_bytes()),
            HistoryEntry::CountLine(count, line) => (count.created_at, *line.id.as_uuid().as_bytes()),
        }
    }
}

/// Regenerate the movement ledger from authoritative history.
///
/// History is replayed in chronological order (ties broken by record id):
/// - every transaction becomes a movement carrying its own delta;
/// - every count line becomes a movement for `counted - running balance` of
///   its stock key, and resets that balance to the counted quantity. Lines
///   that match the running balance (see [`Quantity::approx_eq`]) produce no
///   movement.
///
/// Callers pass only the records of the product being rebuilt. A line whose
/// count is missing is an invariant violation.
pub fn replay_movements(
    transactions: &[StockTransaction],
    counts: &[Count],
    lines: &[CountLine],
) -> DomainResult<Vec<Movement>> {
    let counts_by_id: HashMap<CountId, &Count> = counts.iter().map(|c| (c.id, c)).collect();

    let mut history: Vec<HistoryEntry<'_>> = Vec::with_capacity(transactions.len() + lines.len());
    history.extend(transactions.iter().map(HistoryEntry::Transaction));
    for line in lines {
        let count = counts_by_id.get(&line.count_id).ok_or_else(|| {
            DomainError::invariant(format!(
                "count line {} references unknown count {}",
                line.id, line.count_id
            ))
        })?;
        history.push(HistoryEntry::CountLine(count, line));
    }
    history.sort_by_key(|entry| entry.sort_key());

    let mut running: HashMap<StockKey, Quantity> = HashMap::new();
    let mut movements = Vec::with_capacity(history.len());

    for entry in history {
        match entry {
            HistoryEntry::Transaction(tx) => {
                let movement = Movement::from_transaction(tx);
                let balance = running.entry(movement.key()).or_default();
                *balance = balance.apply(movement.quantity)?;
                movements.push(movement);
            }
            HistoryEntry::CountLine(count, line) => {
                let balance = running.entry(line.key(count)).or_default();
                let settled = balance.approx_eq(line.quantity);
                let delta = balance.delta_to(line.quantity)?;
                *balance = line.quantity;
                if !settled {
                    movements.push(Movement::from_count(count, line, delta));
                }
            }
        }
    }

    Ok(movements)
}

/// Net quantity per stock key. Fails if a running sum overflows.
pub fn balances<'a>(
    movements: impl IntoIterator<Item = &'a Movement>,
) -> DomainResult<BTreeMap<StockKey, Quantity>> {
    let mut out: BTreeMap<StockKey, Quantity> = BTreeMap::new();
    for m in movements {
        let balance = out.entry(m.key()).or_default();
        *balance = balance.apply(m.quantity)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use stockledger_core::{ProductId, WarehouseId};

    fn q(v: f64) -> Quantity {
        Quantity::new(v).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn key() -> StockKey {
        StockKey::new(ProductId::new(), WarehouseId::new(), "P001")
    }

    #[test]
    fn empty_history_yields_no_movements() {
        let movements = replay_movements(&[], &[], &[]).unwrap();
        assert!(movements.is_empty());
        assert!(balances(&movements).unwrap().is_empty());
    }

    #[test]
    fn transactions_are_copied_in_chronological_order() {
        let k = key();
        let late = StockTransaction::new(k.clone(), "DN-2", t0() + Duration::hours(2), q(-3.0));
        let early = StockTransaction::new(k.clone(), "DN-1", t0(), q(10.0));

        let movements = replay_movements(&[late, early], &[], &[]).unwrap();

        let docs: Vec<_> = movements.iter().map(|m| m.document.as_str()).collect();
        assert_eq!(docs, vec!["DN-1", "DN-2"]);
        assert_eq!(balances(&movements).unwrap()[&k], q(7.0));
    }

    #[test]
    fn count_line_moves_balance_to_counted_quantity() {
        let k = key();
        let receipt = StockTransaction::new(k.clone(), "DN-1", t0(), q(10.0));
        let count = Count::new(k.warehouse_id, "manual recount", t0() + Duration::hours(1));
        let line = CountLine {
            id: stockledger_core::CountLineId::new(),
            count_id: count.id,
            product_id: k.product_id,
            reference: k.reference.clone(),
            quantity: q(7.0),
        };
        let issue = StockTransaction::new(k.clone(), "DN-2", t0() + Duration::hours(2), q(-2.0));

        let movements = replay_movements(&[receipt, issue], &[count.clone()], &[line.clone()]).unwrap();

        assert_eq!(movements.len(), 3);
        assert_eq!(movements[1].quantity, q(-3.0));
        assert_eq!(movements[1].id.as_uuid(), line.id.as_uuid());
        assert_eq!(movements[1].document, format!("count {}", count.id));
        assert_eq!(balances(&movements).unwrap()[&k], q(5.0));
    }

    #[test]
    fn count_matching_balance_produces_no_movement() {
        let k = key();
        let count = Count::new(k.warehouse_id, "", t0());
        let line = CountLine {
            id: stockledger_core::CountLineId::new(),
            count_id: count.id,
            product_id: k.product_id,
            reference: k.reference.clone(),
            quantity: Quantity::ZERO,
        };

        let movements = replay_movements(&[], &[count], &[line]).unwrap();
        assert!(movements.is_empty());
    }

    #[test]
    fn orphan_count_line_is_an_invariant_violation() {
        let k = key();
        let line = CountLine {
            id: stockledger_core::CountLineId::new(),
            count_id: CountId::new(),
            product_id: k.product_id,
            reference: k.reference.clone(),
            quantity: q(1.0),
        };

        let err = replay_movements(&[], &[], &[line]).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn balances_are_kept_per_warehouse() {
        let product = ProductId::new();
        let a = StockKey::new(product, WarehouseId::new(), "P001");
        let b = StockKey::new(product, WarehouseId::new(), "P001");
        let txs = vec![
            StockTransaction::new(a.clone(), "DN-1", t0(), q(4.0)),
            StockTransaction::new(b.clone(), "DN-2", t0(), q(6.0)),
        ];

        let movements = replay_movements(&txs, &[], &[]).unwrap();
        let totals = balances(&movements).unwrap();

        assert_eq!(totals[&a], q(4.0));
        assert_eq!(totals[&b], q(6.0));
    }

    #[test]
    fn count_within_float_noise_of_balance_produces_no_movement() {
        let k = key();
        let txs = vec![
            StockTransaction::new(k.clone(), "DN-1", t0(), q(0.1)),
            StockTransaction::new(k.clone(), "DN-2", t0() + Duration::minutes(1), q(0.2)),
        ];
        let count = Count::new(k.warehouse_id, "", t0() + Duration::hours(1));
        let line = CountLine {
            id: stockledger_core::CountLineId::new(),
            count_id: count.id,
            product_id: k.product_id,
            reference: k.reference.clone(),
            quantity: q(0.3),
        };

        let movements = replay_movements(&txs, &[count], &[line]).unwrap();
        assert_eq!(movements.len(), 2);
    }

    #[test]
    fn overflowing_ledger_is_rejected() {
        let k = key();
        let txs = vec![
            StockTransaction::new(k.clone(), "DN-1", t0(), q(f64::MAX)),
            StockTransaction::new(k.clone(), "DN-2", t0() + Duration::minutes(1), q(f64::MAX)),
        ];

        assert!(matches!(replay_movements(&txs, &[], &[]), Err(DomainError::Validation(_))));
        let movements: Vec<_> = txs.iter().map(Movement::from_transaction).collect();
        assert!(balances(&movements).is_err());
    }

    proptest! {
        #[test]
        fn replay_is_deterministic_and_sums_transactions(deltas in prop::collection::vec(-1000i32..1000, 0..40)) {
            let k = key();
            let txs: Vec<_> = deltas
                .iter()
                .enumerate()
                .map(|(i, d)| StockTransaction::new(k.clone(), format!("DOC-{i}"), t0() + Duration::minutes(i as i64), q(f64::from(*d))))
                .collect();

            let first = replay_movements(&txs, &[], &[]).unwrap();
            let second = replay_movements(&txs, &[], &[]).unwrap();
            prop_assert_eq!(&first, &second);

            let expected: i64 = deltas.iter().map(|d| i64::from(*d)).sum();
            let total = balances(&first).unwrap().get(&k).copied().unwrap_or_default();
            prop_assert_eq!(total, q(expected as f64));
        }
    }
}
