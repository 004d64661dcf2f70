mod common;

use assert_matches::assert_matches;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

use common::{at, TestLedger};
use planta_ledger::{
    entities::{product::ProductKind, warehouse_transaction},
    errors::ServiceError,
    models::BulkRow,
    repositories::{LedgerRepository, NewProduct, ProductRepository},
    services::bulk_reconciliation::BULK_LOAD_NOTES,
    tabular,
};

fn row(row_number: usize, product_id: &str, quantity: Option<Decimal>, cost: Option<Decimal>) -> BulkRow {
    BulkRow {
        row_number,
        product_id: product_id.to_string(),
        declared_quantity: quantity,
        declared_new_cost: cost,
    }
}

async fn bulk_transactions(ledger: &TestLedger) -> u64 {
    warehouse_transaction::Entity::find()
        .filter(warehouse_transaction::Column::CausationType.eq("CM"))
        .count(ledger.db())
        .await
        .unwrap()
}

#[tokio::test]
async fn second_run_of_the_same_file_changes_nothing() {
    let ledger = TestLedger::new().await;
    ledger.material("MP-1", dec!(10)).await;
    ledger.material("MP-2", dec!(5)).await;
    ledger.adjust("MP-1", dec!(30), at(2024, 1, 2, 8)).await;
    let rows = vec![
        row(2, "MP-1", Some(dec!(50)), None),
        row(3, "MP-2", Some(dec!(10)), None),
    ];

    let first = ledger
        .services
        .bulk
        .reconcile(rows.clone(), "inventarios")
        .await
        .unwrap();
    assert_eq!(first.success_count, 2);
    assert_eq!(first.adjustment_lines, 2);
    assert_eq!(ledger.stock_of("MP-1").await, dec!(50));
    assert_eq!(ledger.stock_of("MP-2").await, dec!(10));

    let record = LedgerRepository::find_by_id(ledger.db(), first.transaction_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.transaction.causation_type, "CM");
    assert_eq!(record.transaction.notes.as_deref(), Some(BULK_LOAD_NOTES));
    assert_eq!(record.transaction.approved_by.as_deref(), Some("inventarios"));
    assert_eq!(record.movements[0].quantity, dec!(20));
    assert!(record.movements.iter().all(|m| m.movement_type == "PURCHASE"));

    let second = ledger.services.bulk.reconcile(rows, "inventarios").await.unwrap();
    assert_eq!(second.success_count, 0);
    assert_eq!(second.unchanged_count, 2);
    assert_eq!(second.transaction_id, None);
    assert_eq!(bulk_transactions(&ledger).await, 1);
}

#[tokio::test]
async fn bad_rows_are_reported_and_the_rest_is_applied() {
    let ledger = TestLedger::new().await;
    ledger.material("MP-1", dec!(10)).await;
    ledger
        .composite("SF-1", ProductKind::SemiFinished, &[("MP-1", dec!(1))])
        .await;
    ProductRepository::create(
        ledger.db(),
        NewProduct::new("NI-1", "Empaque", ProductKind::Material).not_inventoriable(),
    )
    .await
    .unwrap();

    let report = ledger
        .services
        .bulk
        .reconcile(
            vec![
                row(2, "MP-404", Some(dec!(1)), None),
                row(3, "SF-1", Some(dec!(1)), None),
                row(4, "NI-1", Some(dec!(1)), None),
                row(5, "MP-1", Some(dec!(-5)), None),
                row(6, "MP-1", Some(dec!(12)), Some(dec!(11))),
            ],
            "inventarios",
        )
        .await
        .unwrap();

    assert_eq!(report.failure_count, 4);
    assert_eq!(report.success_count, 1);
    let failed: Vec<usize> = report.errors.iter().map(|e| e.row_number).collect();
    assert_eq!(failed, vec![2, 3, 4, 5]);
    assert_eq!(report.errors[0].product_id, "MP-404");
    assert!(report.transaction_id.is_some());
    assert_eq!(ledger.stock_of("MP-1").await, dec!(12));
    assert_eq!(ledger.cost_of("MP-1").await, dec!(11));
    assert_eq!(ledger.cost_of("SF-1").await, dec!(11));
}

#[tokio::test]
async fn sentinel_and_blank_quantities_only_touch_cost() {
    let ledger = TestLedger::new().await;
    ledger.material("MP-1", dec!(10)).await;
    ledger.material("MP-2", dec!(3)).await;
    ledger
        .composite(
            "SF-1",
            ProductKind::SemiFinished,
            &[("MP-1", dec!(2)), ("MP-2", dec!(1))],
        )
        .await;
    ledger.adjust("MP-1", dec!(30), at(2024, 1, 2, 8)).await;

    let report = ledger
        .services
        .bulk
        .reconcile(
            vec![
                row(2, "MP-1", Some(dec!(-1)), Some(dec!(15))),
                row(3, "MP-2", None, Some(dec!(4))),
                row(4, "MP-2", Some(dec!(-7)), Some(dec!(0))),
            ],
            "inventarios",
        )
        .await
        .unwrap();

    assert_eq!(report.success_count, 2);
    assert_eq!(report.unchanged_count, 1);
    assert_eq!(report.cost_overrides, 2);
    assert_eq!(report.transaction_id, None);
    assert_eq!(ledger.stock_of("MP-1").await, dec!(30));
    assert_eq!(ledger.cost_of("MP-1").await, dec!(15));
    assert_eq!(ledger.cost_of("MP-2").await, dec!(4));
    assert_eq!(ledger.cost_of("SF-1").await, dec!(34));
    assert_eq!(bulk_transactions(&ledger).await, 0);
}

#[tokio::test]
async fn repeated_product_rows_reconcile_against_each_other() {
    let ledger = TestLedger::new().await;
    ledger.material("MP-1", dec!(10)).await;

    let report = ledger
        .services
        .bulk
        .reconcile(
            vec![row(2, "MP-1", Some(dec!(40)), None), row(3, "MP-1", Some(dec!(25)), None)],
            "inventarios",
        )
        .await
        .unwrap();

    assert_eq!(report.adjustment_lines, 2);
    assert_eq!(ledger.stock_of("MP-1").await, dec!(25));
}

#[tokio::test]
async fn bulk_documents_are_numbered_in_sequence() {
    let ledger = TestLedger::new().await;
    ledger.material("MP-1", dec!(10)).await;
    let bulk = &ledger.services.bulk;

    let first = bulk
        .reconcile(vec![row(2, "MP-1", Some(dec!(5)), None)], "a")
        .await
        .unwrap();
    let second = bulk
        .reconcile(vec![row(2, "MP-1", Some(dec!(8)), None)], "b")
        .await
        .unwrap();

    let causation_ids: Vec<i32> = [first.transaction_id, second.transaction_id]
        .into_iter()
        .flatten()
        .collect();
    let mut numbers = Vec::new();
    for id in causation_ids {
        let record = LedgerRepository::find_by_id(ledger.db(), id).await.unwrap().unwrap();
        numbers.push(record.transaction.causation_id);
    }
    assert_eq!(numbers, vec![1, 2]);
}

#[tokio::test]
async fn disabled_bulk_load_is_forbidden() {
    let ledger = TestLedger::new().await;
    ledger.material("MP-1", dec!(10)).await;
    ledger.set_switches(true, false, true).await;

    let err = ledger
        .services
        .bulk
        .reconcile(vec![row(2, "MP-1", Some(dec!(5)), None)], "inventarios")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));
    assert_eq!(ledger.stock_of("MP-1").await, dec!(0));
}

#[tokio::test]
async fn template_round_trips_through_csv() {
    let ledger = TestLedger::new().await;
    ledger.material("MP-1", dec!(10)).await;
    ledger.material("MP-2", dec!(4)).await;
    ledger
        .composite("SF-1", ProductKind::SemiFinished, &[("MP-1", dec!(1))])
        .await;
    ledger.adjust("MP-1", dec!(30), at(2024, 1, 2, 8)).await;

    let template = ledger.services.bulk.template_rows().await.unwrap();
    let ids: Vec<&str> = template.iter().map(|r| r.product_id.as_str()).collect();
    assert_eq!(ids, vec!["MP-1", "MP-2"]);
    assert_eq!(template[0].consolidated_quantity, dec!(30));

    let file = tempfile::NamedTempFile::new().unwrap();
    tabular::write_bulk_template(file.reopen().unwrap(), &template).unwrap();
    let filled: String = std::fs::read_to_string(file.path())
        .unwrap()
        .lines()
        .map(|line| match line.strip_suffix(",,") {
            Some(head) if line.starts_with("MP-1,") => format!("{},45,\n", head),
            _ => format!("{}\n", line),
        })
        .collect();
    let rows = tabular::read_bulk_rows(filled.as_bytes()).unwrap();
    assert_eq!(rows.len(), 2);

    let report = ledger.services.bulk.reconcile(rows, "inventarios").await.unwrap();
    assert_eq!(report.success_count, 1);
    assert_eq!(report.unchanged_count, 1);
    assert_eq!(ledger.stock_of("MP-1").await, dec!(45));
}

#[tokio::test]
async fn padded_product_ids_lock_the_product_they_write() {
    let ledger = TestLedger::new().await;
    ledger.material("MP-1", dec!(10)).await;
    let rows = vec![row(2, "  MP-1 ", Some(dec!(25)), None)];

    let held = ledger.services.locks.acquire(["MP-1"]).await;
    let blocked = tokio::time::timeout(
        std::time::Duration::from_millis(200),
        ledger.services.bulk.reconcile(rows.clone(), "inventarios"),
    )
    .await;
    assert!(blocked.is_err(), "bulk load ran while MP-1 was locked");
    assert_eq!(ledger.stock_of("MP-1").await, Decimal::ZERO);
    drop(held);

    let report = ledger
        .services
        .bulk
        .reconcile(rows, "inventarios")
        .await
        .unwrap();
    assert_eq!(report.success_count, 1);
    assert_eq!(ledger.stock_of("MP-1").await, dec!(25));
}
