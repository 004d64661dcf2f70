mod common;

use assert_matches::assert_matches;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use common::{at, day, TestLedger};
use planta_ledger::{
    errors::ServiceError,
    models::{CausationEvent, EventMetadata, KardexQuery, MovementLine},
};

fn balances(rows: &[planta_ledger::models::KardexRow]) -> Vec<Decimal> {
    rows.iter().map(|r| r.balance).collect()
}

async fn three_days(ledger: &TestLedger) {
    ledger.material("MP-1", dec!(10)).await;
    ledger.adjust("MP-1", dec!(100), at(2024, 5, 1, 10)).await;
    ledger.adjust("MP-1", dec!(-30), at(2024, 5, 2, 10)).await;
    ledger.adjust("MP-1", dec!(20), at(2024, 5, 3, 10)).await;
}

#[tokio::test]
async fn running_balance_is_continuous_across_pages() {
    let ledger = TestLedger::new().await;
    three_days(&ledger).await;
    let kardex = &ledger.services.kardex;

    let first = kardex
        .page(KardexQuery::new("MP-1", day(2024, 5, 1), day(2024, 5, 3)).page(0, 2))
        .await
        .unwrap();
    let second = kardex
        .page(KardexQuery::new("MP-1", day(2024, 5, 1), day(2024, 5, 3)).page(1, 2))
        .await
        .unwrap();

    assert_eq!(balances(&first.rows), vec![dec!(100), dec!(70)]);
    assert_eq!(balances(&second.rows), vec![dec!(90)]);
    assert_eq!(first.opening_balance, dec!(0));
    assert_eq!(second.opening_balance, dec!(0));
    assert_eq!(first.total_elements, 3);
    assert_eq!(first.total_pages, 2);
    assert_eq!(first.rows[1].entrada, dec!(0));
    assert_eq!(first.rows[1].salida, dec!(30));
    assert_eq!(first.rows[0].entrada, dec!(100));
    assert!(first.rows[0].batch_number.is_some());
}

#[tokio::test]
async fn opening_balance_counts_everything_before_the_start_day() {
    let ledger = TestLedger::new().await;
    three_days(&ledger).await;
    ledger.adjust("MP-1", dec!(40), at(2024, 4, 30, 23)).await;

    let page = ledger
        .services
        .kardex
        .page(KardexQuery::new("MP-1", day(2024, 5, 1), day(2024, 5, 3)))
        .await
        .unwrap();

    assert_eq!(page.opening_balance, dec!(40));
    assert_eq!(balances(&page.rows), vec![dec!(140), dec!(110), dec!(130)]);
    assert_eq!(page.product_name, "Material MP-1");
    assert_eq!(page.unit_of_measure, "KG");
}

#[tokio::test]
async fn movements_sharing_a_timestamp_are_ordered_by_id() {
    let ledger = TestLedger::new().await;
    ledger.material("MP-1", dec!(10)).await;
    ledger
        .services
        .transactions
        .record(
            CausationEvent::adjustment(
                1,
                vec![
                    MovementLine::new("MP-1", dec!(5)),
                    MovementLine::new("MP-1", dec!(-2)),
                    MovementLine::new("MP-1", dec!(1)),
                ],
            )
            .with_metadata(EventMetadata::default().at(at(2024, 5, 1, 9))),
        )
        .await
        .unwrap();

    let kardex = &ledger.services.kardex;
    let first = kardex
        .page(KardexQuery::new("MP-1", day(2024, 5, 1), day(2024, 5, 1)).page(0, 2))
        .await
        .unwrap();
    let second = kardex
        .page(KardexQuery::new("MP-1", day(2024, 5, 1), day(2024, 5, 1)).page(1, 2))
        .await
        .unwrap();

    assert!(first.rows[0].movement_id < first.rows[1].movement_id);
    assert!(first.rows[1].movement_id < second.rows[0].movement_id);
    assert_eq!(balances(&first.rows), vec![dec!(5), dec!(3)]);
    assert_eq!(balances(&second.rows), vec![dec!(4)]);
}

#[tokio::test]
async fn end_day_is_inclusive() {
    let ledger = TestLedger::new().await;
    ledger.material("MP-1", dec!(10)).await;
    ledger.adjust("MP-1", dec!(7), at(2024, 5, 2, 23)).await;
    ledger.adjust("MP-1", dec!(3), at(2024, 5, 3, 0)).await;

    let page = ledger
        .services
        .kardex
        .page(KardexQuery::new("MP-1", day(2024, 5, 2), day(2024, 5, 2)))
        .await
        .unwrap();

    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.rows[0].quantity, dec!(7));
}

#[tokio::test]
async fn page_arguments_are_normalized() {
    let ledger = TestLedger::new().await;
    three_days(&ledger).await;
    let kardex = &ledger.services.kardex;

    let page = kardex
        .page(KardexQuery::new("MP-1", day(2024, 5, 1), day(2024, 5, 3)).page(-3, 0))
        .await
        .unwrap();
    assert_eq!((page.page, page.size), (0, 10));
    assert_eq!(page.rows.len(), 3);

    assert_eq!(kardex.normalize_page(Some(2), Some(100_000)), (2, 500));
    assert_eq!(kardex.normalize_page(None, None), (0, 10));
}

#[tokio::test]
async fn pages_past_the_end_are_empty() {
    let ledger = TestLedger::new().await;
    three_days(&ledger).await;
    let kardex = &ledger.services.kardex;

    for index in [2, 50, i64::MAX] {
        let page = kardex
            .page(KardexQuery::new("MP-1", day(2024, 5, 1), day(2024, 5, 3)).page(index, 10))
            .await
            .unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(page.page, index as u64);
        assert_eq!(page.total_elements, 3);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.opening_balance, dec!(0));
    }
}

#[tokio::test]
async fn bad_requests_fail_with_typed_errors() {
    let ledger = TestLedger::new().await;
    ledger.material("MP-1", dec!(10)).await;
    let kardex = &ledger.services.kardex;

    let err = kardex
        .page(KardexQuery::new("MP-1", day(2024, 5, 3), day(2024, 5, 1)))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidRange { .. });

    let err = kardex
        .page(KardexQuery::new("MP-404", day(2024, 5, 1), day(2024, 5, 3)))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ProductNotFound(_));
}

#[tokio::test]
async fn export_covers_the_whole_range() {
    let ledger = TestLedger::new().await;
    three_days(&ledger).await;

    let export = ledger
        .services
        .kardex
        .export("MP-1", day(2024, 5, 2), day(2024, 5, 3))
        .await
        .unwrap();

    assert_eq!(export.opening_balance, dec!(100));
    assert_eq!(balances(&export.rows), vec![dec!(70), dec!(90)]);
    assert_eq!(export.closing_balance, dec!(90));

    let mut csv = Vec::new();
    planta_ledger::tabular::write_kardex(&mut csv, &export).unwrap();
    let text = String::from_utf8(csv).unwrap();
    assert_eq!(text.lines().count(), 3);
    assert!(text.starts_with("fecha,movimiento_id,transaccion_id,tipo,almacen,lote"));
}
