//! Purchase receipts: weighted-average costing, cascade and journal posting.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use common::{at, StubJournal, TestLedger, JOURNAL_REF};
use planta_ledger::{
    entities::{product::ProductKind, purchase_order, warehouse_transaction::AccountingState},
    errors::{ErrorKind, ServiceError},
    models::{EventMetadata, SourceDocumentKind},
    repositories::{DocumentRepository, LedgerRepository},
    services::{JournalEntryService, ReceiptLine},
};

async fn open_order(ledger: &TestLedger, product_id: &str, qty: Decimal, price: Decimal) -> purchase_order::Model {
    DocumentRepository::create_purchase_order(
        ledger.db(),
        "Molinos del Sur",
        vec![(product_id.to_string(), qty, price)],
    )
    .await
    .unwrap()
    .0
}

#[tokio::test]
async fn receipt_blends_cost_and_links_lot_to_order() {
    let ledger = TestLedger::new().await;
    ledger.material("MP-1", dec!(10)).await;
    ledger.adjust("MP-1", dec!(100), at(2024, 1, 2, 8)).await;
    let order = open_order(&ledger, "MP-1", dec!(50), dec!(16)).await;

    let outcome = ledger
        .services
        .purchase_receipts
        .receive(
            order.id,
            vec![ReceiptLine::new("MP-1", dec!(50), dec!(16))],
            EventMetadata::by("bodega"),
        )
        .await
        .unwrap();

    assert_eq!(ledger.cost_of("MP-1").await, dec!(12));
    assert_eq!(ledger.stock_of("MP-1").await, dec!(150));
    assert_eq!(outcome.amount, dec!(800));
    assert_eq!(outcome.record.transaction.causation_type, "OCM");
    assert_eq!(outcome.record.transaction.causation_id, order.id);
    assert_eq!(
        outcome.record.transaction.accounting_state,
        AccountingState::Pending.as_str()
    );
    assert_eq!(outcome.record.movements[0].movement_type, "PURCHASE");
    assert_eq!(outcome.record.movements[0].warehouse, "GENERAL");
    assert_eq!(outcome.record.lots_created[0].purchase_order_id, Some(order.id));
    assert!(outcome.journal_error.is_none());
}

#[tokio::test]
async fn fractional_blend_is_rounded_up() {
    let ledger = TestLedger::new().await;
    ledger.material("MP-1", dec!(8)).await;
    ledger.adjust("MP-1", dec!(100), at(2024, 1, 2, 8)).await;
    let order = open_order(&ledger, "MP-1", dec!(50), dec!(8.02)).await;

    ledger
        .services
        .purchase_receipts
        .receive(
            order.id,
            vec![ReceiptLine::new("MP-1", dec!(50), dec!(8.02))],
            EventMetadata::default(),
        )
        .await
        .unwrap();

    assert_eq!(ledger.cost_of("MP-1").await, dec!(9));
}

#[tokio::test]
async fn later_lines_see_earlier_lines_of_the_same_product() {
    let ledger = TestLedger::new().await;
    ledger.material("MP-1", dec!(10)).await;
    ledger.adjust("MP-1", dec!(100), at(2024, 1, 2, 8)).await;
    let order = open_order(&ledger, "MP-1", dec!(100), dec!(18)).await;

    let outcome = ledger
        .services
        .purchase_receipts
        .receive(
            order.id,
            vec![
                ReceiptLine::new("MP-1", dec!(50), dec!(16)),
                ReceiptLine::new("MP-1", dec!(50), dec!(20)),
            ],
            EventMetadata::default(),
        )
        .await
        .unwrap();

    // 100@10 + 50@16 -> 12, then 150@12 + 50@20 -> 14
    assert_eq!(ledger.cost_of("MP-1").await, dec!(14));
    assert_eq!(outcome.record.movements.len(), 2);
    assert_eq!(outcome.record.lots_created.len(), 2);
}

#[tokio::test]
async fn receipt_cascades_into_consumers() {
    let ledger = TestLedger::new().await;
    ledger.material("MP-1", dec!(10)).await;
    ledger
        .composite("SF-1", ProductKind::SemiFinished, &[("MP-1", dec!(2))])
        .await;
    ledger.adjust("MP-1", dec!(100), at(2024, 1, 2, 8)).await;
    let order = open_order(&ledger, "MP-1", dec!(50), dec!(16)).await;

    let outcome = ledger
        .services
        .purchase_receipts
        .receive(
            order.id,
            vec![ReceiptLine::new("MP-1", dec!(50), dec!(16))],
            EventMetadata::default(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.cascades[0].recomputed, vec!["SF-1"]);
    assert_eq!(ledger.cost_of("SF-1").await, dec!(24));
}

#[tokio::test]
async fn zero_resulting_stock_rolls_back_the_receipt() {
    let ledger = TestLedger::new().await;
    ledger.material("MP-1", dec!(10)).await;
    ledger.adjust("MP-1", dec!(-50), at(2024, 1, 2, 8)).await;
    let order = open_order(&ledger, "MP-1", dec!(50), dec!(16)).await;

    let err = ledger
        .services
        .purchase_receipts
        .receive(
            order.id,
            vec![ReceiptLine::new("MP-1", dec!(50), dec!(16))],
            EventMetadata::default(),
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ZeroResultingStock { ref product_id } if product_id == "MP-1");
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    assert_eq!(ledger.cost_of("MP-1").await, dec!(10));
    assert_eq!(ledger.stock_of("MP-1").await, dec!(-50));
    let caused = LedgerRepository::find_by_causation(
        ledger.db(),
        SourceDocumentKind::PurchaseOrder.causation(),
        order.id,
    )
    .await
    .unwrap();
    assert!(caused.is_empty());
}

#[tokio::test]
async fn journal_reference_marks_the_transaction_posted() {
    let journal = Arc::new(StubJournal::default());
    let ledger =
        TestLedger::with_journal(Some(journal.clone() as Arc<dyn JournalEntryService>)).await;
    ledger.material("MP-1", dec!(10)).await;
    let order = open_order(&ledger, "MP-1", dec!(40), dec!(2.5)).await;

    let outcome = ledger
        .services
        .purchase_receipts
        .receive(
            order.id,
            vec![ReceiptLine::new("MP-1", dec!(40), dec!(2.5))],
            EventMetadata::default(),
        )
        .await
        .unwrap();

    assert_eq!(*journal.amounts.lock().unwrap(), vec![dec!(100)]);
    assert_eq!(
        outcome.record.transaction.accounting_state,
        AccountingState::Posted.as_str()
    );
    assert_eq!(outcome.record.transaction.journal_entry_id, Some(JOURNAL_REF));

    let stored = LedgerRepository::find_by_id(ledger.db(), outcome.record.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.transaction.journal_entry_id, Some(JOURNAL_REF));
}

#[tokio::test]
async fn journal_failure_keeps_the_receipt_pending() {
    let journal = Arc::new(StubJournal::failing());
    let ledger =
        TestLedger::with_journal(Some(journal.clone() as Arc<dyn JournalEntryService>)).await;
    ledger.material("MP-1", dec!(10)).await;
    let order = open_order(&ledger, "MP-1", dec!(40), dec!(3)).await;

    let outcome = ledger
        .services
        .purchase_receipts
        .receive(
            order.id,
            vec![ReceiptLine::new("MP-1", dec!(40), dec!(3))],
            EventMetadata::default(),
        )
        .await
        .unwrap();

    assert!(outcome.journal_error.is_some());
    assert_eq!(journal.amounts.lock().unwrap().len(), 1);
    let stored = LedgerRepository::find_by_id(ledger.db(), outcome.record.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        stored.transaction.accounting_state,
        AccountingState::Pending.as_str()
    );
    assert_eq!(stored.transaction.journal_entry_id, None);
    assert_eq!(ledger.stock_of("MP-1").await, dec!(40));
    assert_eq!(ledger.cost_of("MP-1").await, dec!(3));
}

#[tokio::test]
async fn concurrent_receipts_of_one_product_are_serialized() {
    let ledger = TestLedger::new().await;
    ledger.material("MP-1", dec!(10)).await;
    ledger.adjust("MP-1", dec!(100), at(2024, 1, 2, 8)).await;
    let first = open_order(&ledger, "MP-1", dec!(50), dec!(16)).await;
    let second = open_order(&ledger, "MP-1", dec!(50), dec!(16)).await;

    let receipts = ledger.services.purchase_receipts.clone();
    let (a, b) = tokio::join!(
        receipts.receive(
            first.id,
            vec![ReceiptLine::new("MP-1", dec!(50), dec!(16))],
            EventMetadata::default(),
        ),
        receipts.receive(
            second.id,
            vec![ReceiptLine::new("MP-1", dec!(50), dec!(16))],
            EventMetadata::default(),
        ),
    );
    a.unwrap();
    b.unwrap();

    // 100@10 + 50@16 -> 12, then 150@12 + 50@16 -> 13
    assert_eq!(ledger.cost_of("MP-1").await, dec!(13));
    assert_eq!(ledger.stock_of("MP-1").await, dec!(200));
}

#[tokio::test]
async fn invalid_receipts_are_rejected_up_front() {
    let ledger = TestLedger::new().await;
    ledger.material("MP-1", dec!(10)).await;
    let order = open_order(&ledger, "MP-1", dec!(50), dec!(16)).await;
    let receipts = &ledger.services.purchase_receipts;

    let err = receipts
        .receive(9999, vec![ReceiptLine::new("MP-1", dec!(1), dec!(1))], EventMetadata::default())
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::DocumentNotFound { kind: SourceDocumentKind::PurchaseOrder, id: 9999 }
    );

    let err = receipts
        .receive(order.id, vec![ReceiptLine::new("MP-1", dec!(0), dec!(1))], EventMetadata::default())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = receipts
        .receive(order.id, vec![], EventMetadata::default())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvariantViolation(_));
}

#[tokio::test]
async fn deleting_a_posted_receipt_removes_its_movements() {
    let journal = Arc::new(StubJournal::default());
    let ledger =
        TestLedger::with_journal(Some(journal.clone() as Arc<dyn JournalEntryService>)).await;
    ledger.material("MP-1", dec!(10)).await;
    let order = open_order(&ledger, "MP-1", dec!(20), dec!(4)).await;

    let outcome = ledger
        .services
        .purchase_receipts
        .receive(
            order.id,
            vec![ReceiptLine::new("MP-1", dec!(20), dec!(4))],
            EventMetadata::default(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.record.transaction.journal_entry_id, Some(JOURNAL_REF));
    assert_eq!(ledger.stock_of("MP-1").await, dec!(20));

    LedgerRepository::delete(ledger.db(), outcome.record.id())
        .await
        .unwrap();

    assert!(LedgerRepository::find_by_id(ledger.db(), outcome.record.id())
        .await
        .unwrap()
        .is_none());
    assert_eq!(ledger.stock_of("MP-1").await, Decimal::ZERO);
    // deleting twice is a no-op
    LedgerRepository::delete(ledger.db(), outcome.record.id())
        .await
        .unwrap();
}
