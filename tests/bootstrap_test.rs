mod common;

use planta_ledger::{bootstrap, db, repositories::SettingsRepository};

use common::TestLedger;

#[tokio::test]
async fn startup_is_idempotent() {
    let ledger = TestLedger::new().await;

    db::run_migrations(ledger.db()).await.unwrap();
    let again = bootstrap::ensure_defaults(ledger.db()).await.unwrap();
    assert!(again.forced_deletion_enabled);
    assert!(again.bulk_load_enabled);
    assert!(again.adjustments_enabled);

    ledger.set_switches(false, false, true).await;
    let kept = bootstrap::ensure_defaults(ledger.db()).await.unwrap();
    assert!(!kept.forced_deletion_enabled);
    assert!(!kept.bulk_load_enabled);

    db::check_connection(ledger.db()).await.unwrap();
    assert!(SettingsRepository::find(ledger.db()).await.unwrap().is_some());
}
