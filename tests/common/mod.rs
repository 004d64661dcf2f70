#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;

use planta_ledger::{
    bootstrap,
    config::AppConfig,
    db,
    entities::{product::ProductKind, purchase_order},
    errors::ServiceError,
    models::{CausationEvent, EventMetadata, MovementLine, TransactionRecord},
    repositories::{NewProduct, ProductRepository, SettingsRepository},
    services::JournalEntryService,
    LedgerServices,
};

/// Ledger services over a fresh in-memory SQLite database.
pub struct TestLedger {
    pub config: AppConfig,
    pub services: LedgerServices,
}

impl TestLedger {
    pub async fn new() -> Self {
        Self::with_journal(None).await
    }

    pub async fn with_journal(journal: Option<Arc<dyn JournalEntryService>>) -> Self {
        let mut config = AppConfig::new("sqlite::memory:");
        config.environment = "test".to_string();
        // One connection keeps the in-memory database alive and shared.
        config.db_max_connections = 1;
        config.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&config)
            .await
            .expect("db connect");
        db::run_migrations(&pool).await.expect("migrations");
        bootstrap::ensure_defaults(&pool).await.expect("default settings");

        let services = LedgerServices::new(Arc::new(pool), &config.ledger, journal, None);
        Self { config, services }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.services.db
    }

    pub async fn material(&self, id: &str, cost: Decimal) {
        ProductRepository::create(
            self.db(),
            NewProduct::new(id, format!("Material {}", id), ProductKind::Material).with_cost(cost),
        )
        .await
        .expect("create material");
    }

    pub async fn composite(&self, id: &str, kind: ProductKind, inputs: &[(&str, Decimal)]) {
        ProductRepository::create(self.db(), NewProduct::new(id, format!("Product {}", id), kind))
            .await
            .expect("create composite");
        ProductRepository::assign_inputs(
            self.db(),
            id,
            inputs
                .iter()
                .map(|(input, qty)| (input.to_string(), *qty))
                .collect(),
        )
        .await
        .expect("assign inputs");
    }

    pub async fn cost_of(&self, id: &str) -> Decimal {
        ProductRepository::require(self.db(), id)
            .await
            .expect("product")
            .cost
    }

    pub async fn stock_of(&self, id: &str) -> Decimal {
        self.services
            .kardex
            .stock_of(id)
            .await
            .expect("stock")
            .quantity
    }

    /// Manual adjustment of one product in GENERAL at the given instant.
    pub async fn adjust(
        &self,
        id: &str,
        quantity: Decimal,
        at: DateTime<Utc>,
    ) -> TransactionRecord {
        self.services
            .transactions
            .record(
                CausationEvent::adjustment(1, vec![MovementLine::new(id, quantity)])
                    .with_metadata(EventMetadata::by("tester").at(at)),
            )
            .await
            .expect("adjustment")
    }

    pub async fn set_switches(&self, forced_deletion: bool, bulk_load: bool, adjustments: bool) {
        SettingsRepository::update(self.db(), forced_deletion, bulk_load, adjustments)
            .await
            .expect("settings");
    }
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn at(y: i32, m: u32, d: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, hour, 0, 0).unwrap()
}

/// Journal stub that records every registration and either answers a fixed reference or fails.
#[derive(Default)]
pub struct StubJournal {
    pub fail: bool,
    pub amounts: Mutex<Vec<Decimal>>,
}

pub const JOURNAL_REF: i64 = 9001;

impl StubJournal {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl JournalEntryService for StubJournal {
    async fn register_entry_for_purchase_receipt(
        &self,
        _transaction: &TransactionRecord,
        _purchase_order: &purchase_order::Model,
        amount: Decimal,
    ) -> Result<i64, ServiceError> {
        self.amounts.lock().unwrap().push(amount);
        if self.fail {
            Err(ServiceError::ExternalServiceError("accounting is down".into()))
        } else {
            Ok(JOURNAL_REF)
        }
    }
}
