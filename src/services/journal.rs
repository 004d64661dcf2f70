use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::entities::purchase_order;
use crate::errors::ServiceError;
use crate::models::TransactionRecord;

/// Accounting side of a purchase receipt. Opaque to the ledger: it only hands back the
/// reference of the journal entry it registered.
#[async_trait]
pub trait JournalEntryService: Send + Sync {
    async fn register_entry_for_purchase_receipt(
        &self,
        transaction: &TransactionRecord,
        purchase_order: &purchase_order::Model,
        amount: Decimal,
    ) -> Result<i64, ServiceError>;
}
