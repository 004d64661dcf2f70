//! Ledger operations. Each public entry point is one unit of work against the store.

pub mod bulk_reconciliation;
pub mod cost_cascade;
pub mod forced_deletion;
pub mod journal;
pub mod kardex;
pub mod product_locks;
pub mod purchase_receipt;
pub mod transaction_builder;

pub use bulk_reconciliation::BulkReconciliationService;
pub use cost_cascade::{CascadeReport, CostCascade, CostChange};
pub use forced_deletion::ForcedDeletionService;
pub use journal::JournalEntryService;
pub use kardex::KardexService;
pub use product_locks::ProductLocks;
pub use purchase_receipt::{PurchaseReceiptOutcome, PurchaseReceiptService, ReceiptLine};
pub use transaction_builder::{LotPolicy, TransactionBuilder};
