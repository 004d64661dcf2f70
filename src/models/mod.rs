pub mod bulk;
pub mod causation;
pub mod deletion;
pub mod kardex;

pub use bulk::{BulkReconciliationReport, BulkRow, BulkTemplateRow, RowError};
pub use causation::{
    CausationEvent, CostOverride, EventMetadata, LotSelection, MovementLine, NewLot,
    ProductionRun, ScrapLine, SourceDocumentKind, TransactionRecord,
};
pub use deletion::{DeletionOutcome, DependencyReport, DocumentSummary, LineItemSummary};
pub use kardex::{KardexExport, KardexPage, KardexQuery, KardexRow, ProductStock};
