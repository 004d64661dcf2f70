//! Storage access. Repositories are stateless and generic over [`sea_orm::ConnectionTrait`]
//! so the same query runs against the pool or inside an open transaction.

pub mod document_repository;
pub mod ledger_repository;
pub mod lot_repository;
pub mod product_repository;
pub mod settings_repository;

pub use document_repository::DocumentRepository;
pub use ledger_repository::{LedgerRepository, MovementPage, NewMovement, NewTransaction};
pub use lot_repository::{LotRepository, NewLotRecord};
pub use product_repository::{NewProduct, ProductRepository};
pub use settings_repository::SettingsRepository;
