//! Startup routine run once after migrations.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use tracing::info;

use crate::entities::ledger_settings::{self, SINGLETON_ID};
use crate::errors::ServiceError;
use crate::repositories::SettingsRepository;

/// Inserts the settings row when it is missing. Safe to call on every start.
pub async fn ensure_defaults<C: ConnectionTrait>(
    db: &C,
) -> Result<ledger_settings::Model, ServiceError> {
    if let Some(existing) = SettingsRepository::find(db).await? {
        return Ok(existing);
    }

    let settings = ledger_settings::ActiveModel {
        id: Set(SINGLETON_ID),
        forced_deletion_enabled: Set(true),
        bulk_load_enabled: Set(true),
        adjustments_enabled: Set(true),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .map_err(ServiceError::db_error)?;

    info!("Created default ledger settings");
    Ok(settings)
}
