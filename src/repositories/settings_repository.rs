use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};

use crate::entities::ledger_settings::{self, SINGLETON_ID};
use crate::errors::ServiceError;

pub struct SettingsRepository;

impl SettingsRepository {
    pub async fn find<C: ConnectionTrait>(
        db: &C,
    ) -> Result<Option<ledger_settings::Model>, ServiceError> {
        ledger_settings::Entity::find_by_id(SINGLETON_ID)
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// The settings row; its absence means startup never ran the bootstrap.
    pub async fn current<C: ConnectionTrait>(
        db: &C,
    ) -> Result<ledger_settings::Model, ServiceError> {
        Self::find(db).await?.ok_or_else(|| {
            ServiceError::InternalError(
                "ledger settings are missing; run the startup bootstrap first".to_string(),
            )
        })
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        forced_deletion_enabled: bool,
        bulk_load_enabled: bool,
        adjustments_enabled: bool,
    ) -> Result<ledger_settings::Model, ServiceError> {
        let mut active: ledger_settings::ActiveModel = Self::current(db).await?.into();
        active.forced_deletion_enabled = Set(forced_deletion_enabled);
        active.bulk_load_enabled = Set(bulk_load_enabled);
        active.adjustments_enabled = Set(adjustments_enabled);
        active.update(db).await.map_err(ServiceError::db_error)
    }
}
