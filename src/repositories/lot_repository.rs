use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use std::collections::HashMap;

use crate::entities::lot;
use crate::errors::ServiceError;
use crate::models::SourceDocumentKind;

#[derive(Debug, Clone)]
pub struct NewLotRecord {
    pub batch_number: String,
    pub production_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub source: Option<(SourceDocumentKind, i32)>,
    pub created_at: DateTime<Utc>,
}

pub struct LotRepository;

impl LotRepository {
    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: i32,
    ) -> Result<Option<lot::Model>, ServiceError> {
        lot::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn find_by_ids<C: ConnectionTrait>(
        db: &C,
        ids: Vec<i32>,
    ) -> Result<HashMap<i32, lot::Model>, ServiceError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(lot::Entity::find()
            .filter(lot::Column::Id.is_in(ids))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|l| (l.id, l))
            .collect())
    }

    pub async fn batch_number_exists<C: ConnectionTrait>(
        db: &C,
        batch_number: &str,
    ) -> Result<bool, ServiceError> {
        let count = lot::Entity::find()
            .filter(lot::Column::BatchNumber.eq(batch_number))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(count > 0)
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        new: NewLotRecord,
    ) -> Result<lot::Model, ServiceError> {
        let (purchase_order_id, production_order_id) = match new.source {
            Some((SourceDocumentKind::PurchaseOrder, id)) => (Some(id), None),
            Some((SourceDocumentKind::ProductionOrder, id)) => (None, Some(id)),
            None => (None, None),
        };
        lot::ActiveModel {
            batch_number: Set(new.batch_number),
            production_date: Set(new.production_date),
            expiration_date: Set(new.expiration_date),
            purchase_order_id: Set(purchase_order_id),
            production_order_id: Set(production_order_id),
            created_at: Set(new.created_at),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)
    }

    pub async fn find_by_source_document<C: ConnectionTrait>(
        db: &C,
        kind: SourceDocumentKind,
        id: i32,
    ) -> Result<Vec<lot::Model>, ServiceError> {
        lot::Entity::find()
            .filter(Self::source_column(kind).eq(id))
            .order_by_asc(lot::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Clears the document reference of every lot created for it. Lots themselves stay.
    pub async fn detach_from_source_document<C: ConnectionTrait>(
        db: &C,
        kind: SourceDocumentKind,
        id: i32,
    ) -> Result<u64, ServiceError> {
        let column = Self::source_column(kind);
        let result = lot::Entity::update_many()
            .col_expr(column, Expr::value(Option::<i32>::None))
            .filter(column.eq(id))
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(result.rows_affected)
    }

    fn source_column(kind: SourceDocumentKind) -> lot::Column {
        match kind {
            SourceDocumentKind::PurchaseOrder => lot::Column::PurchaseOrderId,
            SourceDocumentKind::ProductionOrder => lot::Column::ProductionOrderId,
        }
    }
}
