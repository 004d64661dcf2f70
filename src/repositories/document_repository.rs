use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::{
    production_order, production_order_line, purchase_order, purchase_order_item,
};
use crate::errors::ServiceError;
use crate::models::{DocumentSummary, LineItemSummary, SourceDocumentKind};

/// Purchase and production orders as far as the ledger needs them.
pub struct DocumentRepository;

impl DocumentRepository {
    /// Creates an open purchase order with `(product, quantity, unit price)` items.
    pub async fn create_purchase_order<C: ConnectionTrait>(
        db: &C,
        supplier: &str,
        items: Vec<(String, Decimal, Decimal)>,
    ) -> Result<(purchase_order::Model, Vec<purchase_order_item::Model>), ServiceError> {
        let order = purchase_order::ActiveModel {
            supplier: Set(supplier.to_string()),
            status: Set("OPEN".to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        let mut saved = Vec::with_capacity(items.len());
        for (product_id, quantity, unit_price) in items {
            let item = purchase_order_item::ActiveModel {
                purchase_order_id: Set(order.id),
                product_id: Set(product_id),
                quantity: Set(quantity),
                unit_price: Set(unit_price),
                ..Default::default()
            }
            .insert(db)
            .await
            .map_err(ServiceError::db_error)?;
            saved.push(item);
        }
        Ok((order, saved))
    }

    /// Creates a planned production order with `(input product, required quantity)` lines.
    pub async fn create_production_order<C: ConnectionTrait>(
        db: &C,
        product_id: &str,
        planned_quantity: Decimal,
        lines: Vec<(String, Decimal)>,
    ) -> Result<(production_order::Model, Vec<production_order_line::Model>), ServiceError> {
        let order = production_order::ActiveModel {
            product_id: Set(product_id.to_string()),
            planned_quantity: Set(planned_quantity),
            status: Set("PLANNED".to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        let mut saved = Vec::with_capacity(lines.len());
        for (input_id, required_quantity) in lines {
            let line = production_order_line::ActiveModel {
                production_order_id: Set(order.id),
                product_id: Set(input_id),
                required_quantity: Set(required_quantity),
                status: Set("PENDING".to_string()),
                ..Default::default()
            }
            .insert(db)
            .await
            .map_err(ServiceError::db_error)?;
            saved.push(line);
        }
        Ok((order, saved))
    }

    pub async fn find_purchase_order<C: ConnectionTrait>(
        db: &C,
        id: i32,
    ) -> Result<Option<purchase_order::Model>, ServiceError> {
        purchase_order::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn require_purchase_order<C: ConnectionTrait>(
        db: &C,
        id: i32,
    ) -> Result<purchase_order::Model, ServiceError> {
        Self::find_purchase_order(db, id)
            .await?
            .ok_or(ServiceError::DocumentNotFound {
                kind: SourceDocumentKind::PurchaseOrder,
                id,
            })
    }

    /// Header and line items of either document kind, `None` when it does not exist.
    pub async fn summary<C: ConnectionTrait>(
        db: &C,
        kind: SourceDocumentKind,
        id: i32,
    ) -> Result<Option<(DocumentSummary, Vec<LineItemSummary>)>, ServiceError> {
        match kind {
            SourceDocumentKind::PurchaseOrder => {
                let Some(order) = Self::find_purchase_order(db, id).await? else {
                    return Ok(None);
                };
                let items = purchase_order_item::Entity::find()
                    .filter(purchase_order_item::Column::PurchaseOrderId.eq(id))
                    .order_by_asc(purchase_order_item::Column::Id)
                    .all(db)
                    .await
                    .map_err(ServiceError::db_error)?
                    .into_iter()
                    .map(|i| LineItemSummary {
                        id: i.id,
                        product_id: i.product_id,
                        quantity: i.quantity,
                    })
                    .collect();
                Ok(Some((
                    DocumentSummary {
                        kind,
                        id,
                        status: order.status,
                        counterpart: order.supplier,
                        created_at: order.created_at,
                    },
                    items,
                )))
            }
            SourceDocumentKind::ProductionOrder => {
                let Some(order) = production_order::Entity::find_by_id(id)
                    .one(db)
                    .await
                    .map_err(ServiceError::db_error)?
                else {
                    return Ok(None);
                };
                let lines = production_order_line::Entity::find()
                    .filter(production_order_line::Column::ProductionOrderId.eq(id))
                    .order_by_asc(production_order_line::Column::Id)
                    .all(db)
                    .await
                    .map_err(ServiceError::db_error)?
                    .into_iter()
                    .map(|l| LineItemSummary {
                        id: l.id,
                        product_id: l.product_id,
                        quantity: l.required_quantity,
                    })
                    .collect();
                Ok(Some((
                    DocumentSummary {
                        kind,
                        id,
                        status: order.status,
                        counterpart: order.product_id,
                        created_at: order.created_at,
                    },
                    lines,
                )))
            }
        }
    }

    pub async fn delete_line_items<C: ConnectionTrait>(
        db: &C,
        kind: SourceDocumentKind,
        id: i32,
    ) -> Result<u64, ServiceError> {
        let result = match kind {
            SourceDocumentKind::PurchaseOrder => purchase_order_item::Entity::delete_many()
                .filter(purchase_order_item::Column::PurchaseOrderId.eq(id))
                .exec(db)
                .await,
            SourceDocumentKind::ProductionOrder => production_order_line::Entity::delete_many()
                .filter(production_order_line::Column::ProductionOrderId.eq(id))
                .exec(db)
                .await,
        }
        .map_err(ServiceError::db_error)?;
        Ok(result.rows_affected)
    }

    pub async fn delete_document<C: ConnectionTrait>(
        db: &C,
        kind: SourceDocumentKind,
        id: i32,
    ) -> Result<u64, ServiceError> {
        let result = match kind {
            SourceDocumentKind::PurchaseOrder => {
                purchase_order::Entity::delete_by_id(id).exec(db).await
            }
            SourceDocumentKind::ProductionOrder => {
                production_order::Entity::delete_by_id(id).exec(db).await
            }
        }
        .map_err(ServiceError::db_error)?;
        Ok(result.rows_affected)
    }
}
