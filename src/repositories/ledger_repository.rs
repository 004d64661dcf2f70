use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::collections::HashMap;

use crate::entities::{
    movement::{self, MovementType, Warehouse},
    transaction_user,
    warehouse_transaction::{self, AccountingState, CausationType},
};
use crate::errors::ServiceError;
use crate::models::TransactionRecord;

/// Movement ready to be written with its owning transaction.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub product_id: String,
    pub quantity: Decimal,
    pub warehouse: Warehouse,
    pub movement_type: MovementType,
    pub lot_id: Option<i32>,
    pub production_area_id: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub causation: CausationType,
    pub causation_id: i32,
    pub accounting_state: AccountingState,
    pub support_document_url: Option<String>,
    pub notes: Option<String>,
    pub approved_by: Option<String>,
    pub responsible_users: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub movements: Vec<NewMovement>,
}

/// One page of movements plus totals for the whole filtered range.
#[derive(Debug, Clone)]
pub struct MovementPage {
    pub movements: Vec<movement::Model>,
    pub total_items: u64,
    pub total_pages: u64,
}

/// Ledger store: transactions and movements.
///
/// Every method takes the connection explicitly so the same query can run on the pool or
/// inside an open transaction.
pub struct LedgerRepository;

impl LedgerRepository {
    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: i32,
    ) -> Result<Option<TransactionRecord>, ServiceError> {
        let found = warehouse_transaction::Entity::find_by_id(id)
            .find_with_related(movement::Entity)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(Self::attach_users(db, found).await?.into_iter().next())
    }

    /// Transactions caused by the given document, oldest first.
    pub async fn find_by_causation<C: ConnectionTrait>(
        db: &C,
        causation: CausationType,
        causation_id: i32,
    ) -> Result<Vec<TransactionRecord>, ServiceError> {
        let found = warehouse_transaction::Entity::find()
            .filter(warehouse_transaction::Column::CausationType.eq(causation.as_str()))
            .filter(warehouse_transaction::Column::CausationId.eq(causation_id))
            .order_by_asc(warehouse_transaction::Column::Id)
            .find_with_related(movement::Entity)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        Self::attach_users(db, found).await
    }

    pub async fn count_by_causation<C: ConnectionTrait>(
        db: &C,
        causation: CausationType,
        causation_id: i32,
    ) -> Result<u64, ServiceError> {
        warehouse_transaction::Entity::find()
            .filter(warehouse_transaction::Column::CausationType.eq(causation.as_str()))
            .filter(warehouse_transaction::Column::CausationId.eq(causation_id))
            .count(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Next free document number for causations without a source document (bulk loads).
    pub async fn next_causation_id<C: ConnectionTrait>(
        db: &C,
        causation: CausationType,
    ) -> Result<i32, ServiceError> {
        let max = warehouse_transaction::Entity::find()
            .select_only()
            .column_as(warehouse_transaction::Column::CausationId.max(), "max_id")
            .filter(warehouse_transaction::Column::CausationType.eq(causation.as_str()))
            .into_tuple::<Option<i32>>()
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(max.flatten().unwrap_or(0) + 1)
    }

    /// Movements of a product within `[from, to]` ordered by (timestamp, id), paginated.
    pub async fn find_page_by_product_and_range<C: ConnectionTrait>(
        db: &C,
        product_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        page: u64,
        size: u64,
    ) -> Result<MovementPage, ServiceError> {
        let paginator = movement::Entity::find()
            .filter(Self::range_condition(product_id, from, to))
            .order_by_asc(movement::Column::CreatedAt)
            .order_by_asc(movement::Column::Id)
            .paginate(db, size);

        let totals = paginator
            .num_items_and_pages()
            .await
            .map_err(ServiceError::db_error)?;
        // Past the last page there is nothing to fetch, and page * size could overflow.
        let movements = if page >= totals.number_of_pages {
            Vec::new()
        } else {
            paginator
                .fetch_page(page)
                .await
                .map_err(ServiceError::db_error)?
        };

        Ok(MovementPage {
            movements,
            total_items: totals.number_of_items,
            total_pages: totals.number_of_pages,
        })
    }

    pub async fn find_all_by_product_and_range<C: ConnectionTrait>(
        db: &C,
        product_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<movement::Model>, ServiceError> {
        movement::Entity::find()
            .filter(Self::range_condition(product_id, from, to))
            .order_by_asc(movement::Column::CreatedAt)
            .order_by_asc(movement::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Sum of signed quantities for a product, optionally only strictly before `before`.
    pub async fn sum_signed_quantity<C: ConnectionTrait>(
        db: &C,
        product_id: &str,
        before: Option<DateTime<Utc>>,
    ) -> Result<Decimal, ServiceError> {
        let mut condition = Condition::all().add(movement::Column::ProductId.eq(product_id));
        if let Some(before) = before {
            condition = condition.add(movement::Column::CreatedAt.lt(before));
        }
        Self::sum_quantity(db, condition).await
    }

    /// Sum of signed quantities inside `[from, to]` ordered strictly before the cursor row
    /// `(cursor_ts, cursor_id)` under the (timestamp, id) ordering.
    pub async fn sum_signed_quantity_in_range_before_cursor<C: ConnectionTrait>(
        db: &C,
        product_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        cursor_ts: DateTime<Utc>,
        cursor_id: i32,
    ) -> Result<Decimal, ServiceError> {
        let before_cursor = Condition::any()
            .add(movement::Column::CreatedAt.lt(cursor_ts))
            .add(
                Condition::all()
                    .add(movement::Column::CreatedAt.eq(cursor_ts))
                    .add(movement::Column::Id.lt(cursor_id)),
            );
        let condition = Self::range_condition(product_id, from, to).add(before_cursor);
        Self::sum_quantity(db, condition).await
    }

    /// Writes the transaction, its responsible users and its movements.
    pub async fn save<C: ConnectionTrait>(
        db: &C,
        new: NewTransaction,
    ) -> Result<(warehouse_transaction::Model, Vec<movement::Model>), ServiceError> {
        let transaction = warehouse_transaction::ActiveModel {
            causation_type: Set(new.causation.as_str().to_string()),
            causation_id: Set(new.causation_id),
            accounting_state: Set(new.accounting_state.as_str().to_string()),
            journal_entry_id: Set(None),
            support_document_url: Set(new.support_document_url),
            notes: Set(new.notes),
            approved_by: Set(new.approved_by),
            created_at: Set(new.created_at),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        for username in new.responsible_users {
            transaction_user::ActiveModel {
                transaction_id: Set(transaction.id),
                username: Set(username),
                ..Default::default()
            }
            .insert(db)
            .await
            .map_err(ServiceError::db_error)?;
        }

        let mut movements = Vec::with_capacity(new.movements.len());
        for line in new.movements {
            let saved = movement::ActiveModel {
                transaction_id: Set(transaction.id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity),
                warehouse: Set(line.warehouse.as_str().to_string()),
                movement_type: Set(line.movement_type.as_str().to_string()),
                lot_id: Set(line.lot_id),
                production_area_id: Set(line.production_area_id),
                created_at: Set(new.created_at),
                ..Default::default()
            }
            .insert(db)
            .await
            .map_err(ServiceError::db_error)?;
            movements.push(saved);
        }

        Ok((transaction, movements))
    }

    /// The only mutation allowed on a recorded transaction besides clearing the reference.
    pub async fn mark_posted<C: ConnectionTrait>(
        db: &C,
        id: i32,
        journal_entry_id: i64,
    ) -> Result<warehouse_transaction::Model, ServiceError> {
        let existing = warehouse_transaction::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::InternalError(format!("transaction {} vanished", id)))?;

        let mut active: warehouse_transaction::ActiveModel = existing.into();
        active.accounting_state = Set(AccountingState::Posted.as_str().to_string());
        active.journal_entry_id = Set(Some(journal_entry_id));
        active.update(db).await.map_err(ServiceError::db_error)
    }

    /// Removes a transaction with its movements and users. A posted transaction first drops
    /// its journal-entry reference.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: i32) -> Result<(), ServiceError> {
        let Some(existing) = warehouse_transaction::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
        else {
            return Ok(());
        };

        if existing.journal_entry_id.is_some() {
            warehouse_transaction::Entity::update_many()
                .col_expr(
                    warehouse_transaction::Column::JournalEntryId,
                    Expr::value(Option::<i64>::None),
                )
                .filter(warehouse_transaction::Column::Id.eq(id))
                .exec(db)
                .await
                .map_err(ServiceError::db_error)?;
        }

        movement::Entity::delete_many()
            .filter(movement::Column::TransactionId.eq(id))
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;
        transaction_user::Entity::delete_many()
            .filter(transaction_user::Column::TransactionId.eq(id))
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;
        warehouse_transaction::Entity::delete_by_id(id)
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(())
    }

    fn range_condition(product_id: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Condition {
        Condition::all()
            .add(movement::Column::ProductId.eq(product_id))
            .add(movement::Column::CreatedAt.gte(from))
            .add(movement::Column::CreatedAt.lte(to))
    }

    async fn sum_quantity<C: ConnectionTrait>(
        db: &C,
        condition: Condition,
    ) -> Result<Decimal, ServiceError> {
        let total = movement::Entity::find()
            .select_only()
            .column_as(Expr::col(movement::Column::Quantity).sum(), "total")
            .filter(condition)
            .into_tuple::<Option<Decimal>>()
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(total.flatten().unwrap_or(Decimal::ZERO))
    }

    async fn attach_users<C: ConnectionTrait>(
        db: &C,
        found: Vec<(warehouse_transaction::Model, Vec<movement::Model>)>,
    ) -> Result<Vec<TransactionRecord>, ServiceError> {
        let ids: Vec<i32> = found.iter().map(|(t, _)| t.id).collect();
        let mut users: HashMap<i32, Vec<String>> = HashMap::new();
        if !ids.is_empty() {
            for user in transaction_user::Entity::find()
                .filter(transaction_user::Column::TransactionId.is_in(ids))
                .order_by_asc(transaction_user::Column::Id)
                .all(db)
                .await
                .map_err(ServiceError::db_error)?
            {
                users.entry(user.transaction_id).or_default().push(user.username);
            }
        }

        Ok(found
            .into_iter()
            .map(|(transaction, mut movements)| {
                movements.sort_by_key(|m| m.id);
                let responsible_users = users.remove(&transaction.id).unwrap_or_default();
                TransactionRecord {
                    transaction,
                    movements,
                    lots_created: Vec::new(),
                    responsible_users,
                }
            })
            .collect())
    }
}
