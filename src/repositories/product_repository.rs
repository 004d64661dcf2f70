use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use std::collections::{HashMap, HashSet};

use crate::entities::{
    product::{self, ProductKind},
    product_input,
};
use crate::errors::ServiceError;

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub id: String,
    pub name: String,
    pub unit_of_measure: String,
    pub cost: Decimal,
    pub inventoriable: bool,
    pub kind: ProductKind,
    pub lot_prefix: Option<String>,
}

impl NewProduct {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ProductKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit_of_measure: "KG".to_string(),
            cost: Decimal::ZERO,
            inventoriable: true,
            kind,
            lot_prefix: None,
        }
    }

    pub fn with_cost(mut self, cost: Decimal) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit_of_measure = unit.into();
        self
    }

    pub fn with_lot_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.lot_prefix = Some(prefix.into());
        self
    }

    pub fn not_inventoriable(mut self) -> Self {
        self.inventoriable = false;
        self
    }
}

/// Product/BOM store.
pub struct ProductRepository;

impl ProductRepository {
    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        id: &str,
    ) -> Result<Option<product::Model>, ServiceError> {
        product::Entity::find_by_id(id.to_string())
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn require<C: ConnectionTrait>(
        db: &C,
        id: &str,
    ) -> Result<product::Model, ServiceError> {
        Self::find_by_id(db, id)
            .await?
            .ok_or_else(|| ServiceError::ProductNotFound(id.to_string()))
    }

    pub async fn find_by_ids<C: ConnectionTrait>(
        db: &C,
        ids: Vec<String>,
    ) -> Result<HashMap<String, product::Model>, ServiceError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        Ok(product::Entity::find()
            .filter(product::Column::Id.is_in(ids))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect())
    }

    /// Composite products listing `id` as a direct input.
    pub async fn find_consumers_of<C: ConnectionTrait>(
        db: &C,
        id: &str,
    ) -> Result<Vec<String>, ServiceError> {
        product_input::Entity::find()
            .select_only()
            .column(product_input::Column::ProductId)
            .distinct()
            .filter(product_input::Column::InputProductId.eq(id))
            .order_by_asc(product_input::Column::ProductId)
            .into_tuple::<String>()
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn inputs_of<C: ConnectionTrait>(
        db: &C,
        id: &str,
    ) -> Result<Vec<product_input::Model>, ServiceError> {
        product_input::Entity::find()
            .filter(product_input::Column::ProductId.eq(id))
            .order_by_asc(product_input::Column::Position)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        new: NewProduct,
    ) -> Result<product::Model, ServiceError> {
        if new.cost.is_sign_negative() {
            return Err(ServiceError::ValidationError(format!(
                "cost of product {} must not be negative",
                new.id
            )));
        }
        let now = Utc::now();
        product::ActiveModel {
            id: Set(new.id),
            name: Set(new.name),
            unit_of_measure: Set(new.unit_of_measure),
            cost: Set(new.cost),
            inventoriable: Set(new.inventoriable),
            kind: Set(new.kind.as_str().to_string()),
            lot_prefix: Set(new.lot_prefix),
            version: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)
    }

    /// Attaches the ingredient list of a composite product. Inputs are assigned once; the call
    /// refuses anything that would make the product (transitively) require itself.
    pub async fn assign_inputs<C: ConnectionTrait>(
        db: &C,
        product_id: &str,
        inputs: Vec<(String, Decimal)>,
    ) -> Result<Vec<product_input::Model>, ServiceError> {
        let product = Self::require(db, product_id).await?;
        if !product.product_kind().is_composite() {
            return Err(ServiceError::InvariantViolation(format!(
                "product {} is a raw material and cannot own inputs",
                product_id
            )));
        }

        let existing = product_input::Entity::find()
            .filter(product_input::Column::ProductId.eq(product_id))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        if existing > 0 {
            return Err(ServiceError::InvariantViolation(format!(
                "inputs of product {} are already assigned",
                product_id
            )));
        }

        for (input_id, quantity) in &inputs {
            Self::require(db, input_id).await?;
            if quantity.is_sign_negative() && !quantity.is_zero() {
                return Err(ServiceError::ValidationError(format!(
                    "required quantity of {} in {} must not be negative",
                    input_id, product_id
                )));
            }
            if Self::requires_transitively(db, input_id, product_id).await? {
                return Err(ServiceError::InvariantViolation(format!(
                    "adding {} as input of {} would create a cycle",
                    input_id, product_id
                )));
            }
        }

        let mut saved = Vec::with_capacity(inputs.len());
        for (position, (input_id, quantity)) in inputs.into_iter().enumerate() {
            let model = product_input::ActiveModel {
                product_id: Set(product_id.to_string()),
                input_product_id: Set(input_id),
                quantity: Set(quantity),
                position: Set(position as i32),
                ..Default::default()
            }
            .insert(db)
            .await
            .map_err(ServiceError::db_error)?;
            saved.push(model);
        }
        Ok(saved)
    }

    /// Writes a new cost guarded by the version read together with `product`.
    ///
    /// Returns `ConcurrentModification` when someone else wrote the cost in between.
    pub async fn update_cost<C: ConnectionTrait>(
        db: &C,
        product: &product::Model,
        new_cost: Decimal,
    ) -> Result<product::Model, ServiceError> {
        if new_cost.is_sign_negative() && !new_cost.is_zero() {
            return Err(ServiceError::InvariantViolation(format!(
                "cost of product {} would become negative ({})",
                product.id, new_cost
            )));
        }
        let now = Utc::now();
        let result = product::Entity::update_many()
            .col_expr(product::Column::Cost, Expr::value(new_cost))
            .col_expr(product::Column::Version, Expr::value(product.version + 1))
            .col_expr(product::Column::UpdatedAt, Expr::value(now))
            .filter(product::Column::Id.eq(product.id.as_str()))
            .filter(product::Column::Version.eq(product.version))
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;

        if result.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(format!(
                "cost of product {} changed while it was being recalculated",
                product.id
            )));
        }

        Ok(product::Model {
            cost: new_cost,
            version: product.version + 1,
            updated_at: now,
            ..product.clone()
        })
    }

    pub async fn list_inventoriable_materials<C: ConnectionTrait>(
        db: &C,
    ) -> Result<Vec<product::Model>, ServiceError> {
        product::Entity::find()
            .filter(product::Column::Kind.eq(ProductKind::Material.as_str()))
            .filter(product::Column::Inventoriable.eq(true))
            .order_by_asc(product::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Whether `from` reaches `target` walking the ingredient edges downwards.
    async fn requires_transitively<C: ConnectionTrait>(
        db: &C,
        from: &str,
        target: &str,
    ) -> Result<bool, ServiceError> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut stack = vec![from.to_string()];
        while let Some(current) = stack.pop() {
            if current == target {
                return Ok(true);
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            for input in Self::inputs_of(db, &current).await? {
                stack.push(input.input_product_id);
            }
        }
        Ok(false)
    }
}
