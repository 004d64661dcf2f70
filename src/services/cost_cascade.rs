use rust_decimal::Decimal;
use sea_orm::ConnectionTrait;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

use crate::entities::product;
use crate::errors::ServiceError;
use crate::repositories::ProductRepository;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostChange {
    pub product_id: String,
    pub old_cost: Decimal,
    pub new_cost: Decimal,
}

/// What one cascade invocation touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    /// Change at the origin product itself (purchase costing or override).
    pub origin: Option<CostChange>,
    /// Every composite product recomputed, in recomputation order. No id appears twice.
    pub recomputed: Vec<String>,
    /// Recomputed products whose cost actually moved.
    pub changes: Vec<CostChange>,
}

impl CascadeReport {
    pub fn all_changes(&self) -> impl Iterator<Item = &CostChange> {
        self.origin.iter().chain(self.changes.iter())
    }
}

/// `ceil((c0*q0 + p*q) / (q0 + q))`, rounded up to the whole currency unit.
pub fn weighted_average_cost(
    product_id: &str,
    current_cost: Decimal,
    on_hand: Decimal,
    unit_price: Decimal,
    incoming: Decimal,
) -> Result<Decimal, ServiceError> {
    let resulting = on_hand + incoming;
    if resulting.is_zero() {
        return Err(ServiceError::ZeroResultingStock {
            product_id: product_id.to_string(),
        });
    }
    let blended = (current_cost * on_hand + unit_price * incoming) / resulting;
    Ok(blended.ceil())
}

/// `Σ cost(input) * required quantity`
pub fn roll_up_cost<'a, I>(inputs: I) -> Decimal
where
    I: IntoIterator<Item = (&'a Decimal, &'a Decimal)>,
{
    inputs
        .into_iter()
        .map(|(cost, quantity)| *cost * *quantity)
        .sum()
}

/// Cost cascade engine. Runs inside the caller's unit of work.
pub struct CostCascade;

impl CostCascade {
    /// Applies weighted-average purchase costing to `product` and propagates.
    pub async fn apply_purchase<C: ConnectionTrait>(
        db: &C,
        product: &product::Model,
        on_hand: Decimal,
        unit_price: Decimal,
        incoming: Decimal,
    ) -> Result<CascadeReport, ServiceError> {
        let new_cost =
            weighted_average_cost(&product.id, product.cost, on_hand, unit_price, incoming)?;
        debug!(
            product_id = %product.id,
            %on_hand,
            %incoming,
            old_cost = %product.cost,
            %new_cost,
            "weighted average cost"
        );
        Self::set_and_propagate(db, product, new_cost).await
    }

    /// Direct cost override, bypassing weighted averaging, then propagation.
    pub async fn apply_override<C: ConnectionTrait>(
        db: &C,
        product: &product::Model,
        new_cost: Decimal,
    ) -> Result<CascadeReport, ServiceError> {
        Self::set_and_propagate(db, product, new_cost).await
    }

    async fn set_and_propagate<C: ConnectionTrait>(
        db: &C,
        product: &product::Model,
        new_cost: Decimal,
    ) -> Result<CascadeReport, ServiceError> {
        let origin = if new_cost != product.cost {
            ProductRepository::update_cost(db, product, new_cost).await?;
            Some(CostChange {
                product_id: product.id.clone(),
                old_cost: product.cost,
                new_cost,
            })
        } else {
            None
        };

        let mut report = Self::propagate(db, &product.id).await?;
        report.origin = origin;
        Ok(report)
    }

    /// Recomputes every transitive consumer of `origin_id` exactly once.
    ///
    /// Consumers are discovered breadth-first over the "is input of" edges with a visited set,
    /// then recomputed in dependency order so each roll-up reads already updated ingredients.
    /// Should the graph ever contain a cycle, the nodes on it are still recomputed once each.
    pub async fn propagate<C: ConnectionTrait>(
        db: &C,
        origin_id: &str,
    ) -> Result<CascadeReport, ServiceError> {
        let mut visited: HashSet<String> = HashSet::from([origin_id.to_string()]);
        let mut discovered: Vec<String> = Vec::new();
        let mut edges: Vec<(String, String)> = Vec::new();
        let mut queue: VecDeque<String> = VecDeque::from([origin_id.to_string()]);

        while let Some(current) = queue.pop_front() {
            for consumer in ProductRepository::find_consumers_of(db, &current).await? {
                edges.push((current.clone(), consumer.clone()));
                if visited.insert(consumer.clone()) {
                    discovered.push(consumer.clone());
                    queue.push_back(consumer);
                }
            }
        }

        let order = dependency_order(origin_id, &discovered, &edges);
        let mut report = CascadeReport::default();

        for product_id in order {
            let product = ProductRepository::require(db, &product_id).await?;
            if !product.product_kind().is_composite() {
                warn!(product_id = %product_id, "raw material listed as consumer; skipped");
                continue;
            }

            let inputs = ProductRepository::inputs_of(db, &product_id).await?;
            let ingredient_ids = inputs.iter().map(|i| i.input_product_id.clone()).collect();
            let ingredients = ProductRepository::find_by_ids(db, ingredient_ids).await?;

            let mut priced = Vec::with_capacity(inputs.len());
            for input in &inputs {
                let ingredient = ingredients
                    .get(&input.input_product_id)
                    .ok_or_else(|| ServiceError::ProductNotFound(input.input_product_id.clone()))?;
                priced.push((ingredient.cost, input.quantity));
            }
            let new_cost = roll_up_cost(priced.iter().map(|(c, q)| (c, q)));

            report.recomputed.push(product_id.clone());
            if new_cost != product.cost {
                ProductRepository::update_cost(db, &product, new_cost).await?;
                report.changes.push(CostChange {
                    product_id: product_id.clone(),
                    old_cost: product.cost,
                    new_cost,
                });
            }
        }

        Ok(report)
    }
}

/// Kahn ordering of `discovered` restricted to edges between discovered nodes. Nodes left over
/// by a cycle follow in discovery order.
fn dependency_order(origin: &str, discovered: &[String], edges: &[(String, String)]) -> Vec<String> {
    let mut indegree: HashMap<&str, usize> = discovered.iter().map(|d| (d.as_str(), 0)).collect();
    let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
    for (from, to) in edges {
        if from == origin {
            continue;
        }
        if let Some(count) = indegree.get_mut(to.as_str()) {
            *count += 1;
        }
        outgoing.entry(from.as_str()).or_default().push(to.as_str());
    }

    let mut ready: VecDeque<&str> = discovered
        .iter()
        .map(String::as_str)
        .filter(|d| indegree.get(d) == Some(&0))
        .collect();
    let mut placed: HashSet<&str> = HashSet::new();
    let mut order = Vec::with_capacity(discovered.len());

    while let Some(node) = ready.pop_front() {
        if !placed.insert(node) {
            continue;
        }
        order.push(node.to_string());
        for next in outgoing.get(node).into_iter().flatten() {
            if let Some(count) = indegree.get_mut(next) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    ready.push_back(*next);
                }
            }
        }
    }

    if order.len() < discovered.len() {
        warn!(
            origin,
            "cycle in product inputs; recomputing remaining consumers in discovery order"
        );
        for node in discovered {
            if placed.insert(node.as_str()) {
                order.push(node.clone());
            }
        }
    }
    order
}
