use std::sync::Arc;

use crate::errors::AppError;
use shop_types::domain::ids::OrderId;
use shop_types::domain::order::{Order, PlaceOrder};
use shop_types::ports::OrderRepository;
use shop_types::query::filter::OrderSearch;

pub struct OrderService<R: OrderRepository> {
    repo: Arc<R>,
}

impl<R: OrderRepository> OrderService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Decrements stock and creates the delivery in one store transaction.
    pub async fn place_order(&self, command: PlaceOrder) -> Result<Order, AppError> {
        command.validate()?;
        let order = self.repo.place_order(command).await?;
        tracing::info!(
            order_id = %order.id,
            member_id = %order.member_id,
            lines = order.order_items.len(),
            total = order.total_price(),
            "order placed"
        );
        Ok(order)
    }

    pub async fn get_order(&self, id: OrderId) -> Result<Order, AppError> {
        self.repo
            .find_order(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {id}")))
    }

    pub async fn search_orders(&self, search: &OrderSearch) -> Result<Vec<Order>, AppError> {
        Ok(self.repo.search_orders(search).await?)
    }

    pub async fn cancel_order(&self, id: OrderId) -> Result<Order, AppError> {
        let order = self.repo.cancel_order(id).await?;
        tracing::info!(order_id = %id, "order cancelled");
        Ok(order)
    }
}
