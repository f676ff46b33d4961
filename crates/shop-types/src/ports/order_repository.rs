use async_trait::async_trait;

use super::repo_error::RepoError;
use crate::domain::ids::OrderId;
use crate::domain::order::{Order, PlaceOrder};
use crate::query::filter::OrderSearch;

/// Write path and entity reads for orders.
///
/// `place_order` and `cancel_order` are atomic: stock changes and the order
/// row commit together or not at all.
#[async_trait]
pub trait OrderRepository: Send + Sync + 'static {
    async fn place_order(&self, command: PlaceOrder) -> Result<Order, RepoError>;
    async fn cancel_order(&self, id: OrderId) -> Result<Order, RepoError>;
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RepoError>;
    /// Full order entities matching `search`, oldest first, at most
    /// [`MAX_RESULTS`](crate::query::filter::MAX_RESULTS).
    async fn search_orders(&self, search: &OrderSearch) -> Result<Vec<Order>, RepoError>;
}
