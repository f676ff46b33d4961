use async_trait::async_trait;

use super::repo_error::RepoError;
use crate::domain::address::Address;
use crate::domain::ids::{DeliveryId, MemberId, OrderId};
use crate::query::filter::{OrderSearch, Page};
use crate::query::projection::{FlatOrderRow, LineItemRow, OrderRow, OrderSummary};

/// Read primitives behind the order query strategies.
///
/// Every method is one round trip to the store. Root queries return orders
/// oldest first and never more than
/// [`MAX_RESULTS`](crate::query::filter::MAX_RESULTS) rows; line items come
/// back in placement order within each order.
#[async_trait]
pub trait OrderQueryStore: Send + Sync + 'static {
    /// Order columns only; the member join exists solely to apply the filter.
    async fn find_order_rows(
        &self,
        search: &OrderSearch,
        page: Option<Page>,
    ) -> Result<Vec<OrderRow>, RepoError>;

    async fn find_member_name(&self, id: MemberId) -> Result<Option<String>, RepoError>;

    async fn find_delivery_address(&self, id: DeliveryId)
        -> Result<Option<Address>, RepoError>;

    /// Orders joined with member and delivery in a single query.
    async fn find_order_summaries(
        &self,
        search: &OrderSearch,
        page: Option<Page>,
    ) -> Result<Vec<OrderSummary>, RepoError>;

    async fn find_line_items(&self, order_id: OrderId) -> Result<Vec<LineItemRow>, RepoError>;

    /// Line items of every listed order (`order_id IN (...)`).
    async fn find_line_items_in(
        &self,
        order_ids: &[OrderId],
    ) -> Result<Vec<LineItemRow>, RepoError>;

    /// Order → member → delivery → order item → item in one query, one row per
    /// line item. Takes no page: a row limit would cut orders apart.
    async fn find_flat_rows(&self, search: &OrderSearch) -> Result<Vec<FlatOrderRow>, RepoError>;
}
