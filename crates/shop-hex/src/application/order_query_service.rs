//! Read-side strategies for order listings.
//!
//! Summary strategies differ in how the to-one data (member name, delivery
//! address) is fetched; view strategies differ in how each order's line
//! items are fetched. Every store call is awaited before the next one is
//! issued, and all maps built here live for one request only.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::QueryConfig;
use crate::errors::AppError;
use shop_types::domain::address::Address;
use shop_types::domain::ids::{DeliveryId, MemberId, OrderId};
use shop_types::ports::OrderQueryStore;
use shop_types::query::assembler::{attach_line_items, group_flat_rows, group_line_items};
use shop_types::query::filter::{OrderSearch, Page};
use shop_types::query::projection::{FlatOrderRow, OrderSummary, OrderView};

/// How root summaries obtain their member and delivery data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryStrategy {
    /// Order rows first, then one lookup per distinct member and delivery.
    Plain,
    /// One query joining order, member and delivery.
    Eager,
}

/// How order views obtain their line items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderViewStrategy {
    /// One line-item query per order.
    PerRoot,
    /// One `IN (...)` query per chunk of order ids.
    Batched,
    /// One fetch-join query, regrouped in memory. Cannot be paged.
    Flat,
}

impl SummaryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStrategy::Plain => "plain",
            SummaryStrategy::Eager => "eager",
        }
    }
}

impl OrderViewStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderViewStrategy::PerRoot => "per-root",
            OrderViewStrategy::Batched => "batched",
            OrderViewStrategy::Flat => "flat",
        }
    }
}

impl fmt::Display for SummaryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for OrderViewStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(SummaryStrategy::Plain),
            "eager" => Ok(SummaryStrategy::Eager),
            other => Err(AppError::BadRequest(format!(
                "unknown summary strategy {other:?}, expected plain or eager"
            ))),
        }
    }
}

impl FromStr for OrderViewStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "per-root" => Ok(OrderViewStrategy::PerRoot),
            "batched" => Ok(OrderViewStrategy::Batched),
            "flat" => Ok(OrderViewStrategy::Flat),
            other => Err(AppError::BadRequest(format!(
                "unknown view strategy {other:?}, expected per-root, batched or flat"
            ))),
        }
    }
}

pub struct OrderQueryService<R: OrderQueryStore> {
    store: Arc<R>,
    config: QueryConfig,
}

impl<R: OrderQueryStore> OrderQueryService<R> {
    pub fn new(store: Arc<R>, config: QueryConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> QueryConfig {
        self.config
    }

    pub async fn summaries(
        &self,
        strategy: SummaryStrategy,
        search: &OrderSearch,
        page: Option<Page>,
    ) -> Result<Vec<OrderSummary>, AppError> {
        match strategy {
            SummaryStrategy::Plain => self.plain_summaries(search, page).await,
            SummaryStrategy::Eager => self.eager_summaries(search, page).await,
        }
    }

    /// Paging the flat strategy is rejected: a row window would split orders.
    pub async fn views(
        &self,
        strategy: OrderViewStrategy,
        search: &OrderSearch,
        page: Option<Page>,
    ) -> Result<Vec<OrderView>, AppError> {
        match (strategy, page) {
            (OrderViewStrategy::PerRoot, _) => self.views_per_root(search, page).await,
            (OrderViewStrategy::Batched, _) => self.views_batched(search, page).await,
            (OrderViewStrategy::Flat, None) => self.views_flat(search).await,
            (OrderViewStrategy::Flat, Some(_)) => Err(AppError::BadRequest(
                "the flat strategy does not support offset/limit".into(),
            )),
        }
    }

    pub async fn plain_summaries(
        &self,
        search: &OrderSearch,
        page: Option<Page>,
    ) -> Result<Vec<OrderSummary>, AppError> {
        let rows = self.store.find_order_rows(search, page).await?;
        let mut queries = 1;
        let mut members: HashMap<MemberId, String> = HashMap::new();
        let mut deliveries: HashMap<DeliveryId, Address> = HashMap::new();

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let member_name = match members.get(&row.member_id) {
                Some(name) => name.clone(),
                None => {
                    queries += 1;
                    let name = self
                        .store
                        .find_member_name(row.member_id)
                        .await?
                        .ok_or_else(|| dangling("member", row.order_id, row.member_id))?;
                    members.insert(row.member_id, name.clone());
                    name
                }
            };
            let delivery_address = match deliveries.get(&row.delivery_id) {
                Some(address) => address.clone(),
                None => {
                    queries += 1;
                    let address = self
                        .store
                        .find_delivery_address(row.delivery_id)
                        .await?
                        .ok_or_else(|| dangling("delivery", row.order_id, row.delivery_id))?;
                    deliveries.insert(row.delivery_id, address.clone());
                    address
                }
            };
            summaries.push(OrderSummary {
                order_id: row.order_id,
                member_name,
                order_date: row.order_date,
                status: row.status,
                delivery_address,
            });
        }

        tracing::debug!(
            strategy = %SummaryStrategy::Plain,
            roots = summaries.len(),
            queries,
            "summaries resolved"
        );
        Ok(summaries)
    }

    pub async fn eager_summaries(
        &self,
        search: &OrderSearch,
        page: Option<Page>,
    ) -> Result<Vec<OrderSummary>, AppError> {
        let summaries = self.store.find_order_summaries(search, page).await?;
        tracing::debug!(
            strategy = %SummaryStrategy::Eager,
            roots = summaries.len(),
            queries = 1,
            "summaries resolved"
        );
        Ok(summaries)
    }

    pub async fn views_per_root(
        &self,
        search: &OrderSearch,
        page: Option<Page>,
    ) -> Result<Vec<OrderView>, AppError> {
        let roots = self.store.find_order_summaries(search, page).await?;
        let mut rows = Vec::new();
        for root in &roots {
            rows.extend(self.store.find_line_items(root.order_id).await?);
        }
        let queries = 1 + roots.len();

        let views = attach_line_items(roots, group_line_items(rows));
        tracing::debug!(
            strategy = %OrderViewStrategy::PerRoot,
            roots = views.len(),
            queries,
            "order views assembled"
        );
        Ok(views)
    }

    pub async fn views_batched(
        &self,
        search: &OrderSearch,
        page: Option<Page>,
    ) -> Result<Vec<OrderView>, AppError> {
        let roots = self.store.find_order_summaries(search, page).await?;
        let ids: Vec<OrderId> = roots.iter().map(|r| r.order_id).collect();

        let mut queries = 1;
        let mut rows = Vec::new();
        for chunk in ids.chunks(self.config.in_list_batch_size.max(1)) {
            rows.extend(self.store.find_line_items_in(chunk).await?);
            queries += 1;
        }

        let views = attach_line_items(roots, group_line_items(rows));
        tracing::debug!(
            strategy = %OrderViewStrategy::Batched,
            roots = views.len(),
            queries,
            batch_size = self.config.in_list_batch_size,
            "order views assembled"
        );
        Ok(views)
    }

    pub async fn views_flat(&self, search: &OrderSearch) -> Result<Vec<OrderView>, AppError> {
        let rows = self.store.find_flat_rows(search).await?;
        let row_count = rows.len();
        let views = group_flat_rows(rows);
        tracing::debug!(
            strategy = %OrderViewStrategy::Flat,
            rows = row_count,
            roots = views.len(),
            queries = 1,
            "order views assembled"
        );
        Ok(views)
    }

    /// The fetch-join rows as the store returns them, one per line item.
    pub async fn flat_rows(&self, search: &OrderSearch) -> Result<Vec<FlatOrderRow>, AppError> {
        let rows = self.store.find_flat_rows(search).await?;
        tracing::debug!(rows = rows.len(), queries = 1, "flat rows fetched");
        Ok(rows)
    }
}

fn dangling(what: &str, order_id: OrderId, id: impl fmt::Display) -> AppError {
    AppError::Internal(anyhow::anyhow!(
        "order {order_id} references missing {what} {id}"
    ))
}
