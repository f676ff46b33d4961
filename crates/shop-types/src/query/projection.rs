//! Read-side shapes produced by the order query strategies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::address::Address;
use crate::domain::ids::{DeliveryId, MemberId, OrderId};
use crate::domain::order::OrderStatus;

/// Order columns only, with to-one associations left as identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRow {
    pub order_id: OrderId,
    pub member_id: MemberId,
    pub delivery_id: DeliveryId,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
}

/// Root row: an order plus its to-one data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub member_name: String,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub delivery_address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub item_name: String,
    pub unit_price: i64,
    pub quantity: u32,
}

/// A line item tagged with its owning order, as returned by collection queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRow {
    pub order_id: OrderId,
    pub item_name: String,
    pub unit_price: i64,
    pub quantity: u32,
}

impl LineItemRow {
    pub fn into_line(self) -> OrderLineItem {
        OrderLineItem {
            item_name: self.item_name,
            unit_price: self.unit_price,
            quantity: self.quantity,
        }
    }
}

/// One (order, line item) pair from the fetch-join query; root fields repeat
/// once per line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatOrderRow {
    pub order_id: OrderId,
    pub member_name: String,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub delivery_address: Address,
    pub item_name: String,
    pub unit_price: i64,
    pub quantity: u32,
}

impl FlatOrderRow {
    pub fn line(&self) -> OrderLineItem {
        OrderLineItem {
            item_name: self.item_name.clone(),
            unit_price: self.unit_price,
            quantity: self.quantity,
        }
    }

    pub fn into_summary(self) -> OrderSummary {
        OrderSummary {
            order_id: self.order_id,
            member_name: self.member_name,
            order_date: self.order_date,
            status: self.status,
            delivery_address: self.delivery_address,
        }
    }
}

/// Nested order-with-line-items projection shared by all collection strategies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub order_id: OrderId,
    pub member_name: String,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub delivery_address: Address,
    pub line_items: Vec<OrderLineItem>,
}

impl OrderView {
    pub fn new(summary: OrderSummary, line_items: Vec<OrderLineItem>) -> Self {
        Self {
            order_id: summary.order_id,
            member_name: summary.member_name,
            order_date: summary.order_date,
            status: summary.status,
            delivery_address: summary.delivery_address,
            line_items,
        }
    }
}
