use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::delivery::{Delivery, DeliveryStatus};
use super::errors::DomainError;
use super::ids::{ItemId, MemberId, OrderId, OrderItemId};
use super::item::Item;
use super::member::Member;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Ordered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Ordered => "ORDERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ORDERED" => Ok(OrderStatus::Ordered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub item_id: ItemId,
    /// Unit price captured when the order was placed.
    pub order_price: i64,
    pub count: u32,
}

impl OrderItem {
    /// Captures the item's current price and takes `count` units out of stock.
    pub fn create(order_id: OrderId, item: &mut Item, count: u32) -> Result<Self, DomainError> {
        if count == 0 {
            return Err(DomainError::Validation("item count must be > 0".into()));
        }
        item.remove_stock(count)?;
        Ok(Self {
            id: OrderItemId::new(),
            order_id,
            item_id: item.id,
            order_price: item.price,
            count,
        })
    }

    pub fn total_price(&self) -> i64 {
        self.order_price.saturating_mul(i64::from(self.count))
    }

    pub fn cancel(&self, item: &mut Item) {
        item.add_stock(self.count);
    }
}

/// One requested line of a new order.
pub struct OrderLine<'a> {
    pub item: &'a mut Item,
    pub count: u32,
}

impl<'a> OrderLine<'a> {
    pub fn new(item: &'a mut Item, count: u32) -> Self {
        Self { item, count }
    }
}

/// Requested line of a [`PlaceOrder`] command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub item_id: ItemId,
    pub count: u32,
}

/// Command to place an order for a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub member_id: MemberId,
    pub lines: Vec<OrderLineRequest>,
}

impl PlaceOrder {
    pub fn single(member_id: MemberId, item_id: ItemId, count: u32) -> Self {
        Self {
            member_id,
            lines: vec![OrderLineRequest { item_id, count }],
        }
    }

    /// Shape checks that need no stored state: at least one line, positive
    /// counts, each item at most once.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.lines.is_empty() {
            return Err(DomainError::Validation("order lines empty".into()));
        }
        for (i, line) in self.lines.iter().enumerate() {
            if line.count == 0 {
                return Err(DomainError::Validation("item count must be > 0".into()));
            }
            if self.lines[..i].iter().any(|l| l.item_id == line.item_id) {
                return Err(DomainError::Validation(format!(
                    "item {} appears more than once",
                    line.item_id
                )));
            }
        }
        Ok(())
    }

    pub fn item_ids(&self) -> Vec<ItemId> {
        self.lines.iter().map(|l| l.item_id).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub member_id: MemberId,
    pub delivery: Delivery,
    pub order_items: Vec<OrderItem>,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
}

impl Order {
    /// Places an order: every line is checked against stock before any stock
    /// moves, so a failing line leaves all items untouched.
    pub fn create(
        member: &Member,
        delivery: Delivery,
        lines: Vec<OrderLine<'_>>,
    ) -> Result<Self, DomainError> {
        if lines.is_empty() {
            return Err(DomainError::Validation("order lines empty".into()));
        }
        for line in &lines {
            if line.count == 0 {
                return Err(DomainError::Validation("item count must be > 0".into()));
            }
            line.item.ensure_stock(line.count)?;
        }
        checked_total(lines.iter().map(|line| (line.item.price, line.count)))
            .ok_or_else(|| DomainError::Validation("order total is out of range".into()))?;

        let id = OrderId::new();
        let order_items = lines
            .into_iter()
            .map(|line| OrderItem::create(id, line.item, line.count))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id,
            member_id: member.id,
            delivery,
            order_items,
            order_date: Utc::now(),
            status: OrderStatus::Ordered,
        })
    }

    /// Runs a [`PlaceOrder`] command against loaded state. `items` must hold
    /// the requested items in line order; the delivery ships to the member.
    pub fn place(
        member: &Member,
        command: &PlaceOrder,
        items: &mut [Item],
    ) -> Result<Self, DomainError> {
        command.validate()?;
        if member.id != command.member_id {
            return Err(DomainError::Validation("member does not match order".into()));
        }
        if items.len() != command.lines.len() {
            return Err(DomainError::Validation("items do not match order lines".into()));
        }

        let mut lines = Vec::with_capacity(items.len());
        for (item, line) in items.iter_mut().zip(&command.lines) {
            if item.id != line.item_id {
                return Err(DomainError::Validation("items do not match order lines".into()));
            }
            lines.push(OrderLine::new(item, line.count));
        }
        Self::create(member, Delivery::to_member(member), lines)
    }

    /// Orders built by [`Order::create`] never exceed `i64::MAX`; the sum
    /// saturates for anything assembled by hand.
    pub fn total_price(&self) -> i64 {
        self.order_items
            .iter()
            .map(OrderItem::total_price)
            .fold(0, i64::saturating_add)
    }

    /// Ids of every item this order references, in line order.
    pub fn item_ids(&self) -> Vec<ItemId> {
        self.order_items.iter().map(|oi| oi.item_id).collect()
    }

    /// Cancels the order and puts every line's quantity back into `items`.
    ///
    /// `items` must contain each referenced item; nothing is mutated unless
    /// the whole cancellation can go through.
    pub fn cancel(&mut self, items: &mut [Item]) -> Result<(), DomainError> {
        if self.status == OrderStatus::Cancelled {
            return Err(DomainError::AlreadyCancelled(self.id));
        }
        if self.delivery.status == DeliveryStatus::Completed {
            return Err(DomainError::AlreadyDelivered(self.id));
        }
        if let Some(missing) = self
            .order_items
            .iter()
            .find(|oi| !items.iter().any(|it| it.id == oi.item_id))
        {
            return Err(DomainError::MissingItem {
                order_id: self.id,
                item_id: missing.item_id,
            });
        }

        for oi in &self.order_items {
            if let Some(item) = items.iter_mut().find(|it| it.id == oi.item_id) {
                oi.cancel(item);
            }
        }
        self.status = OrderStatus::Cancelled;
        Ok(())
    }
}

fn checked_total(mut lines: impl Iterator<Item = (i64, u32)>) -> Option<i64> {
    lines.try_fold(0i64, |acc, (price, count)| {
        price
            .checked_mul(i64::from(count))
            .and_then(|line| acc.checked_add(line))
    })
}
