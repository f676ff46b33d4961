use async_trait::async_trait;
use dashmap::DashMap;
use shop_types::domain::address::Address;
use shop_types::domain::ids::{DeliveryId, ItemId, MemberId, OrderId};
use shop_types::domain::item::{Item, ItemUpdate};
use shop_types::domain::member::Member;
use shop_types::domain::order::{Order, PlaceOrder};
use shop_types::ports::{
    ItemRepository, MemberRepository, OrderQueryStore, OrderRepository, RepoError,
};
use shop_types::query::filter::{OrderSearch, Page, MAX_RESULTS};
use shop_types::query::projection::{FlatOrderRow, LineItemRow, OrderRow, OrderSummary};
use std::sync::Arc;
use tokio::sync::Mutex;

/// DashMap-backed store. Reads are lock-free; every write path runs under
/// `write_lock` so stock checks and decrements cannot interleave.
#[derive(Clone)]
pub struct InMemoryRepo {
    members: Arc<DashMap<MemberId, Member>>,
    items: Arc<DashMap<ItemId, Item>>,
    orders: Arc<DashMap<OrderId, Order>>,
    /// Delivery addresses by id, filled when an order is placed.
    deliveries: Arc<DashMap<DeliveryId, Address>>,
    write_lock: Arc<Mutex<()>>,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self {
            members: Arc::new(DashMap::new()),
            items: Arc::new(DashMap::new()),
            orders: Arc::new(DashMap::new()),
            deliveries: Arc::new(DashMap::new()),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn name_taken(&self, name: &str, except: Option<MemberId>) -> bool {
        self.members
            .iter()
            .any(|m| m.name == name && Some(m.id) != except)
    }

    fn member_name(&self, id: MemberId) -> Result<String, RepoError> {
        self.members
            .get(&id)
            .map(|m| m.name.clone())
            .ok_or_else(|| RepoError::DbError(format!("dangling member reference {id}")))
    }

    fn item_name(&self, id: ItemId) -> Result<String, RepoError> {
        self.items
            .get(&id)
            .map(|it| it.name.clone())
            .ok_or_else(|| RepoError::DbError(format!("dangling item reference {id}")))
    }

    fn load_items(&self, ids: &[ItemId]) -> Result<Vec<Item>, RepoError> {
        ids.iter()
            .map(|id| {
                self.items
                    .get(id)
                    .map(|it| it.clone())
                    .ok_or_else(|| RepoError::NotFound(format!("item {id}")))
            })
            .collect()
    }

    /// Orders joined with their member name, filtered, oldest first.
    fn matching_orders(&self, search: &OrderSearch) -> Result<Vec<(Order, String)>, RepoError> {
        let mut orders: Vec<Order> = self.orders.iter().map(|kv| kv.value().clone()).collect();
        orders.sort_by_key(|o| o.id);

        let mut matching = Vec::new();
        for order in orders {
            let member_name = self.member_name(order.member_id)?;
            if search.matches(order.status, &member_name) {
                matching.push((order, member_name));
            }
        }
        Ok(matching)
    }

    fn paged_orders(
        &self,
        search: &OrderSearch,
        page: Option<Page>,
    ) -> Result<Vec<(Order, String)>, RepoError> {
        let (offset, limit) = Page::window(page);
        Ok(self
            .matching_orders(search)?
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    fn line_rows(&self, order: &Order) -> Result<Vec<LineItemRow>, RepoError> {
        order
            .order_items
            .iter()
            .map(|oi| {
                Ok(LineItemRow {
                    order_id: order.id,
                    item_name: self.item_name(oi.item_id)?,
                    unit_price: oi.order_price,
                    quantity: oi.count,
                })
            })
            .collect()
    }
}

impl Default for InMemoryRepo {
    fn default() -> Self {
        Self::new()
    }
}

fn summary(order: &Order, member_name: String) -> OrderSummary {
    OrderSummary {
        order_id: order.id,
        member_name,
        order_date: order.order_date,
        status: order.status,
        delivery_address: order.delivery.address.clone(),
    }
}

#[async_trait]
impl MemberRepository for InMemoryRepo {
    async fn save_member(&self, member: Member) -> Result<Member, RepoError> {
        let _guard = self.write_lock.lock().await;
        if self.name_taken(&member.name, None) {
            return Err(RepoError::Conflict(format!(
                "member name {:?} already exists",
                member.name
            )));
        }
        self.members.insert(member.id, member.clone());
        Ok(member)
    }

    async fn find_member(&self, id: MemberId) -> Result<Option<Member>, RepoError> {
        Ok(self.members.get(&id).map(|r| r.clone()))
    }

    async fn find_members(&self) -> Result<Vec<Member>, RepoError> {
        let mut members: Vec<Member> = self.members.iter().map(|kv| kv.value().clone()).collect();
        members.sort_by_key(|m| m.id);
        Ok(members)
    }

    async fn find_members_by_name(&self, name: &str) -> Result<Vec<Member>, RepoError> {
        Ok(self
            .members
            .iter()
            .filter(|m| m.name == name)
            .map(|m| m.value().clone())
            .collect())
    }

    async fn rename_member(
        &self,
        id: MemberId,
        name: String,
    ) -> Result<Option<Member>, RepoError> {
        let _guard = self.write_lock.lock().await;
        let Some(mut member) = self.members.get(&id).map(|m| m.clone()) else {
            return Ok(None);
        };
        if self.name_taken(&name, Some(id)) {
            return Err(RepoError::Conflict(format!(
                "member name {name:?} already exists"
            )));
        }
        member.rename(name)?;
        self.members.insert(id, member.clone());
        Ok(Some(member))
    }
}

#[async_trait]
impl ItemRepository for InMemoryRepo {
    async fn save_item(&self, item: Item) -> Result<Item, RepoError> {
        let _guard = self.write_lock.lock().await;
        self.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn find_item(&self, id: ItemId) -> Result<Option<Item>, RepoError> {
        Ok(self.items.get(&id).map(|r| r.clone()))
    }

    async fn find_items(&self) -> Result<Vec<Item>, RepoError> {
        let mut items: Vec<Item> = self.items.iter().map(|kv| kv.value().clone()).collect();
        items.sort_by_key(|it| it.id);
        Ok(items)
    }

    async fn update_item(
        &self,
        id: ItemId,
        update: ItemUpdate,
    ) -> Result<Option<Item>, RepoError> {
        let _guard = self.write_lock.lock().await;
        let Some(mut item) = self.items.get(&id).map(|it| it.clone()) else {
            return Ok(None);
        };
        item.apply(update)?;
        self.items.insert(id, item.clone());
        Ok(Some(item))
    }
}

#[async_trait]
impl OrderRepository for InMemoryRepo {
    async fn place_order(&self, command: PlaceOrder) -> Result<Order, RepoError> {
        command.validate()?;
        let _guard = self.write_lock.lock().await;
        let member = self
            .members
            .get(&command.member_id)
            .map(|m| m.clone())
            .ok_or_else(|| RepoError::NotFound(format!("member {}", command.member_id)))?;
        let mut items = self.load_items(&command.item_ids())?;

        let order = Order::place(&member, &command, &mut items)?;
        for item in items {
            self.items.insert(item.id, item);
        }
        self.deliveries
            .insert(order.delivery.id, order.delivery.address.clone());
        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn cancel_order(&self, id: OrderId) -> Result<Order, RepoError> {
        let _guard = self.write_lock.lock().await;
        let mut order = self
            .orders
            .get(&id)
            .map(|o| o.clone())
            .ok_or_else(|| RepoError::NotFound(format!("order {id}")))?;
        let mut items = self.load_items(&order.item_ids())?;

        order.cancel(&mut items)?;
        for item in items {
            self.items.insert(item.id, item);
        }
        self.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RepoError> {
        Ok(self.orders.get(&id).map(|o| o.clone()))
    }

    async fn search_orders(&self, search: &OrderSearch) -> Result<Vec<Order>, RepoError> {
        Ok(self
            .matching_orders(search)?
            .into_iter()
            .take(MAX_RESULTS)
            .map(|(order, _)| order)
            .collect())
    }
}

#[async_trait]
impl OrderQueryStore for InMemoryRepo {
    async fn find_order_rows(
        &self,
        search: &OrderSearch,
        page: Option<Page>,
    ) -> Result<Vec<OrderRow>, RepoError> {
        Ok(self
            .paged_orders(search, page)?
            .into_iter()
            .map(|(o, _)| OrderRow {
                order_id: o.id,
                member_id: o.member_id,
                delivery_id: o.delivery.id,
                order_date: o.order_date,
                status: o.status,
            })
            .collect())
    }

    async fn find_member_name(&self, id: MemberId) -> Result<Option<String>, RepoError> {
        Ok(self.members.get(&id).map(|m| m.name.clone()))
    }

    async fn find_delivery_address(
        &self,
        id: DeliveryId,
    ) -> Result<Option<Address>, RepoError> {
        Ok(self.deliveries.get(&id).map(|a| a.clone()))
    }

    async fn find_order_summaries(
        &self,
        search: &OrderSearch,
        page: Option<Page>,
    ) -> Result<Vec<OrderSummary>, RepoError> {
        Ok(self
            .paged_orders(search, page)?
            .into_iter()
            .map(|(order, name)| summary(&order, name))
            .collect())
    }

    async fn find_line_items(&self, order_id: OrderId) -> Result<Vec<LineItemRow>, RepoError> {
        match self.orders.get(&order_id).map(|o| o.clone()) {
            Some(order) => self.line_rows(&order),
            None => Ok(Vec::new()),
        }
    }

    async fn find_line_items_in(
        &self,
        order_ids: &[OrderId],
    ) -> Result<Vec<LineItemRow>, RepoError> {
        let mut rows = Vec::new();
        for id in order_ids {
            if let Some(order) = self.orders.get(id).map(|o| o.clone()) {
                rows.extend(self.line_rows(&order)?);
            }
        }
        Ok(rows)
    }

    async fn find_flat_rows(&self, search: &OrderSearch) -> Result<Vec<FlatOrderRow>, RepoError> {
        let mut rows = Vec::new();
        for (order, member_name) in self.matching_orders(search)? {
            for oi in &order.order_items {
                rows.push(FlatOrderRow {
                    order_id: order.id,
                    member_name: member_name.clone(),
                    order_date: order.order_date,
                    status: order.status,
                    delivery_address: order.delivery.address.clone(),
                    item_name: self.item_name(oi.item_id)?,
                    unit_price: oi.order_price,
                    quantity: oi.count,
                });
            }
        }
        Ok(rows)
    }
}
