//! Application services: the use cases the inbound adapters call.

pub mod item_service;
pub mod member_service;
pub mod order_query_service;
pub mod order_service;
pub mod seed;

use std::sync::Arc;

use shop_types::ports::ShopRepository;

use crate::config::QueryConfig;
use item_service::ItemService;
use member_service::MemberService;
use order_query_service::OrderQueryService;
use order_service::OrderService;

/// Every service, sharing one backing store.
pub struct ShopServices<R: ShopRepository> {
    pub members: MemberService<R>,
    pub items: ItemService<R>,
    pub orders: OrderService<R>,
    pub queries: OrderQueryService<R>,
}

impl<R: ShopRepository> ShopServices<R> {
    pub fn new(repo: R, query_config: QueryConfig) -> Self {
        let repo = Arc::new(repo);
        Self {
            members: MemberService::new(repo.clone()),
            items: ItemService::new(repo.clone()),
            orders: OrderService::new(repo.clone()),
            queries: OrderQueryService::new(repo, query_config),
        }
    }
}
