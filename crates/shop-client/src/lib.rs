use std::time::Duration;

use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use shop_types::domain::ids::{ItemId, MemberId, OrderId};
use shop_types::domain::item::{Item, ItemKind, ItemUpdate};
use shop_types::domain::member::Member;
use shop_types::domain::order::{Order, OrderStatus, PlaceOrder};
use shop_types::query::projection::{FlatOrderRow, OrderSummary, OrderView};

#[derive(Clone)]
pub struct ShopClientBuilder {
    base: Url,
    headers: HeaderMap,
    timeout: Option<Duration>,
    client: Option<reqwest::Client>,
}

#[derive(Clone)]
pub struct ShopClient {
    base: Url,
    client: reqwest::Client,
}

impl ShopClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Self::builder(base_url)?.build()
    }

    pub fn builder(base_url: &str) -> anyhow::Result<ShopClientBuilder> {
        let base = Url::parse(base_url).context("invalid base url")?;
        Ok(ShopClientBuilder {
            base,
            headers: HeaderMap::new(),
            timeout: None,
            client: None,
        })
    }

    fn url(&self, path: &str) -> anyhow::Result<Url> {
        self.base.join(path).context("failed to join url")
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&OrderQuery>,
    ) -> anyhow::Result<T> {
        let mut req = self.client.get(self.url(path)?);
        if let Some(q) = query {
            req = req.query(q);
        }
        let res = req.send().await?.error_for_status()?;
        Ok(res.json().await?)
    }

    pub async fn join_member(&self, req: &JoinMemberRequest) -> anyhow::Result<CreatedResponse> {
        let res = self
            .client
            .post(self.url("api/members")?)
            .json(req)
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }

    pub async fn list_members(&self) -> anyhow::Result<MemberList> {
        self.get_json("api/members", None).await
    }

    pub async fn get_member(&self, id: MemberId) -> anyhow::Result<Member> {
        self.get_json(&format!("api/members/{id}"), None).await
    }

    pub async fn rename_member(&self, id: MemberId, name: &str) -> anyhow::Result<Member> {
        let res = self
            .client
            .put(self.url(&format!("api/members/{id}"))?)
            .json(&RenameMemberRequest { name: name.into() })
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }

    pub async fn register_item(&self, req: &RegisterItemRequest) -> anyhow::Result<Item> {
        let res = self
            .client
            .post(self.url("api/items")?)
            .json(req)
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }

    pub async fn list_items(&self) -> anyhow::Result<Vec<Item>> {
        self.get_json("api/items", None).await
    }

    pub async fn get_item(&self, id: ItemId) -> anyhow::Result<Item> {
        self.get_json(&format!("api/items/{id}"), None).await
    }

    pub async fn update_item(&self, id: ItemId, update: &ItemUpdate) -> anyhow::Result<Item> {
        let res = self
            .client
            .put(self.url(&format!("api/items/{id}"))?)
            .json(update)
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }

    pub async fn place_order(&self, command: &PlaceOrder) -> anyhow::Result<Order> {
        let res = self
            .client
            .post(self.url("api/orders")?)
            .json(command)
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }

    pub async fn get_order(&self, id: OrderId) -> anyhow::Result<Order> {
        self.get_json(&format!("api/orders/{id}"), None).await
    }

    pub async fn search_orders(&self, query: &OrderQuery) -> anyhow::Result<Vec<Order>> {
        self.get_json("api/orders", Some(query)).await
    }

    pub async fn cancel_order(&self, id: OrderId) -> anyhow::Result<Order> {
        let res = self
            .client
            .post(self.url(&format!("api/orders/{id}/cancel"))?)
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }

    /// `strategy` is `plain` or `eager`.
    pub async fn simple_orders(
        &self,
        strategy: &str,
        query: &OrderQuery,
    ) -> anyhow::Result<Vec<OrderSummary>> {
        tracing::debug!(strategy, "fetching order summaries");
        self.get_json(&format!("api/simple-orders/{strategy}"), Some(query))
            .await
    }

    /// `strategy` is `per-root`, `batched` or `flat`.
    pub async fn order_views(
        &self,
        strategy: &str,
        query: &OrderQuery,
    ) -> anyhow::Result<Vec<OrderView>> {
        tracing::debug!(strategy, "fetching order views");
        self.get_json(&format!("api/order-views/{strategy}"), Some(query))
            .await
    }

    pub async fn flat_order_rows(&self, query: &OrderQuery) -> anyhow::Result<Vec<FlatOrderRow>> {
        self.get_json("api/flat-order-rows", Some(query)).await
    }
}

impl ShopClientBuilder {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(
        mut self,
        key: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> anyhow::Result<Self> {
        let header_name =
            HeaderName::from_bytes(key.as_ref().as_bytes()).context("invalid header name")?;
        let header_value = HeaderValue::from_str(value.as_ref()).context("invalid header value")?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    pub fn with_reqwest_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> anyhow::Result<ShopClient> {
        if let Some(client) = self.client {
            return Ok(ShopClient {
                base: self.base,
                client,
            });
        }

        let mut builder = reqwest::Client::builder();
        if !self.headers.is_empty() {
            builder = builder.default_headers(self.headers);
        }
        if let Some(t) = self.timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build()?;
        Ok(ShopClient {
            base: self.base,
            client,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JoinMemberRequest {
    pub name: String,
    pub city: String,
    pub street: String,
    pub zipcode: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct RenameMemberRequest {
    name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CreatedResponse {
    pub id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MemberList {
    pub count: usize,
    pub data: Vec<Member>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RegisterItemRequest {
    pub name: String,
    pub price: i64,
    pub stock_quantity: u32,
    #[serde(flatten)]
    pub kind: ItemKind,
}

/// Filter and paging for the order read routes; `None` fields are omitted.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use shop_types::domain::address::Address;
    use shop_types::query::projection::OrderLineItem;

    fn sample_view() -> OrderView {
        OrderView {
            order_id: OrderId::new(),
            member_name: "userA".into(),
            order_date: chrono::Utc::now(),
            status: OrderStatus::Ordered,
            delivery_address: Address::new("Seoul", "1", "1111"),
            line_items: vec![OrderLineItem {
                item_name: "JPA1 BOOK".into(),
                unit_price: 10000,
                quantity: 1,
            }],
        }
    }

    #[tokio::test]
    async fn join_and_get_member() {
        let server = MockServer::start();
        let member = Member {
            id: MemberId::new(),
            name: "kim".into(),
            address: Address::new("Seoul", "River", "123"),
        };
        let req = JoinMemberRequest {
            name: "kim".into(),
            city: "Seoul".into(),
            street: "River".into(),
            zipcode: "123".into(),
        };

        let join_mock = server.mock(|when, then| {
            when.method(POST).path("/api/members").json_body_obj(&req);
            then.status(201).json_body_obj(&CreatedResponse {
                id: member.id.to_string(),
            });
        });
        let get_mock = server.mock(|when, then| {
            when.method(GET).path(format!("/api/members/{}", member.id));
            then.status(200).json_body_obj(&member);
        });

        let client = ShopClient::new(&server.base_url()).unwrap();
        let created = client.join_member(&req).await.unwrap();
        assert_eq!(created.id, member.id.to_string());
        let fetched = client.get_member(member.id).await.unwrap();
        assert_eq!(fetched, member);

        join_mock.assert();
        get_mock.assert();
    }

    #[tokio::test]
    async fn strategy_routes_carry_filter_and_page() {
        let server = MockServer::start();
        let view = sample_view();

        let views_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/order-views/batched")
                .query_param("status", "ORDERED")
                .query_param("member_name", "user")
                .query_param("offset", "0")
                .query_param("limit", "10");
            then.status(200).json_body_obj(&vec![view.clone()]);
        });

        let client = ShopClient::new(&server.base_url()).unwrap();
        let query = OrderQuery {
            status: Some(OrderStatus::Ordered),
            member_name: Some("user".into()),
            offset: Some(0),
            limit: Some(10),
        };
        let views = client.order_views("batched", &query).await.unwrap();
        assert_eq!(views, vec![view]);
        views_mock.assert();
    }

    #[tokio::test]
    async fn error_statuses_surface_as_errors() {
        let server = MockServer::start();
        let id = OrderId::new();
        let cancel_mock = server.mock(|when, then| {
            when.method(POST).path(format!("/api/orders/{id}/cancel"));
            then.status(409)
                .json_body(serde_json::json!({ "error": "order already cancelled" }));
        });
        let flat_mock = server.mock(|when, then| {
            when.method(GET).path("/api/order-views/flat").query_param("limit", "5");
            then.status(400)
                .json_body(serde_json::json!({ "error": "no paging" }));
        });

        let client = ShopClient::new(&server.base_url()).unwrap();
        assert!(client.cancel_order(id).await.is_err());
        let paged = OrderQuery {
            limit: Some(5),
            ..Default::default()
        };
        assert!(client.order_views("flat", &paged).await.is_err());

        cancel_mock.assert();
        flat_mock.assert();
    }
}
