use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    serve, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::application::item_service::NewItem;
use crate::application::order_query_service::{OrderViewStrategy, SummaryStrategy};
use crate::application::ShopServices;
use crate::errors::AppError;
use shop_types::domain::address::Address;
use shop_types::domain::ids::{ItemId, MemberId, OrderId};
use shop_types::domain::item::{Item, ItemUpdate};
use shop_types::domain::member::Member;
use shop_types::domain::order::{Order, OrderStatus, PlaceOrder};
use shop_types::ports::ShopRepository;
use shop_types::query::filter::{OrderSearch, Page};
use shop_types::query::projection::{FlatOrderRow, OrderSummary, OrderView};

type SharedServices<R> = Arc<ShopServices<R>>;

#[derive(Clone)]
pub struct HttpServerConfig {
    pub port: String,
}

pub struct HttpServer<R>
where
    R: ShopRepository,
{
    pub services: SharedServices<R>,
    pub config: HttpServerConfig,
}

#[derive(Deserialize)]
pub struct JoinMemberRequest {
    pub name: String,
    pub city: String,
    pub street: String,
    pub zipcode: String,
}

#[derive(Deserialize)]
pub struct RenameMemberRequest {
    pub name: String,
}

#[derive(Serialize)]
struct CreatedResponse {
    id: String,
}

/// `{ "count": n, "data": [...] }` envelope.
#[derive(Serialize)]
struct ListResponse<T> {
    count: usize,
    data: Vec<T>,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(data: Vec<T>) -> Self {
        Self {
            count: data.len(),
            data,
        }
    }
}

/// Filter and paging parameters shared by the order read routes. Supplying
/// either `offset` or `limit` turns paging on.
#[derive(Debug, Default, Deserialize)]
pub struct OrderQueryParams {
    pub status: Option<String>,
    pub member_name: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl OrderQueryParams {
    fn search(&self) -> Result<OrderSearch, AppError> {
        let status = self
            .status
            .as_deref()
            .map(OrderStatus::from_str)
            .transpose()
            .map_err(AppError::BadRequest)?;
        Ok(OrderSearch {
            status,
            member_name: self.member_name.clone(),
        })
    }

    fn page(&self, default_limit: usize) -> Result<Option<Page>, AppError> {
        if self.offset.is_none() && self.limit.is_none() {
            return Ok(None);
        }
        let limit = self.limit.unwrap_or(default_limit);
        if limit == 0 {
            return Err(AppError::BadRequest("limit must be greater than zero".into()));
        }
        Ok(Some(Page::new(self.offset.unwrap_or(0), limit)))
    }

    fn reject_page(&self) -> Result<(), AppError> {
        if self.offset.is_some() || self.limit.is_some() {
            return Err(AppError::BadRequest(
                "flat rows cannot be paged; drop offset/limit".into(),
            ));
        }
        Ok(())
    }
}

impl<R> HttpServer<R>
where
    R: ShopRepository,
{
    pub async fn new(services: ShopServices<R>, config: HttpServerConfig) -> anyhow::Result<Self> {
        Ok(Self {
            services: Arc::new(services),
            config,
        })
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/api/members", post(join_member::<R>).get(list_members::<R>))
            .route("/api/members/{id}", get(get_member::<R>).put(rename_member::<R>))
            .route("/api/items", post(register_item::<R>).get(list_items::<R>))
            .route("/api/items/{id}", get(get_item::<R>).put(update_item::<R>))
            .route("/api/orders", post(place_order::<R>).get(search_orders::<R>))
            .route("/api/orders/{id}", get(get_order::<R>))
            .route("/api/orders/{id}/cancel", post(cancel_order::<R>))
            .route("/api/simple-orders/{strategy}", get(simple_orders::<R>))
            .route("/api/order-views/{strategy}", get(order_views::<R>))
            .route("/api/flat-order-rows", get(flat_order_rows::<R>))
            .with_state(self.services.clone())
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &axum::extract::Request<_>| {
                let uri = request.uri().to_string();
                let request_id = Uuid::new_v4();
                tracing::info_span!(
                    "http_request",
                    %request_id,
                    method = %request.method(),
                    uri
                )
            })
            .on_request(
                |request: &axum::extract::Request<_>, span: &tracing::Span| {
                    tracing::info!(
                        parent: span,
                        method = %request.method(),
                        uri = %request.uri(),
                        "request"
                    );
                },
            )
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &tracing::Span| {
                    tracing::info!(
                        parent: span,
                        status = %response.status(),
                        latency_ms = %latency.as_millis(),
                        "response"
                    );
                },
            );

        let app = self.router().layer(trace_layer);

        let addr: SocketAddr = format!("0.0.0.0:{}", self.config.port).parse()?;
        tracing::info!("starting server on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        serve(listener, app.into_make_service()).await?;
        Ok(())
    }
}

fn parse_id<T>(raw: &str, parse: impl Fn(&str) -> Result<T, uuid::Error>) -> Result<T, AppError> {
    parse(raw).map_err(|e| AppError::BadRequest(format!("invalid id {raw:?}: {e}")))
}

async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn join_member<R: ShopRepository>(
    State(services): State<SharedServices<R>>,
    Json(payload): Json<JoinMemberRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let address = Address::new(payload.city, payload.street, payload.zipcode);
    let member = services.members.join(payload.name, address).await?;
    let body = CreatedResponse {
        id: member.id.to_string(),
    };
    Ok((StatusCode::CREATED, Json(body)))
}

async fn list_members<R: ShopRepository>(
    State(services): State<SharedServices<R>>,
) -> Result<Json<ListResponse<Member>>, AppError> {
    let members = services.members.list_members().await?;
    Ok(Json(members.into()))
}

async fn get_member<R: ShopRepository>(
    State(services): State<SharedServices<R>>,
    Path(id): Path<String>,
) -> Result<Json<Member>, AppError> {
    let id = parse_id(&id, MemberId::parse)?;
    Ok(Json(services.members.get_member(id).await?))
}

async fn rename_member<R: ShopRepository>(
    State(services): State<SharedServices<R>>,
    Path(id): Path<String>,
    Json(payload): Json<RenameMemberRequest>,
) -> Result<Json<Member>, AppError> {
    let id = parse_id(&id, MemberId::parse)?;
    Ok(Json(services.members.rename(id, payload.name).await?))
}

async fn register_item<R: ShopRepository>(
    State(services): State<SharedServices<R>>,
    Json(payload): Json<NewItem>,
) -> Result<(StatusCode, Json<Item>), AppError> {
    let item = services.items.register(payload).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn list_items<R: ShopRepository>(
    State(services): State<SharedServices<R>>,
) -> Result<Json<Vec<Item>>, AppError> {
    Ok(Json(services.items.list_items().await?))
}

async fn get_item<R: ShopRepository>(
    State(services): State<SharedServices<R>>,
    Path(id): Path<String>,
) -> Result<Json<Item>, AppError> {
    let id = parse_id(&id, ItemId::parse)?;
    Ok(Json(services.items.get_item(id).await?))
}

async fn update_item<R: ShopRepository>(
    State(services): State<SharedServices<R>>,
    Path(id): Path<String>,
    Json(payload): Json<ItemUpdate>,
) -> Result<Json<Item>, AppError> {
    let id = parse_id(&id, ItemId::parse)?;
    Ok(Json(services.items.update(id, payload).await?))
}

async fn place_order<R: ShopRepository>(
    State(services): State<SharedServices<R>>,
    Json(payload): Json<PlaceOrder>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let order = services.orders.place_order(payload).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn search_orders<R: ShopRepository>(
    State(services): State<SharedServices<R>>,
    Query(params): Query<OrderQueryParams>,
) -> Result<Json<Vec<Order>>, AppError> {
    let search = params.search()?;
    Ok(Json(services.orders.search_orders(&search).await?))
}

async fn get_order<R: ShopRepository>(
    State(services): State<SharedServices<R>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let id = parse_id(&id, OrderId::parse)?;
    Ok(Json(services.orders.get_order(id).await?))
}

async fn cancel_order<R: ShopRepository>(
    State(services): State<SharedServices<R>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let id = parse_id(&id, OrderId::parse)?;
    Ok(Json(services.orders.cancel_order(id).await?))
}

async fn simple_orders<R: ShopRepository>(
    State(services): State<SharedServices<R>>,
    Path(strategy): Path<String>,
    Query(params): Query<OrderQueryParams>,
) -> Result<Json<Vec<OrderSummary>>, AppError> {
    let strategy: SummaryStrategy = strategy.parse()?;
    let search = params.search()?;
    let page = params.page(services.queries.config().default_page_limit)?;
    Ok(Json(services.queries.summaries(strategy, &search, page).await?))
}

async fn order_views<R: ShopRepository>(
    State(services): State<SharedServices<R>>,
    Path(strategy): Path<String>,
    Query(params): Query<OrderQueryParams>,
) -> Result<Json<Vec<OrderView>>, AppError> {
    let strategy: OrderViewStrategy = strategy.parse()?;
    let search = params.search()?;
    let page = params.page(services.queries.config().default_page_limit)?;
    Ok(Json(services.queries.views(strategy, &search, page).await?))
}

async fn flat_order_rows<R: ShopRepository>(
    State(services): State<SharedServices<R>>,
    Query(params): Query<OrderQueryParams>,
) -> Result<Json<Vec<FlatOrderRow>>, AppError> {
    params.reject_page()?;
    let search = params.search()?;
    Ok(Json(services.queries.flat_rows(&search).await?))
}
