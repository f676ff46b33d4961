use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shop_types::domain::address::Address;
use shop_types::domain::delivery::{Delivery, DeliveryStatus};
use shop_types::domain::ids::{DeliveryId, ItemId, MemberId, OrderId, OrderItemId};
use shop_types::domain::item::{Item, ItemKind, ItemUpdate};
use shop_types::domain::member::Member;
use shop_types::domain::order::{Order, OrderItem, OrderStatus, PlaceOrder};
use shop_types::ports::{
    ItemRepository, MemberRepository, OrderQueryStore, OrderRepository, RepoError,
};
use shop_types::query::filter::{OrderPredicate, OrderSearch, Page, MAX_RESULTS};
use shop_types::query::projection::{FlatOrderRow, LineItemRow, OrderRow, OrderSummary};
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqliteConnection};
use sqlx::{FromRow, QueryBuilder, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

/// sqlx-backed store. Writes from this process go through `write_lock`, so a
/// read-then-write transaction is never upgraded while another one holds the
/// database write lock.
#[derive(Clone)]
pub struct SqliteRepo {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

const MEMBER_SELECT: &str = "SELECT id, name, city, street, zipcode FROM member";

const ITEM_SELECT: &str = "SELECT id, dtype, name, price, stock_quantity, author, isbn, artist, etc, director, actor FROM item";

const ORDER_SELECT: &str = "SELECT o.id, o.member_id, o.delivery_id, o.order_date, o.status,
        d.city, d.street, d.zipcode, d.status AS delivery_status
     FROM orders o
     JOIN member m ON m.id = o.member_id
     JOIN delivery d ON d.id = o.delivery_id";

const ORDER_ROW_SELECT: &str = "SELECT o.id, o.member_id, o.delivery_id, o.order_date, o.status
     FROM orders o
     JOIN member m ON m.id = o.member_id";

const SUMMARY_SELECT: &str = "SELECT o.id, m.name AS member_name, o.order_date, o.status,
        d.city, d.street, d.zipcode
     FROM orders o
     JOIN member m ON m.id = o.member_id
     JOIN delivery d ON d.id = o.delivery_id";

const LINE_ITEM_SELECT: &str = "SELECT oi.order_id, i.name AS item_name, oi.order_price, oi.quantity
     FROM order_item oi
     JOIN item i ON i.id = oi.item_id";

const FLAT_SELECT: &str = "SELECT o.id, m.name AS member_name, o.order_date, o.status,
        d.city, d.street, d.zipcode,
        i.name AS item_name, oi.order_price, oi.quantity
     FROM orders o
     JOIN member m ON m.id = o.member_id
     JOIN delivery d ON d.id = o.delivery_id
     JOIN order_item oi ON oi.order_id = o.id
     JOIN item i ON i.id = oi.item_id";

fn db_err(e: impl std::fmt::Display) -> RepoError {
    RepoError::DbError(e.to_string())
}

/// Unique-constraint violations and lock contention (`SQLITE_BUSY`,
/// `SQLITE_LOCKED` and their extended codes) surface as conflicts, everything
/// else as a store failure.
fn map_sqlx(e: sqlx::Error) -> RepoError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() || is_lock_contention(db.code().as_deref()) {
            return RepoError::Conflict(db.message().to_string());
        }
    }
    db_err(e)
}

fn is_lock_contention(code: Option<&str>) -> bool {
    const SQLITE_BUSY: i32 = 5;
    const SQLITE_LOCKED: i32 = 6;
    code.and_then(|c| c.parse::<i32>().ok())
        .map(|c| c & 0xff)
        .is_some_and(|primary| primary == SQLITE_BUSY || primary == SQLITE_LOCKED)
}

fn parse_date(s: &str) -> Result<DateTime<Utc>, RepoError> {
    Ok(DateTime::parse_from_rfc3339(s)
        .map_err(db_err)?
        .with_timezone(&Utc))
}

fn parse_status(s: &str) -> Result<OrderStatus, RepoError> {
    OrderStatus::from_str(s).map_err(RepoError::DbError)
}

fn to_u32(v: i64) -> Result<u32, RepoError> {
    u32::try_from(v).map_err(db_err)
}

fn to_i64(v: usize) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

#[derive(FromRow)]
struct DbMember {
    id: String,
    name: String,
    city: String,
    street: String,
    zipcode: String,
}

impl DbMember {
    fn into_member(self) -> Result<Member, RepoError> {
        Ok(Member {
            id: MemberId::parse(&self.id).map_err(db_err)?,
            name: self.name,
            address: Address::new(self.city, self.street, self.zipcode),
        })
    }
}

#[derive(FromRow)]
struct DbItem {
    id: String,
    dtype: String,
    name: String,
    price: i64,
    stock_quantity: i64,
    author: Option<String>,
    isbn: Option<String>,
    artist: Option<String>,
    etc: Option<String>,
    director: Option<String>,
    actor: Option<String>,
}

impl DbItem {
    fn into_item(self) -> Result<Item, RepoError> {
        let kind = match self.dtype.as_str() {
            "B" => ItemKind::Book {
                author: self.author.unwrap_or_default(),
                isbn: self.isbn.unwrap_or_default(),
            },
            "A" => ItemKind::Album {
                artist: self.artist.unwrap_or_default(),
                etc: self.etc.unwrap_or_default(),
            },
            "M" => ItemKind::Movie {
                director: self.director.unwrap_or_default(),
                actor: self.actor.unwrap_or_default(),
            },
            other => return Err(RepoError::DbError(format!("unknown item dtype {other:?}"))),
        };
        Ok(Item {
            id: ItemId::parse(&self.id).map_err(db_err)?,
            name: self.name,
            price: self.price,
            stock_quantity: to_u32(self.stock_quantity)?,
            kind,
        })
    }
}

/// Variant columns of the single-table item layout, in `ITEM_SELECT` order.
fn kind_columns(kind: &ItemKind) -> [Option<&str>; 6] {
    match kind {
        ItemKind::Book { author, isbn } => [Some(author), Some(isbn), None, None, None, None],
        ItemKind::Album { artist, etc } => [None, None, Some(artist), Some(etc), None, None],
        ItemKind::Movie { director, actor } => {
            [None, None, None, None, Some(director), Some(actor)]
        }
    }
}

#[derive(FromRow)]
struct DbOrder {
    id: String,
    member_id: String,
    delivery_id: String,
    order_date: String,
    status: String,
    city: String,
    street: String,
    zipcode: String,
    delivery_status: String,
}

impl DbOrder {
    fn into_order(self, order_items: Vec<OrderItem>) -> Result<Order, RepoError> {
        Ok(Order {
            id: OrderId::parse(&self.id).map_err(db_err)?,
            member_id: MemberId::parse(&self.member_id).map_err(db_err)?,
            delivery: Delivery {
                id: DeliveryId::parse(&self.delivery_id).map_err(db_err)?,
                address: Address::new(self.city, self.street, self.zipcode),
                status: DeliveryStatus::from_str(&self.delivery_status)
                    .map_err(RepoError::DbError)?,
            },
            order_items,
            order_date: parse_date(&self.order_date)?,
            status: parse_status(&self.status)?,
        })
    }
}

#[derive(FromRow)]
struct DbOrderItem {
    id: String,
    order_id: String,
    item_id: String,
    order_price: i64,
    quantity: i64,
}

impl DbOrderItem {
    fn into_order_item(self) -> Result<OrderItem, RepoError> {
        Ok(OrderItem {
            id: OrderItemId::parse(&self.id).map_err(db_err)?,
            order_id: OrderId::parse(&self.order_id).map_err(db_err)?,
            item_id: ItemId::parse(&self.item_id).map_err(db_err)?,
            order_price: self.order_price,
            count: to_u32(self.quantity)?,
        })
    }
}

#[derive(FromRow)]
struct DbOrderRow {
    id: String,
    member_id: String,
    delivery_id: String,
    order_date: String,
    status: String,
}

impl DbOrderRow {
    fn into_row(self) -> Result<OrderRow, RepoError> {
        Ok(OrderRow {
            order_id: OrderId::parse(&self.id).map_err(db_err)?,
            member_id: MemberId::parse(&self.member_id).map_err(db_err)?,
            delivery_id: DeliveryId::parse(&self.delivery_id).map_err(db_err)?,
            order_date: parse_date(&self.order_date)?,
            status: parse_status(&self.status)?,
        })
    }
}

#[derive(FromRow)]
struct DbSummary {
    id: String,
    member_name: String,
    order_date: String,
    status: String,
    city: String,
    street: String,
    zipcode: String,
}

impl DbSummary {
    fn into_summary(self) -> Result<OrderSummary, RepoError> {
        Ok(OrderSummary {
            order_id: OrderId::parse(&self.id).map_err(db_err)?,
            member_name: self.member_name,
            order_date: parse_date(&self.order_date)?,
            status: parse_status(&self.status)?,
            delivery_address: Address::new(self.city, self.street, self.zipcode),
        })
    }
}

#[derive(FromRow)]
struct DbLineItem {
    order_id: String,
    item_name: String,
    order_price: i64,
    quantity: i64,
}

impl DbLineItem {
    fn into_line_row(self) -> Result<LineItemRow, RepoError> {
        Ok(LineItemRow {
            order_id: OrderId::parse(&self.order_id).map_err(db_err)?,
            item_name: self.item_name,
            unit_price: self.order_price,
            quantity: to_u32(self.quantity)?,
        })
    }
}

#[derive(FromRow)]
struct DbFlatRow {
    id: String,
    member_name: String,
    order_date: String,
    status: String,
    city: String,
    street: String,
    zipcode: String,
    item_name: String,
    order_price: i64,
    quantity: i64,
}

impl DbFlatRow {
    fn into_flat_row(self) -> Result<FlatOrderRow, RepoError> {
        Ok(FlatOrderRow {
            order_id: OrderId::parse(&self.id).map_err(db_err)?,
            member_name: self.member_name,
            order_date: parse_date(&self.order_date)?,
            status: parse_status(&self.status)?,
            delivery_address: Address::new(self.city, self.street, self.zipcode),
            item_name: self.item_name,
            unit_price: self.order_price,
            quantity: to_u32(self.quantity)?,
        })
    }
}

/// Renders the search predicates as a WHERE clause over `o` (orders) and
/// `m` (member). `instr` keeps the name match case-sensitive, unlike LIKE.
fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, search: &OrderSearch) {
    for (i, predicate) in search.predicates().into_iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        match predicate {
            OrderPredicate::StatusEq(status) => {
                qb.push("o.status = ").push_bind(status.as_str());
            }
            OrderPredicate::MemberNameContains(name) => {
                qb.push("instr(m.name, ")
                    .push_bind(name.to_owned())
                    .push(") > 0");
            }
        }
    }
}

fn push_ordered_window(qb: &mut QueryBuilder<'_, Sqlite>, page: Option<Page>) {
    let (offset, limit) = Page::window(page);
    qb.push(" ORDER BY o.id LIMIT ")
        .push_bind(to_i64(limit))
        .push(" OFFSET ")
        .push_bind(to_i64(offset));
}

fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, ids: &[String]) {
    qb.push(format!(" WHERE {column} IN ("));
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push_bind(id.clone());
    }
    qb.push(")");
}

async fn fetch_member(
    conn: &mut SqliteConnection,
    id: MemberId,
) -> Result<Option<Member>, RepoError> {
    let row: Option<DbMember> =
        sqlx::query_as("SELECT id, name, city, street, zipcode FROM member WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await
            .map_err(map_sqlx)?;
    row.map(DbMember::into_member).transpose()
}

async fn name_taken(
    conn: &mut SqliteConnection,
    name: &str,
    except: Option<MemberId>,
) -> Result<bool, RepoError> {
    let ids: Vec<(String,)> = sqlx::query_as("SELECT id FROM member WHERE name = ?")
        .bind(name)
        .fetch_all(&mut *conn)
        .await
        .map_err(map_sqlx)?;
    let except = except.map(|id| id.to_string());
    Ok(ids.iter().any(|(id,)| Some(id) != except.as_ref()))
}

async fn fetch_item(conn: &mut SqliteConnection, id: ItemId) -> Result<Option<Item>, RepoError> {
    let row: Option<DbItem> = sqlx::query_as(
        "SELECT id, dtype, name, price, stock_quantity, author, isbn, artist, etc, director, actor FROM item WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_sqlx)?;
    row.map(DbItem::into_item).transpose()
}

async fn fetch_items(conn: &mut SqliteConnection, ids: &[ItemId]) -> Result<Vec<Item>, RepoError> {
    let mut items = Vec::with_capacity(ids.len());
    for id in ids {
        let item = fetch_item(conn, *id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("item {id}")))?;
        items.push(item);
    }
    Ok(items)
}

/// Compare-and-set on stock so a concurrent writer cannot be overwritten.
async fn store_stock(
    conn: &mut SqliteConnection,
    item: &Item,
    previous: u32,
) -> Result<(), RepoError> {
    let res = sqlx::query("UPDATE item SET stock_quantity = ? WHERE id = ? AND stock_quantity = ?")
        .bind(i64::from(item.stock_quantity))
        .bind(item.id.to_string())
        .bind(i64::from(previous))
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx)?;
    if res.rows_affected() == 0 {
        return Err(RepoError::Conflict(format!(
            "stock of item {} changed concurrently",
            item.id
        )));
    }
    Ok(())
}

/// Loads the line items of `rows` with one IN-list query and builds entities.
async fn assemble_orders(
    conn: &mut SqliteConnection,
    rows: Vec<DbOrder>,
) -> Result<Vec<Order>, RepoError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT id, order_id, item_id, order_price, quantity FROM order_item",
    );
    push_id_list(&mut qb, "order_id", &ids);
    qb.push(" ORDER BY id");
    let lines: Vec<DbOrderItem> = qb
        .build_query_as()
        .fetch_all(&mut *conn)
        .await
        .map_err(map_sqlx)?;

    let mut by_order: HashMap<String, Vec<OrderItem>> = HashMap::new();
    for line in lines {
        let key = line.order_id.clone();
        by_order.entry(key).or_default().push(line.into_order_item()?);
    }
    rows.into_iter()
        .map(|row| {
            let order_items = by_order.remove(&row.id).unwrap_or_default();
            row.into_order(order_items)
        })
        .collect()
}

async fn fetch_order(conn: &mut SqliteConnection, id: OrderId) -> Result<Option<Order>, RepoError> {
    let mut qb = QueryBuilder::<Sqlite>::new(ORDER_SELECT);
    qb.push(" WHERE o.id = ").push_bind(id.to_string());
    let row: Option<DbOrder> = qb
        .build_query_as()
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx)?;
    match row {
        Some(row) => Ok(assemble_orders(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

impl SqliteRepo {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(options).await?;

        let ddl = include_str!("../migrations/0001_create_shop.sql");
        for statement in ddl.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&pool).await?;
        }
        tracing::debug!(url = database_url, "sqlite schema ready");

        Ok(Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    async fn acquire(&self) -> Result<sqlx::pool::PoolConnection<Sqlite>, RepoError> {
        self.pool.acquire().await.map_err(map_sqlx)
    }
}

#[async_trait]
impl MemberRepository for SqliteRepo {
    async fn save_member(&self, member: Member) -> Result<Member, RepoError> {
        let _guard = self.write_lock.lock().await;
        let mut conn = self.acquire().await?;
        if name_taken(&mut conn, &member.name, None).await? {
            return Err(RepoError::Conflict(format!(
                "member name {:?} already exists",
                member.name
            )));
        }
        // A concurrent insert of the same name still fails on the UNIQUE
        // constraint, which `map_sqlx` reports as a conflict.
        sqlx::query("INSERT INTO member (id, name, city, street, zipcode) VALUES (?, ?, ?, ?, ?)")
            .bind(member.id.to_string())
            .bind(&member.name)
            .bind(&member.address.city)
            .bind(&member.address.street)
            .bind(&member.address.zipcode)
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx)?;
        Ok(member)
    }

    async fn find_member(&self, id: MemberId) -> Result<Option<Member>, RepoError> {
        let mut conn = self.acquire().await?;
        fetch_member(&mut conn, id).await
    }

    async fn find_members(&self) -> Result<Vec<Member>, RepoError> {
        let rows: Vec<DbMember> = sqlx::query_as(&format!("{MEMBER_SELECT} ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.into_iter().map(DbMember::into_member).collect()
    }

    async fn find_members_by_name(&self, name: &str) -> Result<Vec<Member>, RepoError> {
        let rows: Vec<DbMember> = sqlx::query_as(&format!("{MEMBER_SELECT} WHERE name = ?"))
            .bind(name)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.into_iter().map(DbMember::into_member).collect()
    }

    async fn rename_member(
        &self,
        id: MemberId,
        name: String,
    ) -> Result<Option<Member>, RepoError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let Some(mut member) = fetch_member(&mut tx, id).await? else {
            return Ok(None);
        };
        if name_taken(&mut tx, &name, Some(id)).await? {
            return Err(RepoError::Conflict(format!(
                "member name {name:?} already exists"
            )));
        }
        member.rename(name)?;
        sqlx::query("UPDATE member SET name = ? WHERE id = ?")
            .bind(&member.name)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        tx.commit().await.map_err(map_sqlx)?;
        Ok(Some(member))
    }
}

#[async_trait]
impl ItemRepository for SqliteRepo {
    async fn save_item(&self, item: Item) -> Result<Item, RepoError> {
        let _guard = self.write_lock.lock().await;
        let [author, isbn, artist, etc, director, actor] = kind_columns(&item.kind);
        sqlx::query(
            "INSERT INTO item (id, dtype, name, price, stock_quantity, author, isbn, artist, etc, director, actor)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(item.id.to_string())
        .bind(item.kind.dtype())
        .bind(&item.name)
        .bind(item.price)
        .bind(i64::from(item.stock_quantity))
        .bind(author)
        .bind(isbn)
        .bind(artist)
        .bind(etc)
        .bind(director)
        .bind(actor)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(item)
    }

    async fn find_item(&self, id: ItemId) -> Result<Option<Item>, RepoError> {
        let mut conn = self.acquire().await?;
        fetch_item(&mut conn, id).await
    }

    async fn find_items(&self) -> Result<Vec<Item>, RepoError> {
        let rows: Vec<DbItem> = sqlx::query_as(&format!("{ITEM_SELECT} ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.into_iter().map(DbItem::into_item).collect()
    }

    async fn update_item(
        &self,
        id: ItemId,
        update: ItemUpdate,
    ) -> Result<Option<Item>, RepoError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let Some(mut item) = fetch_item(&mut tx, id).await? else {
            return Ok(None);
        };
        item.apply(update)?;
        sqlx::query("UPDATE item SET name = ?, price = ?, stock_quantity = ? WHERE id = ?")
            .bind(&item.name)
            .bind(item.price)
            .bind(i64::from(item.stock_quantity))
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        tx.commit().await.map_err(map_sqlx)?;
        Ok(Some(item))
    }
}

#[async_trait]
impl OrderRepository for SqliteRepo {
    async fn place_order(&self, command: PlaceOrder) -> Result<Order, RepoError> {
        command.validate()?;
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let member = fetch_member(&mut tx, command.member_id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("member {}", command.member_id)))?;
        let mut items = fetch_items(&mut tx, &command.item_ids()).await?;
        let previous: Vec<u32> = items.iter().map(|it| it.stock_quantity).collect();

        let order = Order::place(&member, &command, &mut items)?;

        for (item, before) in items.iter().zip(previous) {
            store_stock(&mut tx, item, before).await?;
        }
        let delivery = &order.delivery;
        sqlx::query("INSERT INTO delivery (id, city, street, zipcode, status) VALUES (?, ?, ?, ?, ?)")
            .bind(delivery.id.to_string())
            .bind(&delivery.address.city)
            .bind(&delivery.address.street)
            .bind(&delivery.address.zipcode)
            .bind(delivery.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        sqlx::query(
            "INSERT INTO orders (id, member_id, delivery_id, order_date, status) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(order.id.to_string())
        .bind(order.member_id.to_string())
        .bind(delivery.id.to_string())
        .bind(order.order_date.to_rfc3339())
        .bind(order.status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;
        for line in &order.order_items {
            sqlx::query(
                "INSERT INTO order_item (id, order_id, item_id, order_price, quantity) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(line.id.to_string())
            .bind(order.id.to_string())
            .bind(line.item_id.to_string())
            .bind(line.order_price)
            .bind(i64::from(line.count))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        }

        tx.commit().await.map_err(map_sqlx)?;
        Ok(order)
    }

    async fn cancel_order(&self, id: OrderId) -> Result<Order, RepoError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let mut order = fetch_order(&mut tx, id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("order {id}")))?;
        let mut items = fetch_items(&mut tx, &order.item_ids()).await?;
        let previous: Vec<u32> = items.iter().map(|it| it.stock_quantity).collect();

        order.cancel(&mut items)?;

        let res = sqlx::query("UPDATE orders SET status = ? WHERE id = ? AND status = ?")
            .bind(order.status.as_str())
            .bind(id.to_string())
            .bind(OrderStatus::Ordered.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        if res.rows_affected() == 0 {
            return Err(RepoError::Conflict(format!("order {id} changed concurrently")));
        }
        for (item, before) in items.iter().zip(previous) {
            store_stock(&mut tx, item, before).await?;
        }

        tx.commit().await.map_err(map_sqlx)?;
        Ok(order)
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RepoError> {
        let mut conn = self.acquire().await?;
        fetch_order(&mut conn, id).await
    }

    async fn search_orders(&self, search: &OrderSearch) -> Result<Vec<Order>, RepoError> {
        let mut conn = self.acquire().await?;
        let mut qb = QueryBuilder::<Sqlite>::new(ORDER_SELECT);
        push_filter(&mut qb, search);
        qb.push(" ORDER BY o.id LIMIT ").push_bind(to_i64(MAX_RESULTS));
        let rows: Vec<DbOrder> = qb
            .build_query_as()
            .fetch_all(&mut *conn)
            .await
            .map_err(map_sqlx)?;
        assemble_orders(&mut conn, rows).await
    }
}

#[async_trait]
impl OrderQueryStore for SqliteRepo {
    async fn find_order_rows(
        &self,
        search: &OrderSearch,
        page: Option<Page>,
    ) -> Result<Vec<OrderRow>, RepoError> {
        let mut qb = QueryBuilder::<Sqlite>::new(ORDER_ROW_SELECT);
        push_filter(&mut qb, search);
        push_ordered_window(&mut qb, page);
        let rows: Vec<DbOrderRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.into_iter().map(DbOrderRow::into_row).collect()
    }

    async fn find_member_name(&self, id: MemberId) -> Result<Option<String>, RepoError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT name FROM member WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.map(|(name,)| name))
    }

    async fn find_delivery_address(
        &self,
        id: DeliveryId,
    ) -> Result<Option<Address>, RepoError> {
        let row: Option<(String, String, String)> =
            sqlx::query_as("SELECT city, street, zipcode FROM delivery WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx)?;
        Ok(row.map(|(city, street, zipcode)| Address::new(city, street, zipcode)))
    }

    async fn find_order_summaries(
        &self,
        search: &OrderSearch,
        page: Option<Page>,
    ) -> Result<Vec<OrderSummary>, RepoError> {
        let mut qb = QueryBuilder::<Sqlite>::new(SUMMARY_SELECT);
        push_filter(&mut qb, search);
        push_ordered_window(&mut qb, page);
        let rows: Vec<DbSummary> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.into_iter().map(DbSummary::into_summary).collect()
    }

    async fn find_line_items(&self, order_id: OrderId) -> Result<Vec<LineItemRow>, RepoError> {
        let rows: Vec<DbLineItem> =
            sqlx::query_as(&format!("{LINE_ITEM_SELECT} WHERE oi.order_id = ? ORDER BY oi.id"))
                .bind(order_id.to_string())
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx)?;
        rows.into_iter().map(DbLineItem::into_line_row).collect()
    }

    async fn find_line_items_in(
        &self,
        order_ids: &[OrderId],
    ) -> Result<Vec<LineItemRow>, RepoError> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = order_ids.iter().map(ToString::to_string).collect();
        let mut qb = QueryBuilder::<Sqlite>::new(LINE_ITEM_SELECT);
        push_id_list(&mut qb, "oi.order_id", &ids);
        qb.push(" ORDER BY oi.order_id, oi.id");
        let rows: Vec<DbLineItem> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.into_iter().map(DbLineItem::into_line_row).collect()
    }

    async fn find_flat_rows(&self, search: &OrderSearch) -> Result<Vec<FlatOrderRow>, RepoError> {
        let mut qb = QueryBuilder::<Sqlite>::new(FLAT_SELECT);
        push_filter(&mut qb, search);
        qb.push(" ORDER BY o.id, oi.id");
        let rows: Vec<DbFlatRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.into_iter().map(DbFlatRow::into_flat_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_and_locked_codes_are_contention() {
        for code in ["5", "261", "517", "6", "262"] {
            assert!(is_lock_contention(Some(code)), "{code}");
        }
        for code in ["2067", "19", "1"] {
            assert!(!is_lock_contention(Some(code)), "{code}");
        }
        assert!(!is_lock_contention(None));
    }
}
