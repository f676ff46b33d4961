#![cfg(feature = "sqlite")]

use shop_repo::sqlite::SqliteRepo;
use shop_types::domain::address::Address;
use shop_types::domain::errors::DomainError;
use shop_types::domain::ids::{MemberId, OrderId};
use shop_types::domain::item::{Item, ItemKind, ItemUpdate};
use shop_types::domain::member::Member;
use shop_types::domain::order::{OrderLineRequest, OrderStatus, PlaceOrder};
use shop_types::ports::{
    ItemRepository, MemberRepository, OrderQueryStore, OrderRepository, RepoError,
};
use shop_types::query::filter::{OrderSearch, Page};
use std::path::PathBuf;
use uuid::Uuid;

fn temp_db_url() -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut path = PathBuf::from(dir.path());
    path.push(format!("shop-{}.db", Uuid::new_v4()));
    let url = format!("sqlite://{}", path.display());
    (dir, url)
}

async fn member(repo: &SqliteRepo, name: &str, city: &str) -> Member {
    let m = Member::new(name.into(), Address::new(city, "1", "1111")).unwrap();
    repo.save_member(m).await.unwrap()
}

async fn book(repo: &SqliteRepo, name: &str, price: i64, stock: u32) -> Item {
    repo.save_item(Item::book(name, price, stock)).await.unwrap()
}

async fn two_orders(repo: &SqliteRepo) -> (OrderId, OrderId) {
    let a = member(repo, "userA", "Seoul").await;
    let jpa1 = book(repo, "JPA1 BOOK", 10000, 100).await;
    let jpa2 = book(repo, "JPA2 BOOK", 20000, 100).await;
    let b = member(repo, "userB", "Jinju").await;
    let spring1 = book(repo, "SPRING1 BOOK", 20000, 200).await;
    let spring2 = book(repo, "SPRING2 BOOK", 40000, 300).await;

    let first = repo
        .place_order(PlaceOrder {
            member_id: a.id,
            lines: vec![
                OrderLineRequest { item_id: jpa1.id, count: 1 },
                OrderLineRequest { item_id: jpa2.id, count: 2 },
            ],
        })
        .await
        .unwrap();
    let second = repo
        .place_order(PlaceOrder {
            member_id: b.id,
            lines: vec![
                OrderLineRequest { item_id: spring1.id, count: 3 },
                OrderLineRequest { item_id: spring2.id, count: 4 },
            ],
        })
        .await
        .unwrap();
    (first.id, second.id)
}

#[tokio::test]
async fn sqlite_member_and_item_round_trip() {
    let (_dir, url) = temp_db_url();
    let repo = SqliteRepo::new(&url).await.unwrap();

    let kim = member(&repo, "kim", "Seoul").await;
    assert_eq!(repo.find_member(kim.id).await.unwrap(), Some(kim.clone()));
    let dup = Member::new("kim".into(), Address::new("Busan", "2", "2222")).unwrap();
    assert!(matches!(
        repo.save_member(dup).await.unwrap_err(),
        RepoError::Conflict(_)
    ));

    let renamed = repo.rename_member(kim.id, "kim2".into()).await.unwrap().unwrap();
    assert_eq!(renamed.name, "kim2");
    assert!(repo.find_members_by_name("kim").await.unwrap().is_empty());
    assert!(repo.find_member(MemberId::new()).await.unwrap().is_none());

    let movie = Item::new(
        "Heat".into(),
        15000,
        3,
        ItemKind::Movie {
            director: "Mann".into(),
            actor: "Pacino".into(),
        },
    )
    .unwrap();
    repo.save_item(movie.clone()).await.unwrap();
    assert_eq!(repo.find_item(movie.id).await.unwrap(), Some(movie.clone()));

    let updated = repo
        .update_item(
            movie.id,
            ItemUpdate {
                name: "Heat (1995)".into(),
                price: 12000,
                stock_quantity: 7,
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.kind, movie.kind);
    assert_eq!(repo.find_items().await.unwrap(), vec![updated]);
}

#[tokio::test]
async fn sqlite_place_and_cancel_adjust_stock() {
    let (_dir, url) = temp_db_url();
    let repo = SqliteRepo::new(&url).await.unwrap();
    let kim = member(&repo, "kim", "Seoul").await;
    let jpa = book(&repo, "JPA", 10000, 10).await;

    let order = repo
        .place_order(PlaceOrder::single(kim.id, jpa.id, 2))
        .await
        .unwrap();
    assert_eq!(repo.find_item(jpa.id).await.unwrap().unwrap().stock_quantity, 8);

    let stored = repo.find_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.order_items, order.order_items);
    assert_eq!(stored.delivery, order.delivery);
    assert_eq!(stored.total_price(), 20000);

    let cancelled = repo.cancel_order(order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(repo.find_item(jpa.id).await.unwrap().unwrap().stock_quantity, 10);

    let err = repo.cancel_order(order.id).await.unwrap_err();
    assert!(matches!(err, RepoError::Domain(DomainError::AlreadyCancelled(_))));
    assert!(matches!(
        repo.cancel_order(OrderId::new()).await.unwrap_err(),
        RepoError::NotFound(_)
    ));
}

#[tokio::test]
async fn sqlite_insufficient_stock_rolls_back() {
    let (_dir, url) = temp_db_url();
    let repo = SqliteRepo::new(&url).await.unwrap();
    let kim = member(&repo, "kim", "Seoul").await;
    let a = book(&repo, "A", 100, 5).await;
    let b = book(&repo, "B", 100, 1).await;

    let err = repo
        .place_order(PlaceOrder {
            member_id: kim.id,
            lines: vec![
                OrderLineRequest { item_id: a.id, count: 2 },
                OrderLineRequest { item_id: b.id, count: 11 },
            ],
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Domain(DomainError::InsufficientStock { .. })
    ));
    assert_eq!(repo.find_item(a.id).await.unwrap().unwrap().stock_quantity, 5);
    assert!(repo.search_orders(&OrderSearch::all()).await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_query_primitives_cover_the_sample_orders() {
    let (_dir, url) = temp_db_url();
    let repo = SqliteRepo::new(&url).await.unwrap();
    let (first, second) = two_orders(&repo).await;
    let all = OrderSearch::all();

    let rows = repo.find_order_rows(&all, None).await.unwrap();
    assert_eq!(rows.iter().map(|r| r.order_id).collect::<Vec<_>>(), [first, second]);
    assert_eq!(
        repo.find_member_name(rows[0].member_id).await.unwrap().as_deref(),
        Some("userA")
    );
    let addr = repo.find_delivery_address(rows[1].delivery_id).await.unwrap().unwrap();
    assert_eq!(addr.city, "Jinju");

    let page = repo.find_order_summaries(&all, Some(Page::new(1, 5))).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].order_id, second);
    assert!(repo
        .find_order_summaries(&all, Some(Page::new(5, 5)))
        .await
        .unwrap()
        .is_empty());

    let lines = repo.find_line_items(second).await.unwrap();
    let names: Vec<_> = lines.iter().map(|l| l.item_name.as_str()).collect();
    assert_eq!(names, ["SPRING1 BOOK", "SPRING2 BOOK"]);

    let batch = repo.find_line_items_in(&[first, second]).await.unwrap();
    assert_eq!(batch.len(), 4);
    assert!(repo.find_line_items_in(&[]).await.unwrap().is_empty());

    let flat = repo.find_flat_rows(&all).await.unwrap();
    assert_eq!(flat.len(), 4);
    assert_eq!(flat[0].order_id, first);
    assert_eq!(flat[0].item_name, "JPA1 BOOK");
    assert_eq!(flat[3].order_id, second);
    assert_eq!((flat[3].unit_price, flat[3].quantity), (40000, 4));
}

#[tokio::test]
async fn sqlite_filters_are_case_sensitive_substrings() {
    let (_dir, url) = temp_db_url();
    let repo = SqliteRepo::new(&url).await.unwrap();
    let (first, second) = two_orders(&repo).await;
    repo.cancel_order(first).await.unwrap();

    let by_name = OrderSearch::all().with_member_name("erB");
    let rows = repo.find_order_rows(&by_name, None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].order_id, second);
    assert!(repo
        .find_flat_rows(&OrderSearch::all().with_member_name("USER"))
        .await
        .unwrap()
        .is_empty());

    let cancelled = OrderSearch::all().with_status(OrderStatus::Cancelled);
    let orders = repo.search_orders(&cancelled).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, first);
    assert_eq!(orders[0].order_items.len(), 2);

    let flat = repo.find_flat_rows(&cancelled).await.unwrap();
    assert!(flat.iter().all(|r| r.order_id == first));
}

#[tokio::test]
async fn sqlite_concurrent_orders_never_oversell() {
    let (_dir, url) = temp_db_url();
    let repo = SqliteRepo::new(&url).await.unwrap();
    let kim = member(&repo, "kim", "Seoul").await;
    let scarce = book(&repo, "scarce", 100, 5).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let repo = repo.clone();
        let cmd = PlaceOrder::single(kim.id, scarce.id, 1);
        handles.push(tokio::spawn(async move { repo.place_order(cmd).await }));
    }
    let mut placed = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => placed += 1,
            Err(RepoError::Domain(DomainError::InsufficientStock { .. })) => {}
            Err(other) => panic!("unexpected error {other}"),
        }
    }
    assert_eq!(placed, 5);
    assert_eq!(repo.find_item(scarce.id).await.unwrap().unwrap().stock_quantity, 0);
    assert_eq!(repo.search_orders(&OrderSearch::all()).await.unwrap().len(), 5);
}

#[tokio::test]
async fn sqlite_contention_between_stores_is_a_conflict() {
    let (_dir, url) = temp_db_url();
    let first = SqliteRepo::new(&url).await.unwrap();
    let second = SqliteRepo::new(&url).await.unwrap();
    let kim = member(&first, "kim", "Seoul").await;
    let scarce = book(&first, "scarce", 100, 5).await;

    let mut handles = Vec::new();
    for i in 0..10 {
        let repo = if i % 2 == 0 { first.clone() } else { second.clone() };
        let cmd = PlaceOrder::single(kim.id, scarce.id, 1);
        handles.push(tokio::spawn(async move { repo.place_order(cmd).await }));
    }
    let mut placed = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => placed += 1,
            Err(RepoError::Conflict(_))
            | Err(RepoError::Domain(DomainError::InsufficientStock { .. })) => {}
            Err(other) => panic!("lock contention leaked as {other}"),
        }
    }
    let left = first.find_item(scarce.id).await.unwrap().unwrap().stock_quantity;
    assert!(placed >= 1);
    assert_eq!(placed + left, 5);
    assert_eq!(
        first.search_orders(&OrderSearch::all()).await.unwrap().len() as u32,
        placed
    );
}
