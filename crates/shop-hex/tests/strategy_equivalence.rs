use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use shop_hex::application::order_query_service::{
    OrderQueryService, OrderViewStrategy, SummaryStrategy,
};
use shop_hex::config::QueryConfig;
use shop_repo::memory::InMemoryRepo;
use shop_repo::sqlite::SqliteRepo;
use shop_types::domain::address::Address;
use shop_types::domain::ids::{DeliveryId, MemberId, OrderId};
use shop_types::domain::item::Item;
use shop_types::domain::member::Member;
use shop_types::domain::order::{OrderLineRequest, OrderStatus, PlaceOrder};
use shop_types::ports::{OrderQueryStore, RepoError, ShopRepository};
use shop_types::query::filter::{OrderSearch, Page};
use shop_types::query::projection::{
    FlatOrderRow, LineItemRow, OrderRow, OrderSummary, OrderView,
};
use tempfile::TempDir;

/// Counts every round trip to the wrapped store.
struct CountingStore<S> {
    inner: S,
    calls: AtomicUsize,
}

impl<S> CountingStore<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn take(&self) -> usize {
        self.calls.swap(0, Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: OrderQueryStore> OrderQueryStore for CountingStore<S> {
    async fn find_order_rows(
        &self,
        search: &OrderSearch,
        page: Option<Page>,
    ) -> Result<Vec<OrderRow>, RepoError> {
        self.tick();
        self.inner.find_order_rows(search, page).await
    }

    async fn find_member_name(&self, id: MemberId) -> Result<Option<String>, RepoError> {
        self.tick();
        self.inner.find_member_name(id).await
    }

    async fn find_delivery_address(
        &self,
        id: DeliveryId,
    ) -> Result<Option<Address>, RepoError> {
        self.tick();
        self.inner.find_delivery_address(id).await
    }

    async fn find_order_summaries(
        &self,
        search: &OrderSearch,
        page: Option<Page>,
    ) -> Result<Vec<OrderSummary>, RepoError> {
        self.tick();
        self.inner.find_order_summaries(search, page).await
    }

    async fn find_line_items(&self, order_id: OrderId) -> Result<Vec<LineItemRow>, RepoError> {
        self.tick();
        self.inner.find_line_items(order_id).await
    }

    async fn find_line_items_in(
        &self,
        order_ids: &[OrderId],
    ) -> Result<Vec<LineItemRow>, RepoError> {
        self.tick();
        self.inner.find_line_items_in(order_ids).await
    }

    async fn find_flat_rows(&self, search: &OrderSearch) -> Result<Vec<FlatOrderRow>, RepoError> {
        self.tick();
        self.inner.find_flat_rows(search).await
    }
}

/// userA places three orders, userB two; the second of userA's is cancelled.
async fn populate<R: ShopRepository>(repo: R) -> R {
    let a = repo
        .save_member(Member::new("userA".into(), Address::new("Seoul", "1", "1111")).unwrap())
        .await
        .unwrap();
    let b = repo
        .save_member(Member::new("userB".into(), Address::new("Jinju", "2", "2222")).unwrap())
        .await
        .unwrap();
    let mut books = Vec::new();
    for (name, price) in [("JPA1 BOOK", 10000), ("JPA2 BOOK", 20000), ("SPRING1 BOOK", 20000)] {
        books.push(repo.save_item(Item::book(name, price, 100)).await.unwrap());
    }

    let mut placed = Vec::new();
    for (member, lines) in [
        (a.id, vec![(0, 1), (1, 2)]),
        (b.id, vec![(2, 3)]),
        (a.id, vec![(1, 1)]),
        (b.id, vec![(0, 4), (1, 1), (2, 2)]),
        (a.id, vec![(2, 1), (0, 1)]),
    ] {
        let command = PlaceOrder {
            member_id: member,
            lines: lines
                .into_iter()
                .map(|(i, count)| OrderLineRequest {
                    item_id: books[i].id,
                    count,
                })
                .collect(),
        };
        placed.push(repo.place_order(command).await.unwrap());
    }
    repo.cancel_order(placed[2].id).await.unwrap();
    repo
}

async fn populated_memory() -> InMemoryRepo {
    populate(InMemoryRepo::new()).await
}

/// The directory must outlive the store.
async fn populated_sqlite() -> (TempDir, SqliteRepo) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("shop.db").display());
    let repo = SqliteRepo::new(&url).await.unwrap();
    (dir, populate(repo).await)
}

type Counted<S> = (Arc<CountingStore<S>>, OrderQueryService<CountingStore<S>>);

fn service<S: OrderQueryStore>(repo: S, batch: usize) -> Counted<S> {
    let store = Arc::new(CountingStore::new(repo));
    let config = QueryConfig {
        in_list_batch_size: batch,
        ..QueryConfig::default()
    };
    (store.clone(), OrderQueryService::new(store, config))
}

fn searches() -> Vec<OrderSearch> {
    vec![
        OrderSearch::all(),
        OrderSearch::all().with_status(OrderStatus::Ordered),
        OrderSearch::all().with_status(OrderStatus::Cancelled),
        OrderSearch::all().with_member_name("A"),
        OrderSearch::all()
            .with_status(OrderStatus::Ordered)
            .with_member_name("user"),
        OrderSearch::all().with_member_name("nobody"),
    ]
}

async fn per_root_and_batched_agree<S: OrderQueryStore>(repo: S) {
    let (store, svc) = service(repo, 1000);
    let pages = [None, Some(Page::new(0, 2)), Some(Page::new(1, 3)), Some(Page::new(9, 3))];

    for search in searches() {
        for page in pages {
            let per_root = svc.views_per_root(&search, page).await.unwrap();
            assert_eq!(store.take(), 1 + per_root.len());

            let batched = svc.views_batched(&search, page).await.unwrap();
            let expected = if batched.is_empty() { 1 } else { 2 };
            assert_eq!(store.take(), expected);

            assert_eq!(per_root, batched, "search {search:?} page {page:?}");
        }
    }
}

async fn flat_matches_batched<S: OrderQueryStore>(repo: S) {
    let (store, svc) = service(repo, 1000);
    for search in searches() {
        let batched = svc.views_batched(&search, None).await.unwrap();
        store.take();

        let flat = svc.views_flat(&search).await.unwrap();
        assert_eq!(store.take(), 1);
        assert_eq!(flat, batched, "search {search:?}");

        let rows = svc.flat_rows(&search).await.unwrap();
        let lines: usize = flat.iter().map(|v| v.line_items.len()).sum();
        assert_eq!(rows.len(), lines);
    }
}

async fn batched_chunks<S: OrderQueryStore>(repo: S) {
    let (store, svc) = service(repo, 2);
    let views = svc.views_batched(&OrderSearch::all(), None).await.unwrap();
    assert_eq!(views.len(), 5);
    // root query plus ceil(5 / 2) IN-list queries
    assert_eq!(store.take(), 1 + 3);

    let single = svc.views_per_root(&OrderSearch::all(), None).await.unwrap();
    assert_eq!(store.take(), 1 + 5);
    assert_eq!(views, single);

    let shape = |vs: &[OrderView]| {
        vs.iter()
            .map(|v| (v.member_name.clone(), v.line_items.len()))
            .collect::<Vec<_>>()
    };
    assert_eq!(
        shape(&views),
        [
            ("userA".to_string(), 2),
            ("userB".to_string(), 1),
            ("userA".to_string(), 1),
            ("userB".to_string(), 3),
            ("userA".to_string(), 2),
        ]
    );
}

async fn plain_resolves_each_association_once<S: OrderQueryStore>(repo: S) {
    let (store, svc) = service(repo, 1000);

    let plain = svc.plain_summaries(&OrderSearch::all(), None).await.unwrap();
    // 1 root query + 2 distinct members + 5 distinct deliveries
    assert_eq!(store.take(), 1 + 2 + 5);

    let eager = svc.eager_summaries(&OrderSearch::all(), None).await.unwrap();
    assert_eq!(store.take(), 1);
    assert_eq!(plain, eager);

    let only_a = OrderSearch::all().with_member_name("userA");
    let plain = svc.plain_summaries(&only_a, None).await.unwrap();
    assert_eq!(plain.len(), 3);
    assert_eq!(store.take(), 1 + 1 + 3);
    assert_eq!(plain, svc.eager_summaries(&only_a, None).await.unwrap());
}

#[tokio::test]
async fn strategies_dispatch_by_name() {
    let (store, svc) = service(populated_memory().await, 1000);
    let search = OrderSearch::all().with_status(OrderStatus::Cancelled);

    let summaries = svc
        .summaries(SummaryStrategy::Eager, &search, None)
        .await
        .unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].member_name, "userA");

    for strategy in [
        OrderViewStrategy::PerRoot,
        OrderViewStrategy::Batched,
        OrderViewStrategy::Flat,
    ] {
        let views = svc.views(strategy, &search, None).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].line_items.len(), 1);
        assert_eq!(views[0].line_items[0].item_name, "JPA2 BOOK");
    }
    store.take();
}

#[tokio::test]
async fn empty_store_costs_a_single_query() {
    let (store, svc) = service(InMemoryRepo::new(), 1000);
    assert!(svc.views_batched(&OrderSearch::all(), None).await.unwrap().is_empty());
    assert_eq!(store.take(), 1);
    assert!(svc.views_per_root(&OrderSearch::all(), None).await.unwrap().is_empty());
    assert_eq!(store.take(), 1);
    assert!(svc.plain_summaries(&OrderSearch::all(), None).await.unwrap().is_empty());
    assert_eq!(store.take(), 1);
}

#[tokio::test]
async fn per_root_and_batched_agree_and_differ_only_in_query_count() {
    per_root_and_batched_agree(populated_memory().await).await;
}

#[tokio::test]
async fn flat_matches_batched_with_one_query() {
    flat_matches_batched(populated_memory().await).await;
}

#[tokio::test]
async fn batched_issues_one_query_per_chunk() {
    batched_chunks(populated_memory().await).await;
}

#[tokio::test]
async fn plain_resolves_each_distinct_association_once() {
    plain_resolves_each_association_once(populated_memory().await).await;
}

#[tokio::test]
async fn sqlite_per_root_and_batched_agree() {
    let (_dir, repo) = populated_sqlite().await;
    per_root_and_batched_agree(repo).await;
}

#[tokio::test]
async fn sqlite_flat_matches_batched() {
    let (_dir, repo) = populated_sqlite().await;
    flat_matches_batched(repo).await;
}

#[tokio::test]
async fn sqlite_batched_issues_one_query_per_chunk() {
    let (_dir, repo) = populated_sqlite().await;
    batched_chunks(repo).await;
}

#[tokio::test]
async fn sqlite_plain_resolves_each_distinct_association_once() {
    let (_dir, repo) = populated_sqlite().await;
    plain_resolves_each_association_once(repo).await;
}

#[tokio::test]
async fn sqlite_and_memory_render_the_same_projections() {
    let (_dir, sqlite) = populated_sqlite().await;
    let memory = populated_memory().await;
    let (_, on_sqlite) = service(sqlite, 1000);
    let (_, on_memory) = service(memory, 1000);

    let strip = |vs: Vec<OrderView>| {
        vs.into_iter()
            .map(|v| (v.member_name, v.status, v.delivery_address, v.line_items))
            .collect::<Vec<_>>()
    };
    for search in searches() {
        assert_eq!(
            strip(on_sqlite.views_flat(&search).await.unwrap()),
            strip(on_memory.views_flat(&search).await.unwrap()),
            "search {search:?}"
        );
    }
}
