///  To run :
///  cargo r --example client_example
use reqwest::StatusCode;
use shop_client::{JoinMemberRequest, OrderQuery, RegisterItemRequest, ShopClient};
use shop_hex::application::ShopServices;
use shop_hex::config::QueryConfig;
use shop_hex::inbound::http::{HttpServer, HttpServerConfig};
use shop_repo::build_repo;
use shop_types::domain::ids::MemberId;
use shop_types::domain::item::ItemKind;
use shop_types::domain::order::{OrderLineRequest, OrderStatus, PlaceOrder};
use tempfile::tempdir;

fn find_free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let port = find_free_port();
    let addr = format!("http://127.0.0.1:{port}/");

    // Use a temp file-backed SQLite DB so multiple connections see the same data.
    let tmp = tempdir()?;
    let db_path = tmp.path().join("shop.db");
    let db_url = format!("sqlite://{}", db_path.display());

    let repo = build_repo(Some(&db_url)).await?;
    let services = ShopServices::new(repo, QueryConfig::default());
    let server = HttpServer::new(
        services,
        HttpServerConfig {
            port: port.to_string(),
        },
    )
    .await?;

    let handle = tokio::spawn(async move {
        server.run().await.expect("server run");
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let client = ShopClient::new(&addr)?;

    let samples = [
        ("userA", "Seoul", [("JPA1 BOOK", 10000, 1), ("JPA2 BOOK", 20000, 2)]),
        ("userB", "Jinju", [("SPRING1 BOOK", 20000, 3), ("SPRING2 BOOK", 40000, 4)]),
    ];
    let mut order_ids = Vec::new();
    for (name, city, books) in samples {
        let created = client
            .join_member(&JoinMemberRequest {
                name: name.into(),
                city: city.into(),
                street: "1".into(),
                zipcode: "1111".into(),
            })
            .await?;
        let member_id = MemberId::parse(&created.id)?;

        let mut lines = Vec::new();
        for (title, price, count) in books {
            let item = client
                .register_item(&RegisterItemRequest {
                    name: title.into(),
                    price,
                    stock_quantity: 100,
                    kind: ItemKind::Book {
                        author: String::new(),
                        isbn: String::new(),
                    },
                })
                .await?;
            lines.push(OrderLineRequest {
                item_id: item.id,
                count,
            });
        }
        let order = client.place_order(&PlaceOrder { member_id, lines }).await?;
        println!("{name} placed order {} totalling {}", order.id, order.total_price());
        order_ids.push(order.id);
    }

    let all = OrderQuery::default();
    let rows = client.flat_order_rows(&all).await?;
    println!("flat rows: {}", rows.len());
    for strategy in ["per-root", "batched", "flat"] {
        let views = client.order_views(strategy, &all).await?;
        println!("{strategy}: {} orders", views.len());
        for view in &views {
            println!(
                "  {} ({}) -> {} line items",
                view.member_name,
                view.delivery_address.city,
                view.line_items.len()
            );
        }
    }

    let first_page = OrderQuery {
        limit: Some(1),
        ..Default::default()
    };
    let summaries = client.simple_orders("eager", &first_page).await?;
    println!("first page: {:?}", summaries.iter().map(|s| &s.member_name).collect::<Vec<_>>());

    let cancelled = client.cancel_order(order_ids[0]).await?;
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    println!("Cancelled order {}", cancelled.id);

    // A second cancel is rejected with 409.
    match client.cancel_order(order_ids[0]).await {
        Ok(_) => anyhow::bail!("second cancel unexpectedly succeeded"),
        Err(err) => {
            let status = err.downcast_ref::<reqwest::Error>().and_then(|e| e.status());
            assert_eq!(status, Some(StatusCode::CONFLICT));
            println!("Second cancel rejected: {err}");
        }
    }

    // Paging the fetch-join strategy is refused with 400.
    match client.order_views("flat", &first_page).await {
        Ok(_) => anyhow::bail!("paged flat query unexpectedly succeeded"),
        Err(err) => println!("Paged flat query rejected: {err}"),
    }

    handle.abort();
    Ok(())
}
