use shop_types::domain::address::Address;
use shop_types::domain::item::ItemKind;
use shop_types::domain::order::{Order, OrderLineRequest, PlaceOrder};
use shop_types::ports::ShopRepository;

use super::item_service::NewItem;
use super::ShopServices;
use crate::errors::AppError;

struct SampleOrder {
    member: &'static str,
    address: (&'static str, &'static str, &'static str),
    /// (name, price, stock, ordered count) per book.
    books: [(&'static str, i64, u32, u32); 2],
}

const SAMPLE_ORDERS: [SampleOrder; 2] = [
    SampleOrder {
        member: "userA",
        address: ("Seoul", "1", "1111"),
        books: [("JPA1 BOOK", 10000, 100, 1), ("JPA2 BOOK", 20000, 100, 2)],
    },
    SampleOrder {
        member: "userB",
        address: ("Jinju", "2", "2222"),
        books: [("SPRING1 BOOK", 20000, 200, 3), ("SPRING2 BOOK", 40000, 300, 4)],
    },
];

/// Inserts two members with one two-line order each. Does nothing when the
/// first sample member already exists, so restarts against a file database
/// do not duplicate the data.
pub async fn seed_sample_data<R: ShopRepository>(
    services: &ShopServices<R>,
) -> Result<Vec<Order>, AppError> {
    let existing = services.members.list_members().await?;
    if existing.iter().any(|m| m.name == SAMPLE_ORDERS[0].member) {
        tracing::info!("sample data already present");
        return Ok(Vec::new());
    }

    let mut orders = Vec::with_capacity(SAMPLE_ORDERS.len());
    for sample in &SAMPLE_ORDERS {
        let (city, street, zipcode) = sample.address;
        let member = services
            .members
            .join(sample.member.into(), Address::new(city, street, zipcode))
            .await?;

        let mut lines = Vec::with_capacity(sample.books.len());
        for (name, price, stock, count) in sample.books {
            let item = services
                .items
                .register(NewItem {
                    name: name.into(),
                    price,
                    stock_quantity: stock,
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

        let order = services
            .orders
            .place_order(PlaceOrder {
                member_id: member.id,
                lines,
            })
            .await?;
        orders.push(order);
    }

    tracing::info!(orders = orders.len(), "sample data seeded");
    Ok(orders)
}
