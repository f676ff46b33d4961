//! Merges root rows and line-item rows into [`OrderView`]s.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::domain::ids::OrderId;

use super::projection::{FlatOrderRow, LineItemRow, OrderLineItem, OrderSummary, OrderView};

/// Groups collection rows by owning order, keeping row order inside each group.
pub fn group_line_items(
    rows: impl IntoIterator<Item = LineItemRow>,
) -> HashMap<OrderId, Vec<OrderLineItem>> {
    let mut grouped: HashMap<OrderId, Vec<OrderLineItem>> = HashMap::new();
    for row in rows {
        grouped.entry(row.order_id).or_default().push(row.into_line());
    }
    grouped
}

/// Attaches each root's line items in root order. Roots without an entry get
/// an empty sequence.
pub fn attach_line_items(
    roots: Vec<OrderSummary>,
    mut line_items: HashMap<OrderId, Vec<OrderLineItem>>,
) -> Vec<OrderView> {
    roots
        .into_iter()
        .map(|root| {
            let lines = line_items.remove(&root.order_id).unwrap_or_default();
            OrderView::new(root, lines)
        })
        .collect()
}

/// De-duplicates fetch-join rows into one view per order id.
///
/// Groups appear in first-occurrence order of their order id and take their
/// root fields from that first row; line items keep row order.
pub fn group_flat_rows(rows: impl IntoIterator<Item = FlatOrderRow>) -> Vec<OrderView> {
    let mut views: Vec<OrderView> = Vec::new();
    let mut position: HashMap<OrderId, usize> = HashMap::new();

    for row in rows {
        let line = row.line();
        match position.entry(row.order_id) {
            Entry::Occupied(slot) => views[*slot.get()].line_items.push(line),
            Entry::Vacant(slot) => {
                slot.insert(views.len());
                views.push(OrderView::new(row.into_summary(), vec![line]));
            }
        }
    }
    views
}
