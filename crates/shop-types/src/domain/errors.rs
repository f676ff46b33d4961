use super::ids::{ItemId, OrderId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("insufficient stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: ItemId,
        requested: u32,
        available: u32,
    },

    #[error("order {0} is already cancelled")]
    AlreadyCancelled(OrderId),

    #[error("order {0} has already been delivered")]
    AlreadyDelivered(OrderId),

    #[error("order {order_id} references item {item_id} which was not supplied")]
    MissingItem { order_id: OrderId, item_id: ItemId },

    #[error("{0}")]
    Validation(String),
}
