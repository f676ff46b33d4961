use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a time-ordered identifier newtype.
///
/// Identifiers are UUIDv7, so sorting by id is sorting by creation order.
/// Root queries rely on that to return orders in placement order.
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

entity_id!(MemberId);
entity_id!(ItemId);
entity_id!(
    /// Order identifier; also the grouping key for line items.
    OrderId
);
entity_id!(OrderItemId);
entity_id!(DeliveryId);
