use serde::{Deserialize, Serialize};

use super::address::Address;
use super::ids::DeliveryId;
use super::member::Member;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Ready,
    Completed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Ready => "READY",
            DeliveryStatus::Completed => "COMPLETED",
        }
    }
}

impl core::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READY" => Ok(DeliveryStatus::Ready),
            "COMPLETED" => Ok(DeliveryStatus::Completed),
            other => Err(format!("unknown delivery status {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: DeliveryId,
    pub address: Address,
    pub status: DeliveryStatus,
}

impl Delivery {
    pub fn new(address: Address) -> Self {
        Self {
            id: DeliveryId::new(),
            address,
            status: DeliveryStatus::Ready,
        }
    }

    /// Ships to the member's current address.
    pub fn to_member(member: &Member) -> Self {
        Self::new(member.address.clone())
    }
}
