use serde::{Deserialize, Serialize};

use super::address::Address;
use super::errors::DomainError;
use super::ids::MemberId;

/// A registered customer. Names are unique across members; the store enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub address: Address,
}

impl Member {
    pub fn new(name: String, address: Address) -> Result<Self, DomainError> {
        let name = validate_name(name)?;
        Ok(Self {
            id: MemberId::new(),
            name,
            address,
        })
    }

    pub fn rename(&mut self, name: String) -> Result<(), DomainError> {
        self.name = validate_name(name)?;
        Ok(())
    }
}

fn validate_name(name: String) -> Result<String, DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::Validation("member name empty".into()));
    }
    Ok(name)
}
