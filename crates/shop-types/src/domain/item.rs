use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::ids::ItemId;

/// Variant-specific attributes. The ordering and query code only ever looks
/// at the shared fields on [`Item`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemKind {
    Book { author: String, isbn: String },
    Album { artist: String, etc: String },
    Movie { director: String, actor: String },
}

impl ItemKind {
    /// Single-character discriminator used by the single-table SQL layout.
    pub fn dtype(&self) -> &'static str {
        match self {
            ItemKind::Book { .. } => "B",
            ItemKind::Album { .. } => "A",
            ItemKind::Movie { .. } => "M",
        }
    }
}

/// Replacement values for an item's shared attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub name: String,
    pub price: i64,
    pub stock_quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub price: i64,
    pub stock_quantity: u32,
    pub kind: ItemKind,
}

impl Item {
    pub fn new(
        name: String,
        price: i64,
        stock_quantity: u32,
        kind: ItemKind,
    ) -> Result<Self, DomainError> {
        validate(&name, price)?;
        Ok(Self {
            id: ItemId::new(),
            name,
            price,
            stock_quantity,
            kind,
        })
    }

    pub fn book(name: impl Into<String>, price: i64, stock_quantity: u32) -> Self {
        Self {
            id: ItemId::new(),
            name: name.into(),
            price,
            stock_quantity,
            kind: ItemKind::Book {
                author: String::new(),
                isbn: String::new(),
            },
        }
    }

    pub fn apply(&mut self, update: ItemUpdate) -> Result<(), DomainError> {
        validate(&update.name, update.price)?;
        self.name = update.name;
        self.price = update.price;
        self.stock_quantity = update.stock_quantity;
        Ok(())
    }

    pub fn add_stock(&mut self, quantity: u32) {
        self.stock_quantity = self.stock_quantity.saturating_add(quantity);
    }

    /// Fails without touching the stock when fewer than `quantity` units remain.
    pub fn remove_stock(&mut self, quantity: u32) -> Result<(), DomainError> {
        self.ensure_stock(quantity)?;
        self.stock_quantity -= quantity;
        Ok(())
    }

    pub fn ensure_stock(&self, quantity: u32) -> Result<(), DomainError> {
        if quantity > self.stock_quantity {
            return Err(DomainError::InsufficientStock {
                item_id: self.id,
                requested: quantity,
                available: self.stock_quantity,
            });
        }
        Ok(())
    }
}

fn validate(name: &str, price: i64) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::Validation("item name empty".into()));
    }
    if price < 0 {
        return Err(DomainError::Validation("item price must be >= 0".into()));
    }
    Ok(())
}
