use std::sync::Arc;

use serde::Deserialize;

use crate::errors::AppError;
use shop_types::domain::ids::ItemId;
use shop_types::domain::item::{Item, ItemKind, ItemUpdate};
use shop_types::ports::ItemRepository;

/// Registration payload; the variant attributes ride alongside the shared
/// fields under a `type` tag.
#[derive(Debug, Clone, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub price: i64,
    pub stock_quantity: u32,
    #[serde(flatten)]
    pub kind: ItemKind,
}

pub struct ItemService<R: ItemRepository> {
    repo: Arc<R>,
}

impl<R: ItemRepository> ItemService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn register(&self, new: NewItem) -> Result<Item, AppError> {
        let item = Item::new(new.name, new.price, new.stock_quantity, new.kind)?;
        let item = self.repo.save_item(item).await?;
        tracing::info!(item_id = %item.id, name = %item.name, "item registered");
        Ok(item)
    }

    pub async fn list_items(&self) -> Result<Vec<Item>, AppError> {
        Ok(self.repo.find_items().await?)
    }

    pub async fn get_item(&self, id: ItemId) -> Result<Item, AppError> {
        self.repo
            .find_item(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("item {id}")))
    }

    pub async fn update(&self, id: ItemId, update: ItemUpdate) -> Result<Item, AppError> {
        let item = self
            .repo
            .update_item(id, update)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("item {id}")))?;
        tracing::info!(item_id = %id, stock = item.stock_quantity, "item updated");
        Ok(item)
    }
}
