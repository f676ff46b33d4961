use async_trait::async_trait;

use super::repo_error::RepoError;
use crate::domain::ids::ItemId;
use crate::domain::item::{Item, ItemUpdate};

#[async_trait]
pub trait ItemRepository: Send + Sync + 'static {
    async fn save_item(&self, item: Item) -> Result<Item, RepoError>;
    async fn find_item(&self, id: ItemId) -> Result<Option<Item>, RepoError>;
    async fn find_items(&self) -> Result<Vec<Item>, RepoError>;
    async fn update_item(&self, id: ItemId, update: ItemUpdate)
        -> Result<Option<Item>, RepoError>;
}
