pub mod item_repository;
pub mod member_repository;
pub mod order_query;
pub mod order_repository;
pub mod repo_error;

pub use item_repository::ItemRepository;
pub use member_repository::MemberRepository;
pub use order_query::OrderQueryStore;
pub use order_repository::OrderRepository;
pub use repo_error::RepoError;

/// Everything the application layer needs from a single backing store.
pub trait ShopRepository:
    MemberRepository + ItemRepository + OrderRepository + OrderQueryStore
{
}

impl<T> ShopRepository for T where
    T: MemberRepository + ItemRepository + OrderRepository + OrderQueryStore
{
}
