pub mod address;
pub mod delivery;
pub mod errors;
pub mod ids;
pub mod item;
pub mod member;
pub mod order;
