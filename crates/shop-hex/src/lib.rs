//! shop-hex: hexagonal shop API library (core services + inbound HTTP)

pub mod config;
pub mod errors;

pub mod application;

pub use shop_types::{domain, ports, query};

pub mod inbound; // HTTP adapter (server + handlers)
