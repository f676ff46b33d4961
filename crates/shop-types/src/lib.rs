//! shop-types: domain entities, query projections and repository ports.

pub mod domain;
pub mod ports;
pub mod query;
