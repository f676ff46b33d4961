//! Read-side query shaping: filters, projections and the assembler.

pub mod assembler;
pub mod filter;
pub mod projection;
