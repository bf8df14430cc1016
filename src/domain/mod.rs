//! Domain types and DTOs

pub mod contract;

pub use contract::*;
