//! Shared types for the receipt pipeline
//!
//! Order and product records handed over by the order-management side,
//! plus the business metadata printed on every receipt.

pub mod models;

// Re-exports
pub use models::{AggregateProduct, BusinessInfo, Order, Product};
pub use rust_decimal::Decimal;
pub use serde::{Deserialize, Serialize};
