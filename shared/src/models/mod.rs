//! Data models
//!
//! Shared between the receipt pipeline and the order-management collaborator.
//! All IDs are `u64`; money is `rust_decimal::Decimal`.

pub mod order;
pub mod product;
pub mod store_info;

// Re-exports
pub use order::*;
pub use product::*;
pub use store_info::*;
