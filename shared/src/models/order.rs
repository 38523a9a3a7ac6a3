//! Order Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::product::Product;

/// Order as handed over by order management
///
/// Read-only for the receipt pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    #[serde(default)]
    pub products: Vec<Product>,
}

impl Order {
    pub fn new(id: u64, products: Vec<Product>) -> Self {
        Self { id, products }
    }

    /// Sum of all line-item unit prices
    pub fn total(&self) -> Decimal {
        self.products.iter().map(|p| p.price).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
