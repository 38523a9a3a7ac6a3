//! Product Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order line item
///
/// One unit of a product. An order holding three coffees carries three
/// equal `Product` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    /// Unit price in currency unit
    pub price: Decimal,
    /// Free-form type tag (e.g. "drink", "food")
    #[serde(rename = "type", default)]
    pub product_type: String,
}

impl Product {
    pub fn new(id: u64, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            product_type: String::new(),
        }
    }

    /// Set the type tag
    pub fn with_type(mut self, product_type: impl Into<String>) -> Self {
        self.product_type = product_type.into();
        self
    }
}

/// Consolidated receipt row: all units of one product id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateProduct {
    pub id: u64,
    pub name: String,
    pub quantity: u32,
    /// quantity × unit price
    pub price: Decimal,
    #[serde(rename = "type", default)]
    pub product_type: String,
}
