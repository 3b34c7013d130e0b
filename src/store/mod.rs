//! Product store gateway.
//!
//! The run issues exactly one update per actionable row; nothing is read
//! back and rows are not wrapped in a transaction.

pub mod sqlite;

use serde::Serialize;

use crate::error::Result;

/// Supplier availability recorded against a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    OutOfStock,
}

impl StockStatus {
    /// Value stored in the out-of-stock column.
    pub fn flag(self) -> &'static str {
        match self {
            Self::InStock => "0",
            Self::OutOfStock => "1",
        }
    }
}

/// One row's worth of changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockUpdate {
    /// Matched with `LIKE`, so `%` and `_` in a SKU act as wildcards.
    pub sku: String,
    pub status: StockStatus,
    /// Quantity written regardless of the supplier figure.
    pub quantity: i64,
}

/// Applies stock updates to the product catalogue.
pub trait StoreGateway {
    /// Returns the number of products changed (zero for an unknown SKU).
    fn update_stock(&mut self, update: &StockUpdate) -> Result<usize>;
}
