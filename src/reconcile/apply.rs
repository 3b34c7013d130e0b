//! Row-level validation and store updates.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{StockError, Result};
use crate::model::header::{QUANTITY, SKU};
use crate::sheet::TabularReader;
use crate::store::{StockStatus, StockUpdate, StoreGateway};

/// First data row; row 1 holds the header.
pub const FIRST_DATA_ROW: usize = 2;

/// How a row maps onto the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApplyPolicy {
    /// Quantities strictly below this are out of stock.
    pub low_stock_threshold: f64,
    pub quantity_sentinel: i64,
}

impl Default for ApplyPolicy {
    fn default() -> Self {
        Self {
            low_stock_threshold: 10.0,
            quantity_sentinel: 9999,
        }
    }
}

impl ApplyPolicy {
    pub fn status_for(&self, quantity: f64) -> StockStatus {
        if quantity < self.low_stock_threshold {
            StockStatus::OutOfStock
        } else {
            StockStatus::InStock
        }
    }

    /// The update for a row, or `None` when the row is not actionable.
    pub fn update_for(&self, sku: &str, quantity: &str) -> Option<StockUpdate> {
        let sku = sku.trim();
        if sku.is_empty() {
            return None;
        }
        let quantity = parse_quantity(quantity)?;
        Some(StockUpdate {
            sku: sku.to_string(),
            status: self.status_for(quantity),
            quantity: self.quantity_sentinel,
        })
    }
}

/// A finite decimal number, surrounding whitespace allowed.
pub fn parse_quantity(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|q| q.is_finite())
}

/// Per-row results of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowTally {
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RowTally {
    pub fn all_ok(&self) -> bool {
        self.failed == 0
    }
}

/// Update the store from every data row. A failing row is counted and the
/// remaining rows are still attempted.
pub fn apply_rows(
    reader: &TabularReader,
    store: &mut dyn StoreGateway,
    policy: &ApplyPolicy,
) -> Result<RowTally> {
    let sku_col = reader
        .column_for(SKU)
        .ok_or_else(|| StockError::Header(SKU.to_string()))?;
    let qty_col = reader
        .column_for(QUANTITY)
        .ok_or_else(|| StockError::Header(QUANTITY.to_string()))?;

    let mut tally = RowTally::default();
    for row in FIRST_DATA_ROW..=reader.row_count() {
        let sku = reader.value_at(row, sku_col);
        let quantity = reader.value_at(row, qty_col);
        debug!(row, sku = %sku, quantity = %quantity, "Processing row");

        let Some(update) = policy.update_for(&sku, &quantity) else {
            tally.skipped += 1;
            continue;
        };
        debug!(
            sku = %update.sku,
            status = ?update.status,
            "Updating product"
        );
        match store.update_stock(&update) {
            Ok(_) => tally.applied += 1,
            Err(e) => {
                warn!(row, sku = %update.sku, error = %e, "Row not applied");
                tally.failed += 1;
            }
        }
    }
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::header::HeaderTemplate;
    use crate::sheet::tests::GridSheet;

    #[derive(Default)]
    struct Recording {
        updates: Vec<StockUpdate>,
        reject: Option<&'static str>,
    }

    impl StoreGateway for Recording {
        fn update_stock(&mut self, update: &StockUpdate) -> Result<usize> {
            if self.reject == Some(update.sku.as_str()) {
                return Err(StockError::Store("rejected".into()));
            }
            self.updates.push(update.clone());
            Ok(1)
        }
    }

    fn reader(rows: Vec<Vec<&'static str>>) -> TabularReader {
        let mut r = TabularReader::from_source(Box::new(GridSheet(rows)));
        assert!(r.discover_header(&HeaderTemplate::default()));
        r
    }

    #[test]
    fn test_threshold_boundary() {
        let policy = ApplyPolicy::default();
        assert_eq!(policy.status_for(9.99), StockStatus::OutOfStock);
        assert_eq!(policy.status_for(10.0), StockStatus::InStock);
        assert_eq!(policy.status_for(0.0), StockStatus::OutOfStock);
        assert_eq!(policy.status_for(-3.0), StockStatus::OutOfStock);
    }

    #[test]
    fn test_non_actionable_rows() {
        let policy = ApplyPolicy::default();
        assert!(policy.update_for("", "5").is_none());
        assert!(policy.update_for("  ", "5").is_none());
        assert!(policy.update_for("ABC", "").is_none());
        assert!(policy.update_for("ABC", "n/a").is_none());
        assert!(policy.update_for("ABC", "NaN").is_none());
        assert!(policy.update_for("ABC", " 12 ").is_some());
        assert!(policy.update_for("ABC", "1e2").is_some());
    }

    #[test]
    fn test_apply_rows_counts_outcomes() {
        let r = reader(vec![
            vec!["SKU", "AVAIL QTY"],
            vec!["ABC123", "5"],
            vec!["", "40"],
            vec!["DEF456", "lots"],
            vec!["GHI789", "10"],
        ]);
        let mut store = Recording::default();
        let tally = apply_rows(&r, &mut store, &ApplyPolicy::default()).unwrap();
        assert_eq!(tally, RowTally { applied: 2, skipped: 2, failed: 0 });
        assert_eq!(store.updates[0].status, StockStatus::OutOfStock);
        assert_eq!(store.updates[1].sku, "GHI789");
        assert_eq!(store.updates[1].status, StockStatus::InStock);
        assert!(store.updates.iter().all(|u| u.quantity == 9999));
    }

    #[test]
    fn test_failed_row_does_not_stop_the_rest() {
        let r = reader(vec![
            vec!["SKU", "AVAIL QTY"],
            vec!["BAD", "5"],
            vec!["GOOD", "50"],
        ]);
        let mut store = Recording {
            reject: Some("BAD"),
            ..Recording::default()
        };
        let tally = apply_rows(&r, &mut store, &ApplyPolicy::default()).unwrap();
        assert_eq!(tally.failed, 1);
        assert_eq!(tally.applied, 1);
        assert!(!tally.all_ok());
        assert_eq!(store.updates[0].sku, "GOOD");
    }
}
