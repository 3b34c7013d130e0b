//! Header templates and resolved column indexes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Expected header cell text for one semantic column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderField {
    /// Literal header text as it appears in the spreadsheet.
    pub text: String,
    /// Whether the run fails when this column cannot be found.
    #[serde(default)]
    pub required: bool,
}

impl HeaderField {
    pub fn required(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            required: true,
        }
    }

    pub fn optional(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            required: false,
        }
    }
}

/// Semantic key → expected header text, immutable for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderTemplate(BTreeMap<String, HeaderField>);

/// Key of the product identifier column.
pub const SKU: &str = "sku";
/// Key of the available quantity column.
pub const QUANTITY: &str = "quantity";

impl Default for HeaderTemplate {
    fn default() -> Self {
        Self::new()
            .with(SKU, HeaderField::required("SKU"))
            .with(QUANTITY, HeaderField::required("AVAIL QTY"))
    }
}

impl HeaderTemplate {
    /// An empty template.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, key: impl Into<String>, field: HeaderField) -> Self {
        self.0.insert(key.into(), field);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderField)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Required keys, in key order.
    pub fn required_keys(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|(_, f)| f.required).map(|(k, _)| k)
    }
}

/// Semantic key → physical (1-based) spreadsheet column.
///
/// Column 0 is reserved for "unassigned".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnIndex(BTreeMap<String, usize>);

impl ColumnIndex {
    /// Record `col` for `key` unless the key already has a column.
    pub fn assign(&mut self, key: &str, col: usize) -> bool {
        if self.column(key).is_some() {
            return false;
        }
        self.0.insert(key.to_string(), col);
        true
    }

    /// The column mapped to `key`, or `None` when unassigned.
    pub fn column(&self, key: &str) -> Option<usize> {
        self.0.get(key).copied().filter(|&c| c != 0)
    }

    /// Valid iff every required key of `template` maps to a non-zero column.
    pub fn is_valid_for(&self, template: &HeaderTemplate) -> bool {
        template.required_keys().all(|k| self.column(k).is_some())
    }

    /// Required keys that are still unassigned.
    pub fn missing<'t>(&self, template: &'t HeaderTemplate) -> Vec<&'t str> {
        template
            .required_keys()
            .filter(|k| self.column(k).is_none())
            .collect()
    }
}
