//! Tabular access to spreadsheet attachments and header discovery.
//!
//! Concrete formats sit behind [`SheetSource`]; [`TabularReader`] adds the
//! header scan on top. Rows and columns are 1-based everywhere in this
//! module, row 1 being the first row of the sheet.

pub mod csv;
pub mod xls;

use tracing::debug;

use crate::error::{StockError, Result};
use crate::model::header::{ColumnIndex, HeaderTemplate};

/// Cell-by-position access to one worksheet.
pub trait SheetSource {
    /// Number of rows, counting from row 1 to the last populated row.
    fn row_count(&self) -> usize;
    /// Number of columns, counting from column 1 to the last populated one.
    fn col_count(&self) -> usize;
    /// Text of the cell at (`row`, `col`); empty when out of range or blank.
    fn cell(&self, row: usize, col: usize) -> String;
}

/// Spreadsheet format selected from the attachment's MIME subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Xls,
    Xlsx,
    Csv,
}

impl SheetFormat {
    pub fn from_subtype(subtype: &str) -> Option<Self> {
        match subtype.to_ascii_uppercase().as_str() {
            "VND.MS-EXCEL" | "MSEXCEL" | "X-MSEXCEL" => Some(Self::Xls),
            "VND.OPENXMLFORMATS-OFFICEDOCUMENT.SPREADSHEETML.SHEET" => Some(Self::Xlsx),
            "CSV" | "COMMA-SEPARATED-VALUES" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// A parsed worksheet plus the header columns found in it.
pub struct TabularReader {
    source: Box<dyn SheetSource>,
    columns: ColumnIndex,
}

impl std::fmt::Debug for TabularReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabularReader")
            .field("rows", &self.row_count())
            .field("cols", &self.col_count())
            .field("columns", &self.columns)
            .finish()
    }
}

impl TabularReader {
    /// Parse decoded attachment bytes using the reader for `subtype`.
    pub fn open(data: &[u8], subtype: &str) -> Result<Self> {
        let format = SheetFormat::from_subtype(subtype)
            .ok_or_else(|| StockError::Sheet(format!("no reader for subtype '{subtype}'")))?;
        debug!(?format, len = data.len(), "Opening spreadsheet");
        let source: Box<dyn SheetSource> = match format {
            SheetFormat::Xls => Box::new(xls::XlsSheet::from_xls(data)?),
            SheetFormat::Xlsx => Box::new(xls::XlsSheet::from_xlsx(data)?),
            SheetFormat::Csv => Box::new(csv::CsvSheet::from_bytes(data)?),
        };
        Ok(Self::from_source(source))
    }

    pub fn from_source(source: Box<dyn SheetSource>) -> Self {
        Self {
            source,
            columns: ColumnIndex::default(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.source.row_count()
    }

    pub fn col_count(&self) -> usize {
        self.source.col_count()
    }

    pub fn value_at(&self, row: usize, col: usize) -> String {
        self.source.cell(row, col)
    }

    /// Column resolved for `key` by the last [`discover_header`](Self::discover_header).
    pub fn column_for(&self, key: &str) -> Option<usize> {
        self.columns.column(key)
    }

    pub fn columns(&self) -> &ColumnIndex {
        &self.columns
    }

    /// Locate the header cells described by `template`.
    ///
    /// Cells are visited in row-major order. Each cell is compared against
    /// every template entry and the first matching key records that column
    /// (only the first column found per key is kept). The scan stops as soon
    /// as every required key has a column.
    pub fn discover_header(&mut self, template: &HeaderTemplate) -> bool {
        self.columns = ColumnIndex::default();
        let (rows, cols) = (self.row_count(), self.col_count());

        for row in 1..=rows {
            for col in 1..=cols {
                let value = self.source.cell(row, col);
                if let Some((key, field)) = template.iter().find(|(_, f)| f.text == value) {
                    if self.columns.assign(key, col) {
                        debug!(key, text = %field.text, row, col, "Found header column");
                    }
                }
                if self.columns.is_valid_for(template) {
                    debug!(row, col, "Header is valid");
                    return true;
                }
            }
        }
        debug!(missing = ?self.columns.missing(template), "Header is INVALID");
        false
    }
}
