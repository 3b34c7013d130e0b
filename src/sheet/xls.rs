//! Excel workbooks (BIFF `.xls` and OOXML `.xlsx`) via `calamine`.
//!
//! Only the first worksheet is read.

use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Range, Reader, Xls, Xlsx};

use super::SheetSource;
use crate::error::{StockError, Result};

/// First worksheet of an Excel workbook.
#[derive(Debug)]
pub struct XlsSheet {
    range: Range<Data>,
}

impl XlsSheet {
    pub fn from_xls(data: &[u8]) -> Result<Self> {
        let mut workbook: Xls<_> = open_workbook_from_rs(Cursor::new(data.to_vec()))
            .map_err(|e| StockError::Sheet(format!("xls: {e}")))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| StockError::Sheet("xls: workbook has no sheets".into()))?
            .map_err(|e| StockError::Sheet(format!("xls: {e}")))?;
        Ok(Self { range })
    }

    pub fn from_xlsx(data: &[u8]) -> Result<Self> {
        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(data.to_vec()))
            .map_err(|e| StockError::Sheet(format!("xlsx: {e}")))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| StockError::Sheet("xlsx: workbook has no sheets".into()))?
            .map_err(|e| StockError::Sheet(format!("xlsx: {e}")))?;
        Ok(Self { range })
    }
}

impl SheetSource for XlsSheet {
    fn row_count(&self) -> usize {
        self.range.end().map_or(0, |(r, _)| r as usize + 1)
    }

    fn col_count(&self) -> usize {
        self.range.end().map_or(0, |(_, c)| c as usize + 1)
    }

    fn cell(&self, row: usize, col: usize) -> String {
        if row == 0 || col == 0 {
            return String::new();
        }
        self.range
            .get_value(((row - 1) as u32, (col - 1) as u32))
            .map(cell_text)
            .unwrap_or_default()
    }
}

/// Whole numbers are stored as floats in BIFF; show them without `.0`.
fn cell_text(value: &Data) -> String {
    match value {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}
