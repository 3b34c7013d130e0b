//! Comma-separated sheets.

use ::csv::{ByteRecord, ReaderBuilder};

use super::SheetSource;
use crate::error::{StockError, Result};

/// A CSV attachment held as decoded rows.
#[derive(Debug)]
pub struct CsvSheet {
    rows: Vec<Vec<String>>,
    cols: usize,
}

impl CsvSheet {
    /// Parse CSV bytes. A leading UTF-8 BOM is ignored; ragged rows are
    /// allowed. Fields that are not UTF-8 are read as Windows-1252.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(data);

        let rows = reader
            .byte_records()
            .map(|r| r.map(|record| decode_record(&record)))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| StockError::Sheet(format!("CSV: {e}")))?;
        if rows.is_empty() {
            return Err(StockError::Sheet("CSV attachment has no rows".into()));
        }
        let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        Ok(Self { rows, cols })
    }
}

fn decode_record(record: &ByteRecord) -> Vec<String> {
    record.iter().map(decode_field).collect()
}

fn decode_field(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

impl SheetSource for CsvSheet {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn col_count(&self) -> usize {
        self.cols
    }

    fn cell(&self, row: usize, col: usize) -> String {
        if row == 0 || col == 0 {
            return String::new();
        }
        self.rows
            .get(row - 1)
            .and_then(|r| r.get(col - 1))
            .cloned()
            .unwrap_or_default()
    }
}
