//! Parsed CSV uploads.
//!
//! A [`Table`] keeps every cell as the raw string from the file. Whether a
//! cell counts as *missing* is decided by [`is_missing`]: empty cells and
//! the usual spreadsheet "not available" markers are.

use csv::{ReaderBuilder, StringRecord};
use indexmap::IndexMap;

/// Cell values treated as missing data.
pub const MISSING_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub fn is_missing(cell: &str) -> bool {
    MISSING_MARKERS.contains(&cell)
}

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("file is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Expected {expected} fields in line {line}, saw {found}")]
    RowTooLong {
        line: u64,
        expected: usize,
        found: usize,
    },
}

/// A CSV file with a header row.
#[derive(Debug, Clone)]
pub struct Table {
    /// Column name to position. On repeated header names the first wins.
    columns: IndexMap<String, usize>,
    /// Header length, repeated names included.
    width: usize,
    records: Vec<StringRecord>,
}

impl Table {
    /// Parses a comma-delimited UTF-8 file. A leading byte order mark is
    /// dropped and blank lines are skipped. Rows may be shorter than the
    /// header but not longer.
    ///
    /// # Errors
    ///
    /// Returns `TableError` for non-UTF-8 input, unreadable CSV, or a row
    /// with more cells than the header.
    pub fn from_csv(bytes: &[u8]) -> Result<Self, TableError> {
        let text = std::str::from_utf8(bytes)?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader.headers()?;
        let width = headers.len();
        let mut columns = IndexMap::new();
        for (position, name) in headers.iter().enumerate() {
            columns.entry(name.to_string()).or_insert(position);
        }

        let mut records = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.len() == 1 && record[0].is_empty() {
                continue;
            }
            if record.len() > width {
                return Err(TableError::RowTooLong {
                    line: record.position().map_or(0, |p| p.line()),
                    expected: width,
                    found: record.len(),
                });
            }
            records.push(record);
        }

        Ok(Self {
            columns,
            width,
            records,
        })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.records.iter().map(move |record| Row {
            table: self,
            record,
        })
    }

    /// Raw cells of one column in row order, `""` for short rows, or `None`
    /// if the column does not exist.
    pub fn column(&self, name: &str) -> Option<Vec<String>> {
        let position = *self.columns.get(name)?;
        Some(
            self.records
                .iter()
                .map(|r| r.get(position).unwrap_or_default().to_string())
                .collect(),
        )
    }
}

/// One data row of a [`Table`].
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a Table,
    record: &'a StringRecord,
}

impl<'a> Row<'a> {
    /// Raw cell, or `None` if the column does not exist or the row is short.
    pub fn raw(&self, column: &str) -> Option<&'a str> {
        let position = *self.table.columns.get(column)?;
        self.record.get(position)
    }

    /// Cell value, or `None` when the cell is absent or missing.
    pub fn value(&self, column: &str) -> Option<&'a str> {
        self.raw(column).filter(|cell| !is_missing(cell))
    }

    /// Whether any header position, repeated names included, is missing in
    /// this row.
    pub fn has_missing_cell(&self) -> bool {
        (0..self.table.width).any(|position| self.record.get(position).is_none_or(is_missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_rows() {
        let table = Table::from_csv(b"Zip,Product\n10001,Widget\n02134,Gadget\n").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.columns().collect::<Vec<_>>(), ["Zip", "Product"]);
        // Leading zeros survive: cells stay strings.
        assert_eq!(table.column("Zip").unwrap(), ["10001", "02134"]);
    }

    #[test]
    fn strips_bom_and_skips_blank_lines() {
        let table = Table::from_csv("\u{feff}Zip\n10001\n\n20002\n".as_bytes()).unwrap();
        assert!(table.has_column("Zip"));
        assert_eq!(table.column("Zip").unwrap(), ["10001", "20002"]);
    }

    #[test]
    fn short_rows_and_markers_are_missing() {
        let table = Table::from_csv(b"Zip,Product,Recorded\n10001,Widget\n20002,N/A,2024\n").unwrap();
        let rows: Vec<_> = table.rows().collect();

        assert_eq!(rows[0].raw("Recorded"), None);
        assert!(rows[0].has_missing_cell());

        assert_eq!(rows[1].raw("Product"), Some("N/A"));
        assert_eq!(rows[1].value("Product"), None);
        assert!(rows[1].has_missing_cell());
    }

    #[test]
    fn whitespace_is_not_a_missing_marker() {
        let table = Table::from_csv(b"Zip,Note\n10001, \n").unwrap();
        let row = table.rows().next().unwrap();
        assert_eq!(row.value("Note"), Some(" "));
        assert!(!row.has_missing_cell());
    }

    #[test]
    fn repeated_header_cells_are_all_checked() {
        let table = Table::from_csv(b"Zip,Notes,Notes\n10001,x,\n").unwrap();
        let row = table.rows().next().unwrap();
        assert_eq!(row.value("Notes"), Some("x"));
        assert!(row.has_missing_cell());
    }

    #[test]
    fn rejects_rows_longer_than_header() {
        let err = Table::from_csv(b"Zip,Product\n10001,Widget\n20002,Gadget,EXTRA\n").unwrap_err();
        assert!(matches!(
            err,
            TableError::RowTooLong {
                line: 3,
                expected: 2,
                found: 3
            }
        ));
        assert_eq!(err.to_string(), "Expected 2 fields in line 3, saw 3");
    }

    #[test]
    fn rejects_invalid_utf8() {
        let err = Table::from_csv(&[0x5a, 0x69, 0x70, 0x0a, 0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, TableError::Encoding(_)));
    }

    #[test]
    fn unknown_column_is_none() {
        let table = Table::from_csv(b"Zip\n10001\n").unwrap();
        assert!(table.column("Product").is_none());
        assert_eq!(table.rows().next().unwrap().raw("Product"), None);
    }
}
