//! @ai:module:intent Tabular containers and CSV reading/writing
//! @ai:module:layer infrastructure
//! @ai:module:public_api Table, MetricFrame
//! @ai:module:stateless true

use crate::error::{Error, Result};
use std::path::Path;

/// @ai:intent A raw CSV table: header plus string cells
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// @ai:intent Parse CSV text; every row is padded/checked to the header width
    /// @ai:effects pure
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let mut records = parse_csv(content);

        if records.is_empty() {
            return Err(Error::Csv {
                path: path.to_path_buf(),
                line: 1,
                message: "file is empty".to_string(),
            });
        }

        let columns = records.remove(0);
        let mut rows = Vec::with_capacity(records.len());

        for (i, record) in records.into_iter().enumerate() {
            if record.len() != columns.len() {
                return Err(Error::Csv {
                    path: path.to_path_buf(),
                    line: i + 2,
                    message: format!(
                        "expected {} fields, found {}",
                        columns.len(),
                        record.len()
                    ),
                });
            }
            rows.push(record);
        }

        Ok(Table { columns, rows })
    }

    /// @ai:intent Read a CSV file from disk
    /// @ai:effects fs:read
    pub fn read_csv(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// @ai:intent Write the table as CSV
    /// @ai:effects fs:write
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut out = String::new();
        write_record(&mut out, &self.columns);

        for row in &self.rows {
            write_record(&mut out, row);
        }

        std::fs::write(path, out)?;
        Ok(())
    }

    /// @ai:intent Position of a named column
    /// @ai:effects pure
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// @ai:intent A numeric frame: named f64 columns of equal length
///
/// Missing or non-numeric cells are NaN. Column order is insertion order and
/// is preserved through CSV round trips.
#[derive(Debug, Clone, Default)]
pub struct MetricFrame {
    columns: Vec<(String, Vec<f64>)>,
}

impl MetricFrame {
    /// @ai:intent Create an empty frame
    /// @ai:effects pure
    pub fn new() -> Self {
        Self::default()
    }

    /// @ai:intent Number of rows (length of the first column)
    /// @ai:effects pure
    pub fn n_rows(&self) -> usize {
        self.columns.first().map(|(_, v)| v.len()).unwrap_or(0)
    }

    /// @ai:intent Column names in declaration order
    /// @ai:effects pure
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// @ai:intent Whether a column exists
    /// @ai:effects pure
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    /// @ai:intent Values of a named column
    /// @ai:effects pure
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// @ai:intent Append a column; the name must be new and the length must match
    /// @ai:effects pure
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();

        if self.has_column(&name) {
            return Err(Error::spec(&name, "column already exists"));
        }
        if !self.columns.is_empty() && values.len() != self.n_rows() {
            return Err(Error::spec(
                &name,
                format!(
                    "column length {} does not match frame of {} rows",
                    values.len(),
                    self.n_rows()
                ),
            ));
        }

        self.columns.push((name, values));
        Ok(())
    }

    /// @ai:intent Read a numeric CSV; unparsable cells become NaN
    /// @ai:effects fs:read
    pub fn read_csv(path: &Path) -> Result<Self> {
        let table = Table::read_csv(path)?;
        Ok(Self::from_table(&table))
    }

    /// @ai:intent Convert a raw table, parsing cells as f64
    /// @ai:effects pure
    pub fn from_table(table: &Table) -> Self {
        let mut columns: Vec<(String, Vec<f64>)> = table
            .columns
            .iter()
            .map(|name| (name.clone(), Vec::with_capacity(table.rows.len())))
            .collect();

        for row in &table.rows {
            for (cell, (_, values)) in row.iter().zip(columns.iter_mut()) {
                values.push(cell.trim().parse::<f64>().unwrap_or(f64::NAN));
            }
        }

        MetricFrame { columns }
    }

    /// @ai:intent Write the frame as CSV; NaN cells are written empty
    /// @ai:effects fs:write
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut out = String::new();
        let names: Vec<String> = self.column_names().map(str::to_string).collect();
        write_record(&mut out, &names);

        for i in 0..self.n_rows() {
            let row: Vec<String> = self
                .columns
                .iter()
                .map(|(_, values)| format_number(values[i]))
                .collect();
            write_record(&mut out, &row);
        }

        std::fs::write(path, out)?;
        Ok(())
    }
}

/// @ai:intent Format a numeric cell; NaN is an empty cell
/// @ai:effects pure
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        format!("{}", value)
    }
}

/// @ai:intent Append one escaped CSV record plus newline
/// @ai:effects pure
fn write_record(out: &mut String, fields: &[String]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}

/// @ai:intent Minimal CSV parser with double-quote escaping
/// @ai:effects pure
fn parse_csv(content: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();
    let mut saw_any = false;

    while let Some(c) = chars.next() {
        saw_any = true;
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                _ => field.push(c),
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => {
                    record.push(std::mem::take(&mut field));
                }
                '\r' => {}
                '\n' => {
                    record.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut record));
                }
                _ => field.push(c),
            }
        }
    }

    // Final record without trailing newline
    if saw_any && (!field.is_empty() || !record.is_empty()) {
        record.push(field);
        records.push(record);
    }

    records
}
