//! Columnar event table
//!
//! An ordered sequence of market events stored column by column. Row order
//! is time order and is never changed by any operation in this module.

use std::io::{Read, Write};
use std::path::Path;

use crate::error::{LobError, Result};

/// One typed column
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float(Vec<f64>),
    Int(Vec<i64>),
    Bool(Vec<bool>),
    Text(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Column::Float(_) => "float",
            Column::Int(_) => "int",
            Column::Bool(_) => "bool",
            Column::Text(_) => "text",
        }
    }

    /// Numeric view of the column; bools map to 1.0 / 0.0
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        match self {
            Column::Float(v) => Some(v.clone()),
            Column::Int(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Column::Bool(v) => Some(v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect()),
            Column::Text(_) => None,
        }
    }

    fn cell(&self, row: usize) -> String {
        match self {
            Column::Float(v) => {
                let x = v[row];
                if x.is_nan() {
                    String::new()
                } else {
                    x.to_string()
                }
            }
            Column::Int(v) => v[row].to_string(),
            Column::Bool(v) => if v[row] { "True" } else { "False" }.to_string(),
            Column::Text(v) => v[row].clone(),
        }
    }

    /// Infer the narrowest column type that fits every cell.
    ///
    /// Order of preference: int, float, bool, text. Empty cells are allowed
    /// in numeric columns and become NaN (forcing a float column).
    fn infer(cells: Vec<String>) -> Column {
        let non_empty = || cells.iter().filter(|c| !c.is_empty());
        let has_empty = cells.iter().any(|c| c.is_empty());

        if !has_empty && non_empty().all(|c| c.parse::<i64>().is_ok()) {
            return Column::Int(cells.iter().filter_map(|c| c.parse().ok()).collect());
        }
        if non_empty().all(|c| c.parse::<f64>().is_ok()) && non_empty().next().is_some() {
            return Column::Float(
                cells
                    .iter()
                    .map(|c| c.parse().unwrap_or(f64::NAN))
                    .collect(),
            );
        }
        if !has_empty && non_empty().all(|c| parse_bool(c).is_some()) {
            return Column::Bool(cells.iter().filter_map(|c| parse_bool(c)).collect());
        }
        Column::Text(cells)
    }
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell {
        "True" | "true" | "TRUE" => Some(true),
        "False" | "false" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Ordered, named, typed columns of equal length
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTable {
    names: Vec<String>,
    columns: Vec<Column>,
    rows: usize,
}

impl EventTable {
    /// Create an empty table with a fixed row count
    pub fn with_rows(rows: usize) -> Self {
        Self {
            names: Vec::new(),
            columns: Vec::new(),
            rows,
        }
    }

    /// Build a table from named columns; all columns must share one length
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Column)>,
        S: Into<String>,
    {
        let mut iter = columns.into_iter().peekable();
        let rows = iter.peek().map(|(_, c)| c.len()).unwrap_or(0);
        let mut table = Self::with_rows(rows);
        for (name, column) in iter {
            table.set_column(name, column)?;
        }
        Ok(table)
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.position(name).map(|i| &self.columns[i])
    }

    /// Numeric values of a column, or an error naming the column
    pub fn numeric(&self, name: &str) -> Result<Vec<f64>> {
        let column = self
            .column(name)
            .ok_or_else(|| LobError::missing_column(name))?;
        column
            .to_f64()
            .ok_or_else(|| LobError::column_type(name, "numeric"))
    }

    /// Insert or replace a column.
    ///
    /// A replaced column keeps its position; a new column is appended.
    pub fn set_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if column.len() != self.rows {
            return Err(LobError::LengthMismatch {
                column: name,
                expected: self.rows,
                actual: column.len(),
            });
        }
        match self.position(&name) {
            Some(i) => self.columns[i] = column,
            None => {
                self.names.push(name);
                self.columns.push(column);
            }
        }
        Ok(())
    }

    /// Read a table from any CSV source with a header row
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];

        for record in reader.records() {
            let record = record?;
            for (i, cell) in record.iter().enumerate().take(headers.len()) {
                cells[i].push(cell.trim().to_string());
            }
        }

        let rows = cells.first().map(Vec::len).unwrap_or(0);
        let mut table = Self::with_rows(rows);
        for (name, column_cells) in headers.into_iter().zip(cells) {
            table.set_column(name, Column::infer(column_cells))?;
        }
        Ok(table)
    }

    /// Read a table from a CSV file
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Write the table as CSV with a header row
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.names)?;
        for row in 0..self.rows {
            writer.write_record(self.columns.iter().map(|c| c.cell(row)))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write the table to a CSV file, creating parent directories
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = std::fs::File::create(path)?;
        self.to_writer(std::io::BufWriter::new(file))
    }
}
