//! In-memory tabular containers.
//!
//! [`TimeTable`] holds numeric columns keyed by an integer epoch column and
//! is the shape of every aligned or reference table. [`TextTable`] keeps raw
//! string fields for tables whose columns are passed through untouched.

use crate::core::sentinel::SentinelPolicy;

/// Numeric table indexed by a sorted timestamp column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeTable {
    /// Value column names (the timestamp column is implicit).
    pub columns: Vec<String>,
    /// One timestamp per row, non-decreasing.
    pub timestamps: Vec<i64>,
    /// Row-major values, each row has `columns.len()` entries.
    pub rows: Vec<Vec<f64>>,
}

impl TimeTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            timestamps: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn with_capacity(columns: Vec<String>, capacity: usize) -> Self {
        Self {
            columns,
            timestamps: Vec::with_capacity(capacity),
            rows: Vec::with_capacity(capacity),
        }
    }

    /// Number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Appends a row, padding with NaN or truncating so it matches the header width.
    pub fn push_row(&mut self, timestamp: i64, mut values: Vec<f64>) {
        values.resize(self.columns.len(), f64::NAN);
        self.timestamps.push(timestamp);
        self.rows.push(values);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Row index holding exactly `timestamp`, if any.
    pub fn row_at(&self, timestamp: i64) -> Option<usize> {
        self.timestamps.binary_search(&timestamp).ok()
    }

    /// Value of `column` at `timestamp`, if both exist.
    pub fn value_at(&self, timestamp: i64, column: &str) -> Option<f64> {
        let row = self.row_at(timestamp)?;
        let col = self.column_index(column)?;
        self.rows[row].get(col).copied()
    }

    /// All values of one column in row order.
    pub fn column_values(&self, col: usize) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.get(col).copied().unwrap_or(f64::NAN))
            .collect()
    }

    /// Earliest timestamp at which `col` holds a valid reading.
    pub fn first_valid_time(&self, col: usize, policy: &SentinelPolicy) -> Option<i64> {
        self.timestamps
            .iter()
            .zip(self.rows.iter())
            .find(|(_, row)| row.get(col).is_some_and(|&v| policy.is_valid(v)))
            .map(|(&t, _)| t)
    }

    pub fn first_timestamp(&self) -> Option<i64> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.timestamps.last().copied()
    }
}

/// Table of untyped string fields with a header row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TextTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}
