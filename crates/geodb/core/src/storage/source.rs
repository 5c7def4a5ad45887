// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use geodb_common::{Row, Schema};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    #[error("Data source unavailable: {0}")]
    Unavailable(String),

    #[error("Row {row} has {found} values but the schema has {expected} fields")]
    RowWidthMismatch { row: usize, expected: usize, found: usize },
}

/// Row oriented access to a table with a known schema
pub trait DataSource: Send + Sync {
    fn name(&self) -> &str;

    fn schema(&self) -> StorageResult<Schema>;

    fn row_count(&self) -> StorageResult<u64>;

    /// All committed rows, in position order
    fn read_rows(&self) -> StorageResult<Vec<Row>>;

    /// Replace the content of the table
    fn write(&self, schema: &Schema, rows: &[Row]) -> StorageResult<()>;
}

struct MemoryTable {
    schema: Schema,
    rows: Vec<Row>,
}

/// In-memory table. Availability can be switched off to simulate storage
/// failures.
pub struct MemoryDataSource {
    name: String,
    table: RwLock<MemoryTable>,
    available: AtomicBool,
    writes: AtomicU64,
}

impl MemoryDataSource {
    pub fn new(name: impl Into<String>, schema: Schema, rows: Vec<Row>) -> StorageResult<Self> {
        check_row_widths(&schema, &rows)?;
        Ok(Self {
            name: name.into(),
            table: RwLock::new(MemoryTable { schema, rows }),
            available: AtomicBool::new(true),
            writes: AtomicU64::new(0),
        })
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of successful writes since creation
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> StorageResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable(self.name.clone()))
        }
    }
}

impl DataSource for MemoryDataSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> StorageResult<Schema> {
        self.ensure_available()?;
        Ok(self.table.read().schema.clone())
    }

    fn row_count(&self) -> StorageResult<u64> {
        self.ensure_available()?;
        Ok(self.table.read().rows.len() as u64)
    }

    fn read_rows(&self) -> StorageResult<Vec<Row>> {
        self.ensure_available()?;
        Ok(self.table.read().rows.clone())
    }

    fn write(&self, schema: &Schema, rows: &[Row]) -> StorageResult<()> {
        self.ensure_available()?;
        check_row_widths(schema, rows)?;
        let mut table = self.table.write();
        table.schema = schema.clone();
        table.rows = rows.to_vec();
        self.writes.fetch_add(1, Ordering::SeqCst);
        debug!(table = %self.name, rows = rows.len(), "Wrote memory table");
        Ok(())
    }
}

fn check_row_widths(schema: &Schema, rows: &[Row]) -> StorageResult<()> {
    let expected = schema.field_count();
    match rows.iter().position(|row| row.len() != expected) {
        Some(row) => Err(StorageError::RowWidthMismatch {
            row,
            expected,
            found: rows[row].len(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geodb_common::{DataType, Field, Value};

    fn schema() -> Schema {
        Schema::new(vec![Field::new("id", DataType::Int), Field::new("name", DataType::String)]).unwrap()
    }

    #[test]
    fn test_read_write() {
        let source = MemoryDataSource::new("t", schema(), vec![vec![Value::Int(1), Value::from("a")]]).unwrap();
        assert_eq!(source.row_count(), Ok(1));

        source.write(&schema(), &[vec![Value::Int(2), Value::Null], vec![Value::Int(3), Value::from("c")]]).unwrap();
        assert_eq!(source.row_count(), Ok(2));
        assert_eq!(source.read_rows().unwrap()[0], vec![Value::Int(2), Value::Null]);
        assert_eq!(source.write_count(), 1);
    }

    #[test]
    fn test_row_width_checked() {
        let result = MemoryDataSource::new("t", schema(), vec![vec![Value::Int(1)]]);
        assert!(matches!(result, Err(StorageError::RowWidthMismatch { row: 0, expected: 2, found: 1 })));
    }

    #[test]
    fn test_unavailable() {
        let source = MemoryDataSource::new("t", schema(), Vec::new()).unwrap();
        source.set_available(false);
        assert_eq!(source.read_rows(), Err(StorageError::Unavailable("t".to_string())));
        assert!(source.write(&schema(), &[]).is_err());
        assert_eq!(source.write_count(), 0);
        source.set_available(true);
        assert_eq!(source.row_count(), Ok(0));
    }
}
