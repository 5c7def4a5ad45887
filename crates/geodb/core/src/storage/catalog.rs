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

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::edition::{EditableTable, EditionError, EditionResult};
use super::source::{DataSource, StorageResult};
use crate::config::GeoDbConfig;
use crate::indices::{IndexError, IndexKind, IndexManager, IndexResult};
use crate::progress::{NullProgressMonitor, ProgressMonitor};

/// Row counts of tables, as seen by the optimizer
pub trait TableStatistics: Send + Sync {
    /// Number of rows of `table`, `None` when the table is unknown
    fn row_count(&self, table: &str) -> StorageResult<Option<u64>>;
}

impl TableStatistics for HashMap<String, u64> {
    fn row_count(&self, table: &str) -> StorageResult<Option<u64>> {
        Ok(self.get(table).copied())
    }
}

/// Registry of the tables available to queries, with their standing indexes
pub struct Catalog {
    config: GeoDbConfig,
    sources: RwLock<HashMap<String, Arc<dyn DataSource>>>,
    indexes: Arc<IndexManager>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(GeoDbConfig::default())
    }
}

impl Catalog {
    pub fn new(config: GeoDbConfig) -> Self {
        let indexes = Arc::new(IndexManager::new(config.spatial_index.clone()));
        Self {
            config,
            sources: RwLock::new(HashMap::new()),
            indexes,
        }
    }

    pub fn config(&self) -> &GeoDbConfig {
        &self.config
    }

    pub fn index_manager(&self) -> Arc<IndexManager> {
        self.indexes.clone()
    }

    /// Register a source under its name, replacing any previous one
    pub fn register(&self, source: Arc<dyn DataSource>) {
        self.sources.write().insert(source.name().to_string(), source);
    }

    pub fn source(&self, table: &str) -> Option<Arc<dyn DataSource>> {
        self.sources.read().get(table).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn build_index(&self, table: &str, field: &str, kind: IndexKind) -> IndexResult<()> {
        self.build_index_with_progress(table, field, kind, &NullProgressMonitor)
    }

    pub fn build_index_with_progress(&self, table: &str, field: &str, kind: IndexKind, progress: &dyn ProgressMonitor) -> IndexResult<()> {
        let source = self.source(table).ok_or_else(|| IndexError::SourceUnreadable {
            table: table.to_string(),
            reason: "table is not registered".to_string(),
        })?;
        self.indexes.build_index(table, source.as_ref(), field, kind, progress)
    }

    /// Open a table for edition
    pub fn open_for_edition(&self, table: &str) -> EditionResult<EditableTable> {
        let source = self.source(table).ok_or_else(|| EditionError::UnknownTable(table.to_string()))?;
        let mut editable = EditableTable::new(table, source, self.indexes.clone());
        editable.open()?;
        Ok(editable)
    }
}

impl TableStatistics for Catalog {
    fn row_count(&self, table: &str) -> StorageResult<Option<u64>> {
        match self.source(table) {
            Some(source) => source.row_count().map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryDataSource;
    use geodb_common::{DataType, Field, Schema, Value};

    fn catalog() -> Catalog {
        let catalog = Catalog::default();
        let schema = Schema::new(vec![Field::new("x", DataType::Int)]).unwrap();
        let rows = (0..3).map(|i| vec![Value::Int(i)]).collect();
        catalog.register(Arc::new(MemoryDataSource::new("t", schema, rows).unwrap()));
        catalog
    }

    #[test]
    fn test_statistics() {
        let catalog = catalog();
        assert_eq!(catalog.row_count("t"), Ok(Some(3)));
        assert_eq!(catalog.row_count("missing"), Ok(None));
        assert_eq!(catalog.table_names(), vec!["t".to_string()]);
    }

    #[test]
    fn test_build_index_and_edit() {
        let catalog = catalog();
        catalog.build_index("t", "x", IndexKind::Attribute).unwrap();
        assert!(catalog.index_manager().has_index("t", "x"));
        assert!(matches!(catalog.build_index("missing", "x", IndexKind::Attribute), Err(IndexError::SourceUnreadable { .. })));

        let mut table = catalog.open_for_edition("t").unwrap();
        table.insert_row(vec![Value::Int(7)]).unwrap();
        table.commit().unwrap();
        assert_eq!(catalog.row_count("t"), Ok(Some(4)));
        assert!(matches!(catalog.open_for_edition("missing"), Err(EditionError::UnknownTable(_))));
    }
}
