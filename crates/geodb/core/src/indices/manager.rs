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
use tracing::{debug, info};

use super::field_index::FieldIndex;
use super::lib::{IndexError, IndexKind, IndexResult, RowId};
use crate::config::SpatialIndexConfig;
use crate::progress::ProgressMonitor;
use crate::storage::{DataSource, StorageError};

/// Rows between two progress reports during an index build
const PROGRESS_INTERVAL: usize = 1024;

type TableIndexes = HashMap<String, Arc<FieldIndex>>;

/// Registry of the standing indexes of every table
#[derive(Debug, Default)]
pub struct IndexManager {
    config: SpatialIndexConfig,
    indexes: RwLock<HashMap<String, TableIndexes>>,
}

impl IndexManager {
    pub fn new(config: SpatialIndexConfig) -> Self {
        Self {
            config,
            indexes: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SpatialIndexConfig {
        &self.config
    }

    /// Build (or rebuild) the index of `field` over the committed rows of `source`
    pub fn build_index(&self, table: &str, source: &dyn DataSource, field: &str, kind: IndexKind, progress: &dyn ProgressMonitor) -> IndexResult<()> {
        let unreadable = |e: StorageError| IndexError::SourceUnreadable {
            table: table.to_string(),
            reason: e.to_string(),
        };

        let schema = source.schema().map_err(unreadable)?;
        let position = schema.field_index(field).ok_or_else(|| IndexError::FieldNotFound {
            table: table.to_string(),
            field: field.to_string(),
        })?;
        let data_type = schema.fields()[position].data_type;
        if !kind.supports(data_type) {
            return Err(IndexError::IncompatibleField {
                table: table.to_string(),
                field: field.to_string(),
                kind,
                data_type,
            });
        }

        let rows = source.read_rows().map_err(unreadable)?;
        let total = rows.len();
        let mut index = FieldIndex::new(field, kind, &self.config);
        for (position_in_table, row) in rows.iter().enumerate() {
            if position_in_table % PROGRESS_INTERVAL == 0 {
                if progress.is_cancelled() {
                    debug!(table, field, rows_done = position_in_table, "Index build cancelled");
                    return Err(IndexError::Cancelled {
                        table: table.to_string(),
                        field: field.to_string(),
                    });
                }
                progress.progress(position_in_table as f64 / total as f64);
            }
            if let Some(value) = row.get(position) {
                index.insert(position_in_table as RowId, value);
            }
        }
        progress.progress(1.0);

        info!(table, field, %kind, rows = total, indexed = index.len(), "Built index");
        self.indexes.write().entry(table.to_string()).or_default().insert(field.to_string(), Arc::new(index));
        Ok(())
    }

    pub fn has_index(&self, table: &str, field: &str) -> bool {
        self.indexes.read().get(table).is_some_and(|t| t.contains_key(field))
    }

    pub fn index_kind(&self, table: &str, field: &str) -> Option<IndexKind> {
        self.get_index(table, field).map(|index| index.kind())
    }

    pub fn get_index(&self, table: &str, field: &str) -> Option<Arc<FieldIndex>> {
        self.indexes.read().get(table).and_then(|t| t.get(field)).cloned()
    }

    pub fn drop_index(&self, table: &str, field: &str) -> bool {
        let mut indexes = self.indexes.write();
        let Some(table_indexes) = indexes.get_mut(table) else {
            return false;
        };
        let dropped = table_indexes.remove(field).is_some();
        if table_indexes.is_empty() {
            indexes.remove(table);
        }
        dropped
    }

    /// Indexed fields of a table, sorted by name
    pub fn indexed_fields(&self, table: &str) -> Vec<(String, IndexKind)> {
        let mut fields: Vec<(String, IndexKind)> = self
            .indexes
            .read()
            .get(table)
            .map(|t| t.iter().map(|(name, index)| (name.clone(), index.kind())).collect())
            .unwrap_or_default();
        fields.sort();
        fields
    }

    /// Snapshot of every index of a table
    pub fn table_indexes(&self, table: &str) -> HashMap<String, Arc<FieldIndex>> {
        self.indexes.read().get(table).cloned().unwrap_or_default()
    }

    /// Publish a new set of indexes for a table, replacing the previous one
    pub fn replace_table_indexes(&self, table: &str, indexes: HashMap<String, FieldIndex>) {
        let mut registry = self.indexes.write();
        if indexes.is_empty() {
            registry.remove(table);
            return;
        }
        registry.insert(table.to_string(), indexes.into_iter().map(|(field, index)| (field, Arc::new(index))).collect());
    }
}
