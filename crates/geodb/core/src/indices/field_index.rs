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

use geodb_common::{Envelope, Value};

use super::attribute_index::{AttributeIndex, AttributeKey};
use super::lib::{IndexError, IndexHits, IndexKind, IndexQuery, IndexResult, RowId};
use super::rtree::RTree;
use crate::config::SpatialIndexConfig;

#[derive(Debug, Clone)]
enum IndexStorage {
    Spatial(RTree),
    Attribute(AttributeIndex),
}

/// One indexed entry, as exposed for inspection
#[derive(Debug, Clone, PartialEq)]
pub enum IndexEntry {
    Envelope(Envelope),
    Key(AttributeKey),
}

/// Index over the values of one field of a table
#[derive(Debug, Clone)]
pub struct FieldIndex {
    field: String,
    storage: IndexStorage,
}

impl FieldIndex {
    pub fn new(field: impl Into<String>, kind: IndexKind, config: &SpatialIndexConfig) -> Self {
        let storage = match kind {
            IndexKind::Spatial => IndexStorage::Spatial(RTree::new(config)),
            IndexKind::Attribute => IndexStorage::Attribute(AttributeIndex::new()),
        };
        Self { field: field.into(), storage }
    }

    /// Build an index from `(row id, value)` pairs
    pub fn build<'a, I>(field: impl Into<String>, kind: IndexKind, config: &SpatialIndexConfig, values: I) -> Self
    where
        I: IntoIterator<Item = (RowId, &'a Value)>,
    {
        let mut index = Self::new(field, kind, config);
        for (row_id, value) in values {
            index.insert(row_id, value);
        }
        index
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub(crate) fn set_field(&mut self, field: impl Into<String>) {
        self.field = field.into();
    }

    pub fn kind(&self) -> IndexKind {
        match self.storage {
            IndexStorage::Spatial(_) => IndexKind::Spatial,
            IndexStorage::Attribute(_) => IndexKind::Attribute,
        }
    }

    pub fn len(&self) -> usize {
        match &self.storage {
            IndexStorage::Spatial(tree) => tree.len(),
            IndexStorage::Attribute(index) => index.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index the value of a row, replacing its previous entry. Values the
    /// index cannot hold (nulls, empty geometries, mismatched types) leave
    /// the row unindexed and return false.
    pub fn insert(&mut self, row_id: RowId, value: &Value) -> bool {
        match &mut self.storage {
            IndexStorage::Spatial(tree) => match value.envelope() {
                Some(envelope) => {
                    tree.insert(row_id, envelope);
                    true
                }
                None => {
                    tree.delete(row_id);
                    false
                }
            },
            IndexStorage::Attribute(index) => index.insert(row_id, value),
        }
    }

    pub fn delete(&mut self, row_id: RowId) -> bool {
        match &mut self.storage {
            IndexStorage::Spatial(tree) => tree.delete(row_id),
            IndexStorage::Attribute(index) => index.delete(row_id),
        }
    }

    pub fn query(&self, query: &IndexQuery) -> IndexResult<IndexHits<'_>> {
        match (&self.storage, query) {
            (IndexStorage::Spatial(tree), IndexQuery::Window { field, envelope }) if *field == self.field => Ok(IndexHits::Window(tree.query(*envelope))),
            (IndexStorage::Attribute(index), IndexQuery::Equals { field, value }) if *field == self.field => Ok(IndexHits::Keys(index.lookup(value))),
            _ => Err(IndexError::QueryMismatch {
                field: query.field().to_string(),
                index_kind: self.kind(),
                query_kind: query.kind(),
            }),
        }
    }

    /// Envelope of every indexed geometry, `None` for attribute indexes
    pub fn full_extent(&self) -> Option<Envelope> {
        match &self.storage {
            IndexStorage::Spatial(tree) => tree.full_extent(),
            IndexStorage::Attribute(_) => None,
        }
    }

    /// Indexed entries sorted by row id
    pub fn entries(&self) -> Vec<(RowId, IndexEntry)> {
        let mut entries: Vec<(RowId, IndexEntry)> = match &self.storage {
            IndexStorage::Spatial(tree) => tree.entries().map(|(id, env)| (id, IndexEntry::Envelope(env))).collect(),
            IndexStorage::Attribute(index) => index.entries().map(|(id, key)| (id, IndexEntry::Key(key.clone()))).collect(),
        };
        entries.sort_by_key(|(id, _)| *id);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, Point};

    fn point(x: f64, y: f64) -> Value {
        Value::Geometry(Geometry::Point(Point::new(x, y)))
    }

    #[test]
    fn test_spatial_field_index() {
        let values = [point(0.0, 0.0), Value::Null, point(5.0, 5.0)];
        let index = FieldIndex::build("the_geom", IndexKind::Spatial, &SpatialIndexConfig::default(), values.iter().enumerate().map(|(i, v)| (i as RowId, v)));
        assert_eq!(index.kind(), IndexKind::Spatial);
        assert_eq!(index.len(), 2);

        let hits: Vec<RowId> = index.query(&IndexQuery::window("the_geom", Envelope::new(4.0, 4.0, 6.0, 6.0))).unwrap().collect();
        assert_eq!(hits, vec![2]);
        assert_eq!(index.full_extent(), Some(Envelope::new(0.0, 0.0, 5.0, 5.0)));
    }

    #[test]
    fn test_query_mismatch() {
        let index = FieldIndex::new("name", IndexKind::Attribute, &SpatialIndexConfig::default());
        let err = index.query(&IndexQuery::window("name", Envelope::point(0.0, 0.0))).err();
        assert_eq!(
            err,
            Some(IndexError::QueryMismatch {
                field: "name".to_string(),
                index_kind: IndexKind::Attribute,
                query_kind: IndexKind::Spatial,
            })
        );
        assert!(index.query(&IndexQuery::equals("other", "x")).is_err());
    }

    #[test]
    fn test_entries_sorted() {
        let mut index = FieldIndex::new("name", IndexKind::Attribute, &SpatialIndexConfig::default());
        index.insert(9, &Value::from("z"));
        index.insert(1, &Value::from("a"));
        let ids: Vec<RowId> = index.entries().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![1, 9]);
    }
}
