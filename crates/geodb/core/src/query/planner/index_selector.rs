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

//! Discovery of the index scans a join can use.
//!
//! A predicate yields an index scan on a table `S` when one side is a field
//! of `S` and the other side (the lookup) only references tables other than
//! `S`: once the lookup tables are joined, every joined row can query the
//! index of `S` instead of scanning it. Equalities use standing attribute
//! indexes; `Intersects` and `Contains` use standing spatial indexes, or ad
//! hoc ones built on the fly when allowed.

use geodb_common::Value;
use serde::{Deserialize, Serialize};

use crate::query::error::PlanResult;
use crate::query::expression::{CompareOp, Expression};
use crate::query::layout::RowLayout;
use crate::query::operator::TableId;
use crate::config::OptimizerConfig;
use crate::indices::{IndexKind, IndexManager, IndexQuery};

/// Position of a predicate in the conjunct list of a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PredicateId(pub usize);

/// How a lookup value is turned into an index query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookupMode {
    Equals,
    Window,
}

/// Candidate access path: lookup the index on `table_id.field` to evaluate `predicate`
#[derive(Debug, Clone, PartialEq)]
pub struct IndexScan {
    pub predicate_id: PredicateId,
    pub predicate: Expression,
    pub table_id: TableId,
    pub field: String,
    pub kind: IndexKind,
    /// The index does not exist and is built for the query
    pub ad_hoc: bool,
    /// Side of the predicate evaluated against the rows already joined
    pub lookup: Expression,
    /// Tables the lookup references, sorted
    pub lookup_tables: Vec<TableId>,
}

impl IndexScan {
    pub fn mode(&self) -> LookupMode {
        match self.kind {
            IndexKind::Spatial => LookupMode::Window,
            IndexKind::Attribute => LookupMode::Equals,
        }
    }

    /// Index query for a lookup value, `None` when no row can match it
    pub fn query_for(&self, lookup_value: &Value) -> Option<IndexQuery> {
        match self.mode() {
            LookupMode::Window => lookup_value.envelope().map(|envelope| IndexQuery::window(self.field.clone(), envelope)),
            LookupMode::Equals if lookup_value.is_null() => None,
            LookupMode::Equals => Some(IndexQuery::equals(self.field.clone(), lookup_value.clone())),
        }
    }
}

pub struct IndexSelector<'a> {
    indexes: Option<&'a IndexManager>,
    allow_ad_hoc: bool,
}

impl<'a> IndexSelector<'a> {
    pub fn new(indexes: Option<&'a IndexManager>, config: &OptimizerConfig) -> Self {
        Self {
            indexes,
            allow_ad_hoc: config.allow_ad_hoc_indexes,
        }
    }

    /// Index scans usable for the predicates over the scans of `layout`.
    /// Without an index manager there are none.
    pub fn candidates(&self, predicates: &[Expression], layout: &RowLayout) -> PlanResult<Vec<IndexScan>> {
        let Some(manager) = self.indexes else {
            return Ok(Vec::new());
        };

        let mut candidates = Vec::new();
        for (position, predicate) in predicates.iter().enumerate() {
            let (kind, left, right) = match predicate {
                Expression::Compare { op: CompareOp::Eq, left, right } => (IndexKind::Attribute, left, right),
                Expression::Spatial { left, right, .. } => (IndexKind::Spatial, left, right),
                _ => continue,
            };

            for (target, lookup) in [(left, right), (right, left)] {
                let Expression::Field(field) = &**target else {
                    continue;
                };
                let column = layout.column_of(field)?;
                if !kind.supports(column.data_type) {
                    continue;
                }

                let mut lookup_tables = lookup
                    .field_references()
                    .into_iter()
                    .map(|f| layout.column_of(f).map(|c| c.table_id))
                    .collect::<PlanResult<Vec<_>>>()?;
                lookup_tables.sort();
                lookup_tables.dedup();
                if lookup_tables.is_empty() || lookup_tables.contains(&column.table_id) {
                    continue;
                }

                let standing = manager.index_kind(&column.table_name, &column.name) == Some(kind);
                let ad_hoc = !standing && kind == IndexKind::Spatial && self.allow_ad_hoc;
                if !standing && !ad_hoc {
                    continue;
                }

                candidates.push(IndexScan {
                    predicate_id: PredicateId(position),
                    predicate: predicate.clone(),
                    table_id: column.table_id,
                    field: column.name.clone(),
                    kind,
                    ad_hoc,
                    lookup: (**lookup).clone(),
                    lookup_tables,
                });
            }
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::operator::ScanOperator;
    use geodb_common::{DataType, Field, Schema};
    use std::sync::Arc;

    fn scans() -> Vec<ScanOperator> {
        let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Int), Field::new("g", DataType::Geometry)]).unwrap());
        vec![
            ScanOperator::new(TableId(0), "A", schema.clone()),
            ScanOperator::new(TableId(1), "B", schema.clone()),
        ]
    }

    fn manager_with(field: &str, kind: IndexKind) -> IndexManager {
        use crate::progress::NullProgressMonitor;
        use crate::storage::MemoryDataSource;
        let schema = scans()[1].schema.as_ref().clone();
        let source = MemoryDataSource::new("B", schema, Vec::new()).unwrap();
        let manager = IndexManager::default();
        manager.build_index("B", &source, field, kind, &NullProgressMonitor).unwrap();
        manager
    }

    #[test]
    fn test_no_manager_no_candidates() {
        let layout = RowLayout::of_scans(&scans());
        let predicates = vec![Expression::intersects(Expression::field("A", "g"), Expression::field("B", "g"))];
        let selector = IndexSelector::new(None, &OptimizerConfig::default());
        assert!(selector.candidates(&predicates, &layout).unwrap().is_empty());
    }

    #[test]
    fn test_standing_attribute_index() {
        let layout = RowLayout::of_scans(&scans());
        let manager = manager_with("x", IndexKind::Attribute);
        let predicates = vec![Expression::equals(Expression::field("A", "x"), Expression::field("B", "x"))];
        let candidates = IndexSelector::new(Some(&manager), &OptimizerConfig::default()).candidates(&predicates, &layout).unwrap();

        assert_eq!(candidates.len(), 1);
        let scan = &candidates[0];
        assert_eq!((scan.table_id, scan.field.as_str(), scan.ad_hoc), (TableId(1), "x", false));
        assert_eq!(scan.lookup, Expression::field("A", "x"));
        assert_eq!(scan.lookup_tables, vec![TableId(0)]);
        assert_eq!(scan.mode(), LookupMode::Equals);
    }

    #[test]
    fn test_spatial_predicates_allow_ad_hoc_on_both_sides() {
        let layout = RowLayout::of_scans(&scans());
        let manager = manager_with("g", IndexKind::Spatial);
        let predicates = vec![Expression::contains(Expression::field("A", "g"), Expression::field("B", "g"))];

        let candidates = IndexSelector::new(Some(&manager), &OptimizerConfig::default()).candidates(&predicates, &layout).unwrap();
        let found: Vec<(TableId, bool)> = candidates.iter().map(|c| (c.table_id, c.ad_hoc)).collect();
        assert_eq!(found, vec![(TableId(0), true), (TableId(1), false)]);

        let config = OptimizerConfig {
            allow_ad_hoc_indexes: false,
            ..OptimizerConfig::default()
        };
        let candidates = IndexSelector::new(Some(&manager), &config).candidates(&predicates, &layout).unwrap();
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_literal_lookups_are_not_join_scans() {
        let layout = RowLayout::of_scans(&scans());
        let manager = manager_with("x", IndexKind::Attribute);
        let predicates = vec![
            Expression::equals(Expression::field("B", "x"), Expression::literal(3i64)),
            Expression::equals(Expression::field("B", "x"), Expression::field("B", "x")),
        ];
        let candidates = IndexSelector::new(Some(&manager), &OptimizerConfig::default()).candidates(&predicates, &layout).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_query_for_lookup_values() {
        let layout = RowLayout::of_scans(&scans());
        let manager = manager_with("x", IndexKind::Attribute);
        let predicates = vec![Expression::equals(Expression::field("B", "x"), Expression::field("A", "x"))];
        let candidates = IndexSelector::new(Some(&manager), &OptimizerConfig::default()).candidates(&predicates, &layout).unwrap();
        assert_eq!(candidates[0].query_for(&Value::Int(4)), Some(IndexQuery::equals("x", 4i64)));
        assert_eq!(candidates[0].query_for(&Value::Null), None);
    }
}
