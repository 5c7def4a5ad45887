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

//! Reference evaluation of logical plans against a catalog.
//!
//! Plans are evaluated in memory with nested loops and index lookups. The
//! executor exists so that plans produced by the optimizer can be checked
//! against the plans they replace.

use std::sync::Arc;

use geodb_common::Row;
use tracing::debug;

use super::error::{PlanError, PlanResult};
use super::expression::{BoundExpr, Expression};
use super::layout::RowLayout;
use super::operator::{LogicalOperator, ScanOperator};
use super::planner::IndexScan;
use crate::indices::{FieldIndex, RowId};
use crate::storage::Catalog;

/// Rows produced by a plan, with their columns
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub layout: RowLayout,
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows with columns in canonical order, sorted. Equal for two plans that
    /// produce the same set of joined rows whatever their join order.
    pub fn canonical_rows(&self) -> Vec<Row> {
        let order = self.layout.canonical_order();
        let mut rows: Vec<Row> = self
            .rows
            .iter()
            .map(|row| order.iter().filter_map(|p| row.get(*p).cloned()).collect())
            .collect();
        rows.sort_by_cached_key(|row| format!("{row:?}"));
        rows
    }
}

pub struct Executor<'a> {
    catalog: &'a Catalog,
}

impl<'a> Executor<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    pub fn execute(&self, plan: &LogicalOperator) -> PlanResult<ResultSet> {
        match plan {
            LogicalOperator::Scan(scan) => Ok(ResultSet {
                layout: RowLayout::of_scan(scan),
                rows: self.read(scan)?,
            }),
            LogicalOperator::Selection { predicates, input } => {
                let input = self.execute(input)?;
                let bound = bind_all(predicates, &input.layout)?;
                let rows = input.rows.into_iter().filter(|row| bound.iter().all(|p| p.is_true(row))).collect();
                Ok(ResultSet { layout: input.layout, rows })
            }
            LogicalOperator::Projection { fields, input } => {
                let input = self.execute(input)?;
                let positions = fields.iter().map(|f| input.layout.resolve(f)).collect::<PlanResult<Vec<_>>>()?;
                let rows = input
                    .rows
                    .iter()
                    .map(|row| positions.iter().filter_map(|p| row.get(*p).cloned()).collect())
                    .collect();
                Ok(ResultSet {
                    layout: input.layout.project(&positions),
                    rows,
                })
            }
            LogicalOperator::ScalarProduct { left, right } => {
                let left = self.execute(left)?;
                let right = self.execute(right)?;
                let mut rows = Vec::with_capacity(left.rows.len() * right.rows.len());
                for l in &left.rows {
                    for r in &right.rows {
                        rows.push(joined(l, r));
                    }
                }
                Ok(ResultSet {
                    layout: left.layout.concat(&right.layout),
                    rows,
                })
            }
            LogicalOperator::IndexScalarProduct { left, right, index_scans } => self.index_product(left, right, index_scans),
        }
    }

    fn read(&self, scan: &ScanOperator) -> PlanResult<Vec<Row>> {
        let source = self
            .catalog
            .source(&scan.table_name)
            .ok_or_else(|| PlanError::UnknownTable(scan.table_name.clone()))?;
        Ok(source.read_rows()?)
    }

    /// Standing index of the scanned field, or one built over `rows`
    fn lookup_index(&self, right: &ScanOperator, scan: &IndexScan, rows: &[Row]) -> PlanResult<Arc<FieldIndex>> {
        let manager = self.catalog.index_manager();
        if let Some(index) = manager.get_index(&right.table_name, &scan.field).filter(|i| i.kind() == scan.kind) {
            return Ok(index);
        }

        let position = right
            .schema
            .field_index(&scan.field)
            .ok_or_else(|| PlanError::UnknownField(format!("{}.{}", right.display_name(), scan.field)))?;
        let values = rows.iter().enumerate().filter_map(|(i, row)| row.get(position).map(|v| (i as RowId, v)));
        debug!(table = %right.table_name, field = %scan.field, kind = %scan.kind, "Building ad hoc index");
        Ok(Arc::new(FieldIndex::build(scan.field.as_str(), scan.kind, manager.config(), values)))
    }

    fn index_product(&self, left: &LogicalOperator, right: &ScanOperator, index_scans: &[IndexScan]) -> PlanResult<ResultSet> {
        let driver = index_scans
            .first()
            .ok_or_else(|| PlanError::InternalFault(format!("index product on {} without index scans", right.display_name())))?;

        let left = self.execute(left)?;
        let right_rows = self.read(right)?;
        let layout = left.layout.concat(&RowLayout::of_scan(right));
        let lookup = driver.lookup.bind(&left.layout)?;
        let predicates = index_scans.iter().map(|s| s.predicate.bind(&layout)).collect::<PlanResult<Vec<_>>>()?;
        let index = self.lookup_index(right, driver, &right_rows)?;

        let mut rows = Vec::new();
        for l in &left.rows {
            let Some(query) = driver.query_for(&lookup.evaluate(l)) else {
                continue;
            };
            for row_id in index.query(&query)? {
                let Some(r) = right_rows.get(row_id as usize) else {
                    continue;
                };
                let row = joined(l, r);
                if predicates.iter().all(|p| p.is_true(&row)) {
                    rows.push(row);
                }
            }
        }
        Ok(ResultSet { layout, rows })
    }
}

fn bind_all(predicates: &[Expression], layout: &RowLayout) -> PlanResult<Vec<BoundExpr>> {
    predicates.iter().map(|p| p.bind(layout)).collect()
}

fn joined(left: &Row, right: &Row) -> Row {
    let mut row = Vec::with_capacity(left.len() + right.len());
    row.extend(left.iter().cloned());
    row.extend(right.iter().cloned());
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indices::IndexKind;
    use crate::query::operator::TableId;
    use crate::query::planner::PredicateId;
    use crate::storage::MemoryDataSource;
    use geo::{Geometry, Point, Rect, coord};
    use geodb_common::{DataType, Field, Schema, Value};

    fn catalog() -> Catalog {
        let catalog = Catalog::default();
        let points = Schema::new(vec![Field::new("id", DataType::Int), Field::new("geom", DataType::Geometry)]).unwrap();
        let rows = (0..5)
            .map(|i| vec![Value::Int(i), Value::Geometry(Geometry::Point(Point::new(i as f64, i as f64)))])
            .collect();
        catalog.register(Arc::new(MemoryDataSource::new("points", points, rows).unwrap()));

        let zones = Schema::new(vec![Field::new("name", DataType::String), Field::new("area", DataType::Geometry)]).unwrap();
        let zone = |name: &str, min: f64, max: f64| {
            let rect = Rect::new(coord! { x: min, y: min }, coord! { x: max, y: max });
            vec![Value::from(name), Value::Geometry(Geometry::Rect(rect))]
        };
        let rows = vec![zone("low", -0.5, 1.5), zone("high", 2.5, 10.0)];
        catalog.register(Arc::new(MemoryDataSource::new("zones", zones, rows).unwrap()));
        catalog
    }

    fn scans(catalog: &Catalog) -> (ScanOperator, ScanOperator) {
        (
            ScanOperator::for_table(catalog, TableId(0), "zones").unwrap(),
            ScanOperator::for_table(catalog, TableId(1), "points").unwrap(),
        )
    }

    fn contains() -> Expression {
        Expression::contains(Expression::field("zones", "area"), Expression::field("points", "geom"))
    }

    #[test]
    fn test_selection_over_product() {
        let catalog = catalog();
        let (zones, points) = scans(&catalog);
        let plan = LogicalOperator::selection(vec![contains()], LogicalOperator::product(vec![zones, points]).unwrap());
        let result = Executor::new(&catalog).execute(&plan).unwrap();
        assert_eq!(result.len(), 4);
        assert_eq!(result.layout.len(), 4);
    }

    #[test]
    fn test_index_product_matches_nested_loop() {
        let catalog = catalog();
        let (zones, points) = scans(&catalog);
        let naive = LogicalOperator::selection(vec![contains()], LogicalOperator::product(vec![zones.clone(), points.clone()]).unwrap());
        let scan = IndexScan {
            predicate_id: PredicateId(0),
            predicate: contains(),
            table_id: TableId(1),
            field: "geom".to_string(),
            kind: IndexKind::Spatial,
            ad_hoc: true,
            lookup: Expression::field("zones", "area"),
            lookup_tables: vec![TableId(0)],
        };
        let indexed = LogicalOperator::IndexScalarProduct {
            left: Box::new(LogicalOperator::Scan(zones)),
            right: points,
            index_scans: vec![scan],
        };

        let executor = Executor::new(&catalog);
        let expected = executor.execute(&naive).unwrap().canonical_rows();
        assert_eq!(executor.execute(&indexed).unwrap().canonical_rows(), expected);

        catalog.build_index("points", "geom", IndexKind::Spatial).unwrap();
        assert_eq!(executor.execute(&indexed).unwrap().canonical_rows(), expected);
    }

    #[test]
    fn test_projection_and_unknown_table() {
        let catalog = catalog();
        let (zones, _) = scans(&catalog);
        let plan = LogicalOperator::Projection {
            fields: vec![crate::query::expression::FieldRef::new("name")],
            input: Box::new(LogicalOperator::Scan(zones)),
        };
        let result = Executor::new(&catalog).execute(&plan).unwrap();
        assert_eq!(result.rows, vec![vec![Value::from("low")], vec![Value::from("high")]]);

        let missing = ScanOperator::new(TableId(9), "missing", Arc::new(Schema::empty()));
        let err = Executor::new(&catalog).execute(&LogicalOperator::Scan(missing)).unwrap_err();
        assert_eq!(err, PlanError::UnknownTable("missing".to_string()));
    }
}
