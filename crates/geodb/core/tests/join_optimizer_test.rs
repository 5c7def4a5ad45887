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

//! Join optimization end to end: plan shape and cost of the chosen order,
//! index usage, and equivalence of the rewritten plan with the naive one.

use std::collections::HashMap;
use std::sync::Arc;

use geo::{Geometry, LineString, Point, Polygon};
use geodb_common::{DataType, Field, Schema, Value};
use geodb_core::query::{IndexScan, TableId};
use geodb_core::{
    Catalog, Executor, Expression, GeoDbConfig, IndexKind, JoinOptimizer, LogicalOperator, MemoryDataSource, OptimizerConfig, PlanError,
    ScanOperator, TableStatistics,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::DEBUG).try_init();
}

fn int_table(name: &str, rows: usize) -> Arc<MemoryDataSource> {
    let schema = Schema::new(vec![Field::new("x", DataType::Int), Field::new("y", DataType::Int)]).unwrap();
    let rows = (0..rows as i64).map(|i| vec![Value::Int(i % 7), Value::Int(i % 5)]).collect();
    Arc::new(MemoryDataSource::new(name, schema, rows).unwrap())
}

fn abc_catalog(sizes: [usize; 3]) -> Arc<Catalog> {
    let catalog = Catalog::default();
    for (name, rows) in ["A", "B", "C"].into_iter().zip(sizes) {
        catalog.register(int_table(name, rows));
    }
    catalog.build_index("B", "x", IndexKind::Attribute).unwrap();
    Arc::new(catalog)
}

fn abc_query(catalog: &Catalog) -> LogicalOperator {
    let scans = ["A", "B", "C"]
        .into_iter()
        .enumerate()
        .map(|(i, name)| ScanOperator::for_table(catalog, TableId(i), name).unwrap())
        .collect();
    let predicates = vec![
        Expression::equals(Expression::field("A", "x"), Expression::field("B", "x")),
        Expression::equals(Expression::field("B", "y"), Expression::field("C", "y")),
    ];
    LogicalOperator::selection(predicates, LogicalOperator::product(scans).unwrap())
}

fn scan_names(plan: &LogicalOperator) -> Vec<String> {
    plan.scans().into_iter().map(|s| s.display_name().to_string()).collect()
}

#[test]
fn test_standing_index_drives_the_first_join() {
    init_tracing();
    let catalog = abc_catalog([100, 50, 200]);
    let optimized = JoinOptimizer::for_catalog(catalog.clone()).optimize(&abc_query(&catalog)).unwrap();

    assert_eq!(optimized.estimated_costs[0].total(), 100_000.0);
    assert!(optimized.degraded.is_none());

    let LogicalOperator::Selection { predicates, input } = &optimized.plan else {
        panic!("expected a selection:\n{}", optimized.plan);
    };
    assert_eq!(predicates, &vec![Expression::equals(Expression::field("B", "y"), Expression::field("C", "y"))]);

    let LogicalOperator::ScalarProduct { left, right } = input.as_ref() else {
        panic!("expected a nested loop on top:\n{}", optimized.plan);
    };
    assert!(matches!(right.as_ref(), LogicalOperator::Scan(scan) if scan.table_name == "C"));
    let LogicalOperator::IndexScalarProduct { left, right, index_scans } = left.as_ref() else {
        panic!("expected an index product below:\n{}", optimized.plan);
    };
    assert!(matches!(left.as_ref(), LogicalOperator::Scan(scan) if scan.table_name == "A"));
    assert_eq!(right.table_name, "B");
    assert_eq!(index_scans.len(), 1);
    let IndexScan { field, kind, ad_hoc, .. } = &index_scans[0];
    assert_eq!((field.as_str(), *kind, *ad_hoc), ("x", IndexKind::Attribute, false));
}

#[test]
fn test_without_index_manager_every_order_costs_the_row_product() {
    let catalog = abc_catalog([100, 50, 200]);
    let statistics: Arc<dyn TableStatistics> = catalog.clone();
    let optimizer = JoinOptimizer::new(OptimizerConfig::default(), statistics);
    let optimized = optimizer.optimize(&abc_query(&catalog)).unwrap();

    assert_eq!(optimized.estimated_costs[0].total(), 1_000_000.0);
    assert_eq!(optimized.search_stats.complete, 6);
    assert_eq!(scan_names(&optimized.plan), vec!["A", "B", "C"]);
    let LogicalOperator::Selection { predicates, input } = &optimized.plan else {
        panic!("expected a selection");
    };
    assert_eq!(predicates.len(), 2);
    assert!(input.product_scans().is_some());
}

#[test]
fn test_rewritten_plan_returns_the_same_rows() {
    let catalog = abc_catalog([10, 5, 20]);
    let query = abc_query(&catalog);
    let optimized = JoinOptimizer::for_catalog(catalog.clone()).optimize(&query).unwrap();
    assert_ne!(optimized.plan, query);

    let executor = Executor::new(&catalog);
    let expected = executor.execute(&query).unwrap();
    let actual = executor.execute(&optimized.plan).unwrap();
    assert!(!expected.is_empty());
    assert_eq!(actual.canonical_rows(), expected.canonical_rows());
}

fn square(x: f64, y: f64, size: f64) -> Value {
    Value::Geometry(Geometry::Polygon(Polygon::new(
        LineString::from(vec![(x, y), (x + size, y), (x + size, y + size), (x, y + size), (x, y)]),
        vec![],
    )))
}

fn spatial_catalog(config: GeoDbConfig) -> Arc<Catalog> {
    let catalog = Catalog::new(config);
    let zones = Schema::new(vec![Field::new("name", DataType::String), Field::new("area", DataType::Geometry)]).unwrap();
    let zone_rows = vec![vec![Value::from("west"), square(0.0, 0.0, 4.5)], vec![Value::from("east"), square(5.5, 0.0, 4.5)]];
    catalog.register(Arc::new(MemoryDataSource::new("zones", zones, zone_rows).unwrap()));

    let points = Schema::new(vec![Field::new("id", DataType::Int), Field::new("geom", DataType::Geometry)]).unwrap();
    let point_rows = (0..5)
        .map(|i| vec![Value::Int(i), Value::Geometry(Geometry::Point(Point::new(i as f64 * 2.0 + 0.5, 1.0)))])
        .collect();
    catalog.register(Arc::new(MemoryDataSource::new("points", points, point_rows).unwrap()));
    Arc::new(catalog)
}

fn spatial_query(catalog: &Catalog, predicates: Vec<Expression>) -> LogicalOperator {
    let scans = vec![
        ScanOperator::for_table(catalog, TableId(0), "zones").unwrap().with_alias("z"),
        ScanOperator::for_table(catalog, TableId(1), "points").unwrap().with_alias("p"),
    ];
    LogicalOperator::selection(predicates, LogicalOperator::product(scans).unwrap())
}

#[test]
fn test_ad_hoc_spatial_index_counts_once_per_field() {
    let catalog = spatial_catalog(GeoDbConfig::default());
    let query = spatial_query(
        &catalog,
        vec![
            Expression::intersects(Expression::field("z", "area"), Expression::field("p", "geom")),
            Expression::contains(Expression::field("z", "area"), Expression::field("p", "geom")),
        ],
    );
    let optimized = JoinOptimizer::for_catalog(catalog.clone()).optimize(&query).unwrap();

    // points first, then zones through one ad hoc index: 5 * 2 / 10 + 2
    assert_eq!(optimized.estimated_costs[0].total(), 3.0);
    let LogicalOperator::Selection { predicates, input } = &optimized.plan else {
        panic!("expected a selection");
    };
    assert!(predicates.is_empty());
    let LogicalOperator::IndexScalarProduct { right, index_scans, .. } = input.as_ref() else {
        panic!("expected an index product:\n{}", optimized.plan);
    };
    assert_eq!(right.display_name(), "z");
    assert_eq!(index_scans.len(), 2);
    assert!(index_scans.iter().all(|s| s.ad_hoc && s.field == "area"));

    let executor = Executor::new(&catalog);
    let expected = executor.execute(&query).unwrap();
    assert_eq!(expected.len(), 4);
    assert_eq!(executor.execute(&optimized.plan).unwrap().canonical_rows(), expected.canonical_rows());
}

#[test]
fn test_ad_hoc_indexes_can_be_disabled() {
    let mut config = GeoDbConfig::default();
    config.optimizer.allow_ad_hoc_indexes = false;
    let catalog = spatial_catalog(config);
    let query = spatial_query(
        &catalog,
        vec![Expression::intersects(Expression::field("z", "area"), Expression::field("p", "geom"))],
    );
    let optimized = JoinOptimizer::for_catalog(catalog.clone()).optimize(&query).unwrap();
    assert_eq!(optimized.estimated_costs[0].total(), 10.0);
    assert_eq!(optimized.plan.scans().len(), 2);
    let LogicalOperator::Selection { predicates, .. } = &optimized.plan else {
        panic!("expected a selection");
    };
    assert_eq!(predicates.len(), 1);
}

#[test]
fn test_self_join_resolves_aliases() {
    let catalog = abc_catalog([30, 5, 5]);
    catalog.build_index("A", "x", IndexKind::Attribute).unwrap();
    let scans = vec![
        ScanOperator::for_table(&catalog, TableId(0), "A").unwrap().with_alias("a1"),
        ScanOperator::for_table(&catalog, TableId(1), "A").unwrap().with_alias("a2"),
    ];
    let query = LogicalOperator::selection(
        vec![Expression::equals(Expression::field("a1", "x"), Expression::field("a2", "x"))],
        LogicalOperator::product(scans.clone()).unwrap(),
    );
    let optimized = JoinOptimizer::for_catalog(catalog.clone()).optimize(&query).unwrap();
    assert_eq!(optimized.estimated_costs[0].total(), 90.0);
    assert_eq!(scan_names(&optimized.plan), vec!["a1", "a2"]);

    let executor = Executor::new(&catalog);
    assert_eq!(
        executor.execute(&optimized.plan).unwrap().canonical_rows(),
        executor.execute(&query).unwrap().canonical_rows()
    );

    // The table name designates both scans
    let ambiguous = LogicalOperator::selection(
        vec![Expression::equals(Expression::field("A", "x"), Expression::literal(1i64))],
        LogicalOperator::product(scans).unwrap(),
    );
    assert!(matches!(
        JoinOptimizer::for_catalog(catalog).optimize(&ambiguous),
        Err(PlanError::AmbiguousField { .. })
    ));
}

#[test]
fn test_fallback_reports_the_failure() {
    init_tracing();
    let catalog = abc_catalog([10, 5, 20]);
    let query = abc_query(&catalog);
    let statistics: HashMap<String, u64> = HashMap::from([("A".to_string(), 10), ("B".to_string(), 5)]);
    let optimizer = JoinOptimizer::new(OptimizerConfig::default(), Arc::new(statistics)).with_index_manager(catalog.index_manager());

    let optimized = optimizer.optimize_or_fallback(&query);
    assert_eq!(optimized.plan, query);
    assert_eq!(optimized.degraded, Some(PlanError::UnknownTable("C".to_string())));
    assert!(optimized.is_degraded());
}

#[test]
fn test_nested_selections_are_optimized_bottom_up() {
    let catalog = abc_catalog([10, 5, 20]);
    let inner = abc_query(&catalog);
    let query = LogicalOperator::Projection {
        fields: vec![geodb_core::query::FieldRef::qualified("C", "x")],
        input: Box::new(inner),
    };
    let optimized = JoinOptimizer::for_catalog(catalog.clone()).optimize(&query).unwrap();
    assert_eq!(optimized.estimated_costs.len(), 1);
    assert!(matches!(optimized.plan, LogicalOperator::Projection { .. }));

    let executor = Executor::new(&catalog);
    assert_eq!(
        executor.execute(&optimized.plan).unwrap().canonical_rows(),
        executor.execute(&query).unwrap().canonical_rows()
    );
}
