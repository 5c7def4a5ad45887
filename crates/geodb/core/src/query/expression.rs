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

//! Predicate expressions and their evaluation against rows.

use geo::{Contains, Coord, Geometry, Intersects, Line, LineString, LinesIter, MultiLineString};
use geodb_common::{Value, topological_dimension};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::error::PlanResult;
use super::layout::RowLayout;

/// Reference to a field, optionally qualified by a table name or alias
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub table: Option<String>,
    pub name: String,
}

impl FieldRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { table: None, name: name.into() }
    }

    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{table}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }
}

/// Spatial predicates. `Contains(a, b)` holds when `a` contains `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpatialOp {
    Intersects,
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarFunction {
    /// Topological dimension of a geometry
    Dimension,
    /// Geometry type name, such as `Polygon`
    GeometryType,
    /// Unique segments of a geometry as a multi-linestring
    ToMultiSegments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Field(FieldRef),
    Literal(Value),
    Compare { op: CompareOp, left: Box<Expression>, right: Box<Expression> },
    Spatial { op: SpatialOp, left: Box<Expression>, right: Box<Expression> },
    And(Vec<Expression>),
    Or(Vec<Expression>),
    Not(Box<Expression>),
    Function { function: ScalarFunction, args: Vec<Expression> },
}

impl Expression {
    /// Field qualified by a table name or alias
    pub fn field(table: &str, name: &str) -> Self {
        Expression::Field(FieldRef::qualified(table, name))
    }

    pub fn column(name: &str) -> Self {
        Expression::Field(FieldRef::new(name))
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn compare(op: CompareOp, left: Expression, right: Expression) -> Self {
        Expression::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn equals(left: Expression, right: Expression) -> Self {
        Self::compare(CompareOp::Eq, left, right)
    }

    pub fn intersects(left: Expression, right: Expression) -> Self {
        Expression::Spatial {
            op: SpatialOp::Intersects,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn contains(left: Expression, right: Expression) -> Self {
        Expression::Spatial {
            op: SpatialOp::Contains,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn negate(inner: Expression) -> Self {
        Expression::Not(Box::new(inner))
    }

    pub fn call(function: ScalarFunction, args: Vec<Expression>) -> Self {
        Expression::Function { function, args }
    }

    /// Every field referenced by the expression, in depth-first order
    pub fn field_references(&self) -> Vec<&FieldRef> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, refs: &mut Vec<&'a FieldRef>) {
        match self {
            Expression::Field(field) => refs.push(field),
            Expression::Literal(_) => {}
            Expression::Compare { left, right, .. } | Expression::Spatial { left, right, .. } => {
                left.collect_references(refs);
                right.collect_references(refs);
            }
            Expression::And(items) | Expression::Or(items) | Expression::Function { args: items, .. } => {
                for item in items {
                    item.collect_references(refs);
                }
            }
            Expression::Not(inner) => inner.collect_references(refs),
        }
    }

    /// Split nested conjunctions into their terms
    pub fn conjuncts(self) -> Vec<Expression> {
        match self {
            Expression::And(items) => items.into_iter().flat_map(Expression::conjuncts).collect(),
            other => vec![other],
        }
    }

    /// Resolve field references to column positions of `layout`
    pub fn bind(&self, layout: &RowLayout) -> PlanResult<BoundExpr> {
        let bind_all = |items: &[Expression]| items.iter().map(|e| e.bind(layout)).collect::<PlanResult<Vec<_>>>();
        Ok(match self {
            Expression::Field(field) => BoundExpr::Column(layout.resolve(field)?),
            Expression::Literal(value) => BoundExpr::Literal(value.clone()),
            Expression::Compare { op, left, right } => BoundExpr::Compare {
                op: *op,
                left: Box::new(left.bind(layout)?),
                right: Box::new(right.bind(layout)?),
            },
            Expression::Spatial { op, left, right } => BoundExpr::Spatial {
                op: *op,
                left: Box::new(left.bind(layout)?),
                right: Box::new(right.bind(layout)?),
            },
            Expression::And(items) => BoundExpr::And(bind_all(items)?),
            Expression::Or(items) => BoundExpr::Or(bind_all(items)?),
            Expression::Not(inner) => BoundExpr::Not(Box::new(inner.bind(layout)?)),
            Expression::Function { function, args } => BoundExpr::Function {
                function: *function,
                args: bind_all(args)?,
            },
        })
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expression], separator: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, "{separator}")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Field(field) => write!(f, "{field}"),
            Expression::Literal(value) => write!(f, "{value}"),
            Expression::Compare { op, left, right } => write!(f, "{left} {} {right}", op.symbol()),
            Expression::Spatial { op, left, right } => write!(f, "{op:?}({left}, {right})"),
            Expression::And(items) => {
                write!(f, "(")?;
                write_list(f, items, " AND ")?;
                write!(f, ")")
            }
            Expression::Or(items) => {
                write!(f, "(")?;
                write_list(f, items, " OR ")?;
                write!(f, ")")
            }
            Expression::Not(inner) => write!(f, "NOT ({inner})"),
            Expression::Function { function, args } => {
                write!(f, "{function:?}(")?;
                write_list(f, args, ", ")?;
                write!(f, ")")
            }
        }
    }
}

/// Expression whose fields are resolved to column positions
#[derive(Debug, Clone, PartialEq)]
pub enum BoundExpr {
    Column(usize),
    Literal(Value),
    Compare { op: CompareOp, left: Box<BoundExpr>, right: Box<BoundExpr> },
    Spatial { op: SpatialOp, left: Box<BoundExpr>, right: Box<BoundExpr> },
    And(Vec<BoundExpr>),
    Or(Vec<BoundExpr>),
    Not(Box<BoundExpr>),
    Function { function: ScalarFunction, args: Vec<BoundExpr> },
}

impl BoundExpr {
    /// Evaluate with SQL three-valued logic; unknown is `Null`
    pub fn evaluate(&self, row: &[Value]) -> Value {
        match self {
            BoundExpr::Column(position) => row.get(*position).cloned().unwrap_or(Value::Null),
            BoundExpr::Literal(value) => value.clone(),
            BoundExpr::Compare { op, left, right } => compare(*op, &left.evaluate(row), &right.evaluate(row)),
            BoundExpr::Spatial { op, left, right } => spatial(*op, &left.evaluate(row), &right.evaluate(row)),
            BoundExpr::And(items) => {
                let mut unknown = false;
                for item in items {
                    match item.evaluate(row) {
                        Value::Bool(false) => return Value::Bool(false),
                        Value::Bool(true) => {}
                        _ => unknown = true,
                    }
                }
                if unknown { Value::Null } else { Value::Bool(true) }
            }
            BoundExpr::Or(items) => {
                let mut unknown = false;
                for item in items {
                    match item.evaluate(row) {
                        Value::Bool(true) => return Value::Bool(true),
                        Value::Bool(false) => {}
                        _ => unknown = true,
                    }
                }
                if unknown { Value::Null } else { Value::Bool(false) }
            }
            BoundExpr::Not(inner) => match inner.evaluate(row) {
                Value::Bool(b) => Value::Bool(!b),
                _ => Value::Null,
            },
            BoundExpr::Function { function, args } => {
                let arg = args.first().map(|a| a.evaluate(row)).unwrap_or(Value::Null);
                match function {
                    // -1 for empty geometries
                    ScalarFunction::Dimension => arg
                        .as_geometry()
                        .map_or(Value::Null, |g| Value::Int(topological_dimension(g).map_or(-1, i64::from))),
                    ScalarFunction::GeometryType => arg.geometry_type_name().map_or(Value::Null, Value::from),
                    ScalarFunction::ToMultiSegments => arg
                        .as_geometry()
                        .map_or(Value::Null, |g| Value::Geometry(Geometry::MultiLineString(to_multi_segments(g)))),
                }
            }
        }
    }

    /// Check whether the expression evaluates to true (not false, not unknown)
    pub fn is_true(&self, row: &[Value]) -> bool {
        self.evaluate(row) == Value::Bool(true)
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Value {
    if left.is_null() || right.is_null() {
        return Value::Null;
    }
    match op {
        CompareOp::Eq => Value::Bool(left.sql_eq(right)),
        CompareOp::NotEq => Value::Bool(!left.sql_eq(right)),
        _ => match left.compare(right) {
            Some(ordering) => Value::Bool(match op {
                CompareOp::Lt => ordering.is_lt(),
                CompareOp::LtEq => ordering.is_le(),
                CompareOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }),
            None => Value::Null,
        },
    }
}

fn spatial(op: SpatialOp, left: &Value, right: &Value) -> Value {
    match (left.as_geometry(), right.as_geometry()) {
        (Some(a), Some(b)) => Value::Bool(match op {
            SpatialOp::Intersects => a.intersects(b),
            SpatialOp::Contains => a.contains(b),
        }),
        _ => Value::Null,
    }
}

type SegmentKey = [(OrderedFloat<f64>, OrderedFloat<f64>); 2];

fn segment_key(line: &Line<f64>) -> SegmentKey {
    let point = |c: Coord<f64>| (OrderedFloat(c.x), OrderedFloat(c.y));
    let (a, b) = (point(line.start), point(line.end));
    if a <= b { [a, b] } else { [b, a] }
}

fn collect_segments(geometry: &Geometry<f64>, out: &mut Vec<Line<f64>>) {
    match geometry {
        Geometry::Point(_) | Geometry::MultiPoint(_) => {}
        Geometry::Line(line) => out.push(*line),
        Geometry::LineString(ls) => out.extend(ls.lines_iter()),
        Geometry::MultiLineString(mls) => out.extend(mls.lines_iter()),
        Geometry::Polygon(polygon) => out.extend(polygon.lines_iter()),
        Geometry::MultiPolygon(mp) => out.extend(mp.lines_iter()),
        Geometry::Rect(rect) => out.extend(rect.lines_iter()),
        Geometry::Triangle(triangle) => out.extend(triangle.lines_iter()),
        Geometry::GeometryCollection(collection) => {
            for member in collection.iter() {
                collect_segments(member, out);
            }
        }
    }
}

/// Segments of every line and ring of a geometry, each kept once whatever
/// its direction. Zero-length segments are dropped.
fn to_multi_segments(geometry: &Geometry<f64>) -> MultiLineString<f64> {
    let mut segments = Vec::new();
    collect_segments(geometry, &mut segments);
    let mut seen = HashSet::new();
    let lines = segments
        .into_iter()
        .filter(|line| line.start != line.end && seen.insert(segment_key(line)))
        .map(|line| LineString::new(vec![line.start, line.end]))
        .collect();
    MultiLineString::new(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, LineString, Point, Polygon};

    fn square(size: f64) -> Value {
        Value::Geometry(Geometry::Polygon(Polygon::new(
            LineString::from(vec![(0.0, 0.0), (size, 0.0), (size, size), (0.0, size), (0.0, 0.0)]),
            vec![],
        )))
    }

    fn point(x: f64, y: f64) -> Value {
        Value::Geometry(Geometry::Point(Point::new(x, y)))
    }

    #[test]
    fn test_field_references_and_conjuncts() {
        let predicate = Expression::And(vec![
            Expression::equals(Expression::field("A", "x"), Expression::field("B", "x")),
            Expression::And(vec![Expression::intersects(Expression::column("g"), Expression::literal(point(0.0, 0.0)))]),
        ]);
        let refs: Vec<String> = predicate.field_references().iter().map(|f| f.to_string()).collect();
        assert_eq!(refs, vec!["A.x", "B.x", "g"]);

        let conjuncts = predicate.conjuncts();
        assert_eq!(conjuncts.len(), 2);
        assert_eq!(conjuncts[0].to_string(), "A.x = B.x");
    }

    #[test]
    fn test_three_valued_logic() {
        let row = vec![Value::Int(1), Value::Null];
        let eq_null = BoundExpr::Compare {
            op: CompareOp::Eq,
            left: Box::new(BoundExpr::Column(0)),
            right: Box::new(BoundExpr::Column(1)),
        };
        assert_eq!(eq_null.evaluate(&row), Value::Null);
        assert_eq!(BoundExpr::Not(Box::new(eq_null.clone())).evaluate(&row), Value::Null);
        assert_eq!(BoundExpr::And(vec![eq_null.clone(), BoundExpr::Literal(Value::Bool(false))]).evaluate(&row), Value::Bool(false));
        assert_eq!(BoundExpr::Or(vec![eq_null.clone(), BoundExpr::Literal(Value::Bool(true))]).evaluate(&row), Value::Bool(true));
        assert!(!eq_null.is_true(&row));
    }

    #[test]
    fn test_comparisons() {
        let lt = BoundExpr::Compare {
            op: CompareOp::Lt,
            left: Box::new(BoundExpr::Literal(Value::Int(1))),
            right: Box::new(BoundExpr::Literal(Value::Double(1.5))),
        };
        assert!(lt.is_true(&[]));
        let mismatched = BoundExpr::Compare {
            op: CompareOp::Gt,
            left: Box::new(BoundExpr::Literal(Value::Int(1))),
            right: Box::new(BoundExpr::Literal(Value::from("a"))),
        };
        assert_eq!(mismatched.evaluate(&[]), Value::Null);
    }

    #[test]
    fn test_spatial_predicates() {
        let row = vec![square(10.0), point(5.0, 5.0), point(20.0, 20.0)];
        let contains = |r: usize| BoundExpr::Spatial {
            op: SpatialOp::Contains,
            left: Box::new(BoundExpr::Column(0)),
            right: Box::new(BoundExpr::Column(r)),
        };
        assert!(contains(1).is_true(&row));
        assert!(!contains(2).is_true(&row));

        let intersects = BoundExpr::Spatial {
            op: SpatialOp::Intersects,
            left: Box::new(BoundExpr::Column(1)),
            right: Box::new(BoundExpr::Column(0)),
        };
        assert!(intersects.is_true(&row));
    }

    #[test]
    fn test_functions() {
        let row = vec![square(1.0), Value::Null];
        let dimension = BoundExpr::Function {
            function: ScalarFunction::Dimension,
            args: vec![BoundExpr::Column(0)],
        };
        let type_name = BoundExpr::Function {
            function: ScalarFunction::GeometryType,
            args: vec![BoundExpr::Column(0)],
        };
        assert_eq!(dimension.evaluate(&row), Value::Int(2));
        assert_eq!(type_name.evaluate(&row), Value::from("Polygon"));
        let on_null = BoundExpr::Function {
            function: ScalarFunction::Dimension,
            args: vec![BoundExpr::Column(1)],
        };
        assert_eq!(on_null.evaluate(&row), Value::Null);

        let empty = vec![Value::Geometry(Geometry::MultiPoint(geo::MultiPoint::new(Vec::new())))];
        assert_eq!(dimension.evaluate(&empty), Value::Int(-1));
    }

    fn segments_of(value: Value) -> Value {
        BoundExpr::Function {
            function: ScalarFunction::ToMultiSegments,
            args: vec![BoundExpr::Literal(value)],
        }
        .evaluate(&[])
    }

    fn segment_count(value: &Value) -> usize {
        match value.as_geometry() {
            Some(Geometry::MultiLineString(mls)) => {
                assert!(mls.0.iter().all(|ls| ls.0.len() == 2));
                mls.0.len()
            }
            other => panic!("expected a multi-linestring, got {other:?}"),
        }
    }

    #[test]
    fn test_to_multi_segments() {
        // Closed ring: four sides
        assert_eq!(segment_count(&segments_of(square(2.0))), 4);

        // A line walking back over itself keeps each segment once
        let back_and_forth = Value::Geometry(Geometry::LineString(LineString::from(vec![
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (1.0, 0.0),
            (0.0, 0.0),
        ])));
        let segments = segments_of(back_and_forth);
        assert_eq!(segment_count(&segments), 2);
        assert_eq!(
            segments,
            Value::Geometry(Geometry::MultiLineString(MultiLineString::new(vec![
                LineString::from(vec![(0.0, 0.0), (1.0, 0.0)]),
                LineString::from(vec![(1.0, 0.0), (1.0, 1.0)]),
            ])))
        );

        assert_eq!(segment_count(&segments_of(point(1.0, 1.0))), 0);
        assert_eq!(segments_of(Value::Null), Value::Null);
        assert_eq!(segments_of(Value::Int(3)), Value::Null);
    }
}
