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

use geo::dimensions::Dimensions;
use geo::{Geometry, HasDimensions};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value::Value;

/// Types a field of a table can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int,
    Double,
    String,
    Geometry,
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int | DataType::Double)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Boolean => "BOOLEAN",
            DataType::Int => "INT",
            DataType::Double => "DOUBLE",
            DataType::String => "STRING",
            DataType::Geometry => "GEOMETRY",
        };
        f.write_str(name)
    }
}

/// Geometry family a geometry field is restricted to. Each family admits
/// both its single and its multi variant, so a `LineString` field accepts
/// multi-linestrings as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
}

impl GeometryKind {
    /// Family of a geometry, `None` for heterogeneous collections
    pub fn of(geometry: &Geometry<f64>) -> Option<GeometryKind> {
        match geometry {
            Geometry::Point(_) | Geometry::MultiPoint(_) => Some(GeometryKind::Point),
            Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => Some(GeometryKind::LineString),
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => Some(GeometryKind::Polygon),
            Geometry::GeometryCollection(_) => None,
        }
    }

    pub fn admits(&self, geometry: &Geometry<f64>) -> bool {
        GeometryKind::of(geometry) == Some(*self)
    }
}

/// Restriction on the values a field accepts, checked when an edition is committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Constraint {
    /// Null is rejected
    NotNull,
    /// Maximum number of characters of a string
    Length(usize),
    /// Geometry family of a geometry field
    GeometryKind(GeometryKind),
    /// Maximum topological dimension of a geometry (0 points, 1 lines, 2 areas)
    Dimension(u8),
}

impl Constraint {
    /// Check whether the value satisfies this constraint. Constraints that do
    /// not apply to the value's type are satisfied.
    pub fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (Constraint::NotNull, v) => !v.is_null(),
            (Constraint::Length(max), Value::String(s)) => s.chars().count() <= *max,
            (Constraint::GeometryKind(kind), Value::Geometry(g)) => kind.admits(g),
            (Constraint::Dimension(max), Value::Geometry(g)) => topological_dimension(g).is_none_or(|d| d <= *max),
            _ => true,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::NotNull => write!(f, "NOT NULL"),
            Constraint::Length(max) => write!(f, "LENGTH <= {max}"),
            Constraint::GeometryKind(kind) => write!(f, "GEOMETRY TYPE {kind:?}"),
            Constraint::Dimension(max) => write!(f, "DIMENSION <= {max}"),
        }
    }
}

/// Topological dimension of a geometry, `None` when it is empty
pub fn topological_dimension(geometry: &Geometry<f64>) -> Option<u8> {
    match geometry.dimensions() {
        Dimensions::Empty => None,
        Dimensions::ZeroDimensional => Some(0),
        Dimensions::OneDimensional => Some(1),
        Dimensions::TwoDimensional => Some(2),
    }
}
