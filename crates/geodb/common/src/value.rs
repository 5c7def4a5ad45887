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

use geo::Geometry;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::envelope::Envelope;
use crate::types::{DataType, topological_dimension};

/// One row of a table, one value per schema field
pub type Row = Vec<Value>;

/// A single field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Geometry(Geometry<f64>),
}

impl Value {
    /// Type of the value, `None` for null
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(DataType::Boolean),
            Value::Int(_) => Some(DataType::Int),
            Value::Double(_) => Some(DataType::Double),
            Value::String(_) => Some(DataType::String),
            Value::Geometry(_) => Some(DataType::Geometry),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check whether the value can be stored in a field of the given type.
    /// Null fits every type; integers also fit double fields.
    pub fn conforms_to(&self, data_type: DataType) -> bool {
        match (self.data_type(), data_type) {
            (None, _) => true,
            (Some(DataType::Int), DataType::Double) => true,
            (Some(actual), expected) => actual == expected,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_geometry(&self) -> Option<&Geometry<f64>> {
        match self {
            Value::Geometry(g) => Some(g),
            _ => None,
        }
    }

    /// Envelope of a non-empty geometry value
    pub fn envelope(&self) -> Option<Envelope> {
        self.as_geometry().and_then(Envelope::of_geometry)
    }

    /// Topological dimension of a geometry value
    pub fn dimension(&self) -> Option<u8> {
        self.as_geometry().and_then(topological_dimension)
    }

    /// Name of the geometry type, following the OGC simple feature names
    pub fn geometry_type_name(&self) -> Option<&'static str> {
        let name = match self.as_geometry()? {
            Geometry::Point(_) => "Point",
            Geometry::Line(_) | Geometry::LineString(_) => "LineString",
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => "Polygon",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::MultiPolygon(_) => "MultiPolygon",
            Geometry::GeometryCollection(_) => "GeometryCollection",
        };
        Some(name)
    }

    /// SQL equality: null equals nothing, integers and doubles compare numerically
    pub fn sql_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Geometry(a), Value::Geometry(b)) => a == b,
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }

    /// Ordering between comparable values, `None` when the types do not compare
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Geometry<f64>> for Value {
    fn from(value: Geometry<f64>) -> Self {
        Value::Geometry(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::String(s) => write!(f, "'{s}'"),
            Value::Geometry(g) => match Envelope::of_geometry(g) {
                Some(env) => write!(f, "{}({}, {}, {}, {})", self.geometry_type_name().unwrap_or("Geometry"), env.min_x, env.min_y, env.max_x, env.max_y),
                None => write!(f, "{}(EMPTY)", self.geometry_type_name().unwrap_or("Geometry")),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    #[test]
    fn test_sql_eq_numeric_cross_type() {
        assert!(Value::Int(1).sql_eq(&Value::Double(1.0)));
        assert!(!Value::Int(1).sql_eq(&Value::Double(1.5)));
        assert!(!Value::Int(1).sql_eq(&Value::from("1")));
    }

    #[test]
    fn test_sql_eq_null_never_equal() {
        assert!(!Value::Null.sql_eq(&Value::Null));
        assert!(!Value::Null.sql_eq(&Value::Int(0)));
    }

    #[test]
    fn test_conforms_to() {
        assert!(Value::Int(3).conforms_to(DataType::Double));
        assert!(!Value::Double(3.0).conforms_to(DataType::Int));
        assert!(Value::Null.conforms_to(DataType::Geometry));
        assert!(!Value::from("x").conforms_to(DataType::Geometry));
    }

    #[test]
    fn test_geometry_accessors() {
        let value = Value::from(Geometry::Point(Point::new(2.0, 3.0)));
        assert_eq!(value.envelope(), Some(Envelope::point(2.0, 3.0)));
        assert_eq!(value.dimension(), Some(0));
        assert_eq!(value.geometry_type_name(), Some("Point"));
        assert_eq!(Value::Int(1).envelope(), None);
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::from("a"));
    }
}
