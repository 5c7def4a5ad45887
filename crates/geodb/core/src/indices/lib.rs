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

use geodb_common::{DataType, Envelope, Value};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use super::attribute_index::KeyHits;
use super::rtree::WindowQuery;

/// Identifier of a row. Committed rows have id == position.
pub type RowId = u64;

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Types of field indexes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    /// R-tree over geometry envelopes, answers window queries
    Spatial,
    /// Ordered map over scalar values, answers equality queries
    Attribute,
}

impl IndexKind {
    /// Check whether a field of the given type can carry an index of this kind
    pub fn supports(&self, data_type: DataType) -> bool {
        match self {
            IndexKind::Spatial => data_type == DataType::Geometry,
            IndexKind::Attribute => data_type != DataType::Geometry,
        }
    }
}

impl Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Spatial => write!(f, "spatial"),
            IndexKind::Attribute => write!(f, "attribute"),
        }
    }
}

/// Query against a field index
#[derive(Debug, Clone, PartialEq)]
pub enum IndexQuery {
    /// Rows whose envelope intersects the window
    Window { field: String, envelope: Envelope },
    /// Rows whose value equals the given one
    Equals { field: String, value: Value },
}

impl IndexQuery {
    pub fn window(field: impl Into<String>, envelope: Envelope) -> Self {
        IndexQuery::Window { field: field.into(), envelope }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        IndexQuery::Equals { field: field.into(), value: value.into() }
    }

    pub fn field(&self) -> &str {
        match self {
            IndexQuery::Window { field, .. } | IndexQuery::Equals { field, .. } => field,
        }
    }

    /// Kind of index able to answer this query
    pub fn kind(&self) -> IndexKind {
        match self {
            IndexQuery::Window { .. } => IndexKind::Spatial,
            IndexQuery::Equals { .. } => IndexKind::Attribute,
        }
    }

    /// Check whether a value matches the query without going through an index
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            IndexQuery::Window { envelope, .. } => value.envelope().is_some_and(|e| e.intersects(envelope)),
            IndexQuery::Equals { value: expected, .. } => value.sql_eq(expected),
        }
    }
}

/// Errors that can occur during index operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IndexError {
    #[error("Field {table}.{field} of type {data_type} cannot carry a {kind} index")]
    IncompatibleField { table: String, field: String, kind: IndexKind, data_type: DataType },

    #[error("Field not found: {table}.{field}")]
    FieldNotFound { table: String, field: String },

    #[error("Cannot read table {table}: {reason}")]
    SourceUnreadable { table: String, reason: String },

    #[error("Index build on {table}.{field} cancelled")]
    Cancelled { table: String, field: String },

    #[error("A {query_kind} query cannot be answered by the {index_kind} index on field {field}")]
    QueryMismatch { field: String, index_kind: IndexKind, query_kind: IndexKind },
}

/// Lazy sequence of row ids produced by an index query
pub enum IndexHits<'a> {
    Window(WindowQuery<'a>),
    Keys(KeyHits<'a>),
}

impl Iterator for IndexHits<'_> {
    type Item = RowId;

    fn next(&mut self) -> Option<RowId> {
        match self {
            IndexHits::Window(query) => query.next(),
            IndexHits::Keys(keys) => keys.next(),
        }
    }
}
