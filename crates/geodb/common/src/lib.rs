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

//! Shared types of the GeoDB crates: field values, data types, constraints,
//! table schemas and envelopes.

pub mod envelope;
pub mod schema;
pub mod types;
pub mod value;

pub use envelope::Envelope;
pub use schema::{Field, Schema, SchemaError, SchemaResult};
pub use types::{Constraint, DataType, GeometryKind, topological_dimension};
pub use value::{Row, Value};
