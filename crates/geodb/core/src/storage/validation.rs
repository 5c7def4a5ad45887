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

use geodb_common::{Field, Row, Schema, Value};

use super::edition::{EditionError, EditionResult};

/// Reject values whose type does not match the field. Constraints are only
/// checked at commit.
pub(crate) fn check_type(field: &Field, value: &Value) -> EditionResult<()> {
    if value.conforms_to(field.data_type) {
        return Ok(());
    }
    Err(EditionError::TypeMismatch {
        field: field.name.clone(),
        expected: field.data_type,
        found: value.data_type().map_or_else(|| "NULL".to_string(), |t| t.to_string()),
    })
}

pub(crate) fn check_row(schema: &Schema, row: &Row) -> EditionResult<()> {
    if row.len() != schema.field_count() {
        return Err(EditionError::RowWidthMismatch {
            expected: schema.field_count(),
            found: row.len(),
        });
    }
    schema.fields().iter().zip(row).try_for_each(|(field, value)| check_type(field, value))
}

/// First row violating the schema, as `(row, field name, reason)`
pub(crate) fn first_violation(schema: &Schema, rows: &[Row]) -> Option<(usize, String, String)> {
    rows.iter().enumerate().find_map(|(position, row)| {
        schema
            .fields()
            .iter()
            .zip(row)
            .find_map(|(field, value)| field.violation(value).map(|reason| (position, field.name.clone(), reason)))
    })
}
