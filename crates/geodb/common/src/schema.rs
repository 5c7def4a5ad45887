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

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::types::{Constraint, DataType};
use crate::value::Value;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Duplicate field name: {0}")]
    DuplicateField(String),
    #[error("Field index {index} out of bounds (field count {count})")]
    FieldIndexOutOfBounds { index: usize, count: usize },
    #[error("Field not found: {0}")]
    FieldNotFound(String),
}

pub type SchemaResult<T> = Result<T, SchemaError>;

/// A named, typed column with its constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub constraints: Vec<Constraint>,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn is_spatial(&self) -> bool {
        self.data_type == DataType::Geometry
    }

    /// Describe why `value` cannot be stored in this field, `None` if it can
    pub fn violation(&self, value: &Value) -> Option<String> {
        if !value.conforms_to(self.data_type) {
            let found = value.data_type().map_or_else(|| "NULL".to_string(), |t| t.to_string());
            return Some(format!("expected {} but found {}", self.data_type, found));
        }
        self.constraints.iter().find(|c| !c.admits(value)).map(|c| format!("{value} violates {c}"))
    }
}

/// Ordered list of fields. Field names are unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> SchemaResult<Self> {
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }
        Ok(Self { fields })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field_index(name).is_some()
    }

    /// Index of the first geometry field
    pub fn spatial_field_index(&self) -> Option<usize> {
        self.fields.iter().position(Field::is_spatial)
    }

    pub fn add_field(&mut self, field: Field) -> SchemaResult<usize> {
        let index = self.fields.len();
        self.insert_field(index, field)?;
        Ok(index)
    }

    pub fn insert_field(&mut self, index: usize, field: Field) -> SchemaResult<()> {
        if index > self.fields.len() {
            return Err(SchemaError::FieldIndexOutOfBounds { index, count: self.fields.len() });
        }
        if self.has_field(&field.name) {
            return Err(SchemaError::DuplicateField(field.name));
        }
        self.fields.insert(index, field);
        Ok(())
    }

    pub fn remove_field(&mut self, index: usize) -> SchemaResult<Field> {
        if index >= self.fields.len() {
            return Err(SchemaError::FieldIndexOutOfBounds { index, count: self.fields.len() });
        }
        Ok(self.fields.remove(index))
    }

    /// Rename a field, returning the previous name
    pub fn rename_field(&mut self, index: usize, name: impl Into<String>) -> SchemaResult<String> {
        let name = name.into();
        let count = self.fields.len();
        if index >= count {
            return Err(SchemaError::FieldIndexOutOfBounds { index, count });
        }
        if self.field_index(&name).is_some_and(|i| i != index) {
            return Err(SchemaError::DuplicateField(name));
        }
        Ok(std::mem::replace(&mut self.fields[index].name, name))
    }
}
