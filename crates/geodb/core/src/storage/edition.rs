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

//! Transactional edition of a table.
//!
//! An [`EditableTable`] loads the committed rows of a data source into a
//! working buffer together with a copy of the table's standing indexes.
//! Every mutation is recorded as an [`EditCommand`] so it can be undone and
//! redone, and updates the working indexes before returning. `commit`
//! validates the buffer, writes it back, renumbers the rows and publishes
//! freshly built indexes; `cancel` throws the buffer away.

use geodb_common::{DataType, Envelope, Field, Row, Schema, SchemaError, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::commands::{EditCommand, EditionBuffer};
use super::source::{DataSource, StorageError};
use super::validation;
use crate::indices::{FieldIndex, IndexError, IndexKind, IndexManager, IndexQuery, RowId};

/// Result type for edition operations
pub type EditionResult<T> = Result<T, EditionError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditionError {
    #[error("Table {table} is not open for edition (state: {state})")]
    NotOpen { table: String, state: EditionState },

    #[error("Table {0} is already open")]
    AlreadyOpen(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Row {row} out of bounds (row count {count})")]
    RowOutOfBounds { row: usize, count: usize },

    #[error("Field {field} out of bounds (field count {count})")]
    FieldOutOfBounds { field: usize, count: usize },

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Row has {found} values but the schema has {expected} fields")]
    RowWidthMismatch { expected: usize, found: usize },

    #[error("Field {field} expects {expected} but got {found}")]
    TypeMismatch { field: String, expected: DataType, found: String },

    #[error("Constraint violation at row {row}, field {field}: {reason}")]
    ConstraintViolation { row: usize, field: String, reason: String },

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}

/// Lifecycle of an editable table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditionState {
    Closed,
    Open,
    Committed,
    Cancelled,
}

impl fmt::Display for EditionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EditionState::Closed => "closed",
            EditionState::Open => "open",
            EditionState::Committed => "committed",
            EditionState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// A table opened for edition. Single writer: every mutation takes `&mut self`.
pub struct EditableTable {
    name: String,
    source: Arc<dyn DataSource>,
    indexes: Arc<IndexManager>,
    state: EditionState,
    buffer: Option<EditionBuffer>,
    /// Standing indexes copied into the buffer by `open`
    opened_indexes: HashSet<String>,
    undo_stack: Vec<EditCommand>,
    redo_stack: Vec<EditCommand>,
}

impl EditableTable {
    pub fn new(name: impl Into<String>, source: Arc<dyn DataSource>, indexes: Arc<IndexManager>) -> Self {
        Self {
            name: name.into(),
            source,
            indexes,
            state: EditionState::Closed,
            buffer: None,
            opened_indexes: HashSet::new(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> EditionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == EditionState::Open
    }

    pub fn is_modified(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.is_open() && !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        self.is_open() && !self.redo_stack.is_empty()
    }

    /// Load the committed rows and indexes into a fresh working buffer
    pub fn open(&mut self) -> EditionResult<()> {
        if self.is_open() {
            return Err(EditionError::AlreadyOpen(self.name.clone()));
        }
        let schema = self.source.schema()?;
        let rows = self.source.read_rows()?;
        let indexes: HashMap<String, FieldIndex> = self
            .indexes
            .table_indexes(&self.name)
            .into_iter()
            .filter(|(field, _)| schema.has_field(field))
            .map(|(field, index)| (field, index.as_ref().clone()))
            .collect();

        debug!(table = %self.name, rows = rows.len(), indexes = indexes.len(), "Opened table for edition");
        self.opened_indexes = indexes.keys().cloned().collect();
        self.buffer = Some(EditionBuffer::new(schema, rows, indexes));
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.state = EditionState::Open;
        Ok(())
    }

    // Reads

    pub fn schema(&self) -> EditionResult<&Schema> {
        Ok(&self.buffer()?.schema)
    }

    pub fn row_count(&self) -> EditionResult<usize> {
        Ok(self.buffer()?.rows.len())
    }

    pub fn field_index_by_name(&self, name: &str) -> EditionResult<Option<usize>> {
        Ok(self.buffer()?.schema.field_index(name))
    }

    pub fn row(&self, position: usize) -> EditionResult<&Row> {
        let buffer = self.buffer()?;
        buffer.rows.get(position).ok_or(EditionError::RowOutOfBounds {
            row: position,
            count: buffer.rows.len(),
        })
    }

    pub fn field_value(&self, position: usize, field: usize) -> EditionResult<&Value> {
        let count = self.buffer()?.schema.field_count();
        self.row(position)?.get(field).ok_or(EditionError::FieldOutOfBounds { field, count })
    }

    pub fn is_null(&self, position: usize, field: usize) -> EditionResult<bool> {
        Ok(self.field_value(position, field)?.is_null())
    }

    pub fn row_id(&self, position: usize) -> EditionResult<RowId> {
        let buffer = self.buffer()?;
        buffer.row_ids.get(position).copied().ok_or(EditionError::RowOutOfBounds {
            row: position,
            count: buffer.rows.len(),
        })
    }

    pub fn position_of(&self, row_id: RowId) -> EditionResult<Option<usize>> {
        Ok(self.buffer()?.row_ids.iter().position(|id| *id == row_id))
    }

    pub fn row_by_id(&self, row_id: RowId) -> EditionResult<Option<&Row>> {
        let buffer = self.buffer()?;
        Ok(buffer.row_ids.iter().position(|id| *id == row_id).and_then(|p| buffer.rows.get(p)))
    }

    /// Envelope of the geometries of the first geometry field
    pub fn full_extent(&self) -> EditionResult<Option<Envelope>> {
        let buffer = self.buffer()?;
        let Some(col) = buffer.schema.spatial_field_index() else {
            return Ok(None);
        };
        let name = &buffer.schema.fields()[col].name;
        if let Some(index) = buffer.indexes.get(name).filter(|i| i.kind() == IndexKind::Spatial) {
            return Ok(index.full_extent());
        }
        Ok(Envelope::union_all(buffer.rows.iter().filter_map(|row| row.get(col).and_then(Value::envelope))))
    }

    /// Positions of the rows matching the query, ascending. Uses the working
    /// index of the field when there is one, a full scan otherwise.
    pub fn query_index(&self, query: &IndexQuery) -> EditionResult<Vec<usize>> {
        let buffer = self.buffer()?;
        let col = buffer
            .schema
            .field_index(query.field())
            .ok_or_else(|| EditionError::FieldNotFound(query.field().to_string()))?;

        if let Some(index) = buffer.indexes.get(query.field()).filter(|i| i.kind() == query.kind()) {
            let hits: HashSet<RowId> = index.query(query)?.collect();
            return Ok(buffer.row_ids.iter().enumerate().filter(|(_, id)| hits.contains(id)).map(|(p, _)| p).collect());
        }
        Ok(buffer
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.get(col).is_some_and(|v| query.matches(v)))
            .map(|(p, _)| p)
            .collect())
    }

    // Mutations

    /// Append a row, returning its id
    pub fn insert_row(&mut self, row: Row) -> EditionResult<RowId> {
        let position = self.row_count()?;
        self.insert_row_at(position, row)
    }

    pub fn insert_row_at(&mut self, position: usize, row: Row) -> EditionResult<RowId> {
        let buffer = self.buffer()?;
        if position > buffer.rows.len() {
            return Err(EditionError::RowOutOfBounds {
                row: position,
                count: buffer.rows.len(),
            });
        }
        validation::check_row(&buffer.schema, &row)?;
        let row_id = buffer.next_row_id;
        self.execute(EditCommand::InsertRow { position, row_id, row })?;
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.next_row_id += 1;
        }
        Ok(row_id)
    }

    pub fn insert_empty_row(&mut self) -> EditionResult<RowId> {
        let position = self.row_count()?;
        self.insert_empty_row_at(position)
    }

    pub fn insert_empty_row_at(&mut self, position: usize) -> EditionResult<RowId> {
        let width = self.buffer()?.schema.field_count();
        self.insert_row_at(position, vec![Value::Null; width])
    }

    pub fn delete_row(&mut self, position: usize) -> EditionResult<()> {
        let row = self.row(position)?.clone();
        let row_id = self.row_id(position)?;
        self.execute(EditCommand::DeleteRow { position, row_id, row })
    }

    pub fn set_field_value(&mut self, position: usize, field: usize, value: impl Into<Value>) -> EditionResult<()> {
        let value = value.into();
        let old = self.field_value(position, field)?.clone();
        if let Some(definition) = self.buffer()?.schema.field(field) {
            validation::check_type(definition, &value)?;
        }
        self.execute(EditCommand::SetValue { position, field, old, new: value })
    }

    /// Append a field; existing rows get null values
    pub fn add_field(&mut self, field: Field) -> EditionResult<usize> {
        let schema = &self.buffer()?.schema;
        if schema.has_field(&field.name) {
            return Err(SchemaError::DuplicateField(field.name).into());
        }
        let index = schema.field_count();
        self.execute(EditCommand::AddField { index, field })?;
        Ok(index)
    }

    pub fn remove_field(&mut self, index: usize) -> EditionResult<()> {
        let buffer = self.buffer()?;
        let field = buffer.schema.field(index).cloned().ok_or(EditionError::FieldOutOfBounds {
            field: index,
            count: buffer.schema.field_count(),
        })?;
        let values = buffer.rows.iter().map(|row| row.get(index).cloned().unwrap_or(Value::Null)).collect();
        let field_index = buffer.indexes.get(&field.name).cloned();
        self.execute(EditCommand::RemoveField { index, field, values, field_index })
    }

    pub fn rename_field(&mut self, index: usize, name: impl Into<String>) -> EditionResult<()> {
        let new_name = name.into();
        let schema = &self.buffer()?.schema;
        let old_name = schema
            .field(index)
            .map(|f| f.name.clone())
            .ok_or(EditionError::FieldOutOfBounds { field: index, count: schema.field_count() })?;
        if schema.field_index(&new_name).is_some_and(|i| i != index) {
            return Err(SchemaError::DuplicateField(new_name).into());
        }
        self.execute(EditCommand::RenameField { index, old_name, new_name })
    }

    /// Revert the last mutation. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> EditionResult<bool> {
        self.buffer()?;
        let Some(command) = self.undo_stack.pop() else {
            warn!(table = %self.name, "Nothing to undo");
            return Ok(false);
        };
        match self.buffer_mut().and_then(|buffer| command.revert(buffer)) {
            Ok(()) => {
                debug!(table = %self.name, command = command.name(), "Undone");
                self.redo_stack.push(command);
                Ok(true)
            }
            Err(e) => {
                self.undo_stack.push(command);
                Err(e)
            }
        }
    }

    /// Replay the last undone mutation. Returns false when there is nothing to redo.
    pub fn redo(&mut self) -> EditionResult<bool> {
        self.buffer()?;
        let Some(command) = self.redo_stack.pop() else {
            warn!(table = %self.name, "Nothing to redo");
            return Ok(false);
        };
        match self.buffer_mut().and_then(|buffer| command.apply(buffer)) {
            Ok(()) => {
                debug!(table = %self.name, command = command.name(), "Redone");
                self.undo_stack.push(command);
                Ok(true)
            }
            Err(e) => {
                self.redo_stack.push(command);
                Err(e)
            }
        }
    }

    /// Validate, persist and publish the buffer. On a constraint violation
    /// the table stays open with its buffer and history untouched.
    pub fn commit(&mut self) -> EditionResult<()> {
        let buffer = self.buffer()?;
        if !self.is_modified() {
            debug!(table = %self.name, "Nothing to commit");
            self.close(EditionState::Committed);
            return Ok(());
        }

        if let Some((row, field, reason)) = validation::first_violation(&buffer.schema, &buffer.rows) {
            return Err(EditionError::ConstraintViolation { row, field, reason });
        }

        self.source.write(&buffer.schema, &buffer.rows)?;

        // Indexes built on the table while it was open are kept, the ones
        // dropped meanwhile are not brought back
        let standing: HashMap<String, IndexKind> = self.indexes.indexed_fields(&self.name).into_iter().collect();
        let mut kinds: HashMap<&str, IndexKind> = buffer
            .indexes
            .iter()
            .filter(|(name, _)| !self.opened_indexes.contains(*name) || standing.contains_key(*name))
            .map(|(name, index)| (name.as_str(), index.kind()))
            .collect();
        for (name, kind) in &standing {
            if !self.opened_indexes.contains(name) {
                kinds.entry(name.as_str()).or_insert(*kind);
            }
        }

        // Rows are renumbered to their positions, so every index is rebuilt
        let config = self.indexes.config();
        let rebuilt: HashMap<String, FieldIndex> = kinds
            .into_iter()
            .filter_map(|(name, kind)| {
                let col = buffer.schema.field_index(name)?;
                let values = buffer.rows.iter().enumerate().filter_map(|(p, row)| row.get(col).map(|v| (p as RowId, v)));
                Some((name.to_string(), FieldIndex::build(name, kind, config, values)))
            })
            .collect();
        let (rows, index_count) = (buffer.rows.len(), rebuilt.len());
        self.indexes.replace_table_indexes(&self.name, rebuilt);

        info!(table = %self.name, rows, indexes = index_count, edits = self.undo_stack.len(), "Committed edition");
        self.close(EditionState::Committed);
        Ok(())
    }

    /// Discard the buffer and its history
    pub fn cancel(&mut self) -> EditionResult<()> {
        self.buffer()?;
        debug!(table = %self.name, edits = self.undo_stack.len(), "Cancelled edition");
        self.close(EditionState::Cancelled);
        Ok(())
    }

    fn close(&mut self, state: EditionState) {
        self.buffer = None;
        self.opened_indexes.clear();
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.state = state;
    }

    fn execute(&mut self, command: EditCommand) -> EditionResult<()> {
        command.apply(self.buffer_mut()?)?;
        self.undo_stack.push(command);
        self.redo_stack.clear();
        Ok(())
    }

    fn buffer(&self) -> EditionResult<&EditionBuffer> {
        match (&self.buffer, self.state) {
            (Some(buffer), EditionState::Open) => Ok(buffer),
            _ => Err(EditionError::NotOpen {
                table: self.name.clone(),
                state: self.state,
            }),
        }
    }

    fn buffer_mut(&mut self) -> EditionResult<&mut EditionBuffer> {
        match (&mut self.buffer, self.state) {
            (Some(buffer), EditionState::Open) => Ok(buffer),
            _ => Err(EditionError::NotOpen {
                table: self.name.clone(),
                state: self.state,
            }),
        }
    }
}
