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

//! Reversible edit records replayed by undo and redo.

use geodb_common::{Field, Row, Schema, Value};
use std::collections::HashMap;

use super::edition::{EditionError, EditionResult};
use crate::indices::{FieldIndex, RowId};

/// Working copy of a table while it is open for edition
#[derive(Debug, Clone)]
pub(crate) struct EditionBuffer {
    pub(crate) schema: Schema,
    pub(crate) rows: Vec<Row>,
    pub(crate) row_ids: Vec<RowId>,
    pub(crate) next_row_id: RowId,
    pub(crate) indexes: HashMap<String, FieldIndex>,
}

impl EditionBuffer {
    pub(crate) fn new(schema: Schema, rows: Vec<Row>, indexes: HashMap<String, FieldIndex>) -> Self {
        let row_ids: Vec<RowId> = (0..rows.len() as RowId).collect();
        Self {
            schema,
            next_row_id: row_ids.len() as RowId,
            rows,
            row_ids,
            indexes,
        }
    }

    fn check_position(&self, position: usize, allow_end: bool) -> EditionResult<()> {
        let count = self.rows.len();
        if position < count || (allow_end && position == count) {
            Ok(())
        } else {
            Err(EditionError::RowOutOfBounds { row: position, count })
        }
    }

    fn insert_row(&mut self, position: usize, row_id: RowId, row: &Row) -> EditionResult<()> {
        self.check_position(position, true)?;
        self.rows.insert(position, row.clone());
        self.row_ids.insert(position, row_id);
        for (name, index) in self.indexes.iter_mut() {
            if let Some(value) = self.schema.field_index(name).and_then(|col| row.get(col)) {
                index.insert(row_id, value);
            }
        }
        Ok(())
    }

    fn remove_row(&mut self, position: usize) -> EditionResult<()> {
        self.check_position(position, false)?;
        self.rows.remove(position);
        let row_id = self.row_ids.remove(position);
        for index in self.indexes.values_mut() {
            index.delete(row_id);
        }
        Ok(())
    }

    fn set_value(&mut self, position: usize, field: usize, value: &Value) -> EditionResult<()> {
        self.check_position(position, false)?;
        let count = self.schema.field_count();
        let (Some(slot), Some(definition)) = (self.rows[position].get_mut(field), self.schema.field(field)) else {
            return Err(EditionError::FieldOutOfBounds { field, count });
        };
        *slot = value.clone();
        if let Some(index) = self.indexes.get_mut(&definition.name) {
            index.insert(self.row_ids[position], value);
        }
        Ok(())
    }

    fn insert_column(&mut self, index: usize, field: &Field, values: Option<&[Value]>) -> EditionResult<()> {
        self.schema.insert_field(index, field.clone())?;
        for (position, row) in self.rows.iter_mut().enumerate() {
            let value = values.and_then(|v| v.get(position)).cloned().unwrap_or(Value::Null);
            row.insert(index, value);
        }
        Ok(())
    }

    fn remove_column(&mut self, index: usize) -> EditionResult<Field> {
        let field = self.schema.remove_field(index)?;
        for row in self.rows.iter_mut() {
            row.remove(index);
        }
        self.indexes.remove(&field.name);
        Ok(field)
    }

    fn rename_column(&mut self, index: usize, from: &str, to: &str) -> EditionResult<()> {
        self.schema.rename_field(index, to)?;
        if let Some(mut field_index) = self.indexes.remove(from) {
            field_index.set_field(to);
            self.indexes.insert(to.to_string(), field_index);
        }
        Ok(())
    }
}

/// One mutation of an open table, with what is needed to revert it
#[derive(Debug, Clone)]
pub(crate) enum EditCommand {
    InsertRow { position: usize, row_id: RowId, row: Row },
    DeleteRow { position: usize, row_id: RowId, row: Row },
    SetValue { position: usize, field: usize, old: Value, new: Value },
    AddField { index: usize, field: Field },
    RemoveField { index: usize, field: Field, values: Vec<Value>, field_index: Option<FieldIndex> },
    RenameField { index: usize, old_name: String, new_name: String },
}

impl EditCommand {
    pub(crate) fn apply(&self, buffer: &mut EditionBuffer) -> EditionResult<()> {
        match self {
            EditCommand::InsertRow { position, row_id, row } => buffer.insert_row(*position, *row_id, row),
            EditCommand::DeleteRow { position, .. } => buffer.remove_row(*position),
            EditCommand::SetValue { position, field, new, .. } => buffer.set_value(*position, *field, new),
            EditCommand::AddField { index, field } => buffer.insert_column(*index, field, None),
            EditCommand::RemoveField { index, .. } => buffer.remove_column(*index).map(|_| ()),
            EditCommand::RenameField { index, old_name, new_name } => buffer.rename_column(*index, old_name, new_name),
        }
    }

    pub(crate) fn revert(&self, buffer: &mut EditionBuffer) -> EditionResult<()> {
        match self {
            EditCommand::InsertRow { position, .. } => buffer.remove_row(*position),
            EditCommand::DeleteRow { position, row_id, row } => buffer.insert_row(*position, *row_id, row),
            EditCommand::SetValue { position, field, old, .. } => buffer.set_value(*position, *field, old),
            EditCommand::AddField { index, .. } => buffer.remove_column(*index).map(|_| ()),
            EditCommand::RemoveField { index, field, values, field_index } => {
                buffer.insert_column(*index, field, Some(values))?;
                if let Some(field_index) = field_index {
                    buffer.indexes.insert(field.name.clone(), field_index.clone());
                }
                Ok(())
            }
            EditCommand::RenameField { index, old_name, new_name } => buffer.rename_column(*index, new_name, old_name),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            EditCommand::InsertRow { .. } => "insert_row",
            EditCommand::DeleteRow { .. } => "delete_row",
            EditCommand::SetValue { .. } => "set_value",
            EditCommand::AddField { .. } => "add_field",
            EditCommand::RemoveField { .. } => "remove_field",
            EditCommand::RenameField { .. } => "rename_field",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpatialIndexConfig;
    use crate::indices::IndexKind;
    use geodb_common::DataType;

    fn buffer() -> EditionBuffer {
        let schema = Schema::new(vec![Field::new("id", DataType::Int), Field::new("name", DataType::String)]).unwrap();
        let rows = vec![vec![Value::Int(1), Value::from("a")], vec![Value::Int(2), Value::from("b")]];
        let index = FieldIndex::build("name", IndexKind::Attribute, &SpatialIndexConfig::default(), rows.iter().enumerate().map(|(i, r)| (i as RowId, &r[1])));
        EditionBuffer::new(schema, rows, HashMap::from([("name".to_string(), index)]))
    }

    #[test]
    fn test_insert_row_round_trip() {
        let mut buffer = buffer();
        let command = EditCommand::InsertRow {
            position: 1,
            row_id: 2,
            row: vec![Value::Int(3), Value::from("c")],
        };
        command.apply(&mut buffer).unwrap();
        assert_eq!(buffer.row_ids, vec![0, 2, 1]);
        assert_eq!(buffer.indexes["name"].len(), 3);

        command.revert(&mut buffer).unwrap();
        assert_eq!(buffer.row_ids, vec![0, 1]);
        assert_eq!(buffer.indexes["name"].len(), 2);
    }

    #[test]
    fn test_remove_field_restores_index() {
        let mut buffer = buffer();
        let command = EditCommand::RemoveField {
            index: 1,
            field: buffer.schema.fields()[1].clone(),
            values: buffer.rows.iter().map(|r| r[1].clone()).collect(),
            field_index: buffer.indexes.get("name").cloned(),
        };
        let before = buffer.indexes["name"].entries();

        command.apply(&mut buffer).unwrap();
        assert_eq!(buffer.schema.field_count(), 1);
        assert!(buffer.indexes.is_empty());

        command.revert(&mut buffer).unwrap();
        assert_eq!(buffer.rows[1], vec![Value::Int(2), Value::from("b")]);
        assert_eq!(buffer.indexes["name"].entries(), before);
    }

    #[test]
    fn test_rename_moves_index() {
        let mut buffer = buffer();
        let command = EditCommand::RenameField {
            index: 1,
            old_name: "name".to_string(),
            new_name: "label".to_string(),
        };
        command.apply(&mut buffer).unwrap();
        assert_eq!(buffer.indexes["label"].field(), "label");
        command.revert(&mut buffer).unwrap();
        assert!(buffer.indexes.contains_key("name"));
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let mut buffer = buffer();
        let command = EditCommand::SetValue {
            position: 5,
            field: 0,
            old: Value::Null,
            new: Value::Int(1),
        };
        assert!(matches!(command.apply(&mut buffer), Err(EditionError::RowOutOfBounds { row: 5, count: 2 })));
    }
}
