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

use geodb_common::Value;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, btree_set};

use super::lib::RowId;

/// Key of an attribute index. Integers and doubles share the numeric key
/// space so that `1` and `1.0` find each other.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AttributeKey {
    Bool(bool),
    Number(OrderedFloat<f64>),
    Text(String),
}

impl AttributeKey {
    /// Key of a value; nulls and geometries are not indexable
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(AttributeKey::Bool(*b)),
            Value::Int(i) => Some(AttributeKey::Number(OrderedFloat(*i as f64))),
            Value::Double(d) => Some(AttributeKey::Number(OrderedFloat(*d))),
            Value::String(s) => Some(AttributeKey::Text(s.clone())),
            Value::Null | Value::Geometry(_) => None,
        }
    }
}

/// Equality index over scalar values
#[derive(Debug, Clone, Default)]
pub struct AttributeIndex {
    entries: BTreeMap<AttributeKey, BTreeSet<RowId>>,
    keys: HashMap<RowId, AttributeKey>,
}

impl AttributeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key_of(&self, row_id: RowId) -> Option<&AttributeKey> {
        self.keys.get(&row_id)
    }

    /// Index `value` for the row, replacing the previous key. Returns false
    /// (and leaves the row unindexed) for values without a key.
    pub fn insert(&mut self, row_id: RowId, value: &Value) -> bool {
        self.delete(row_id);
        let Some(key) = AttributeKey::from_value(value) else {
            return false;
        };
        self.entries.entry(key.clone()).or_default().insert(row_id);
        self.keys.insert(row_id, key);
        true
    }

    pub fn delete(&mut self, row_id: RowId) -> bool {
        let Some(key) = self.keys.remove(&row_id) else {
            return false;
        };
        if let Some(rows) = self.entries.get_mut(&key) {
            rows.remove(&row_id);
            if rows.is_empty() {
                self.entries.remove(&key);
            }
        }
        true
    }

    /// Rows holding a value equal to `value`, in ascending id order
    pub fn lookup(&self, value: &Value) -> KeyHits<'_> {
        let rows = AttributeKey::from_value(value).and_then(|key| self.entries.get(&key));
        KeyHits { rows: rows.map(|r| r.iter()) }
    }

    pub fn entries(&self) -> impl Iterator<Item = (RowId, &AttributeKey)> + '_ {
        self.keys.iter().map(|(id, key)| (*id, key))
    }
}

/// Row ids stored under one key
pub struct KeyHits<'a> {
    rows: Option<btree_set::Iter<'a, RowId>>,
}

impl Iterator for KeyHits<'_> {
    type Item = RowId;

    fn next(&mut self) -> Option<RowId> {
        self.rows.as_mut()?.next().copied()
    }
}
