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

use crate::indices::IndexError;
use crate::storage::StorageError;

/// Result type for planning and execution
pub type PlanResult<T> = Result<T, PlanError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Ambiguous field {field}, candidates: {}", .candidates.join(", "))]
    AmbiguousField { field: String, candidates: Vec<String> },

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Table id {0} used by more than one scan")]
    DuplicateTableId(usize),

    #[error("Internal planning fault: {0}")]
    InternalFault(String),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
