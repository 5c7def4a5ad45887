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

//! Table storage: the data source abstraction, the catalog of tables and
//! the transactional edition buffer.

mod commands;
pub mod catalog;
pub mod edition;
pub mod source;
mod validation;

pub use catalog::{Catalog, TableStatistics};
pub use edition::{EditableTable, EditionError, EditionResult, EditionState};
pub use source::{DataSource, MemoryDataSource, StorageError, StorageResult};
