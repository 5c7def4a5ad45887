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

//! Field indexes: an R-tree for geometry fields, an ordered attribute index
//! for scalar fields and the manager holding the standing index of every
//! table.

pub mod attribute_index;
pub mod field_index;
pub mod lib;
pub mod manager;
pub mod rtree;

pub use attribute_index::{AttributeIndex, AttributeKey};
pub use field_index::{FieldIndex, IndexEntry};
pub use lib::{IndexError, IndexHits, IndexKind, IndexQuery, IndexResult, RowId};
pub use manager::IndexManager;
pub use rtree::{RTree, WindowQuery};
