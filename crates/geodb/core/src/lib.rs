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

//! # GeoDB core
//!
//! Spatial data-source core: field indexes (R-tree and attribute indexes),
//! transactional edition of tables with undo/redo, and a cost-based
//! optimizer that reorders spatial joins so that index-backed access paths
//! are used where they pay off.
//!
//! ## Modules
//!
//! - `indices`: R-tree, attribute index and the shared index manager
//! - `storage`: data sources, catalog and the edition buffer
//! - `query`: logical plans, join-order search, plan rewrite and a reference executor
//! - `config`: tunables of the optimizer and of the spatial index
//! - `progress`: progress reporting and cancellation of long tasks

pub mod config;
pub mod indices;
pub mod progress;
pub mod query;
pub mod storage;

pub use config::{ConfigError, GeoDbConfig, OptimizerConfig, SpatialIndexConfig};
pub use indices::{FieldIndex, IndexError, IndexKind, IndexManager, IndexQuery, IndexResult, RTree, RowId};
pub use progress::{NullProgressMonitor, ProgressMonitor};
pub use query::{Executor, Expression, JoinOptimizer, LogicalOperator, OptimizedPlan, PlanError, PlanResult, ResultSet, ScanOperator, TableId};
pub use storage::{Catalog, DataSource, EditableTable, EditionError, EditionState, MemoryDataSource, StorageError, TableStatistics};
