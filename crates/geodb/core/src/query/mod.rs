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

//! Logical plans, join-order optimization and reference execution.

pub mod error;
pub mod execution;
pub mod expression;
pub mod layout;
pub mod operator;
pub mod optimizer;
pub mod planner;

pub use error::{PlanError, PlanResult};
pub use execution::{Executor, ResultSet};
pub use expression::{CompareOp, Expression, FieldRef, ScalarFunction, SpatialOp};
pub use layout::{Column, RowLayout};
pub use operator::{LogicalOperator, ScanOperator, TableId};
pub use optimizer::{JoinOptimizer, OptimizationReport, OptimizedPlan, PlanRewriter};
pub use planner::{IndexScan, JoinCost, PredicateId, SearchStats};
