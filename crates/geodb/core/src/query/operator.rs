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

use geodb_common::Schema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::error::{PlanError, PlanResult};
use super::expression::{Expression, FieldRef};
use super::planner::IndexScan;
use crate::storage::Catalog;

/// Position of a scan in the FROM list of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableId(pub usize);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Full read of one base table
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOperator {
    pub table_id: TableId,
    pub table_name: String,
    pub alias: Option<String>,
    pub schema: Arc<Schema>,
}

impl ScanOperator {
    pub fn new(table_id: TableId, table_name: impl Into<String>, schema: Arc<Schema>) -> Self {
        Self {
            table_id,
            table_name: table_name.into(),
            alias: None,
            schema,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Scan of a table registered in the catalog, with its current schema
    pub fn for_table(catalog: &Catalog, table_id: TableId, table: &str) -> PlanResult<Self> {
        let source = catalog.source(table).ok_or_else(|| PlanError::UnknownTable(table.to_string()))?;
        Ok(Self::new(table_id, table, Arc::new(source.schema()?)))
    }

    /// Name the scan is referred to by: its alias, or the table name
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table_name)
    }

    /// Check whether a field qualifier designates this scan
    pub fn matches_qualifier(&self, qualifier: &str) -> bool {
        self.alias.as_deref() == Some(qualifier) || self.table_name == qualifier
    }
}

/// Logical query plan
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalOperator {
    Scan(ScanOperator),
    /// Rows of the input for which every predicate is true
    Selection { predicates: Vec<Expression>, input: Box<LogicalOperator> },
    Projection { fields: Vec<FieldRef>, input: Box<LogicalOperator> },
    /// Nested-loop cross product
    ScalarProduct { left: Box<LogicalOperator>, right: Box<LogicalOperator> },
    /// Product probing an index of `right` with every row of `left`; the
    /// predicates of `index_scans` hold on every produced row
    IndexScalarProduct { left: Box<LogicalOperator>, right: ScanOperator, index_scans: Vec<IndexScan> },
}

impl LogicalOperator {
    /// Left-deep cross product of the scans, `None` when there are none
    pub fn product(scans: Vec<ScanOperator>) -> Option<LogicalOperator> {
        scans.into_iter().map(LogicalOperator::Scan).reduce(|left, right| LogicalOperator::ScalarProduct {
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn selection(predicates: Vec<Expression>, input: LogicalOperator) -> LogicalOperator {
        LogicalOperator::Selection {
            predicates,
            input: Box::new(input),
        }
    }

    /// Scans of a tree made only of scalar products over scans, left to right
    pub fn product_scans(&self) -> Option<Vec<ScanOperator>> {
        match self {
            LogicalOperator::Scan(scan) => Some(vec![scan.clone()]),
            LogicalOperator::ScalarProduct { left, right } => {
                let mut scans = left.product_scans()?;
                scans.extend(right.product_scans()?);
                Some(scans)
            }
            _ => None,
        }
    }

    /// Every scan of the tree, left to right
    pub fn scans(&self) -> Vec<&ScanOperator> {
        match self {
            LogicalOperator::Scan(scan) => vec![scan],
            LogicalOperator::Selection { input, .. } | LogicalOperator::Projection { input, .. } => input.scans(),
            LogicalOperator::ScalarProduct { left, right } => {
                let mut scans = left.scans();
                scans.extend(right.scans());
                scans
            }
            LogicalOperator::IndexScalarProduct { left, right, .. } => {
                let mut scans = left.scans();
                scans.push(right);
                scans
            }
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        let join = |items: Vec<String>| items.join(", ");
        match self {
            LogicalOperator::Scan(scan) => match &scan.alias {
                Some(alias) => writeln!(f, "{indent}Scan {} AS {alias}", scan.table_name),
                None => writeln!(f, "{indent}Scan {}", scan.table_name),
            },
            LogicalOperator::Selection { predicates, input } => {
                writeln!(f, "{indent}Selection [{}]", join(predicates.iter().map(|p| p.to_string()).collect()))?;
                input.fmt_indented(f, depth + 1)
            }
            LogicalOperator::Projection { fields, input } => {
                writeln!(f, "{indent}Projection [{}]", join(fields.iter().map(|p| p.to_string()).collect()))?;
                input.fmt_indented(f, depth + 1)
            }
            LogicalOperator::ScalarProduct { left, right } => {
                writeln!(f, "{indent}ScalarProduct")?;
                left.fmt_indented(f, depth + 1)?;
                right.fmt_indented(f, depth + 1)
            }
            LogicalOperator::IndexScalarProduct { left, right, index_scans } => {
                let scans = index_scans
                    .iter()
                    .map(|s| format!("{}{} ON {}", if s.ad_hoc { "ad hoc " } else { "" }, s.kind, s.predicate))
                    .collect();
                writeln!(f, "{indent}IndexScalarProduct [{}]", join(scans))?;
                left.fmt_indented(f, depth + 1)?;
                LogicalOperator::Scan(right.clone()).fmt_indented(f, depth + 1)
            }
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}
