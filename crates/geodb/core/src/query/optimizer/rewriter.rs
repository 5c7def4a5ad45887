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

use tracing::{debug, error};

use crate::query::error::{PlanError, PlanResult};
use crate::query::expression::Expression;
use crate::query::operator::{LogicalOperator, ScanOperator, TableId};
use crate::query::planner::SearchNode;

fn fault(message: String) -> PlanError {
    error!(fault = %message, "Join rewrite invariant violated");
    PlanError::InternalFault(message)
}

/// Turns a complete join order into a left-deep operator tree
pub struct PlanRewriter<'a> {
    scans: &'a [ScanOperator],
}

impl<'a> PlanRewriter<'a> {
    pub fn new(scans: &'a [ScanOperator]) -> Self {
        Self { scans }
    }

    fn scan(&self, table_id: TableId) -> PlanResult<&'a ScanOperator> {
        self.scans
            .iter()
            .find(|scan| scan.table_id == table_id)
            .ok_or_else(|| fault(format!("fixed table {table_id} has no scan")))
    }

    /// Selection of the predicates not embedded in index scalar products,
    /// over the join tree of `node`. The selection is kept even when no
    /// predicate remains.
    pub fn rewrite(&self, node: &SearchNode, predicates: Vec<Expression>) -> PlanResult<LogicalOperator> {
        if !node.is_complete() {
            return Err(fault(format!("join order has {} pending tables", node.pending().len())));
        }
        if node.fixed().len() != self.scans.len() {
            return Err(fault(format!(
                "join order fixes {} tables for {} scans",
                node.fixed().len(),
                self.scans.len()
            )));
        }

        let mut residual: Vec<Option<Expression>> = predicates.into_iter().map(Some).collect();
        let mut fixed = node.fixed().iter();
        let first = fixed.next().ok_or_else(|| fault("join order fixes no table".to_string()))?;
        if !first.index_scans.is_empty() {
            return Err(fault(format!("index scans attached to leading table {}", first.table_id)));
        }

        let mut plan = LogicalOperator::Scan(self.scan(first.table_id)?.clone());
        for operator in fixed {
            let right = self.scan(operator.table_id)?.clone();
            if operator.index_scans.is_empty() {
                plan = LogicalOperator::ScalarProduct {
                    left: Box::new(plan),
                    right: Box::new(LogicalOperator::Scan(right)),
                };
                continue;
            }

            for scan in &operator.index_scans {
                if scan.table_id != operator.table_id {
                    return Err(fault(format!(
                        "index scan on table {} attached to table {}",
                        scan.table_id, operator.table_id
                    )));
                }
                let slot = residual
                    .get_mut(scan.predicate_id.0)
                    .ok_or_else(|| fault(format!("unknown predicate {}", scan.predicate_id.0)))?;
                if slot.take().is_none() {
                    return Err(fault(format!("predicate {} embedded twice", scan.predicate_id.0)));
                }
            }
            plan = LogicalOperator::IndexScalarProduct {
                left: Box::new(plan),
                right,
                index_scans: operator.index_scans.clone(),
            };
        }

        let residual: Vec<Expression> = residual.into_iter().flatten().collect();
        debug!(order = ?node.order(), residual = residual.len(), "Rewrote join");
        Ok(LogicalOperator::selection(residual, plan))
    }
}
