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

//! Branch-and-bound search over left-deep join orders.

use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use tracing::{debug, trace};

use super::cost_model::{CostModel, JoinCost};
use super::index_selector::IndexScan;
use crate::query::error::{PlanError, PlanResult};
use crate::query::operator::{ScanOperator, TableId};

/// A scan with the row count seen when the optimization started
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationInfo {
    pub scan: ScanOperator,
    pub row_count: u64,
}

/// An operator placed in the join order, with the index scans reaching it
#[derive(Debug, Clone, PartialEq)]
pub struct FixedOperator {
    pub table_id: TableId,
    pub row_count: u64,
    pub index_scans: Vec<IndexScan>,
}

/// Prefix of a join order. Branching returns a new node; nodes are never
/// mutated once built.
#[derive(Debug, Clone)]
pub struct SearchNode {
    fixed: Vec<FixedOperator>,
    pending: Vec<TableId>,
    parent_cost: JoinCost,
    cost: OnceCell<JoinCost>,
}

impl SearchNode {
    /// Node with every operator pending, in input order
    pub fn root(infos: &[OptimizationInfo]) -> Self {
        Self {
            fixed: Vec::new(),
            pending: infos.iter().map(|info| info.scan.table_id).collect(),
            parent_cost: JoinCost::INITIAL,
            cost: OnceCell::from(JoinCost::INITIAL),
        }
    }

    pub fn fixed(&self) -> &[FixedOperator] {
        &self.fixed
    }

    pub fn pending(&self) -> &[TableId] {
        &self.pending
    }

    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_fixed(&self, table_id: TableId) -> bool {
        self.fixed.iter().any(|op| op.table_id == table_id)
    }

    /// Fixed table ids, in join order
    pub fn order(&self) -> Vec<TableId> {
        self.fixed.iter().map(|op| op.table_id).collect()
    }

    /// Cost of the node, computed on first use
    pub fn evaluate(&self, model: &CostModel) -> JoinCost {
        *self.cost.get_or_init(|| match self.fixed.last() {
            Some(last) => model.fix(&self.parent_cost, last.row_count, &last.index_scans),
            None => self.parent_cost,
        })
    }

    /// Child node fixing `table_id` next. Every candidate targeting the
    /// table whose lookup only needs already fixed tables is attached, one per
    /// predicate, standing indexes first.
    pub fn branch(&self, table_id: TableId, infos: &[OptimizationInfo], candidates: &[IndexScan], model: &CostModel) -> PlanResult<SearchNode> {
        let position = self
            .pending
            .iter()
            .position(|id| *id == table_id)
            .ok_or_else(|| PlanError::InternalFault(format!("table {table_id} is not pending")))?;
        let info = infos
            .iter()
            .find(|info| info.scan.table_id == table_id)
            .ok_or_else(|| PlanError::InternalFault(format!("no optimization info for table {table_id}")))?;

        let mut index_scans: Vec<IndexScan> = Vec::new();
        for ad_hoc in [false, true] {
            for candidate in candidates.iter().filter(|c| c.table_id == table_id && c.ad_hoc == ad_hoc) {
                let taken = index_scans.iter().any(|s| s.predicate_id == candidate.predicate_id);
                if !taken && candidate.lookup_tables.iter().all(|t| self.is_fixed(*t)) {
                    index_scans.push(candidate.clone());
                }
            }
        }

        let mut pending = self.pending.clone();
        pending.remove(position);
        let mut fixed = self.fixed.clone();
        fixed.push(FixedOperator {
            table_id,
            row_count: info.row_count,
            index_scans,
        });

        Ok(SearchNode {
            fixed,
            pending,
            parent_cost: self.evaluate(model),
            cost: OnceCell::new(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Nodes created by branching
    pub expanded: usize,
    /// Nodes discarded because they already cost more than the best complete order
    pub pruned: usize,
    /// Complete orders reached
    pub complete: usize,
}

impl SearchStats {
    pub fn merge(&mut self, other: &SearchStats) {
        self.expanded += other.expanded;
        self.pruned += other.pruned;
        self.complete += other.complete;
    }
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best: SearchNode,
    pub cost: JoinCost,
    pub stats: SearchStats,
}

pub struct BranchAndBound<'a> {
    infos: &'a [OptimizationInfo],
    candidates: &'a [IndexScan],
    model: CostModel,
}

impl<'a> BranchAndBound<'a> {
    pub fn new(infos: &'a [OptimizationInfo], candidates: &'a [IndexScan], model: CostModel) -> Self {
        Self { infos, candidates, model }
    }

    /// Cheapest complete join order. Among orders of equal cost the first
    /// one reached wins; pending operators are tried in input order.
    pub fn search(&self) -> PlanResult<SearchOutcome> {
        if self.infos.is_empty() {
            return Err(PlanError::InternalFault("join search over no operators".to_string()));
        }

        let mut best: Option<(SearchNode, JoinCost)> = None;
        let mut stats = SearchStats::default();
        self.explore(&SearchNode::root(self.infos), &mut best, &mut stats)?;

        let (best, cost) = best.ok_or_else(|| PlanError::InternalFault("join search found no complete order".to_string()))?;
        debug!(
            order = ?best.order(),
            cost = cost.total(),
            expanded = stats.expanded,
            pruned = stats.pruned,
            complete = stats.complete,
            "Join order search finished"
        );
        Ok(SearchOutcome { best, cost, stats })
    }

    fn explore(&self, node: &SearchNode, best: &mut Option<(SearchNode, JoinCost)>, stats: &mut SearchStats) -> PlanResult<()> {
        for table_id in node.pending() {
            let child = node.branch(*table_id, self.infos, self.candidates, &self.model)?;
            stats.expanded += 1;
            let cost = child.evaluate(&self.model);

            if let Some((_, best_cost)) = best {
                if cost.total() > best_cost.total() {
                    stats.pruned += 1;
                    trace!(order = ?child.order(), cost = cost.total(), bound = best_cost.total(), "Pruned join order");
                    continue;
                }
            }

            if child.is_complete() {
                stats.complete += 1;
                let improves = best.as_ref().is_none_or(|(_, best_cost)| cost.total() < best_cost.total());
                if improves {
                    *best = Some((child, cost));
                }
            } else {
                self.explore(&child, best, stats)?;
            }
        }
        Ok(())
    }
}
