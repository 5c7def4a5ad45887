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

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::rewriter::PlanRewriter;
use crate::config::OptimizerConfig;
use crate::indices::IndexManager;
use crate::query::error::{PlanError, PlanResult};
use crate::query::expression::Expression;
use crate::query::layout::RowLayout;
use crate::query::operator::{LogicalOperator, ScanOperator};
use crate::query::planner::{BranchAndBound, CostModel, IndexSelector, JoinCost, OptimizationInfo, SearchStats};
use crate::storage::{Catalog, TableStatistics};

/// Result of an optimization run
#[derive(Debug, Clone)]
pub struct OptimizedPlan {
    pub plan_id: String,
    pub plan: LogicalOperator,
    /// Cost of the chosen join order of every rewritten selection, bottom-up
    pub estimated_costs: Vec<JoinCost>,
    pub search_stats: SearchStats,
    /// Why the plan is the unoptimized input, if it is
    pub degraded: Option<PlanError>,
}

impl OptimizedPlan {
    fn new(plan: LogicalOperator) -> Self {
        Self {
            plan_id: format!("plan_{}", Uuid::new_v4()),
            plan,
            estimated_costs: Vec::new(),
            search_stats: SearchStats::default(),
            degraded: None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Summary of an optimization run, serializable for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub plan_id: String,
    pub estimated_costs: Vec<JoinCost>,
    pub search_stats: SearchStats,
    pub degraded: Option<String>,
}

impl From<&OptimizedPlan> for OptimizationReport {
    fn from(plan: &OptimizedPlan) -> Self {
        Self {
            plan_id: plan.plan_id.clone(),
            estimated_costs: plan.estimated_costs.clone(),
            search_stats: plan.search_stats,
            degraded: plan.degraded.as_ref().map(|e| e.to_string()),
        }
    }
}

/// Rewrites selections over cross products of scans into left-deep joins
/// that query indexes where the cost model favours it.
pub struct JoinOptimizer {
    config: OptimizerConfig,
    statistics: Arc<dyn TableStatistics>,
    indexes: Option<Arc<IndexManager>>,
}

impl JoinOptimizer {
    /// Optimizer without index manager: every join order is costed by row
    /// counts only.
    pub fn new(config: OptimizerConfig, statistics: Arc<dyn TableStatistics>) -> Self {
        Self {
            config,
            statistics,
            indexes: None,
        }
    }

    pub fn with_index_manager(mut self, indexes: Arc<IndexManager>) -> Self {
        self.indexes = Some(indexes);
        self
    }

    /// Optimizer reading row counts and standing indexes from the catalog
    pub fn for_catalog(catalog: Arc<Catalog>) -> Self {
        let config = catalog.config().optimizer.clone();
        let indexes = catalog.index_manager();
        Self::new(config, catalog).with_index_manager(indexes)
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn optimize(&self, plan: &LogicalOperator) -> PlanResult<OptimizedPlan> {
        let mut optimized = OptimizedPlan::new(plan.clone());
        optimized.plan = self.transform(plan, &mut optimized)?;
        debug!(
            plan_id = %optimized.plan_id,
            selections = optimized.estimated_costs.len(),
            expanded = optimized.search_stats.expanded,
            "Optimized plan"
        );
        Ok(optimized)
    }

    /// Optimized plan, or the input plan when optimization fails. The failure
    /// is kept in `degraded`.
    pub fn optimize_or_fallback(&self, plan: &LogicalOperator) -> OptimizedPlan {
        match self.optimize(plan) {
            Ok(optimized) => optimized,
            Err(e) => {
                let mut fallback = OptimizedPlan::new(plan.clone());
                warn!(plan_id = %fallback.plan_id, error = %e, "Join optimization failed, using the unoptimized plan");
                fallback.degraded = Some(e);
                fallback
            }
        }
    }

    fn transform(&self, plan: &LogicalOperator, out: &mut OptimizedPlan) -> PlanResult<LogicalOperator> {
        Ok(match plan {
            LogicalOperator::Scan(_) => plan.clone(),
            LogicalOperator::Selection { predicates, input } => {
                let input = self.transform(input, out)?;
                match input.product_scans() {
                    Some(scans) if scans.len() >= 2 => self.optimize_selection(predicates, scans, out)?,
                    _ => LogicalOperator::selection(predicates.clone(), input),
                }
            }
            LogicalOperator::Projection { fields, input } => LogicalOperator::Projection {
                fields: fields.clone(),
                input: Box::new(self.transform(input, out)?),
            },
            LogicalOperator::ScalarProduct { left, right } => LogicalOperator::ScalarProduct {
                left: Box::new(self.transform(left, out)?),
                right: Box::new(self.transform(right, out)?),
            },
            LogicalOperator::IndexScalarProduct { left, right, index_scans } => LogicalOperator::IndexScalarProduct {
                left: Box::new(self.transform(left, out)?),
                right: right.clone(),
                index_scans: index_scans.clone(),
            },
        })
    }

    fn optimize_selection(&self, predicates: &[Expression], scans: Vec<ScanOperator>, out: &mut OptimizedPlan) -> PlanResult<LogicalOperator> {
        let mut seen = HashSet::new();
        if let Some(scan) = scans.iter().find(|scan| !seen.insert(scan.table_id)) {
            return Err(PlanError::DuplicateTableId(scan.table_id.0));
        }

        let predicates: Vec<Expression> = predicates.iter().cloned().flat_map(Expression::conjuncts).collect();
        let layout = RowLayout::of_scans(&scans);
        for predicate in &predicates {
            for field in predicate.field_references() {
                layout.resolve(field)?;
            }
        }

        let infos = scans
            .iter()
            .map(|scan| -> PlanResult<OptimizationInfo> {
                let row_count = self
                    .statistics
                    .row_count(&scan.table_name)?
                    .ok_or_else(|| PlanError::UnknownTable(scan.table_name.clone()))?;
                Ok(OptimizationInfo {
                    scan: scan.clone(),
                    row_count,
                })
            })
            .collect::<PlanResult<Vec<_>>>()?;

        let candidates = IndexSelector::new(self.indexes.as_deref(), &self.config).candidates(&predicates, &layout)?;
        let outcome = BranchAndBound::new(&infos, &candidates, CostModel::new(&self.config)).search()?;
        let rewritten = PlanRewriter::new(&scans).rewrite(&outcome.best, predicates)?;

        out.estimated_costs.push(outcome.cost);
        out.search_stats.merge(&outcome.stats);
        Ok(rewritten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::operator::TableId;
    use geodb_common::{DataType, Field, Schema};
    use std::collections::HashMap;

    fn scan(id: usize, name: &str) -> ScanOperator {
        let schema = Schema::new(vec![Field::new("x", DataType::Int), Field::new("y", DataType::Int)]).unwrap();
        ScanOperator::new(TableId(id), name, Arc::new(schema))
    }

    fn statistics() -> Arc<dyn TableStatistics> {
        let counts: HashMap<String, u64> = [("A", 100), ("B", 50), ("C", 200)].into_iter().map(|(t, n)| (t.to_string(), n)).collect();
        Arc::new(counts)
    }

    fn query(predicates: Vec<Expression>) -> LogicalOperator {
        let product = LogicalOperator::product(vec![scan(0, "A"), scan(1, "B"), scan(2, "C")]).unwrap();
        LogicalOperator::selection(predicates, product)
    }

    #[test]
    fn test_without_index_manager_costs_are_row_products() {
        let optimizer = JoinOptimizer::new(OptimizerConfig::default(), statistics());
        let predicate = Expression::And(vec![
            Expression::equals(Expression::field("A", "x"), Expression::field("B", "x")),
            Expression::equals(Expression::field("B", "y"), Expression::field("C", "y")),
        ]);
        let optimized = optimizer.optimize(&query(vec![predicate])).unwrap();

        assert_eq!(optimized.estimated_costs.len(), 1);
        assert_eq!(optimized.estimated_costs[0].total(), 1_000_000.0);
        assert!(optimized.plan_id.starts_with("plan_"));
        let LogicalOperator::Selection { predicates, input } = &optimized.plan else {
            panic!("expected a selection");
        };
        assert_eq!(predicates.len(), 2);
        let names: Vec<String> = input.product_scans().unwrap().into_iter().map(|s| s.table_name).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_ambiguous_field_is_reported() {
        let optimizer = JoinOptimizer::new(OptimizerConfig::default(), statistics());
        let plan = query(vec![Expression::equals(Expression::column("x"), Expression::field("B", "y"))]);
        assert!(matches!(optimizer.optimize(&plan), Err(PlanError::AmbiguousField { .. })));

        let fallback = optimizer.optimize_or_fallback(&plan);
        assert_eq!(fallback.plan, plan);
        assert!(matches!(fallback.degraded, Some(PlanError::AmbiguousField { .. })));
        assert!(fallback.estimated_costs.is_empty());
    }

    #[test]
    fn test_unknown_table_statistics() {
        let optimizer = JoinOptimizer::new(OptimizerConfig::default(), statistics());
        let product = LogicalOperator::product(vec![scan(0, "A"), scan(1, "Z")]).unwrap();
        let plan = LogicalOperator::selection(Vec::new(), product);
        assert_eq!(optimizer.optimize(&plan).unwrap_err(), PlanError::UnknownTable("Z".to_string()));
    }

    #[test]
    fn test_duplicate_table_ids() {
        let optimizer = JoinOptimizer::new(OptimizerConfig::default(), statistics());
        let product = LogicalOperator::product(vec![scan(0, "A"), scan(0, "B")]).unwrap();
        let plan = LogicalOperator::selection(Vec::new(), product);
        assert_eq!(optimizer.optimize(&plan).unwrap_err(), PlanError::DuplicateTableId(0));
    }

    #[test]
    fn test_single_scan_selection_is_kept() {
        let optimizer = JoinOptimizer::new(OptimizerConfig::default(), statistics());
        let plan = LogicalOperator::selection(
            vec![Expression::equals(Expression::field("A", "x"), Expression::literal(1i64))],
            LogicalOperator::Scan(scan(0, "A")),
        );
        let optimized = optimizer.optimize(&plan).unwrap();
        assert_eq!(optimized.plan, plan);
        assert!(optimized.estimated_costs.is_empty());
        assert!(!optimized.is_degraded());
    }

    #[test]
    fn test_report_serializes() {
        let optimizer = JoinOptimizer::new(OptimizerConfig::default(), statistics());
        let optimized = optimizer.optimize(&query(Vec::new())).unwrap();
        let report = OptimizationReport::from(&optimized);
        let json = serde_json::to_string(&report).unwrap();
        let back: OptimizationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
        assert_eq!(back.search_stats.complete, 6);
    }
}
