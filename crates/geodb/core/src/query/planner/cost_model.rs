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

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::index_selector::IndexScan;
use crate::config::OptimizerConfig;

/// Estimated cost of a partial join order: `proportional + constant`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JoinCost {
    /// Product of the rows contributed by every fixed operator
    pub proportional: f64,
    /// One-time cost of building ad hoc indexes
    pub constant: f64,
}

impl JoinCost {
    pub const INITIAL: JoinCost = JoinCost {
        proportional: 1.0,
        constant: 0.0,
    };

    pub fn total(&self) -> f64 {
        self.proportional + self.constant
    }
}

impl Default for JoinCost {
    fn default() -> Self {
        Self::INITIAL
    }
}

#[derive(Debug, Clone)]
pub struct CostModel {
    index_scan_reduction: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self::new(&OptimizerConfig::default())
    }
}

impl CostModel {
    pub fn new(config: &OptimizerConfig) -> Self {
        Self {
            index_scan_reduction: config.index_scan_reduction,
        }
    }

    /// Cost after fixing an operator of `row_count` rows reached through `scans`.
    /// An operator without index scans multiplies the cost by its rows; with
    /// index scans the rows are divided by the reduction factor and each
    /// distinct ad hoc field adds the rows once, for building the index.
    pub fn fix(&self, parent: &JoinCost, row_count: u64, scans: &[IndexScan]) -> JoinCost {
        let rows = row_count.max(1) as f64;
        if scans.is_empty() {
            return JoinCost {
                proportional: parent.proportional * rows,
                constant: parent.constant,
            };
        }

        let mut ad_hoc_fields = HashSet::new();
        let mut constant = parent.constant;
        for scan in scans.iter().filter(|s| s.ad_hoc) {
            if ad_hoc_fields.insert(scan.field.as_str()) {
                constant += rows;
            }
        }
        JoinCost {
            proportional: parent.proportional * rows / self.index_scan_reduction,
            constant,
        }
    }
}
