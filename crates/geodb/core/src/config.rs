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

//! Configuration of the optimizer and of the spatial index.
//!
//! Every field has a default, so a partial JSON document only overrides the
//! values it names.

use serde::{Deserialize, Serialize};
use std::path::Path;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoDbConfig {
    pub optimizer: OptimizerConfig,
    pub spatial_index: SpatialIndexConfig,
}

/// Join-order search tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Factor by which an index scan divides the rows a joined operator contributes
    pub index_scan_reduction: f64,
    /// Allow index scans over indexes built on the fly for spatial predicates
    pub allow_ad_hoc_indexes: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            index_scan_reduction: 10.0,
            allow_ad_hoc_indexes: true,
        }
    }
}

/// R-tree node fan-out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialIndexConfig {
    pub max_node_entries: usize,
    pub min_node_entries: usize,
}

impl Default for SpatialIndexConfig {
    fn default() -> Self {
        Self {
            max_node_entries: 16,
            min_node_entries: 6,
        }
    }
}

impl GeoDbConfig {
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: GeoDbConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.optimizer.validate()?;
        self.spatial_index.validate()
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.index_scan_reduction.is_finite() || self.index_scan_reduction < 1.0 {
            return Err(ConfigError::Invalid(format!("index_scan_reduction must be a finite value >= 1, got {}", self.index_scan_reduction)));
        }
        Ok(())
    }
}

impl SpatialIndexConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_node_entries < 4 {
            return Err(ConfigError::Invalid(format!("max_node_entries must be at least 4, got {}", self.max_node_entries)));
        }
        if self.min_node_entries < 2 || self.min_node_entries > self.max_node_entries / 2 {
            return Err(ConfigError::Invalid(format!(
                "min_node_entries must be between 2 and {}, got {}",
                self.max_node_entries / 2,
                self.min_node_entries
            )));
        }
        Ok(())
    }
}
