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

use geodb_common::DataType;

use super::error::{PlanError, PlanResult};
use super::expression::FieldRef;
use super::operator::{LogicalOperator, ScanOperator, TableId};

/// One output column of an operator
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub table_id: TableId,
    pub table_name: String,
    pub alias: Option<String>,
    pub name: String,
    pub data_type: DataType,
    /// Position of the field in its table's schema
    pub ordinal: usize,
}

impl Column {
    fn matches(&self, field: &FieldRef) -> bool {
        self.name == field.name
            && field
                .table
                .as_deref()
                .is_none_or(|q| self.alias.as_deref() == Some(q) || self.table_name == q)
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.alias.as_deref().unwrap_or(&self.table_name), self.name)
    }
}

/// Columns produced by an operator, in output order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowLayout {
    columns: Vec<Column>,
}

impl RowLayout {
    pub fn of_scan(scan: &ScanOperator) -> Self {
        let columns = scan
            .schema
            .fields()
            .iter()
            .enumerate()
            .map(|(ordinal, field)| Column {
                table_id: scan.table_id,
                table_name: scan.table_name.clone(),
                alias: scan.alias.clone(),
                name: field.name.clone(),
                data_type: field.data_type,
                ordinal,
            })
            .collect();
        Self { columns }
    }

    pub fn of_scans(scans: &[ScanOperator]) -> Self {
        scans.iter().fold(Self::default(), |layout, scan| layout.concat(&Self::of_scan(scan)))
    }

    /// Layout of the rows produced by an operator
    pub fn of(operator: &LogicalOperator) -> PlanResult<Self> {
        match operator {
            LogicalOperator::Scan(scan) => Ok(Self::of_scan(scan)),
            LogicalOperator::Selection { input, .. } => Self::of(input),
            LogicalOperator::Projection { fields, input } => {
                let input = Self::of(input)?;
                let positions = fields.iter().map(|f| input.resolve(f)).collect::<PlanResult<Vec<_>>>()?;
                Ok(input.project(&positions))
            }
            LogicalOperator::ScalarProduct { left, right } => Ok(Self::of(left)?.concat(&Self::of(right)?)),
            LogicalOperator::IndexScalarProduct { left, right, .. } => Ok(Self::of(left)?.concat(&Self::of_scan(right))),
        }
    }

    pub fn concat(&self, other: &RowLayout) -> RowLayout {
        let mut columns = self.columns.clone();
        columns.extend(other.columns.iter().cloned());
        RowLayout { columns }
    }

    pub fn project(&self, positions: &[usize]) -> RowLayout {
        RowLayout {
            columns: positions.iter().filter_map(|p| self.columns.get(*p).cloned()).collect(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of the column a field reference designates. A qualifier
    /// matches an alias or a table name; a reference matching more than one
    /// column is ambiguous.
    pub fn resolve(&self, field: &FieldRef) -> PlanResult<usize> {
        let mut matches = self.columns.iter().enumerate().filter(|(_, c)| c.matches(field));
        let Some((position, _)) = matches.next() else {
            return Err(PlanError::UnknownField(field.to_string()));
        };
        let others: Vec<String> = matches.map(|(_, c)| c.qualified_name()).collect();
        if others.is_empty() {
            return Ok(position);
        }
        let mut candidates = vec![self.columns[position].qualified_name()];
        candidates.extend(others);
        Err(PlanError::AmbiguousField {
            field: field.to_string(),
            candidates,
        })
    }

    pub fn column_of(&self, field: &FieldRef) -> PlanResult<&Column> {
        Ok(&self.columns[self.resolve(field)?])
    }

    /// Column positions sorted by table id, then by field position. Rows of
    /// plans joining the same tables in different orders compare equal once
    /// reordered this way.
    pub fn canonical_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.columns.len()).collect();
        order.sort_by_key(|p| (self.columns[*p].table_id, self.columns[*p].ordinal));
        order
    }
}
