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

/// Receives progress of long running tasks such as index builds and can
/// ask them to stop.
pub trait ProgressMonitor: Send + Sync {
    /// Called with the fraction of work done, between 0.0 and 1.0
    fn progress(&self, done: f64);

    /// Polled between units of work; returning true aborts the task
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Monitor that ignores progress and never cancels
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressMonitor;

impl ProgressMonitor for NullProgressMonitor {
    fn progress(&self, _done: f64) {}
}
