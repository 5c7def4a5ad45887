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

//! Axis-aligned bounding rectangles used by the spatial index and by
//! window queries.

use geo::{BoundingRect, Coord, Geometry, Rect};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box of a geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    /// Create an envelope from two opposite corners, in any order
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
        }
    }

    /// Degenerate envelope of a single coordinate
    pub fn point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    /// Bounding box of a geometry, `None` for empty geometries
    pub fn of_geometry(geometry: &Geometry<f64>) -> Option<Self> {
        geometry.bounding_rect().map(Self::from)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Check whether the two envelopes share at least one point (borders included)
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x && other.min_x <= self.max_x && self.min_y <= other.max_y && other.min_y <= self.max_y
    }

    /// Check whether `other` lies completely inside this envelope
    pub fn contains(&self, other: &Envelope) -> bool {
        self.min_x <= other.min_x && self.min_y <= other.min_y && self.max_x >= other.max_x && self.max_y >= other.max_y
    }

    /// Smallest envelope covering both
    pub fn union(&self, other: &Envelope) -> Envelope {
        Envelope {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Grow this envelope in place so that it covers `other`
    pub fn expand_to_include(&mut self, other: &Envelope) {
        *self = self.union(other);
    }

    /// Area that would be added by growing this envelope to cover `other`
    pub fn enlargement(&self, other: &Envelope) -> f64 {
        self.union(other).area() - self.area()
    }

    /// Union of a sequence of envelopes, `None` when the sequence is empty
    pub fn union_all<I>(envelopes: I) -> Option<Envelope>
    where
        I: IntoIterator<Item = Envelope>,
    {
        envelopes.into_iter().reduce(|acc, e| acc.union(&e))
    }
}

impl From<Rect<f64>> for Envelope {
    fn from(rect: Rect<f64>) -> Self {
        Envelope::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

impl From<Envelope> for Rect<f64> {
    fn from(envelope: Envelope) -> Self {
        Rect::new(Coord { x: envelope.min_x, y: envelope.min_y }, Coord { x: envelope.max_x, y: envelope.max_y })
    }
}
