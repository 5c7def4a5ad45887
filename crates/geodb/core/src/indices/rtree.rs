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

//! R-tree over row envelopes (Guttman, quadratic split).

use geodb_common::Envelope;
use std::collections::HashMap;

use super::lib::RowId;
use crate::config::SpatialIndexConfig;

#[derive(Debug, Clone, PartialEq)]
struct LeafEntry {
    envelope: Envelope,
    row_id: RowId,
}

#[derive(Debug, Clone, PartialEq)]
struct ChildEntry {
    envelope: Envelope,
    node: Box<Node>,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf(Vec<LeafEntry>),
    Internal(Vec<ChildEntry>),
}

trait Bounded {
    fn bounds(&self) -> Envelope;
}

impl Bounded for LeafEntry {
    fn bounds(&self) -> Envelope {
        self.envelope
    }
}

impl Bounded for ChildEntry {
    fn bounds(&self) -> Envelope {
        self.envelope
    }
}

impl Node {
    fn len(&self) -> usize {
        match self {
            Node::Leaf(entries) => entries.len(),
            Node::Internal(children) => children.len(),
        }
    }

    fn envelope(&self) -> Option<Envelope> {
        match self {
            Node::Leaf(entries) => Envelope::union_all(entries.iter().map(Bounded::bounds)),
            Node::Internal(children) => Envelope::union_all(children.iter().map(Bounded::bounds)),
        }
    }

    fn collect_leaves(self, out: &mut Vec<LeafEntry>) {
        match self {
            Node::Leaf(entries) => out.extend(entries),
            Node::Internal(children) => {
                for child in children {
                    child.node.collect_leaves(out);
                }
            }
        }
    }
}

/// Spatial index mapping row ids to envelopes
#[derive(Debug, Clone)]
pub struct RTree {
    root: Node,
    envelopes: HashMap<RowId, Envelope>,
    max_entries: usize,
    min_entries: usize,
}

impl Default for RTree {
    fn default() -> Self {
        Self::new(&SpatialIndexConfig::default())
    }
}

impl RTree {
    pub fn new(config: &SpatialIndexConfig) -> Self {
        let max_entries = config.max_node_entries.max(4);
        Self {
            root: Node::Leaf(Vec::new()),
            envelopes: HashMap::new(),
            max_entries,
            min_entries: config.min_node_entries.clamp(2, max_entries / 2),
        }
    }

    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }

    pub fn contains(&self, row_id: RowId) -> bool {
        self.envelopes.contains_key(&row_id)
    }

    pub fn envelope_of(&self, row_id: RowId) -> Option<Envelope> {
        self.envelopes.get(&row_id).copied()
    }

    /// Envelope covering every indexed row
    pub fn full_extent(&self) -> Option<Envelope> {
        self.root.envelope()
    }

    /// Indexed rows and their envelopes, in no particular order
    pub fn entries(&self) -> impl Iterator<Item = (RowId, Envelope)> + '_ {
        self.envelopes.iter().map(|(id, env)| (*id, *env))
    }

    /// Insert a row, replacing any envelope previously stored for it
    pub fn insert(&mut self, row_id: RowId, envelope: Envelope) {
        if self.envelopes.contains_key(&row_id) {
            self.delete(row_id);
        }
        self.envelopes.insert(row_id, envelope);
        self.insert_entry(LeafEntry { envelope, row_id });
    }

    /// Remove a row, returning false if it was not indexed
    pub fn delete(&mut self, row_id: RowId) -> bool {
        let Some(envelope) = self.envelopes.remove(&row_id) else {
            return false;
        };

        let mut orphans = Vec::new();
        Self::remove_from(&mut self.root, &envelope, row_id, self.min_entries, &mut orphans);

        // Shorten the tree while the root has a single child
        loop {
            let collapse = match &mut self.root {
                Node::Internal(children) if children.len() <= 1 => Some(children.pop()),
                _ => None,
            };
            match collapse {
                Some(Some(child)) => self.root = *child.node,
                Some(None) => self.root = Node::Leaf(Vec::new()),
                None => break,
            }
        }

        for entry in orphans {
            self.insert_entry(entry);
        }
        true
    }

    /// Lazy iterator over the rows whose envelope intersects `window`
    pub fn query(&self, window: Envelope) -> WindowQuery<'_> {
        WindowQuery {
            window,
            stack: vec![&self.root],
            current: Default::default(),
        }
    }

    fn insert_entry(&mut self, entry: LeafEntry) {
        if let Some(sibling) = Self::insert_into(&mut self.root, entry, self.max_entries, self.min_entries) {
            let old_root = std::mem::replace(&mut self.root, Node::Leaf(Vec::new()));
            let mut children = Vec::with_capacity(2);
            if let Some(envelope) = old_root.envelope() {
                children.push(ChildEntry { envelope, node: Box::new(old_root) });
            }
            children.push(sibling);
            self.root = Node::Internal(children);
        }
    }

    /// Insert below `node`; returns the new sibling when `node` had to split
    fn insert_into(node: &mut Node, entry: LeafEntry, max: usize, min: usize) -> Option<ChildEntry> {
        match node {
            Node::Leaf(entries) => {
                entries.push(entry);
                if entries.len() <= max {
                    return None;
                }
                let (kept, moved) = quadratic_split(std::mem::take(entries), min);
                *entries = kept;
                let sibling = Node::Leaf(moved);
                sibling.envelope().map(|envelope| ChildEntry { envelope, node: Box::new(sibling) })
            }
            Node::Internal(children) => {
                let target = choose_subtree(children, &entry.envelope);
                let child = &mut children[target];
                child.envelope.expand_to_include(&entry.envelope);
                if let Some(split) = Self::insert_into(&mut child.node, entry, max, min) {
                    if let Some(envelope) = child.node.envelope() {
                        child.envelope = envelope;
                    }
                    children.push(split);
                }
                if children.len() <= max {
                    return None;
                }
                let (kept, moved) = quadratic_split(std::mem::take(children), min);
                *children = kept;
                let sibling = Node::Internal(moved);
                sibling.envelope().map(|envelope| ChildEntry { envelope, node: Box::new(sibling) })
            }
        }
    }

    /// Remove the entry below `node`, collecting the leaves of underfull nodes in `orphans`
    fn remove_from(node: &mut Node, envelope: &Envelope, row_id: RowId, min: usize, orphans: &mut Vec<LeafEntry>) -> bool {
        match node {
            Node::Leaf(entries) => match entries.iter().position(|e| e.row_id == row_id) {
                Some(position) => {
                    entries.remove(position);
                    true
                }
                None => false,
            },
            Node::Internal(children) => {
                for i in 0..children.len() {
                    if !children[i].envelope.contains(envelope) {
                        continue;
                    }
                    if !Self::remove_from(&mut children[i].node, envelope, row_id, min, orphans) {
                        continue;
                    }
                    if children[i].node.len() < min {
                        let child = children.remove(i);
                        child.node.collect_leaves(orphans);
                    } else if let Some(shrunk) = children[i].node.envelope() {
                        children[i].envelope = shrunk;
                    }
                    return true;
                }
                false
            }
        }
    }
}

/// Child whose envelope needs the least enlargement, ties broken by smaller area
fn choose_subtree(children: &[ChildEntry], envelope: &Envelope) -> usize {
    let mut best = 0;
    let mut best_key = (f64::INFINITY, f64::INFINITY);
    for (i, child) in children.iter().enumerate() {
        let key = (child.envelope.enlargement(envelope), child.envelope.area());
        if key.0 < best_key.0 || (key.0 == best_key.0 && key.1 < best_key.1) {
            best = i;
            best_key = key;
        }
    }
    best
}

fn quadratic_split<T: Bounded>(mut entries: Vec<T>, min: usize) -> (Vec<T>, Vec<T>) {
    // Seeds: the pair wasting the most area when grouped together
    let (mut seed_a, mut seed_b, mut worst) = (0, 1, f64::NEG_INFINITY);
    for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            let (a, b) = (entries[i].bounds(), entries[j].bounds());
            let waste = a.union(&b).area() - a.area() - b.area();
            if waste > worst {
                (seed_a, seed_b, worst) = (i, j, waste);
            }
        }
    }

    let second = entries.swap_remove(seed_b);
    let first = entries.swap_remove(seed_a);
    let (mut env_a, mut env_b) = (first.bounds(), second.bounds());
    let (mut group_a, mut group_b) = (vec![first], vec![second]);

    while !entries.is_empty() {
        if group_a.len() + entries.len() <= min {
            group_a.append(&mut entries);
            break;
        }
        if group_b.len() + entries.len() <= min {
            group_b.append(&mut entries);
            break;
        }

        // Next: the entry with the strongest preference for one group
        let mut next = 0;
        let mut best_diff = f64::NEG_INFINITY;
        for (i, entry) in entries.iter().enumerate() {
            let diff = (env_a.enlargement(&entry.bounds()) - env_b.enlargement(&entry.bounds())).abs();
            if diff > best_diff {
                next = i;
                best_diff = diff;
            }
        }
        let entry = entries.swap_remove(next);
        let bounds = entry.bounds();
        let (grow_a, grow_b) = (env_a.enlargement(&bounds), env_b.enlargement(&bounds));
        let to_a = if grow_a != grow_b {
            grow_a < grow_b
        } else if env_a.area() != env_b.area() {
            env_a.area() < env_b.area()
        } else {
            group_a.len() <= group_b.len()
        };
        if to_a {
            env_a.expand_to_include(&bounds);
            group_a.push(entry);
        } else {
            env_b.expand_to_include(&bounds);
            group_b.push(entry);
        }
    }
    (group_a, group_b)
}

/// Lazy, non-restartable window query over an [`RTree`]
pub struct WindowQuery<'a> {
    window: Envelope,
    stack: Vec<&'a Node>,
    current: std::slice::Iter<'a, LeafEntry>,
}

impl Iterator for WindowQuery<'_> {
    type Item = RowId;

    fn next(&mut self) -> Option<RowId> {
        loop {
            for entry in self.current.by_ref() {
                if entry.envelope.intersects(&self.window) {
                    return Some(entry.row_id);
                }
            }
            match self.stack.pop()? {
                Node::Leaf(entries) => self.current = entries.iter(),
                Node::Internal(children) => {
                    let window = self.window;
                    self.stack.extend(children.iter().filter(|c| c.envelope.intersects(&window)).map(|c| c.node.as_ref()));
                }
            }
        }
    }
}
