//! Sort-tile-recursive packed R-tree.
//!
//! Entries are sorted by bbox centre along x, cut into vertical slices of
//! `⌈√P⌉ · M` entries (P = number of leaves, M = node capacity), each slice is
//! sorted along y and packed into leaves of M entries. Parent levels are built
//! the same way over node bboxes until a single root remains, giving a
//! balanced tree of height `O(log_M n)`.
//!
//! Sorting ties are broken by entry id (by node position for inner levels),
//! so the same entry set always produces the same tree.
//!
//! # Example
//!
//! ```rust
//! use geolocate::compute::{BulkLoad, SpatialIndex, StrTree};
//! use geolocate::{BoundingBox, Config, IndexedEntry, UnitId};
//!
//! let entries = vec![
//!     IndexedEntry::new(UnitId(1), BoundingBox::new(0.0, 0.0, 1.0, 1.0)),
//!     IndexedEntry::new(UnitId(2), BoundingBox::new(1.0, 0.0, 2.0, 1.0)),
//!     IndexedEntry::new(UnitId(3), BoundingBox::new(2.0, 0.0, 3.0, 1.0)),
//! ];
//! let tree = StrTree::bulk_load(entries, &Config::default())?;
//!
//! let mut hits = tree.range_query(&BoundingBox::new(0.8, 0.0, 1.2, 1.0));
//! hits.sort();
//! assert_eq!(hits, vec![UnitId(1), UnitId(2)]);
//! assert_eq!(tree.nearest_query(&BoundingBox::point(9.0, 0.5)), UnitId(3));
//! # Ok::<(), geolocate::GeolocateError>(())
//! ```

use super::{BulkLoad, SpatialIndex, closer};
use crate::compute::validation::validate_bbox;
use crate::config::Config;
use crate::error::{GeolocateError, Result};
use geolocate_types::{BoundingBox, IndexedEntry, UnitId};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

type ChildList = SmallVec<[u32; 16]>;

#[derive(Debug, Clone)]
enum Children {
    /// Positions in `StrTree::entries`
    Entries(ChildList),
    /// Positions in `StrTree::nodes`
    Nodes(ChildList),
}

#[derive(Debug, Clone)]
struct Node {
    bbox: BoundingBox,
    children: Children,
}

/// Item being packed: its bbox and a stable sort key for ties.
#[derive(Debug, Clone, Copy)]
struct PackItem {
    bbox: BoundingBox,
    position: u32,
    tie: u64,
}

/// Immutable sort-tile-recursive R-tree.
#[derive(Debug, Clone)]
pub struct StrTree {
    entries: Vec<IndexedEntry>,
    nodes: Vec<Node>,
    root: u32,
    height: usize,
    node_capacity: usize,
    lowest_id: UnitId,
}

impl StrTree {
    /// Build with an explicit fanout.
    pub fn with_capacity(entries: Vec<IndexedEntry>, node_capacity: usize) -> Result<Self> {
        if entries.is_empty() {
            return Err(GeolocateError::EmptyIndex);
        }
        if node_capacity < 2 {
            return Err(GeolocateError::InvalidConfig(format!(
                "node capacity must be at least 2, got {}",
                node_capacity
            )));
        }
        if entries.len() > u32::MAX as usize {
            return Err(GeolocateError::InvalidInput(format!(
                "too many entries for one index: {}",
                entries.len()
            )));
        }
        for entry in &entries {
            validate_bbox(&entry.bbox).map_err(|e| {
                GeolocateError::InvalidInput(format!("entry {}: {}", entry.id, e))
            })?;
        }

        let lowest_id = entries
            .iter()
            .map(|entry| entry.id)
            .min()
            .ok_or(GeolocateError::EmptyIndex)?;

        let mut nodes: Vec<Node> = Vec::new();

        let leaf_items: Vec<PackItem> = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| PackItem {
                bbox: entry.bbox,
                position: position as u32,
                tie: entry.id.0,
            })
            .collect();

        let mut level: Vec<u32> = pack_level(leaf_items, node_capacity)
            .into_iter()
            .map(|group| {
                let boxes: Vec<BoundingBox> =
                    group.iter().map(|&pos| entries[pos as usize].bbox).collect();
                push_node(&mut nodes, &boxes, Children::Entries(group))
            })
            .collect();
        let mut height = 1;

        while level.len() > 1 {
            let items: Vec<PackItem> = level
                .iter()
                .map(|&node| PackItem {
                    bbox: nodes[node as usize].bbox,
                    position: node,
                    tie: node as u64,
                })
                .collect();

            level = pack_level(items, node_capacity)
                .into_iter()
                .map(|group| {
                    let boxes: Vec<BoundingBox> =
                        group.iter().map(|&n| nodes[n as usize].bbox).collect();
                    push_node(&mut nodes, &boxes, Children::Nodes(group))
                })
                .collect();
            height += 1;
        }

        let root = level[0];
        log::debug!(
            "Built STR tree: {} entries, {} nodes, height {}, fanout {}",
            entries.len(),
            nodes.len(),
            height,
            node_capacity
        );

        Ok(Self {
            entries,
            nodes,
            root,
            height,
            node_capacity,
            lowest_id,
        })
    }

    /// Number of levels, leaves included.
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn node_capacity(&self) -> usize {
        self.node_capacity
    }

    /// Entries in their original order.
    pub fn entries(&self) -> &[IndexedEntry] {
        &self.entries
    }
}

impl BulkLoad for StrTree {
    fn bulk_load(entries: Vec<IndexedEntry>, config: &Config) -> Result<Self> {
        Self::with_capacity(entries, config.node_capacity)
    }
}

impl SpatialIndex for StrTree {
    fn range_query(&self, query: &BoundingBox) -> Vec<UnitId> {
        if !query.is_finite() {
            log::warn!("Rejecting bounding box query with non-finite coordinates");
            return Vec::new();
        }

        let mut results = Vec::new();
        let mut stack = vec![self.root];

        while let Some(node_idx) = stack.pop() {
            let node = &self.nodes[node_idx as usize];
            if !node.bbox.intersects(query) {
                continue;
            }
            match &node.children {
                Children::Entries(children) => {
                    results.extend(
                        children
                            .iter()
                            .map(|&pos| &self.entries[pos as usize])
                            .filter(|entry| entry.bbox.intersects(query))
                            .map(|entry| entry.id),
                    );
                }
                // Reversed so children are visited left to right.
                Children::Nodes(children) => stack.extend(children.iter().rev().copied()),
            }
        }

        results
    }

    fn nearest_query(&self, reference: &BoundingBox) -> UnitId {
        if !reference.is_finite() {
            log::warn!("Nearest query with non-finite coordinates, returning lowest id");
            return self.lowest_id;
        }

        let mut best: Option<(f64, UnitId)> = None;
        let mut heap = BinaryHeap::new();
        heap.push(Visit {
            distance: self.nodes[self.root as usize].bbox.distance(reference),
            node: self.root,
        });

        while let Some(Visit { distance, node }) = heap.pop() {
            if let Some((best_dist, _)) = best
                && distance > best_dist
            {
                break;
            }
            match &self.nodes[node as usize].children {
                Children::Entries(children) => {
                    for &pos in children {
                        let entry = &self.entries[pos as usize];
                        let candidate = (entry.bbox.distance(reference), entry.id);
                        if closer(candidate, best) {
                            best = Some(candidate);
                        }
                    }
                }
                Children::Nodes(children) => {
                    for &child in children {
                        let distance = self.nodes[child as usize].bbox.distance(reference);
                        if best.is_none_or(|(best_dist, _)| distance <= best_dist) {
                            heap.push(Visit {
                                distance,
                                node: child,
                            });
                        }
                    }
                }
            }
        }

        best.map(|(_, id)| id).unwrap_or(self.lowest_id)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn bounds(&self) -> BoundingBox {
        self.nodes[self.root as usize].bbox
    }
}

/// Node awaiting a visit, popped closest first.
#[derive(Debug, Clone, Copy)]
struct Visit {
    distance: f64,
    node: u32,
}

impl PartialEq for Visit {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Visit {}
impl PartialOrd for Visit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Visit {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: smaller distances have higher priority
        other
            .distance
            .total_cmp(&self.distance)
            .then(other.node.cmp(&self.node))
    }
}

fn push_node(nodes: &mut Vec<Node>, boxes: &[BoundingBox], children: Children) -> u32 {
    let bbox = boxes
        .iter()
        .skip(1)
        .fold(boxes[0], |acc, bbox| acc.union(bbox));
    nodes.push(Node { bbox, children });
    (nodes.len() - 1) as u32
}

fn by_center(axis: usize) -> impl Fn(&PackItem, &PackItem) -> Ordering {
    move |a, b| {
        let (ca, cb) = (a.bbox.center(), b.bbox.center());
        let (ka, kb) = if axis == 0 {
            (ca.x(), cb.x())
        } else {
            (ca.y(), cb.y())
        };
        ka.total_cmp(&kb).then(a.tie.cmp(&b.tie))
    }
}

/// One STR pass: groups of at most `capacity` positions.
fn pack_level(mut items: Vec<PackItem>, capacity: usize) -> Vec<ChildList> {
    let leaf_count = items.len().div_ceil(capacity);
    let slice_count = (leaf_count as f64).sqrt().ceil().max(1.0) as usize;
    let slice_len = slice_count * capacity;

    items.sort_by(by_center(0));

    let mut groups = Vec::with_capacity(leaf_count);
    for slice in items.chunks_mut(slice_len) {
        slice.sort_by(by_center(1));
        for group in slice.chunks(capacity) {
            groups.push(group.iter().map(|item| item.position).collect());
        }
    }
    groups
}
