// Distributed under the GNU Affero General Public License v3.0 or later.
// See accompanying file LICENSE or https://www.gnu.org/licenses/agpl-3.0.html for details.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap, HashSet},
};

use glam::Vec2;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use thiserror::Error;

use crate::{
    geometry::Aabb,
    handles::{NodeId, ObjectId, ObjectPair},
};

/// How a new leaf picks the node it gets paired with.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiblingStrategy {
    /// Branch and bound over the whole tree, pruned by a lower bound on cost.
    #[default]
    BestFirst,
    /// Walk down, always into the cheaper child. Fast, lower quality.
    Greedy,
    /// Score every node. Reference for the other two.
    Exhaustive,
}

#[derive(Debug, Clone)]
struct Node {
    aabb: Aabb,
    parent: Option<NodeId>,
    children: Option<[NodeId; 2]>, // None => leaf
    height: i32,
    object: Option<ObjectId>,
}

impl Node {
    fn leaf(aabb: Aabb, object: ObjectId) -> Self {
        Node {
            aabb,
            parent: None,
            children: None,
            height: 0,
            object: Some(object),
        }
    }
}

/// Violations found by [`DynamicAabbTree::validate`].
#[derive(Debug, Error, PartialEq)]
pub enum TreeError {
    #[error("node {0:?} is referenced but no longer stored")]
    StaleHandle(NodeId),

    #[error("root {0:?} has a parent")]
    RootHasParent(NodeId),

    #[error("node {0:?} is reachable twice, the tree has a cycle")]
    Cycle(NodeId),

    #[error("node {child:?} points at parent {recorded:?}, expected {expected:?}")]
    ParentMismatch {
        child: NodeId,
        recorded: Option<NodeId>,
        expected: NodeId,
    },

    #[error("node {0:?} bounds are not the union of its children")]
    BoundsMismatch(NodeId),

    #[error("node {node:?} has height {recorded}, expected {expected}")]
    HeightMismatch {
        node: NodeId,
        recorded: i32,
        expected: i32,
    },

    #[error("leaf {0:?} carries no object")]
    LeafWithoutObject(NodeId),

    #[error("internal node {0:?} carries object {1}")]
    InternalWithObject(NodeId, ObjectId),

    #[error("object {0} does not map to the leaf holding it")]
    LeafMapMismatch(ObjectId),

    #[error("{leaves} leaves in the tree but {mapped} mapped objects")]
    LeafCountMismatch { leaves: usize, mapped: usize },

    #[error("{reachable} nodes reachable from the root but {stored} stored")]
    OrphanedNodes { reachable: usize, stored: usize },
}

/// Dynamic bounding volume tree over object ids.
///
/// Leaves hold one object id and its (usually inflated) box. Internal nodes
/// always have two children, a box equal to the union of theirs and a height
/// of `1 + max(child heights)`. The tree is kept AVL-balanced by rotations,
/// so sibling heights never differ by more than one, even right after a leaf
/// is paired with a tall subtree.
#[derive(Debug, Default, Clone)]
pub struct DynamicAabbTree {
    nodes: SlotMap<NodeId, Node>,
    root: Option<NodeId>,
    leaves: HashMap<ObjectId, NodeId>,
    strategy: SiblingStrategy,
}

impl DynamicAabbTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(strategy: SiblingStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    pub fn strategy(&self) -> SiblingStrategy {
        self.strategy
    }

    /// Adds `id` as a new leaf. Panics if `id` is already in the tree.
    pub fn insert(&mut self, aabb: Aabb, id: ObjectId) -> NodeId {
        assert!(
            !self.leaves.contains_key(&id),
            "object {id} is already in the tree"
        );

        let leaf = self.allocate_node(Node::leaf(aabb, id));
        self.leaves.insert(id, leaf);
        self.insert_leaf(leaf);
        leaf
    }

    /// Removes the leaf of `id`. Panics if `id` is not in the tree.
    pub fn remove(&mut self, id: ObjectId) {
        let Some(leaf) = self.leaves.remove(&id) else {
            panic!("object {id} is not in the tree");
        };

        self.remove_leaf(leaf);
        self.nodes.remove(leaf);
    }

    /// Moves the leaf of `id` only if `tight` escaped its stored box, in which
    /// case the leaf is re-inserted with `tight.inflated(inflate_scale)`.
    /// Returns whether the leaf was re-inserted.
    pub fn refit(&mut self, id: ObjectId, tight: Aabb, inflate_scale: f32) -> bool {
        let Some(&leaf) = self.leaves.get(&id) else {
            panic!("object {id} is not in the tree");
        };

        if self.nodes[leaf].aabb.contains(&tight) {
            return false; // still inside the fat box, no reinsertion needed
        }

        self.remove_leaf(leaf);
        // Union guards against rounding leaving `tight` poking out of the fat box
        self.nodes[leaf].aabb = tight.inflated(inflate_scale).union(&tight);
        self.insert_leaf(leaf);
        true
    }

    /// Empties the tree. Node slots stay allocated for reuse.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.leaves.clear();
        self.root = None;
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.leaves.contains_key(&id)
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Number of live nodes, leaves and internal.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nodes the backing storage can hold before growing.
    pub fn capacity(&self) -> usize {
        self.nodes.capacity()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn root_aabb(&self) -> Option<Aabb> {
        self.root.map(|root| self.nodes[root].aabb)
    }

    /// Height of the root, 0 for a single leaf or an empty tree.
    pub fn height(&self) -> i32 {
        self.root.map_or(0, |root| self.nodes[root].height)
    }

    /// Largest height difference between two siblings anywhere in the tree.
    pub fn max_imbalance(&self) -> i32 {
        self.nodes
            .values()
            .filter_map(|node| node.children)
            .map(|[left, right]| (self.nodes[left].height - self.nodes[right].height).abs())
            .max()
            .unwrap_or(0)
    }

    pub fn object_rect(&self, id: ObjectId) -> Option<Aabb> {
        self.leaves.get(&id).map(|&leaf| self.nodes[leaf].aabb)
    }

    /// Every object with its stored box, in tree order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, Aabb)> + '_ {
        self.leaf_nodes().into_iter().filter_map(|leaf| {
            let node = &self.nodes[leaf];
            node.object.map(|id| (id, node.aabb))
        })
    }

    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.objects().map(|(id, _)| id).collect()
    }

    pub fn query<F>(&self, aabb: &Aabb, mut callback: F)
    where
        F: FnMut(ObjectId),
    {
        if let Some(root) = self.root {
            self.query_node(root, aabb, &mut callback);
        }
    }

    fn query_node<F>(&self, node_id: NodeId, aabb: &Aabb, callback: &mut F)
    where
        F: FnMut(ObjectId),
    {
        let node = &self.nodes[node_id];

        if !node.aabb.intersects(aabb) {
            return;
        }

        match (node.children, node.object) {
            (Some([left, right]), _) => {
                self.query_node(left, aabb, callback);
                self.query_node(right, aabb, callback);
            }
            (None, Some(id)) => callback(id),
            (None, None) => {}
        }
    }

    pub fn find_intersecting_leaves(&self, aabb: &Aabb) -> Vec<ObjectId> {
        let mut found = Vec::new();
        self.query(aabb, |id| found.push(id));
        found
    }

    /// Pairs of overlapping leaves between `self` and `other`.
    ///
    /// The first id of each pair comes from `self`. Every unordered pair is
    /// reported once and an id is never paired with itself, so passing the
    /// same tree as `other` yields its internal close pairs.
    pub fn find_close_pairs_with(&self, other: &DynamicAabbTree) -> Vec<(ObjectId, ObjectId)> {
        let mut seen = HashSet::new();
        let mut pairs = Vec::new();

        for (id, aabb) in self.objects() {
            other.query(&aabb, |other_id| {
                if other_id != id && seen.insert(ObjectPair::new(id, other_id)) {
                    pairs.push((id, other_id));
                }
            });
        }

        pairs
    }

    /// Objects whose boxes the segment `origin..origin + direction * length`
    /// crosses. `direction` need not be normalized.
    pub fn ray_cast(&self, origin: Vec2, direction: Vec2, length: f32) -> Vec<ObjectId> {
        let end = origin + direction.normalize_or_zero() * length;
        let mut hits = Vec::new();
        let Some(root) = self.root else {
            return hits;
        };

        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !node.aabb.crosses_segment(origin, end) {
                continue;
            }

            match (node.children, node.object) {
                (Some([left, right]), _) => {
                    stack.push(right);
                    stack.push(left);
                }
                (None, Some(id)) => hits.push(id),
                (None, None) => {}
            }
        }

        hits
    }

    /// Checks every structural invariant. Intended for tests and debugging.
    pub fn validate(&self) -> Result<(), TreeError> {
        let Some(root) = self.root else {
            if !self.nodes.is_empty() {
                return Err(TreeError::OrphanedNodes {
                    reachable: 0,
                    stored: self.nodes.len(),
                });
            }
            if !self.leaves.is_empty() {
                return Err(TreeError::LeafCountMismatch {
                    leaves: 0,
                    mapped: self.leaves.len(),
                });
            }
            return Ok(());
        };

        let root_node = self.nodes.get(root).ok_or(TreeError::StaleHandle(root))?;
        if root_node.parent.is_some() {
            return Err(TreeError::RootHasParent(root));
        }

        let mut visited = HashSet::new();
        let mut leaf_count = 0;
        let mut stack = vec![root];

        while let Some(index) = stack.pop() {
            if !visited.insert(index) {
                return Err(TreeError::Cycle(index));
            }
            let node = self.nodes.get(index).ok_or(TreeError::StaleHandle(index))?;

            let Some([left, right]) = node.children else {
                let id = node.object.ok_or(TreeError::LeafWithoutObject(index))?;
                if self.leaves.get(&id) != Some(&index) {
                    return Err(TreeError::LeafMapMismatch(id));
                }
                if node.height != 0 {
                    return Err(TreeError::HeightMismatch {
                        node: index,
                        recorded: node.height,
                        expected: 0,
                    });
                }
                leaf_count += 1;
                continue;
            };

            if let Some(id) = node.object {
                return Err(TreeError::InternalWithObject(index, id));
            }

            let left_node = self.nodes.get(left).ok_or(TreeError::StaleHandle(left))?;
            let right_node = self.nodes.get(right).ok_or(TreeError::StaleHandle(right))?;
            for (child, child_node) in [(left, left_node), (right, right_node)] {
                if child_node.parent != Some(index) {
                    return Err(TreeError::ParentMismatch {
                        child,
                        recorded: child_node.parent,
                        expected: index,
                    });
                }
            }

            if node.aabb != left_node.aabb.union(&right_node.aabb) {
                return Err(TreeError::BoundsMismatch(index));
            }

            let expected = 1 + left_node.height.max(right_node.height);
            if node.height != expected {
                return Err(TreeError::HeightMismatch {
                    node: index,
                    recorded: node.height,
                    expected,
                });
            }

            stack.push(right);
            stack.push(left);
        }

        if leaf_count != self.leaves.len() {
            return Err(TreeError::LeafCountMismatch {
                leaves: leaf_count,
                mapped: self.leaves.len(),
            });
        }
        if visited.len() != self.nodes.len() {
            return Err(TreeError::OrphanedNodes {
                reachable: visited.len(),
                stored: self.nodes.len(),
            });
        }

        Ok(())
    }

    fn leaf_nodes(&self) -> Vec<NodeId> {
        let mut leaves = Vec::with_capacity(self.leaves.len());
        let Some(root) = self.root else {
            return leaves;
        };

        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            match self.nodes[index].children {
                Some([left, right]) => {
                    stack.push(right);
                    stack.push(left);
                }
                None => leaves.push(index),
            }
        }
        leaves
    }

    fn allocate_node(&mut self, node: Node) -> NodeId {
        // Free slots are reused by the slot map; grow only when none remain.
        if self.nodes.len() == self.nodes.capacity() {
            let additional = self.nodes.capacity() + 1;
            self.nodes.reserve(additional);
            log::trace!("aabb tree storage grown to {} nodes", self.nodes.capacity());
        }
        self.nodes.insert(node)
    }

    fn insert_leaf(&mut self, leaf: NodeId) {
        self.nodes[leaf].parent = None;

        let Some(root) = self.root else {
            self.root = Some(leaf);
            return;
        };

        // 1. Find best sibling
        let leaf_aabb = self.nodes[leaf].aabb;
        let sibling = match self.strategy {
            SiblingStrategy::BestFirst => self.best_first_sibling(root, &leaf_aabb),
            SiblingStrategy::Greedy => self.greedy_sibling(root, &leaf_aabb),
            SiblingStrategy::Exhaustive => self.exhaustive_sibling(root, &leaf_aabb),
        };

        // 2. Create new parent
        let old_parent = self.nodes[sibling].parent;
        let parent_node = Node {
            aabb: self.nodes[sibling].aabb.union(&leaf_aabb),
            parent: old_parent,
            children: Some([sibling, leaf]),
            height: self.nodes[sibling].height + 1,
            object: None,
        };
        let new_parent = self.allocate_node(parent_node);

        self.nodes[sibling].parent = Some(new_parent);
        self.nodes[leaf].parent = Some(new_parent);

        match old_parent {
            Some(parent) => self.replace_child(parent, sibling, new_parent),
            None => self.root = Some(new_parent),
        }

        // 3. Walk upward fixing AABBs/heights
        self.fix_upwards(new_parent);
    }

    /// Unlinks `leaf` and frees its parent. The leaf slot itself stays alive.
    fn remove_leaf(&mut self, leaf: NodeId) {
        if self.root == Some(leaf) {
            self.root = None;
            return;
        }

        let parent = self.nodes[leaf]
            .parent
            .expect("non-root leaf always has a parent");
        let grand_parent = self.nodes[parent].parent;
        let sibling = self.other_child(parent, leaf);

        self.nodes.remove(parent);
        self.nodes[leaf].parent = None;

        match grand_parent {
            Some(gp) => {
                // Replace parent with sibling in grandparent
                self.replace_child(gp, parent, sibling);
                self.nodes[sibling].parent = Some(gp);
                self.fix_upwards(gp);
            }
            None => {
                // Parent was root
                self.root = Some(sibling);
                self.nodes[sibling].parent = None;
            }
        }
    }

    fn other_child(&self, parent: NodeId, child: NodeId) -> NodeId {
        let [left, right] = self.nodes[parent]
            .children
            .expect("parent of a node is internal");
        if left == child { right } else { left }
    }

    fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) {
        let slot = self.nodes[parent]
            .children
            .as_mut()
            .and_then(|children| children.iter_mut().find(|child| **child == old));
        debug_assert!(slot.is_some(), "{old:?} is not a child of {parent:?}");
        if let Some(slot) = slot {
            *slot = new;
        }
    }

    fn update_node(&mut self, node: NodeId) {
        let Some([left, right]) = self.nodes[node].children else {
            return;
        };

        let height = 1 + self.nodes[left].height.max(self.nodes[right].height);
        let aabb = self.nodes[left].aabb.union(&self.nodes[right].aabb);
        self.nodes[node].height = height;
        self.nodes[node].aabb = aabb;
    }

    fn fix_upwards(&mut self, start: NodeId) {
        let mut current = Some(start);
        while let Some(index) = current {
            // Rotation may hand this position to another node
            let index = self.balance(index);
            self.update_node(index);
            current = self.nodes[index].parent;
        }
    }

    /// Rotates at `node` until its children's heights differ by at most one.
    /// Both children must already be balanced. Returns the node now
    /// occupying `node`'s position.
    fn balance(&mut self, node: NodeId) -> NodeId {
        let Some([left, right]) = self.nodes[node].children else {
            return node;
        };

        let balance = self.nodes[right].height - self.nodes[left].height;
        let higher = if balance > 1 {
            right
        } else if balance < -1 {
            left
        } else {
            return node;
        };

        let promoted = self.rotate_up(node, higher);
        // A leaf paired with a tall sibling leaves the demoted node leaning too
        self.balance(node);
        self.update_node(promoted);
        promoted
    }

    /// Promotes `higher` into the position of its parent `node`. The taller
    /// of `higher`'s children stays with it, the other one moves under `node`.
    fn rotate_up(&mut self, node: NodeId, higher: NodeId) -> NodeId {
        let [first, second] = self.nodes[higher]
            .children
            .expect("a child two levels taller than its sibling is internal");
        let moved = if self.nodes[first].height >= self.nodes[second].height {
            second
        } else {
            first
        };

        let parent = self.nodes[node].parent;
        self.nodes[higher].parent = parent;
        match parent {
            Some(parent) => self.replace_child(parent, node, higher),
            None => self.root = Some(higher),
        }

        self.replace_child(higher, moved, node);
        self.nodes[node].parent = Some(higher);

        self.replace_child(node, higher, moved);
        self.nodes[moved].parent = Some(node);

        // Recompute heights and AABBs, demoted node first
        self.update_node(node);
        self.update_node(higher);

        log::trace!("rotated {higher:?} above {node:?}");
        higher
    }

    fn best_first_sibling(&self, root: NodeId, leaf_aabb: &Aabb) -> NodeId {
        let leaf_area = leaf_aabb.area();
        let mut best = root;
        let mut best_cost = f32::INFINITY;

        let mut order = 0u64;
        let mut heap = BinaryHeap::new();
        heap.push(Candidate {
            lower_bound: OrderedFloat(leaf_area),
            order,
            node: root,
            inherited: 0.0,
        });

        while let Some(candidate) = heap.pop() {
            // Heap is ordered by lower bound, nothing left can win
            if candidate.lower_bound.0 >= best_cost {
                break;
            }

            let node = &self.nodes[candidate.node];
            let direct = node.aabb.union(leaf_aabb).area();
            let cost = direct + candidate.inherited;
            if cost < best_cost {
                best_cost = cost;
                best = candidate.node;
            }

            let Some(children) = node.children else {
                continue;
            };

            // Pushing the leaf below this node still grows this node's box
            let inherited = candidate.inherited + direct - node.aabb.area();
            let lower_bound = leaf_area + inherited;
            if lower_bound < best_cost {
                for child in children {
                    order += 1;
                    heap.push(Candidate {
                        lower_bound: OrderedFloat(lower_bound),
                        order,
                        node: child,
                        inherited,
                    });
                }
            }
        }

        best
    }

    fn greedy_sibling(&self, root: NodeId, leaf_aabb: &Aabb) -> NodeId {
        let mut index = root;

        while let Some([left, right]) = self.nodes[index].children {
            let area = self.nodes[index].aabb.area();
            let combined_area = self.nodes[index].aabb.union(leaf_aabb).area();

            // Cost of creating new parent here
            let cost = 2.0 * combined_area;

            // Minimum cost of pushing down
            let inheritance_cost = 2.0 * (combined_area - area);

            let cost_left = self.descend_cost(left, leaf_aabb, inheritance_cost);
            let cost_right = self.descend_cost(right, leaf_aabb, inheritance_cost);

            if cost < cost_left && cost < cost_right {
                break; // create new parent here instead of descending
            }
            index = if cost_left < cost_right { left } else { right };
        }

        index
    }

    fn descend_cost(&self, child: NodeId, leaf_aabb: &Aabb, inheritance_cost: f32) -> f32 {
        let node = &self.nodes[child];
        let union_area = node.aabb.union(leaf_aabb).area();
        match node.children {
            None => union_area + inheritance_cost,
            Some(_) => union_area - node.aabb.area() + inheritance_cost,
        }
    }

    fn exhaustive_sibling(&self, root: NodeId, leaf_aabb: &Aabb) -> NodeId {
        let mut best = root;
        let mut best_cost = f32::INFINITY;
        let mut stack = vec![(root, 0.0_f32)];

        while let Some((index, inherited)) = stack.pop() {
            let node = &self.nodes[index];
            let direct = node.aabb.union(leaf_aabb).area();
            let cost = direct + inherited;
            if cost < best_cost {
                best_cost = cost;
                best = index;
            }

            if let Some([left, right]) = node.children {
                let inherited = inherited + direct - node.aabb.area();
                stack.push((right, inherited));
                stack.push((left, inherited));
            }
        }

        best
    }
}

/// Open node of the best-first sibling search. Orders as a min-heap entry:
/// lowest bound first, earliest discovered first among equal bounds.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    lower_bound: OrderedFloat<f32>,
    order: u64,
    node: NodeId,
    inherited: f32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .lower_bound
            .cmp(&self.lower_bound)
            .then_with(|| other.order.cmp(&self.order))
    }
}
