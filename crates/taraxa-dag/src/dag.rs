//! The block-DAG graph itself: a thread-safe adjacency structure with
//! topological ordering and GHOST-path anchor selection.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use taraxa_core::Hash;

/// A labelled directed graph where edges point from parent (pivot or tip)
/// to child. Used both as the "total" DAG (pivot + tip edges) and, via
/// `PivotTree`, as the pivot-only subgraph.
pub struct Dag {
    children: RwLock<HashMap<Hash, Vec<Hash>>>,
    vertices: RwLock<HashSet<Hash>>,
    genesis: Hash,
}

impl Dag {
    pub fn new(genesis: Hash) -> Self {
        let mut vertices = HashSet::new();
        vertices.insert(genesis);
        let mut children = HashMap::new();
        children.insert(genesis, Vec::new());
        Self { children: RwLock::new(children), vertices: RwLock::new(vertices), genesis }
    }

    pub fn genesis(&self) -> &Hash {
        &self.genesis
    }

    pub fn has_vertex(&self, v: &Hash) -> bool {
        self.vertices.read().contains(v)
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.read().len()
    }

    pub fn num_edges(&self) -> usize {
        self.children.read().values().map(Vec::len).sum()
    }

    /// Add a vertex with edges from `pivot` (if any) and each of `tips`,
    /// pointing into the new vertex. Missing parents are silently skipped,
    /// matching the upstream "best effort" edge insertion — callers are
    /// expected to have already validated parent availability.
    pub fn add_vees(&self, new_vertex: Hash, pivot: Option<Hash>, tips: &[Hash]) {
        self.vertices.write().insert(new_vertex);
        self.children.write().entry(new_vertex).or_default();

        if let Some(p) = pivot {
            if self.has_vertex(&p) {
                self.children.write().entry(p).or_default().push(new_vertex);
            }
        }
        for t in tips {
            if self.has_vertex(t) {
                self.children.write().entry(*t).or_default().push(new_vertex);
            }
        }
    }

    /// Vertices with no outgoing edges (the DAG's current tips).
    pub fn get_leaves(&self) -> Vec<Hash> {
        let children = self.children.read();
        children
            .iter()
            .filter_map(|(v, cs)| if cs.is_empty() { Some(*v) } else { None })
            .collect()
    }

    /// Is `to` reachable from `from` by following child edges?
    pub fn reachable(&self, from: &Hash, to: &Hash) -> bool {
        if from == to {
            return true;
        }
        let children = self.children.read();
        let mut stack = vec![*from];
        let mut visited = HashSet::new();
        visited.insert(*from);
        while let Some(cur) = stack.pop() {
            if let Some(cs) = children.get(&cur) {
                for c in cs {
                    if c == to {
                        return true;
                    }
                    if visited.insert(*c) {
                        stack.push(*c);
                    }
                }
            }
        }
        false
    }

    /// Deterministic topological order of every vertex in `non_finalized`
    /// that can reach `anchor`, including the anchor itself. `None` if the
    /// anchor isn't present in the graph.
    pub fn compute_order(
        &self,
        anchor: &Hash,
        non_finalized: &BTreeMap<u64, Vec<Hash>>,
    ) -> Option<Vec<Hash>> {
        if !self.has_vertex(anchor) {
            return None;
        }
        let children = self.children.read();

        let mut epoch: BTreeMap<Hash, ()> = BTreeMap::new();
        epoch.insert(*anchor, ());
        for blocks in non_finalized.values() {
            for b in blocks {
                if self.reachable(b, anchor) {
                    epoch.insert(*b, ());
                }
            }
        }

        let mut visited: HashSet<Hash> = HashSet::new();
        let mut ordered: Vec<Hash> = Vec::new();

        for v in epoch.keys() {
            if visited.contains(v) {
                continue;
            }
            let mut stack: Vec<(Hash, bool)> = vec![(*v, false)];
            visited.insert(*v);
            while let Some((cur, emit)) = stack.pop() {
                if emit {
                    ordered.push(cur);
                    continue;
                }
                stack.push((cur, true));
                let mut neighbors: Vec<Hash> = Vec::new();
                if let Some(cs) = children.get(&cur) {
                    for c in cs {
                        if !epoch.contains_key(c) || visited.contains(c) {
                            continue;
                        }
                        visited.insert(*c);
                        neighbors.push(*c);
                    }
                }
                neighbors.sort();
                for n in neighbors {
                    stack.push((n, false));
                }
            }
        }
        ordered.reverse();
        Some(ordered)
    }
}

/// A pivot-only DAG (one out-edge per vertex other than via GHOST
/// weighting — still modeled with the same adjacency structure since
/// each block contributes exactly one pivot edge).
pub struct PivotTree {
    inner: Dag,
}

impl PivotTree {
    pub fn new(genesis: Hash) -> Self {
        Self { inner: Dag::new(genesis) }
    }

    pub fn add_vee(&self, new_vertex: Hash, pivot: Hash) {
        self.inner.add_vees(new_vertex, Some(pivot), &[]);
    }

    pub fn has_vertex(&self, v: &Hash) -> bool {
        self.inner.has_vertex(v)
    }

    /// GHOST path from `vertex` to a leaf: at each step, follow the child
    /// with the heaviest subtree (ties broken by smaller hash).
    pub fn get_ghost_path(&self, vertex: &Hash) -> Vec<Hash> {
        let children = self.inner.children.read();
        if !children.contains_key(vertex) {
            return Vec::new();
        }

        // post-order traversal to compute subtree weights bottom-up
        let mut post_order: Vec<Hash> = Vec::new();
        let mut stack = vec![*vertex];
        while let Some(cur) = stack.pop() {
            post_order.push(cur);
            if let Some(cs) = children.get(&cur) {
                for c in cs {
                    stack.push(*c);
                }
            }
        }
        post_order.reverse();

        let mut weight: HashMap<Hash, usize> = HashMap::new();
        for n in &post_order {
            let mut total = 0usize;
            if let Some(cs) = children.get(n) {
                for c in cs {
                    total += weight.get(c).copied().unwrap_or(0);
                }
            }
            weight.insert(*n, total + 1);
        }

        let mut path = Vec::new();
        let mut root = *vertex;
        loop {
            path.push(root);
            let mut heaviest = 0usize;
            let mut next = root;
            if let Some(cs) = children.get(&root) {
                for c in cs {
                    let w = weight.get(c).copied().unwrap_or(0);
                    if w == 0 {
                        continue;
                    }
                    if w > heaviest || (w == heaviest && *c < next) {
                        heaviest = w;
                        next = *c;
                    }
                }
            }
            if heaviest == 0 {
                break;
            }
            root = next;
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_of_fresh_genesis_is_itself() {
        let genesis = [0u8; 32];
        let dag = Dag::new(genesis);
        assert_eq!(dag.get_leaves(), vec![genesis]);
    }

    #[test]
    fn reachability_follows_child_edges() {
        let genesis = [0u8; 32];
        let a = [1u8; 32];
        let b = [2u8; 32];
        let dag = Dag::new(genesis);
        dag.add_vees(a, Some(genesis), &[]);
        dag.add_vees(b, Some(a), &[]);
        assert!(dag.reachable(&genesis, &b));
        assert!(!dag.reachable(&b, &genesis));
    }

    #[test]
    fn ghost_path_prefers_heavier_subtree() {
        let genesis = [0u8; 32];
        let a = [1u8; 32];
        let b = [2u8; 32];
        let b_child = [3u8; 32];
        let tree = PivotTree::new(genesis);
        tree.add_vee(a, genesis);
        tree.add_vee(b, genesis);
        tree.add_vee(b_child, b);
        let path = tree.get_ghost_path(&genesis);
        assert_eq!(path, vec![genesis, b, b_child]);
    }

    #[test]
    fn compute_order_includes_reachable_non_finalized() {
        let genesis = [0u8; 32];
        let a = [1u8; 32];
        let dag = Dag::new(genesis);
        dag.add_vees(a, Some(genesis), &[]);
        let mut non_finalized = BTreeMap::new();
        non_finalized.insert(1u64, vec![genesis]);
        let order = dag.compute_order(&a, &non_finalized).unwrap();
        assert_eq!(order, vec![genesis, a]);
    }
}
