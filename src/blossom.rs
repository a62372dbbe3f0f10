// 🌸 Blossom Matcher - maximum-cardinality matching on general graphs
//
// Edmonds' algorithm: grow an alternating tree from each exposed vertex,
// contract odd cycles (blossoms) into their base, and flip the augmenting
// path when an exposed vertex is reached. O(V^3).
//
// Works on dense vertex indices; the engine maps them back to participants.

use std::collections::VecDeque;

const NONE: usize = usize::MAX;

/// Maximum-cardinality matching over `vertex_count` vertices.
///
/// `edges` are offered in the given order twice: once to seed a greedy
/// matching, and again as the neighbour order of the augmenting search.
/// The same input always yields the same matching.
///
/// Returns `mate[v]`, the partner of `v` or `None`.
pub fn maximum_matching(vertex_count: usize, edges: &[(usize, usize)]) -> Vec<Option<usize>> {
    let mut matcher = BlossomMatcher::new(vertex_count, edges);
    matcher.seed_greedy(edges);
    matcher.augment_all();
    matcher
        .mate
        .iter()
        .map(|&m| if m == NONE { None } else { Some(m) })
        .collect()
}

struct BlossomMatcher {
    n: usize,
    adjacency: Vec<Vec<usize>>,
    mate: Vec<usize>,

    // Per-search state
    parent: Vec<usize>,
    base: Vec<usize>,
    in_tree: Vec<bool>,
    in_blossom: Vec<bool>,
    queue: VecDeque<usize>,
}

impl BlossomMatcher {
    fn new(n: usize, edges: &[(usize, usize)]) -> Self {
        let mut adjacency = vec![Vec::new(); n];
        for &(u, v) in edges {
            if u == v || u >= n || v >= n {
                continue;
            }
            adjacency[u].push(v);
            adjacency[v].push(u);
        }

        BlossomMatcher {
            n,
            adjacency,
            mate: vec![NONE; n],
            parent: vec![NONE; n],
            base: (0..n).collect(),
            in_tree: vec![false; n],
            in_blossom: vec![false; n],
            queue: VecDeque::new(),
        }
    }

    fn seed_greedy(&mut self, edges: &[(usize, usize)]) {
        for &(u, v) in edges {
            if u != v && u < self.n && v < self.n && self.mate[u] == NONE && self.mate[v] == NONE {
                self.mate[u] = v;
                self.mate[v] = u;
            }
        }
    }

    fn augment_all(&mut self) {
        for root in 0..self.n {
            if self.mate[root] != NONE {
                continue;
            }
            if let Some(end) = self.find_augmenting_path(root) {
                self.flip_path(end);
            }
        }
    }

    /// Flip matched/unmatched edges along the tree path ending at exposed `v`
    fn flip_path(&mut self, mut v: usize) {
        while v != NONE {
            let pv = self.parent[v];
            let next = self.mate[pv];
            self.mate[v] = pv;
            self.mate[pv] = v;
            v = next;
        }
    }

    fn find_augmenting_path(&mut self, root: usize) -> Option<usize> {
        self.parent.fill(NONE);
        self.in_tree.fill(false);
        for (i, b) in self.base.iter_mut().enumerate() {
            *b = i;
        }
        self.queue.clear();

        self.in_tree[root] = true;
        self.queue.push_back(root);

        while let Some(v) = self.queue.pop_front() {
            for i in 0..self.adjacency[v].len() {
                let to = self.adjacency[v][i];

                if self.base[v] == self.base[to] || self.mate[v] == to {
                    continue;
                }

                let to_is_outer =
                    to == root || (self.mate[to] != NONE && self.parent[self.mate[to]] != NONE);

                if to_is_outer {
                    // Odd cycle: contract the blossom onto its base
                    let blossom_base = self.lowest_common_ancestor(v, to);
                    self.in_blossom.fill(false);
                    self.mark_path(v, blossom_base, to);
                    self.mark_path(to, blossom_base, v);

                    for u in 0..self.n {
                        if self.in_blossom[self.base[u]] {
                            self.base[u] = blossom_base;
                            if !self.in_tree[u] {
                                self.in_tree[u] = true;
                                self.queue.push_back(u);
                            }
                        }
                    }
                } else if self.parent[to] == NONE {
                    self.parent[to] = v;
                    if self.mate[to] == NONE {
                        return Some(to);
                    }
                    let next = self.mate[to];
                    self.in_tree[next] = true;
                    self.queue.push_back(next);
                }
            }
        }

        None
    }

    fn lowest_common_ancestor(&self, mut a: usize, mut b: usize) -> usize {
        let mut seen = vec![false; self.n];

        loop {
            a = self.base[a];
            seen[a] = true;
            if self.mate[a] == NONE {
                break;
            }
            a = self.parent[self.mate[a]];
        }

        loop {
            b = self.base[b];
            if seen[b] {
                return b;
            }
            b = self.parent[self.mate[b]];
        }
    }

    fn mark_path(&mut self, mut v: usize, blossom_base: usize, mut child: usize) {
        while self.base[v] != blossom_base {
            let m = self.mate[v];
            self.in_blossom[self.base[v]] = true;
            self.in_blossom[self.base[m]] = true;
            self.parent[v] = child;
            child = m;
            v = self.parent[m];
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn matched_pairs(mate: &[Option<usize>]) -> usize {
        mate.iter().filter(|m| m.is_some()).count() / 2
    }

    fn assert_consistent(mate: &[Option<usize>], edges: &[(usize, usize)]) {
        for (v, m) in mate.iter().enumerate() {
            if let Some(u) = m {
                assert_eq!(mate[*u], Some(v), "mate must be symmetric");
                assert!(
                    edges.contains(&(v, *u)) || edges.contains(&(*u, v)),
                    "matched pair ({}, {}) is not an edge",
                    v,
                    u
                );
            }
        }
    }

    #[test]
    fn test_empty_graph() {
        assert!(maximum_matching(0, &[]).is_empty());
        assert_eq!(maximum_matching(3, &[]), vec![None, None, None]);
    }

    #[test]
    fn test_path_requires_augmentation() {
        // Greedy takes (1,2) first and blocks; augmenting fixes it
        let edges = [(1, 2), (0, 1), (2, 3)];
        let mate = maximum_matching(4, &edges);

        assert_consistent(&mate, &edges);
        assert_eq!(matched_pairs(&mate), 2);
        assert_eq!(mate[0], Some(1));
        assert_eq!(mate[2], Some(3));
    }

    #[test]
    fn test_odd_cycle_with_stem_needs_blossom() {
        // Triangle 1-2-3 with pendant 0 on 1 and pendant 4 on 3, plus 5 on 2.
        // A perfect matching exists only by going through the blossom.
        let edges = [(2, 3), (1, 2), (1, 3), (0, 1), (3, 4), (2, 5)];
        let mate = maximum_matching(6, &edges);

        assert_consistent(&mate, &edges);
        assert_eq!(matched_pairs(&mate), 3);
    }

    #[test]
    fn test_two_triangles_joined() {
        // Two triangles joined by an edge: greedy can get stuck at 2 pairs
        let edges = [(0, 1), (3, 4), (1, 2), (0, 2), (4, 5), (3, 5), (2, 3)];
        let mate = maximum_matching(6, &edges);

        assert_consistent(&mate, &edges);
        assert_eq!(matched_pairs(&mate), 3);
    }

    #[test]
    fn test_petersen_graph_is_perfect() {
        let edges = [
            (0, 1), (1, 2), (2, 3), (3, 4), (4, 0),
            (0, 5), (1, 6), (2, 7), (3, 8), (4, 9),
            (5, 7), (7, 9), (9, 6), (6, 8), (8, 5),
        ];
        let mate = maximum_matching(10, &edges);

        assert_consistent(&mate, &edges);
        assert_eq!(matched_pairs(&mate), 5);
    }

    #[test]
    fn test_star_matches_once() {
        let edges = [(0, 1), (0, 2), (0, 3), (0, 4)];
        let mate = maximum_matching(5, &edges);

        assert_consistent(&mate, &edges);
        assert_eq!(matched_pairs(&mate), 1);
    }

    #[test]
    fn test_ignores_self_loops() {
        let edges = [(0, 0), (0, 1)];
        let mate = maximum_matching(2, &edges);
        assert_eq!(mate, vec![Some(1), Some(0)]);
    }
}
