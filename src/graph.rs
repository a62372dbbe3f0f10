// 🕸️ Candidate Graph - who may be paired with whom this run
//
// Starts as the complete graph over the participant set ("anyone may meet
// anyone") and loses one edge per constraint. Vertices are kept in
// ascending id order so vertex indices are stable for a given set.

use crate::pairing::{Pair, ParticipantId, ParticipantSet};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

// ============================================================================
// EDGE ORDER
// ============================================================================

/// Order in which candidate edges are offered to the matcher.
///
/// Maximum-cardinality matchings are not unique; the order pins which one
/// is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EdgeOrder {
    /// Lowest identifier first
    #[default]
    Ascending,

    /// Edges sorted by SHA-256 of (seed, low, high)
    Seeded(u64),
}

impl EdgeOrder {
    pub fn seed(&self) -> Option<u64> {
        match self {
            EdgeOrder::Ascending => None,
            EdgeOrder::Seeded(seed) => Some(*seed),
        }
    }

    fn seeded_key(seed: u64, pair: &Pair) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(seed.to_le_bytes());
        hasher.update(pair.low().value().to_le_bytes());
        hasher.update(pair.high().value().to_le_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&hasher.finalize());
        key
    }
}

// ============================================================================
// CANDIDATE GRAPH
// ============================================================================

#[derive(Debug, Clone)]
pub struct CandidateGraph {
    vertices: Vec<ParticipantId>,
    index: BTreeMap<ParticipantId, usize>,
    adjacency: Vec<BTreeSet<usize>>,
}

impl CandidateGraph {
    /// Complete graph over `participants`
    pub fn complete(participants: &ParticipantSet) -> Self {
        let vertices: Vec<ParticipantId> = participants.iter().copied().collect();
        let index = vertices
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();

        let n = vertices.len();
        let adjacency = (0..n)
            .map(|v| (0..n).filter(|&u| u != v).collect())
            .collect();

        CandidateGraph {
            vertices,
            index,
            adjacency,
        }
    }

    /// Complete graph over `participants` minus every constrained edge
    pub fn build<'a, I>(participants: &ParticipantSet, constraints: I) -> Self
    where
        I: IntoIterator<Item = &'a Pair>,
    {
        let mut graph = CandidateGraph::complete(participants);
        for constraint in constraints {
            graph.remove_constraint(constraint);
        }
        graph
    }

    /// Remove the edge a constraint forbids.
    ///
    /// Returns false when there was nothing to remove (unknown participant,
    /// self-pair or edge already gone). That is never an error.
    pub fn remove_constraint(&mut self, constraint: &Pair) -> bool {
        let (Some(&a), Some(&b)) = (
            self.index.get(&constraint.low()),
            self.index.get(&constraint.high()),
        ) else {
            debug!(
                "Skipping constraint {}: one or more members are not participating",
                constraint
            );
            return false;
        };

        if a == b || !self.adjacency[a].contains(&b) {
            debug!("Skipping constraint {}: no such edge", constraint);
            return false;
        }

        self.adjacency[a].remove(&b);
        self.adjacency[b].remove(&a);
        true
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(BTreeSet::len).sum::<usize>() / 2
    }

    pub fn vertex(&self, index: usize) -> ParticipantId {
        self.vertices[index]
    }

    pub fn index_of(&self, id: ParticipantId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn has_edge(&self, a: ParticipantId, b: ParticipantId) -> bool {
        match (self.index_of(a), self.index_of(b)) {
            (Some(a), Some(b)) => self.adjacency[a].contains(&b),
            _ => false,
        }
    }

    pub fn degree(&self, id: ParticipantId) -> usize {
        self.index_of(id)
            .map(|i| self.adjacency[i].len())
            .unwrap_or(0)
    }

    /// Participants with no remaining candidate partner
    pub fn isolated(&self) -> Vec<ParticipantId> {
        self.adjacency
            .iter()
            .enumerate()
            .filter(|(_, neighbours)| neighbours.is_empty())
            .map(|(i, _)| self.vertices[i])
            .collect()
    }

    /// All edges as `(u, v)` vertex indices with `u < v`, in `order`
    pub fn ordered_edges(&self, order: EdgeOrder) -> Vec<(usize, usize)> {
        let mut edges: Vec<(usize, usize)> = self
            .adjacency
            .iter()
            .enumerate()
            .flat_map(|(u, neighbours)| {
                neighbours.iter().filter(move |&&v| u < v).map(move |&v| (u, v))
            })
            .collect();

        if let EdgeOrder::Seeded(seed) = order {
            edges.sort_by_cached_key(|&(u, v)| {
                let pair = Pair::new(self.vertices[u], self.vertices[v]);
                (EdgeOrder::seeded_key(seed, &pair), u, v)
            });
        }

        edges
    }
}

// ============================================================================
// TESTS
// ============================================================================
