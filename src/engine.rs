// ☕ Matching Engine - constrained maximum-cardinality pairing
//
// solve(participants, constraints):
//   1. complete graph over participants
//   2. drop every constrained edge (unknown ids are inert)
//   3. maximum-cardinality matching (blossom, general graphs)
//
// The engine is a pure function of its inputs: no I/O, no retained state.

use crate::blossom::maximum_matching;
use crate::graph::{CandidateGraph, EdgeOrder};
use crate::pairing::{Matching, Pair, ParticipantId, ParticipantSet};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

// ============================================================================
// COMPLETENESS
// ============================================================================

/// Whether a matching covers as many participants as a perfect one would.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Completeness {
    /// `floor(|P| / 2)` pairs were produced
    Complete,

    /// Fewer pairs than `floor(|P| / 2)`; constraints left someone out
    Incomplete {
        expected: usize,
        produced: usize,
        unmatched: Vec<ParticipantId>,
    },
}

impl Completeness {
    pub fn is_complete(&self) -> bool {
        matches!(self, Completeness::Complete)
    }
}

/// Compare a matching against the best size any matching could have.
///
/// An odd participant out on an odd-sized roster is still `Complete`.
pub fn assess(participants: &ParticipantSet, matching: &Matching) -> Completeness {
    let expected = participants.len() / 2;
    let produced = matching.len();

    if produced >= expected {
        Completeness::Complete
    } else {
        Completeness::Incomplete {
            expected,
            produced,
            unmatched: matching.unmatched(participants).into_iter().collect(),
        }
    }
}

// ============================================================================
// MATCHING ENGINE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MatchingEngine {
    /// Tie-break among equally large matchings (default: lowest id first)
    pub edge_order: EdgeOrder,
}

impl MatchingEngine {
    /// Create engine with ascending edge order
    pub fn new() -> Self {
        MatchingEngine {
            edge_order: EdgeOrder::Ascending,
        }
    }

    /// Create engine whose tie-break is derived from `seed`
    pub fn seeded(seed: u64) -> Self {
        MatchingEngine {
            edge_order: EdgeOrder::Seeded(seed),
        }
    }

    /// Maximum-cardinality matching of `participants` avoiding `constraints`
    pub fn solve<'a, I>(&self, participants: &ParticipantSet, constraints: I) -> Matching
    where
        I: IntoIterator<Item = &'a Pair>,
    {
        let graph = CandidateGraph::build(participants, constraints);
        self.solve_graph(&graph)
    }

    /// Maximum-cardinality matching over an already built candidate graph
    pub fn solve_graph(&self, graph: &CandidateGraph) -> Matching {
        let started = Instant::now();
        let edges = graph.ordered_edges(self.edge_order);

        debug!(
            "Solving matching: {} participants, {} candidate edges, order {:?}",
            graph.vertex_count(),
            edges.len(),
            self.edge_order
        );

        let mate = maximum_matching(graph.vertex_count(), &edges);

        let mut matching = Matching::new();
        for (v, partner) in mate.iter().enumerate() {
            let Some(u) = *partner else { continue };
            if v < u {
                let pair = Pair::new(graph.vertex(v), graph.vertex(u));
                // mate is symmetric, so each vertex is inserted once
                if let Err(e) = matching.insert(pair) {
                    warn!("Dropping inconsistent pair {}: {}", pair, e);
                }
            }
        }

        let isolated = graph.isolated();
        if !isolated.is_empty() {
            debug!("Participants with no valid partner: {:?}", isolated);
        }

        debug!(
            "Matched {} pairs in {:?}",
            matching.len(),
            started.elapsed()
        );

        matching
    }

    /// Solve and assess in one call, warning when the matching is incomplete
    pub fn solve_and_assess<'a, I>(
        &self,
        participants: &ParticipantSet,
        constraints: I,
    ) -> (Matching, Completeness)
    where
        I: IntoIterator<Item = &'a Pair>,
    {
        let matching = self.solve(participants, constraints);
        let completeness = assess(participants, &matching);

        if let Completeness::Incomplete {
            expected,
            produced,
            unmatched,
        } = &completeness
        {
            warn!(
                "Incomplete matching: {} of {} pairs, unmatched {:?}",
                produced, expected, unmatched
            );
        }

        (matching, completeness)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairing::ConstraintSet;

    fn set(ids: &[u64]) -> ParticipantSet {
        ids.iter().copied().map(ParticipantId).collect()
    }

    fn constraints(pairs: &[(u64, u64)]) -> ConstraintSet {
        pairs.iter().copied().map(Pair::from).collect()
    }

    fn assert_valid(matching: &Matching, participants: &ParticipantSet, forbidden: &ConstraintSet) {
        let mut seen = ParticipantSet::new();
        for pair in matching {
            assert!(participants.contains(&pair.low()));
            assert!(participants.contains(&pair.high()));
            assert!(!forbidden.contains(pair), "constrained pair {} was matched", pair);
            assert!(seen.insert(pair.low()));
            assert!(seen.insert(pair.high()));
        }
    }

    #[test]
    fn test_four_participants_no_constraints() {
        let engine = MatchingEngine::new();
        let participants = set(&[1, 2, 3, 4]);

        let matching = engine.solve(&participants, &ConstraintSet::new());

        assert_eq!(matching.len(), 2);
        assert_eq!(matching.covered(), participants);
    }

    #[test]
    fn test_ascending_tie_break_is_pinned() {
        let engine = MatchingEngine::new();
        let matching = engine.solve(&set(&[1, 2, 3, 4]), &ConstraintSet::new());

        assert!(matching.contains(&Pair::from((1, 2))));
        assert!(matching.contains(&Pair::from((3, 4))));
    }

    #[test]
    fn test_isolated_participant_left_out() {
        let engine = MatchingEngine::new();
        let participants = set(&[1, 2, 3, 4]);
        let forbidden = constraints(&[(1, 2), (1, 3), (1, 4)]);

        let (matching, completeness) = engine.solve_and_assess(&participants, &forbidden);

        assert_valid(&matching, &participants, &forbidden);
        assert_eq!(matching.len(), 1);
        assert!(!matching.is_matched(ParticipantId(1)));
        assert_eq!(
            completeness,
            Completeness::Incomplete {
                expected: 2,
                produced: 1,
                unmatched: vec![ParticipantId(1), ParticipantId(4)],
            }
        );
    }

    #[test]
    fn test_odd_roster_leaves_one_out() {
        let engine = MatchingEngine::new();
        let participants = set(&[1, 2, 3, 4, 5]);

        let (matching, completeness) = engine.solve_and_assess(&participants, &ConstraintSet::new());

        assert_eq!(matching.len(), 2);
        assert_eq!(matching.unmatched(&participants).len(), 1);
        assert!(completeness.is_complete());
    }

    #[test]
    fn test_constraints_on_absent_participants_are_inert() {
        let engine = MatchingEngine::new();
        let participants = set(&[1, 2]);
        let forbidden = constraints(&[(1, 99), (50, 60), (2, 2)]);

        let matching = engine.solve(&participants, &forbidden);

        assert_eq!(matching.to_pairs(), vec![Pair::from((1, 2))]);
    }

    #[test]
    fn test_constraints_force_perfect_alternative() {
        // Forbid the ascending choice; a perfect matching still exists
        let engine = MatchingEngine::new();
        let participants = set(&[1, 2, 3, 4, 5, 6]);
        let forbidden = constraints(&[(1, 2), (3, 4), (5, 6), (1, 3)]);

        let matching = engine.solve(&participants, &forbidden);

        assert_valid(&matching, &participants, &forbidden);
        assert_eq!(matching.len(), 3);
    }

    #[test]
    fn test_seeded_engine_is_reproducible() {
        let participants = set(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let forbidden = constraints(&[(1, 2), (3, 4)]);

        let first = MatchingEngine::seeded(7).solve(&participants, &forbidden);
        let second = MatchingEngine::seeded(7).solve(&participants, &forbidden);

        assert_eq!(first, second);
        assert_valid(&first, &participants, &forbidden);
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn test_empty_and_single_rosters() {
        let engine = MatchingEngine::new();
        assert!(engine.solve(&set(&[]), &ConstraintSet::new()).is_empty());
        assert!(engine.solve(&set(&[9]), &ConstraintSet::new()).is_empty());
        assert!(assess(&set(&[9]), &Matching::new()).is_complete());
    }
}
