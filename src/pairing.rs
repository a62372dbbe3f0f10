// 🤝 Pairing Model - Participant ids, unordered pairs and matchings
//
// A Pair is always stored normalised (low, high) so {a,b} and {b,a}
// compare, hash and sort as the same value.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// PARTICIPANT ID
// ============================================================================

/// Stable numeric identity of a participant.
///
/// Assigned once by the identity registry and never reassigned, so history
/// files written in earlier runs keep resolving to the same person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl ParticipantId {
    pub fn new(value: u64) -> Self {
        ParticipantId(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ParticipantId {
    fn from(value: u64) -> Self {
        ParticipantId(value)
    }
}

/// Participants eligible in the current run
pub type ParticipantSet = BTreeSet<ParticipantId>;

/// Pairs that must not be matched in the current run
pub type ConstraintSet = BTreeSet<Pair>;

// ============================================================================
// UNORDERED PAIR
// ============================================================================

/// Unordered pair of participants, normalised so that `low <= high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pair {
    low: ParticipantId,
    high: ParticipantId,
}

impl Pair {
    pub fn new(a: ParticipantId, b: ParticipantId) -> Self {
        if a <= b {
            Pair { low: a, high: b }
        } else {
            Pair { low: b, high: a }
        }
    }

    pub fn low(&self) -> ParticipantId {
        self.low
    }

    pub fn high(&self) -> ParticipantId {
        self.high
    }

    /// A pair of a participant with itself; never an edge of the candidate graph
    pub fn is_loop(&self) -> bool {
        self.low == self.high
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.low == id || self.high == id
    }

    /// The other member of the pair, if `id` is a member
    pub fn partner_of(&self, id: ParticipantId) -> Option<ParticipantId> {
        if self.low == id {
            Some(self.high)
        } else if self.high == id {
            Some(self.low)
        } else {
            None
        }
    }

    pub fn as_tuple(&self) -> (ParticipantId, ParticipantId) {
        (self.low, self.high)
    }
}

impl From<(ParticipantId, ParticipantId)> for Pair {
    fn from((a, b): (ParticipantId, ParticipantId)) -> Self {
        Pair::new(a, b)
    }
}

impl From<(u64, u64)> for Pair {
    fn from((a, b): (u64, u64)) -> Self {
        Pair::new(ParticipantId(a), ParticipantId(b))
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {}}}", self.low, self.high)
    }
}

// ============================================================================
// MATCHING
// ============================================================================

/// A set of vertex-disjoint pairs.
///
/// Every participant appears in at most one pair; the constructors enforce it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matching {
    pairs: BTreeSet<Pair>,
}

impl Matching {
    pub fn new() -> Self {
        Matching::default()
    }

    /// Build a matching from raw pairs, rejecting self-pairs and any
    /// participant that shows up twice.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Pair>,
    {
        let mut matching = Matching::new();
        for pair in pairs {
            matching.insert(pair.into())?;
        }
        Ok(matching)
    }

    /// Add a pair, keeping the matching invariant
    pub fn insert(&mut self, pair: Pair) -> Result<()> {
        if pair.is_loop() {
            return Err(Error::DuplicateParticipant(pair.low()));
        }
        for member in [pair.low(), pair.high()] {
            if self.is_matched(member) {
                return Err(Error::DuplicateParticipant(member));
            }
        }
        self.pairs.insert(pair);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pair> {
        self.pairs.iter()
    }

    pub fn contains(&self, pair: &Pair) -> bool {
        self.pairs.contains(pair)
    }

    pub fn is_matched(&self, id: ParticipantId) -> bool {
        self.pairs.iter().any(|p| p.contains(id))
    }

    pub fn partner_of(&self, id: ParticipantId) -> Option<ParticipantId> {
        self.pairs.iter().find_map(|p| p.partner_of(id))
    }

    /// Every participant that is part of some pair
    pub fn covered(&self) -> ParticipantSet {
        self.pairs
            .iter()
            .flat_map(|p| [p.low(), p.high()])
            .collect()
    }

    /// Participants of `participants` left without a partner
    pub fn unmatched(&self, participants: &ParticipantSet) -> ParticipantSet {
        let covered = self.covered();
        participants.difference(&covered).copied().collect()
    }

    pub fn to_pairs(&self) -> Vec<Pair> {
        self.pairs.iter().copied().collect()
    }
}

impl<'a> IntoIterator for &'a Matching {
    type Item = &'a Pair;
    type IntoIter = std::collections::btree_set::Iter<'a, Pair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn id(v: u64) -> ParticipantId {
        ParticipantId(v)
    }

    #[test]
    fn test_pair_is_order_independent() {
        assert_eq!(Pair::new(id(3), id(1)), Pair::new(id(1), id(3)));
        assert_eq!(Pair::new(id(3), id(1)).low(), id(1));
        assert_eq!(Pair::new(id(3), id(1)).high(), id(3));
    }

    #[test]
    fn test_pair_partner() {
        let pair = Pair::new(id(4), id(7));
        assert_eq!(pair.partner_of(id(4)), Some(id(7)));
        assert_eq!(pair.partner_of(id(7)), Some(id(4)));
        assert_eq!(pair.partner_of(id(5)), None);
    }

    #[test]
    fn test_matching_rejects_reused_participant() {
        let result = Matching::from_pairs(vec![(1u64, 2u64), (2, 3)]);
        assert!(matches!(result, Err(Error::DuplicateParticipant(p)) if p == id(2)));
    }

    #[test]
    fn test_matching_rejects_self_pair() {
        let result = Matching::from_pairs(vec![(5u64, 5u64)]);
        assert!(matches!(result, Err(Error::DuplicateParticipant(_))));
    }

    #[test]
    fn test_matching_unmatched() {
        let matching = Matching::from_pairs(vec![(1u64, 2u64)]).unwrap();
        let participants: ParticipantSet = [1, 2, 3].into_iter().map(ParticipantId).collect();

        assert_eq!(matching.len(), 1);
        assert_eq!(matching.partner_of(id(2)), Some(id(1)));
        assert_eq!(matching.unmatched(&participants), [id(3)].into_iter().collect());
    }

    #[test]
    fn test_matching_serializes_as_pairs() {
        let matching = Matching::from_pairs(vec![(2u64, 1u64)]).unwrap();
        let json = serde_json::to_string(&matching).unwrap();
        assert_eq!(json, r#"{"pairs":[{"low":1,"high":2}]}"#);
    }
}
