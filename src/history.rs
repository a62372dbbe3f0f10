// 🔁 History Consolidator - detect repeated pairings
//
// Folds any number of pairing records into one map:
//   unordered pair -> [source labels that contained it, in input order]
// A pair listed under two or more sources is a repeat. The consolidator
// only reports; callers decide whether to regenerate.

use crate::pairing::{Matching, Pair, ParticipantId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

// ============================================================================
// HISTORY RECORD
// ============================================================================

/// One source of past pairings (a results file, a run label)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub source: String,
    pub pairs: Vec<(ParticipantId, ParticipantId)>,
}

impl HistoryRecord {
    pub fn new(source: impl Into<String>, pairs: Vec<(ParticipantId, ParticipantId)>) -> Self {
        HistoryRecord {
            source: source.into(),
            pairs,
        }
    }

    /// Record for a freshly produced matching, e.g. the current run
    pub fn from_matching(source: impl Into<String>, matching: &Matching) -> Self {
        HistoryRecord::new(source, matching.iter().map(Pair::as_tuple).collect())
    }
}

// ============================================================================
// REPEATED PAIRING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatedPairing {
    pub pair: Pair,
    pub sources: Vec<String>,
}

// ============================================================================
// PAIRING HISTORY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingHistory {
    seen: BTreeMap<Pair, Vec<String>>,
}

impl PairingHistory {
    pub fn new() -> Self {
        PairingHistory::default()
    }

    /// Note that `source` contained `pair`
    pub fn record(&mut self, pair: Pair, source: &str) {
        let sources = self.seen.entry(pair).or_default();
        if let Some(previous) = sources.last() {
            warn!("Pairing {} was already done in {}", pair, previous);
        }
        sources.push(source.to_string());
    }

    /// Sources that contained `pair`, in the order they were supplied
    pub fn sources(&self, pair: &Pair) -> &[String] {
        self.seen.get(pair).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every pair that appears under more than one source
    pub fn repeats(&self) -> Vec<RepeatedPairing> {
        self.seen
            .iter()
            .filter(|(_, sources)| sources.len() > 1)
            .map(|(pair, sources)| RepeatedPairing {
                pair: *pair,
                sources: sources.clone(),
            })
            .collect()
    }

    /// True when no pairing has been repeated
    pub fn is_clean(&self) -> bool {
        self.seen.values().all(|sources| sources.len() <= 1)
    }

    /// Append another history's sources after this one's
    pub fn merge(mut self, other: PairingHistory) -> PairingHistory {
        for (pair, sources) in other.seen {
            self.seen.entry(pair).or_default().extend(sources);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Pair, &Vec<String>)> {
        self.seen.iter()
    }
}

/// Consolidate pairing records, normalising {a,b} and {b,a} to one key
pub fn consolidate<'a, I>(records: I) -> PairingHistory
where
    I: IntoIterator<Item = &'a HistoryRecord>,
{
    let mut history = PairingHistory::new();
    for record in records {
        for &(a, b) in &record.pairs {
            history.record(Pair::new(a, b), &record.source);
        }
    }
    history
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: &str, pairs: &[(u64, u64)]) -> HistoryRecord {
        HistoryRecord::new(
            source,
            pairs
                .iter()
                .map(|&(a, b)| (ParticipantId(a), ParticipantId(b)))
                .collect(),
        )
    }

    #[test]
    fn test_order_independent_keys() {
        let forward = consolidate(&[record("a", &[(1, 2)])]);
        let backward = consolidate(&[record("a", &[(2, 1)])]);

        assert_eq!(forward, backward);
        assert_eq!(forward.sources(&Pair::from((1, 2))), ["a".to_string()]);
    }

    #[test]
    fn test_repeat_across_months() {
        let history = consolidate(&[record("jan.csv", &[(0, 1)]), record("feb.csv", &[(1, 0)])]);

        let repeats = history.repeats();
        assert_eq!(repeats.len(), 1);
        assert_eq!(repeats[0].pair, Pair::from((0, 1)));
        assert_eq!(repeats[0].sources, vec!["jan.csv", "feb.csv"]);
        assert!(!history.is_clean());
    }

    #[test]
    fn test_sources_keep_input_order() {
        let history = consolidate(&[
            record("zeta", &[(1, 2)]),
            record("alpha", &[(2, 1)]),
            record("mid", &[(3, 4)]),
        ]);

        assert_eq!(history.sources(&Pair::from((1, 2))), ["zeta".to_string(), "alpha".to_string()]);
        assert_eq!(history.sources(&Pair::from((3, 4))), ["mid".to_string()]);
        assert!(history.sources(&Pair::from((5, 6))).is_empty());
    }

    #[test]
    fn test_current_run_included_as_source() {
        let current = Matching::from_pairs(vec![(1u64, 2u64), (3, 4)]).unwrap();
        let records = vec![
            record("jan.csv", &[(1, 3), (2, 4)]),
            HistoryRecord::from_matching("current.csv", &current),
        ];

        assert!(consolidate(&records).is_clean());
    }

    #[test]
    fn test_merge_equals_consolidating_union() {
        let first = vec![record("a", &[(1, 2), (3, 4)]), record("b", &[(2, 1)])];
        let second = vec![record("c", &[(4, 3), (5, 6)])];

        let union: Vec<HistoryRecord> = first.iter().chain(second.iter()).cloned().collect();
        let merged = consolidate(&first).merge(consolidate(&second));

        assert_eq!(consolidate(&union), merged);
        assert_eq!(merged.repeats().len(), 2);
    }

    #[test]
    fn test_empty_records() {
        let history = consolidate(&Vec::<HistoryRecord>::new());
        assert!(history.is_empty());
        assert!(history.is_clean());
    }
}
