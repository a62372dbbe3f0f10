// 🗓️ Pairing Session - one round of coffee chats, end to end
//
// load_data -> (parity) -> run_matchmaking -> sanity_check -> finalize
//
// Glue between names on disk and the pure id-based engine. The session owns
// the identity registry for the duration of the run and flushes it through
// its RegistryStore whenever new names are assigned.

use crate::config::Config;
use crate::engine::MatchingEngine;
use crate::error::Result;
use crate::history::{consolidate, HistoryRecord};
use crate::pairing::{ConstraintSet, Pair, ParticipantSet};
use crate::registry::{IdentityRegistry, RegistryStore};
use crate::records::{read_pairings_dir, read_participants, write_pairings, NamePair, NamedPairings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

// ============================================================================
// SESSION DATA
// ============================================================================

#[derive(Debug, Clone)]
pub struct LoadedData {
    pub participant_names: Vec<String>,

    /// Every pair from every pairing file; none of them may be repeated
    pub constraint_names: Vec<NamePair>,

    /// Pairing files that count as past rounds (constraint-only files excluded)
    pub history: Vec<NamedPairings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatedNamePairing {
    pub names: NamePair,
    pub sources: Vec<String>,
}

/// Outcome of checking a generated round
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanityReport {
    /// Participants without a partner, in roster order
    pub unpaired: Vec<String>,

    /// Pairings that already happened in an earlier round
    pub repeats: Vec<RepeatedNamePairing>,
}

impl SanityReport {
    pub fn is_ok(&self) -> bool {
        self.unpaired.is_empty() && self.repeats.is_empty()
    }
}

/// Engine to use for the n-th attempt of a round.
///
/// Without a configured seed the first attempt uses the ascending
/// tie-break; every retry gets a different seed so it can land on a
/// different matching.
pub fn engine_for_attempt(seed: Option<u64>, attempt: u64) -> MatchingEngine {
    match (seed, attempt) {
        (None, 0) => MatchingEngine::new(),
        (None, n) => MatchingEngine::seeded(n),
        (Some(seed), n) => MatchingEngine::seeded(seed.wrapping_add(n)),
    }
}

// ============================================================================
// PAIRING SESSION
// ============================================================================

pub struct PairingSession {
    config: Config,
    store: Box<dyn RegistryStore>,
    registry: IdentityRegistry,
    results_path: PathBuf,
}

impl PairingSession {
    /// Open a session writing to `results_filename` inside the pairings
    /// directory (`.csv` is appended when missing).
    pub fn new(config: Config, store: Box<dyn RegistryStore>, results_filename: &str) -> Result<Self> {
        let registry = store.load()?;
        debug!("Loaded registry with {} participants", registry.len());

        let mut file_name = results_filename.to_string();
        if !file_name.to_lowercase().ends_with(".csv") {
            file_name.push_str(".csv");
        }
        let results_path = config.pairings_dir.join(file_name);

        Ok(PairingSession {
            config,
            store,
            registry,
            results_path,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub fn results_path(&self) -> &Path {
        &self.results_path
    }

    /// Label of this round in history reports
    pub fn results_label(&self) -> String {
        self.results_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.results_path.display().to_string())
    }

    pub fn results_exist(&self) -> bool {
        self.results_path.exists()
    }

    /// Register names not seen before and persist the registry if it grew
    fn register<I, S>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let before = self.registry.len();
        self.registry.assign_ids(names);
        if self.registry.len() > before {
            self.store.save(&self.registry)?;
        }
        Ok(())
    }

    /// Read the roster and every pairing file, and give all names an id
    pub fn load_data(&mut self, participants_file: &Path) -> Result<LoadedData> {
        info!("Loading participants from {}", participants_file.display());
        let participant_names = read_participants(participants_file)?;

        let pairings_dir = self.config.pairings_dir.clone();
        info!("Loading constraints from directory {}", pairings_dir.display());
        let files = if pairings_dir.is_dir() {
            read_pairings_dir(&pairings_dir)?
        } else {
            warn!(
                "Pairings directory {} does not exist, no constraints loaded",
                pairings_dir.display()
            );
            Vec::new()
        };

        let constraint_names: Vec<NamePair> = files
            .iter()
            .flat_map(|file| file.pairs.iter().cloned())
            .collect();

        let history: Vec<NamedPairings> = files
            .into_iter()
            .filter(|file| {
                let constraints_only = self.config.is_constraints_file(&file.source);
                if constraints_only {
                    debug!("Skipping \"{}\" file during history check", file.source);
                }
                !constraints_only
            })
            .collect();

        info!("Generating IDs for participants and constraints");
        let all_names: Vec<&str> = participant_names
            .iter()
            .map(String::as_str)
            .chain(constraint_names.iter().flat_map(|(a, b)| [a.as_str(), b.as_str()]))
            .collect();
        self.register(all_names)?;

        Ok(LoadedData {
            participant_names,
            constraint_names,
            history,
        })
    }

    /// Pair up `participants`, never repeating a pair in `constraints`
    pub fn run_matchmaking(
        &mut self,
        engine: &MatchingEngine,
        participants: &[String],
        constraints: &[NamePair],
    ) -> Result<Vec<NamePair>> {
        info!("Running matchmaking");

        // A sit-in stand-in may be new to the registry
        self.register(participants)?;

        let participant_ids: ParticipantSet = participants
            .iter()
            .map(|name| self.registry.require_id(name))
            .collect::<Result<_>>()?;

        let mut constraint_ids = ConstraintSet::new();
        for (a, b) in constraints {
            match (self.registry.id_of(a), self.registry.id_of(b)) {
                (Some(a), Some(b)) => {
                    constraint_ids.insert(Pair::new(a, b));
                }
                _ => debug!("Skipping constraint ({}, {}): unregistered name", a, b),
            }
        }

        let (matching, _) = engine.solve_and_assess(&participant_ids, &constraint_ids);

        matching
            .iter()
            .map(|pair| -> Result<NamePair> {
                let names = self.registry.resolve_names(&[pair.low(), pair.high()])?;
                Ok((names[0].clone(), names[1].clone()))
            })
            .collect()
    }

    /// Check that everyone got a partner and no pairing is a repeat
    pub fn sanity_check(
        &self,
        pair_names: &[NamePair],
        participant_names: &[String],
        history: &[NamedPairings],
    ) -> Result<SanityReport> {
        info!("Checking that everyone that is participating has been paired...");
        let paired: BTreeSet<&str> = pair_names
            .iter()
            .flat_map(|(a, b)| [a.as_str(), b.as_str()])
            .collect();

        let mut unpaired = Vec::new();
        for name in participant_names {
            if !paired.contains(name.as_str()) && !unpaired.contains(name) {
                unpaired.push(name.clone());
            }
        }

        if unpaired.is_empty() {
            info!("All participants were paired successfully!");
        } else {
            error!("Some people left unpaired: {:?}", unpaired);
        }

        info!("Checking that no pairings are repeats...");
        let mut records = Vec::with_capacity(history.len() + 1);
        for file in history {
            records.push(self.to_record(&file.source, &file.pairs)?);
        }
        records.push(self.to_record(&self.results_label(), pair_names)?);

        let mut repeats = Vec::new();
        for repeat in consolidate(&records).repeats() {
            let names = self.registry.resolve_names(&[repeat.pair.low(), repeat.pair.high()])?;
            repeats.push(RepeatedNamePairing {
                names: (names[0].clone(), names[1].clone()),
                sources: repeat.sources,
            });
        }

        if repeats.is_empty() {
            info!("All pairings are new and haven't been repeated!");
        } else {
            error!("Some invalid pairings. Repeated pairings, and offending files:");
            for repeat in &repeats {
                error!("{} & {}: {:?}", repeat.names.0, repeat.names.1, repeat.sources);
            }
        }

        Ok(SanityReport { unpaired, repeats })
    }

    fn to_record(&self, source: &str, pairs: &[NamePair]) -> Result<HistoryRecord> {
        let ids = pairs
            .iter()
            .map(|(a, b)| -> Result<_> {
                Ok((self.registry.require_id(a)?, self.registry.require_id(b)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(HistoryRecord::new(source, ids))
    }

    /// Write the round to the results file
    pub fn finalize(&self, pair_names: &[NamePair]) -> Result<PathBuf> {
        write_pairings(pair_names, &self.results_path)?;
        Ok(self.results_path.clone())
    }

    /// Delete a results file written by `finalize` (discard or abort)
    pub fn discard(&self) -> Result<()> {
        if self.results_path.exists() {
            info!(
                "Deleting generated matches file at {}",
                self.results_path.display()
            );
            fs::remove_file(&self.results_path)?;
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CsvRegistryStore;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        config: Config,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let config = Config {
            pairings_dir: root.join("pairings"),
            ids_file: Some(root.join("ids").join("ids.csv")),
            ..Config::default()
        };
        fs::create_dir_all(&config.pairings_dir).unwrap();
        Fixture {
            _dir: dir,
            root,
            config,
        }
    }

    fn session(fx: &Fixture, results: &str) -> PairingSession {
        let store = Box::new(CsvRegistryStore::new(fx.config.registry_path()));
        PairingSession::new(fx.config.clone(), store, results).unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_results_filename_gets_csv_extension() {
        let fx = fixture();
        let session = session(&fx, "2024-04");
        assert_eq!(session.results_path(), fx.config.pairings_dir.join("2024-04.csv"));
        assert_eq!(session.results_label(), "2024-04.csv");
    }

    #[test]
    fn test_full_round_avoids_history() {
        let fx = fixture();
        fs::write(fx.root.join("roster.csv"), "Ann\nBo\nCy\nDee\n").unwrap();
        fs::write(fx.config.pairings_dir.join("2024-01.csv"), "Ann,Bo\nCy,Dee\n").unwrap();
        fs::write(fx.config.pairings_dir.join("CONSTRAINTS.csv"), "Ann,Cy\n").unwrap();

        let mut session = session(&fx, "2024-02");
        let data = session.load_data(&fx.root.join("roster.csv")).unwrap();

        assert_eq!(data.participant_names.len(), 4);
        assert_eq!(data.constraint_names.len(), 3);
        assert_eq!(data.history.len(), 1);

        let pairs = session
            .run_matchmaking(&MatchingEngine::new(), &data.participant_names, &data.constraint_names)
            .unwrap();

        // Only Ann-Dee / Bo-Cy is left
        assert_eq!(pairs.len(), 2);
        assert!(pairs.contains(&("Ann".to_string(), "Dee".to_string())));
        assert!(pairs.contains(&("Bo".to_string(), "Cy".to_string())));

        let report = session
            .sanity_check(&pairs, &data.participant_names, &data.history)
            .unwrap();
        assert!(report.is_ok());

        let written = session.finalize(&pairs).unwrap();
        assert!(written.exists());
        session.discard().unwrap();
        assert!(!session.results_exist());
    }

    #[test]
    fn test_repeated_roster_name_reaches_parity_step() {
        let fx = fixture();
        fs::write(fx.root.join("roster.csv"), "Ann\nBo\nCy\nCy\n").unwrap();

        let mut session = session(&fx, "2024-05");
        let data = session.load_data(&fx.root.join("roster.csv")).unwrap();
        assert_eq!(data.participant_names, names(&["Ann", "Bo", "Cy"]));

        let mut resolver_called = false;
        let mut sit_out_cy = |mut roster: Vec<String>| -> Result<Vec<String>> {
            resolver_called = true;
            roster.retain(|name| name != "Cy");
            Ok(roster)
        };
        let participants =
            crate::parity::resolve_parity(data.participant_names.clone(), &mut sit_out_cy).unwrap();
        assert!(resolver_called);

        let pairs = session
            .run_matchmaking(&MatchingEngine::new(), &participants, &data.constraint_names)
            .unwrap();
        assert_eq!(pairs, vec![("Ann".to_string(), "Bo".to_string())]);

        let report = session
            .sanity_check(&pairs, &participants, &data.history)
            .unwrap();
        assert!(report.unpaired.is_empty());
    }

    #[test]
    fn test_registry_persisted_across_sessions() {
        let fx = fixture();
        fs::write(fx.root.join("roster.csv"), "Ann\nBo\n").unwrap();

        let mut first = session(&fx, "r1");
        first.load_data(&fx.root.join("roster.csv")).unwrap();
        let ann = first.registry().id_of("Ann");

        let second = session(&fx, "r2");
        assert_eq!(second.registry().id_of("Ann"), ann);
        assert_eq!(second.registry().len(), 2);
    }

    #[test]
    fn test_sanity_check_reports_repeats_and_unpaired() {
        let fx = fixture();
        fs::write(fx.root.join("roster.csv"), "Ann\nBo\nCy\n").unwrap();
        fs::write(fx.config.pairings_dir.join("jan.csv"), "Bo,Ann\n").unwrap();

        let mut session = session(&fx, "feb");
        let data = session.load_data(&fx.root.join("roster.csv")).unwrap();

        let forced = vec![("Ann".to_string(), "Bo".to_string())];
        let report = session
            .sanity_check(&forced, &data.participant_names, &data.history)
            .unwrap();

        assert_eq!(report.unpaired, names(&["Cy"]));
        assert_eq!(report.repeats.len(), 1);
        assert_eq!(report.repeats[0].sources, vec!["jan.csv", "feb.csv"]);
        assert!(!report.is_ok());
    }

    #[test]
    fn test_stand_in_is_registered() {
        let fx = fixture();
        let mut session = session(&fx, "mar");

        let roster = names(&["Ann", "Bo", "Cy", "Host"]);
        let pairs = session
            .run_matchmaking(&MatchingEngine::new(), &roster, &[])
            .unwrap();

        assert_eq!(pairs.len(), 2);
        assert!(session.registry().id_of("Host").is_some());
    }

    #[test]
    fn test_engine_for_attempt() {
        assert_eq!(engine_for_attempt(None, 0).edge_order, crate::graph::EdgeOrder::Ascending);
        assert_eq!(engine_for_attempt(None, 3).edge_order, crate::graph::EdgeOrder::Seeded(3));
        assert_eq!(engine_for_attempt(Some(10), 2).edge_order, crate::graph::EdgeOrder::Seeded(12));
    }
}
