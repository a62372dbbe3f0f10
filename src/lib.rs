// Coffee Chat Pairing - Core Library
// Exposes all modules for use in the CLI and tests

pub mod error;
pub mod pairing;        // Participant ids, unordered pairs, matchings
pub mod graph;          // Candidate graph: complete graph minus constraints
pub mod blossom;        // Maximum-cardinality matching on general graphs
pub mod engine;         // Matching Engine: solve + completeness
pub mod history;        // History Consolidator: repeat detection
pub mod registry;       // Identity Registry: name <-> id, csv store
pub mod db;             // SQLite registry store
pub mod records;        // CSV rosters and pairing files
pub mod parity;         // Odd-roster resolution
pub mod config;
pub mod session;        // One round end to end
pub mod report;

// Re-export commonly used types
pub use error::{Error, Result};
pub use pairing::{
    ConstraintSet, Matching, Pair, ParticipantId, ParticipantSet,
};
pub use graph::{CandidateGraph, EdgeOrder};
pub use engine::{assess, Completeness, MatchingEngine};
pub use history::{consolidate, HistoryRecord, PairingHistory, RepeatedPairing};
pub use registry::{CsvRegistryStore, IdentityRegistry, RegistryStore};
pub use db::{RegistrationEvent, SqliteRegistryStore};
pub use records::{
    read_pairings, read_pairings_dir, read_participants, write_pairings,
    NamePair, NamedPairings,
};
pub use parity::{resolve_parity, DropParticipant, ParityResolver, SitIn};
pub use config::{Config, ParityConfig, ParityMode, RegistryBackend};
pub use session::{
    engine_for_attempt, LoadedData, PairingSession, RepeatedNamePairing, SanityReport,
};
pub use report::{fingerprint, RunReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
