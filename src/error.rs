//! Error types for the coffee chat pairing library

use crate::pairing::ParticipantId;
use thiserror::Error;

/// Result type for pairing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Hard failures of the pairing library.
///
/// Incomplete matchings and repeated pairings are expected run outcomes and
/// are reported through return values (`Completeness`, `PairingHistory`),
/// never through this type.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input file or configuration (wrong extension, bad TOML,
    /// inconsistent registry file)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A row that does not carry the columns its file format requires
    #[error("Malformed row in {source_name} (line {line}): {reason}")]
    MalformedRow {
        source_name: String,
        line: u64,
        reason: String,
    },

    /// The same participant appears in more than one pair of a matching
    #[error("Participant {0} appears in more than one pair")]
    DuplicateParticipant(ParticipantId),

    /// A name that was never registered with the identity registry
    #[error("Unknown participant name: {0}")]
    UnknownName(String),

    /// An id that has no name in the identity registry
    #[error("Unknown participant id: {0}")]
    UnknownId(ParticipantId),

    /// The operator or a resolver gave up on the run
    #[error("Aborted: {0}")]
    Aborted(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Registry database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration file parse error
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Report serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
