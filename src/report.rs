// 🧾 Run Report - machine-readable summary of one generated round

use crate::error::Result;
use crate::records::NamePair;
use crate::session::{RepeatedNamePairing, SanityReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub results_file: String,

    /// Tie-break seed of the accepted attempt (None = ascending order)
    pub seed: Option<u64>,
    pub attempt: u64,

    pub pairs: Vec<NamePair>,
    pub unpaired: Vec<String>,
    pub repeats: Vec<RepeatedNamePairing>,

    /// SHA-256 over the sorted, normalised pairs; equal rounds share it
    pub fingerprint: String,
}

impl RunReport {
    pub fn new(
        results_file: &str,
        seed: Option<u64>,
        attempt: u64,
        pairs: &[NamePair],
        sanity: &SanityReport,
    ) -> Self {
        RunReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            results_file: results_file.to_string(),
            seed,
            attempt,
            pairs: pairs.to_vec(),
            unpaired: sanity.unpaired.clone(),
            repeats: sanity.repeats.clone(),
            fingerprint: fingerprint(pairs),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.unpaired.is_empty() && self.repeats.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {} pairs, {} unpaired, {} repeated (fingerprint {})",
            self.results_file,
            self.pairs.len(),
            self.unpaired.len(),
            self.repeats.len(),
            self.fingerprint.get(..12).unwrap_or(&self.fingerprint)
        )
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Order-independent digest of a round's pairs
pub fn fingerprint(pairs: &[NamePair]) -> String {
    let mut normalised: Vec<(&str, &str)> = pairs
        .iter()
        .map(|(a, b)| {
            if a <= b {
                (a.as_str(), b.as_str())
            } else {
                (b.as_str(), a.as_str())
            }
        })
        .collect();
    normalised.sort();

    let mut hasher = Sha256::new();
    for (a, b) in normalised {
        hasher.update(a.as_bytes());
        hasher.update([0u8]);
        hasher.update(b.as_bytes());
        hasher.update([b'\n']);
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: &str, b: &str) -> NamePair {
        (a.to_string(), b.to_string())
    }

    #[test]
    fn test_fingerprint_ignores_order() {
        let first = vec![pair("Ann", "Bo"), pair("Cy", "Dee")];
        let second = vec![pair("Dee", "Cy"), pair("Bo", "Ann")];

        assert_eq!(fingerprint(&first), fingerprint(&second));
        assert_ne!(fingerprint(&first), fingerprint(&[pair("Ann", "Cy"), pair("Bo", "Dee")]));
        assert_eq!(fingerprint(&first).len(), 64);
    }

    #[test]
    fn test_report_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("run.json");
        let sanity = SanityReport {
            unpaired: vec!["Eve".to_string()],
            repeats: Vec::new(),
        };

        let report = RunReport::new("2024-05.csv", Some(3), 1, &[pair("Ann", "Bo")], &sanity);
        report.write_json(&path).unwrap();

        let loaded: RunReport = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.run_id, report.run_id);
        assert_eq!(loaded.seed, Some(3));
        assert!(!loaded.is_clean());
        assert!(report.summary().starts_with("2024-05.csv: 1 pairs, 1 unpaired"));
    }
}
