// 📄 Pairing Records - CSV rosters, pairing files and results
//
// Formats (no header rows):
//   participants.csv   one name per row, first column only
//   <anything>.csv     two names per row, one pairing/constraint per row
//   ids.csv            handled by registry::CsvRegistryStore

use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A name pair as it appears in a pairing file
pub type NamePair = (String, String);

/// All pairs read from one pairing file, labelled by file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedPairings {
    pub source: String,
    pub path: PathBuf,
    pub pairs: Vec<NamePair>,
}

pub fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

fn reader_for(path: &Path) -> Result<csv::Reader<fs::File>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    Ok(rdr)
}

/// Read this run's participant names.
///
/// The file must be a `.csv`; only the first column of each row is used.
/// A name listed more than once is kept at its first row.
pub fn read_participants(path: &Path) -> Result<Vec<String>> {
    if !is_csv(path) {
        return Err(Error::Configuration(format!(
            "participants file {} is not a csv file",
            path.display()
        )));
    }

    let mut participants = Vec::new();
    let mut seen = BTreeSet::new();
    for (line, result) in reader_for(path)?.records().enumerate() {
        let record = result?;
        match record.get(0) {
            Some(name) if !name.is_empty() => {
                if seen.insert(name.to_string()) {
                    participants.push(name.to_string());
                } else {
                    warn!(
                        "{} is listed more than once in {} (line {}), counting them once",
                        name,
                        path.display(),
                        line + 1
                    );
                }
            }
            _ => debug!("Skipping empty row in {}", path.display()),
        }
    }

    Ok(participants)
}

/// Read every pairing in a pairing file.
///
/// Non-csv files are skipped and yield no pairs. Rows need two names.
pub fn read_pairings(path: &Path) -> Result<Vec<NamePair>> {
    if !is_csv(path) {
        info!("Skip reading \"{}\" because it's not a CSV file.", path.display());
        return Ok(Vec::new());
    }

    let mut pairs = Vec::new();
    for (line, result) in reader_for(path)?.records().enumerate() {
        let record = result?;
        let first = record.get(0).unwrap_or("");
        let second = record.get(1).unwrap_or("");

        if first.is_empty() && second.is_empty() {
            continue;
        }
        if first.is_empty() || second.is_empty() {
            return Err(Error::MalformedRow {
                source_name: path.display().to_string(),
                line: line as u64 + 1,
                reason: "a pairing needs two names".to_string(),
            });
        }

        pairs.push((first.to_string(), second.to_string()));
    }

    Ok(pairs)
}

/// Read every pairing file in `dir`, in file name order
pub fn read_pairings_dir(dir: &Path) -> Result<Vec<NamedPairings>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<io::Result<Vec<_>>>()?;
    paths.retain(|path| path.is_file());
    paths.sort();

    let mut files = Vec::new();
    for path in paths {
        if !is_csv(&path) {
            info!("Skipping \"{}\" because it is not a csv file.", path.display());
            continue;
        }
        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let pairs = read_pairings(&path)?;
        debug!("Read {} pairings from {}", pairs.len(), source);
        files.push(NamedPairings { source, path, pairs });
    }

    Ok(files)
}

/// Write pairs as two-column rows, creating parent directories
pub fn write_pairings(pairs: &[NamePair], destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(destination)?;
    for (a, b) in pairs {
        wtr.write_record([a, b])?;
    }
    wtr.flush()?;

    info!("Wrote {} pairings to {}", pairs.len(), destination.display());
    Ok(())
}
