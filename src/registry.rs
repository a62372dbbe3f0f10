// 🪪 Identity Registry - stable name <-> ParticipantId mapping
//
// Append-only: once a name has an id it keeps it forever, so pairing files
// from earlier runs stay valid. Loaded at process start, extended by
// assign_ids, flushed back through a RegistryStore.

use crate::error::{Error, Result};
use crate::pairing::ParticipantId;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

// ============================================================================
// IDENTITY REGISTRY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityRegistry {
    names_to_ids: BTreeMap<String, ParticipantId>,
    ids_to_names: BTreeMap<ParticipantId, String>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        IdentityRegistry::default()
    }

    /// Rebuild a registry from persisted entries, rejecting anything that
    /// would break the name/id bijection.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, ParticipantId)>,
    {
        let mut registry = IdentityRegistry::new();
        for (name, id) in entries {
            if registry.names_to_ids.contains_key(&name) {
                return Err(Error::Configuration(format!(
                    "name '{}' is registered twice",
                    name
                )));
            }
            if let Some(existing) = registry.ids_to_names.get(&id) {
                return Err(Error::Configuration(format!(
                    "id {} is registered to both '{}' and '{}'",
                    id, existing, name
                )));
            }
            registry.insert(name, id);
        }
        Ok(registry)
    }

    fn insert(&mut self, name: String, id: ParticipantId) {
        self.ids_to_names.insert(id, name.clone());
        self.names_to_ids.insert(name, id);
    }

    /// Next unused identifier
    fn next_id(&self) -> ParticipantId {
        self.ids_to_names
            .keys()
            .next_back()
            .map(|last| ParticipantId(last.value() + 1))
            .unwrap_or(ParticipantId(0))
    }

    /// Ensure every name has an id and return the mapping for them.
    ///
    /// Existing names keep their id; new names get the next unused integer
    /// in the order they are given.
    pub fn assign_ids<I, S>(&mut self, names: I) -> BTreeMap<String, ParticipantId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut assigned = BTreeMap::new();
        for name in names {
            let name = name.as_ref();
            let id = match self.names_to_ids.get(name) {
                Some(id) => *id,
                None => {
                    let id = self.next_id();
                    debug!("New participant, adding name-ID pair {}: {}", name, id);
                    self.insert(name.to_string(), id);
                    id
                }
            };
            assigned.insert(name.to_string(), id);
        }
        assigned
    }

    pub fn id_of(&self, name: &str) -> Option<ParticipantId> {
        self.names_to_ids.get(name).copied()
    }

    pub fn name_of(&self, id: ParticipantId) -> Option<&str> {
        self.ids_to_names.get(&id).map(String::as_str)
    }

    /// Look up a registered name, failing on names never assigned
    pub fn require_id(&self, name: &str) -> Result<ParticipantId> {
        self.id_of(name)
            .ok_or_else(|| Error::UnknownName(name.to_string()))
    }

    /// Translate ids back to names
    pub fn resolve_names<'a, I>(&self, ids: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = &'a ParticipantId>,
    {
        ids.into_iter()
            .map(|id| {
                self.name_of(*id)
                    .map(str::to_string)
                    .ok_or(Error::UnknownId(*id))
            })
            .collect()
    }

    /// All entries in id order
    pub fn entries(&self) -> impl Iterator<Item = (&str, ParticipantId)> {
        self.ids_to_names
            .iter()
            .map(|(id, name)| (name.as_str(), *id))
    }

    pub fn len(&self) -> usize {
        self.names_to_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names_to_ids.is_empty()
    }
}

// ============================================================================
// REGISTRY STORES
// ============================================================================

/// Where the registry lives between runs
pub trait RegistryStore {
    fn load(&self) -> Result<IdentityRegistry>;
    fn save(&self, registry: &IdentityRegistry) -> Result<()>;
}

/// `name,id` rows without a header
pub struct CsvRegistryStore {
    path: PathBuf,
}

impl CsvRegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvRegistryStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RegistryStore for CsvRegistryStore {
    fn load(&self) -> Result<IdentityRegistry> {
        if !self.path.exists() {
            debug!("No registry at {}, starting empty", self.path.display());
            return Ok(IdentityRegistry::new());
        }

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)?;

        let mut entries = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result?;
            let malformed = |reason: &str| Error::MalformedRow {
                source_name: self.path.display().to_string(),
                line: line as u64 + 1,
                reason: reason.to_string(),
            };

            let name = record.get(0).map(str::trim).unwrap_or("");
            let raw_id = record.get(1).map(str::trim).unwrap_or("");
            if name.is_empty() || raw_id.is_empty() {
                return Err(malformed("expected name and id columns"));
            }
            let id: u64 = raw_id
                .parse()
                .map_err(|_| malformed("id is not a non-negative integer"))?;
            entries.push((name.to_string(), ParticipantId(id)));
        }

        IdentityRegistry::from_entries(entries)
    }

    fn save(&self, registry: &IdentityRegistry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&self.path)?;
        for (name, id) in registry.entries() {
            let id = id.to_string();
            wtr.write_record([name, id.as_str()])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_ids_in_insertion_order() {
        let mut registry = IdentityRegistry::new();
        let ids = registry.assign_ids(["Carol", "Alice", "Bob"]);

        assert_eq!(ids["Carol"], ParticipantId(0));
        assert_eq!(ids["Alice"], ParticipantId(1));
        assert_eq!(ids["Bob"], ParticipantId(2));
    }

    #[test]
    fn test_existing_names_keep_ids() {
        let mut registry = IdentityRegistry::new();
        registry.assign_ids(["Alice", "Bob"]);
        let ids = registry.assign_ids(["Dave", "Bob", "Alice"]);

        assert_eq!(ids["Alice"], ParticipantId(0));
        assert_eq!(ids["Bob"], ParticipantId(1));
        assert_eq!(ids["Dave"], ParticipantId(2));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_next_id_after_gap() {
        let mut registry = IdentityRegistry::from_entries(vec![
            ("Alice".to_string(), ParticipantId(0)),
            ("Bob".to_string(), ParticipantId(5)),
        ])
        .unwrap();

        let ids = registry.assign_ids(["Eve"]);
        assert_eq!(ids["Eve"], ParticipantId(6));
    }

    #[test]
    fn test_from_entries_rejects_duplicate_id() {
        let result = IdentityRegistry::from_entries(vec![
            ("Alice".to_string(), ParticipantId(0)),
            ("Bob".to_string(), ParticipantId(0)),
        ]);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_resolve_names() {
        let mut registry = IdentityRegistry::new();
        registry.assign_ids(["Alice", "Bob"]);

        let names = registry.resolve_names(&[ParticipantId(1), ParticipantId(0)]).unwrap();
        assert_eq!(names, vec!["Bob", "Alice"]);

        assert!(matches!(
            registry.resolve_names(&[ParticipantId(9)]),
            Err(Error::UnknownId(_))
        ));
        assert!(matches!(registry.require_id("Zed"), Err(Error::UnknownName(_))));
    }

    #[test]
    fn test_csv_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvRegistryStore::new(dir.path().join("ids").join("ids.csv"));

        assert!(store.load().unwrap().is_empty());

        let mut registry = IdentityRegistry::new();
        registry.assign_ids(["Alice", "Bob"]);
        store.save(&registry).unwrap();

        let contents = fs::read_to_string(store.path()).unwrap();
        assert_eq!(contents, "Alice,0\nBob,1\n");
        assert_eq!(store.load().unwrap(), registry);
    }

    #[test]
    fn test_csv_store_rejects_bad_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.csv");
        fs::write(&path, "Alice,zero\n").unwrap();

        let result = CsvRegistryStore::new(&path).load();
        assert!(matches!(result, Err(Error::MalformedRow { line: 1, .. })));
    }
}
