// 🗄️ SQLite Registry Store - participant ids in a WAL-mode database
//
// Same append-only contract as ids.csv: rows are only ever inserted, never
// updated or deleted. Every new registration is also logged as an event.

use crate::error::{Error, Result};
use crate::pairing::ParticipantId;
use crate::registry::{IdentityRegistry, RegistryStore};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Registration event for the audit trail
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegistrationEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub participant_id: ParticipantId,
}

impl RegistrationEvent {
    pub fn new(name: &str, participant_id: ParticipantId) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            name: name.to_string(),
            participant_id,
        }
    }
}

/// SQLite stores integers as i64; ids outside that range are rejected
fn id_to_sql(id: ParticipantId) -> Result<i64> {
    i64::try_from(id.value())
        .map_err(|_| Error::Configuration(format!("participant id {} does not fit in SQLite", id)))
}

fn id_from_sql(raw: i64) -> Result<ParticipantId> {
    u64::try_from(raw)
        .map(ParticipantId)
        .map_err(|_| Error::Configuration(format!("negative participant id {} in registry", raw)))
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS participants (
            id INTEGER PRIMARY KEY,
            name TEXT UNIQUE NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS registry_events (
            event_id TEXT PRIMARY KEY,
            timestamp TEXT NOT NULL,
            name TEXT NOT NULL,
            participant_id INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_registry_events_timestamp ON registry_events(timestamp)",
        [],
    )?;

    Ok(())
}

pub struct SqliteRegistryStore {
    conn: Connection,
}

impl SqliteRegistryStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        setup_database(&conn)?;
        Ok(SqliteRegistryStore { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SqliteRegistryStore { conn })
    }

    /// Registration events, oldest first
    pub fn events(&self) -> Result<Vec<RegistrationEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, timestamp, name, participant_id
             FROM registry_events
             ORDER BY timestamp ASC, participant_id ASC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                let timestamp_str: String = row.get(1)?;
                let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?
                    .with_timezone(&Utc);
                let id: i64 = row.get(3)?;
                Ok((row.get::<_, String>(0)?, timestamp, row.get::<_, String>(2)?, id))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(event_id, timestamp, name, id)| -> Result<RegistrationEvent> {
                Ok(RegistrationEvent {
                    event_id,
                    timestamp,
                    name,
                    participant_id: id_from_sql(id)?,
                })
            })
            .collect()
    }

    pub fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM participants", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl RegistryStore for SqliteRegistryStore {
    fn load(&self) -> Result<IdentityRegistry> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, id FROM participants ORDER BY id ASC")?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let entries = rows
            .into_iter()
            .map(|(name, id)| -> Result<(String, ParticipantId)> { Ok((name, id_from_sql(id)?)) })
            .collect::<Result<Vec<_>>>()?;

        IdentityRegistry::from_entries(entries)
    }

    fn save(&self, registry: &IdentityRegistry) -> Result<()> {
        let mut inserted = 0;

        for (name, id) in registry.entries() {
            let sql_id = id_to_sql(id)?;
            let changed = self.conn.execute(
                "INSERT OR IGNORE INTO participants (id, name) VALUES (?1, ?2)",
                params![sql_id, name],
            )?;

            if changed > 0 {
                inserted += 1;
                let event = RegistrationEvent::new(name, id);
                self.conn.execute(
                    "INSERT INTO registry_events (event_id, timestamp, name, participant_id)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        event.event_id,
                        event.timestamp.to_rfc3339(),
                        event.name,
                        sql_id,
                    ],
                )?;
            } else {
                debug!("{} already registered as {}", name, id);
            }
        }

        info!("Registry saved: {} new participants", inserted);
        Ok(())
    }
}
