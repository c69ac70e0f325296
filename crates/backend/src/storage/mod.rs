use photomoa_shared::models::{HistoryEntry, Point};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

const ENTRIES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("entries");

/// Scale established by a two-point calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub point1: Point,
    pub point2: Point,
    pub distance_inches: f64,
    pub pixels_per_inch: f64,
}

/// Persisted state of one analyzed target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    #[serde(flatten)]
    pub entry: HistoryEntry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationRecord>,
    #[serde(default)]
    pub manual_shots: Vec<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl EntryRecord {
    pub fn pixels_per_inch(&self) -> Option<f64> {
        self.calibration.as_ref().map(|c| c.pixels_per_inch)
    }
}

pub struct Storage {
    db: Database,
}

impl Storage {
    pub fn open(path: &Path) -> Result<Arc<Self>, String> {
        let db = Database::create(path)
            .map_err(|e| format!("Failed to open database at {}: {}", path.display(), e))?;

        // Ensure table exists
        let write_txn = db.begin_write().map_err(|e| e.to_string())?;
        {
            write_txn.open_table(ENTRIES_TABLE).map_err(|e| e.to_string())?;
        }
        write_txn.commit().map_err(|e| e.to_string())?;

        Ok(Arc::new(Storage { db }))
    }

    /// Insert a new entry unless its id is already taken. The check and the
    /// insert share one write transaction, so concurrent inserts of the same
    /// id cannot overwrite each other. Returns `false` on conflict.
    pub fn insert_new(&self, record: &EntryRecord) -> Result<bool, String> {
        let json = serde_json::to_vec(record).map_err(|e| e.to_string())?;
        let id = record.entry.id.as_str();

        let write_txn = self.db.begin_write().map_err(|e| e.to_string())?;
        let inserted = {
            let mut table = write_txn.open_table(ENTRIES_TABLE).map_err(|e| e.to_string())?;
            let taken = table.get(id).map_err(|e| e.to_string())?.is_some();
            if !taken {
                table.insert(id, json.as_slice()).map_err(|e| e.to_string())?;
            }
            !taken
        };
        if inserted {
            write_txn.commit().map_err(|e| e.to_string())?;
        } else {
            write_txn.abort().map_err(|e| e.to_string())?;
        }
        Ok(inserted)
    }

    /// Read, mutate and write back one entry inside a single write transaction.
    /// Returns the updated record, or `None` if the id is unknown.
    pub fn update_entry<F>(&self, id: &str, mutate: F) -> Result<Option<EntryRecord>, String>
    where
        F: FnOnce(&mut EntryRecord),
    {
        let write_txn = self.db.begin_write().map_err(|e| e.to_string())?;
        let updated = {
            let mut table = write_txn.open_table(ENTRIES_TABLE).map_err(|e| e.to_string())?;
            let existing: Option<EntryRecord> = match table.get(id).map_err(|e| e.to_string())? {
                Some(value) => Some(serde_json::from_slice(value.value()).map_err(|e| e.to_string())?),
                None => None,
            };
            match existing {
                Some(mut record) => {
                    mutate(&mut record);
                    let json = serde_json::to_vec(&record).map_err(|e| e.to_string())?;
                    table.insert(id, json.as_slice()).map_err(|e| e.to_string())?;
                    Some(record)
                }
                None => None,
            }
        };
        if updated.is_some() {
            write_txn.commit().map_err(|e| e.to_string())?;
        } else {
            write_txn.abort().map_err(|e| e.to_string())?;
        }
        Ok(updated)
    }

    pub fn get_entry(&self, id: &str) -> Result<Option<EntryRecord>, String> {
        let read_txn = self.db.begin_read().map_err(|e| e.to_string())?;
        let table = read_txn.open_table(ENTRIES_TABLE).map_err(|e| e.to_string())?;

        match table.get(id).map_err(|e| e.to_string())? {
            Some(value) => {
                let record = serde_json::from_slice(value.value()).map_err(|e| e.to_string())?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// All entries, most recent upload first.
    pub fn list_entries(&self) -> Result<Vec<EntryRecord>, String> {
        let read_txn = self.db.begin_read().map_err(|e| e.to_string())?;
        let table = read_txn.open_table(ENTRIES_TABLE).map_err(|e| e.to_string())?;

        let mut records = Vec::new();
        for item in table.iter().map_err(|e| e.to_string())? {
            let (_, value) = item.map_err(|e| e.to_string())?;
            let record: EntryRecord =
                serde_json::from_slice(value.value()).map_err(|e| e.to_string())?;
            records.push(record);
        }
        records.sort_by(|a, b| b.entry.upload_time.cmp(&a.entry.upload_time));
        Ok(records)
    }

    /// Remove an entry and return what was stored, or `None` if unknown.
    pub fn delete_entry(&self, id: &str) -> Result<Option<EntryRecord>, String> {
        let write_txn = self.db.begin_write().map_err(|e| e.to_string())?;
        let removed = {
            let mut table = write_txn.open_table(ENTRIES_TABLE).map_err(|e| e.to_string())?;
            let removed: Option<EntryRecord> = match table.remove(id).map_err(|e| e.to_string())? {
                Some(value) => Some(serde_json::from_slice(value.value()).map_err(|e| e.to_string())?),
                None => None,
            };
            removed
        };
        write_txn.commit().map_err(|e| e.to_string())?;
        Ok(removed)
    }
}
