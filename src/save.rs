//! Durable story sessions: one JSON file per save id under the save
//! directory. Writes to the same id are serialized through a per-id lock;
//! a failed save or load never disturbs the in-memory session.

use std::collections::HashMap;
use std::fs::{File, create_dir_all, read_dir};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use log::warn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::compactor::CompactionState;
use crate::error::SaveError;
use crate::parser::StorySegment;
use crate::turn::Transcript;

pub const SAVE_DIR: &str = "./data/save";

/// How much of the narrative the load menu shows per save.
const PREVIEW_CHARS: usize = 120;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SaveRecord {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
    pub transcript: Transcript,
    pub segment: StorySegment,
    #[serde(default)]
    pub compaction: CompactionState,
}

/// Listing entry for a load menu: metadata plus previews, no transcript.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SaveSummary {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
    pub narrative_preview: String,
    pub choices_preview: Vec<String>,
}

impl From<&SaveRecord> for SaveSummary {
    fn from(record: &SaveRecord) -> Self {
        let mut preview: String = record.segment.narrative.chars().take(PREVIEW_CHARS).collect();
        if record.segment.narrative.chars().count() > PREVIEW_CHARS {
            preview.push('…');
        }
        SaveSummary {
            id: record.id,
            title: record.title.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            narrative_preview: preview,
            choices_preview: record.segment.choices.clone(),
        }
    }
}

pub struct SaveManager {
    save_dir: PathBuf,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl Default for SaveManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SaveManager {
    pub fn new() -> Self {
        Self::with_dir(SAVE_DIR)
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        SaveManager {
            save_dir: dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn parse_id(raw: &str) -> Result<Uuid, SaveError> {
        Uuid::parse_str(raw.trim()).map_err(|_| SaveError::InvalidId(raw.to_string()))
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.save_dir.join(format!("{id}.json"))
    }

    fn lock_for(&self, id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(id).or_default().clone()
    }

    /// Creates or updates the record's file in place.
    pub fn write(&self, record: &SaveRecord) -> Result<(), SaveError> {
        let lock = self.lock_for(record.id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        create_dir_all(&self.save_dir)?;
        let serialized = serde_json::to_string_pretty(record)?;
        std::fs::write(self.path_for(record.id), serialized)?;
        Ok(())
    }

    pub fn read(&self, id: Uuid) -> Result<SaveRecord, SaveError> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(SaveError::NotFound(id));
        }
        let file = File::open(path)?;
        let record: SaveRecord = serde_json::from_reader(file)?;
        Ok(record)
    }

    /// Every readable save, newest first. Corrupt files are skipped with a
    /// warning rather than failing the whole listing.
    pub fn list(&self) -> Vec<SaveSummary> {
        let Ok(entries) = read_dir(&self.save_dir) else {
            return Vec::new();
        };

        let mut summaries: Vec<SaveSummary> = entries
            .filter_map(|entry| {
                let path = entry.ok()?.path();
                if path.extension()? != "json" {
                    return None;
                }
                let file = File::open(&path).ok()?;
                match serde_json::from_reader::<_, SaveRecord>(file) {
                    Ok(record) => Some(SaveSummary::from(&record)),
                    Err(e) => {
                        warn!("skipping unreadable save {}: {e}", path.display());
                        None
                    }
                }
            })
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }
}
