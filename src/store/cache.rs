use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A completed session's transcript, kept as a local backup after the
/// session ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptBackup {
    pub session_id: String,
    pub topic: String,
    pub transcript: Vec<String>,
    pub saved_at: DateTime<Utc>,
}

/// A session this client scheduled or plans to join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledEntry {
    pub session_id: String,
    pub topic: String,
    pub code: String,
    pub time_limit: i64,
    pub created_at: DateTime<Utc>,
}

/// Client-local persistent cache: a scheduled-sessions list and a
/// transcript-backup list, stored as JSON files. Auxiliary only — never
/// read back as the source of truth for active session state.
pub struct LocalCache {
    dir: PathBuf,
}

impl LocalCache {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create cache dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn transcripts_path(&self) -> PathBuf {
        self.dir.join("session-transcripts.json")
    }

    fn scheduled_path(&self) -> PathBuf {
        self.dir.join("scheduled-sessions.json")
    }

    fn read_list<T: for<'de> Deserialize<'de>>(&self, path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn write_list<T: Serialize>(&self, path: &Path, list: &[T]) -> Result<()> {
        let raw = serde_json::to_string_pretty(list)?;
        fs::write(path, raw).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn record_transcript(&self, backup: TranscriptBackup) -> Result<()> {
        let path = self.transcripts_path();
        let mut list: Vec<TranscriptBackup> = self.read_list(&path)?;
        list.push(backup);
        self.write_list(&path, &list)
    }

    pub fn transcripts(&self) -> Result<Vec<TranscriptBackup>> {
        self.read_list(&self.transcripts_path())
    }

    pub fn remember_scheduled(&self, entry: ScheduledEntry) -> Result<()> {
        let path = self.scheduled_path();
        let mut list: Vec<ScheduledEntry> = self.read_list(&path)?;
        list.push(entry);
        self.write_list(&path, &list)
    }

    pub fn scheduled(&self) -> Result<Vec<ScheduledEntry>> {
        self.read_list(&self.scheduled_path())
    }
}
