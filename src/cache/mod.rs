pub mod freshness;

use crate::error::{VoxError, VoxResult};
use crate::reference::VoiceReference;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

pub const INDEX_FILE: &str = "index.json";

/// Model id recorded for entries read out of the legacy flat index format.
/// Legacy entries carry no stored text or reference identity, so they can
/// never validate as fresh and are overwritten on the next population run.
const LEGACY_MODEL_ID: &str = "legacy";

/// One cached narration artifact and the identity it was generated from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub narration_key: String,
    /// The exact source text the audio was synthesized from.
    pub text: String,
    /// Audio file name, relative to the cache output directory.
    pub audio_file: String,
    pub model_id: String,
    /// SHA-256 digest of the reference audio used.
    pub ref_audio: String,
    /// Reference transcript content used.
    pub ref_text: String,
    pub duration_seconds: f64,
    pub created_at: DateTime<Utc>,
}

/// The persisted cache for one project: the full entry list plus lookup
/// indices by logical key and by exact text, built once at load.
#[derive(Debug, Default)]
pub struct CacheIndex {
    entries: Vec<CacheEntry>,
    by_key: HashMap<String, usize>,
    by_text: HashMap<String, usize>,
}

impl CacheIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    /// Lookup by logical key — the population worker's view.
    pub fn get_by_key(&self, key: &str) -> Option<&CacheEntry> {
        self.by_key.get(key).map(|&i| &self.entries[i])
    }

    /// Lookup by exact narration text — the render-time consumer's view,
    /// for callers that hold a literal string but not the key it came from.
    pub fn get_by_text(&self, text: &str) -> Option<&CacheEntry> {
        self.by_text.get(text).map(|&i| &self.entries[i])
    }

    /// Insert an entry, replacing any previous entry for the same key.
    pub fn upsert(&mut self, entry: CacheEntry) {
        if let Some(&i) = self.by_key.get(&entry.narration_key) {
            let old_text = self.entries[i].text.clone();
            if self.by_text.get(&old_text) == Some(&i) {
                self.by_text.remove(&old_text);
            }
            self.by_text.insert(entry.text.clone(), i);
            self.entries[i] = entry;
        } else {
            let i = self.entries.len();
            self.by_key.insert(entry.narration_key.clone(), i);
            self.by_text.insert(entry.text.clone(), i);
            self.entries.push(entry);
        }
    }

    fn from_entries(entries: Vec<CacheEntry>) -> Self {
        let mut index = Self::new();
        for entry in entries {
            index.upsert(entry);
        }
        index
    }

    /// Parse an index file in either on-disk representation: the rich record
    /// list (canonical) or the legacy flat key→filename object (read-only).
    pub fn parse(raw: &str) -> VoxResult<Self> {
        if let Ok(entries) = serde_json::from_str::<Vec<CacheEntry>>(raw) {
            return Ok(Self::from_entries(entries));
        }
        if let Ok(map) = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(raw) {
            let mut entries = Vec::with_capacity(map.len());
            for (key, value) in map {
                let file = value.as_str().ok_or_else(|| {
                    VoxError::CacheCorruption(format!(
                        "legacy index value for '{key}' is not a filename"
                    ))
                })?;
                entries.push(CacheEntry {
                    narration_key: key,
                    text: String::new(),
                    audio_file: file.to_string(),
                    model_id: LEGACY_MODEL_ID.into(),
                    ref_audio: String::new(),
                    ref_text: String::new(),
                    duration_seconds: 0.0,
                    created_at: Utc::now(),
                });
            }
            return Ok(Self::from_entries(entries));
        }
        Err(VoxError::CacheCorruption(
            "index is neither a record list nor a legacy key→filename map".into(),
        ))
    }

    /// Load the index from `<output_dir>/index.json`. Missing or corrupt
    /// files load as an empty index (corruption means "no cache", never a
    /// crash); corruption is logged so the full regeneration is explainable.
    pub fn load_or_default(output_dir: &Path) -> Self {
        match Self::load(output_dir) {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!("ignoring unusable cache index: {e}");
                Self::new()
            }
        }
    }

    /// Load the index, surfacing corruption as an error for callers (like
    /// `verify`) that want to report it rather than regenerate.
    pub fn load(output_dir: &Path) -> VoxResult<Self> {
        let path = output_dir.join(INDEX_FILE);
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(&path)?;
        Self::parse(&raw)
    }

    /// Persist the full index in one atomic step: serialize to a temp file in
    /// the same directory, then rename into place. A crash mid-save leaves
    /// the previous index intact rather than a truncated one.
    pub fn save(&self, output_dir: &Path) -> VoxResult<()> {
        std::fs::create_dir_all(output_dir)?;
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| VoxError::Other(format!("failed to serialize index: {e}")))?;

        let mut tmp = tempfile::NamedTempFile::new_in(output_dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(output_dir.join(INDEX_FILE))
            .map_err(|e| VoxError::Io(e.error))?;
        Ok(())
    }
}

/// Why an entry failed validation, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Valid,
    StaleText,
    MissingAudio,
    StaleReference,
    Legacy,
}

/// Full validity check for one entry against the current narration text and
/// voice reference. This is the unit of invalidation: a single changed
/// narration string re-generates that key only.
pub fn entry_status(
    entry: &CacheEntry,
    current_text: &str,
    reference: &VoiceReference,
    output_dir: &Path,
) -> EntryStatus {
    if entry.model_id == LEGACY_MODEL_ID {
        return EntryStatus::Legacy;
    }
    if entry.text != current_text {
        return EntryStatus::StaleText;
    }
    if entry.ref_audio != reference.audio_digest || entry.ref_text != reference.transcript {
        return EntryStatus::StaleReference;
    }
    let audio = output_dir.join(&entry.audio_file);
    let non_empty = std::fs::metadata(&audio).map(|m| m.len() > 0).unwrap_or(false);
    if !non_empty {
        return EntryStatus::MissingAudio;
    }
    EntryStatus::Valid
}

pub fn is_entry_valid(
    entry: &CacheEntry,
    current_text: &str,
    reference: &VoiceReference,
    output_dir: &Path,
) -> bool {
    entry_status(entry, current_text, reference, output_dir) == EntryStatus::Valid
}

/// Audio file name for a narration key in the configured storage format.
pub fn audio_file_name(key: &str, store_format: &str) -> String {
    format!("{key}.{store_format}")
}
