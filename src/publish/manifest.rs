//! Persisted build state.
//!
//! The manifest is the only state carried from one run to the next. It is
//! loaded once, mutated in memory, and written back atomically at the end
//! of a run that changed something.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::output::write_atomic;
use crate::error::Result;
use crate::model::NoteId;

pub const MANIFEST_VERSION: u32 = 1;

/// Length of a hex SHA-256 digest.
const FINGERPRINT_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Manifest {
    pub version: u32,
    /// Hash of everything outside the notes that affects rendered pages.
    #[serde(default)]
    pub build_key: String,
    pub last_published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub entries: BTreeMap<NoteId, ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ManifestEntry {
    /// Stored as written; validated when the note is published again.
    pub slug: String,
    pub title: String,
    pub fingerprint: String,
    pub created: DateTime<Utc>,
    /// Rendered `article-snippet.html` for the index.
    pub snippet: String,
    /// Rendered body and footer for the feed.
    pub content: String,
}

/// Result of reading the manifest file.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedManifest {
    /// No manifest file yet.
    Missing,
    Loaded(Manifest),
    /// The file exists but is unusable; it must be backed up before being replaced.
    Recovered { reason: String },
}

impl LoadedManifest {
    /// The manifest to start from, empty unless one was loaded.
    pub fn into_manifest(self) -> Manifest {
        match self {
            LoadedManifest::Loaded(m) => m,
            LoadedManifest::Missing | LoadedManifest::Recovered { .. } => Manifest::default(),
        }
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            build_key: String::new(),
            last_published: None,
            entries: BTreeMap::new(),
        }
    }
}

impl Manifest {
    /// Read and validate a manifest.
    ///
    /// Only I/O failures other than a missing file are errors; a file that
    /// does not parse or validate is reported as [`LoadedManifest::Recovered`].
    pub fn load(path: &Path) -> Result<LoadedManifest> {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LoadedManifest::Missing),
            Err(e) => return Err(e.into()),
        };
        let manifest: Manifest = match serde_json::from_slice(&bytes) {
            Ok(m) => m,
            Err(e) => {
                return Ok(LoadedManifest::Recovered {
                    reason: e.to_string(),
                });
            }
        };
        match manifest.validate() {
            Ok(()) => Ok(LoadedManifest::Loaded(manifest)),
            Err(reason) => Ok(LoadedManifest::Recovered { reason }),
        }
    }

    /// Structural checks beyond what deserialization enforces.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.version != MANIFEST_VERSION {
            return Err(format!("unsupported manifest version {}", self.version));
        }
        for (id, entry) in &self.entries {
            if id.as_str().is_empty() {
                return Err("entry with empty identifier".to_string());
            }
            if entry.slug.is_empty() {
                return Err(format!("entry {id} has an empty slug"));
            }
            if entry.fingerprint.len() != FINGERPRINT_LEN
                || !entry.fingerprint.bytes().all(|b| b.is_ascii_hexdigit())
            {
                return Err(format!("entry {id} has a malformed fingerprint"));
            }
        }
        Ok(())
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Write atomically to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.to_json()?.as_bytes())?;
        Ok(())
    }
}

/// Move an unusable manifest aside so it can be inspected later.
pub fn back_up_corrupt(path: &Path, now: DateTime<Utc>) -> io::Result<PathBuf> {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".corrupt-{}", now.format("%Y%m%dT%H%M%SZ")));
    let backup = path.with_file_name(name);
    fs::rename(path, &backup)?;
    Ok(backup)
}
