//! The native notes database.
//!
//! Notes and folders share the `ZICCLOUDSYNCINGOBJECT` table: folders carry
//! their name in `ZTITLE2` and their parent in `ZPARENT`, notes carry their
//! title in `ZTITLE1` and their folder in `ZFOLDER`. Bodies live in
//! `ZICNOTEDATA`.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use super::NoteSource;
use crate::error::{Error, Result};
use crate::model::Note;

/// Seconds from the Unix epoch to 2001-01-01T00:00:00Z.
pub const CORE_DATA_EPOCH_OFFSET: i64 = 978_307_200;

/// Location of the database on macOS, relative to the home directory.
pub const DEFAULT_DATABASE: &str = "Library/Group Containers/group.com.apple.notes/NoteStore.sqlite";

const OBJECTS: &str = "ZICCLOUDSYNCINGOBJECT";
const NOTE_DATA: &str = "ZICNOTEDATA";

const REQUIRED: [(&str, &[&str]); 2] = [
    (
        OBJECTS,
        &[
            "Z_PK",
            "ZIDENTIFIER",
            "ZTITLE1",
            "ZTITLE2",
            "ZFOLDER",
            "ZPARENT",
            "ZCREATIONDATE3",
            "ZMODIFICATIONDATE1",
            "ZNOTEDATA",
        ],
    ),
    (NOTE_DATA, &["Z_PK", "ZDATA"]),
];

/// Present only in some database versions.
const MARKED_FOR_DELETION: &str = "ZMARKEDFORDELETION";

/// Default database path under `home`.
pub fn default_database_path(home: &Path) -> PathBuf {
    home.join(DEFAULT_DATABASE)
}

/// Convert a Core Data timestamp to UTC.
pub fn core_data_time(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let micros = ((seconds + CORE_DATA_EPOCH_OFFSET as f64) * 1_000_000.0).round();
    DateTime::from_timestamp_micros(micros as i64)
}

#[derive(Debug, Clone)]
struct Folder {
    name: String,
    parent: Option<i64>,
}

/// Notes of one folder subtree, read from a notes database opened read-only.
pub struct SqliteSource {
    conn: Connection,
    folder: String,
}

impl SqliteSource {
    /// Open `path` read-only and publish the folder named `folder`.
    pub fn open(path: &Path, folder: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        info!(path = %path.display(), "opened notes database");
        Ok(Self::from_connection(conn, folder))
    }

    pub fn from_connection(conn: Connection, folder: impl Into<String>) -> Self {
        Self {
            conn,
            folder: folder.into(),
        }
    }

    fn columns(&self, table: &str) -> Result<BTreeSet<String>> {
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({table});"))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(names)
    }

    fn folders(conn: &Connection) -> Result<BTreeMap<i64, Folder>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT Z_PK, ZTITLE2, ZPARENT FROM {OBJECTS} WHERE ZTITLE2 IS NOT NULL"
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                Folder {
                    name: row.get(1)?,
                    parent: row.get(2)?,
                },
            ))
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Lowest-keyed folder with the configured name.
    pub fn folder_id(&self) -> Result<i64> {
        Self::find_folder(&Self::folders(&self.conn)?, &self.folder)
    }

    fn find_folder(folders: &BTreeMap<i64, Folder>, name: &str) -> Result<i64> {
        folders
            .iter()
            .find(|(_, f)| f.name == name)
            .map(|(&pk, _)| pk)
            .ok_or_else(|| Error::FolderNotFound(name.to_string()))
    }
}

/// Path of every folder in the subtree under `root`, relative to it.
fn subtree_paths(folders: &BTreeMap<i64, Folder>, root: i64) -> BTreeMap<i64, Vec<String>> {
    let mut children: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    for (&pk, folder) in folders {
        if let Some(parent) = folder.parent
            && parent != pk
        {
            children.entry(parent).or_default().push(pk);
        }
    }

    let mut paths = BTreeMap::from([(root, Vec::new())]);
    let mut queue = VecDeque::from([root]);
    while let Some(pk) = queue.pop_front() {
        let base = paths.get(&pk).cloned().unwrap_or_default();
        for &child in children.get(&pk).into_iter().flatten() {
            // A cycle in the parent links would revisit a folder.
            if paths.contains_key(&child) {
                continue;
            }
            let mut path = base.clone();
            if let Some(folder) = folders.get(&child) {
                path.push(folder.name.clone());
            }
            paths.insert(child, path);
            queue.push_back(child);
        }
    }
    paths
}

impl NoteSource for SqliteSource {
    fn check_schema(&self) -> Result<()> {
        let mut missing = Vec::new();
        for (table, required) in REQUIRED {
            let columns = self.columns(table)?;
            if columns.is_empty() {
                missing.push(table.to_string());
                continue;
            }
            missing.extend(
                required
                    .iter()
                    .filter(|c| !columns.contains(**c))
                    .map(|c| format!("{table}.{c}")),
            );
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::SchemaIncompatible { missing })
        }
    }

    fn notes(&self) -> Result<Vec<Note>> {
        let tx = self.conn.unchecked_transaction()?;

        let folders = Self::folders(&tx)?;
        let root = Self::find_folder(&folders, &self.folder)?;
        let paths = subtree_paths(&folders, root);
        debug!(folder = %self.folder, subfolders = paths.len() - 1, "resolved folder tree");

        let deletion_filter = if self.columns(OBJECTS)?.contains(MARKED_FOR_DELETION) {
            format!("AND (n.{MARKED_FOR_DELETION} IS NULL OR n.{MARKED_FOR_DELETION} = 0)")
        } else {
            String::new()
        };
        let mut stmt = tx.prepare(&format!(
            "SELECT n.ZIDENTIFIER, n.ZTITLE1, n.ZFOLDER, n.ZCREATIONDATE3, n.ZMODIFICATIONDATE1, d.ZDATA
             FROM {OBJECTS} n
             LEFT JOIN {NOTE_DATA} d ON d.Z_PK = n.ZNOTEDATA
             WHERE n.ZTITLE1 IS NOT NULL AND n.ZFOLDER IS NOT NULL {deletion_filter}
             ORDER BY n.ZCREATIONDATE3, n.Z_PK"
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, Option<f64>>(4)?,
                row.get::<_, Option<Vec<u8>>>(5)?,
            ))
        })?;

        let mut notes = Vec::new();
        for row in rows {
            let (id, title, folder, created, modified, body) = row?;
            let Some(folder_path) = paths.get(&folder) else {
                continue;
            };
            let Some(id) = id else {
                debug!(title = %title, "skipping note without identifier");
                continue;
            };
            let created = created.and_then(core_data_time).unwrap_or(DateTime::UNIX_EPOCH);
            let modified = modified.and_then(core_data_time).unwrap_or(created);
            let mut note = Note::new(id, title)
                .with_created(created)
                .with_modified(modified)
                .with_folder_path(folder_path.iter().cloned());
            note.body = body;
            notes.push(note);
        }
        drop(stmt);
        tx.commit()?;

        info!(folder = %self.folder, notes = notes.len(), "read notes");
        Ok(notes)
    }
}
