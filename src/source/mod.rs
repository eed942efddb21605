//! Where notes come from.

pub mod sqlite;

use crate::error::Result;
use crate::model::Note;

pub use sqlite::SqliteSource;

/// A read-only store of notes.
pub trait NoteSource {
    /// Fail with [`Error::SchemaIncompatible`](crate::Error::SchemaIncompatible)
    /// if the store lacks structure that [`notes`](NoteSource::notes) reads.
    fn check_schema(&self) -> Result<()>;

    /// Every note to publish.
    fn notes(&self) -> Result<Vec<Note>>;
}

/// Notes held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    notes: Vec<Note>,
}

impl MemorySource {
    pub fn new(notes: impl IntoIterator<Item = Note>) -> Self {
        Self {
            notes: notes.into_iter().collect(),
        }
    }

    pub fn push(&mut self, note: Note) {
        self.notes.push(note);
    }

    /// Mutable access to the note with `id`, for simulating edits.
    pub fn note_mut(&mut self, id: &str) -> Option<&mut Note> {
        self.notes.iter_mut().find(|n| n.id.as_str() == id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Note> {
        let pos = self.notes.iter().position(|n| n.id.as_str() == id)?;
        Some(self.notes.remove(pos))
    }
}

impl NoteSource for MemorySource {
    fn check_schema(&self) -> Result<()> {
        Ok(())
    }

    fn notes(&self) -> Result<Vec<Note>> {
        Ok(self.notes.clone())
    }
}
