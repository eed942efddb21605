//! Error types for notepress operations.
//!
//! Only run-level failures are errors. Problems confined to a single note
//! (an undecodable body, a run past the end of the text) are reported as
//! [`Warning`](crate::publish::Warning)s and never abort a publish.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::NoteId;

/// Errors that can abort a publish or export run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("notes database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("XML writing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("incompatible notes database, missing: {}", .missing.join(", "))]
    SchemaIncompatible { missing: Vec<String> },

    #[error("folder not found: {0}")]
    FolderNotFound(String),

    #[error("required template not found: {}", .0.display())]
    MissingTemplate(PathBuf),

    #[error("{}", SlugCollisions(.0))]
    SlugCollision(Vec<SlugCollision>),

    #[error("output path for note {id} escapes the output root: {slug:?}")]
    PathEscape { id: NoteId, slug: String },

    #[error("could not start render workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Two or more distinct notes whose slugs coincide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlugCollision {
    pub slug: String,
    /// `(identifier, title)` of every note claiming the slug, ordered by identifier.
    pub notes: Vec<(NoteId, String)>,
}

impl fmt::Display for SlugCollision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slug `{}` claimed by", self.slug)?;
        for (i, (id, title)) in self.notes.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{id} ({title:?})")?;
        }
        Ok(())
    }
}

struct SlugCollisions<'a>(&'a [SlugCollision]);

impl fmt::Display for SlugCollisions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slug collision")?;
        if self.0.len() > 1 {
            write!(f, "s")?;
        }
        for collision in self.0 {
            write!(f, "; {collision}")?;
        }
        Ok(())
    }
}
