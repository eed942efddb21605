//! Incremental publishing.
//!
//! A [`Publisher`] takes the notes of a [`NoteSource`](crate::source::NoteSource),
//! works out which of them need rendering by comparing against the
//! [`Manifest`](manifest::Manifest) of the previous run, and writes pages,
//! the index, the feed and redirect rules below the output directory.

mod engine;
pub mod feed;
pub mod manifest;
pub mod output;
pub mod redirects;
pub mod site;
pub mod slug;
pub mod templates;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decode::DecodeIssue;
use crate::model::NoteId;

pub use engine::{Publisher, fingerprint};
pub use redirects::RedirectRule;
pub use site::{Site, UrlFormatter};
pub use slug::{Slug, SlugOptions};
pub use templates::{TemplateKind, TemplateSet, Templates};

/// Default number of notes on the index and in the feed.
pub const DEFAULT_FEED_LIMIT: usize = 30;

/// Name of the redirect file inside the output directory.
pub const REDIRECTS_FILE: &str = "_redirects";

/// What happens to pages left behind by moved or deleted notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaleOutput {
    #[default]
    Keep,
    Remove,
}

/// Settings for one publish run.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub output_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub redirects_path: PathBuf,
    pub site: Site,
    pub feed_limit: usize,
    pub slugs: SlugOptions,
    pub stale_output: StaleOutput,
    /// Recompute every slug, moving notes whose slug changes.
    pub reslug: bool,
    /// Render every note even if nothing changed.
    pub force: bool,
    /// Render workers; 0 picks one per CPU.
    pub jobs: usize,
}

impl PublishOptions {
    pub fn new(output_dir: impl Into<PathBuf>, manifest_path: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        Self {
            redirects_path: output_dir.join(REDIRECTS_FILE),
            output_dir,
            manifest_path: manifest_path.into(),
            site: Site::default(),
            feed_limit: DEFAULT_FEED_LIMIT,
            slugs: SlugOptions::default(),
            stale_output: StaleOutput::default(),
            reslug: false,
            force: false,
            jobs: 0,
        }
    }
}

/// A problem that did not stop the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Warning {
    #[error("note {id} ({title:?}) published as plain text: {issue}")]
    Decode {
        id: NoteId,
        title: String,
        issue: DecodeIssue,
    },

    #[error("manifest {} is unusable ({reason}); rebuilding everything", .path.display())]
    ManifestRecovered { path: PathBuf, reason: String },

    #[error("note {0} listed more than once; keeping the first")]
    DuplicateNote(NoteId),

    #[error("feed is not well-formed XML: {0}")]
    MalformedFeed(String),
}

/// A note left out of this run; its previous output and manifest entry are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedNote {
    pub id: NoteId,
    pub title: String,
    pub reason: String,
}

/// What a run did.
#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    pub new: Vec<NoteId>,
    pub changed: Vec<NoteId>,
    pub moved: Vec<NoteId>,
    pub unchanged: usize,
    pub deleted: Vec<NoteId>,
    pub rejected: Vec<RejectedNote>,
    pub warnings: Vec<Warning>,
    /// Rules added this run, before merging with existing ones.
    pub redirects: Vec<RedirectRule>,
    pub written: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub manifest_written: bool,
    pub manifest_backup: Option<PathBuf>,
}

impl PublishReport {
    /// Notes rendered this run.
    pub fn rendered(&self) -> usize {
        self.new.len() + self.changed.len() + self.moved.len()
    }
}
