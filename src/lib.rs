//! # notepress
//!
//! Publishes rich-text notes as a static site, re-rendering only what changed.
//!
//! ## Pipeline
//!
//! - [`decode`] turns a compressed note body into plain text and style runs.
//! - [`render`] turns text and runs into semantic HTML with footnotes and
//!   links between notes.
//! - [`publish`] decides which notes need rendering, keeps slugs stable
//!   across runs, and writes pages, the index, the feed and redirects.
//!
//! ## Quick Start
//!
//! ```no_run
//! use notepress::config::Config;
//! use notepress::publish::{Publisher, TemplateSet};
//! use notepress::source::SqliteSource;
//!
//! let config = Config::load(None)?;
//! let templates = TemplateSet::load(&config.template_directory)?;
//! let source = SqliteSource::open(&config.database_path()?, &config.notes_folder_name)?;
//! let report = Publisher::new(config.publish_options(), templates).run(&source)?;
//! println!("{} notes rendered", report.rendered());
//! # Ok::<(), notepress::Error>(())
//! ```

pub mod config;
pub mod decode;
pub mod error;
pub mod export;
pub mod model;
pub mod publish;
pub mod render;
pub mod source;

pub use error::{Error, Result};
pub use model::{Note, NoteId, StyleRun};
