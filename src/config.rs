//! Configuration file.
//!
//! Keys are camelCase so an existing `config.json` from the publishing
//! scripts keeps working. Every key is optional; unknown keys are rejected.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::publish::{DEFAULT_FEED_LIMIT, PublishOptions, REDIRECTS_FILE, Site, SlugOptions, StaleOutput};
use crate::source::sqlite::default_database_path;

/// Looked up in the current directory when no file is named.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    pub notes_folder_name: String,
    pub template_directory: PathBuf,
    pub output_directory: PathBuf,
    pub site_title: String,
    pub site_url: String,
    pub site_description: String,
    /// Defaults to the notes database in the user's home directory.
    pub database_path: Option<PathBuf>,
    pub manifest_path: PathBuf,
    /// Defaults to `_redirects` in the output directory.
    pub redirects_file: Option<PathBuf>,
    pub feed_limit: usize,
    pub include_folders_in_slug: bool,
    pub slug_date_prefix: bool,
    pub stale_output: StaleOutput,
    /// Defaults to the available parallelism.
    pub jobs: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        let site = Site::default();
        Self {
            notes_folder_name: "Blog".to_string(),
            template_directory: PathBuf::from("./templates"),
            output_directory: PathBuf::from("./output"),
            site_title: site.title,
            site_url: site.url,
            site_description: site.description,
            database_path: None,
            manifest_path: PathBuf::from("./notepress-manifest.json"),
            redirects_file: None,
            feed_limit: DEFAULT_FEED_LIMIT,
            include_folders_in_slug: true,
            slug_date_prefix: false,
            stale_output: StaleOutput::Keep,
            jobs: None,
        }
    }
}

impl Config {
    /// Load `path`, or `config.json` in the current directory if it exists,
    /// or the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => match fs::read_to_string(path) {
                Ok(text) => Self::parse(&text, path),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                ))),
                Err(e) => Err(e.into()),
            },
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                match fs::read_to_string(path) {
                    Ok(text) => Self::parse(&text, path),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        debug!("no config file, using defaults");
                        Ok(Self::default())
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    /// Parse JSON text; `origin` only labels errors.
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        let config: Config = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("{}: {e}", origin.display())))?;
        config.validate()?;
        debug!(path = %origin.display(), "loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.notes_folder_name.trim().is_empty() {
            return Err(Error::Config("notesFolderName is empty".into()));
        }
        if self.feed_limit == 0 {
            return Err(Error::Config("feedLimit must be at least 1".into()));
        }
        if self.jobs == Some(0) {
            return Err(Error::Config("jobs must be at least 1".into()));
        }
        if !(self.site_url.starts_with("http://") || self.site_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "siteUrl must be an http(s) URL, got {:?}",
                self.site_url
            )));
        }
        Ok(())
    }

    /// The configured database, or the default one under `$HOME`.
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        env::var_os("HOME")
            .map(|home| default_database_path(Path::new(&home)))
            .ok_or_else(|| Error::Config("databasePath is not set and HOME is unknown".into()))
    }

    pub fn jobs(&self) -> usize {
        self.jobs
            .unwrap_or_else(|| thread::available_parallelism().map_or(1, |n| n.get()))
    }

    pub fn site(&self) -> Site {
        Site::new(&self.site_title, &self.site_url, &self.site_description)
    }

    pub fn publish_options(&self) -> PublishOptions {
        let mut options = PublishOptions::new(&self.output_directory, &self.manifest_path);
        options.redirects_path = self
            .redirects_file
            .clone()
            .unwrap_or_else(|| self.output_directory.join(REDIRECTS_FILE));
        options.site = self.site();
        options.feed_limit = self.feed_limit;
        options.slugs = SlugOptions {
            include_folders: self.include_folders_in_slug,
            date_prefix: self.slug_date_prefix,
        };
        options.stale_output = self.stale_output;
        options.jobs = self.jobs();
        options
    }
}
