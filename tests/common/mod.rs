//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use notepress::decode::testing::NoteBlobBuilder;
use notepress::publish::{PublishOptions, PublishReport, Publisher, TemplateSet};
use notepress::source::MemorySource;
use notepress::Note;

pub const TEMPLATES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/templates");

pub fn templates() -> TemplateSet {
    TemplateSet::load(Path::new(TEMPLATES_DIR)).expect("fixture templates")
}

/// Midnight UTC on the given day of January 2025.
pub fn jan(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap()
}

/// Gzip body whose first line is the title, followed by `body`.
pub fn body(title: &str, body: &str) -> Vec<u8> {
    NoteBlobBuilder::new(format!("{title}\n{body}")).fill().gzip().unwrap()
}

pub fn note(id: &str, title: &str, text: &str, day: u32) -> Note {
    Note::new(id, title)
        .with_body(body(title, text))
        .with_created(jan(day))
}

/// An output directory and manifest path in a fresh temporary directory.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn output(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn manifest(&self) -> PathBuf {
        self.dir.path().join("manifest.json")
    }

    pub fn options(&self) -> PublishOptions {
        let mut options = PublishOptions::new(self.output(), self.manifest());
        options.jobs = 2;
        options
    }

    pub fn publish(&self, source: &MemorySource) -> PublishReport {
        self.publish_with(self.options(), source)
    }

    pub fn publish_with(&self, options: PublishOptions, source: &MemorySource) -> PublishReport {
        Publisher::new(options, templates())
            .run(source)
            .expect("publish run")
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.output().join(relative)).unwrap()
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.output().join(relative).exists()
    }

    /// Every file under the temporary directory with its contents.
    pub fn snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        let mut files = BTreeMap::new();
        collect(self.dir.path(), self.dir.path(), &mut files);
        files
    }
}

fn collect(root: &Path, dir: &Path, files: &mut BTreeMap<PathBuf, Vec<u8>>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect(root, &path, files);
        } else {
            let rel = path.strip_prefix(root).unwrap().to_path_buf();
            files.insert(rel, fs::read(&path).unwrap());
        }
    }
}
