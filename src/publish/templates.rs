//! Page templates with `{{key}}` placeholders.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use memchr::memmem;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Variables for one template expansion.
pub type Vars<'a> = BTreeMap<&'a str, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TemplateKind {
    Article,
    ArticleSnippet,
    Index,
    Feed,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 4] = [
        TemplateKind::Article,
        TemplateKind::ArticleSnippet,
        TemplateKind::Index,
        TemplateKind::Feed,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            TemplateKind::Article => "article.html",
            TemplateKind::ArticleSnippet => "article-snippet.html",
            TemplateKind::Index => "index.html",
            TemplateKind::Feed => "feed.xml",
        }
    }
}

/// Template expansion used by the publisher.
///
/// Values are inserted verbatim; callers escape user text beforehand.
pub trait Templates: Send + Sync {
    fn render(&self, kind: TemplateKind, vars: &Vars<'_>) -> String;

    /// Changes whenever any template's output could change.
    fn fingerprint(&self) -> String;
}

/// The four templates, loaded from a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSet {
    sources: BTreeMap<TemplateKind, String>,
}

impl TemplateSet {
    /// Load every template, failing on the first one missing.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut sources = BTreeMap::new();
        for kind in TemplateKind::ALL {
            let path = dir.join(kind.file_name());
            let source = match fs::read_to_string(&path) {
                Ok(s) => s,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(Error::MissingTemplate(path));
                }
                Err(e) => return Err(e.into()),
            };
            sources.insert(kind, source);
        }
        Ok(Self { sources })
    }

    /// Build from in-memory sources, in [`TemplateKind::ALL`] order.
    pub fn from_sources(sources: [&str; 4]) -> Self {
        Self {
            sources: TemplateKind::ALL
                .into_iter()
                .zip(sources)
                .map(|(kind, s)| (kind, s.to_string()))
                .collect(),
        }
    }

    pub fn source(&self, kind: TemplateKind) -> &str {
        self.sources.get(&kind).map_or("", String::as_str)
    }
}

impl Templates for TemplateSet {
    fn render(&self, kind: TemplateKind, vars: &Vars<'_>) -> String {
        substitute(self.source(kind), vars)
    }

    fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (kind, source) in &self.sources {
            hasher.update(kind.file_name().as_bytes());
            hasher.update((source.len() as u64).to_le_bytes());
            hasher.update(source.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Replace every `{{key}}` whose key is in `vars`.
///
/// Single pass: inserted values are never scanned again. Unknown
/// placeholders are left as written.
pub fn substitute(template: &str, vars: &Vars<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = memmem::find(rest.as_bytes(), b"{{") {
        let after = &rest[open + 2..];
        let Some(close) = memmem::find(after.as_bytes(), b"}}") else {
            break;
        };
        out.push_str(&rest[..open]);
        match vars.get(&after[..close]) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[open..open + 2 + close + 2]),
        }
        rest = &after[close + 2..];
    }
    out.push_str(rest);
    out
}
