//! The publish run.
//!
//! Stages run in a fixed order, each in its own span:
//! `check_schema`, `load_manifest`, `enumerate`, `assign_slugs`, `classify`,
//! `render`, `aggregates`, `persist`. Every fatal check happens before the
//! first write, and the manifest is written last.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::Path;

use chrono::Utc;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use tracing::{debug, info, info_span, warn};

use super::feed::{self, FeedItem};
use super::manifest::{self, LoadedManifest, MANIFEST_VERSION, Manifest, ManifestEntry};
use super::output::{OutputTree, write_atomic};
use super::redirects::{RedirectFile, RedirectRule, merge_rules};
use super::site::UrlFormatter;
use super::slug::{Slug, compute_slug};
use super::templates::{TemplateKind, Templates, Vars};
use super::{PublishOptions, PublishReport, RejectedNote, StaleOutput, Warning};
use crate::decode::{DecodeIssue, DecodedNote, decode};
use crate::error::{Error, Result, SlugCollision};
use crate::model::{Note, NoteId};
use crate::render::{FootnoteStyle, StaticLinks, escape_xml, render};
use crate::source::NoteSource;

const INDEX_PAGE: &str = "index.html";
const FEED_FILE: &str = "feed.xml";

/// SHA-256 over everything about a note that shows up in its page.
///
/// The modification time is left out so that touching a note without
/// editing it does not trigger a render.
pub fn fingerprint(note: &Note) -> String {
    fn field(hasher: &mut Sha256, bytes: &[u8]) {
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }

    let mut hasher = Sha256::new();
    field(&mut hasher, note.title.as_bytes());
    hasher.update((note.folder_path.len() as u64).to_le_bytes());
    for folder in &note.folder_path {
        field(&mut hasher, folder.as_bytes());
    }
    field(&mut hasher, note.created.to_rfc3339().as_bytes());
    match &note.body {
        Some(body) => {
            hasher.update([1]);
            field(&mut hasher, body);
        }
        None => hasher.update([0]),
    }
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    New,
    Changed,
    Moved,
    Unchanged,
}

/// A note with its slug for this run.
#[derive(Debug)]
struct Assigned<'a> {
    note: &'a Note,
    slug: Slug,
    /// Stored slug, when this run reassigns it.
    moved_from: Option<Slug>,
    fingerprint: String,
    status: Status,
}

/// Output of rendering one note.
#[derive(Debug)]
struct Rendered {
    page: String,
    snippet: String,
    content: String,
    issues: Vec<DecodeIssue>,
}

/// Publishes notes with a fixed set of options and templates.
pub struct Publisher {
    options: PublishOptions,
    templates: Box<dyn Templates>,
    output: OutputTree,
}

impl Publisher {
    pub fn new(options: PublishOptions, templates: impl Templates + 'static) -> Self {
        Self {
            output: OutputTree::new(&options.output_dir),
            options,
            templates: Box::new(templates),
        }
    }

    pub fn options(&self) -> &PublishOptions {
        &self.options
    }

    /// Run one publish pass over `source`.
    pub fn run(&self, source: &dyn NoteSource) -> Result<PublishReport> {
        let mut report = PublishReport::default();

        info_span!("check_schema").in_scope(|| source.check_schema())?;

        let loaded = info_span!("load_manifest").in_scope(|| Manifest::load(&self.options.manifest_path))?;
        let recovered = match &loaded {
            LoadedManifest::Recovered { reason } => {
                let warning = Warning::ManifestRecovered {
                    path: self.options.manifest_path.clone(),
                    reason: reason.clone(),
                };
                warn!("{warning}");
                report.warnings.push(warning);
                true
            }
            LoadedManifest::Missing => {
                info!(path = %self.options.manifest_path.display(), "no manifest, building everything");
                false
            }
            LoadedManifest::Loaded(m) => {
                debug!(entries = m.entries.len(), "manifest loaded");
                false
            }
        };
        let first_run = matches!(loaded, LoadedManifest::Missing);
        let previous = loaded.into_manifest();

        let notes = info_span!("enumerate").in_scope(|| self.enumerate(source, &mut report))?;

        let build_key = self.build_key();
        let rebuild_all = self.options.force || previous.build_key != build_key;
        if rebuild_all && !previous.entries.is_empty() {
            info!(force = self.options.force, "templates or site settings changed, rendering every note");
        }

        let mut assigned = info_span!("assign_slugs").in_scope(|| self.assign_slugs(&notes, &previous, &mut report))?;

        info_span!("classify").in_scope(|| self.classify(&mut assigned, &previous, rebuild_all, &mut report));

        let live_ids: BTreeSet<&NoteId> = notes.iter().map(|n| &n.id).collect();
        let rejected_ids: BTreeSet<NoteId> = report.rejected.iter().map(|r| r.id.clone()).collect();
        let deleted: Vec<(NoteId, ManifestEntry)> = previous
            .entries
            .iter()
            .filter(|(id, _)| !live_ids.contains(id))
            .map(|(id, e)| (id.clone(), e.clone()))
            .collect();
        for (id, entry) in &deleted {
            info!(note_id = %id, slug = %entry.slug, "note deleted");
            report.deleted.push(id.clone());
        }

        let rendered = info_span!("render").in_scope(|| self.render_changed(&assigned, &mut report))?;

        let mut next = Manifest {
            version: MANIFEST_VERSION,
            build_key,
            last_published: previous.last_published,
            entries: BTreeMap::new(),
        };
        for (id, entry) in &previous.entries {
            if rejected_ids.contains(id) {
                next.entries.insert(id.clone(), entry.clone());
            }
        }
        let mut rendered = rendered.into_iter();
        for a in &assigned {
            let entry = if a.status == Status::Unchanged {
                previous.entries.get(&a.note.id).cloned()
            } else {
                rendered.next().map(|r| ManifestEntry {
                    slug: a.slug.to_string(),
                    title: a.note.title.clone(),
                    fingerprint: a.fingerprint.clone(),
                    created: a.note.created,
                    snippet: r.snippet,
                    content: r.content,
                })
            };
            if let Some(entry) = entry {
                next.entries.insert(a.note.id.clone(), entry);
            }
        }

        info_span!("aggregates").in_scope(|| self.assemble_aggregates(&next, &assigned, &deleted, &mut report))?;

        info_span!("persist").in_scope(|| self.persist(next, &previous, recovered || first_run, &mut report))?;

        info!(
            new = report.new.len(),
            changed = report.changed.len(),
            moved = report.moved.len(),
            unchanged = report.unchanged,
            deleted = report.deleted.len(),
            rejected = report.rejected.len(),
            warnings = report.warnings.len(),
            "publish finished"
        );
        Ok(report)
    }

    /// Hash of everything besides the notes that affects rendered pages.
    fn build_key(&self) -> String {
        let site = &self.options.site;
        let templates = self.templates.fingerprint();
        let mut hasher = Sha256::new();
        for part in [
            env!("CARGO_PKG_VERSION"),
            templates.as_str(),
            site.title.as_str(),
            site.url.as_str(),
            site.description.as_str(),
        ] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Read all notes, dropping repeated identifiers, oldest first.
    fn enumerate(&self, source: &dyn NoteSource, report: &mut PublishReport) -> Result<Vec<Note>> {
        let mut notes = source.notes()?;
        let mut seen = BTreeSet::new();
        let mut duplicates = Vec::new();
        notes.retain(|note| {
            let first = seen.insert(note.id.clone());
            if !first {
                duplicates.push(note.id.clone());
            }
            first
        });
        for id in duplicates {
            let warning = Warning::DuplicateNote(id);
            warn!("{warning}");
            report.warnings.push(warning);
        }
        notes.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        info!(notes = notes.len(), "enumerated source");
        Ok(notes)
    }

    fn assign_slugs<'a>(
        &self,
        notes: &'a [Note],
        previous: &Manifest,
        report: &mut PublishReport,
    ) -> Result<Vec<Assigned<'a>>> {
        let mut assigned = Vec::with_capacity(notes.len());
        for note in notes {
            let (slug, moved_from) = match previous.entries.get(&note.id) {
                None => (compute_slug(note, &self.options.slugs), None),
                Some(entry) => match Slug::parse(&entry.slug) {
                    Ok(stored) => {
                        let reassign = self.options.reslug || entry.title != note.title;
                        let fresh = reassign.then(|| compute_slug(note, &self.options.slugs));
                        match fresh {
                            Some(fresh) if fresh != stored => (fresh, Some(stored)),
                            _ => (stored, None),
                        }
                    }
                    Err(e) => {
                        let err = Error::PathEscape {
                            id: note.id.clone(),
                            slug: entry.slug.clone(),
                        };
                        warn!(note_id = %note.id, slug = %entry.slug, reason = %e, "{err}");
                        report.rejected.push(RejectedNote {
                            id: note.id.clone(),
                            title: note.title.clone(),
                            reason: err.to_string(),
                        });
                        continue;
                    }
                },
            };
            assigned.push(Assigned {
                note,
                slug,
                moved_from,
                fingerprint: fingerprint(note),
                status: Status::New,
            });
        }

        let mut claims: BTreeMap<&Slug, Vec<&Note>> = BTreeMap::new();
        for a in &assigned {
            claims.entry(&a.slug).or_default().push(a.note);
        }
        let collisions: Vec<SlugCollision> = claims
            .into_iter()
            .filter(|(_, notes)| notes.len() > 1)
            .map(|(slug, notes)| {
                let mut notes: Vec<(NoteId, String)> =
                    notes.into_iter().map(|n| (n.id.clone(), n.title.clone())).collect();
                notes.sort();
                SlugCollision {
                    slug: slug.to_string(),
                    notes,
                }
            })
            .collect();
        if !collisions.is_empty() {
            return Err(Error::SlugCollision(collisions));
        }
        Ok(assigned)
    }

    fn classify(&self, assigned: &mut [Assigned<'_>], previous: &Manifest, rebuild_all: bool, report: &mut PublishReport) {
        for a in assigned.iter_mut() {
            let id = &a.note.id;
            a.status = match previous.entries.get(id) {
                None => Status::New,
                Some(entry) if entry.fingerprint != a.fingerprint || rebuild_all => Status::Changed,
                Some(_) if a.moved_from.is_some() => Status::Moved,
                Some(_) if !self.page_exists(a) => {
                    debug!(note_id = %id, slug = %a.slug, "page missing, rendering again");
                    Status::Changed
                }
                Some(_) => Status::Unchanged,
            };
            match a.status {
                Status::New => report.new.push(id.clone()),
                Status::Changed => report.changed.push(id.clone()),
                Status::Moved => report.moved.push(id.clone()),
                Status::Unchanged => report.unchanged += 1,
            }
            if let Some(from) = &a.moved_from {
                info!(note_id = %id, from = %from, to = %a.slug, "note moved");
                report.redirects.push(RedirectRule::new(from.as_str(), a.slug.as_str()));
            }
        }
    }

    fn page_exists(&self, a: &Assigned<'_>) -> bool {
        self.output
            .page_path(&a.note.id, &a.slug)
            .is_ok_and(|path| path.is_file())
    }

    /// Render every note that is not unchanged, in parallel, then write
    /// the pages in note order.
    fn render_changed(&self, assigned: &[Assigned<'_>], report: &mut PublishReport) -> Result<Vec<Rendered>> {
        let mut links = StaticLinks::new();
        for a in assigned {
            links.insert(a.note.id.as_str(), &a.note.title, self.options.site.path(a.slug.as_str()));
        }

        let jobs: Vec<&Assigned<'_>> = assigned.iter().filter(|a| a.status != Status::Unchanged).collect();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.jobs)
            .build()?;
        let rendered: Vec<Rendered> = pool.install(|| jobs.par_iter().map(|a| self.render_note(a, &links)).collect());
        info!(rendered = rendered.len(), "rendered notes");

        for (a, r) in jobs.iter().zip(&rendered) {
            for issue in &r.issues {
                let warning = Warning::Decode {
                    id: a.note.id.clone(),
                    title: a.note.title.clone(),
                    issue: issue.clone(),
                };
                warn!(note_id = %a.note.id, "{warning}");
                report.warnings.push(warning);
            }
            let path = self.output.page_path(&a.note.id, &a.slug)?;
            if self.output.write_if_changed(&path, r.page.as_bytes())? {
                debug!(note_id = %a.note.id, path = %path.display(), "wrote page");
                report.written.push(path);
            }
        }
        Ok(rendered)
    }

    fn render_note(&self, a: &Assigned<'_>, links: &StaticLinks) -> Rendered {
        let note = a.note;
        let decoded = match &note.body {
            Some(body) => decode(body),
            None => DecodedNote::default(),
        }
        .without_title_line(&note.title);

        let style = FootnoteStyle::for_slug(a.slug.as_str());
        let result = render(&decoded.text, &decoded.runs, links, &style);

        let site = &self.options.site;
        let vars: Vars<'_> = BTreeMap::from([
            ("title", escape_xml(&note.title).into_owned()),
            ("slug", a.slug.to_string()),
            ("url", site.absolute(a.slug.as_str())),
            ("datetime", feed::iso_datetime(&note.created)),
            ("humanDate", feed::human_date(&note.created)),
            ("content", result.body.clone()),
            ("footer", result.footer.clone()),
            ("site_title", escape_xml(&site.title).into_owned()),
            ("site_url", escape_xml(&site.url).into_owned()),
        ]);

        Rendered {
            page: self.templates.render(TemplateKind::Article, &vars),
            snippet: self.templates.render(TemplateKind::ArticleSnippet, &vars),
            content: result.html(),
            issues: decoded.issues,
        }
    }

    fn assemble_aggregates(
        &self,
        next: &Manifest,
        assigned: &[Assigned<'_>],
        deleted: &[(NoteId, ManifestEntry)],
        report: &mut PublishReport,
    ) -> Result<()> {
        let site = &self.options.site;
        let mut recent: Vec<(&NoteId, &ManifestEntry)> = next.entries.iter().collect();
        recent.sort_by(|(a_id, a), (b_id, b)| b.created.cmp(&a.created).then_with(|| a_id.cmp(b_id)));
        recent.truncate(self.options.feed_limit);

        let site_vars = || -> Vars<'static> {
            BTreeMap::from([
                ("site_title", escape_xml(&site.title).into_owned()),
                ("site_url", escape_xml(&site.url).into_owned()),
                ("site_description", escape_xml(&site.description).into_owned()),
            ])
        };

        let mut index_vars = site_vars();
        let articles: Vec<&str> = recent.iter().map(|(_, e)| e.snippet.as_str()).collect();
        index_vars.insert("articles", articles.join("\n"));
        let index = self.templates.render(TemplateKind::Index, &index_vars);
        self.write_aggregate(INDEX_PAGE, &index, report)?;

        let links: Vec<String> = recent.iter().map(|(_, e)| site.absolute(&e.slug)).collect();
        let items: Vec<FeedItem<'_>> = recent
            .iter()
            .zip(&links)
            .map(|((_, e), link)| FeedItem {
                title: &e.title,
                link,
                published: e.created,
                content: &e.content,
            })
            .collect();
        let mut feed_vars = site_vars();
        feed_vars.insert("items", feed::feed_items(&items));
        let feed = self.templates.render(TemplateKind::Feed, &feed_vars);
        if let Err(e) = feed::check_well_formed(&feed) {
            let warning = Warning::MalformedFeed(e.to_string());
            warn!("{warning}");
            report.warnings.push(warning);
        }
        self.write_aggregate(FEED_FILE, &feed, report)?;

        let live: BTreeSet<String> = assigned.iter().map(|a| a.slug.to_string()).collect();
        if self.options.stale_output == StaleOutput::Remove {
            let stale = assigned
                .iter()
                .filter_map(|a| a.moved_from.as_ref().map(|from| (&a.note.id, from.clone())))
                .chain(
                    deleted
                        .iter()
                        .filter_map(|(id, e)| Slug::parse(&e.slug).ok().map(|s| (id, s))),
                );
            for (id, slug) in stale {
                if live.contains(slug.as_str()) {
                    continue;
                }
                let path = self.output.page_path(id, &slug)?;
                if self.output.remove(&path)? {
                    info!(note_id = %id, path = %path.display(), "removed stale page");
                    report.removed.push(path);
                }
            }
        }

        let new_rules = report.redirects.clone();
        self.update_redirects(&new_rules, &live, report)
    }

    fn write_aggregate(&self, name: &str, contents: &str, report: &mut PublishReport) -> Result<()> {
        let path = self.output.root().join(name);
        if self.output.write_if_changed(&path, contents.as_bytes())? {
            debug!(path = %path.display(), "wrote aggregate");
            report.written.push(path);
        }
        Ok(())
    }

    fn update_redirects(&self, new: &[RedirectRule], live: &BTreeSet<String>, report: &mut PublishReport) -> Result<()> {
        let path = &self.options.redirects_path;
        let existing = read_optional(path)?;
        let mut file = RedirectFile::parse(existing.as_deref().unwrap_or_default());
        let rules = merge_rules(file.rules(), new, live);
        file.set_rules(rules);
        let rendered = file.render();

        let unchanged = match &existing {
            Some(old) => *old == rendered,
            None => rendered.is_empty(),
        };
        if !unchanged {
            write_atomic(path, rendered.as_bytes())?;
            info!(path = %path.display(), rules = file.rules().len(), "updated redirects");
            report.written.push(path.clone());
        }
        Ok(())
    }

    fn persist(&self, mut next: Manifest, previous: &Manifest, must_write: bool, report: &mut PublishReport) -> Result<()> {
        if !must_write && next == *previous {
            debug!("nothing changed, manifest left as is");
            return Ok(());
        }
        let path = &self.options.manifest_path;
        let now = Utc::now();
        if report.warnings.iter().any(|w| matches!(w, Warning::ManifestRecovered { .. })) {
            match manifest::back_up_corrupt(path, now) {
                Ok(backup) => {
                    info!(backup = %backup.display(), "backed up unusable manifest");
                    report.manifest_backup = Some(backup);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        next.last_published = Some(now);
        next.save(path)?;
        info!(path = %path.display(), entries = next.entries.len(), "manifest written");
        report.manifest_written = true;
        Ok(())
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_fingerprint_ignores_modification_time() {
        let note = Note::new("1", "T").with_body(vec![1, 2, 3]);
        let touched = note.clone().with_modified(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(fingerprint(&note), fingerprint(&touched));
        assert_eq!(fingerprint(&note).len(), 64);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let base = Note::new("1", "T").with_body(vec![1, 2, 3]);
        let variants = [
            Note::new("1", "T2").with_body(vec![1, 2, 3]),
            Note::new("1", "T").with_body(vec![1, 2, 4]),
            Note::new("1", "T"),
            base.clone().with_folder_path(["a"]),
            base.clone().with_created(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
        ];
        for v in &variants {
            assert_ne!(fingerprint(&base), fingerprint(v), "{v:?}");
        }
    }

    #[test]
    fn test_fingerprint_fields_do_not_run_together() {
        let a = Note::new("1", "ab").with_folder_path(["c"]);
        let b = Note::new("1", "a").with_folder_path(["bc"]);
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
