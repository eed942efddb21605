//! Managed redirect section.
//!
//! Redirect rules live between two marker lines in a file that may also hold
//! hand-written content. Only the marked section is ever rewritten.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::debug;

pub const BEGIN_MARKER: &str = "# BEGIN notepress redirects";
pub const END_MARKER: &str = "# END notepress redirects";

const STATUS: &str = "301";

/// A permanent redirect from one slug to another.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RedirectRule {
    pub from: String,
    pub to: String,
}

impl RedirectRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    fn parse_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let from = page_slug(parts.next()?)?;
        let to = page_slug(parts.next()?)?;
        match (parts.next(), parts.next()) {
            (None, None) | (Some(STATUS), None) => Some(Self::new(from, to)),
            _ => None,
        }
    }
}

impl fmt::Display for RedirectRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}.html /{}.html {STATUS}", self.from, self.to)
    }
}

fn page_slug(path: &str) -> Option<&str> {
    path.strip_prefix('/')?
        .strip_suffix(".html")
        .filter(|s| !s.is_empty())
}

/// A redirect file split around its managed section.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RedirectFile {
    before: String,
    rules: Vec<RedirectRule>,
    after: String,
}

impl RedirectFile {
    /// Split `content` around the managed section.
    ///
    /// A begin marker without an end marker extends the section to the end
    /// of the file. Lines in the section that are not rules are dropped.
    pub fn parse(content: &str) -> Self {
        let Some(begin) = find_line(content, 0, BEGIN_MARKER) else {
            return Self {
                before: content.to_string(),
                ..Self::default()
            };
        };
        let body_start = line_end(content, begin);
        let (body_end, after_start) = match find_line(content, body_start, END_MARKER) {
            Some(end) => (end, line_end(content, end)),
            None => (content.len(), content.len()),
        };

        let rules = content[body_start..body_end]
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter_map(|l| {
                let rule = RedirectRule::parse_line(l);
                if rule.is_none() {
                    debug!(line = l, "dropping unrecognized redirect line");
                }
                rule
            })
            .collect();

        Self {
            before: content[..begin].to_string(),
            rules,
            after: content[after_start..].to_string(),
        }
    }

    pub fn rules(&self) -> &[RedirectRule] {
        &self.rules
    }

    pub fn set_rules(&mut self, rules: Vec<RedirectRule>) {
        self.rules = rules;
    }

    /// The file with a freshly written section; no section when there are no rules.
    pub fn render(&self) -> String {
        let mut out = self.before.clone();
        if !self.rules.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(BEGIN_MARKER);
            out.push('\n');
            for rule in &self.rules {
                out.push_str(&rule.to_string());
                out.push('\n');
            }
            out.push_str(END_MARKER);
            out.push('\n');
        }
        out.push_str(&self.after);
        out
    }
}

fn find_line(content: &str, from: usize, marker: &str) -> Option<usize> {
    let mut pos = from;
    for line in content[from..].split_inclusive('\n') {
        if line.trim() == marker {
            return Some(pos);
        }
        pos += line.len();
    }
    None
}

fn line_end(content: &str, start: usize) -> usize {
    content[start..]
        .find('\n')
        .map_or(content.len(), |i| start + i + 1)
}

/// Combine existing and new rules into the managed rule set.
///
/// New rules replace existing ones with the same source. Rules whose source
/// is a live slug are dropped, chains are collapsed so every rule points at
/// its final destination, and self-redirects disappear. The result is
/// sorted by source.
pub fn merge_rules(
    existing: &[RedirectRule],
    new: &[RedirectRule],
    live: &BTreeSet<String>,
) -> Vec<RedirectRule> {
    let mut map: BTreeMap<&str, &str> = BTreeMap::new();
    for rule in existing.iter().chain(new) {
        map.insert(&rule.from, &rule.to);
    }
    map.retain(|from, _| !live.contains(*from));

    map.iter()
        .filter_map(|(&from, &to)| {
            let mut dest = to;
            let mut seen = BTreeSet::from([from]);
            while let Some(&next) = map.get(dest) {
                if !seen.insert(dest) {
                    break;
                }
                dest = next;
            }
            (dest != from).then(|| RedirectRule::new(from, dest))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(slugs: &[&str]) -> BTreeSet<String> {
        slugs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_and_render_preserves_unmanaged_content() {
        let content = "/a /b 302\n# BEGIN notepress redirects\n/old.html /new.html 301\n# END notepress redirects\n/x /y\n";
        let mut file = RedirectFile::parse(content);
        assert_eq!(file.rules(), &[RedirectRule::new("old", "new")]);
        assert_eq!(file.render(), content);

        file.set_rules(vec![RedirectRule::new("p", "q")]);
        assert_eq!(
            file.render(),
            "/a /b 302\n# BEGIN notepress redirects\n/p.html /q.html 301\n# END notepress redirects\n/x /y\n"
        );
    }

    #[test]
    fn test_section_appended_when_absent() {
        let mut file = RedirectFile::parse("/manual /other 301");
        file.set_rules(vec![RedirectRule::new("a", "b")]);
        let rendered = file.render();
        assert_eq!(
            rendered,
            "/manual /other 301\n# BEGIN notepress redirects\n/a.html /b.html 301\n# END notepress redirects\n"
        );
        assert_eq!(RedirectFile::parse(&rendered).render(), rendered);
    }

    #[test]
    fn test_unterminated_section_runs_to_end() {
        let file = RedirectFile::parse("keep\n# BEGIN notepress redirects\n/a.html /b.html 301\n");
        assert_eq!(file.rules().len(), 1);
        assert_eq!(
            file.render(),
            "keep\n# BEGIN notepress redirects\n/a.html /b.html 301\n# END notepress redirects\n"
        );
    }

    #[test]
    fn test_empty_rules_remove_section() {
        let mut file = RedirectFile::parse("# BEGIN notepress redirects\n/a.html /b.html 301\n# END notepress redirects\n");
        file.set_rules(Vec::new());
        assert_eq!(file.render(), "");
    }

    #[test]
    fn test_merge_collapses_chains() {
        let existing = [RedirectRule::new("a", "b")];
        let new = [RedirectRule::new("b", "c")];
        let merged = merge_rules(&existing, &new, &live(&["c"]));
        assert_eq!(merged, vec![RedirectRule::new("a", "c"), RedirectRule::new("b", "c")]);
    }

    #[test]
    fn test_merge_drops_live_sources_and_self_rules() {
        // The note moved a -> b and back to a.
        let existing = [RedirectRule::new("a", "b")];
        let new = [RedirectRule::new("b", "a")];
        let merged = merge_rules(&existing, &new, &live(&["a"]));
        assert_eq!(merged, vec![RedirectRule::new("b", "a")]);
    }

    #[test]
    fn test_merge_survives_cycles() {
        let rules = [RedirectRule::new("a", "b"), RedirectRule::new("b", "a")];
        let merged = merge_rules(&rules, &[], &live(&[]));
        assert!(merged.iter().all(|r| r.from != r.to));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let new = [RedirectRule::new("z", "y"), RedirectRule::new("m", "n")];
        let once = merge_rules(&[], &new, &live(&["y", "n"]));
        let twice = merge_rules(&once, &[], &live(&["y", "n"]));
        assert_eq!(once, twice);
        assert_eq!(once[0].from, "m");
    }
}
