//! HTML synthesis from text and style runs.
//!
//! The text is processed line by line. Each line gets one paragraph-level
//! kind, consecutive list, quote and code lines are grouped, and the inline
//! content of every line goes through a [`SegmentMap`] before tags are emitted
//! with a fixed nesting order. Code lines are kept verbatim.

use std::ops::Range;

use memchr::memmem;

use super::escape::{escape_xml, push_escaped};
use super::footnotes::{self, Footnote, FootnotePlan, FootnoteStyle};
use super::links::{LinkResolver, is_safe_url};
use super::segments::{InlineStyle, Mark, SegmentMap, Span};
use crate::model::{Attr, AttrSet, LinkTarget, StyleRun, Utf16Index};

/// Output of [`render`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderResult {
    /// Block elements joined by newlines.
    pub body: String,
    /// `<footer>` with the footnote list, or empty.
    pub footer: String,
    pub footnotes: Vec<Footnote>,
}

impl RenderResult {
    /// Body followed by the footnote block.
    pub fn html(&self) -> String {
        if self.footer.is_empty() {
            return self.body.clone();
        }
        format!("{}\n{}", self.body, self.footer)
    }
}

/// Paragraph-level kind of a line, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Heading1,
    Heading2,
    Numbered,
    Bullet,
    Quote,
    Code,
    Plain,
}

impl LineKind {
    fn from_attrs(attrs: AttrSet) -> Self {
        if attrs.contains(Attr::Heading1) {
            LineKind::Heading1
        } else if attrs.contains(Attr::Heading2) {
            LineKind::Heading2
        } else if attrs.contains(Attr::NumberedListItem) {
            LineKind::Numbered
        } else if attrs.contains(Attr::BulletListItem) {
            LineKind::Bullet
        } else if attrs.contains(Attr::BlockQuote) {
            LineKind::Quote
        } else if attrs.contains(Attr::CodeBlock) {
            LineKind::Code
        } else {
            LineKind::Plain
        }
    }

    fn group_tag(self) -> Option<&'static str> {
        match self {
            LineKind::Numbered => Some("ol"),
            LineKind::Bullet => Some("ul"),
            LineKind::Quote => Some("blockquote"),
            LineKind::Code => Some("pre"),
            _ => None,
        }
    }

    fn line_tag(self) -> &'static str {
        match self {
            LineKind::Heading1 => "h1",
            LineKind::Heading2 => "h2",
            LineKind::Numbered | LineKind::Bullet => "li",
            LineKind::Quote | LineKind::Plain => "p",
            LineKind::Code => "code",
        }
    }
}

/// Render a note to HTML.
///
/// Pure and deterministic: the same input always gives byte-identical
/// output. Runs are clamped to the text; nothing here can fail.
pub fn render(
    text: &str,
    runs: &[StyleRun],
    links: &dyn LinkResolver,
    footnote_style: &FootnoteStyle,
) -> RenderResult {
    let idx = Utf16Index::new(text);
    let runs: Vec<StyleRun> = runs.iter().filter_map(|r| r.clamped(idx.len())).collect();
    let lines = idx.lines(text);

    let kinds = line_kinds(&lines, &runs);
    let plan = footnotes::plan(text, &idx, &lines, &runs);

    let mut spans: Vec<Span> = runs
        .iter()
        .filter(|r| r.has_inline())
        .map(|r| Span {
            range: r.range(),
            attrs: r.attrs.inline(),
            link: r.link.clone(),
            mark: Mark::Text,
        })
        .collect();
    spans.extend(wiki_link_spans(text, &idx, &runs));
    spans.extend(plan.references.iter().cloned());
    spans.sort_by_key(|s| s.range.start);

    let ctx = InlineContext {
        text,
        idx: &idx,
        spans: &spans,
        links,
        footnote_style,
    };

    let body = render_blocks(&ctx, &lines, &kinds, &plan);
    let footnotes: Vec<Footnote> = plan
        .notes
        .iter()
        .map(|n| Footnote {
            index: n.index,
            label: n.label.clone(),
            html: ctx.inline(trim_range(text, &idx, n.body.clone())),
            referenced: n.referenced,
        })
        .collect();
    let footer = render_footer(&footnotes, footnote_style);

    RenderResult {
        body,
        footer,
        footnotes,
    }
}

/// Paragraph kind of every line.
///
/// A paragraph run applies to the line holding its start and to every later
/// line that starts inside it.
fn line_kinds(lines: &[Range<usize>], runs: &[StyleRun]) -> Vec<LineKind> {
    let mut attrs = vec![AttrSet::EMPTY; lines.len()];
    for run in runs {
        let para = run.attrs.paragraph();
        if para.is_empty() {
            continue;
        }
        let first = lines.partition_point(|l| l.end < run.start);
        for (i, line) in lines.iter().enumerate().skip(first) {
            if i != first && line.start >= run.end() {
                break;
            }
            attrs[i] = attrs[i].union(para);
        }
    }
    attrs.into_iter().map(LineKind::from_attrs).collect()
}

/// `[[Title]]` links: brackets hidden, inner text linked by title.
///
/// Not recognized inside monospace text.
fn wiki_link_spans(text: &str, idx: &Utf16Index, runs: &[StyleRun]) -> Vec<Span> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some(found) = memmem::find(&bytes[from..], b"[[") {
        let open = from + found;
        let inner_start = open + 2;
        let Some(len) = memmem::find(&bytes[inner_start..], b"]]") else {
            break;
        };
        let inner = &text[inner_start..inner_start + len];
        if inner.trim().is_empty() || inner.contains(['\n', '[', ']']) {
            from = open + 1;
            continue;
        }

        let open_unit = idx.unit_at_byte(open);
        if !super::code_at(runs, open_unit) {
            let inner_range = idx.unit_at_byte(inner_start)..idx.unit_at_byte(inner_start + len);
            let close_end = idx.unit_at_byte(inner_start + len + 2);
            spans.push(Span::marked(open_unit..inner_range.start, Mark::Hidden));
            spans.push(Span::link(
                inner_range.clone(),
                LinkTarget::Title(inner.trim().to_string()),
            ));
            spans.push(Span::marked(inner_range.end..close_end, Mark::Hidden));
        }
        from = inner_start + len + 2;
    }
    spans
}

struct InlineContext<'a> {
    text: &'a str,
    idx: &'a Utf16Index,
    /// Sorted by start.
    spans: &'a [Span],
    links: &'a dyn LinkResolver,
    footnote_style: &'a FootnoteStyle,
}

/// An open inline element.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Tag {
    Link(String),
    Attr(Attr),
}

/// Inline attributes in nesting order, outermost first.
const NESTING: [(Attr, &str); 6] = [
    (Attr::Bold, "strong"),
    (Attr::Italic, "em"),
    (Attr::Monospace, "code"),
    (Attr::Strikethrough, "s"),
    (Attr::Underline, "u"),
    (Attr::Superscript, "sup"),
];

impl Tag {
    fn open(&self, out: &mut String) {
        match self {
            Tag::Link(href) => {
                out.push_str("<a href=\"");
                push_escaped(out, href);
                out.push_str("\">");
            }
            Tag::Attr(attr) => {
                out.push('<');
                out.push_str(attr_tag(*attr));
                out.push('>');
            }
        }
    }

    fn close(&self, out: &mut String) {
        match self {
            Tag::Link(_) => out.push_str("</a>"),
            Tag::Attr(attr) => {
                out.push_str("</");
                out.push_str(attr_tag(*attr));
                out.push('>');
            }
        }
    }
}

fn attr_tag(attr: Attr) -> &'static str {
    NESTING
        .iter()
        .find(|(a, _)| *a == attr)
        .map_or("span", |(_, tag)| *tag)
}

impl InlineContext<'_> {
    fn href(&self, target: &LinkTarget) -> Option<String> {
        match target {
            LinkTarget::Note(id) => self.links.resolve_note(id),
            LinkTarget::Title(title) => self.links.resolve_title(title),
            LinkTarget::Url(url) => is_safe_url(url).then(|| url.trim().to_string()),
        }
    }

    fn tags_for(&self, style: &InlineStyle) -> Vec<Tag> {
        let mut tags = Vec::with_capacity(NESTING.len() + 1);
        if let Some(href) = style.link.as_ref().and_then(|t| self.href(t)) {
            tags.push(Tag::Link(href));
        }
        tags.extend(
            NESTING
                .iter()
                .filter(|(attr, _)| style.attrs.contains(*attr))
                .map(|(attr, _)| Tag::Attr(*attr)),
        );
        tags
    }

    /// Inline HTML for a unit range.
    fn inline(&self, range: Range<usize>) -> String {
        let relevant: Vec<Span> = self
            .spans
            .iter()
            .take_while(|s| s.range.start < range.end)
            .filter(|s| s.range.end > range.start)
            .cloned()
            .collect();
        let map = match SegmentMap::build(range.clone(), &relevant) {
            Ok(map) => map,
            Err(err) => {
                tracing::warn!(error = %err, ?range, "inline styles dropped");
                SegmentMap::plain(range)
            }
        };

        let mut out = String::new();
        let mut stack: Vec<Tag> = Vec::new();
        for segment in map.iter() {
            match segment.style.mark {
                Mark::Hidden => continue,
                Mark::Footnote(r) => {
                    close_all(&mut stack, &mut out);
                    out.push_str("<a ");
                    if r.occurrence == 0 {
                        out.push_str("id=\"");
                        push_escaped(&mut out, &self.footnote_style.anchor_id(r.index));
                        out.push_str("\" ");
                    }
                    out.push_str("href=\"#");
                    push_escaped(&mut out, &self.footnote_style.target_id(r.index));
                    out.push_str("\"><sup>");
                    out.push_str(&r.index.to_string());
                    out.push_str("</sup></a>");
                    continue;
                }
                Mark::Text => {}
            }

            let wanted = self.tags_for(&segment.style);
            let common = stack
                .iter()
                .zip(&wanted)
                .take_while(|(a, b)| a == b)
                .count();
            while stack.len() > common {
                if let Some(tag) = stack.pop() {
                    tag.close(&mut out);
                }
            }
            for tag in &wanted[common..] {
                tag.open(&mut out);
                stack.push(tag.clone());
            }
            push_text(&mut out, self.idx.slice(self.text, segment.range.clone()));
        }
        close_all(&mut stack, &mut out);
        out
    }
}

fn close_all(stack: &mut Vec<Tag>, out: &mut String) {
    while let Some(tag) = stack.pop() {
        tag.close(out);
    }
}

/// Escaped text; U+2028 (a soft line break in the notes app) becomes `<br/>`.
fn push_text(out: &mut String, text: &str) {
    let mut parts = text.split('\u{2028}');
    if let Some(first) = parts.next() {
        out.push_str(&escape_xml(first));
    }
    for part in parts {
        out.push_str("<br/>");
        out.push_str(&escape_xml(part));
    }
}

/// Shrink a unit range to exclude surrounding ASCII whitespace.
fn trim_range(text: &str, idx: &Utf16Index, range: Range<usize>) -> Range<usize> {
    let slice = idx.slice(text, range.clone());
    let lead = slice.len() - slice.trim_start_matches(|c: char| c.is_ascii_whitespace()).len();
    let trail = slice.len() - slice.trim_end_matches(|c: char| c.is_ascii_whitespace()).len();
    if lead == slice.len() {
        return range.start..range.start;
    }
    range.start + lead..range.end - trail
}

fn render_blocks(
    ctx: &InlineContext<'_>,
    lines: &[Range<usize>],
    kinds: &[LineKind],
    plan: &FootnotePlan,
) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut group: Option<(LineKind, Vec<String>)> = None;

    for (i, (line, kind)) in lines.iter().zip(kinds).enumerate() {
        if plan.definition_lines.contains(&i) {
            continue;
        }
        if *kind == LineKind::Code {
            let content = if line.is_empty() {
                String::new()
            } else {
                ctx.inline(line.clone())
            };
            match &mut group {
                Some((LineKind::Code, items)) => items.push(content),
                _ => {
                    flush_group(&mut group, &mut blocks);
                    group = Some((LineKind::Code, vec![content]));
                }
            }
            continue;
        }
        let range = trim_range(ctx.text, ctx.idx, line.clone());
        if range.is_empty() {
            flush_group(&mut group, &mut blocks);
            continue;
        }
        let content = ctx.inline(range);
        if content.is_empty() {
            // Nothing visible, e.g. a line holding only link brackets.
            continue;
        }
        let tag = kind.line_tag();
        let element = format!("<{tag}>{content}</{tag}>");

        match kind.group_tag() {
            Some(_) => match &mut group {
                Some((open, items)) if *open == *kind => items.push(element),
                _ => {
                    flush_group(&mut group, &mut blocks);
                    group = Some((*kind, vec![element]));
                }
            },
            None => {
                flush_group(&mut group, &mut blocks);
                blocks.push(element);
            }
        }
    }
    flush_group(&mut group, &mut blocks);
    blocks.join("\n")
}

fn flush_group(group: &mut Option<(LineKind, Vec<String>)>, blocks: &mut Vec<String>) {
    let Some((kind, mut items)) = group.take() else {
        return;
    };
    if kind == LineKind::Code {
        while items.last().is_some_and(|l| l.trim().is_empty()) {
            items.pop();
        }
        let first = items.iter().position(|l| !l.trim().is_empty()).unwrap_or(items.len());
        if first < items.len() {
            blocks.push(format!("<pre><code>{}</code></pre>", items[first..].join("\n")));
        }
        return;
    }
    let Some(tag) = kind.group_tag() else {
        blocks.extend(items);
        return;
    };
    blocks.push(format!("<{tag}>\n{}\n</{tag}>", items.join("\n")));
}

fn render_footer(footnotes: &[Footnote], style: &FootnoteStyle) -> String {
    if footnotes.is_empty() {
        return String::new();
    }
    let mut out = String::from("<footer>\n<ol>\n");
    for note in footnotes {
        out.push_str("<li id=\"");
        push_escaped(&mut out, &style.target_id(note.index));
        out.push_str("\">");
        out.push_str(&note.html);
        if note.referenced {
            out.push_str("<a href=\"#");
            push_escaped(&mut out, &style.anchor_id(note.index));
            out.push_str("\">");
            push_escaped(&mut out, &style.back_link);
            out.push_str("</a>");
        }
        out.push_str("</li>\n");
    }
    out.push_str("</ol>\n</footer>");
    out
}
