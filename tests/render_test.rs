//! Renderer properties over arbitrary text and runs.

use proptest::prelude::*;
use quick_xml::Reader;
use quick_xml::events::Event;

use notepress::model::{Attr, LinkTarget, StyleRun};
use notepress::render::{FootnoteStyle, NoLinks, StaticLinks, render};

/// Parse `fragment` as XML and fail on any unbalanced or mismatched tag.
fn assert_well_formed(fragment: &str) -> Result<(), String> {
    let doc = format!("<root>{fragment}</root>");
    let mut reader = Reader::from_str(&doc);
    let mut depth = 0usize;
    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => depth -= 1,
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(format!("{e} in {doc:?}")),
        }
    }
    if depth == 0 {
        Ok(())
    } else {
        Err(format!("{depth} unclosed elements in {doc:?}"))
    }
}

fn arb_text() -> impl Strategy<Value = String> {
    let pieces = vec![
        "a", "bc", " ", "\n", "\n\n", "<", "&", "\"", "é", "😀", "\u{2028}", "[^1]", "[^1]: note", "[[T]]",
        "[[Missing]]", "¹", "x¹ y",
    ];
    prop::collection::vec(prop::sample::select(pieces), 0..24).prop_map(|v| v.concat())
}

fn arb_run(len: usize) -> impl Strategy<Value = StyleRun> {
    (0..=len + 4, 0..=len + 4, 0u16..(1 << 12), prop::option::of(0u8..4)).prop_map(|(a, b, bits, link)| {
        let mut run = StyleRun::new(a.min(b), a.abs_diff(b));
        for (i, attr) in Attr::ALL.into_iter().enumerate() {
            if bits & (1 << i) != 0 {
                run = run.with(attr);
            }
        }
        run.link = link.map(|n| match n {
            0 => LinkTarget::Url("https://example.com/?a=1&b=2".into()),
            1 => LinkTarget::Note("T-1".into()),
            2 => LinkTarget::Title("Missing".into()),
            _ => LinkTarget::Url("javascript:alert(1)".into()),
        });
        run
    })
}

fn arb_input() -> impl Strategy<Value = (String, Vec<StyleRun>)> {
    arb_text().prop_flat_map(|text| {
        let len = text.encode_utf16().count();
        (Just(text), prop::collection::vec(arb_run(len), 0..8))
    })
}

fn links() -> StaticLinks {
    StaticLinks::new().with("T-1", "T", "/t.html")
}

proptest! {
    #[test]
    fn prop_output_is_well_formed((text, runs) in arb_input()) {
        let out = render(&text, &runs, &links(), &FootnoteStyle::for_slug("p"));
        prop_assert!(assert_well_formed(&out.html()).is_ok(), "{:?}", assert_well_formed(&out.html()));
    }

    #[test]
    fn prop_idempotent((text, runs) in arb_input()) {
        let style = FootnoteStyle::default();
        let first = render(&text, &runs, &links(), &style);
        let second = render(&text, &runs, &links(), &style);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_run_order_does_not_matter((text, mut runs) in arb_input()) {
        let style = FootnoteStyle::default();
        let forward = render(&text, &runs, &links(), &style);
        runs.reverse();
        let backward = render(&text, &runs, &links(), &style);
        prop_assert_eq!(forward.html(), backward.html());
    }

    #[test]
    fn prop_unsafe_urls_never_linked((text, runs) in arb_input()) {
        let out = render(&text, &runs, &NoLinks, &FootnoteStyle::default());
        prop_assert!(!out.html().contains("javascript:"));
    }
}

#[test]
fn test_hello_world() {
    let runs = [StyleRun::new(0, 5).with(Attr::Bold)];
    let out = render("Hello World", &runs, &NoLinks, &FootnoteStyle::default());
    assert_eq!(out.html(), "<p><strong>Hello</strong> World</p>");
}

#[test]
fn test_nesting_is_canonical() {
    let all_inline = [Attr::Superscript, Attr::Underline, Attr::Strikethrough, Attr::Monospace, Attr::Italic, Attr::Bold];
    let mut run = StyleRun::new(0, 1).with_link(LinkTarget::Url("https://x.test".into()));
    for attr in all_inline {
        run = run.with(attr);
    }
    let out = render("x", &[run], &NoLinks, &FootnoteStyle::default());
    assert_eq!(
        out.body,
        "<p><a href=\"https://x.test\"><strong><em><code><s><u><sup>x</sup></u></s></code></em></strong></a></p>"
    );
}

#[test]
fn test_unresolved_internal_link_is_text() {
    let runs = [StyleRun::new(4, 7).with_link(LinkTarget::Note("GONE".into()))];
    let out = render("see nowhere!", &runs, &NoLinks, &FootnoteStyle::default());
    assert_eq!(out.body, "<p>see nowhere!</p>");
}

#[test]
fn test_utf16_offsets_across_astral_characters() {
    // "😀" is two UTF-16 units, so "ok" starts at unit 3.
    let runs = [StyleRun::new(3, 2).with(Attr::Italic)];
    let out = render("😀 ok", &runs, &NoLinks, &FootnoteStyle::default());
    assert_eq!(out.body, "<p>😀 <em>ok</em></p>");
}

#[test]
fn test_mixed_blocks() {
    let text = "Title\nOne\nTwo\nQuoted\nEnd";
    let runs = [
        StyleRun::new(0, 5).with(Attr::Heading1),
        StyleRun::new(6, 7).with(Attr::BulletListItem),
        StyleRun::new(14, 6).with(Attr::BlockQuote),
    ];
    let out = render(text, &runs, &NoLinks, &FootnoteStyle::default());
    assert_eq!(
        out.body,
        "<h1>Title</h1>\n<ul>\n<li>One</li>\n<li>Two</li>\n</ul>\n<blockquote>\n<p>Quoted</p>\n</blockquote>\n<p>End</p>"
    );
}
