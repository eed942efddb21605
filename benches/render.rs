//! Benchmarks for decoding and rendering note bodies.
//!
//! Run with: cargo bench

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use notepress::decode::decode;
use notepress::decode::testing::NoteBlobBuilder;
use notepress::model::{Attr, AttrSet};
use notepress::render::{FootnoteStyle, StaticLinks, render};

/// A long note body: paragraphs with bold and linked words, a list and footnotes.
fn sample_blob() -> Vec<u8> {
    let paragraph = "Walking along the river we saw herons [^1] and one heron saw us. ";
    let lines: Vec<String> = (0..200).map(|i| format!("{paragraph}{i}\n")).collect();
    let mut text = lines.concat();
    text.push_str("[^1]: Grey herons, mostly.");

    let mut builder = NoteBlobBuilder::new(text);
    for (i, line) in lines.iter().enumerate() {
        let len = line.encode_utf16().count();
        builder = match i % 4 {
            0 => builder.styled(7, Attr::Bold).plain(len - 7),
            1 => builder.linked(7, "https://example.com/river").plain(len - 7),
            2 => builder.styled(len, AttrSet::EMPTY.with(Attr::BulletListItem)),
            _ => builder.plain(len),
        };
    }
    builder.fill().gzip().unwrap()
}

// ============================================================================
// Decode Benchmarks
// ============================================================================

fn bench_decode(c: &mut Criterion) {
    let blob = sample_blob();
    c.bench_function("decode", |b| {
        b.iter(|| decode(black_box(&blob)));
    });
}

// ============================================================================
// Render Benchmarks
// ============================================================================

fn bench_render(c: &mut Criterion) {
    let note = decode(&sample_blob());
    let links = StaticLinks::new().with("RIVER-1", "River", "/river.html");
    let style = FootnoteStyle::for_slug("walks/river");
    c.bench_function("render", |b| {
        b.iter(|| render(black_box(&note.text), black_box(&note.runs), &links, &style));
    });
}

criterion_group!(benches, bench_decode, bench_render);
criterion_main!(benches);
