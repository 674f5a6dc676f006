use chrono::DateTime;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use emlexport::export::normalize::{identify, ImageCounter};
use emlexport::mime::assemble::assemble;
use emlexport::mime::render::render;
use emlexport::mime::sniff::sniff;
use emlexport::model::message::SourceMessage;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";

fn bench_sniff(c: &mut Criterion) {
    let zip = b"PK\x03\x04\x14\x00\x06\x00".to_vec();
    let unknown = vec![0u8; 4096];

    c.bench_function("sniff_png", |b| b.iter(|| sniff(black_box(PNG), None)));
    c.bench_function("sniff_zip_hint", |b| {
        b.iter(|| sniff(black_box(&zip), Some("Quarterly Excel export")))
    });
    c.bench_function("sniff_unknown", |b| {
        b.iter(|| sniff(black_box(&unknown), Some("notes.txt")))
    });
}

fn bench_render(c: &mut Criterion) {
    let source = SourceMessage {
        sender_name: Some("Alice Example".to_string()),
        sender_address: Some("alice@example.com".to_string()),
        to: Some("bob@example.com, carol@example.com".to_string()),
        subject: Some("Q3 Report!!".to_string()),
        received: DateTime::parse_from_rfc3339("2024-10-02T08:15:00+00:00").ok(),
        body: "Numbers attached.\n".repeat(200),
        ..Default::default()
    };
    let mut data = PNG.to_vec();
    data.resize(256 * 1024, 0xAB);
    let mut images = ImageCounter::new();
    let attachment = identify(data, "3fa85f64-5717-4562-b3fc-2c963f66afa6", 0, &mut images);

    c.bench_function("render_simple", |b| {
        b.iter(|| render(&assemble(black_box(&source), Vec::new())))
    });
    c.bench_function("render_multipart_256k", |b| {
        b.iter(|| render(&assemble(black_box(&source), vec![attachment.clone()])))
    });
}

criterion_group!(benches, bench_sniff, bench_render);
criterion_main!(benches);
