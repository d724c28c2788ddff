use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gcode_document::parser::{first_number_after_default, line_without_checksum};
use gcode_document::{parse_line, DocumentOptions, MemoryDocument};

/// Generate G-code content of different patterns for benchmarking
fn generate_gcode_content(lines: usize, pattern: &str) -> String {
    let mut content = String::new();

    match pattern {
        "movement_heavy" => {
            for i in 0..lines {
                content.push_str(&format!(
                    "G1 X{:.3} Y{:.3} Z{:.3} E{:.3} F1500\n",
                    (i as f32) * 0.1,
                    (i as f32) * 0.2,
                    (i / 100) as f32 * 0.2,
                    (i as f32) * 0.02
                ));
            }
        }
        "numbered" => {
            for i in 0..lines {
                content.push_str(&format!(
                    "N{} G1 X{:.3} Y{:.3} E{:.3}*{}\n",
                    i,
                    (i as f32) * 0.1,
                    (i as f32) * 0.1,
                    (i as f32) * 0.01,
                    i % 256
                ));
            }
        }
        "mixed" => {
            for i in 0..lines {
                match i % 4 {
                    0 => content.push_str(&format!(
                        "G1 X{:.3} Y{:.3} F1500\n",
                        (i as f32) * 0.1,
                        (i as f32) * 0.2
                    )),
                    1 => content.push_str(&format!("; layer {}, Z = {:.2}\n", i / 4, (i / 4) as f32 * 0.2)),
                    2 => content.push_str(&format!("M104 S{}\n", 200 + (i % 50))),
                    3 => content.push_str(&format!("G0 Z{:.2}\n", (i / 4) as f32 * 0.2)),
                    _ => unreachable!(),
                }
            }
        }
        _ => {
            for i in 0..lines {
                content.push_str(&format!("G1 X{} Y{}\n", i, i));
            }
        }
    }

    content
}

/// Benchmark classifying single lines
fn bench_single_line_parsing(c: &mut Criterion) {
    let test_lines = vec![
        ("simple_move", "G1 X10 Y20"),
        ("complex_move", "G1 X123.456 Y789.012 Z0.3 E2.85714 F1500"),
        ("numbered", "N123 G1 X10 Y20*57"),
        ("with_comment", "G1 X10 Y20 ; Move to next position"),
        ("comment_only", "; This is a comment line with some detailed information"),
        ("temperature", "M104 S210 T0"),
    ];

    let mut group = c.benchmark_group("single_line_parsing");

    for (name, line) in test_lines {
        group.bench_with_input(BenchmarkId::new("parse_line", name), &line, |b, line| {
            b.iter(|| black_box(parse_line(black_box(line))))
        });
    }

    group.finish();
}

/// Benchmark the marker scanner on its own
fn bench_number_extraction(c: &mut Criterion) {
    let line = "G1 X123.456 Y789.012 Z0.3 E2.85714 F1500 ; X1 Y2";

    let mut group = c.benchmark_group("number_extraction");
    for marker in ["X", "E", "F"] {
        group.bench_with_input(BenchmarkId::new("first_number_after", marker), &marker, |b, marker| {
            b.iter(|| black_box(first_number_after_default(black_box(marker), black_box(line))))
        });
    }
    group.bench_function("line_without_checksum", |b| {
        b.iter(|| black_box(line_without_checksum(black_box("N4096 G1 X1 Y2 E3*112"))))
    });
    group.finish();
}

/// Benchmark building whole documents of different sizes
fn bench_document_parsing(c: &mut Criterion) {
    let file_sizes = vec![1_000, 10_000, 100_000];
    let patterns = vec!["movement_heavy", "numbered", "mixed"];
    let options = DocumentOptions::default();

    let mut group = c.benchmark_group("document_parsing");

    for &size in &file_sizes {
        for pattern in &patterns {
            let content = generate_gcode_content(size, pattern);

            group.throughput(Throughput::Bytes(content.len() as u64));
            group.bench_with_input(
                BenchmarkId::new(*pattern, size),
                &content,
                |b, content| {
                    b.iter(|| {
                        let doc = MemoryDocument::parse(black_box(content), &options)
                            .expect("benchmark input parses");
                        black_box(doc.total_seconds())
                    })
                },
            );
        }
    }

    group.finish();
}

criterion_group!(
    parsing_benches,
    bench_single_line_parsing,
    bench_number_extraction,
    bench_document_parsing
);

criterion_main!(parsing_benches);
