//! Benchmarks for agent-gate.

#![allow(missing_docs)]
#![allow(let_underscore_drop)]

use agent_gate::checks::location::LocationPolicy;
use agent_gate::config::{LocationConfig, SimilarityConfig};
use agent_gate::core::tree::FileTree;
use agent_gate::similarity::{similarity, Document, SimilarityDetector};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const TOPICS: [&str; 8] = [
    "testing", "deployment", "architecture", "security", "logging", "storage", "release",
    "onboarding",
];

fn corpus(size: usize) -> Vec<Document> {
    (0..size)
        .map(|i| {
            let topic = TOPICS[i % TOPICS.len()];
            let text = format!(
                "# {topic} guide {i}\n\n## Overview\n\n## {topic} checklist\n\n\
                 The {topic} process covers review, automation and rollback. \
                 Every {topic} change needs an owner and a written plan.\n\n\
                 ```sh\nrun {topic}\n```\n"
            );
            Document::parse(format!("docs/{topic}-{i}.md"), &text, 20)
        })
        .collect()
}

fn benchmark_document_parsing(c: &mut Criterion) {
    let text = "# Testing Strategy\n\n## Unit tests\n\nUnit tests cover parsing and scoring. \
                See [the guide](docs/guide.md) and `cargo test`.\n\n## Fixtures\n\n"
        .repeat(20);

    c.bench_function("document_parse", |b| {
        b.iter(|| Document::parse("docs/testing.md", black_box(&text), 20));
    });
}

fn benchmark_pair_scoring(c: &mut Criterion) {
    let docs = corpus(2);
    c.bench_function("similarity_pair", |b| {
        b.iter(|| similarity(black_box(&docs[0]), black_box(&docs[1])));
    });
}

fn benchmark_find_overlaps(c: &mut Criterion) {
    let detector = SimilarityDetector::new(&SimilarityConfig::default()).expect("detector");
    let mut group = c.benchmark_group("find_overlaps");
    for size in [50, 200] {
        let docs = corpus(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &docs, |b, docs| {
            b.iter(|| detector.find_overlaps(black_box(docs)));
        });
    }
    group.finish();
}

fn benchmark_location(c: &mut Criterion) {
    let policy = LocationPolicy::from_config(&LocationConfig::default()).expect("policy");
    let names: Vec<String> = (0..500)
        .map(|i| match i % 4 {
            0 => format!("src/module_{i}.rs"),
            1 => format!("SESSION-{i}.md"),
            2 => format!("docs/page-{i}.md"),
            _ => format!("notes-{i}.txt"),
        })
        .collect();
    let files: Vec<&str> = names.iter().map(String::as_str).collect();
    let tree = FileTree::from_files("/repo", &files);

    c.bench_function("location_validate_tree", |b| {
        b.iter(|| policy.validate_tree(black_box(&tree)));
    });
}

criterion_group!(
    benches,
    benchmark_document_parsing,
    benchmark_pair_scoring,
    benchmark_find_overlaps,
    benchmark_location
);
criterion_main!(benches);
