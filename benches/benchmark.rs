// Benchmarks for index build and the two ranking queries
use cinex_core::{ComposerConfig, EmbeddingField, EntityRecord, VectorComposer, DEFAULT_EMBEDDING_DIM};
use cinex_search::{HashingEncoder, Retriever, TextEncoder};
use cinex_storage::CorpusSnapshot;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use std::sync::Arc;

const DIM: usize = DEFAULT_EMBEDDING_DIM;

fn random_embedding(rng: &mut impl Rng) -> Vec<f32> {
    (0..DIM).map(|_| rng.random_range(-1.0f32..1.0f32)).collect()
}

fn generate_corpus(size: u64) -> Vec<EntityRecord> {
    let mut rng = rand::rng();
    (1..=size)
        .map(|id| {
            let mut record = EntityRecord::new(id, format!("Movie {}", id))
                .with_vote(rng.random_range(0.0f32..10.0), rng.random_range(0.0f32..1.0));
            for field in EmbeddingField::ALL {
                record.set_embedding(field, Some(random_embedding(&mut rng)));
            }
            record
        })
        .collect()
}

fn composer() -> Arc<VectorComposer> {
    Arc::new(VectorComposer::new(ComposerConfig::default()).unwrap())
}

fn benchmark_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    group.sample_size(10);

    for size in [1_000u64, 5_000].iter() {
        let corpus = generate_corpus(*size);
        group.bench_with_input(BenchmarkId::new("snapshot", size), size, |b, _| {
            b.iter(|| CorpusSnapshot::build(black_box(corpus.clone()), composer()).unwrap());
        });
    }

    group.finish();
}

fn benchmark_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("similarity");

    for size in [1_000u64, 10_000].iter() {
        let snapshot = CorpusSnapshot::build(generate_corpus(*size), composer()).unwrap();
        let retriever = Retriever::new(&snapshot);
        let mut rng = rand::rng();

        group.bench_with_input(BenchmarkId::new("k10", size), size, |b, &size| {
            b.iter(|| {
                let id = rng.random_range(1..=size);
                black_box(retriever.find_by_similarity(id, 10).unwrap())
            });
        });
    }

    group.finish();
}

fn benchmark_description(c: &mut Criterion) {
    let mut group = c.benchmark_group("description");
    let snapshot = CorpusSnapshot::build(generate_corpus(10_000), composer()).unwrap();
    let retriever = Retriever::new(&snapshot);
    let encoder = HashingEncoder::new(DIM);

    group.bench_function("encode", |b| {
        b.iter(|| encoder.encode(black_box("a thief who steals secrets through dream sharing")).unwrap());
    });

    let query = encoder.encode("a thief who steals secrets through dream sharing").unwrap();
    group.bench_function("rank_10000", |b| {
        b.iter(|| black_box(retriever.find_by_summary_embedding(&query, 5).unwrap()));
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_build,
    benchmark_similarity,
    benchmark_description
);
criterion_main!(benches);
