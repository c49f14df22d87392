use criterion::{Criterion, criterion_group, criterion_main};
use mnemosyne::prompt::PromptBuilder;
use std::hint::black_box;

fn history(prefix: &str, count: usize, words: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("{prefix} {i}: {}", "lorem ipsum dolor ".repeat(words)))
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let builder = PromptBuilder::default();
    let new_query = "What did we decide about the release schedule?";

    let queries = history("query", 3, 20);
    let replies = history("reply", 3, 120);
    c.bench_function("prompt_typical", |b| {
        b.iter(|| builder.build(black_box(&queries), black_box(&replies), black_box(new_query)))
    });

    // Enough context that the limit cuts both sides
    let queries = history("query", 50, 100);
    let replies = history("reply", 50, 400);
    c.bench_function("prompt_truncated", |b| {
        b.iter(|| builder.build(black_box(&queries), black_box(&replies), black_box(new_query)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
