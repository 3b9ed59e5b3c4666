use criterion::{criterion_group, criterion_main, Criterion};
use tfidf_core::tokenizer::tokenize;

const LINE: &str = "It was the best of times, it was the worst of times, it was the age of wisdom, \
                    it was the age of foolishness, it was the epoch of belief, it was the epoch of incredulity.";

fn bench_tokenize(c: &mut Criterion) {
    c.bench_function("tokenize_line", |b| b.iter(|| tokenize(LINE).count()));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
