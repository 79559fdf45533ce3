use criterion::{criterion_group, criterion_main, Criterion};
use sift_core::tokenizer::{tokenize, StopWords};

const TEXT: &str = "Access to production systems must be reviewed quarterly by the system owner. \
    Audit logs are retained for one year and protected against tampering. \
    Privileged accounts require multi-factor authentication and are disabled after ninety days of inactivity.";

fn bench_tokenize(c: &mut Criterion) {
    let stop = StopWords::english();
    let text = TEXT.repeat(20);
    c.bench_function("tokenize_policy_text", |b| b.iter(|| tokenize(&text, &stop)));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
