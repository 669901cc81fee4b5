//! Criterion benchmarks for the orchestration hot paths: response
//! normalization (regex extraction + brace scanning) and intent scoring.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use siteforge::response;
use siteforge::workflow::{ExecutionContext, IntentResolver, IntentThresholds};

fn fenced_response() -> String {
    format!(
        "Here is a first draft:\n```tsx\n{}\n```\nAnd a longer revision:\n```tsx\n{}\n```\nLet me know.",
        "const Card = () => <div className=\"card\"/>;\n".repeat(20),
        "export const Grid = () => <div className=\"grid\">{items.map(render)}</div>;\n".repeat(60),
    )
}

fn truncated_response() -> String {
    format!(
        "Working on it:\nfunction layout() {{\n{}",
        "  const section = buildSection();\n".repeat(40)
    )
}

fn bench_normalizer(c: &mut Criterion) {
    let fenced = fenced_response();
    let truncated = truncated_response();
    let prose = "The plan covers the hero, the pricing grid, and a contact form.".repeat(10);

    let mut group = c.benchmark_group("response_parse");
    group.bench_function("fenced_blocks", |b| {
        b.iter(|| response::parse(black_box(&fenced)))
    });
    group.bench_function("truncation_repair", |b| {
        b.iter(|| response::parse(black_box(&truncated)))
    });
    group.bench_function("prose_fallback", |b| {
        b.iter(|| response::parse(black_box(&prose)))
    });
    group.finish();
}

fn bench_intent_scoring(c: &mut Criterion) {
    let resolver = IntentResolver::new(
        vec![
            "planner".to_string(),
            "implementer".to_string(),
            "reviewer".to_string(),
        ],
        IntentThresholds::default(),
    );
    let ctx = ExecutionContext::new("build a landing page");
    let output = fenced_response();

    c.bench_function("intent_analyze", |b| {
        b.iter(|| resolver.analyze(black_box(&output), black_box(&ctx)))
    });
}

criterion_group!(benches, bench_normalizer, bench_intent_scoring);
criterion_main!(benches);
