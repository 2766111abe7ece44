use criterion::{black_box, criterion_group, criterion_main, Criterion};

use sqamark_core::contract::{exam_violations, validate_exam};
use sqamark_core::parser::{parse_exam_str, parse_submission_str};

const EXAM: &str = include_str!("../../../fixtures/exams/nat5-maths-001.json");
const BROKEN: &str = include_str!("../../../fixtures/invalid/bullet-sum-mismatch.json");
const SUBMISSION: &str = include_str!("../../../fixtures/submissions/sub-001.json");

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    group.bench_function("exam", |b| b.iter(|| parse_exam_str(black_box(EXAM))));
    group.bench_function("exam/invalid", |b| b.iter(|| parse_exam_str(black_box(BROKEN))));

    let exam = parse_exam_str(EXAM).expect("fixture exam");
    group.bench_function("submission", |b| {
        b.iter(|| parse_submission_str(black_box(SUBMISSION), &exam))
    });
    group.finish();
}

fn bench_contract(c: &mut Criterion) {
    let exam = parse_exam_str(EXAM).expect("fixture exam");
    c.bench_function("validate_exam", |b| b.iter(|| validate_exam(black_box(&exam))));
    c.bench_function("exam_violations", |b| b.iter(|| exam_violations(black_box(&exam))));
}

criterion_group!(benches, bench_parse, bench_contract);
criterion_main!(benches);
