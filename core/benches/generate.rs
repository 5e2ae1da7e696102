use criterion::{Criterion, criterion_group, criterion_main};
use shapecheck_core::*;
use std::hint::black_box;

fn bench_generate(c: &mut Criterion) {
    let mut rng = SeededSource::new(0x5EED);
    c.bench_function("generate_challenge", |b| {
        b.iter(|| black_box(generate_challenge(&mut rng)))
    });
}

fn bench_score(c: &mut Criterion) {
    let mut rng = SeededSource::new(0x5EED);
    let policy = Policy::new(3, 5., 70.).unwrap();
    let mut challenge = generate_challenge(&mut rng);
    let marks: Vec<_> = challenge.positives().map(|cell| cell.index).collect();
    for index in marks {
        challenge.toggle(index).unwrap();
    }
    c.bench_function("score", |b| {
        b.iter(|| black_box(score(black_box(&challenge), 1, &policy)))
    });
}

criterion_group!(benches, bench_generate, bench_score);
criterion_main!(benches);
