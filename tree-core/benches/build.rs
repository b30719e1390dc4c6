use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tree_core::{ParameterSet, Scene, construct};

fn build_tree(params: &ParameterSet, seed: u64) -> usize {
    let mut scene = Scene::default();
    construct(params, seed, false, None, &mut scene).unwrap();
    scene.curve_points()
}

fn default_preset(c: &mut Criterion) {
    let params = ParameterSet::default();
    c.bench_function("default_preset", |b| {
        b.iter(|| build_tree(black_box(&params), black_box(17)));
    });
}

fn pruned_preset(c: &mut Criterion) {
    let params = ParameterSet {
        prune_ratio: 1.0,
        prune_width: 0.4,
        ..ParameterSet::default()
    };
    c.bench_function("pruned_preset", |b| {
        b.iter(|| build_tree(black_box(&params), black_box(17)));
    });
}

criterion_group!(benches, default_preset, pruned_preset);
criterion_main!(benches);
