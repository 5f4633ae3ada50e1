//! Benchmarks for batched frame scoring and pair training steps.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array4;
use rand::rngs::StdRng;
use rand::SeedableRng;

use trex_core::{FrameShape, RewardModel};
use trex_learn::trainer::pair_loss;
use trex_learn::{RewardNet, RewardNetConfig, Trainable};

fn network(shape: FrameShape) -> RewardNet {
    let mut rng = StdRng::seed_from_u64(0);
    RewardNet::new(shape, RewardNetConfig::default(), &mut rng).unwrap()
}

fn bench_score_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("score_batch");
    let shape = FrameShape::new(16, 16, 3);
    let net = network(shape);

    for len in [1, 20, 100].iter() {
        let frames = Array4::from_shape_fn((*len, 16, 16, 3), |(t, h, w, c)| {
            ((t + h + w + c) % 7) as f32 * 0.1
        });
        group.bench_with_input(BenchmarkId::from_parameter(len), len, |b, _| {
            b.iter(|| net.cumulative_return(black_box(&frames.view())).unwrap());
        });
    }

    group.finish();
}

fn bench_pair_gradient(c: &mut Criterion) {
    let mut group = c.benchmark_group("pair_gradient");
    let net = network(FrameShape::new(16, 16, 3));

    for len in [20, 50].iter() {
        let a = Array4::from_elem((*len, 16, 16, 3), 0.2_f32);
        let b = Array4::from_elem((*len, 16, 16, 3), 0.4_f32);
        group.bench_with_input(BenchmarkId::from_parameter(len), len, |bench, _| {
            bench.iter(|| {
                let (sa, ca) = net.forward_cached(&a.view()).unwrap();
                let (sb, cb) = net.forward_cached(&b.view()).unwrap();
                let loss = pair_loss([&sa, &sb], 1, 0.0).unwrap();
                let ga = net.backward(&ca, &loss.score_grads[0].view()).unwrap();
                let gb = net.backward(&cb, &loss.score_grads[1].view()).unwrap();
                black_box((ga, gb))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_score_batch, bench_pair_gradient);
criterion_main!(benches);
