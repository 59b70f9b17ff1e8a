use criterion::{Criterion, black_box, criterion_group, criterion_main};

use rust_nn_classifier::{
    Activation, Inputs, Loss, Mlp, MlpBuilder, Network, NetworkObjective, Objective, Targets,
};

fn mlp(input_dim: usize, hidden: usize, output_dim: usize) -> Mlp {
    MlpBuilder::new(input_dim)
        .unwrap()
        .add_layer(hidden, Activation::Tanh)
        .unwrap()
        .add_layer(output_dim, Activation::Identity)
        .unwrap()
        .softmax_output()
        .build()
        .unwrap()
}

fn batch(len: usize, input_dim: usize, output_dim: usize) -> (Inputs, Targets) {
    let inputs = (0..len * input_dim)
        .map(|i| ((i % 17) as f32) / 17.0 - 0.5)
        .collect();
    let mut targets = vec![0.0_f32; len * output_dim];
    for (i, row) in targets.chunks_exact_mut(output_dim).enumerate() {
        row[i % output_dim] = 1.0;
    }
    (
        Inputs::from_flat(inputs, input_dim).unwrap(),
        Targets::dense(targets, output_dim).unwrap(),
    )
}

fn forward_sample_bench(c: &mut Criterion) {
    let mlp = mlp(64, 128, 10);
    let params = mlp.initial_params(0);
    let mut scratch = mlp.scratch();
    let input = vec![0.1_f32; mlp.input_dim()];

    c.bench_function("forward_sample_64_128_10", |b| {
        b.iter(|| {
            let out = mlp.forward_sample(&params, black_box(&input), &mut scratch);
            black_box(out);
        })
    });
}

fn objective_bench(c: &mut Criterion) {
    let mlp = mlp(8, 16, 3);
    let params = mlp.initial_params(0);
    let (inputs, targets) = batch(256, 8, 3);
    let loss = Loss::CrossEntropy;
    let mut objective = NetworkObjective::new(&mlp, &inputs, &targets, &loss).unwrap();
    let mut grad = vec![0.0_f32; mlp.num_params()];

    c.bench_function("objective_value_256x8_16_3", |b| {
        b.iter(|| black_box(objective.value(black_box(&params)).unwrap()))
    });
    c.bench_function("objective_value_and_gradient_256x8_16_3", |b| {
        b.iter(|| {
            black_box(
                objective
                    .value_and_gradient(black_box(&params), &mut grad)
                    .unwrap(),
            )
        })
    });
}

criterion_group!(benches, forward_sample_bench, objective_bench);
criterion_main!(benches);
