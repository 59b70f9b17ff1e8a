use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rust_nn_classifier::{
    Activation, GradientDescent, Inputs, Labels, Loss, MlpBuilder, NeuralNetworkClassifier,
    UpdateRule,
};

fn main() -> rust_nn_classifier::Result<()> {
    env_logger::init();

    // Two interleaving half circles with uniform noise.
    let mut rng = StdRng::seed_from_u64(0);
    let n_per_class = 64;
    let mut xs = Vec::with_capacity(2 * n_per_class);
    let mut ys = Vec::with_capacity(2 * n_per_class);

    for i in 0..n_per_class {
        let t = std::f32::consts::PI * i as f32 / (n_per_class - 1) as f32;
        xs.push(vec![
            t.cos() + rng.gen_range(-0.1..0.1),
            t.sin() + rng.gen_range(-0.1..0.1),
        ]);
        ys.push("upper");
        xs.push(vec![
            1.0 - t.cos() + rng.gen_range(-0.1..0.1),
            0.5 - t.sin() + rng.gen_range(-0.1..0.1),
        ]);
        ys.push("lower");
    }

    let inputs = Inputs::from_rows(&xs)?;
    let labels = Labels::categorical(&ys);

    let mlp = MlpBuilder::new(2)?
        .add_layer(16, Activation::Tanh)?
        .add_layer(2, Activation::Identity)?
        .softmax_output()
        .build()?;

    let mut clf = NeuralNetworkClassifier::new(mlp)
        .with_loss(Loss::CrossEntropy)
        .with_optimizer(GradientDescent {
            maxiter: 500,
            lr: 0.05,
            rule: UpdateRule::Adam {
                beta1: 0.9,
                beta2: 0.999,
                eps: 1e-8,
            },
        });

    let report = clf.fit(&inputs, &labels)?;
    println!(
        "final_loss={} evaluations={}",
        report.final_loss, report.evaluations
    );
    println!("train accuracy={}", clf.score(&inputs, &labels)?);

    Ok(())
}
