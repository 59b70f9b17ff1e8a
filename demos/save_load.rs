use rust_nn_classifier::{
    Activation, Backend, Inputs, Labels, Mlp, MlpBuilder, NeuralNetworkClassifier,
    SerializableModel,
};

fn main() -> rust_nn_classifier::Result<()> {
    env_logger::init();

    let xs = Inputs::from_rows(&[
        vec![0.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![1.0, 1.0],
    ])?;
    let ys = Labels::Numeric(vec![-1.0, 1.0, 1.0, -1.0]);

    let mlp = MlpBuilder::new(2)?
        .add_layer(4, Activation::Tanh)?
        .add_layer(1, Activation::Tanh)?
        .build()?;

    let mut clf = NeuralNetworkClassifier::new(mlp);
    clf.fit(&xs, &ys)?;
    println!("accuracy before save={}", clf.score(&xs, &ys)?);

    let path = std::env::temp_dir().join("rust_nn_classifier_xor.json");
    clf.save(&path)?;

    let mut loaded = NeuralNetworkClassifier::<Mlp>::load(&path)?;
    let parallel = loaded.network().clone().with_backend(Backend::Parallel);
    loaded.set_network(std::sync::Arc::new(parallel))?;

    println!("saved and loaded model: {}", path.display());
    println!("accuracy after load={}", loaded.score(&xs, &ys)?);
    assert_eq!(loaded.predict(&xs)?, clf.predict(&xs)?);
    Ok(())
}
