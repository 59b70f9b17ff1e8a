use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rust_nn_classifier::{
    Activation, ClassifierConfig, CsrMatrix, Error, GradientDescent, Inputs, Labels, LocalSearch,
    Loss, Mlp, MlpBuilder, Network, NeuralNetworkClassifier, UpdateRule,
};

/// Two balanced blobs around (0.25, 0.25) and (0.75, 0.75); sample `i` is in class `i % 2`.
fn blobs(len: usize, seed: u64) -> (Vec<Vec<f32>>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(len);
    let mut classes = Vec::with_capacity(len);
    for i in 0..len {
        let class = i % 2;
        let center = if class == 0 { 0.25 } else { 0.75 };
        rows.push(vec![
            center + rng.gen_range(-0.15..0.15),
            center + rng.gen_range(-0.15..0.15),
        ]);
        classes.push(class);
    }
    (rows, classes)
}

fn one_hot_rows(classes: &[usize]) -> Vec<Vec<f32>> {
    classes
        .iter()
        .map(|&c| {
            let mut row = vec![0.0; 2];
            row[c] = 1.0;
            row
        })
        .collect()
}

fn hidden_net(outputs: usize, softmax: bool) -> Mlp {
    let builder = MlpBuilder::new(2)
        .unwrap()
        .add_layer(4, Activation::Tanh)
        .unwrap()
        .add_layer(outputs, Activation::Identity)
        .unwrap();
    if softmax {
        builder.softmax_output().build().unwrap()
    } else {
        builder.build().unwrap()
    }
}

fn fit_and_score(mut clf: NeuralNetworkClassifier<Mlp>, inputs: &Inputs, labels: &Labels) -> f32 {
    clf.fit(inputs, labels).unwrap();
    clf.score(inputs, labels).unwrap()
}

#[test]
fn every_label_encoding_beats_chance() {
    let (rows, classes) = blobs(20, 1);
    let inputs = Inputs::from_rows(&rows).unwrap();

    let plus_minus = Labels::Numeric(
        classes
            .iter()
            .map(|&c| if c == 1 { 1.0 } else { -1.0 })
            .collect(),
    );
    let zero_one = Labels::Numeric(classes.iter().map(|&c| c as f32).collect());
    let dense = Labels::one_hot_from_rows(&one_hot_rows(&classes)).unwrap();
    let sparse = Labels::Sparse(CsrMatrix::from_dense_rows(&one_hot_rows(&classes)).unwrap());
    let names: Vec<&str> = classes
        .iter()
        .map(|&c| if c == 1 { "high" } else { "low" })
        .collect();
    let categorical = Labels::categorical(&names);

    let cases = [
        ("binary +-1", NeuralNetworkClassifier::new(hidden_net(1, false)), plus_minus),
        ("binary 0/1", NeuralNetworkClassifier::new(hidden_net(1, false)), zero_one),
        ("dense one-hot", NeuralNetworkClassifier::new(hidden_net(2, false)), dense),
        ("sparse one-hot", NeuralNetworkClassifier::new(hidden_net(2, false)), sparse),
        (
            "categorical",
            NeuralNetworkClassifier::new(hidden_net(2, true))
                .with_loss_name("cross_entropy")
                .unwrap(),
            categorical,
        ),
    ];

    for (name, clf, labels) in cases {
        let accuracy = fit_and_score(clf, &inputs, &labels);
        assert!(accuracy > 0.5, "{name}: accuracy {accuracy}");
    }
}

#[test]
fn numeric_one_hot_scenario_on_five_points() {
    // Label 1 when the coordinate sum is at most 1.
    let rows = vec![
        vec![0.1, 0.2],
        vec![0.3, 0.4],
        vec![0.9, 0.8],
        vec![0.7, 0.6],
        vec![0.2, 0.9],
    ];
    let labels = Labels::Numeric(
        rows.iter()
            .map(|r| if r[0] + r[1] <= 1.0 { 1.0 } else { 0.0 })
            .collect(),
    );
    let inputs = Inputs::from_rows(&rows).unwrap();

    let mlp = MlpBuilder::new(2)
        .unwrap()
        .add_layer(2, Activation::Identity)
        .unwrap()
        .build()
        .unwrap();
    let mut clf = NeuralNetworkClassifier::new(mlp)
        .with_loss(Loss::SquaredError)
        .with_optimizer(LocalSearch::with_maxiter(25))
        .with_config(ClassifierConfig {
            one_hot: true,
            ..ClassifierConfig::default()
        });

    let report = clf.fit(&inputs, &labels).unwrap();
    assert!(report.iterations <= 25);
    assert!(clf.score(&inputs, &labels).unwrap() > 0.5);

    let Labels::Numeric(pred) = clf.predict(&inputs).unwrap() else {
        panic!("numeric labels decode to numeric predictions");
    };
    assert!(pred.iter().all(|&p| p == 0.0 || p == 1.0));
}

#[test]
fn one_hot_width_must_match_network_outputs() {
    let inputs = Inputs::from_rows(&[vec![0.0, 0.0], vec![1.0, 1.0]]).unwrap();
    let labels = Labels::Numeric(vec![0.0, 1.0]);
    let mut clf = NeuralNetworkClassifier::new(hidden_net(3, false)).with_config(ClassifierConfig {
        one_hot: true,
        ..ClassifierConfig::default()
    });
    assert!(matches!(clf.fit(&inputs, &labels), Err(Error::Shape(_))));
    assert!(!clf.is_fitted());
}

#[test]
fn callback_sees_finite_losses_and_full_parameter_vectors() {
    let (rows, classes) = blobs(10, 2);
    let inputs = Inputs::from_rows(&rows).unwrap();
    let labels = Labels::Numeric(classes.iter().map(|&c| c as f32).collect());

    let seen: Rc<RefCell<Vec<(usize, f32)>>> = Rc::default();
    let sink = Rc::clone(&seen);
    let net = hidden_net(1, false);
    let num_params = net.num_params();
    let mut clf = NeuralNetworkClassifier::new(net)
        .with_optimizer(LocalSearch::with_maxiter(5))
        .with_callback(move |params, loss| sink.borrow_mut().push((params.len(), loss)));

    clf.fit(&inputs, &labels).unwrap();

    let seen = seen.borrow();
    assert!(!seen.is_empty());
    assert!(seen.iter().all(|&(len, _)| len == num_params));
    assert!(seen.iter().all(|&(_, loss)| loss.is_finite()));
}

#[test]
fn unseen_category_at_score_time_is_rejected() {
    let inputs = Inputs::from_rows(&[vec![0.0, 0.0], vec![1.0, 1.0]]).unwrap();
    let mut clf = NeuralNetworkClassifier::new(hidden_net(2, true))
        .with_optimizer(LocalSearch::with_maxiter(3));
    clf.fit(&inputs, &Labels::categorical(&["cat", "dog"])).unwrap();

    let err = clf
        .score(&inputs, &Labels::categorical(&["cat", "bird"]))
        .unwrap_err();
    assert!(matches!(err, Error::UnknownCategory(ref c) if c == "bird"), "{err:?}");
}

#[test]
fn sparse_and_dense_data_give_the_same_accuracy() {
    let (rows, classes) = blobs(16, 3);
    let one_hot = one_hot_rows(&classes);

    let dense_inputs = Inputs::from_rows(&rows).unwrap();
    let sparse_inputs = Inputs::from_csr(&CsrMatrix::from_dense_rows(&rows).unwrap()).unwrap();
    let dense_labels = Labels::one_hot_from_rows(&one_hot).unwrap();
    let sparse_labels = Labels::Sparse(CsrMatrix::from_dense_rows(&one_hot).unwrap());

    let dense = fit_and_score(
        NeuralNetworkClassifier::new(hidden_net(2, false)),
        &dense_inputs,
        &dense_labels,
    );
    let sparse = fit_and_score(
        NeuralNetworkClassifier::new(hidden_net(2, false)),
        &sparse_inputs,
        &sparse_labels,
    );
    assert!((dense - sparse).abs() < 1e-6, "dense {dense} vs sparse {sparse}");
}

#[test]
fn sparse_labels_predict_sparse_rows() {
    let (rows, classes) = blobs(8, 4);
    let inputs = Inputs::from_rows(&rows).unwrap();
    let labels = Labels::Sparse(CsrMatrix::from_dense_rows(&one_hot_rows(&classes)).unwrap());

    let mut clf = NeuralNetworkClassifier::new(hidden_net(2, false))
        .with_optimizer(LocalSearch::with_maxiter(5));
    clf.fit(&inputs, &labels).unwrap();

    let Labels::Sparse(pred) = clf.predict(&inputs).unwrap() else {
        panic!("sparse labels decode to sparse predictions");
    };
    assert_eq!(pred.rows(), 8);
    assert_eq!(pred.nnz(), 8);
}

#[test]
fn gradient_descent_trains_a_softmax_classifier() {
    let (rows, classes) = blobs(20, 5);
    let inputs = Inputs::from_rows(&rows).unwrap();
    let names: Vec<String> = classes.iter().map(|c| format!("class-{c}")).collect();
    let labels = Labels::categorical(&names);

    let clf = NeuralNetworkClassifier::new(hidden_net(2, true))
        .with_loss(Loss::CrossEntropy)
        .with_optimizer(GradientDescent {
            maxiter: 300,
            lr: 0.1,
            rule: UpdateRule::Adam {
                beta1: 0.9,
                beta2: 0.999,
                eps: 1e-8,
            },
        });
    assert!(fit_and_score(clf, &inputs, &labels) > 0.5);
}

#[test]
fn failed_fit_leaves_fitted_parameters_untouched() {
    let (rows, classes) = blobs(10, 6);
    let inputs = Inputs::from_rows(&rows).unwrap();
    let labels = Labels::Numeric(classes.iter().map(|&c| c as f32).collect());

    let mut clf = NeuralNetworkClassifier::new(hidden_net(1, false))
        .with_optimizer(LocalSearch::with_maxiter(5));
    clf.fit(&inputs, &labels).unwrap();
    let before = clf.fitted_params().unwrap().to_vec();

    // Saturated parameters overflow the objective on the first evaluation.
    let huge = vec![f32::MAX; before.len()];
    let err = clf.fit_from(&inputs, &labels, &huge).unwrap_err();
    assert!(matches!(err, Error::TrainingFailed(_)), "{err:?}");
    assert_eq!(clf.fitted_params().unwrap(), before.as_slice());
}

#[test]
fn fitting_is_deterministic() {
    let (rows, classes) = blobs(12, 7);
    let inputs = Inputs::from_rows(&rows).unwrap();
    let labels = Labels::Numeric(classes.iter().map(|&c| c as f32).collect());

    let fit = || {
        let mut clf = NeuralNetworkClassifier::new(hidden_net(1, false))
            .with_optimizer(LocalSearch::with_maxiter(10));
        clf.fit(&inputs, &labels).unwrap();
        clf.fitted_params().unwrap().to_vec()
    };
    assert_eq!(fit(), fit());
}

#[test]
fn one_hot_ground_truth_scores_like_the_fitted_labels() {
    let (rows, classes) = blobs(12, 8);
    let inputs = Inputs::from_rows(&rows).unwrap();
    let dense = Labels::one_hot_from_rows(&one_hot_rows(&classes)).unwrap();
    let sparse = Labels::Sparse(CsrMatrix::from_dense_rows(&one_hot_rows(&classes)).unwrap());

    let names: Vec<&str> = classes.iter().map(|&c| if c == 1 { "b" } else { "a" }).collect();
    let categorical = Labels::categorical(&names);
    let numeric = Labels::Numeric(classes.iter().map(|&c| c as f32).collect());

    let one_hot = ClassifierConfig {
        one_hot: true,
        ..ClassifierConfig::default()
    };
    let cases = [
        (NeuralNetworkClassifier::new(hidden_net(2, false)), categorical),
        (
            NeuralNetworkClassifier::new(hidden_net(2, false)).with_config(one_hot),
            numeric,
        ),
    ];

    for (mut clf, labels) in cases {
        clf.fit(&inputs, &labels).unwrap();
        let expected = clf.score(&inputs, &labels).unwrap();
        assert_eq!(clf.score(&inputs, &dense).unwrap(), expected);
        assert_eq!(clf.score(&inputs, &sparse).unwrap(), expected);
    }
}
